//! Declaration tree handed over by the parser.
//!
//! The parser is a separate component; this module only defines the shape it
//! produces. Every node that can fail carries the [`Span`] of its first token.

use crate::diagnostics::{ErrorKind, Span};

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Float(f32),
    Int(i32),
    Bool(bool),
    /// Variable reference, possibly qualified by module names.
    Path(Vec<String>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Function call, or construction when the path names a type.
    Call { path: Vec<String>, args: Vec<Expr> },
    /// Construction of a type that is not a plain name, e.g. `float[3](...)`.
    Construct { ty: TypeExpr, args: Vec<Expr> },
    Field { base: Box<Expr>, name: String },
    Index { base: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn float(value: f32) -> Self {
        Self::new(ExprKind::Float(value), Span::default())
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::Int(value), Span::default())
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value), Span::default())
    }

    /// Reference to `a.b.c`.
    pub fn path(dotted: &str) -> Self {
        Self::new(ExprKind::Path(split_path(dotted)), Span::default())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Span::default(),
        )
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            Span::default(),
        )
    }

    pub fn call(dotted: &str, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                path: split_path(dotted),
                args,
            },
            Span::default(),
        )
    }

    pub fn construct(ty: TypeExpr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Construct { ty, args }, Span::default())
    }

    pub fn field(self, name: &str) -> Self {
        let span = self.span;
        Self::new(
            ExprKind::Field {
                base: Box::new(self),
                name: name.to_owned(),
            },
            span,
        )
    }

    pub fn index(self, index: Expr) -> Self {
        let span = self.span;
        Self::new(
            ExprKind::Index {
                base: Box::new(self),
                index: Box::new(index),
            },
            span,
        )
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    /// Whether the expression names existing storage rather than a fresh value.
    pub fn is_place(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Path(_) | ExprKind::Field { .. } | ExprKind::Index { .. }
        )
    }
}

fn split_path(dotted: &str) -> Vec<String> {
    dotted.split('.').map(str::to_owned).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Result<Self, ErrorKind> {
        Ok(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "&&" => Self::And,
            "||" => Self::Or,
            _ => return Err(ErrorKind::UnsupportedOperator(symbol.to_owned())),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(Vec<String>),
    Array(Box<TypeExpr>, u32),
    /// Array of any length, passed by reference.
    ArrayRef(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(dotted: &str) -> Self {
        Self::Named(split_path(dotted))
    }

    pub fn array(base: TypeExpr, len: u32) -> Self {
        Self::Array(Box::new(base), len)
    }

    pub fn array_ref(base: TypeExpr) -> Self {
        Self::ArrayRef(Box::new(base))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<TypeExpr>,
        value: Option<Expr>,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn let_(name: &str, ty: Option<TypeExpr>, value: Option<Expr>) -> Self {
        Self::Let {
            name: name.to_owned(),
            ty,
            value,
            span: Span::default(),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign {
            target,
            value,
            span: Span::default(),
        }
    }

    pub fn ret(value: Expr) -> Self {
        Self::Return {
            value: Some(value),
            span: Span::default(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Let { span, .. } | Self::Assign { span, .. } | Self::Return { span, .. } => *span,
            Self::Expr(expr) => expr.span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Plain,
    /// Host-callable entry point.
    Entry,
    /// Material entry point.
    Material,
    /// Implemented by the host; has no body.
    Foreign,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArgDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub output: bool,
}

impl ArgDecl {
    pub fn new(name: &str, ty: TypeExpr) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            output: false,
        }
    }

    pub fn out(name: &str, ty: TypeExpr) -> Self {
        Self {
            output: true,
            ..Self::new(name, ty)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub kind: FunctionKind,
    pub args: Vec<ArgDecl>,
    pub return_type: TypeExpr,
    /// `None` for forward and foreign declarations.
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: &str, args: Vec<ArgDecl>, return_type: TypeExpr, body: Vec<Stmt>) -> Self {
        Self {
            name: name.to_owned(),
            kind: FunctionKind::Plain,
            args,
            return_type,
            body: Some(body),
            span: Span::default(),
        }
    }

    pub fn forward(name: &str, args: Vec<ArgDecl>, return_type: TypeExpr) -> Self {
        Self {
            body: None,
            ..Self::new(name, args, return_type, Vec::new())
        }
    }

    pub fn kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

impl ParamDecl {
    pub fn new(name: &str, ty: TypeExpr) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DistributionDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub body: Vec<Decl>,
    pub span: Span,
}

impl DistributionDecl {
    pub fn new(name: &str, params: Vec<ParamDecl>, body: Vec<Decl>) -> Self {
        Self {
            name: name.to_owned(),
            params,
            body,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub body: Vec<Decl>,
    pub span: Span,
}

impl ModuleDecl {
    pub fn new(name: &str, body: Vec<Decl>) -> Self {
        Self {
            name: name.to_owned(),
            body,
            span: Span::default(),
        }
    }
}

/// Module-level constant.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

impl GlobalDecl {
    pub fn new(name: &str, ty: Option<TypeExpr>, value: Expr) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            value,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

impl TypeAliasDecl {
    pub fn new(name: &str, ty: TypeExpr) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    Distribution(DistributionDecl),
    Module(ModuleDecl),
    Global(GlobalDecl),
    TypeAlias(TypeAliasDecl),
}

macro_rules! impl_into_decl {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Decl {
                fn from(decl: $ty) -> Self {
                    Self::$variant(decl)
                }
            }
        )*
    };
}

impl_into_decl!(
    Function(FunctionDecl),
    Distribution(DistributionDecl),
    Module(ModuleDecl),
    Global(GlobalDecl),
    TypeAlias(TypeAliasDecl),
);
