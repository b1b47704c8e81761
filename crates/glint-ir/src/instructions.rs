//! Instruction set.
//!
//! Every instruction that produces a result writes a fresh virtual register
//! (`Value`). Function parameters occupy registers `0..params.len()`.

use std::fmt;

use crate::types::IrType;

/// Virtual register.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Value(u32);

impl Value {
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Bool(bool),
    I32(i32),
    F32(f32),
    Vector(Vec<f32>),
    Array(IrType, Vec<Const>),
    Struct(Vec<Const>),
    Null,
    /// All-zero bit pattern of the given type.
    Zero(IrType),
}

impl Const {
    pub fn ir_type(&self) -> IrType {
        match self {
            Self::Bool(_) => IrType::Bool,
            Self::I32(_) => IrType::I32,
            Self::F32(_) => IrType::F32,
            Self::Vector(lanes) => IrType::Vector(lanes.len() as u8),
            Self::Array(elem, items) => IrType::array(elem.clone(), items.len() as u32),
            Self::Struct(fields) => IrType::Struct(fields.iter().map(Const::ir_type).collect()),
            Self::Null => IrType::Ptr,
            Self::Zero(ty) => ty.clone(),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v:?}"),
            Self::Vector(lanes) => {
                write!(f, "<")?;
                write_list(f, lanes.iter().map(|l| format!("{l:?}")))?;
                write!(f, ">")
            }
            Self::Array(_, items) => {
                write!(f, "[")?;
                write_list(f, items.iter().map(ToString::to_string))?;
                write!(f, "]")
            }
            Self::Struct(fields) => {
                write!(f, "{{")?;
                write_list(f, fields.iter().map(ToString::to_string))?;
                write!(f, "}}")
            }
            Self::Null => write!(f, "null"),
            Self::Zero(ty) => write!(f, "zero {ty}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Binary operations. Integer, float and float-vector operands are all
/// accepted; vector operands are combined lane by lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
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

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Not => "not",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    IntToFloat,
    FloatToInt,
    BoolToInt,
    /// Broadcast a float into every lane of a vector.
    Splat(u8),
}

impl CastOp {
    pub fn result_type(self) -> IrType {
        match self {
            Self::IntToFloat => IrType::F32,
            Self::FloatToInt | Self::BoolToInt => IrType::I32,
            Self::Splat(lanes) => IrType::Vector(lanes),
        }
    }

    pub fn mnemonic(self) -> String {
        match self {
            Self::IntToFloat => "sitofp".to_owned(),
            Self::FloatToInt => "fptosi".to_owned(),
            Self::BoolToInt => "zext".to_owned(),
            Self::Splat(lanes) => format!("splat.{lanes}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Callee {
    /// A module function or an external symbol, by name.
    Direct(String),
    /// A function pointer held in a register.
    Indirect(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    Const {
        dst: Value,
        value: Const,
    },
    /// Reserve stack storage for one value of `ty` in the current frame.
    Alloca {
        dst: Value,
        ty: IrType,
    },
    Load {
        dst: Value,
        ty: IrType,
        ptr: Value,
    },
    Store {
        ty: IrType,
        value: Value,
        ptr: Value,
    },
    /// Pointer to member `index` of the aggregate of type `ty` at `ptr`.
    MemberPtr {
        dst: Value,
        ty: IrType,
        ptr: Value,
        index: u32,
    },
    /// Pointer to element `index` of a contiguous run of `elem` at `ptr`.
    ElementPtr {
        dst: Value,
        elem: IrType,
        ptr: Value,
        index: Value,
    },
    Extract {
        dst: Value,
        aggregate: Value,
        index: u32,
    },
    Insert {
        dst: Value,
        aggregate: Value,
        element: Value,
        index: u32,
    },
    Binary {
        dst: Value,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Unary {
        dst: Value,
        op: UnOp,
        arg: Value,
    },
    Cast {
        dst: Value,
        op: CastOp,
        arg: Value,
    },
    Call {
        dst: Option<Value>,
        callee: Callee,
        args: Vec<Value>,
    },
    FuncAddr {
        dst: Value,
        name: String,
    },
    GlobalAddr {
        dst: Value,
        name: String,
    },
    Return {
        value: Option<Value>,
    },
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return { .. })
    }
}
