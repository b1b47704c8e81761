//! Compile errors and their collection.
//!
//! Every fallible step returns `CompileResult<T>`. Call sites pick between
//! failing fast with `?` and accumulating sibling results with
//! [`Diagnostics::collect`] or [`Diagnostics::combine`].

mod printer;


use std::fmt;

pub use printer::DiagnosticsPrinter;

/// 1-based source position of the construct an error refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("cannot convert `{from}` to `{to}`")]
    InvalidCast { from: String, to: String },

    #[error("`{ty}` expects {expected} arguments, found {found}")]
    ArgumentCountMismatch {
        ty: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index}: expected type `{expected}`, found `{found}`")]
    ArgumentTypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("type `{ty}` has no field `{field}`")]
    NoSuchField { ty: String, field: String },

    #[error("type `{0}` cannot be indexed")]
    NotIndexable(String),

    #[error("no operator `{op}` for `{lhs}` and `{rhs}`")]
    NoMatchingOperator { op: String, lhs: String, rhs: String },

    #[error("no operator `{op}` for `{operand}`")]
    NoMatchingUnaryOperator { op: String, operand: String },

    #[error("distribution is missing entry point `{0}`")]
    MissingEntryPoint(String),

    #[error("entry point `{name}` {reason}")]
    InvalidEntryPointSignature { name: String, reason: String },

    #[error("type `{0}` has no default value")]
    NoDefault(String),

    #[error("type `{0}` cannot be constructed")]
    NotConstructible(String),

    #[error("expression is not a compile-time constant")]
    NotConstant,

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("no function `{name}` accepts ({args})")]
    NoMatchingFunction { name: String, args: String },

    #[error("function `{0}` is already defined in this scope")]
    DuplicateFunction(String),

    #[error("expression cannot be assigned to")]
    NotAssignable,

    #[error("index must be `int`, found `{0}`")]
    InvalidIndex(String),

    #[error("function `{0}` does not return a value")]
    MissingReturn(String),

    #[error("function `{0}` is declared but never defined")]
    UnresolvedForwardDeclaration(String),

    #[error("`{0}` belongs to an enclosing distribution")]
    EnclosingDistribution(String),

    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    #[error("{0}")]
    Message(String),
}

impl ErrorKind {
    /// This error located at `span`.
    pub fn at(self, span: Span) -> CompileError {
        CompileError::new(self).located(span)
    }
}

/// A recoverable error, optionally tagged with where it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, span: None }
    }

    /// Attach `span` unless a more precise location is already known.
    pub fn located(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{span}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl From<ErrorKind> for CompileError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

pub type CompileResult<T> = Result<T, Diagnostics>;

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<CompileError>) {
        self.errors.push(error.into());
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    pub fn kinds(&self) -> Vec<&ErrorKind> {
        self.errors.iter().map(|e| &e.kind).collect()
    }

    /// Tag every error that has no location yet.
    pub fn located(mut self, span: Span) -> Self {
        for error in &mut self.errors {
            error.span.get_or_insert(span);
        }
        self
    }

    /// `Ok(())` when empty, otherwise the collected errors.
    pub fn into_result(self) -> CompileResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Run every step, keeping all successes or all errors.
    pub fn collect<T>(results: impl IntoIterator<Item = CompileResult<T>>) -> CompileResult<Vec<T>> {
        let mut values = Vec::new();
        let mut errors = Diagnostics::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => errors.extend(e),
            }
        }
        errors.into_result().map(|()| values)
    }

    /// Join two independent results, reporting the errors of both.
    pub fn combine<A, B>(a: CompileResult<A>, b: CompileResult<B>) -> CompileResult<(A, B)> {
        match (a, b) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(mut a), Err(b)) => {
                a.extend(b);
                Err(a)
            }
        }
    }

    pub fn printer(&self) -> DiagnosticsPrinter<'_, '_> {
        DiagnosticsPrinter::new(self)
    }
}

impl From<CompileError> for Diagnostics {
    fn from(error: CompileError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<ErrorKind> for Diagnostics {
    fn from(kind: ErrorKind) -> Self {
        CompileError::new(kind).into()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
