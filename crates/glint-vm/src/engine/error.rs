/// Errors raised while executing a module.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid module: {0}")]
    InvalidModule(#[from] glint_ir::ModuleError),

    #[error("global `{0}` was used before the host bound it")]
    UnboundGlobal(String),

    #[error("no global named `{0}`")]
    UnknownGlobal(String),

    #[error("no function named `{0}`")]
    UnknownFunction(String),

    #[error("no host implementation for external symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("invalid address {0:#x}")]
    InvalidAddress(u64),

    #[error("access to freed memory at {0:#x}")]
    UseAfterFree(u64),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("`{function}` expects {expected} arguments, got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("call depth exceeded (limit: {0})")]
    CallDepthExceeded(u32),

    #[error("out of memory (limit: {0} bytes)")]
    OutOfMemory(usize),

    #[error("invalid distribution handle {0}")]
    InvalidHandle(u64),
}
