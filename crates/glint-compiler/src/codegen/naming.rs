//! Names of generated symbols.

/// Role of a generated distribution wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapperRole {
    Evaluator,
    Sampler,
    Destructor,
}

impl WrapperRole {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Evaluator => "eval",
            Self::Sampler => "sample",
            Self::Destructor => "dtor",
        }
    }
}

/// `scope.name`
pub fn qualified(scope: &str, name: &str) -> String {
    format!("{scope}.{name}")
}

/// Symbol of a compiled function, unique per overload: `scope.name(t1,t2)`.
pub fn function_symbol<S: AsRef<str>>(scope: &str, name: &str, arguments: &[S]) -> String {
    let arguments: Vec<&str> = arguments.iter().map(AsRef::as_ref).collect();
    format!("{scope}.{name}({})", arguments.join(","))
}

/// Display name of a distribution's parameter block type.
pub fn param_block_name(distribution: &str) -> String {
    format!("{distribution}_params_t")
}

/// `scope.distribution.role`
pub fn wrapper_symbol(scope: &str, distribution: &str, role: WrapperRole) -> String {
    format!("{scope}.{distribution}.{}", role.suffix())
}
