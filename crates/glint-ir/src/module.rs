//! Modules: the unit handed from the compiler to the host.

use indexmap::IndexMap;

use crate::function::{Function, Signature};
use crate::instructions::{Callee, Const, Inst};
use crate::types::IrType;

/// Errors raised while assembling or verifying a module.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("function `{0}` is already defined")]
    DuplicateFunction(String),

    #[error("external `{name}` declared with conflicting signatures")]
    ExternConflict { name: String },

    #[error("function `{function}` references undefined symbol `{symbol}`")]
    UndefinedSymbol { function: String, symbol: String },

    #[error("function `{function}` references undefined global `{global}`")]
    UndefinedGlobal { function: String, global: String },

    #[error("function `{0}` does not end with `ret`")]
    MissingTerminator(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub ty: IrType,
    /// Globals without an initializer must be bound by the host.
    pub init: Option<Const>,
}

/// Marks a point in module construction that can be returned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    functions: usize,
    externs: usize,
    globals: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    functions: IndexMap<String, Function>,
    externs: IndexMap<String, Signature>,
    globals: IndexMap<String, Global>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a global the host binds at load time.
    pub fn declare_global(&mut self, name: impl Into<String>, ty: IrType) {
        self.globals.insert(name.into(), Global { ty, init: None });
    }

    /// Define a global with a constant initializer.
    pub fn define_global(&mut self, name: impl Into<String>, init: Const) {
        let ty = init.ir_type();
        self.globals.insert(
            name.into(),
            Global {
                ty,
                init: Some(init),
            },
        );
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> impl Iterator<Item = (&str, &Global)> {
        self.globals.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add a finished function, merging the externs it references.
    pub fn add_function(&mut self, function: Function) -> Result<(), ModuleError> {
        if self.functions.contains_key(&function.name) {
            return Err(ModuleError::DuplicateFunction(function.name));
        }
        for (name, sig) in &function.externs {
            match self.externs.get(name) {
                Some(existing) if existing != sig => {
                    return Err(ModuleError::ExternConflict { name: name.clone() });
                }
                Some(_) => {}
                None => {
                    self.externs.insert(name.clone(), sig.clone());
                }
            }
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn extern_signature(&self, name: &str) -> Option<&Signature> {
        self.externs.get(name)
    }

    pub fn externs(&self) -> impl Iterator<Item = (&str, &Signature)> {
        self.externs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            functions: self.functions.len(),
            externs: self.externs.len(),
            globals: self.globals.len(),
        }
    }

    /// Drop everything added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.functions.truncate(checkpoint.functions);
        self.externs.truncate(checkpoint.externs);
        self.globals.truncate(checkpoint.globals);
    }

    /// Check that every referenced symbol and global resolves and every body is terminated.
    pub fn verify(&self) -> Result<(), ModuleError> {
        for function in self.functions.values() {
            if !matches!(function.body.last(), Some(inst) if inst.is_terminator()) {
                return Err(ModuleError::MissingTerminator(function.name.clone()));
            }
            for inst in &function.body {
                match inst {
                    Inst::Call {
                        callee: Callee::Direct(symbol),
                        ..
                    }
                    | Inst::FuncAddr { name: symbol, .. } => {
                        if !self.functions.contains_key(symbol) && !self.externs.contains_key(symbol)
                        {
                            return Err(ModuleError::UndefinedSymbol {
                                function: function.name.clone(),
                                symbol: symbol.clone(),
                            });
                        }
                    }
                    Inst::GlobalAddr { name, .. } if !self.globals.contains_key(name) => {
                        return Err(ModuleError::UndefinedGlobal {
                            function: function.name.clone(),
                            global: name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
