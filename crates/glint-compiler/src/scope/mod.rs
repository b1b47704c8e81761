//! Nested symbol tables.
//!
//! A [`Scopes`] stack holds one [`Frame`] per lexical construct being
//! compiled (root, modules, distributions, function bodies). Lookups walk
//! from the innermost frame outward; `local_*` queries only see the top
//! frame. `push` hands out a [`ScopeToken`] that `pop` consumes, so every
//! pushed frame has exactly one matching pop.


use indexmap::IndexMap;

use glint_ir::Value;

use crate::diagnostics::{CompileResult, Diagnostics, ErrorKind};
use crate::types::TypeRef;

/// Where a variable's value lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Address of a stack slot or out-argument in the current function.
    Pointer(Value),
    /// Member `index` of the parameter block of the distribution at nesting
    /// `depth`, reached through the context pointer of the current function.
    ContextField { depth: usize, index: u32 },
    /// Module-level constant.
    Global(String),
}

impl Storage {
    /// Nesting depth of the distribution owning this storage, if any.
    pub fn context_depth(&self) -> Option<usize> {
        match self {
            Self::ContextField { depth, .. } => Some(*depth),
            Self::Pointer(_) | Self::Global(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableEntry {
    pub storage: Storage,
    pub ty: TypeRef,
    pub mutable: bool,
}

/// Identity of a function: name plus ordered argument types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    pub name: String,
    pub arguments: Vec<TypeRef>,
}

impl FunctionKey {
    pub fn new(name: impl Into<String>, arguments: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionArgument {
    pub name: String,
    pub ty: TypeRef,
    /// Passed by pointer and written by the callee.
    pub output: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Scope-qualified name.
    pub name: String,
    /// Name of the generated IR function (or host symbol for foreign functions).
    pub symbol: String,
    pub return_type: TypeRef,
    pub arguments: Vec<FunctionArgument>,
    /// Nesting depth of the distribution whose context pointer is passed as a
    /// hidden first argument.
    pub context: Option<usize>,
    /// False for a forward declaration that has not been given a body yet.
    pub defined: bool,
    pub foreign: bool,
}

impl FunctionEntry {
    pub fn takes_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn argument_types(&self) -> Vec<TypeRef> {
        self.arguments.iter().map(|a| a.ty).collect()
    }
}

/// Symbols declared by one lexical construct.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    name: String,
    variables: IndexMap<String, VariableEntry>,
    functions: IndexMap<FunctionKey, FunctionEntry>,
    types: IndexMap<String, TypeRef>,
    modules: IndexMap<String, Frame>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable(&self, name: &str) -> Option<&VariableEntry> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &VariableEntry)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn function(&self, key: &FunctionKey) -> Option<&FunctionEntry> {
        self.functions.get(key)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.functions.values()
    }

    fn functions_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a FunctionEntry> {
        self.functions
            .iter()
            .filter(move |(key, _)| key.name == name)
            .map(|(_, entry)| entry)
    }

    pub fn ty(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).copied()
    }

    pub fn module(&self, name: &str) -> Option<&Frame> {
        self.modules.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.functions.is_empty()
            && self.types.is_empty()
            && self.modules.is_empty()
    }
}

/// Proof that a frame was pushed. Consumed by [`Scopes::pop`].
#[derive(Debug)]
#[must_use = "a pushed scope must be popped"]
pub struct ScopeToken {
    depth: usize,
}

#[derive(Clone, Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            frames: vec![Frame::new(root)],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, name: impl Into<String>) -> ScopeToken {
        self.frames.push(Frame::new(name));
        tracing::trace!(scope = %self.scope_name(), "scope pushed");
        ScopeToken {
            depth: self.frames.len(),
        }
    }

    /// Pop the frame `token` was issued for.
    ///
    /// The frame is removed even when it still holds forward declarations
    /// that were never defined; those are reported as errors.
    pub fn pop(&mut self, token: ScopeToken) -> CompileResult<Frame> {
        debug_assert!(token.depth > 1, "the root scope is never popped");
        debug_assert_eq!(token.depth, self.frames.len(), "scopes popped out of order");
        tracing::trace!(scope = %self.scope_name(), "scope popped");
        self.frames.truncate(token.depth);
        let frame = self.frames.pop().unwrap_or_default();

        let mut diagnostics = Diagnostics::new();
        for entry in frame.functions() {
            if !entry.defined && !entry.foreign {
                diagnostics.push(ErrorKind::UnresolvedForwardDeclaration(entry.name.clone()));
            }
        }
        diagnostics.into_result().map(|()| frame)
    }

    fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Names of all open frames joined by `.`, e.g. `global.lambert`.
    pub fn scope_name(&self) -> String {
        self.frames
            .iter()
            .map(Frame::name)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn current(&self) -> &Frame {
        self.top()
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, entry: VariableEntry) {
        self.top_mut().variables.insert(name.into(), entry);
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&VariableEntry> {
        self.frames.iter().rev().find_map(|f| f.variable(name))
    }

    /// Resolve `a.b.c` as variable `c` of module `a.b`, or a plain name.
    pub fn lookup_qualified_variable(&self, path: &[String]) -> Result<&VariableEntry, ErrorKind> {
        let unknown = || ErrorKind::UnknownVariable(path.join("."));
        match path {
            [] => Err(unknown()),
            [name] => self.lookup_variable(name).ok_or_else(unknown),
            [modules @ .., name] => self
                .lookup_module(modules)?
                .variable(name)
                .ok_or_else(unknown),
        }
    }

    pub fn declare_type(&mut self, name: impl Into<String>, ty: TypeRef) {
        self.top_mut().types.insert(name.into(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.frames.iter().rev().find_map(|f| f.ty(name))
    }

    /// Keep a popped module frame so qualified names can reach into it.
    pub fn add_module(&mut self, frame: Frame) {
        self.top_mut().modules.insert(frame.name.clone(), frame);
    }

    pub fn lookup_module(&self, path: &[String]) -> Result<&Frame, ErrorKind> {
        let unknown = || ErrorKind::UnknownModule(path.join("."));
        let (first, rest) = path.split_first().ok_or_else(unknown)?;
        let mut frame = self
            .frames
            .iter()
            .rev()
            .find_map(|f| f.module(first))
            .ok_or_else(unknown)?;
        for segment in rest {
            frame = frame.module(segment).ok_or_else(unknown)?;
        }
        Ok(frame)
    }

    /// Declare or define a function in the innermost frame.
    ///
    /// A definition replaces an earlier forward declaration of the same key;
    /// a redundant forward declaration is ignored.
    pub fn declare_function(&mut self, key: FunctionKey, entry: FunctionEntry) -> Result<(), ErrorKind> {
        let functions = &mut self.top_mut().functions;
        match functions.get(&key) {
            None => {}
            Some(_) if !entry.defined => return Ok(()),
            Some(existing) if !existing.defined => {}
            Some(_) => return Err(ErrorKind::DuplicateFunction(entry.name)),
        }
        functions.insert(key, entry);
        Ok(())
    }

    /// Put the innermost frame's entry for `key` back to `previous`, removing
    /// it when there was none.
    pub fn restore_function(&mut self, key: &FunctionKey, previous: Option<FunctionEntry>) {
        let functions = &mut self.top_mut().functions;
        match previous {
            Some(entry) => {
                functions.insert(key.clone(), entry);
            }
            None => {
                functions.shift_remove(key);
            }
        }
    }

    /// Look a function up in the innermost frame only.
    pub fn local_function(&self, key: &FunctionKey) -> Option<&FunctionEntry> {
        self.top().function(key)
    }

    /// All overloads of `name` in the innermost frame that declares any.
    pub fn function_candidates(&self, name: &str) -> Vec<&FunctionEntry> {
        self.frames
            .iter()
            .rev()
            .map(|f| f.functions_named(name).collect::<Vec<_>>())
            .find(|candidates| !candidates.is_empty())
            .unwrap_or_default()
    }

    /// Like [`Scopes::function_candidates`], resolving `m.f` through modules.
    pub fn qualified_function_candidates(
        &self,
        path: &[String],
    ) -> Result<Vec<&FunctionEntry>, ErrorKind> {
        match path {
            [] => Ok(Vec::new()),
            [name] => Ok(self.function_candidates(name)),
            [modules @ .., name] => Ok(self.lookup_module(modules)?.functions_named(name).collect()),
        }
    }
}
