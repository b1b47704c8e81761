//! Export table: the host-visible directory of compiled symbols.
//!
//! Records are appended while declarations are compiled and mirror the
//! module tree. After compilation the host enumerates them per
//! [`ExportKind`] or serializes the whole table as JSON.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Material entry point, instantiated per surface by the renderer.
    Material,
    /// Generic entry point callable by the host.
    Entry,
    /// Reachable from other compiled code only (including distribution constructors).
    Internal,
    /// Provided by the host, only declared here.
    Foreign,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariableExport {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FunctionExport {
    pub name: String,
    pub full_name: String,
    /// Symbol of the generated function.
    pub symbol: String,
    pub kind: ExportKind,
    pub return_type: String,
    /// `(name, type)` per argument, `out` arguments prefixed with `out `.
    pub arguments: Vec<(String, String)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleExport {
    pub name: String,
    pub full_name: String,
    pub variables: IndexMap<String, VariableExport>,
    pub functions: Vec<FunctionExport>,
    pub modules: IndexMap<String, ModuleExport>,
}

impl ModuleExport {
    fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    fn for_each_function<'a>(&'a self, f: &mut impl FnMut(&'a FunctionExport)) {
        self.functions.iter().for_each(&mut *f);
        for module in self.modules.values() {
            module.for_each_function(f);
        }
    }
}

/// Marks a point in the innermost open module that can be returned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportCheckpoint {
    open: usize,
    variables: usize,
    functions: usize,
    modules: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportTable {
    root: ModuleExport,
    /// Modules currently open, innermost last, not yet attached to their parent.
    open: Vec<ModuleExport>,
}

impl ExportTable {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: ModuleExport::new(root.clone(), root),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut ModuleExport {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    /// Qualified name of the innermost open module.
    pub fn scope_name(&self) -> &str {
        self.open.last().map_or(&self.root.full_name, |m| &m.full_name)
    }

    pub fn push_module(&mut self, name: impl Into<String>) {
        let name = name.into();
        let full_name = format!("{}.{name}", self.scope_name());
        self.open.push(ModuleExport::new(name, full_name));
    }

    /// Close the innermost module and attach it to its parent.
    pub fn pop_module(&mut self) {
        if let Some(module) = self.open.pop() {
            self.current().modules.insert(module.name.clone(), module);
        }
    }

    /// Close the innermost module, dropping everything exported from it.
    pub fn discard_module(&mut self) {
        self.open.pop();
    }

    pub fn add_variable(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        let name = name.into();
        let full_name = format!("{}.{name}", self.scope_name());
        let export = VariableExport {
            name: name.clone(),
            full_name,
            ty: ty.into(),
        };
        self.current().variables.insert(name, export);
    }

    pub fn add_function(&mut self, export: FunctionExport) {
        self.current().functions.push(export);
    }

    pub fn checkpoint(&self) -> ExportCheckpoint {
        let current = self.open.last().unwrap_or(&self.root);
        ExportCheckpoint {
            open: self.open.len(),
            variables: current.variables.len(),
            functions: current.functions.len(),
            modules: current.modules.len(),
        }
    }

    /// Close modules opened after `checkpoint` and drop what was exported since.
    pub fn rollback(&mut self, checkpoint: ExportCheckpoint) {
        self.open.truncate(checkpoint.open);
        let current = self.current();
        current.variables.truncate(checkpoint.variables);
        current.functions.truncate(checkpoint.functions);
        current.modules.truncate(checkpoint.modules);
    }

    pub fn root(&self) -> &ModuleExport {
        &self.root
    }

    /// Visit every function export of `kind` whose name is not in `seen`,
    /// adding each visited name to `seen`.
    pub fn foreach_function_kind<'a>(
        &'a self,
        kind: ExportKind,
        seen: &mut HashSet<String>,
        mut callback: impl FnMut(&'a FunctionExport),
    ) {
        self.root.for_each_function(&mut |export| {
            if export.kind == kind && seen.insert(export.full_name.clone()) {
                callback(export);
            }
        });
    }

    pub fn functions(&self, kind: ExportKind) -> Vec<&FunctionExport> {
        let mut found = Vec::new();
        self.foreach_function_kind(kind, &mut HashSet::new(), |export| found.push(export));
        found
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.root)
    }
}
