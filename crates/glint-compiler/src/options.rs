//! Compilation options.

use serde::Deserialize;

use glint_ir::abi::SCENE_GLOBAL;

/// Options controlling a compilation.
///
/// Hosts can load these from JSON; missing keys keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Name given to the generated module.
    pub(crate) module_name: String,
    /// Name of the outermost scope, the first segment of every qualified name.
    pub(crate) root_scope: String,
    /// Global holding the scene pointer handed to distribution constructors.
    pub(crate) scene_global: String,
    /// Verify the finished module before returning it.
    pub(crate) verify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_name: "main".to_owned(),
            root_scope: "global".to_owned(),
            scene_global: SCENE_GLOBAL.to_owned(),
            verify: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    pub fn root_scope(mut self, name: impl Into<String>) -> Self {
        self.root_scope = name.into();
        self
    }

    pub fn scene_global(mut self, name: impl Into<String>) -> Self {
        self.scene_global = name.into();
        self
    }

    pub fn verify(mut self, value: bool) -> Self {
        self.verify = value;
        self
    }

    pub fn get_module_name(&self) -> &str {
        &self.module_name
    }

    pub fn get_root_scope(&self) -> &str {
        &self.root_scope
    }

    pub fn get_scene_global(&self) -> &str {
        &self.scene_global
    }
}
