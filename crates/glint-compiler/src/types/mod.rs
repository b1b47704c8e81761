//! Type model.
//!
//! Types are owned by a [`TypeTable`] and referred to by [`TypeRef`] handles.
//! Per-type behavior is dispatched on [`TypeShape`] by methods on the table
//! (see `descriptor.rs`).

mod descriptor;
mod registry;

#[cfg(test)]
mod types_tests;

use glint_ir::Value;

pub use descriptor::Cast;
pub use registry::{TypeCheckpoint, TypeTable};

/// Handle to a type in a [`TypeTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TypeRef(pub(crate) u32);

impl TypeRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub const TYPE_VOID: TypeRef = TypeRef(0);
pub const TYPE_BOOL: TypeRef = TypeRef(1);
pub const TYPE_INT: TypeRef = TypeRef(2);
pub const TYPE_FLOAT: TypeRef = TypeRef(3);
pub const TYPE_VEC2: TypeRef = TypeRef(4);
pub const TYPE_VEC3: TypeRef = TypeRef(5);
pub const TYPE_VEC4: TypeRef = TypeRef(6);
pub const TYPE_RAY: TypeRef = TypeRef(7);
pub const TYPE_ISECT: TypeRef = TypeRef(8);
pub const TYPE_LIGHT: TypeRef = TypeRef(9);
pub const TYPE_DFUNC: TypeRef = TypeRef(10);
pub const TYPE_SHADER_HANDLE: TypeRef = TypeRef(11);
pub const TYPE_CONTEXT: TypeRef = TypeRef(12);
pub const TYPE_SCENE_PTR: TypeRef = TypeRef(13);

/// Structure of a type, which selects its behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeShape {
    Void,
    Bool,
    Int,
    Float,
    /// Float vector with 2 to 4 components.
    Vector(u8),
    /// Opaque ray blob owned by the renderer.
    Ray,
    /// Opaque intersection blob owned by the renderer.
    Intersection,
    Light,
    /// Reference-counted handle to a distribution object.
    Dfunc,
    /// Pointer to a shader function `(ray, vec2, isect) -> dfunc`.
    ShaderHandle,
    Context,
    ScenePtr,
    Array { base: TypeRef, len: u32 },
    /// Borrowed view of an array of any length: `{pointer, length}`.
    ArrayRef { base: TypeRef },
    Record { fields: Vec<Field> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
}

/// A type descriptor.
///
/// Equality is by `type_id` alone; `name` is what diagnostics print.
#[derive(Clone, Debug)]
pub struct Type {
    name: String,
    type_id: String,
    differentiable: bool,
    shape: TypeShape,
}

impl Type {
    pub fn new(name: impl Into<String>, type_id: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            type_id: type_id.into(),
            differentiable: false,
            shape,
        }
    }

    /// A record type with the given fields in order.
    pub fn record(name: impl Into<String>, type_id: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, type_id, TypeShape::Record { fields })
    }

    pub fn differentiable(mut self, value: bool) -> Self {
        self.differentiable = value;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn is_differentiable(&self) -> bool {
        self.differentiable
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Type {}

/// A generated value together with its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypedValue {
    pub value: Value,
    pub ty: TypeRef,
}

impl TypedValue {
    pub fn new(value: Value, ty: TypeRef) -> Self {
        Self { value, ty }
    }
}
