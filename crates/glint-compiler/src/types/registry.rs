//! TypeTable: owns every type descriptor of a compilation.
//!
//! Built-in types are registered at fixed handles on creation. Array and
//! array-reference types are synthesized on first request and cached, so the
//! same `(base, length)` always yields the same handle. Nameless types (such
//! as distribution parameter blocks) are owned without a lookup name.

use std::collections::HashMap;
use std::ops::Index;

use crate::diagnostics::ErrorKind;

use super::{
    TYPE_BOOL, TYPE_CONTEXT, TYPE_DFUNC, TYPE_FLOAT, TYPE_INT, TYPE_ISECT, TYPE_LIGHT, TYPE_RAY,
    TYPE_SCENE_PTR, TYPE_SHADER_HANDLE, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4, TYPE_VOID, Type, TypeRef,
    TypeShape,
};

/// Marks a point in type registration that can be returned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeCheckpoint {
    types: usize,
    nameless: usize,
}

#[derive(Clone, Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    names: HashMap<String, TypeRef>,
    arrays: HashMap<(TypeRef, u32), TypeRef>,
    array_refs: HashMap<TypeRef, TypeRef>,
    nameless: Vec<TypeRef>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            names: HashMap::new(),
            arrays: HashMap::new(),
            array_refs: HashMap::new(),
            nameless: Vec::new(),
        };

        let builtins = [
            (TYPE_VOID, "void", TypeShape::Void, false),
            (TYPE_BOOL, "bool", TypeShape::Bool, false),
            (TYPE_INT, "int", TypeShape::Int, false),
            (TYPE_FLOAT, "float", TypeShape::Float, true),
            (TYPE_VEC2, "vec2", TypeShape::Vector(2), true),
            (TYPE_VEC3, "vec3", TypeShape::Vector(3), true),
            (TYPE_VEC4, "vec4", TypeShape::Vector(4), true),
            (TYPE_RAY, "ray", TypeShape::Ray, false),
            (TYPE_ISECT, "isect", TypeShape::Intersection, false),
            (TYPE_LIGHT, "light", TypeShape::Light, false),
            (TYPE_DFUNC, "dfunc", TypeShape::Dfunc, false),
            (TYPE_SHADER_HANDLE, "shader_handle", TypeShape::ShaderHandle, false),
            (TYPE_CONTEXT, "context", TypeShape::Context, false),
            (TYPE_SCENE_PTR, "scene_ptr", TypeShape::ScenePtr, false),
        ];
        for (expected, name, shape, differentiable) in builtins {
            let type_id = if shape == TypeShape::Dfunc { "dist" } else { name };
            let id = table.register(name, Type::new(name, type_id, shape).differentiable(differentiable));
            debug_assert_eq!(id, expected);
        }

        table
    }

    fn push(&mut self, ty: Type) -> TypeRef {
        let id = TypeRef(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    fn register(&mut self, name: &str, ty: Type) -> TypeRef {
        let id = self.push(ty);
        self.names.insert(name.to_owned(), id);
        id
    }

    /// Resolve a built-in type name.
    pub fn lookup(&self, name: &str) -> Result<TypeRef, ErrorKind> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::UnknownType(name.to_owned()))
    }

    pub fn get(&self, id: TypeRef) -> &Type {
        &self.types[id.index()]
    }

    pub fn name(&self, id: TypeRef) -> &str {
        self.get(id).name()
    }

    pub fn shape(&self, id: TypeRef) -> &TypeShape {
        self.get(id).shape()
    }

    /// The `base[len]` type, created on first request.
    pub fn array_of(&mut self, base: TypeRef, len: u32) -> TypeRef {
        if let Some(&id) = self.arrays.get(&(base, len)) {
            return id;
        }
        let base_ty = self.get(base);
        let name = format!("{}[{len}]", base_ty.name());
        let type_id = format!("{}[{len}]", base_ty.type_id());
        let differentiable = base_ty.is_differentiable();
        let ty = Type::new(name, type_id, TypeShape::Array { base, len }).differentiable(differentiable);
        let id = self.push(ty);
        self.arrays.insert((base, len), id);
        id
    }

    /// The `base[]` reference type, created on first request.
    pub fn array_ref_of(&mut self, base: TypeRef) -> TypeRef {
        if let Some(&id) = self.array_refs.get(&base) {
            return id;
        }
        let base_ty = self.get(base);
        let name = format!("{}[]", base_ty.name());
        let type_id = format!("{}[]", base_ty.type_id());
        let id = self.push(Type::new(name, type_id, TypeShape::ArrayRef { base }));
        self.array_refs.insert(base, id);
        id
    }

    /// Take ownership of a synthesized type that has no lookup name.
    pub fn register_nameless(&mut self, ty: Type) -> TypeRef {
        let id = self.push(ty);
        self.nameless.push(id);
        id
    }

    pub fn nameless(&self) -> &[TypeRef] {
        &self.nameless
    }

    pub fn checkpoint(&self) -> TypeCheckpoint {
        TypeCheckpoint {
            types: self.types.len(),
            nameless: self.nameless.len(),
        }
    }

    /// Forget every type created after `checkpoint`, including cached arrays.
    pub fn rollback(&mut self, checkpoint: TypeCheckpoint) {
        self.types.truncate(checkpoint.types);
        self.nameless.truncate(checkpoint.nameless);
        self.arrays.retain(|_, id| id.index() < checkpoint.types);
        self.array_refs.retain(|_, id| id.index() < checkpoint.types);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeRef, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeRef(i as u32), ty))
    }

    /// Comma-separated type names, as used in signatures and diagnostics.
    pub fn list(&self, types: &[TypeRef]) -> String {
        types
            .iter()
            .map(|&t| self.name(t))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Index<TypeRef> for TypeTable {
    type Output = Type;

    fn index(&self, id: TypeRef) -> &Type {
        self.get(id)
    }
}
