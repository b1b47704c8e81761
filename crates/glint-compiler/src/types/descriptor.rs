//! Per-type behavior: casting, layout, lifetime, construction and access.
//!
//! Methods dispatch on [`TypeShape`]. Anything a shape does not override
//! falls back to the default: identity-only casts, by-value layout, no
//! default value, shallow copy, no-op destroy, no fields, not indexable.

use glint_ir::abi::{self, COPY_DFUNC, DESTROY_DFUNC};
use glint_ir::{BinOp, CastOp, Const, FunctionBuilder, IrType, Value};

use crate::diagnostics::ErrorKind;

use super::{
    TYPE_FLOAT, TYPE_INT, TYPE_ISECT, TYPE_RAY, TYPE_SHADER_HANDLE, TYPE_VEC2, TYPE_VEC3,
    TYPE_VEC4, TypeRef, TypeShape, TypeTable, TypedValue,
};

/// Legality and cost of an implicit conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cast {
    pub legal: bool,
    pub cost: u32,
}

impl Cast {
    pub const IDENTITY: Cast = Cast {
        legal: true,
        cost: 0,
    };

    /// Larger than the cost of any legal cast, so costs always compare.
    pub const ILLEGAL: Cast = Cast {
        legal: false,
        cost: u32::MAX,
    };

    const fn implicit(cost: u32) -> Cast {
        Cast { legal: true, cost }
    }
}

/// How an argument list builds a value of some type.
enum Construction {
    /// One scalar of any numeric kind, converted explicitly.
    Scalar,
    /// One float broadcast to every lane.
    Splat(u8),
    /// One argument per member, each implicitly cast.
    Aggregate(Vec<TypeRef>),
    /// Exactly these argument types, no conversions.
    Exact(Vec<TypeRef>),
}

enum FieldAccess {
    Lane(u32),
    Swizzle(Vec<u32>),
    Member(u32),
    ArrayLength(u32),
    RefLength,
}

fn array_ref_ir() -> IrType {
    IrType::Struct(vec![IrType::Ptr, IrType::I32])
}

fn vector_type(lanes: usize) -> Option<TypeRef> {
    match lanes {
        2 => Some(TYPE_VEC2),
        3 => Some(TYPE_VEC3),
        4 => Some(TYPE_VEC4),
        _ => None,
    }
}

/// Lane indices named by a swizzle such as `xy` or `bgr`.
fn swizzle(name: &str, lanes: u8) -> Option<Vec<u32>> {
    if name.is_empty() || name.len() > 4 {
        return None;
    }
    ["xyzw", "rgba"].iter().find_map(|set| {
        name.chars()
            .map(|c| set.find(c).map(|i| i as u32))
            .collect::<Option<Vec<_>>>()
            .filter(|indices| indices.iter().all(|&i| i < u32::from(lanes)))
    })
}

fn build_aggregate(b: &mut FunctionBuilder, ty: IrType, members: &[Value]) -> Value {
    let mut aggregate = b.constant(Const::Zero(ty));
    for (i, &member) in members.iter().enumerate() {
        aggregate = b.insert(aggregate, member, i as u32);
    }
    aggregate
}

impl TypeTable {
    fn is_scalar(&self, t: TypeRef) -> bool {
        matches!(
            self.shape(t),
            TypeShape::Bool | TypeShape::Int | TypeShape::Float
        )
    }

    fn invalid_cast(&self, from: TypeRef, to: TypeRef) -> ErrorKind {
        ErrorKind::InvalidCast {
            from: self.name(from).to_owned(),
            to: self.name(to).to_owned(),
        }
    }

    pub fn can_cast_to(&self, from: TypeRef, to: TypeRef) -> Cast {
        if from == to || self[from] == self[to] {
            return Cast::IDENTITY;
        }
        match (self.shape(from), self.shape(to)) {
            (TypeShape::Bool, TypeShape::Int) => Cast::implicit(1),
            (TypeShape::Bool, TypeShape::Float) => Cast::implicit(2),
            (TypeShape::Int, TypeShape::Float) => Cast::implicit(1),
            (TypeShape::Float, TypeShape::Vector(_)) => Cast::implicit(2),
            (TypeShape::Array { base, .. }, TypeShape::ArrayRef { base: target })
                if base == target =>
            {
                Cast::implicit(1)
            }
            _ => Cast::ILLEGAL,
        }
    }

    /// Emit an implicit conversion of `tv` to `to`.
    pub fn gen_cast(
        &self,
        b: &mut FunctionBuilder,
        tv: TypedValue,
        to: TypeRef,
    ) -> Result<TypedValue, ErrorKind> {
        let cast = self.can_cast_to(tv.ty, to);
        if !cast.legal {
            return Err(self.invalid_cast(tv.ty, to));
        }
        if cast.cost == 0 {
            return Ok(TypedValue::new(tv.value, to));
        }
        let value = match (self.shape(tv.ty), self.shape(to)) {
            (TypeShape::Bool, TypeShape::Int) => b.cast(CastOp::BoolToInt, tv.value),
            (TypeShape::Bool, TypeShape::Float) => {
                let int = b.cast(CastOp::BoolToInt, tv.value);
                b.cast(CastOp::IntToFloat, int)
            }
            (TypeShape::Int, TypeShape::Float) => b.cast(CastOp::IntToFloat, tv.value),
            (TypeShape::Float, TypeShape::Vector(lanes)) => b.cast(CastOp::Splat(*lanes), tv.value),
            (TypeShape::Array { len, .. }, TypeShape::ArrayRef { .. }) => {
                let storage = b.alloca(self.ir_type(tv.ty));
                b.store(tv.value, storage);
                let view = b.constant(Const::Zero(array_ref_ir()));
                let view = b.insert(view, storage, 0);
                let len = b.i32_const(*len as i32);
                b.insert(view, len, 1)
            }
            _ => return Err(self.invalid_cast(tv.ty, to)),
        };
        Ok(TypedValue::new(value, to))
    }

    /// Conversion allowed in explicit construction such as `int(x)`.
    fn convert(
        &self,
        b: &mut FunctionBuilder,
        tv: TypedValue,
        to: TypeRef,
    ) -> Result<Value, ErrorKind> {
        if self.can_cast_to(tv.ty, to).legal {
            return self.gen_cast(b, tv, to).map(|v| v.value);
        }
        match (self.shape(tv.ty), self.shape(to)) {
            (TypeShape::Float, TypeShape::Int) => Ok(b.cast(CastOp::FloatToInt, tv.value)),
            (TypeShape::Int, TypeShape::Bool) => {
                let zero = b.i32_const(0);
                Ok(b.binary(BinOp::Ne, tv.value, zero))
            }
            (TypeShape::Float, TypeShape::Bool) => {
                let zero = b.f32_const(0.0);
                Ok(b.binary(BinOp::Ne, tv.value, zero))
            }
            _ => Err(self.invalid_cast(tv.ty, to)),
        }
    }

    fn convert_const(&self, value: &Const, from: TypeRef, to: TypeRef) -> Result<Const, ErrorKind> {
        if self.can_cast_to(from, to).cost == 0 {
            return Ok(value.clone());
        }
        let converted = match (value, self.shape(to)) {
            (Const::Bool(v), TypeShape::Int) => Const::I32(i32::from(*v)),
            (Const::Bool(v), TypeShape::Float) => Const::F32(if *v { 1.0 } else { 0.0 }),
            (Const::I32(v), TypeShape::Float) => Const::F32(*v as f32),
            (Const::I32(v), TypeShape::Bool) => Const::Bool(*v != 0),
            (Const::F32(v), TypeShape::Int) => Const::I32(*v as i32),
            (Const::F32(v), TypeShape::Bool) => Const::Bool(*v != 0.0),
            (Const::F32(v), TypeShape::Vector(lanes)) => {
                Const::Vector(vec![*v; usize::from(*lanes)])
            }
            _ => return Err(self.invalid_cast(from, to)),
        };
        Ok(converted)
    }

    /// Implicitly cast a constant, as `gen_cast` would at run time.
    pub fn cast_const(&self, value: &Const, from: TypeRef, to: TypeRef) -> Result<Const, ErrorKind> {
        let cast = self.can_cast_to(from, to);
        if !cast.legal {
            return Err(self.invalid_cast(from, to));
        }
        if matches!(self.shape(to), TypeShape::ArrayRef { .. }) && cast.cost > 0 {
            return Err(ErrorKind::NotConstant);
        }
        self.convert_const(value, from, to)
    }

    /// Native layout of values of `t`.
    pub fn ir_type(&self, t: TypeRef) -> IrType {
        match self.shape(t) {
            TypeShape::Void => IrType::Void,
            TypeShape::Bool => IrType::Bool,
            TypeShape::Int => IrType::I32,
            TypeShape::Float => IrType::F32,
            TypeShape::Vector(lanes) => IrType::Vector(*lanes),
            TypeShape::Ray => IrType::Opaque {
                size: abi::RAY_SIZE,
                align: 4,
            },
            TypeShape::Intersection => IrType::Opaque {
                size: abi::ISECT_SIZE,
                align: 4,
            },
            TypeShape::Light | TypeShape::Context | TypeShape::ScenePtr => IrType::Ptr,
            TypeShape::Dfunc => abi::dfunc_handle_type(),
            TypeShape::ShaderHandle => IrType::FnPtr,
            TypeShape::Array { base, len } => IrType::array(self.ir_type(*base), *len),
            TypeShape::ArrayRef { .. } => array_ref_ir(),
            TypeShape::Record { fields } => {
                IrType::Struct(fields.iter().map(|f| self.ir_type(f.ty)).collect())
            }
        }
    }

    /// Whether values of `t` hold runtime resources released by `destroy`.
    pub fn owns_resources(&self, t: TypeRef) -> bool {
        match self.shape(t) {
            TypeShape::Dfunc => true,
            TypeShape::Array { base, .. } => self.owns_resources(*base),
            TypeShape::Record { fields } => fields.iter().any(|f| self.owns_resources(f.ty)),
            _ => false,
        }
    }

    fn has_default(&self, t: TypeRef) -> bool {
        match self.shape(t) {
            TypeShape::Bool | TypeShape::Int | TypeShape::Float | TypeShape::Vector(_) => true,
            TypeShape::Array { base, .. } => self.has_default(*base),
            TypeShape::Record { fields } => fields.iter().all(|f| self.has_default(f.ty)),
            _ => false,
        }
    }

    pub fn allocate(&self, b: &mut FunctionBuilder, t: TypeRef) -> Value {
        b.alloca(self.ir_type(t))
    }

    pub fn load(&self, b: &mut FunctionBuilder, t: TypeRef, ptr: Value) -> TypedValue {
        TypedValue::new(b.load(self.ir_type(t), ptr), t)
    }

    pub fn store(&self, b: &mut FunctionBuilder, tv: TypedValue, ptr: Value) {
        b.store(tv.value, ptr);
    }

    /// The default value of `t`, if it has one.
    pub fn initialize(&self, b: &mut FunctionBuilder, t: TypeRef) -> Result<TypedValue, ErrorKind> {
        self.initial_const(t)
            .map(|init| TypedValue::new(b.constant(init), t))
    }

    pub fn initial_const(&self, t: TypeRef) -> Result<Const, ErrorKind> {
        if !self.has_default(t) {
            return Err(ErrorKind::NoDefault(self.name(t).to_owned()));
        }
        Ok(Const::Zero(self.ir_type(t)))
    }

    /// Duplicate a value; resource handles are retained through the runtime.
    pub fn copy(&self, b: &mut FunctionBuilder, tv: TypedValue) -> TypedValue {
        if !self.owns_resources(tv.ty) {
            return tv;
        }
        let value = match self.shape(tv.ty) {
            TypeShape::Dfunc => {
                let handle = abi::dfunc_handle_type();
                let src = b.alloca(handle.clone());
                b.store(tv.value, src);
                let dst = b.alloca(handle.clone());
                b.call_extern(COPY_DFUNC, abi::copy_dfunc_signature(), vec![src, dst]);
                b.load(handle, dst)
            }
            TypeShape::Array { base, len } => {
                let mut aggregate = tv.value;
                for i in 0..*len {
                    let element = b.extract(aggregate, i);
                    let copied = self.copy(b, TypedValue::new(element, *base));
                    aggregate = b.insert(aggregate, copied.value, i);
                }
                aggregate
            }
            TypeShape::Record { fields } => {
                let mut aggregate = tv.value;
                for (i, field) in fields.iter().enumerate() {
                    let member = b.extract(aggregate, i as u32);
                    let copied = self.copy(b, TypedValue::new(member, field.ty));
                    aggregate = b.insert(aggregate, copied.value, i as u32);
                }
                aggregate
            }
            _ => tv.value,
        };
        TypedValue::new(value, tv.ty)
    }

    /// Release the resources held by a value.
    pub fn destroy(&self, b: &mut FunctionBuilder, tv: TypedValue) {
        if !self.owns_resources(tv.ty) {
            return;
        }
        let slot = self.allocate(b, tv.ty);
        b.store(tv.value, slot);
        self.destroy_ptr(b, tv.ty, slot);
    }

    /// Release the resources held by the value of type `t` stored at `ptr`.
    pub fn destroy_ptr(&self, b: &mut FunctionBuilder, t: TypeRef, ptr: Value) {
        match self.shape(t) {
            TypeShape::Dfunc => {
                b.call_extern(DESTROY_DFUNC, abi::destroy_dfunc_signature(), vec![ptr]);
            }
            TypeShape::Array { base, len } if self.owns_resources(*base) => {
                let ir = self.ir_type(t);
                for i in 0..*len {
                    let element = b.member_ptr(ir.clone(), ptr, i);
                    self.destroy_ptr(b, *base, element);
                }
            }
            TypeShape::Record { fields } => {
                let ir = self.ir_type(t);
                for (i, field) in fields.iter().enumerate() {
                    if self.owns_resources(field.ty) {
                        let member = b.member_ptr(ir.clone(), ptr, i as u32);
                        self.destroy_ptr(b, field.ty, member);
                    }
                }
            }
            _ => {}
        }
    }

    fn construction(&self, t: TypeRef, argc: usize) -> Result<Construction, ErrorKind> {
        Ok(match self.shape(t) {
            TypeShape::Bool | TypeShape::Int | TypeShape::Float => Construction::Scalar,
            TypeShape::Vector(lanes) if argc == 1 => Construction::Splat(*lanes),
            TypeShape::Vector(lanes) => Construction::Aggregate(vec![TYPE_FLOAT; usize::from(*lanes)]),
            TypeShape::Array { base, len } => Construction::Aggregate(vec![*base; *len as usize]),
            TypeShape::Record { fields } => {
                Construction::Aggregate(fields.iter().map(|f| f.ty).collect())
            }
            TypeShape::Dfunc => {
                Construction::Exact(vec![TYPE_SHADER_HANDLE, TYPE_RAY, TYPE_VEC2, TYPE_ISECT])
            }
            _ => return Err(ErrorKind::NotConstructible(self.name(t).to_owned())),
        })
    }

    fn argument_mismatch(&self, index: usize, expected: TypeRef, found: TypeRef) -> ErrorKind {
        ErrorKind::ArgumentTypeMismatch {
            index,
            expected: self.name(expected).to_owned(),
            found: self.name(found).to_owned(),
        }
    }

    fn check_count(&self, t: TypeRef, expected: usize, found: usize) -> Result<(), ErrorKind> {
        if expected != found {
            return Err(ErrorKind::ArgumentCountMismatch {
                ty: self.name(t).to_owned(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Validate an argument list for constructing `t` without emitting code.
    pub fn check_create(&self, t: TypeRef, args: &[TypeRef]) -> Result<(), ErrorKind> {
        match self.construction(t, args.len())? {
            Construction::Scalar => {
                self.check_count(t, 1, args.len())?;
                if !self.is_scalar(args[0]) {
                    return Err(self.argument_mismatch(0, t, args[0]));
                }
            }
            Construction::Splat(_) => {
                if !self.can_cast_to(args[0], TYPE_FLOAT).legal {
                    return Err(self.argument_mismatch(0, TYPE_FLOAT, args[0]));
                }
            }
            Construction::Aggregate(expected) => {
                self.check_count(t, expected.len(), args.len())?;
                for (i, (&want, &found)) in expected.iter().zip(args).enumerate() {
                    if !self.can_cast_to(found, want).legal {
                        return Err(self.argument_mismatch(i, want, found));
                    }
                }
            }
            Construction::Exact(expected) => {
                self.check_count(t, expected.len(), args.len())?;
                for (i, (&want, &found)) in expected.iter().zip(args).enumerate() {
                    if self[want] != self[found] {
                        return Err(self.argument_mismatch(i, want, found));
                    }
                }
            }
        }
        Ok(())
    }

    /// Construct a value of `t` from `args`.
    pub fn create(
        &self,
        b: &mut FunctionBuilder,
        t: TypeRef,
        args: &[TypedValue],
    ) -> Result<TypedValue, ErrorKind> {
        let arg_types: Vec<_> = args.iter().map(|a| a.ty).collect();
        self.check_create(t, &arg_types)?;

        let value = match self.construction(t, args.len())? {
            Construction::Scalar => self.convert(b, args[0], t)?,
            Construction::Splat(lanes) => {
                let scalar = self.gen_cast(b, args[0], TYPE_FLOAT)?;
                b.cast(CastOp::Splat(lanes), scalar.value)
            }
            Construction::Aggregate(expected) => {
                let members = expected
                    .iter()
                    .zip(args)
                    .map(|(&want, &arg)| self.gen_cast(b, arg, want).map(|v| v.value))
                    .collect::<Result<Vec<_>, _>>()?;
                build_aggregate(b, self.ir_type(t), &members)
            }
            Construction::Exact(_) => {
                let shader = args[0].value;
                let inputs = args[1..].iter().map(|a| a.value).collect();
                b.call_indirect(shader, self.ir_type(t), inputs)
                    .ok_or_else(|| ErrorKind::NotConstructible(self.name(t).to_owned()))?
            }
        };
        Ok(TypedValue::new(value, t))
    }

    /// Construct a compile-time constant of `t`.
    pub fn create_const(&self, t: TypeRef, args: &[(Const, TypeRef)]) -> Result<Const, ErrorKind> {
        let arg_types: Vec<_> = args.iter().map(|(_, ty)| *ty).collect();
        self.check_create(t, &arg_types)?;

        match self.construction(t, args.len())? {
            Construction::Scalar => self.convert_const(&args[0].0, args[0].1, t),
            Construction::Splat(lanes) => match self.cast_const(&args[0].0, args[0].1, TYPE_FLOAT)? {
                Const::F32(v) => Ok(Const::Vector(vec![v; usize::from(lanes)])),
                _ => Err(ErrorKind::NotConstant),
            },
            Construction::Aggregate(expected) => {
                let members = expected
                    .iter()
                    .zip(args)
                    .map(|(&want, (value, ty))| self.cast_const(value, *ty, want))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match self.shape(t) {
                    TypeShape::Vector(_) => Const::Vector(
                        members
                            .iter()
                            .map(|m| match m {
                                Const::F32(v) => *v,
                                _ => 0.0,
                            })
                            .collect(),
                    ),
                    TypeShape::Array { base, .. } => Const::Array(self.ir_type(*base), members),
                    _ => Const::Struct(members),
                })
            }
            Construction::Exact(_) => Err(ErrorKind::NotConstant),
        }
    }

    fn resolve_field(&self, t: TypeRef, name: &str) -> Result<(FieldAccess, TypeRef), ErrorKind> {
        let found = match self.shape(t) {
            TypeShape::Vector(lanes) => swizzle(name, *lanes).and_then(|indices| {
                if let [lane] = indices[..] {
                    Some((FieldAccess::Lane(lane), TYPE_FLOAT))
                } else {
                    vector_type(indices.len()).map(|ty| (FieldAccess::Swizzle(indices), ty))
                }
            }),
            TypeShape::Record { fields } => fields
                .iter()
                .position(|f| f.name == name)
                .map(|i| (FieldAccess::Member(i as u32), fields[i].ty)),
            TypeShape::Array { len, .. } if name == "length" => {
                Some((FieldAccess::ArrayLength(*len), TYPE_INT))
            }
            TypeShape::ArrayRef { .. } if name == "length" => Some((FieldAccess::RefLength, TYPE_INT)),
            _ => None,
        };
        found.ok_or_else(|| ErrorKind::NoSuchField {
            ty: self.name(t).to_owned(),
            field: name.to_owned(),
        })
    }

    pub fn field_type(&self, t: TypeRef, name: &str) -> Result<TypeRef, ErrorKind> {
        self.resolve_field(t, name).map(|(_, ty)| ty)
    }

    /// Read a named sub-value.
    pub fn access_field(
        &self,
        b: &mut FunctionBuilder,
        tv: TypedValue,
        name: &str,
    ) -> Result<TypedValue, ErrorKind> {
        let (access, ty) = self.resolve_field(tv.ty, name)?;
        let value = match access {
            FieldAccess::Lane(index) | FieldAccess::Member(index) => b.extract(tv.value, index),
            FieldAccess::Swizzle(lanes) => {
                let picked: Vec<_> = lanes.iter().map(|&l| b.extract(tv.value, l)).collect();
                build_aggregate(b, self.ir_type(ty), &picked)
            }
            FieldAccess::ArrayLength(len) => b.i32_const(len as i32),
            FieldAccess::RefLength => b.extract(tv.value, 1),
        };
        Ok(TypedValue::new(value, ty))
    }

    /// Address of a named sub-value of the `t` stored at `ptr`.
    pub fn access_field_ptr(
        &self,
        b: &mut FunctionBuilder,
        t: TypeRef,
        ptr: Value,
        name: &str,
    ) -> Result<TypedValue, ErrorKind> {
        let (access, ty) = self.resolve_field(t, name)?;
        match access {
            FieldAccess::Lane(index) | FieldAccess::Member(index) => {
                Ok(TypedValue::new(b.member_ptr(self.ir_type(t), ptr, index), ty))
            }
            FieldAccess::Swizzle(_) | FieldAccess::ArrayLength(_) | FieldAccess::RefLength => {
                Err(ErrorKind::NotAssignable)
            }
        }
    }

    pub fn element_type(&self, t: TypeRef) -> Result<TypeRef, ErrorKind> {
        match self.shape(t) {
            TypeShape::Array { base, .. } | TypeShape::ArrayRef { base } => Ok(*base),
            _ => Err(ErrorKind::NotIndexable(self.name(t).to_owned())),
        }
    }

    pub fn check_index(&self, index: TypeRef) -> Result<(), ErrorKind> {
        if index != TYPE_INT {
            return Err(ErrorKind::InvalidIndex(self.name(index).to_owned()));
        }
        Ok(())
    }

    /// Read the element at `index`.
    pub fn access_element(
        &self,
        b: &mut FunctionBuilder,
        tv: TypedValue,
        index: TypedValue,
    ) -> Result<TypedValue, ErrorKind> {
        let base = self.element_type(tv.ty)?;
        self.check_index(index.ty)?;
        let data = match self.shape(tv.ty) {
            TypeShape::ArrayRef { .. } => b.extract(tv.value, 0),
            _ => {
                let slot = self.allocate(b, tv.ty);
                b.store(tv.value, slot);
                slot
            }
        };
        let element = b.element_ptr(self.ir_type(base), data, index.value);
        Ok(self.load(b, base, element))
    }

    /// Address of the element at `index` of the `t` stored at `ptr`.
    pub fn access_element_ptr(
        &self,
        b: &mut FunctionBuilder,
        t: TypeRef,
        ptr: Value,
        index: TypedValue,
    ) -> Result<TypedValue, ErrorKind> {
        let base = self.element_type(t)?;
        self.check_index(index.ty)?;
        let data = match self.shape(t) {
            TypeShape::ArrayRef { .. } => {
                let view = b.load(array_ref_ir(), ptr);
                b.extract(view, 0)
            }
            _ => ptr,
        };
        let element = b.element_ptr(self.ir_type(base), data, index.value);
        Ok(TypedValue::new(element, base))
    }
}
