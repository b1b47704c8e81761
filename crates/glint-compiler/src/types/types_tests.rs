use glint_ir::dump::dump_function;
use glint_ir::{Const, FunctionBuilder, IrType, Linkage, Signature};

use crate::diagnostics::ErrorKind;

use super::{
    Cast, Field, Type, TYPE_BOOL, TYPE_DFUNC, TYPE_FLOAT, TYPE_INT, TYPE_ISECT, TYPE_RAY,
    TYPE_SHADER_HANDLE, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4, TypeShape, TypeTable, TypedValue,
};

fn builder(params: Vec<IrType>, ret: IrType) -> FunctionBuilder {
    FunctionBuilder::new("f", Signature::new(params, ret), Linkage::External)
}

fn render(b: FunctionBuilder) -> String {
    let mut out = String::new();
    dump_function(&mut out, &b.finish());
    out
}

#[test]
fn builtins_resolve_by_name() {
    let types = TypeTable::new();

    assert_eq!(types.lookup("vec3").unwrap(), TYPE_VEC3);
    assert_eq!(types.lookup("dfunc").unwrap(), TYPE_DFUNC);
    assert_eq!(types[TYPE_DFUNC].type_id(), "dist");
    assert!(types[TYPE_FLOAT].is_differentiable());
    assert!(!types[TYPE_INT].is_differentiable());
}

#[test]
fn unknown_type() {
    let types = TypeTable::new();

    let err = types.lookup("mat4").unwrap_err();
    insta::assert_snapshot!(err, @"unknown type `mat4`");
}

#[test]
fn array_types_are_identity_stable() {
    let mut types = TypeTable::new();

    let a = types.array_of(TYPE_FLOAT, 3);
    let b = types.array_of(TYPE_FLOAT, 3);
    let c = types.array_of(TYPE_FLOAT, 4);
    let before = types.len();
    let again = types.array_of(TYPE_FLOAT, 3);

    assert_eq!(a, b);
    assert_eq!(a, again);
    assert_ne!(a, c);
    assert_eq!(types.len(), before);
    assert_eq!(types.name(a), "float[3]");
    assert_eq!(types.array_ref_of(TYPE_FLOAT), types.array_ref_of(TYPE_FLOAT));
    let view = types.array_ref_of(TYPE_VEC2);
    assert_eq!(types.name(view), "vec2[]");
}

#[test]
fn rollback_forgets_later_types() {
    let mut types = TypeTable::new();
    let kept = types.array_of(TYPE_FLOAT, 2);
    let checkpoint = types.checkpoint();
    let before = types.len();

    types.array_of(TYPE_FLOAT, 8);
    types.array_ref_of(TYPE_VEC3);
    let field = vec![Field { name: "k".into(), ty: TYPE_FLOAT }];
    types.register_nameless(Type::record("blk", "global.blk", field));
    types.rollback(checkpoint);

    assert_eq!(types.len(), before);
    assert!(types.nameless().is_empty());
    assert_eq!(types.array_of(TYPE_FLOAT, 2), kept);
    let again = types.array_of(TYPE_FLOAT, 8);
    assert_eq!(types.name(again), "float[8]");
    assert_eq!(again.index(), before);
}

#[test]
fn cast_cost_is_zero_exactly_for_identity() {
    let mut types = TypeTable::new();
    types.array_of(TYPE_FLOAT, 2);
    types.array_ref_of(TYPE_FLOAT);
    let all: Vec<_> = types.iter().map(|(id, _)| id).collect();

    for &from in &all {
        for &to in &all {
            let cast = types.can_cast_to(from, to);
            assert_eq!(cast.cost == 0, from == to, "{} -> {}", types.name(from), types.name(to));
            if !cast.legal {
                assert_eq!(cast, Cast::ILLEGAL);
            }
        }
    }
}

#[test]
fn cast_costs_rank_promotions() {
    let mut types = TypeTable::new();
    let floats = types.array_of(TYPE_FLOAT, 2);
    let view = types.array_ref_of(TYPE_FLOAT);
    let ints = types.array_ref_of(TYPE_INT);

    let int_to_float = types.can_cast_to(TYPE_INT, TYPE_FLOAT);
    let bool_to_float = types.can_cast_to(TYPE_BOOL, TYPE_FLOAT);
    assert!(int_to_float.legal);
    assert!(int_to_float.cost < bool_to_float.cost);
    assert!(types.can_cast_to(TYPE_FLOAT, TYPE_VEC3).legal);
    assert!(types.can_cast_to(floats, view).legal);

    assert!(!types.can_cast_to(TYPE_FLOAT, TYPE_INT).legal);
    assert!(!types.can_cast_to(TYPE_VEC3, TYPE_VEC4).legal);
    assert!(!types.can_cast_to(floats, ints).legal);
    assert!(bool_to_float.cost < Cast::ILLEGAL.cost);
}

#[test]
fn records_with_equal_ids_are_the_same_type() {
    let mut types = TypeTable::new();
    let field = || vec![Field { name: "k".into(), ty: TYPE_FLOAT }];
    let a = types.register_nameless(Type::record("a", "blk", field()));
    let b = types.register_nameless(Type::record("b", "blk", field()));

    assert_eq!(types.can_cast_to(a, b), Cast::IDENTITY);
    assert_eq!(types.nameless(), &[a, b]);
}

#[test]
fn bool_to_float_goes_through_int() {
    let types = TypeTable::new();
    let mut b = builder(vec![IrType::Bool], IrType::F32);
    let flag = TypedValue::new(b.param(0), TYPE_BOOL);

    let cast = types.gen_cast(&mut b, flag, TYPE_FLOAT).unwrap();
    assert_eq!(cast.ty, TYPE_FLOAT);
    b.ret(Some(cast.value));

    insta::assert_snapshot!(render(b), @r"
    fn external @f(%0: bool) -> f32 {
      %1 = zext %0
      %2 = sitofp %1
      ret %2
    }
    ");
}

#[test]
fn illegal_cast_is_reported() {
    let types = TypeTable::new();
    let mut b = builder(vec![IrType::Vector(3)], IrType::F32);
    let v = TypedValue::new(b.param(0), TYPE_VEC3);

    let err = types.gen_cast(&mut b, v, TYPE_FLOAT).unwrap_err();
    insta::assert_snapshot!(err, @"cannot convert `vec3` to `float`");
}

#[test]
fn native_layout() {
    let mut types = TypeTable::new();
    let arr = types.array_of(TYPE_VEC3, 2);
    let view = types.array_ref_of(TYPE_VEC3);

    assert_eq!(types.ir_type(TYPE_RAY).size(), 32);
    assert_eq!(types.ir_type(TYPE_ISECT).size(), 64);
    assert_eq!(types.ir_type(TYPE_DFUNC).size(), 8);
    assert_eq!(types.ir_type(TYPE_SHADER_HANDLE), IrType::FnPtr);
    assert_eq!(types.ir_type(arr).size(), 24);
    assert_eq!(types.ir_type(view).to_string(), "{ptr, i32}");
}

#[test]
fn resource_ownership_propagates_through_aggregates() {
    let mut types = TypeTable::new();
    let dists = types.array_of(TYPE_DFUNC, 2);
    let floats = types.array_of(TYPE_FLOAT, 2);
    let block = types.register_nameless(Type::record(
        "blk",
        "blk",
        vec![
            Field { name: "k".into(), ty: TYPE_FLOAT },
            Field { name: "inner".into(), ty: TYPE_DFUNC },
        ],
    ));

    assert!(types.owns_resources(TYPE_DFUNC));
    assert!(types.owns_resources(dists));
    assert!(types.owns_resources(block));
    assert!(!types.owns_resources(floats));
    assert!(!types.owns_resources(TYPE_VEC3));
}

#[test]
fn defaults() {
    let mut types = TypeTable::new();
    let floats = types.array_of(TYPE_FLOAT, 3);

    assert_eq!(types.initial_const(floats).unwrap(), Const::Zero(IrType::array(IrType::F32, 3)));
    let err = types.initial_const(TYPE_DFUNC).unwrap_err();
    insta::assert_snapshot!(err, @"type `dfunc` has no default value");
    assert_eq!(types.initial_const(TYPE_RAY).unwrap_err(), ErrorKind::NoDefault("ray".into()));
}

#[test]
fn destroying_a_scalar_block_emits_nothing() {
    let types = TypeTable::new();
    let mut b = builder(vec![IrType::Ptr], IrType::Void);
    let ptr = b.param(0);

    types.destroy_ptr(&mut b, TYPE_VEC3, ptr);

    insta::assert_snapshot!(render(b), @r"
    fn external @f(%0: ptr) -> void {
      ret
    }
    ");
}

#[test]
fn destroying_a_handle_calls_the_runtime() {
    let mut types = TypeTable::new();
    let pair = types.array_of(TYPE_DFUNC, 2);
    let mut b = builder(vec![IrType::Ptr], IrType::Void);
    let ptr = b.param(0);

    types.destroy_ptr(&mut b, pair, ptr);

    insta::assert_snapshot!(render(b), @r"
    fn external @f(%0: ptr) -> void {
      %1 = member [opaque(8, 8) x 2], %0, 0
      call @gd_builtin_destroy_dfunc(%1)
      %2 = member [opaque(8, 8) x 2], %0, 1
      call @gd_builtin_destroy_dfunc(%2)
      ret
    }
    ");
}

#[test]
fn construction_checks_arguments() {
    let types = TypeTable::new();

    types.check_create(TYPE_VEC3, &[TYPE_FLOAT, TYPE_INT, TYPE_BOOL]).unwrap();
    types.check_create(TYPE_VEC3, &[TYPE_INT]).unwrap();
    types.check_create(TYPE_INT, &[TYPE_FLOAT]).unwrap();

    let err = types.check_create(TYPE_VEC3, &[TYPE_FLOAT, TYPE_FLOAT]).unwrap_err();
    insta::assert_snapshot!(err, @"`vec3` expects 3 arguments, found 2");

    let err = types
        .check_create(TYPE_DFUNC, &[TYPE_SHADER_HANDLE, TYPE_RAY, TYPE_VEC3, TYPE_ISECT])
        .unwrap_err();
    insta::assert_snapshot!(err, @"argument 2: expected type `vec2`, found `vec3`");

    let err = types.check_create(TYPE_RAY, &[]).unwrap_err();
    assert_eq!(err, ErrorKind::NotConstructible("ray".into()));
}

#[test]
fn constant_construction() {
    let mut types = TypeTable::new();
    let floats = types.array_of(TYPE_FLOAT, 2);

    let splat = types.create_const(TYPE_VEC3, &[(Const::I32(2), TYPE_INT)]).unwrap();
    assert_eq!(splat, Const::Vector(vec![2.0, 2.0, 2.0]));

    let arr = types
        .create_const(floats, &[(Const::F32(0.5), TYPE_FLOAT), (Const::I32(1), TYPE_INT)])
        .unwrap();
    assert_eq!(arr, Const::Array(IrType::F32, vec![Const::F32(0.5), Const::F32(1.0)]));

    let truncated = types.create_const(TYPE_INT, &[(Const::F32(2.75), TYPE_FLOAT)]).unwrap();
    assert_eq!(truncated, Const::I32(2));
}

#[test]
fn vector_fields() {
    let types = TypeTable::new();

    assert_eq!(types.field_type(TYPE_VEC3, "y").unwrap(), TYPE_FLOAT);
    assert_eq!(types.field_type(TYPE_VEC4, "xy").unwrap(), TYPE_VEC2);
    assert_eq!(types.field_type(TYPE_VEC4, "bgr").unwrap(), TYPE_VEC3);

    let err = types.field_type(TYPE_VEC3, "w").unwrap_err();
    insta::assert_snapshot!(err, @"type `vec3` has no field `w`");
    assert!(types.field_type(TYPE_VEC3, "xg").is_err());
    assert!(types.field_type(TYPE_FLOAT, "x").is_err());
}

#[test]
fn swizzle_reads_lanes_in_order() {
    let types = TypeTable::new();
    let mut b = builder(vec![IrType::Vector(3)], IrType::Vector(2));
    let v = TypedValue::new(b.param(0), TYPE_VEC3);

    let zy = types.access_field(&mut b, v, "zy").unwrap();
    b.ret(Some(zy.value));

    insta::assert_snapshot!(render(b), @r"
    fn external @f(%0: vec3) -> vec2 {
      %1 = extract %0, 2
      %2 = extract %0, 1
      %3 = const zero vec2
      %4 = insert %3, %1, 0
      %5 = insert %4, %2, 1
      ret %5
    }
    ");
}

#[test]
fn swizzles_are_not_assignable() {
    let types = TypeTable::new();
    let mut b = builder(vec![IrType::Ptr], IrType::Void);
    let ptr = b.param(0);

    let lane = types.access_field_ptr(&mut b, TYPE_VEC3, ptr, "z").unwrap();
    assert_eq!(lane.ty, TYPE_FLOAT);
    let err = types.access_field_ptr(&mut b, TYPE_VEC3, ptr, "xy").unwrap_err();
    assert_eq!(err, ErrorKind::NotAssignable);
}

#[test]
fn element_access() {
    let mut types = TypeTable::new();
    let arr = types.array_of(TYPE_VEC2, 4);

    assert_eq!(types.element_type(arr).unwrap(), TYPE_VEC2);
    assert_eq!(types.field_type(arr, "length").unwrap(), TYPE_INT);

    let err = types.element_type(TYPE_VEC3).unwrap_err();
    insta::assert_snapshot!(err, @"type `vec3` cannot be indexed");
    let err = types.check_index(TYPE_FLOAT).unwrap_err();
    insta::assert_snapshot!(err, @"index must be `int`, found `float`");
}

#[test]
fn record_shape_keeps_field_order() {
    let mut types = TypeTable::new();
    let block = types.register_nameless(Type::record(
        "lambert_params_t",
        "global.lambert_params_t",
        vec![
            Field { name: "sigma".into(), ty: TYPE_FLOAT },
            Field { name: "tint".into(), ty: TYPE_VEC3 },
        ],
    ));

    let TypeShape::Record { fields } = types.shape(block) else {
        panic!("expected a record");
    };
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["sigma", "tint"]);
    assert_eq!(types.field_type(block, "tint").unwrap(), TYPE_VEC3);
    assert_eq!(types.ir_type(block).to_string(), "{f32, vec3}");
}
