use crate::{BinOp, CastOp, Const, FunctionBuilder, Inst, IrType, Linkage, Signature};

fn builder(params: Vec<IrType>, ret: IrType) -> FunctionBuilder {
    FunctionBuilder::new("f", Signature::new(params, ret), Linkage::External)
}

#[test]
fn params_occupy_first_registers() {
    let mut b = builder(vec![IrType::F32, IrType::Ptr], IrType::Void);
    let c = b.f32_const(1.0);

    assert_eq!(b.param(0).index(), 0);
    assert_eq!(b.param(1).index(), 1);
    assert_eq!(c.index(), 2);
    assert_eq!(b.value_type(b.param(1)), &IrType::Ptr);
}

#[test]
fn result_types_are_inferred() {
    let mut b = builder(vec![IrType::Vector(3)], IrType::Void);
    let v = b.param(0);
    let lane = b.extract(v, 1);
    let scaled = b.binary(BinOp::Mul, lane, lane);
    let cmp = b.binary(BinOp::Lt, lane, scaled);
    let splat = b.cast(CastOp::Splat(3), scaled);

    assert_eq!(b.value_type(lane), &IrType::F32);
    assert_eq!(b.value_type(scaled), &IrType::F32);
    assert_eq!(b.value_type(cmp), &IrType::Bool);
    assert_eq!(b.value_type(splat), &IrType::Vector(3));
}

#[test]
fn void_function_gets_implicit_return() {
    let b = builder(vec![], IrType::Void);
    let f = b.finish();

    assert_eq!(f.body, vec![Inst::Return { value: None }]);
}

#[test]
fn instructions_after_return_are_dropped() {
    let mut b = builder(vec![], IrType::I32);
    let one = b.i32_const(1);
    b.ret(Some(one));
    b.i32_const(2);

    assert!(b.is_terminated());
    let f = b.finish();
    assert_eq!(f.body.len(), 2);
}

#[test]
fn extern_calls_are_recorded() {
    let mut b = builder(vec![IrType::Ptr], IrType::Void);
    let ptr = b.param(0);
    let sig = Signature::new(vec![IrType::Ptr], IrType::Void);
    let result = b.call_extern("host_free", sig.clone(), vec![ptr]);

    assert_eq!(result, None);
    let f = b.finish();
    assert_eq!(f.externs.get("host_free"), Some(&sig));
}

#[test]
fn constants_keep_their_type() {
    let mut b = builder(vec![], IrType::Void);
    let v = b.constant(Const::Vector(vec![1.0, 0.0, 0.0]));
    let z = b.constant(Const::Zero(IrType::array(IrType::F32, 2)));

    assert_eq!(b.value_type(v), &IrType::Vector(3));
    assert_eq!(b.value_type(z), &IrType::array(IrType::F32, 2));
}
