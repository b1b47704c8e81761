use crate::IrType;

#[test]
fn scalar_layout() {
    assert_eq!(IrType::Bool.size(), 1);
    assert_eq!(IrType::I32.size(), 4);
    assert_eq!(IrType::F32.align(), 4);
    assert_eq!(IrType::Ptr.size(), 8);
    assert_eq!(IrType::Void.size(), 0);
}

#[test]
fn vector_lanes() {
    let vec3 = IrType::Vector(3);
    assert_eq!(vec3.size(), 12);
    assert_eq!(vec3.member_count(), Some(3));
    assert_eq!(vec3.member_offset(2), Some(8));
    assert_eq!(vec3.member_type(2), Some(IrType::F32));
    assert_eq!(vec3.member_type(3), None);
}

#[test]
fn struct_members_are_aligned() {
    let ty = IrType::Struct(vec![IrType::Bool, IrType::F32, IrType::Ptr, IrType::Bool]);

    assert_eq!(ty.member_offset(0), Some(0));
    assert_eq!(ty.member_offset(1), Some(4));
    assert_eq!(ty.member_offset(2), Some(8));
    assert_eq!(ty.member_offset(3), Some(16));
    assert_eq!(ty.align(), 8);
    assert_eq!(ty.size(), 24);
}

#[test]
fn param_block_layout() {
    let block = IrType::Struct(vec![IrType::F32, IrType::Vector(3)]);

    assert_eq!(block.size(), 16);
    assert_eq!(block.member_offset(1), Some(4));
}

#[test]
fn array_stride() {
    let ty = IrType::array(IrType::Vector(3), 4);

    assert_eq!(ty.size(), 48);
    assert_eq!(ty.member_offset(3), Some(36));
    assert_eq!(ty.member_type(4), None);
}

#[test]
fn display() {
    let ty = IrType::Struct(vec![
        IrType::F32,
        IrType::array(IrType::I32, 2),
        IrType::Opaque { size: 8, align: 8 },
    ]);
    assert_eq!(ty.to_string(), "{f32, [i32 x 2], opaque(8, 8)}");
}
