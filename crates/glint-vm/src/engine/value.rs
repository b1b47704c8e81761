//! Runtime values and their byte encoding.

use glint_ir::{Const, IrType};

use super::error::RuntimeError;

/// A register value.
///
/// Pointers are opaque 64-bit addresses into the VM's memory. Function
/// pointers are symbol ids; zero is the null function pointer.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    I32(i32),
    F32(f32),
    Vector(Vec<f32>),
    Ptr(u64),
    FnPtr(u32),
    Array(Vec<Value>),
    Struct(Vec<Value>),
    Opaque(Vec<u8>),
}

impl Value {
    /// The all-zero value of `ty`.
    pub fn zero(ty: &IrType) -> Self {
        match ty {
            IrType::Void => Self::Void,
            IrType::Bool => Self::Bool(false),
            IrType::I32 => Self::I32(0),
            IrType::F32 => Self::F32(0.0),
            IrType::Vector(lanes) => Self::Vector(vec![0.0; usize::from(*lanes)]),
            IrType::Ptr => Self::Ptr(0),
            IrType::FnPtr => Self::FnPtr(0),
            IrType::Opaque { size, .. } => Self::Opaque(vec![0; *size as usize]),
            IrType::Array(elem, len) => Self::Array(vec![Self::zero(elem); *len as usize]),
            IrType::Struct(fields) => Self::Struct(fields.iter().map(Self::zero).collect()),
        }
    }

    pub(crate) fn from_const(value: &Const) -> Self {
        match value {
            Const::Bool(v) => Self::Bool(*v),
            Const::I32(v) => Self::I32(*v),
            Const::F32(v) => Self::F32(*v),
            Const::Vector(lanes) => Self::Vector(lanes.clone()),
            Const::Array(_, items) => Self::Array(items.iter().map(Self::from_const).collect()),
            Const::Struct(fields) => Self::Struct(fields.iter().map(Self::from_const).collect()),
            Const::Null => Self::Ptr(0),
            Const::Zero(ty) => Self::zero(ty),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::F32(_) => "f32",
            Self::Vector(_) => "vector",
            Self::Ptr(_) => "ptr",
            Self::FnPtr(_) => "fnptr",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Opaque(_) => "opaque",
        }
    }

    fn mismatch(&self, expected: impl ToString) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected: expected.to_string(),
            found: self.kind().to_owned(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_i32(&self) -> Result<i32, RuntimeError> {
        match self {
            Self::I32(v) => Ok(*v),
            other => Err(other.mismatch("i32")),
        }
    }

    pub fn as_f32(&self) -> Result<f32, RuntimeError> {
        match self {
            Self::F32(v) => Ok(*v),
            other => Err(other.mismatch("f32")),
        }
    }

    pub fn as_ptr(&self) -> Result<u64, RuntimeError> {
        match self {
            Self::Ptr(v) => Ok(*v),
            other => Err(other.mismatch("ptr")),
        }
    }

    pub fn as_fn(&self) -> Result<u32, RuntimeError> {
        match self {
            Self::FnPtr(v) => Ok(*v),
            other => Err(other.mismatch("fnptr")),
        }
    }

    pub fn as_lanes(&self) -> Result<&[f32], RuntimeError> {
        match self {
            Self::Vector(lanes) => Ok(lanes),
            other => Err(other.mismatch("vector")),
        }
    }

    /// Decode a value of type `ty` from `bytes`, which must be `ty.size()` long.
    pub(crate) fn decode(ty: &IrType, bytes: &[u8]) -> Self {
        match ty {
            IrType::Void => Self::Void,
            IrType::Bool => Self::Bool(bytes[0] != 0),
            IrType::I32 => Self::I32(i32::from_le_bytes(word(bytes))),
            IrType::F32 => Self::F32(f32::from_le_bytes(word(bytes))),
            IrType::Vector(lanes) => Self::Vector(
                (0..usize::from(*lanes))
                    .map(|i| f32::from_le_bytes(word(&bytes[4 * i..])))
                    .collect(),
            ),
            IrType::Ptr => Self::Ptr(u64::from_le_bytes(dword(bytes))),
            IrType::FnPtr => Self::FnPtr(u64::from_le_bytes(dword(bytes)) as u32),
            IrType::Opaque { size, .. } => Self::Opaque(bytes[..*size as usize].to_vec()),
            IrType::Array(elem, len) => {
                let stride = elem.stride() as usize;
                let size = elem.size() as usize;
                Self::Array(
                    (0..*len as usize)
                        .map(|i| Self::decode(elem, &bytes[i * stride..i * stride + size]))
                        .collect(),
                )
            }
            IrType::Struct(fields) => Self::Struct(
                fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        let offset = ty.member_offset(i as u32).unwrap_or(0) as usize;
                        Self::decode(field, &bytes[offset..offset + field.size() as usize])
                    })
                    .collect(),
            ),
        }
    }

    /// Encode `self` as type `ty` into `bytes`, which must be `ty.size()` long.
    pub(crate) fn encode(&self, ty: &IrType, bytes: &mut [u8]) -> Result<(), RuntimeError> {
        match (ty, self) {
            (IrType::Void, Self::Void) => {}
            (IrType::Bool, Self::Bool(v)) => bytes[0] = u8::from(*v),
            (IrType::I32, Self::I32(v)) => bytes[..4].copy_from_slice(&v.to_le_bytes()),
            (IrType::F32, Self::F32(v)) => bytes[..4].copy_from_slice(&v.to_le_bytes()),
            (IrType::Vector(n), Self::Vector(lanes)) if lanes.len() == usize::from(*n) => {
                for (i, lane) in lanes.iter().enumerate() {
                    bytes[4 * i..4 * i + 4].copy_from_slice(&lane.to_le_bytes());
                }
            }
            (IrType::Ptr, Self::Ptr(v)) => bytes[..8].copy_from_slice(&v.to_le_bytes()),
            (IrType::FnPtr, Self::FnPtr(v)) => {
                bytes[..8].copy_from_slice(&u64::from(*v).to_le_bytes())
            }
            (IrType::Opaque { size, .. }, Self::Opaque(data)) if data.len() == *size as usize => {
                bytes[..data.len()].copy_from_slice(data)
            }
            (IrType::Array(elem, len), Self::Array(items)) if items.len() == *len as usize => {
                let stride = elem.stride() as usize;
                let size = elem.size() as usize;
                for (i, item) in items.iter().enumerate() {
                    item.encode(elem, &mut bytes[i * stride..i * stride + size])?;
                }
            }
            (IrType::Struct(fields), Self::Struct(items)) if items.len() == fields.len() => {
                for (i, (field, item)) in fields.iter().zip(items).enumerate() {
                    let offset = ty.member_offset(i as u32).unwrap_or(0) as usize;
                    item.encode(field, &mut bytes[offset..offset + field.size() as usize])?;
                }
            }
            (ty, value) => return Err(value.mismatch(ty)),
        }
        Ok(())
    }
}

fn word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn dword(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}
