//! IR types and their memory layout.
//!
//! Layout follows C rules: every type has a size and an alignment, aggregate
//! members are placed at the next offset aligned for them, and the aggregate
//! size is rounded up to its alignment.

use std::fmt;

use serde::Serialize;

const POINTER_SIZE: u32 = 8;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IrType {
    Void,
    Bool,
    I32,
    F32,
    /// Float vector with 2 to 4 lanes.
    Vector(u8),
    Ptr,
    FnPtr,
    /// Fixed-size blob whose contents only the runtime interprets.
    Opaque { size: u32, align: u32 },
    Array(Box<IrType>, u32),
    Struct(Vec<IrType>),
}

impl IrType {
    pub fn array(elem: IrType, len: u32) -> Self {
        Self::Array(Box::new(elem), len)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn size(&self) -> u32 {
        match self {
            Self::Void => 0,
            Self::Bool => 1,
            Self::I32 | Self::F32 => 4,
            Self::Vector(lanes) => 4 * u32::from(*lanes),
            Self::Ptr | Self::FnPtr => POINTER_SIZE,
            Self::Opaque { size, .. } => *size,
            Self::Array(elem, len) => elem.stride() * len,
            Self::Struct(fields) => {
                let mut offset = 0;
                for field in fields {
                    offset = align_to(offset, field.align()) + field.size();
                }
                align_to(offset, self.align())
            }
        }
    }

    pub fn align(&self) -> u32 {
        match self {
            Self::Void | Self::Bool => 1,
            Self::I32 | Self::F32 | Self::Vector(_) => 4,
            Self::Ptr | Self::FnPtr => POINTER_SIZE,
            Self::Opaque { align, .. } => *align,
            Self::Array(elem, _) => elem.align(),
            Self::Struct(fields) => fields.iter().map(IrType::align).max().unwrap_or(1),
        }
    }

    /// Distance between consecutive array elements of this type.
    pub fn stride(&self) -> u32 {
        align_to(self.size(), self.align())
    }

    /// Type of the member at `index` for aggregates and vectors.
    pub fn member_type(&self, index: u32) -> Option<IrType> {
        match self {
            Self::Vector(lanes) if index < u32::from(*lanes) => Some(Self::F32),
            Self::Array(elem, len) if index < *len => Some((**elem).clone()),
            Self::Struct(fields) => fields.get(index as usize).cloned(),
            _ => None,
        }
    }

    /// Byte offset of the member at `index` for aggregates and vectors.
    pub fn member_offset(&self, index: u32) -> Option<u32> {
        match self {
            Self::Vector(lanes) if index < u32::from(*lanes) => Some(4 * index),
            Self::Array(elem, len) if index < *len => Some(elem.stride() * index),
            Self::Struct(fields) if (index as usize) < fields.len() => {
                let mut offset = 0;
                for (i, field) in fields.iter().enumerate() {
                    offset = align_to(offset, field.align());
                    if i == index as usize {
                        return Some(offset);
                    }
                    offset += field.size();
                }
                None
            }
            _ => None,
        }
    }

    /// Number of members for aggregates and vectors.
    pub fn member_count(&self) -> Option<u32> {
        match self {
            Self::Vector(lanes) => Some(u32::from(*lanes)),
            Self::Array(_, len) => Some(*len),
            Self::Struct(fields) => Some(fields.len() as u32),
            _ => None,
        }
    }
}

fn align_to(offset: u32, align: u32) -> u32 {
    offset.div_ceil(align) * align
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool => write!(f, "bool"),
            Self::I32 => write!(f, "i32"),
            Self::F32 => write!(f, "f32"),
            Self::Vector(lanes) => write!(f, "vec{lanes}"),
            Self::Ptr => write!(f, "ptr"),
            Self::FnPtr => write!(f, "fnptr"),
            Self::Opaque { size, align } => write!(f, "opaque({size}, {align})"),
            Self::Array(elem, len) => write!(f, "[{elem} x {len}]"),
            Self::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
