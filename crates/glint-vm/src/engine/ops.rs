//! Arithmetic, logic and conversions on register values.

use glint_ir::{BinOp, CastOp, UnOp};

use super::error::RuntimeError;
use super::value::Value;

pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let value = match (lhs, rhs) {
        (Value::I32(a), Value::I32(b)) => int_binary(op, *a, *b)?,
        (Value::F32(a), Value::F32(b)) => float_binary(op, *a, *b)?,
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::And => Value::Bool(*a && *b),
            BinOp::Or => Value::Bool(*a || *b),
            BinOp::Eq => Value::Bool(a == b),
            BinOp::Ne => Value::Bool(a != b),
            _ => return Err(unsupported(op, lhs)),
        },
        (Value::Vector(a), Value::Vector(b)) if a.len() == b.len() => {
            let lanes = a
                .iter()
                .zip(b)
                .map(|(x, y)| lane_binary(op, *x, *y))
                .collect::<Result<_, _>>()
                .map_err(|()| unsupported(op, lhs))?;
            Value::Vector(lanes)
        }
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: lhs.kind().to_owned(),
                found: rhs.kind().to_owned(),
            });
        }
    };
    Ok(value)
}

fn int_binary(op: BinOp, a: i32, b: i32) -> Result<Value, RuntimeError> {
    Ok(match op {
        BinOp::Add => Value::I32(a.wrapping_add(b)),
        BinOp::Sub => Value::I32(a.wrapping_sub(b)),
        BinOp::Mul => Value::I32(a.wrapping_mul(b)),
        BinOp::Div => Value::I32(a.checked_div(b).ok_or(RuntimeError::DivisionByZero)?),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
        BinOp::And | BinOp::Or => return Err(unsupported(op, &Value::I32(a))),
    })
}

fn float_binary(op: BinOp, a: f32, b: f32) -> Result<Value, RuntimeError> {
    Ok(match op {
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
        _ => Value::F32(lane_binary(op, a, b).map_err(|()| unsupported(op, &Value::F32(a)))?),
    })
}

fn lane_binary(op: BinOp, a: f32, b: f32) -> Result<f32, ()> {
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div => Ok(a / b),
        _ => Err(()),
    }
}

pub fn unary(op: UnOp, arg: &Value) -> Result<Value, RuntimeError> {
    Ok(match (op, arg) {
        (UnOp::Neg, Value::I32(v)) => Value::I32(v.wrapping_neg()),
        (UnOp::Neg, Value::F32(v)) => Value::F32(-v),
        (UnOp::Neg, Value::Vector(lanes)) => Value::Vector(lanes.iter().map(|l| -l).collect()),
        (UnOp::Not, Value::Bool(v)) => Value::Bool(!v),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("operand of `{}`", op.mnemonic()),
                found: arg.kind().to_owned(),
            });
        }
    })
}

pub fn cast(op: CastOp, arg: &Value) -> Result<Value, RuntimeError> {
    Ok(match op {
        CastOp::IntToFloat => Value::F32(arg.as_i32()? as f32),
        CastOp::FloatToInt => Value::I32(arg.as_f32()? as i32),
        CastOp::BoolToInt => Value::I32(i32::from(arg.as_bool()?)),
        CastOp::Splat(lanes) => Value::Vector(vec![arg.as_f32()?; usize::from(lanes)]),
    })
}

pub fn extract(aggregate: &Value, index: u32) -> Result<Value, RuntimeError> {
    let index = index as usize;
    let item = match aggregate {
        Value::Vector(lanes) => lanes.get(index).copied().map(Value::F32),
        Value::Array(items) | Value::Struct(items) => items.get(index).cloned(),
        _ => None,
    };
    item.ok_or_else(|| RuntimeError::TypeMismatch {
        expected: format!("aggregate with member {index}"),
        found: aggregate.kind().to_owned(),
    })
}

pub fn insert(aggregate: &Value, element: Value, index: u32) -> Result<Value, RuntimeError> {
    let mut result = aggregate.clone();
    let slot = index as usize;
    let ok = match (&mut result, element) {
        (Value::Vector(lanes), Value::F32(lane)) if slot < lanes.len() => {
            lanes[slot] = lane;
            true
        }
        (Value::Array(items) | Value::Struct(items), element) if slot < items.len() => {
            items[slot] = element;
            true
        }
        _ => false,
    };
    if !ok {
        return Err(RuntimeError::TypeMismatch {
            expected: format!("aggregate with member {index}"),
            found: aggregate.kind().to_owned(),
        });
    }
    Ok(result)
}

fn unsupported(op: BinOp, operand: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: format!("operand of `{}`", op.mnemonic()),
        found: operand.kind().to_owned(),
    }
}
