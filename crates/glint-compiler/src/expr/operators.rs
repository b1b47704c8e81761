//! Operator tables.
//!
//! An overload is keyed by operator and exact operand types. Resolution
//! tries every overload of the operator, implicitly casting operands where
//! legal, and picks the one with the lowest total cast cost.

use indexmap::IndexMap;

use glint_ir::{BinOp, CastOp, FunctionBuilder, UnOp, Value};

use crate::ast::{BinaryOp, UnaryOp};
use crate::diagnostics::ErrorKind;
use crate::types::{
    TYPE_BOOL, TYPE_FLOAT, TYPE_INT, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4, TypeRef, TypeTable,
    TypedValue,
};

/// How an overload maps onto IR instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lowering {
    Direct(BinOp),
    /// Broadcast the scalar left operand to `n` lanes first.
    SplatLhs(BinOp, u8),
    /// Broadcast the scalar right operand to `n` lanes first.
    SplatRhs(BinOp, u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryOverload {
    pub lhs: TypeRef,
    pub rhs: TypeRef,
    pub result: TypeRef,
    pub lowering: Lowering,
}

impl BinaryOverload {
    pub fn emit(&self, b: &mut FunctionBuilder, lhs: Value, rhs: Value) -> TypedValue {
        let value = match self.lowering {
            Lowering::Direct(op) => b.binary(op, lhs, rhs),
            Lowering::SplatLhs(op, lanes) => {
                let lhs = b.cast(CastOp::Splat(lanes), lhs);
                b.binary(op, lhs, rhs)
            }
            Lowering::SplatRhs(op, lanes) => {
                let rhs = b.cast(CastOp::Splat(lanes), rhs);
                b.binary(op, lhs, rhs)
            }
        };
        TypedValue::new(value, self.result)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnaryOverload {
    pub operand: TypeRef,
    pub result: TypeRef,
    pub op: UnOp,
}

#[derive(Clone, Debug, Default)]
pub struct OperatorTable {
    binary: IndexMap<BinaryOp, Vec<BinaryOverload>>,
    unary: IndexMap<UnaryOp, Vec<UnaryOverload>>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arithmetic on numbers and vectors, comparisons and boolean logic.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let arithmetic = [
            (BinaryOp::Add, BinOp::Add),
            (BinaryOp::Sub, BinOp::Sub),
            (BinaryOp::Mul, BinOp::Mul),
            (BinaryOp::Div, BinOp::Div),
        ];
        let vectors = [(TYPE_VEC2, 2), (TYPE_VEC3, 3), (TYPE_VEC4, 4)];

        for (op, ir) in arithmetic {
            for ty in [TYPE_INT, TYPE_FLOAT, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4] {
                table.add_binary(op, ty, ty, ty, Lowering::Direct(ir));
            }
        }
        for (vec, lanes) in vectors {
            for (op, ir) in [(BinaryOp::Mul, BinOp::Mul), (BinaryOp::Div, BinOp::Div)] {
                table.add_binary(op, vec, TYPE_FLOAT, vec, Lowering::SplatRhs(ir, lanes));
            }
            table.add_binary(BinaryOp::Mul, TYPE_FLOAT, vec, vec, Lowering::SplatLhs(BinOp::Mul, lanes));
        }

        let comparisons = [
            (BinaryOp::Lt, BinOp::Lt),
            (BinaryOp::Le, BinOp::Le),
            (BinaryOp::Gt, BinOp::Gt),
            (BinaryOp::Ge, BinOp::Ge),
            (BinaryOp::Eq, BinOp::Eq),
            (BinaryOp::Ne, BinOp::Ne),
        ];
        for (op, ir) in comparisons {
            for ty in [TYPE_INT, TYPE_FLOAT] {
                table.add_binary(op, ty, ty, TYPE_BOOL, Lowering::Direct(ir));
            }
        }

        let logic = [
            (BinaryOp::Eq, BinOp::Eq),
            (BinaryOp::Ne, BinOp::Ne),
            (BinaryOp::And, BinOp::And),
            (BinaryOp::Or, BinOp::Or),
        ];
        for (op, ir) in logic {
            table.add_binary(op, TYPE_BOOL, TYPE_BOOL, TYPE_BOOL, Lowering::Direct(ir));
        }

        for ty in [TYPE_INT, TYPE_FLOAT, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4] {
            table.add_unary(UnaryOp::Neg, ty, ty, UnOp::Neg);
        }
        table.add_unary(UnaryOp::Not, TYPE_BOOL, TYPE_BOOL, UnOp::Not);
        table
    }

    pub fn add_binary(
        &mut self,
        op: BinaryOp,
        lhs: TypeRef,
        rhs: TypeRef,
        result: TypeRef,
        lowering: Lowering,
    ) {
        self.binary.entry(op).or_default().push(BinaryOverload {
            lhs,
            rhs,
            result,
            lowering,
        });
    }

    pub fn add_unary(&mut self, op: UnaryOp, operand: TypeRef, result: TypeRef, ir: UnOp) {
        self.unary.entry(op).or_default().push(UnaryOverload {
            operand,
            result,
            op: ir,
        });
    }

    /// Cheapest overload of `op` for operands of type `lhs` and `rhs`.
    ///
    /// Ties keep the overload registered first.
    pub fn resolve_binary(
        &self,
        types: &TypeTable,
        op: BinaryOp,
        lhs: TypeRef,
        rhs: TypeRef,
    ) -> Result<BinaryOverload, ErrorKind> {
        let mut best: Option<(u32, BinaryOverload)> = None;
        for overload in self.binary.get(&op).into_iter().flatten() {
            let l = types.can_cast_to(lhs, overload.lhs);
            let r = types.can_cast_to(rhs, overload.rhs);
            if !(l.legal && r.legal) {
                continue;
            }
            let cost = l.cost + r.cost;
            if best.is_none_or(|(c, _)| cost < c) {
                best = Some((cost, *overload));
            }
        }
        best.map(|(_, overload)| overload)
            .ok_or_else(|| ErrorKind::NoMatchingOperator {
                op: op.symbol().to_owned(),
                lhs: types.name(lhs).to_owned(),
                rhs: types.name(rhs).to_owned(),
            })
    }

    pub fn resolve_unary(
        &self,
        types: &TypeTable,
        op: UnaryOp,
        operand: TypeRef,
    ) -> Result<UnaryOverload, ErrorKind> {
        let mut best: Option<(u32, UnaryOverload)> = None;
        for overload in self.unary.get(&op).into_iter().flatten() {
            let cast = types.can_cast_to(operand, overload.operand);
            if cast.legal && best.is_none_or(|(c, _)| cast.cost < c) {
                best = Some((cast.cost, *overload));
            }
        }
        best.map(|(_, overload)| overload)
            .ok_or_else(|| ErrorKind::NoMatchingUnaryOperator {
                op: op.symbol().to_owned(),
                operand: types.name(operand).to_owned(),
            })
    }
}
