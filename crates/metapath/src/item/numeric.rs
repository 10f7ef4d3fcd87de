//! Numeric classification and promotion shared by arithmetic, comparison and
//! the aggregate functions.
//!
//! The model has two numeric types: `integer` (i64) and `decimal`
//! (`rust_decimal`). Promotion is minimal: integer with integer stays integer,
//! anything involving a decimal becomes decimal. Untyped text is promoted to
//! a number by parsing it, preferring integer when the lexical form allows.
use core::cmp::Ordering;

use rust_decimal::Decimal;

use super::{AtomicType, AtomicValue};
use crate::error::Error;

/// Numeric classification carrying the promoted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumKind {
    Int(i64),
    Dec(Decimal),
}

impl NumKind {
    pub(crate) fn to_decimal(self) -> Decimal {
        match self {
            NumKind::Int(i) => Decimal::from(i),
            NumKind::Dec(d) => d,
        }
    }

    pub(crate) fn is_zero(self) -> bool {
        match self {
            NumKind::Int(i) => i == 0,
            NumKind::Dec(d) => d.is_zero(),
        }
    }

    pub(crate) fn into_atomic(self) -> AtomicValue {
        match self {
            NumKind::Int(i) => AtomicValue::Integer(i),
            NumKind::Dec(d) => AtomicValue::Decimal(d),
        }
    }

    pub(crate) fn compare(self, other: NumKind) -> Ordering {
        match unify(self, other) {
            (NumKind::Int(a), NumKind::Int(b)) => a.cmp(&b),
            (a, b) => a.to_decimal().cmp(&b.to_decimal()),
        }
    }
}

/// Classify a typed numeric value. Text is not numeric here.
pub(crate) fn classify(v: &AtomicValue) -> Option<NumKind> {
    match v {
        AtomicValue::Integer(i) => Some(NumKind::Int(*i)),
        AtomicValue::Decimal(d) => Some(NumKind::Dec(*d)),
        _ => None,
    }
}

/// Classify a value for arithmetic: typed numerics as-is, untyped text parsed
/// as integer or decimal (`FORG0001` when it is not a number). Other types
/// yield `None`.
pub(crate) fn classify_promoting(v: &AtomicValue) -> Result<Option<NumKind>, Error> {
    match v {
        AtomicValue::Untyped(s) => {
            let parsed = AtomicValue::parse_as(s, AtomicType::Integer)
                .or_else(|_| AtomicValue::parse_as(s, AtomicType::Decimal))?;
            Ok(classify(&parsed))
        }
        other => Ok(classify(other)),
    }
}

/// Promote two numbers to their common type.
pub(crate) fn unify(a: NumKind, b: NumKind) -> (NumKind, NumKind) {
    use NumKind::*;
    match (a, b) {
        (Int(x), Int(y)) => (Int(x), Int(y)),
        (x, y) => (Dec(x.to_decimal()), Dec(y.to_decimal())),
    }
}

/// Round to the nearest integer, halves towards positive infinity.
pub(crate) fn round_half_up(d: Decimal) -> Decimal {
    if d.fract().is_zero() {
        return d;
    }
    d.checked_add(Decimal::new(5, 1))
        .map_or_else(|| d.ceil(), |v| v.floor())
}
