//! Value and general comparisons.
use core::cmp::Ordering;

use chrono::FixedOffset;
use itertools::iproduct;

use crate::ast::ComparisonOp;
use crate::context::DynamicContext;
use crate::error::Error;
use crate::item::numeric::{NumKind, classify, classify_promoting};
use crate::item::{AtomicType, AtomicValue, Sequence};
use crate::model::MetapathNode;

fn holds(op: ComparisonOp, ord: Ordering) -> bool {
    match op {
        ComparisonOp::Eq => ord == Ordering::Equal,
        ComparisonOp::Ne => ord != Ordering::Equal,
        ComparisonOp::Lt => ord == Ordering::Less,
        ComparisonOp::Le => ord != Ordering::Greater,
        ComparisonOp::Gt => ord == Ordering::Greater,
        ComparisonOp::Ge => ord != Ordering::Less,
    }
}

/// Order two atomic values of comparable types. Numbers compare across
/// integer and decimal, text across string and untyped; dates without a
/// timezone take `tz`.
pub(crate) fn compare_atomic(
    a: &AtomicValue,
    b: &AtomicValue,
    tz: FixedOffset,
) -> Result<Ordering, Error> {
    use AtomicValue as V;
    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return Ok(x.compare(y));
    }
    match (a, b) {
        (V::String(x) | V::Untyped(x), V::String(y) | V::Untyped(y)) => Ok(x.cmp(y)),
        (V::Boolean(x), V::Boolean(y)) => Ok(x.cmp(y)),
        (V::Date { .. }, V::Date { .. }) | (V::DateTime { .. }, V::DateTime { .. }) => {
            Ok(a.utc_instant(Some(tz)).cmp(&b.utc_instant(Some(tz))))
        }
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => Ok(x.cmp(y)),
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => Ok(x.cmp(y)),
        _ => Err(Error::type_err(format!(
            "cannot compare {} with {}",
            a.type_of(),
            b.type_of()
        ))),
    }
}

fn single<N: MetapathNode>(seq: &Sequence<N>, op: ComparisonOp) -> Result<Option<AtomicValue>, Error> {
    let mut atoms = seq.atomize()?;
    if atoms.len() > 1 {
        return Err(Error::type_err(format!(
            "operand of '{}' must be a single item, got {}",
            op.value_keyword(),
            atoms.len()
        )));
    }
    Ok(atoms.pop())
}

/// Untyped operands of a value comparison are compared as strings.
fn as_string_if_untyped(v: AtomicValue) -> AtomicValue {
    match v {
        AtomicValue::Untyped(s) => AtomicValue::String(s),
        other => other,
    }
}

/// `eq`, `ne`, `lt`, `le`, `gt`, `ge`: one item each side, empty when
/// either side is empty.
pub(crate) fn value_compare<N: MetapathNode>(
    ctx: &DynamicContext<N>,
    op: ComparisonOp,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let (Some(a), Some(b)) = (single(left, op)?, single(right, op)?) else {
        return Ok(Sequence::empty());
    };
    let (a, b) = (as_string_if_untyped(a), as_string_if_untyped(b));
    let ord = compare_atomic(&a, &b, ctx.implicit_timezone())?;
    Ok(Sequence::atomic(holds(op, ord)))
}

/// Cast untyped text to the type of the value it is compared with.
fn cast_untyped_for(text: &AtomicValue, other: &AtomicValue) -> Result<AtomicValue, Error> {
    let target = other.type_of();
    if target.is_numeric() {
        return Ok(classify_promoting(text)?.map_or_else(|| text.clone(), NumKind::into_atomic));
    }
    match target {
        AtomicType::String | AtomicType::UntypedAtomic => Ok(text.clone()),
        _ => text.cast_to(target),
    }
}

/// `=`, `!=`, `<`, `<=`, `>`, `>=`: true when any pairing of the atomized
/// operands satisfies the comparator. Errors from a pairing are raised, not
/// treated as false.
pub(crate) fn general_compare<N: MetapathNode>(
    ctx: &DynamicContext<N>,
    op: ComparisonOp,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let (l, r) = (left.atomize()?, right.atomize()?);
    let tz = ctx.implicit_timezone();
    for (a, b) in iproduct!(&l, &r) {
        let ord = match (a, b) {
            (AtomicValue::Untyped(_), AtomicValue::Untyped(_)) => compare_atomic(a, b, tz)?,
            (AtomicValue::Untyped(_), other) => compare_atomic(&cast_untyped_for(a, other)?, b, tz)?,
            (other, AtomicValue::Untyped(_)) => compare_atomic(a, &cast_untyped_for(b, other)?, tz)?,
            _ => compare_atomic(a, b, tz)?,
        };
        if holds(op, ord) {
            return Ok(Sequence::atomic(true));
        }
    }
    Ok(Sequence::atomic(false))
}
