//! Rounding and aggregate functions.
use core::cmp::Ordering;

use rust_decimal::Decimal;

use super::{CallCtx, opt_atomic};
use crate::ast::ArithmeticOp;
use crate::error::{Error, ErrorCode};
use crate::evaluator::{arithmetic, comparison};
use crate::item::numeric::{NumKind, classify, classify_promoting, round_half_up};
use crate::item::{AtomicValue, Sequence};
use crate::model::MetapathNode;

fn map_numeric<N: MetapathNode>(
    arg: &Sequence<N>,
    on_int: impl FnOnce(i64) -> Option<i64>,
    on_dec: impl FnOnce(Decimal) -> Decimal,
) -> Result<Sequence<N>, Error> {
    let Some(value) = opt_atomic(arg).and_then(classify) else {
        return Ok(Sequence::empty());
    };
    let out = match value {
        NumKind::Int(i) => AtomicValue::Integer(
            on_int(i).ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "integer overflow"))?,
        ),
        NumKind::Dec(d) => AtomicValue::Decimal(on_dec(d)),
    };
    Ok(Sequence::atomic(out))
}

pub(super) fn abs<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    map_numeric(&args[0], i64::checked_abs, |d| d.abs())
}

pub(super) fn ceiling<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    map_numeric(&args[0], Some, |d| d.ceil())
}

pub(super) fn floor<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    map_numeric(&args[0], Some, |d| d.floor())
}

/// Halves round towards positive infinity: `round(-2.5)` is `-2`.
pub(super) fn round<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    map_numeric(&args[0], Some, round_half_up)
}

/// Untyped values become numbers; anything else is kept as-is.
fn promoted<N: MetapathNode>(arg: &Sequence<N>) -> Result<Vec<AtomicValue>, Error> {
    arg.iter()
        .filter_map(|it| it.as_atomic())
        .map(|v| match v {
            AtomicValue::Untyped(_) => {
                Ok(classify_promoting(v)?.map_or_else(|| v.clone(), NumKind::into_atomic))
            }
            other => Ok(other.clone()),
        })
        .collect()
}

fn total<N: MetapathNode>(ctx: &CallCtx<N>, values: &[AtomicValue]) -> Result<Option<AtomicValue>, Error> {
    let tz = ctx.dyn_ctx.implicit_timezone();
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let mut acc = first.clone();
    for v in iter {
        acc = arithmetic::apply(ArithmeticOp::Add, &acc, v, tz)?;
    }
    Ok(Some(acc))
}

/// Sum of numbers or of same-kind durations. The empty sum is `0`.
pub(super) fn sum<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let values = promoted(&args[0])?;
    Ok(Sequence::atomic(total(ctx, &values)?.unwrap_or(AtomicValue::Integer(0))))
}

pub(super) fn avg<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let values = promoted(&args[0])?;
    let Some(sum) = total(ctx, &values)? else {
        return Ok(Sequence::empty());
    };
    let count = AtomicValue::Integer(i64::try_from(values.len()).unwrap_or(i64::MAX));
    let mean = arithmetic::apply(
        ArithmeticOp::Divide,
        &sum,
        &count,
        ctx.dyn_ctx.implicit_timezone(),
    )?;
    Ok(Sequence::atomic(mean))
}

fn extreme<N: MetapathNode>(
    ctx: &CallCtx<N>,
    arg: &Sequence<N>,
    keep: Ordering,
) -> Result<Sequence<N>, Error> {
    let tz = ctx.dyn_ctx.implicit_timezone();
    let mut best: Option<AtomicValue> = None;
    for v in promoted(arg)? {
        let v = match v {
            AtomicValue::Untyped(s) => AtomicValue::String(s),
            other => other,
        };
        best = match best {
            Some(b) if comparison::compare_atomic(&v, &b, tz)? != keep => Some(b),
            _ => Some(v),
        };
    }
    Ok(best.map(Sequence::atomic).unwrap_or_default())
}

pub(super) fn min<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    extreme(ctx, &args[0], Ordering::Less)
}

pub(super) fn max<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    extreme(ctx, &args[0], Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_numeric_keeps_the_kind() {
        let d = Decimal::new(-25, 1);
        let out = map_numeric::<crate::simple_node::SimpleNode>(
            &Sequence::atomic(AtomicValue::Decimal(d)),
            Some,
            round_half_up,
        )
        .unwrap();
        assert_eq!(out, Sequence::atomic(AtomicValue::Decimal(Decimal::from(-2))));
        let err = map_numeric::<crate::simple_node::SimpleNode>(
            &Sequence::atomic(AtomicValue::Integer(i64::MIN)),
            i64::checked_abs,
            |d| d,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::FOAR0002);
    }
}
