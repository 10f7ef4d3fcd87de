//! Arithmetic over atomic operands.
//!
//! Each operator matches on the runtime type pairing of its operands. Legal
//! pairings per operator:
//!
//! | op      | pairings                                                                |
//! |---------|-------------------------------------------------------------------------|
//! | `+`     | date/date-time with either duration (both orders), duration + same duration, number + number |
//! | `-`     | date - date, date-time - date-time, date/date-time - duration, duration - same duration, number - number |
//! | `*`     | duration * number (both orders), number * number                        |
//! | `div`   | duration div number, duration div same duration, number div number      |
//! | `idiv`  | number idiv number                                                      |
//! | `mod`   | number mod number                                                       |
//!
//! Untyped operands are promoted to numbers before dispatch. Anything not in
//! the table is `MPTY0004` naming both runtime types.
use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::ast::ArithmeticOp;
use crate::context::DynamicContext;
use crate::error::{Error, ErrorCode};
use crate::item::numeric::{NumKind, classify, classify_promoting, unify};
use crate::item::{AtomicValue, Sequence, temporal};
use crate::model::MetapathNode;

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "arithmetic overflow")
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

/// Atomize an operand to zero or one value, promoting untyped text.
fn operand<N: MetapathNode>(seq: &Sequence<N>, symbol: &str) -> Result<Option<AtomicValue>, Error> {
    let mut atoms = seq.atomize()?;
    if atoms.len() > 1 {
        return Err(Error::type_err(format!(
            "operand of '{symbol}' must be a single item, got {}",
            atoms.len()
        )));
    }
    atoms.pop().map(promote_untyped).transpose()
}

fn promote_untyped(v: AtomicValue) -> Result<AtomicValue, Error> {
    if !matches!(v, AtomicValue::Untyped(_)) {
        return Ok(v);
    }
    let promoted = classify_promoting(&v)?;
    Ok(promoted.map_or(v, NumKind::into_atomic))
}

pub(crate) fn evaluate<N: MetapathNode>(
    ctx: &DynamicContext<N>,
    op: ArithmeticOp,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let (Some(a), Some(b)) = (operand(left, op.symbol())?, operand(right, op.symbol())?) else {
        return Ok(Sequence::empty());
    };
    apply(op, &a, &b, ctx.implicit_timezone()).map(Sequence::atomic)
}

pub(crate) fn negate<N: MetapathNode>(operand_seq: &Sequence<N>) -> Result<Sequence<N>, Error> {
    use AtomicValue as V;
    let Some(v) = operand(operand_seq, "-")? else {
        return Ok(Sequence::empty());
    };
    let negated = match v {
        V::Integer(i) => V::Integer(i.checked_neg().ok_or_else(overflow)?),
        V::Decimal(d) => V::Decimal(-d),
        V::YearMonthDuration(m) => V::YearMonthDuration(m.checked_neg().ok_or_else(overflow)?),
        V::DayTimeDuration(d) => V::DayTimeDuration(-d),
        other => {
            return Err(Error::type_err(format!(
                "operation not supported: -{}",
                other.type_of()
            )));
        }
    };
    Ok(Sequence::atomic(negated))
}

/// Apply `op` to two atomic values. `tz` is the implicit timezone used when
/// subtracting dates that carry none.
pub(crate) fn apply(
    op: ArithmeticOp,
    a: &AtomicValue,
    b: &AtomicValue,
    tz: FixedOffset,
) -> Result<AtomicValue, Error> {
    let result = match op {
        ArithmeticOp::Add => add(a, b)?,
        ArithmeticOp::Subtract => subtract(a, b, tz)?,
        ArithmeticOp::Multiply => multiply(a, b)?,
        ArithmeticOp::Divide => divide(a, b)?,
        ArithmeticOp::IntegerDivide => integer_divide(a, b)?,
        ArithmeticOp::Modulo => modulo(a, b)?,
    };
    result.ok_or_else(|| {
        debug!(
            op = op.symbol(),
            left = %a.type_of(),
            right = %b.type_of(),
            "unsupported operand pairing"
        );
        Error::type_err(format!(
            "operation not supported: {} {} {}",
            a.type_of(),
            op.symbol(),
            b.type_of()
        ))
    })
}

type Outcome = Result<Option<AtomicValue>, Error>;

/// Both operands numeric: run the integer or the decimal variant after
/// promotion. `None` when either side is not a number.
fn numeric(
    a: &AtomicValue,
    b: &AtomicValue,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(Decimal, Decimal) -> Option<Decimal>,
) -> Outcome {
    let (Some(x), Some(y)) = (classify(a), classify(b)) else {
        return Ok(None);
    };
    let value = match unify(x, y) {
        (NumKind::Int(x), NumKind::Int(y)) => int_op(x, y).map(AtomicValue::Integer),
        (x, y) => dec_op(x.to_decimal(), y.to_decimal()).map(AtomicValue::Decimal),
    };
    value.map(Some).ok_or_else(overflow)
}

fn shift_date(date: NaiveDate, delta: TimeDelta) -> Result<NaiveDate, Error> {
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(delta)
        .map(|dt| dt.date())
        .ok_or_else(overflow)
}

fn add(a: &AtomicValue, b: &AtomicValue) -> Outcome {
    use AtomicValue as V;
    Ok(Some(match (a, b) {
        (V::Date { date, tz }, V::YearMonthDuration(m))
        | (V::YearMonthDuration(m), V::Date { date, tz }) => V::Date {
            date: temporal::add_months_to_date(*date, *m).ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::Date { date, tz }, V::DayTimeDuration(d))
        | (V::DayTimeDuration(d), V::Date { date, tz }) => V::Date {
            date: shift_date(*date, *d)?,
            tz: *tz,
        },
        (V::DateTime { value, tz }, V::YearMonthDuration(m))
        | (V::YearMonthDuration(m), V::DateTime { value, tz }) => V::DateTime {
            value: temporal::add_months_to_date_time(*value, *m).ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::DateTime { value, tz }, V::DayTimeDuration(d))
        | (V::DayTimeDuration(d), V::DateTime { value, tz }) => V::DateTime {
            value: value.checked_add_signed(*d).ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            V::YearMonthDuration(x.checked_add(*y).ok_or_else(overflow)?)
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => {
            V::DayTimeDuration(x.checked_add(y).ok_or_else(overflow)?)
        }
        _ => return numeric(a, b, i64::checked_add, Decimal::checked_add),
    }))
}

fn subtract(a: &AtomicValue, b: &AtomicValue, tz: FixedOffset) -> Outcome {
    use AtomicValue as V;
    Ok(Some(match (a, b) {
        (V::Date { .. }, V::Date { .. }) | (V::DateTime { .. }, V::DateTime { .. }) => {
            let (Some(x), Some(y)) = (a.utc_instant(Some(tz)), b.utc_instant(Some(tz))) else {
                return Err(overflow());
            };
            V::DayTimeDuration(x.signed_duration_since(y))
        }
        (V::Date { date, tz }, V::YearMonthDuration(m)) => V::Date {
            date: temporal::add_months_to_date(*date, m.checked_neg().ok_or_else(overflow)?)
                .ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::Date { date, tz }, V::DayTimeDuration(d)) => V::Date {
            date: shift_date(*date, -*d)?,
            tz: *tz,
        },
        (V::DateTime { value, tz }, V::YearMonthDuration(m)) => V::DateTime {
            value: temporal::add_months_to_date_time(
                *value,
                m.checked_neg().ok_or_else(overflow)?,
            )
            .ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::DateTime { value, tz }, V::DayTimeDuration(d)) => V::DateTime {
            value: value.checked_sub_signed(*d).ok_or_else(overflow)?,
            tz: *tz,
        },
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            V::YearMonthDuration(x.checked_sub(*y).ok_or_else(overflow)?)
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => {
            V::DayTimeDuration(x.checked_sub(y).ok_or_else(overflow)?)
        }
        _ => return numeric(a, b, i64::checked_sub, Decimal::checked_sub),
    }))
}

fn multiply(a: &AtomicValue, b: &AtomicValue) -> Outcome {
    use AtomicValue as V;
    Ok(Some(match (a, b) {
        (V::YearMonthDuration(m), n) | (n, V::YearMonthDuration(m)) if classify(n).is_some() => {
            let factor = classify(n).map_or(Decimal::ZERO, NumKind::to_decimal);
            V::YearMonthDuration(scale_months(*m, factor)?)
        }
        (V::DayTimeDuration(d), n) | (n, V::DayTimeDuration(d)) if classify(n).is_some() => {
            let factor = classify(n).map_or(Decimal::ZERO, NumKind::to_decimal);
            V::DayTimeDuration(scale_delta(*d, factor)?)
        }
        _ => return numeric(a, b, i64::checked_mul, Decimal::checked_mul),
    }))
}

fn divide(a: &AtomicValue, b: &AtomicValue) -> Outcome {
    use AtomicValue as V;
    match (a, b) {
        (V::YearMonthDuration(m), n) if classify(n).is_some() => {
            let divisor = nonzero_divisor(n)?;
            let months = Decimal::from(*m).checked_div(divisor).ok_or_else(overflow)?;
            Ok(Some(V::YearMonthDuration(round_months(months)?)))
        }
        (V::DayTimeDuration(d), n) if classify(n).is_some() => {
            let divisor = nonzero_divisor(n)?;
            let secs = delta_seconds(d).checked_div(divisor).ok_or_else(overflow)?;
            Ok(Some(V::DayTimeDuration(delta_from_seconds(secs)?)))
        }
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            if *y == 0 {
                return Err(division_by_zero());
            }
            Ok(Some(V::Decimal(Decimal::from(*x) / Decimal::from(*y))))
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            let ratio = delta_seconds(x)
                .checked_div(delta_seconds(y))
                .ok_or_else(overflow)?;
            Ok(Some(V::Decimal(ratio)))
        }
        _ => {
            let (Some(x), Some(_)) = (classify(a), classify(b)) else {
                return Ok(None);
            };
            let divisor = nonzero_divisor(b)?;
            let quotient = x.to_decimal().checked_div(divisor).ok_or_else(overflow)?;
            Ok(Some(V::Decimal(quotient)))
        }
    }
}

fn integer_divide(a: &AtomicValue, b: &AtomicValue) -> Outcome {
    let (Some(x), Some(y)) = (classify(a), classify(b)) else {
        return Ok(None);
    };
    if y.is_zero() {
        return Err(division_by_zero());
    }
    let quotient = match unify(x, y) {
        (NumKind::Int(x), NumKind::Int(y)) => x.checked_div(y),
        (x, y) => x
            .to_decimal()
            .checked_div(y.to_decimal())
            .and_then(|q| q.trunc().to_i64()),
    };
    quotient
        .map(|q| Some(AtomicValue::Integer(q)))
        .ok_or_else(overflow)
}

fn modulo(a: &AtomicValue, b: &AtomicValue) -> Outcome {
    if classify(b).is_some_and(NumKind::is_zero) && classify(a).is_some() {
        return Err(division_by_zero());
    }
    numeric(a, b, i64::checked_rem, Decimal::checked_rem)
}

fn nonzero_divisor(n: &AtomicValue) -> Result<Decimal, Error> {
    match classify(n) {
        Some(k) if k.is_zero() => Err(division_by_zero()),
        Some(k) => Ok(k.to_decimal()),
        None => Err(Error::type_err(format!("{} is not a number", n.type_of()))),
    }
}

fn round_months(months: Decimal) -> Result<i32, Error> {
    months
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .ok_or_else(overflow)
}

fn scale_months(months: i32, factor: Decimal) -> Result<i32, Error> {
    round_months(
        Decimal::from(months)
            .checked_mul(factor)
            .ok_or_else(overflow)?,
    )
}

/// Whole duration as a decimal number of seconds.
fn delta_seconds(d: &TimeDelta) -> Decimal {
    Decimal::from(d.num_seconds()) + Decimal::new(i64::from(d.subsec_nanos()), 9)
}

fn delta_from_seconds(secs: Decimal) -> Result<TimeDelta, Error> {
    let secs = secs.round_dp(9);
    let whole = secs.trunc();
    let nanos = ((secs - whole) * Decimal::from(1_000_000_000))
        .to_i64()
        .ok_or_else(overflow)?;
    let whole = TimeDelta::try_seconds(whole.to_i64().ok_or_else(overflow)?).ok_or_else(overflow)?;
    whole
        .checked_add(&TimeDelta::nanoseconds(nanos))
        .ok_or_else(overflow)
}

fn scale_delta(d: TimeDelta, factor: Decimal) -> Result<TimeDelta, Error> {
    delta_from_seconds(delta_seconds(&d).checked_mul(factor).ok_or_else(overflow)?)
}
