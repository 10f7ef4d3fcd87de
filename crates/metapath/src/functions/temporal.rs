//! Clock functions, date component accessors and the constructor functions.
use chrono::{Datelike, TimeDelta};

use super::{CallCtx, opt_atomic};
use crate::error::Error;
use crate::item::{AtomicType, AtomicValue, Sequence};
use crate::model::MetapathNode;

pub(super) fn current_date_time<N: MetapathNode>(
    ctx: &CallCtx<N>,
    _args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let now = ctx.dyn_ctx.now();
    Ok(Sequence::atomic(AtomicValue::DateTime {
        value: now.naive_local(),
        tz: Some(*now.offset()),
    }))
}

pub(super) fn current_date<N: MetapathNode>(
    ctx: &CallCtx<N>,
    _args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let now = ctx.dyn_ctx.now();
    Ok(Sequence::atomic(AtomicValue::Date {
        date: now.date_naive(),
        tz: Some(*now.offset()),
    }))
}

pub(super) fn implicit_timezone<N: MetapathNode>(
    ctx: &CallCtx<N>,
    _args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let offset = ctx.dyn_ctx.implicit_timezone().local_minus_utc();
    Ok(Sequence::atomic(AtomicValue::DayTimeDuration(TimeDelta::seconds(
        i64::from(offset),
    ))))
}

fn date_component<N: MetapathNode>(
    arg: &Sequence<N>,
    part: impl FnOnce(&chrono::NaiveDate) -> i64,
) -> Sequence<N> {
    match opt_atomic(arg) {
        Some(AtomicValue::Date { date, .. }) => Sequence::atomic(part(date)),
        _ => Sequence::empty(),
    }
}

pub(super) fn year_from_date<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(date_component(&args[0], |d| i64::from(d.year())))
}

pub(super) fn month_from_date<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(date_component(&args[0], |d| i64::from(d.month())))
}

pub(super) fn day_from_date<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(date_component(&args[0], |d| i64::from(d.day())))
}

/// `date("2024-01-01")` and friends: cast the optional argument to `target`.
pub(super) fn constructor<N: MetapathNode>(
    target: AtomicType,
) -> impl Fn(&CallCtx<N>, &[Sequence<N>]) -> Result<Sequence<N>, Error> + Send + Sync + 'static {
    move |_ctx: &CallCtx<N>, args: &[Sequence<N>]| match opt_atomic(&args[0]) {
        Some(v) => Ok(Sequence::atomic(v.cast_to(target)?)),
        None => Ok(Sequence::empty()),
    }
}
