//! Cardinality and sequence-shaping functions.
use super::CallCtx;
use crate::error::{Error, ErrorCode};
use crate::item::{Item, Sequence};
use crate::model::MetapathNode;

pub(super) fn count<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let n = i64::try_from(args[0].len()).unwrap_or(i64::MAX);
    Ok(Sequence::atomic(n))
}

pub(super) fn empty<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(args[0].is_empty()))
}

pub(super) fn exists<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(!args[0].is_empty()))
}

pub(super) fn head<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(args[0].first().cloned().map(Sequence::singleton).unwrap_or_default())
}

pub(super) fn tail<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(args[0].iter().skip(1).cloned().collect())
}

pub(super) fn reverse<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(args[0].iter().rev().cloned().collect())
}

/// Arguments arrive atomized; distinctness is value equality.
pub(super) fn distinct_values<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(args[0].distinct())
}

pub(super) fn data<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let arg = ctx.arg_or_context(args, 0)?;
    Ok(arg.atomize()?.into_iter().map(Item::Atomic).collect())
}

pub(super) fn exactly_one<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    if args[0].len() != 1 {
        return Err(Error::from_code(
            ErrorCode::FORG0005,
            format!("exactly-one() called with a sequence of {} items", args[0].len()),
        ));
    }
    Ok(args[0].clone())
}

pub(super) fn zero_or_one<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    if args[0].len() > 1 {
        return Err(Error::from_code(
            ErrorCode::FORG0003,
            format!("zero-or-one() called with a sequence of {} items", args[0].len()),
        ));
    }
    Ok(args[0].clone())
}

pub(super) fn one_or_more<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    if args[0].is_empty() {
        return Err(Error::from_code(
            ErrorCode::FORG0004,
            "one-or-more() called with an empty sequence",
        ));
    }
    Ok(args[0].clone())
}
