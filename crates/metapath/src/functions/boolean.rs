use super::CallCtx;
use crate::error::Error;
use crate::item::Sequence;
use crate::model::MetapathNode;

pub(super) fn fn_true<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    _args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(true))
}

pub(super) fn fn_false<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    _args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(false))
}

pub(super) fn fn_not<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(!args[0].ebv()?))
}

pub(super) fn fn_boolean<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(args[0].ebv()?))
}
