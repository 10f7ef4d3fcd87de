use super::CallCtx;
use crate::error::Error;
use crate::item::{Item, Sequence};
use crate::model::MetapathNode;

/// The node argument, or the context item for the zero-argument form.
/// `None` for an empty argument.
fn node_arg<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Option<N>, Error> {
    let arg = ctx.arg_or_context(args, 0)?;
    match arg.first() {
        None => Ok(None),
        Some(Item::Node(n)) => Ok(Some(n.clone())),
        Some(other) => Err(Error::type_err(format!(
            "context item '{other}' is not a node"
        ))),
    }
}

/// Namespaced names come back in `Q{uri}local` form.
pub(super) fn name<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let name = node_arg(ctx, args)?
        .and_then(|n| n.name())
        .map(|q| q.to_string())
        .unwrap_or_default();
    Ok(Sequence::atomic(name))
}

pub(super) fn local_name<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let local = node_arg(ctx, args)?
        .and_then(|n| n.name())
        .map(|q| q.local)
        .unwrap_or_default();
    Ok(Sequence::atomic(local))
}

pub(super) fn root<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(node_arg(ctx, args)?
        .map(|n| Sequence::node(n.root()))
        .unwrap_or_default())
}

/// A cycle marker reports no children.
pub(super) fn has_children<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let has = node_arg(ctx, args)?
        .is_some_and(|n| !n.is_cycle_marker() && !n.model_items().is_empty());
    Ok(Sequence::atomic(has))
}
