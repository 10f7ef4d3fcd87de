//! Path combinators, steps and node tests.
use tracing::trace;

use super::{apply_predicates, eval, require_focus};
use crate::ast::{Expr, Step, Wildcard};
use crate::context::DynamicContext;
use crate::error::{Error, ErrorCode};
use crate::item::{Item, Sequence};
use crate::model::{ExpandedName, MetapathNode, NodeKind};

/// Root of the tree holding the first focus item. `None` on an empty focus.
fn root_of<N: MetapathNode>(focus: Option<&Sequence<N>>) -> Result<Option<N>, Error> {
    let Some(first) = require_focus(focus)?.first() else {
        return Ok(None);
    };
    let Item::Node(node) = first else {
        return Err(Error::from_code(
            ErrorCode::MPTY0019,
            format!("cannot select the root of non-node item '{first}'"),
        ));
    };
    let root = node.root();
    if root.kind() != NodeKind::Document {
        return Err(Error::from_code(
            ErrorCode::MPDY0050,
            format!("root of the context is a {} node, not a document", root.kind().name()),
        ));
    }
    Ok(Some(root))
}

fn base_nodes<N: MetapathNode>(base: &Sequence<N>) -> Result<Vec<N>, Error> {
    base.nodes().ok_or_else(|| {
        Error::from_code(
            ErrorCode::MPTY0020,
            format!("base path is not a sequence of nodes: {base}"),
        )
    })
}

pub(super) fn root_slash_only<N: MetapathNode>(
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    Ok(root_of(focus)?.map(Sequence::node).unwrap_or_default())
}

pub(super) fn root_slash<N: MetapathNode>(
    path: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    match root_of(focus)? {
        Some(root) => eval(path, ctx, Some(&Sequence::node(root))),
        None => Ok(Sequence::empty()),
    }
}

pub(super) fn root_double_slash<N: MetapathNode>(
    path: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let mut out = Sequence::empty();
    if let Some(root) = root_of(focus)? {
        search(path, ctx, &root, &mut out)?;
    }
    Ok(out)
}

/// `left/right`: `right` is evaluated once per node of `left`, results are
/// concatenated in that order.
pub(super) fn relative_slash<N: MetapathNode>(
    left: &Expr,
    right: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let base = eval(left, ctx, focus)?;
    let mut out = Sequence::empty();
    for node in base_nodes(&base)? {
        out.extend(eval(right, ctx, Some(&Sequence::node(node)))?);
    }
    Ok(out)
}

pub(super) fn relative_double_slash<N: MetapathNode>(
    left: &Expr,
    right: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let base = eval(left, ctx, focus)?;
    let mut out = Sequence::empty();
    for node in base_nodes(&base)? {
        search(right, ctx, &node, &mut out)?;
    }
    Ok(out)
}

/// Depth-first pre-order search: `expr` is evaluated with `node` as focus,
/// then the search continues into the flags and model items. A cycle marker
/// is evaluated but not entered.
pub(super) fn search<N: MetapathNode>(
    expr: &Expr,
    ctx: &DynamicContext<N>,
    node: &N,
    out: &mut Sequence<N>,
) -> Result<(), Error> {
    out.extend(eval(expr, ctx, Some(&Sequence::node(node.clone())))?);
    if node.is_cycle_marker() {
        trace!(name = ?node.name(), "search stops at cycle marker");
        return Ok(());
    }
    for child in node.flags().into_iter().chain(node.model_items()) {
        search(expr, ctx, &child, out)?;
    }
    Ok(())
}

pub(super) fn step<N: MetapathNode>(
    step: &Step,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let mut out = Sequence::empty();
    for item in require_focus(focus)? {
        let Item::Node(node) = item else {
            return Err(Error::from_code(
                ErrorCode::MPTY0019,
                format!(
                    "not a node item for step along the {} axis: '{item}'",
                    step.axis.name()
                ),
            ));
        };
        let mut matched = Vec::new();
        for candidate in super::axis::select(step.axis, node) {
            let probe = Sequence::node(candidate);
            if eval(&step.test, ctx, Some(&probe))?.ebv()? {
                matched.extend(probe);
            }
        }
        out.extend(apply_predicates(
            matched,
            &step.predicates,
            ctx,
            step.axis.is_reverse(),
        )?);
    }
    Ok(out)
}

/// Focus nodes whose name passes `test`.
pub(super) fn name_test<N: MetapathNode>(
    test: &ExpandedName,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    Ok(require_focus(focus)?
        .iter()
        .filter(|it| it.as_node().is_some_and(|n| name_matches(test, n)))
        .cloned()
        .collect())
}

pub(super) fn wildcard_test<N: MetapathNode>(
    wildcard: &Wildcard,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    Ok(require_focus(focus)?
        .iter()
        .filter(|it| it.as_node().is_some_and(|n| wildcard_matches(wildcard, n)))
        .cloned()
        .collect())
}

/// A test without a namespace matches on the local name alone.
fn name_matches<N: MetapathNode>(test: &ExpandedName, node: &N) -> bool {
    node.name().is_some_and(|name| {
        name.local == test.local && (test.ns_uri.is_none() || test.ns_uri == name.ns_uri)
    })
}

fn wildcard_matches<N: MetapathNode>(wildcard: &Wildcard, node: &N) -> bool {
    match wildcard {
        Wildcard::AnyNode => true,
        Wildcard::AnyName => node.name().is_some(),
        Wildcard::LocalName(local) => node.name().is_some_and(|n| &n.local == local),
        Wildcard::Namespace(ns) => node
            .name()
            .is_some_and(|n| n.ns_uri.as_deref() == Some(ns.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::{SimpleNode, assembly};

    #[test]
    fn unqualified_test_ignores_node_namespace() {
        let node = SimpleNode::assembly(ExpandedName::new(Some("urn:x"), "part")).build();
        assert!(name_matches(&ExpandedName::local("part"), &node));
        assert!(name_matches(&ExpandedName::new(Some("urn:x"), "part"), &node));
        assert!(!name_matches(&ExpandedName::new(Some("urn:y"), "part"), &node));
    }

    #[test]
    fn wildcards() {
        let node = SimpleNode::assembly(ExpandedName::new(Some("urn:x"), "part")).build();
        let plain = assembly("part").build();
        assert!(wildcard_matches(&Wildcard::AnyName, &node));
        assert!(wildcard_matches(&Wildcard::LocalName("part".into()), &plain));
        assert!(wildcard_matches(&Wildcard::Namespace("urn:x".into()), &node));
        assert!(!wildcard_matches(&Wildcard::Namespace("urn:x".into()), &plain));
        assert!(!wildcard_matches(&Wildcard::AnyName, &SimpleNode::document().build()));
        assert!(wildcard_matches(&Wildcard::AnyNode, &SimpleNode::document().build()));
    }
}
