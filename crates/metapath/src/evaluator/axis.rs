use crate::ast::Axis;
use crate::model::MetapathNode;

/// Nodes reachable from `node` along `axis`, in document order.
///
/// No filtering happens here. A cycle marker has no children as far as the
/// child and descendant axes are concerned.
pub(crate) fn select<N: MetapathNode>(axis: Axis, node: &N) -> Vec<N> {
    match axis {
        Axis::SelfAxis => vec![node.clone()],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors(),
        Axis::AncestorOrSelf => node.ancestors_or_self(),
        Axis::Children if node.is_cycle_marker() => Vec::new(),
        Axis::Children => node.model_items(),
        Axis::Descendant => node.descendants(),
        Axis::DescendantOrSelf => node.descendants_or_self(),
        Axis::Flag => node.flags(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use crate::simple_node::{SimpleNode, assembly, cycled, doc, field, flag};

    fn names(nodes: &[SimpleNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.name().map_or_else(|| n.kind().name().to_string(), |q| q.local))
            .collect()
    }

    fn sample() -> SimpleNode {
        doc()
            .child(
                assembly("catalog")
                    .flag(flag("id", "c1"))
                    .child(assembly("group").child(field("title", "G")).child(cycled("group")))
                    .child(field("title", "C")),
            )
            .build()
    }

    #[test]
    fn child_and_descendant_axes_keep_model_order() {
        let d = sample();
        let catalog = d.model_items()[0].clone();
        assert_eq!(names(&select(Axis::Children, &catalog)), ["group", "title"]);
        assert_eq!(
            names(&select(Axis::DescendantOrSelf, &catalog)),
            ["catalog", "group", "title", "group", "title"]
        );
        assert_eq!(names(&select(Axis::Flag, &catalog)), ["id"]);
    }

    #[test]
    fn cycle_marker_is_a_leaf() {
        let d = sample();
        let group = d.model_items()[0].model_items()[0].clone();
        let marker = group.model_items()[1].clone();
        assert_eq!(marker.kind(), NodeKind::CycledAssembly);
        assert!(select(Axis::Children, &marker).is_empty());
        assert!(select(Axis::Descendant, &marker).is_empty());
    }

    #[test]
    fn ancestors_are_root_first() {
        let d = sample();
        let title = d.model_items()[0].model_items()[0].model_items()[0].clone();
        assert_eq!(names(&select(Axis::Ancestor, &title)), ["document", "catalog", "group"]);
        assert_eq!(names(&select(Axis::Parent, &title)), ["group"]);
        assert!(select(Axis::Parent, &d).is_empty());
    }
}
