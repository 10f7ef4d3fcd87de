use core::cmp::Ordering;
use core::fmt;
use core::hash::Hash;

use crate::error::{Error, ErrorCode};
use crate::item::AtomicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Assembly,
    /// An assembly whose definition already occurs among its ancestors.
    /// Name tests treat it as an assembly; traversal treats it as a leaf.
    CycledAssembly,
    Field,
    Flag,
}

impl NodeKind {
    pub fn is_assembly(&self) -> bool {
        matches!(self, NodeKind::Assembly | NodeKind::CycledAssembly)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Assembly => "assembly",
            NodeKind::CycledAssembly => "cycled-assembly",
            NodeKind::Field => "field",
            NodeKind::Flag => "flag",
        }
    }
}

/// A namespace-qualified name. Names without a namespace have `ns_uri: None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<&str>, local: &str) -> Self {
        Self {
            ns_uri: ns_uri.map(str::to_string),
            local: local.to_string(),
        }
    }

    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }
}

impl From<&str> for ExpandedName {
    fn from(local: &str) -> Self {
        ExpandedName::local(local)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Compare two nodes by ancestry and sibling order.
///
/// - An ancestor precedes its descendants.
/// - Among siblings, flags come before model items; within each group the
///   adapter's order is kept.
/// - Nodes under different roots have no order here (`FOER0000`); adapters
///   holding several trees override [`MetapathNode::compare_document_order`]
///   or supply a [`MetapathNode::doc_order_key`].
pub fn try_compare_by_ancestry<N: MetapathNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    let pa = a.ancestors_or_self();
    let pb = b.ancestors_or_self();
    let common = pa.iter().zip(pb.iter()).take_while(|(x, y)| x == y).count();
    if common == pa.len() || common == pb.len() {
        return Ok(pa.len().cmp(&pb.len()));
    }
    if common == 0 {
        return Err(Error::from_code(
            ErrorCode::FOER0000,
            "document order undefined for nodes from different roots",
        ));
    }
    let parent = &pa[common - 1];
    let siblings: Vec<N> = parent
        .flags()
        .into_iter()
        .chain(parent.model_items())
        .collect();
    let pos_a = siblings.iter().position(|n| n == &pa[common]);
    let pos_b = siblings.iter().position(|n| n == &pb[common]);
    Ok(match (pos_a, pos_b) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    })
}

/// The navigable document tree the engine queries.
///
/// Adapters implement the structural accessors; traversal helpers are
/// provided. Node identity is `Eq` and `Hash` on the adapter type and must be
/// reference identity, not value identity.
pub trait MetapathNode: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<ExpandedName>;
    fn parent(&self) -> Option<Self>;
    /// Attribute-like children.
    fn flags(&self) -> Vec<Self>;
    /// Field and assembly children in model order. For a
    /// [`NodeKind::CycledAssembly`] this may be empty or repeat an ancestor's
    /// structure; the engine never descends into it.
    fn model_items(&self) -> Vec<Self>;
    /// Typed value of a field or flag; `None` for documents and assemblies.
    fn typed_value(&self) -> Option<AtomicValue>;

    /// Text of a field or flag, or the concatenated text of the fields
    /// beneath a document or assembly.
    fn string_value(&self) -> String {
        if let Some(v) = self.typed_value() {
            return v.to_string();
        }
        let mut out = String::new();
        for d in self.descendants() {
            if matches!(d.kind(), NodeKind::Field)
                && let Some(v) = d.typed_value()
            {
                out.push_str(&v.to_string());
            }
        }
        out
    }

    fn is_cycle_marker(&self) -> bool {
        self.kind() == NodeKind::CycledAssembly
    }

    /// Ancestors in document order, root first.
    fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    fn ancestors_or_self(&self) -> Vec<Self> {
        let mut out = self.ancestors();
        out.push(self.clone());
        out
    }

    /// Model-item descendants in pre-order. A cycle marker is reported but
    /// not entered.
    fn descendants(&self) -> Vec<Self> {
        fn walk<N: MetapathNode>(n: &N, out: &mut Vec<N>) {
            if n.is_cycle_marker() {
                return;
            }
            for c in n.model_items() {
                out.push(c.clone());
                walk(&c, out);
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    fn descendants_or_self(&self) -> Vec<Self> {
        let mut out = vec![self.clone()];
        out.extend(self.descendants());
        out
    }

    fn root(&self) -> Self {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }

    /// Optional precomputed global order (e.g. `(tree, preorder index)` packed).
    fn doc_order_key(&self) -> Option<u64> {
        None
    }

    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        if let (Some(a), Some(b)) = (self.doc_order_key(), other.doc_order_key()) {
            return Ok(a.cmp(&b));
        }
        try_compare_by_ancestry(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::{SimpleNode, assembly, doc, field, flag};

    fn sample() -> SimpleNode {
        doc()
            .child(
                assembly("catalog")
                    .flag(flag("id", "c1"))
                    .child(assembly("group").child(field("title", "G")))
                    .child(field("title", "C")),
            )
            .build()
    }

    #[test]
    fn ancestors_precede_descendants() {
        let d = sample();
        let catalog = d.model_items()[0].clone();
        let title = catalog.model_items()[0].model_items()[0].clone();
        assert_eq!(try_compare_by_ancestry(&catalog, &title).unwrap(), Ordering::Less);
        assert_eq!(try_compare_by_ancestry(&title, &d).unwrap(), Ordering::Greater);
        assert_eq!(try_compare_by_ancestry(&title, &title).unwrap(), Ordering::Equal);
    }

    #[test]
    fn flags_precede_model_siblings() {
        let d = sample();
        let catalog = d.model_items()[0].clone();
        let id = catalog.flags()[0].clone();
        let group = catalog.model_items()[0].clone();
        let title = catalog.model_items()[1].clone();
        assert_eq!(id.compare_document_order(&group).unwrap(), Ordering::Less);
        assert_eq!(title.compare_document_order(&group).unwrap(), Ordering::Greater);
        let nested = group.model_items()[0].clone();
        assert_eq!(nested.compare_document_order(&title).unwrap(), Ordering::Less);
    }

    #[test]
    fn separate_trees_are_unordered() {
        let (a, b) = (sample(), sample());
        let err = a.model_items()[0]
            .compare_document_order(&b.model_items()[0])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FOER0000);
    }

    /// A detached node carrying a global order key.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Keyed(SimpleNode, u64);

    impl MetapathNode for Keyed {
        fn kind(&self) -> NodeKind {
            self.0.kind()
        }
        fn name(&self) -> Option<ExpandedName> {
            self.0.name()
        }
        fn parent(&self) -> Option<Self> {
            None
        }
        fn flags(&self) -> Vec<Self> {
            Vec::new()
        }
        fn model_items(&self) -> Vec<Self> {
            Vec::new()
        }
        fn typed_value(&self) -> Option<AtomicValue> {
            self.0.typed_value()
        }
        fn doc_order_key(&self) -> Option<u64> {
            Some(self.1)
        }
    }

    #[test]
    fn order_keys_take_precedence_over_ancestry() {
        let (a, b) = (sample(), sample());
        let first = Keyed(b, 1);
        let second = Keyed(a, 2);
        assert_eq!(first.compare_document_order(&second).unwrap(), Ordering::Less);
        assert!(try_compare_by_ancestry(&first, &second).is_err());
    }
}
