//! In-memory document tree implementing [`MetapathNode`], for tests and
//! embedders that build their tree by hand.
//!
//! Example:
//! ```
//! use metapath::simple_node::{assembly, doc, field, flag};
//! use metapath::MetapathNode;
//!
//! let document = doc()
//!     .child(
//!         assembly("catalog")
//!             .flag(flag("uuid", "c-1"))
//!             .child(field("title", "Controls"))
//!             .child(assembly("group").flag(flag("id", "ac"))),
//!     )
//!     .build();
//! let catalog = document.model_items()[0].clone();
//! assert_eq!(catalog.name().unwrap().local, "catalog");
//! assert_eq!(catalog.flags().len(), 1);
//! assert_eq!(catalog.string_value(), "Controls");
//! ```
//!
//! Recursive definitions are cut with a cycle marker:
//! ```
//! use metapath::simple_node::{assembly, cycled, doc};
//! use metapath::{MetapathNode, NodeKind};
//!
//! let document = doc()
//!     .child(assembly("part").child(assembly("part").child(cycled("part"))))
//!     .build();
//! let all = document.descendants();
//! assert_eq!(all.len(), 3);
//! assert_eq!(all[2].kind(), NodeKind::CycledAssembly);
//! ```
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use crate::item::AtomicValue;
use crate::model::{ExpandedName, MetapathNode, NodeKind};

#[derive(Debug)]
pub(crate) struct Inner {
    kind: NodeKind,
    name: Option<ExpandedName>,
    value: Option<AtomicValue>,
    parent: RwLock<Option<Weak<Inner>>>,
    flags: RwLock<Vec<SimpleNode>>,
    model: RwLock<Vec<SimpleNode>>,
}

/// An `Arc`-backed node; clones share identity.
#[derive(Clone)]
pub struct SimpleNode(pub(crate) Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    fn new(kind: NodeKind, name: Option<ExpandedName>, value: Option<AtomicValue>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            parent: RwLock::new(None),
            flags: RwLock::new(Vec::new()),
            model: RwLock::new(Vec::new()),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None, None)
    }

    pub fn assembly(name: impl Into<ExpandedName>) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Assembly, Some(name.into()), None)
    }

    /// A recursion cut: an assembly whose definition repeats an ancestor's.
    pub fn cycled_assembly(name: impl Into<ExpandedName>) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::CycledAssembly, Some(name.into()), None)
    }

    /// A field whose raw text is untyped.
    pub fn field(name: impl Into<ExpandedName>, value: &str) -> SimpleNodeBuilder {
        Self::typed_field(name, AtomicValue::untyped(value))
    }

    pub fn typed_field(name: impl Into<ExpandedName>, value: AtomicValue) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Field, Some(name.into()), Some(value))
    }

    pub fn flag(name: impl Into<ExpandedName>, value: &str) -> SimpleNode {
        Self::typed_flag(name, AtomicValue::untyped(value))
    }

    pub fn typed_flag(name: impl Into<ExpandedName>, value: AtomicValue) -> SimpleNode {
        SimpleNode::new(NodeKind::Flag, Some(name.into()), Some(value))
    }

    fn adopt(&self, child: &SimpleNode) {
        if let Ok(mut p) = child.0.parent.write() {
            *p = Some(Arc::downgrade(&self.0));
        }
    }
}

pub struct SimpleNodeBuilder {
    node: SimpleNode,
    pending_flags: Vec<SimpleNode>,
    pending_model: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<ExpandedName>, value: Option<AtomicValue>) -> Self {
        Self {
            node: SimpleNode::new(kind, name, value),
            pending_flags: Vec::new(),
            pending_model: Vec::new(),
        }
    }

    pub fn flag(mut self, flag: SimpleNode) -> Self {
        debug_assert!(flag.kind() == NodeKind::Flag);
        self.pending_flags.push(flag);
        self
    }

    pub fn flags<I: IntoIterator<Item = SimpleNode>>(mut self, flags: I) -> Self {
        for f in flags {
            debug_assert!(f.kind() == NodeKind::Flag);
            self.pending_flags.push(f);
        }
        self
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.pending_model.push(child.into().into_node());
        self
    }

    pub fn children<I>(mut self, it: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SimpleNodeOrBuilder>,
    {
        self.pending_model
            .extend(it.into_iter().map(|c| c.into().into_node()));
        self
    }

    pub fn build(self) -> SimpleNode {
        for f in self.pending_flags.iter().chain(&self.pending_model) {
            self.node.adopt(f);
        }
        if let Ok(mut flags) = self.node.0.flags.write() {
            flags.extend(self.pending_flags);
        }
        if let Ok(mut model) = self.node.0.model.write() {
            model.extend(self.pending_model);
        }
        self.node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl SimpleNodeOrBuilder {
    fn into_node(self) -> SimpleNode {
        match self {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}

impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

// Short helpers for test trees
pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}
pub fn assembly(name: &str) -> SimpleNodeBuilder {
    SimpleNode::assembly(name)
}
pub fn cycled(name: &str) -> SimpleNodeBuilder {
    SimpleNode::cycled_assembly(name)
}
pub fn field(name: &str, value: &str) -> SimpleNodeBuilder {
    SimpleNode::field(name, value)
}
pub fn flag(name: &str, value: &str) -> SimpleNode {
    SimpleNode::flag(name, value)
}

impl MetapathNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }
    fn name(&self) -> Option<ExpandedName> {
        self.0.name.clone()
    }
    fn parent(&self) -> Option<Self> {
        self.0
            .parent
            .read()
            .ok()?
            .as_ref()
            .and_then(Weak::upgrade)
            .map(SimpleNode)
    }
    fn flags(&self) -> Vec<Self> {
        self.0.flags.read().map(|v| v.clone()).unwrap_or_default()
    }
    fn model_items(&self) -> Vec<Self> {
        self.0.model.read().map(|v| v.clone()).unwrap_or_default()
    }
    fn typed_value(&self) -> Option<AtomicValue> {
        self.0.value.clone()
    }
}
