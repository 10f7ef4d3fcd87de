//! Items and sequences.
//!
//! An [`Item`] is either a reference into the document tree or an atomic
//! value. A [`Sequence`] is an ordered, immutable collection of items; most
//! sequences produced during evaluation hold zero or one item, so the storage
//! is inline for the singleton case.
mod atomic;
pub(crate) mod numeric;
pub mod temporal;

pub use atomic::{AtomicType, AtomicValue};

use core::fmt;
use std::collections::HashSet;

use smallvec::SmallVec;

use crate::error::{Error, ErrorCode};
use crate::model::{MetapathNode, NodeKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Item<N> {
    Node(N),
    Atomic(AtomicValue),
}

impl<N: MetapathNode> Item<N> {
    pub fn as_node(&self) -> Option<&N> {
        match self {
            Item::Node(n) => Some(n),
            Item::Atomic(_) => None,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicValue> {
        match self {
            Item::Atomic(a) => Some(a),
            Item::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    pub fn string_value(&self) -> String {
        match self {
            Item::Node(n) => n.string_value(),
            Item::Atomic(a) => a.to_string(),
        }
    }

    /// Typed value of the item. Documents and assemblies have none.
    pub fn atomize(&self) -> Result<AtomicValue, Error> {
        match self {
            Item::Atomic(a) => Ok(a.clone()),
            Item::Node(n) => n.typed_value().ok_or_else(|| {
                let what = match n.kind() {
                    NodeKind::Document => "document".to_string(),
                    _ => n
                        .name()
                        .map_or_else(|| n.kind().name().to_string(), |q| q.local),
                };
                Error::from_code(
                    ErrorCode::FOTY0012,
                    format!("{} node '{}' has no typed value", n.kind().name(), what),
                )
            }),
        }
    }

    /// Identity for nodes, value equality for atomics.
    pub fn same_item(&self, other: &Item<N>) -> bool {
        match (self, other) {
            (Item::Node(a), Item::Node(b)) => a == b,
            (Item::Atomic(a), Item::Atomic(b)) => a.value_eq(b),
            _ => false,
        }
    }
}

impl<N> From<AtomicValue> for Item<N> {
    fn from(a: AtomicValue) -> Self {
        Item::Atomic(a)
    }
}

impl<N: MetapathNode> fmt::Display for Item<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Atomic(a) => write!(f, "{a}"),
            Item::Node(n) => match n.name() {
                Some(q) => write!(f, "{}({})", n.kind().name(), q.local),
                None => write!(f, "{}()", n.kind().name()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence<N>(SmallVec<[Item<N>; 1]>);

impl<N> Default for Sequence<N> {
    fn default() -> Self {
        Self(SmallVec::new())
    }
}

impl<N> Sequence<N> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(item: impl Into<Item<N>>) -> Self {
        let mut v = SmallVec::new();
        v.push(item.into());
        Self(v)
    }

    pub fn of<I: IntoIterator<Item = Item<N>>>(items: I) -> Self {
        Self(items.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Item<N>> {
        self.0.iter()
    }

    pub fn items(&self) -> &[Item<N>] {
        &self.0
    }

    pub fn first(&self) -> Option<&Item<N>> {
        self.0.first()
    }

    pub fn get(&self, index: usize) -> Option<&Item<N>> {
        self.0.get(index)
    }

    pub fn into_vec(self) -> Vec<Item<N>> {
        self.0.into_vec()
    }
}

impl<N: MetapathNode> Sequence<N> {
    pub fn node(n: N) -> Self {
        Self::singleton(Item::Node(n))
    }

    pub fn atomic(a: impl Into<AtomicValue>) -> Self {
        Self::singleton(Item::Atomic(a.into()))
    }

    pub fn from_nodes<I: IntoIterator<Item = N>>(nodes: I) -> Self {
        Self(nodes.into_iter().map(Item::Node).collect())
    }

    /// First occurrence of each item wins; later duplicates are dropped.
    /// Nodes compare by identity, atomics by value.
    pub fn distinct(&self) -> Self {
        let mut nodes: HashSet<&N> = HashSet::new();
        let mut atomics: Vec<&AtomicValue> = Vec::new();
        let mut out: SmallVec<[Item<N>; 1]> = SmallVec::new();
        for it in &self.0 {
            let fresh = match it {
                Item::Node(n) => nodes.insert(n),
                Item::Atomic(a) if atomics.iter().any(|seen| seen.value_eq(a)) => false,
                Item::Atomic(a) => {
                    atomics.push(a);
                    true
                }
            };
            if fresh {
                out.push(it.clone());
            }
        }
        Self(out)
    }

    pub fn atomize(&self) -> Result<Vec<AtomicValue>, Error> {
        self.0.iter().map(Item::atomize).collect()
    }

    /// All items as nodes, or `None` if any item is atomic.
    pub fn nodes(&self) -> Option<Vec<N>> {
        self.0.iter().map(|i| i.as_node().cloned()).collect()
    }

    /// Effective boolean value.
    pub fn ebv(&self) -> Result<bool, Error> {
        let Some(first) = self.0.first() else {
            return Ok(false);
        };
        if first.is_node() {
            return Ok(true);
        }
        if self.0.len() > 1 {
            return Err(Error::from_code(
                ErrorCode::FORG0006,
                "effective boolean value of a sequence of two or more atomic items",
            ));
        }
        match first {
            Item::Atomic(AtomicValue::Boolean(b)) => Ok(*b),
            Item::Atomic(AtomicValue::String(s) | AtomicValue::Untyped(s)) => Ok(!s.is_empty()),
            Item::Atomic(AtomicValue::Integer(i)) => Ok(*i != 0),
            Item::Atomic(AtomicValue::Decimal(d)) => Ok(!d.is_zero()),
            Item::Atomic(other) => Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("no effective boolean value for {}", other.type_of()),
            )),
            Item::Node(_) => Ok(true),
        }
    }
}

impl<N> FromIterator<Item<N>> for Sequence<N> {
    fn from_iter<I: IntoIterator<Item = Item<N>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<N> Extend<Item<N>> for Sequence<N> {
    fn extend<I: IntoIterator<Item = Item<N>>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<N> IntoIterator for Sequence<N> {
    type Item = Item<N>;
    type IntoIter = smallvec::IntoIter<[Item<N>; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, N> IntoIterator for &'a Sequence<N> {
    type Item = &'a Item<N>;
    type IntoIter = core::slice::Iter<'a, Item<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<N: MetapathNode> fmt::Display for Sequence<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, it) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{it}")?;
        }
        f.write_str(")")
    }
}
