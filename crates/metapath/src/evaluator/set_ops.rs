//! `union`, `intersect` and `except`.
//!
//! Operands are fully evaluated before combining. A union keeps the order in
//! which items first appear. The survivors of `intersect` and `except` are
//! put into document order when they are all nodes.
use core::cmp::Ordering;
use std::collections::HashSet;

use crate::error::Error;
use crate::item::{AtomicValue, Item, Sequence};
use crate::model::MetapathNode;

/// Membership in a right-hand operand: nodes by identity, atomics by value.
struct Members<'a, N> {
    nodes: HashSet<&'a N>,
    atomics: Vec<&'a AtomicValue>,
}

impl<'a, N: MetapathNode> Members<'a, N> {
    fn of(seq: &'a Sequence<N>) -> Self {
        let mut nodes = HashSet::new();
        let mut atomics = Vec::new();
        for it in seq {
            match it {
                Item::Node(n) => {
                    nodes.insert(n);
                }
                Item::Atomic(a) => atomics.push(a),
            }
        }
        Self { nodes, atomics }
    }

    fn contains(&self, item: &Item<N>) -> bool {
        match item {
            Item::Node(n) => self.nodes.contains(n),
            Item::Atomic(a) => self.atomics.iter().any(|other| other.value_eq(a)),
        }
    }
}

fn in_document_order<N: MetapathNode>(items: Sequence<N>) -> Result<Sequence<N>, Error> {
    if items.len() < 2 {
        return Ok(items);
    }
    let Some(mut nodes) = items.nodes() else {
        return Ok(items);
    };
    let mut failure = None;
    nodes.sort_by(|a, b| {
        a.compare_document_order(b).unwrap_or_else(|e| {
            if failure.is_none() {
                failure = Some(e);
            }
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Sequence::from_nodes(nodes)),
    }
}

pub(crate) fn union<N: MetapathNode>(operands: Vec<Sequence<N>>) -> Sequence<N> {
    operands
        .into_iter()
        .flatten()
        .collect::<Sequence<N>>()
        .distinct()
}

pub(crate) fn intersect<N: MetapathNode>(
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let right = Members::of(right);
    in_document_order(
        left.distinct()
            .into_iter()
            .filter(|it| right.contains(it))
            .collect(),
    )
}

pub(crate) fn except<N: MetapathNode>(
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let right = Members::of(right);
    in_document_order(
        left.distinct()
            .into_iter()
            .filter(|it| !right.contains(it))
            .collect(),
    )
}
