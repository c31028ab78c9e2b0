//! The stock comparison visitors.
//!
//! [`DiffBuilder`](crate::DiffBuilder) lives with the diff tree it builds.

use std::collections::BTreeSet;

use schemata_model::{NodeKind, NodeRef, PropertyKey};

use crate::compare::{CollectionMode, Comparator, ComparisonVisitor, ValueContext};

/// Plain structural equality: every property, all the way down.
#[derive(Debug, Clone, Copy, Default)]
pub struct Structural;

impl<'t> ComparisonVisitor<'t> for Structural {
    fn identity_short_cut(&mut self, left: NodeRef<'t>, right: Option<NodeRef<'t>>) -> bool {
        right == Some(left)
    }

    fn compare_value(&mut self, _cx: &ValueContext<'t>, lazy_eq: &dyn Fn() -> bool) -> bool {
        lazy_eq()
    }

    fn finalize(&mut self, _left: NodeRef<'t>, right: Option<NodeRef<'t>>, equal: bool) -> bool {
        equal && right.is_some()
    }
}

/// Structural equality restricted to a set of property keys.
///
/// A key takes part when it is in the include set (or there is none) and
/// not in the exclude set. Filtered keys count as equal, including nested
/// and collection-valued ones, which are not descended into.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include: Option<BTreeSet<PropertyKey>>,
    exclude: BTreeSet<PropertyKey>,
}

impl Filter {
    pub fn new(
        include: Option<impl IntoIterator<Item = PropertyKey>>,
        exclude: impl IntoIterator<Item = PropertyKey>,
    ) -> Self {
        Self {
            include: include.map(|keys| keys.into_iter().collect()),
            exclude: exclude.into_iter().collect(),
        }
    }

    pub fn including(keys: impl IntoIterator<Item = PropertyKey>) -> Self {
        Self {
            include: Some(keys.into_iter().collect()),
            exclude: BTreeSet::new(),
        }
    }

    pub fn excluding(keys: impl IntoIterator<Item = PropertyKey>) -> Self {
        Self {
            include: None,
            exclude: keys.into_iter().collect(),
        }
    }

    pub fn passes(&self, key: PropertyKey) -> bool {
        self.include.as_ref().is_none_or(|keys| keys.contains(&key)) && !self.exclude.contains(&key)
    }
}

impl<'t> ComparisonVisitor<'t> for Filter {
    fn identity_short_cut(&mut self, left: NodeRef<'t>, right: Option<NodeRef<'t>>) -> bool {
        right == Some(left)
    }

    fn compare_value(&mut self, cx: &ValueContext<'t>, lazy_eq: &dyn Fn() -> bool) -> bool {
        !self.passes(cx.key) || lazy_eq()
    }

    fn finalize(&mut self, _left: NodeRef<'t>, right: Option<NodeRef<'t>>, equal: bool) -> bool {
        equal && right.is_some()
    }

    fn ignores(&self, key: PropertyKey) -> bool {
        !self.passes(key)
    }
}

/// Walks a single tree and hands every node accepted by `predicate` to
/// `sink`, in pre-order. The root itself is never offered.
pub struct Collector<P, S> {
    predicate: P,
    sink: S,
}

impl<P, S> Collector<P, S> {
    pub fn new(predicate: P, sink: S) -> Self {
        Self { predicate, sink }
    }
}

impl<'t, P, S> ComparisonVisitor<'t> for Collector<P, S>
where
    P: FnMut(NodeRef<'t>) -> bool,
    S: FnMut(NodeRef<'t>),
{
    fn identity_short_cut(&mut self, _left: NodeRef<'t>, _right: Option<NodeRef<'t>>) -> bool {
        false
    }

    fn compare_value(&mut self, _cx: &ValueContext<'t>, _lazy_eq: &dyn Fn() -> bool) -> bool {
        true
    }

    fn finalize(&mut self, _left: NodeRef<'t>, _right: Option<NodeRef<'t>>, _equal: bool) -> bool {
        true
    }

    fn fails_fast(&self) -> bool {
        false
    }

    fn collection_mode(&self) -> CollectionMode {
        CollectionMode::Walk
    }

    fn descends_unmatched(&self) -> bool {
        true
    }

    fn enter(&mut self, _key: PropertyKey, left: NodeRef<'t>, _right: Option<NodeRef<'t>>) {
        if (self.predicate)(left) {
            (self.sink)(left);
        }
    }
}

/// Every node under `root` accepted by `predicate`, in pre-order.
pub fn collect<'t>(root: NodeRef<'t>, predicate: impl FnMut(NodeRef<'t>) -> bool) -> Vec<NodeRef<'t>> {
    let mut found = Vec::new();
    {
        let mut collector = Collector::new(predicate, |node| found.push(node));
        Comparator::default().compare(root, None, &mut collector);
    }
    found
}

/// Every node of `kind` under `root`.
pub fn collect_kind(root: NodeRef<'_>, kind: NodeKind) -> Vec<NodeRef<'_>> {
    collect(root, |node| node.kind() == kind)
}
