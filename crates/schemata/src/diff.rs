//! Diff trees - what changed between two versions of a schema tree.
//!
//! A [`DiffTree`] mirrors the part of the compared trees that differs. Each
//! [`DiffNode`] names the property it hangs off, the original and target
//! subjects (a node or a scalar value), and a [`ChangeState`]. The root
//! stands for the two compared nodes themselves and is never part of the
//! reported differences.
//!
//! ```text
//! Changes detected:
//!
//!   ~ table customer
//!     ~ column mail
//!       ~ name: email -> mail
//!     + column phone
//! ```
//!
//! Renamed entities are paired by resemblance (see [`crate::compare`]), so
//! the rename above shows as a modified column rather than a drop and an add.

use std::fmt;
use std::ops::Index;

use schemata_model::{NodeRef, PropertyKey, Scalar};

use crate::compare::{Comparator, ComparisonVisitor, ValueContext};

/// What happened to a subject between original and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeState {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

impl ChangeState {
    /// The state seen from the other direction.
    pub fn reversed(self) -> Self {
        match self {
            ChangeState::Added => ChangeState::Deleted,
            ChangeState::Deleted => ChangeState::Added,
            other => other,
        }
    }

    fn symbol(self) -> char {
        match self {
            ChangeState::Added => '+',
            ChangeState::Modified => '~',
            ChangeState::Deleted => '-',
            ChangeState::Unchanged => ' ',
        }
    }
}

/// One side of a difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiffSubject<'t> {
    Node(NodeRef<'t>),
    Value(&'t Scalar),
}

impl fmt::Display for DiffSubject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffSubject::Node(node) => write!(f, "{}", node),
            DiffSubject::Value(value) => write!(f, "{}", value),
        }
    }
}

/// Handle to a node of a [`DiffTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiffId(usize);

#[derive(Debug, Clone)]
pub struct DiffNode<'t> {
    id: DiffId,
    key: Option<PropertyKey>,
    original: Option<DiffSubject<'t>>,
    target: Option<DiffSubject<'t>>,
    state: ChangeState,
    parent: Option<DiffId>,
    children: Vec<DiffId>,
}

impl<'t> DiffNode<'t> {
    pub fn id(&self) -> DiffId {
        self.id
    }

    /// The property this difference sits under; `None` for the root and for
    /// the two sides of a root-level kind mismatch.
    pub fn key(&self) -> Option<PropertyKey> {
        self.key
    }

    pub fn original(&self) -> Option<DiffSubject<'t>> {
        self.original
    }

    pub fn target(&self) -> Option<DiffSubject<'t>> {
        self.target
    }

    pub fn state(&self) -> ChangeState {
        self.state
    }

    pub fn parent(&self) -> Option<DiffId> {
        self.parent
    }

    pub fn children(&self) -> &[DiffId] {
        &self.children
    }

    /// True for differences between two scalar values.
    pub fn is_value(&self) -> bool {
        matches!(
            self.original.or(self.target),
            Some(DiffSubject::Value(_))
        )
    }
}

impl fmt::Display for DiffNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.state.symbol();
        if self.is_value() {
            let key = self.key.map(|k| k.as_str()).unwrap_or("value");
            let show = |s: Option<DiffSubject<'_>>| {
                s.map(|s| s.to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            };
            return match self.state {
                ChangeState::Added => write!(f, "{} {}: {}", symbol, key, show(self.target)),
                ChangeState::Deleted => write!(f, "{} {}: {}", symbol, key, show(self.original)),
                _ => write!(
                    f,
                    "{} {}: {} -> {}",
                    symbol,
                    key,
                    show(self.original),
                    show(self.target)
                ),
            };
        }
        match self.target.or(self.original) {
            Some(subject) => write!(f, "{} {}", symbol, subject),
            None => write!(f, "{}", symbol),
        }
    }
}

/// An arena of [`DiffNode`]s under a single root.
#[derive(Debug, Clone)]
pub struct DiffTree<'t> {
    nodes: Vec<DiffNode<'t>>,
    root: DiffId,
}

impl<'t> DiffTree<'t> {
    fn new(original: NodeRef<'t>, target: NodeRef<'t>) -> Self {
        let root = DiffNode {
            id: DiffId(0),
            key: None,
            original: Some(DiffSubject::Node(original)),
            target: Some(DiffSubject::Node(target)),
            state: ChangeState::Unchanged,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: DiffId(0),
        }
    }

    fn push(
        &mut self,
        parent: DiffId,
        key: Option<PropertyKey>,
        original: Option<DiffSubject<'t>>,
        target: Option<DiffSubject<'t>>,
        state: ChangeState,
    ) -> DiffId {
        let id = DiffId(self.nodes.len());
        self.nodes.push(DiffNode {
            id,
            key,
            original,
            target,
            state,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn unlink(&mut self, id: DiffId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn root(&self) -> &DiffNode<'t> {
        &self[self.root]
    }

    pub fn get(&self, id: DiffId) -> Option<&DiffNode<'t>> {
        self.nodes.get(id.0)
    }

    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.root().children.is_empty()
    }

    /// Count of reported differences.
    pub fn change_count(&self) -> usize {
        self.to_difference_list().len()
    }

    /// Every difference below the root, in pre-order.
    pub fn to_difference_list(&self) -> Vec<&DiffNode<'t>> {
        self.walk().into_iter().map(|(_, id)| &self[id]).collect()
    }

    /// Pre-order walk below the root, with depths starting at 0.
    fn walk(&self) -> Vec<(usize, DiffId)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, DiffId)> = self.root().children.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            stack.extend(self[id].children.iter().rev().map(|c| (depth + 1, *c)));
        }
        out
    }

    /// Drop every descendant of the root matching `predicate`, together with
    /// its subtree. Returns how many matching nodes were cut.
    pub fn remove_recursive(&mut self, mut predicate: impl FnMut(&DiffNode<'t>) -> bool) -> usize {
        let mut removed = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let children = std::mem::take(&mut self.nodes[id.0].children);
            let mut kept = Vec::with_capacity(children.len());
            for child in children {
                if predicate(&self.nodes[child.0]) {
                    self.nodes[child.0].parent = None;
                    removed += 1;
                } else {
                    kept.push(child);
                    stack.push(child);
                }
            }
            self.nodes[id.0].children = kept;
        }
        removed
    }

    /// Flip the direction of the diff in place: original and target swap,
    /// and additions become deletions and vice versa.
    pub fn reverse(&mut self) {
        for node in &mut self.nodes {
            std::mem::swap(&mut node.original, &mut node.target);
            node.state = node.state.reversed();
        }
    }
}

impl<'t> Index<DiffId> for DiffTree<'t> {
    type Output = DiffNode<'t>;

    fn index(&self, id: DiffId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl fmt::Display for DiffTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "No changes detected.")?;
        } else {
            writeln!(f, "Changes detected:\n")?;
            for (depth, id) in self.walk() {
                writeln!(f, "{:indent$}{}", "", self[id], indent = 2 + depth * 2)?;
            }
        }
        Ok(())
    }
}

/// The visitor that records differences into a [`DiffTree`].
///
/// Every paired child is entered as a provisional modification and removed
/// again on the way out if it turned out equal.
pub struct DiffBuilder<'t> {
    tree: DiffTree<'t>,
    stack: Vec<DiffId>,
}

impl<'t> DiffBuilder<'t> {
    pub fn new(original: NodeRef<'t>, target: NodeRef<'t>) -> Self {
        Self {
            tree: DiffTree::new(original, target),
            stack: Vec::new(),
        }
    }

    fn current(&self) -> DiffId {
        self.stack.last().copied().unwrap_or(self.tree.root)
    }

    /// Take the finished tree. `equal` is the verdict of the comparison.
    pub fn finish(mut self, equal: bool) -> DiffTree<'t> {
        let root = self.tree.root;
        self.tree.nodes[root.0].state = if equal {
            ChangeState::Unchanged
        } else {
            ChangeState::Modified
        };
        self.tree
    }
}

impl<'t> ComparisonVisitor<'t> for DiffBuilder<'t> {
    fn identity_short_cut(&mut self, _left: NodeRef<'t>, _right: Option<NodeRef<'t>>) -> bool {
        false
    }

    fn compare_value(&mut self, cx: &ValueContext<'t>, lazy_eq: &dyn Fn() -> bool) -> bool {
        if lazy_eq() {
            return true;
        }
        let state = match (cx.left_value, cx.right_value) {
            (None, Some(_)) => ChangeState::Added,
            (Some(_), None) => ChangeState::Deleted,
            _ => ChangeState::Modified,
        };
        let parent = self.current();
        self.tree.push(
            parent,
            Some(cx.key),
            cx.left_value.map(DiffSubject::Value),
            cx.right_value.map(DiffSubject::Value),
            state,
        );
        false
    }

    fn finalize(&mut self, _left: NodeRef<'t>, _right: Option<NodeRef<'t>>, equal: bool) -> bool {
        equal
    }

    fn fails_fast(&self) -> bool {
        false
    }

    fn enter(&mut self, key: PropertyKey, left: NodeRef<'t>, right: Option<NodeRef<'t>>) {
        let parent = self.current();
        let id = self.tree.push(
            parent,
            Some(key),
            Some(DiffSubject::Node(left)),
            right.map(DiffSubject::Node),
            ChangeState::Modified,
        );
        self.stack.push(id);
    }

    fn leave(&mut self, equal: bool) {
        if let Some(id) = self.stack.pop()
            && equal
        {
            // Everything pushed since `id` lies in its subtree.
            self.tree.unlink(id);
            self.tree.nodes.truncate(id.0);
        }
    }

    fn unmatched(
        &mut self,
        key: Option<PropertyKey>,
        left: Option<NodeRef<'t>>,
        right: Option<NodeRef<'t>>,
    ) -> bool {
        let state = match (left, right) {
            (Some(_), None) => ChangeState::Deleted,
            (None, Some(_)) => ChangeState::Added,
            _ => return left.is_none(),
        };
        let parent = self.current();
        self.tree.push(
            parent,
            key,
            left.map(DiffSubject::Node),
            right.map(DiffSubject::Node),
            state,
        );
        false
    }
}

impl Comparator {
    /// Build the diff from `original` to `target`.
    pub fn diff<'t>(&self, original: NodeRef<'t>, target: NodeRef<'t>) -> DiffTree<'t> {
        let _span = tracing::debug_span!("diff", original = %original, target = %target).entered();
        let mut builder = DiffBuilder::new(original, target);
        let equal = self.compare(original, Some(target), &mut builder);
        let tree = builder.finish(equal);
        tracing::debug!(changes = tree.change_count(), "diff built");
        tree
    }
}

/// Diff with the default configuration.
pub fn diff<'t>(original: NodeRef<'t>, target: NodeRef<'t>) -> DiffTree<'t> {
    Comparator::default().diff(original, target)
}
