//! The comparison protocol.
//!
//! A single traversal engine walks two trees side by side, guided by the
//! property descriptors of each node kind. What the walk *means* is decided
//! by a [`ComparisonVisitor`]: structural equality, filtered equality
//! ("resemblance"), collection of matching nodes, and diff construction are
//! all visitors over the same engine.
//!
//! ## Pairing
//!
//! Ordered collections are zipped by index. Unordered collections are paired
//! in two passes: first by identity (name, or ordinal for index columns),
//! then by resemblance, which is structural equality ignoring the volatile
//! keys (`name`, `created-at` and `last-altered-at` by default). The second
//! pass is what lets a renamed column show up as a modification instead of a
//! drop plus an add. Whatever is left over on either side is unmatched.

use std::collections::{BTreeSet, HashMap};

use schemata_config::{MatchConfig, TieBreak};
use schemata_model::{
    CollectionOrder, ModelError, NodeId, NodeRef, PropertyKey, Scalar, ValueKind, descriptors,
};

use crate::pairing;
use crate::visitor::{Filter, Structural};

/// How a visitor wants collection-valued properties traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Pair left elements with right elements (positionally or by matching).
    Pair,
    /// Visit every left element on its own, with no right counterpart.
    Walk,
}

/// The two sides of one scalar property, handed to
/// [`ComparisonVisitor::compare_value`].
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'t> {
    pub key: PropertyKey,
    pub left: NodeRef<'t>,
    pub right: Option<NodeRef<'t>>,
    pub left_value: Option<&'t Scalar>,
    pub right_value: Option<&'t Scalar>,
}

/// A strategy plugged into the comparison engine.
///
/// The three required hooks decide equality. The provided ones let a visitor
/// observe the traversal: [`enter`](Self::enter) and [`leave`](Self::leave)
/// bracket every descent into a paired child, and
/// [`unmatched`](Self::unmatched) reports a child present on only one side.
pub trait ComparisonVisitor<'t> {
    /// Returning true declares the pair equal without looking any further.
    fn identity_short_cut(&mut self, left: NodeRef<'t>, right: Option<NodeRef<'t>>) -> bool;

    /// Compare one scalar property. `lazy_eq` computes value equality and
    /// may be skipped entirely.
    fn compare_value(&mut self, cx: &ValueContext<'t>, lazy_eq: &dyn Fn() -> bool) -> bool;

    /// Final verdict for a node whose properties have all been visited.
    fn finalize(&mut self, left: NodeRef<'t>, right: Option<NodeRef<'t>>, equal: bool) -> bool;

    /// Skip a nested or collection property altogether.
    fn ignores(&self, _key: PropertyKey) -> bool {
        false
    }

    /// Stop at the first difference.
    fn fails_fast(&self) -> bool {
        true
    }

    fn collection_mode(&self) -> CollectionMode {
        CollectionMode::Pair
    }

    /// Descend into a nested child even when the right side has none.
    fn descends_unmatched(&self) -> bool {
        false
    }

    fn enter(&mut self, _key: PropertyKey, _left: NodeRef<'t>, _right: Option<NodeRef<'t>>) {}

    fn leave(&mut self, _equal: bool) {}

    /// A child present on one side only. Returns whether that still counts
    /// as equal. `key` is `None` when the compared roots themselves differ
    /// in kind.
    fn unmatched(
        &mut self,
        _key: Option<PropertyKey>,
        left: Option<NodeRef<'t>>,
        right: Option<NodeRef<'t>>,
    ) -> bool {
        left.is_none() && right.is_none()
    }
}

/// Drives comparisons.
///
/// Holds the matching configuration. Every call to [`compare`](Self::compare)
/// runs in a fresh session with its own resemblance cache, so a comparator
/// can be shared freely.
#[derive(Debug, Clone)]
pub struct Comparator {
    volatile: BTreeSet<PropertyKey>,
    tie_break: Vec<TieBreak>,
}

impl Default for Comparator {
    fn default() -> Self {
        let config = MatchConfig::default();
        Self {
            volatile: config
                .volatile_keys()
                .into_iter()
                .filter_map(|key| key.parse().ok())
                .collect(),
            tie_break: config.tie_break().to_vec(),
        }
    }
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a comparator from configuration. Fails on an unknown property
    /// name in the volatile key list.
    pub fn from_config(config: &MatchConfig) -> Result<Self, ModelError> {
        let volatile = config
            .volatile_keys()
            .into_iter()
            .map(str::parse)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            volatile,
            tie_break: config.tie_break().to_vec(),
        })
    }

    pub fn with_volatile_keys(mut self, keys: impl IntoIterator<Item = PropertyKey>) -> Self {
        self.volatile = keys.into_iter().collect();
        self
    }

    pub fn with_tie_break(mut self, rules: impl IntoIterator<Item = TieBreak>) -> Self {
        self.tie_break = rules.into_iter().collect();
        self
    }

    pub fn volatile_keys(&self) -> &BTreeSet<PropertyKey> {
        &self.volatile
    }

    pub fn tie_break(&self) -> &[TieBreak] {
        &self.tie_break
    }

    /// Run `visitor` over `left` and `right`.
    pub fn compare<'t, V>(&self, left: NodeRef<'t>, right: Option<NodeRef<'t>>, visitor: &mut V) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        let _span = tracing::debug_span!("compare", left = %left).entered();
        Session::new(self).compare(left, right, visitor)
    }

    pub fn structurally_equal(&self, left: NodeRef<'_>, right: Option<NodeRef<'_>>) -> bool {
        self.compare(left, right, &mut Structural)
    }

    /// Structural equality ignoring the volatile keys.
    pub fn resembles(&self, left: NodeRef<'_>, right: Option<NodeRef<'_>>) -> bool {
        match right {
            Some(right) => Session::new(self).resembles(left, right),
            None => false,
        }
    }

    pub(crate) fn resemblance_filter(&self) -> Filter {
        Filter::excluding(self.volatile.iter().copied())
    }
}

/// Structural equality with the default configuration.
pub fn structurally_equal(left: NodeRef<'_>, right: Option<NodeRef<'_>>) -> bool {
    Comparator::default().structurally_equal(left, right)
}

/// Resemblance with the default volatile keys.
pub fn resembles(left: NodeRef<'_>, right: Option<NodeRef<'_>>) -> bool {
    Comparator::default().resembles(left, right)
}

/// One top-level comparison.
pub(crate) struct Session<'c> {
    comparator: &'c Comparator,
    resemblance: HashMap<(NodeId, NodeId), bool>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(comparator: &'c Comparator) -> Self {
        Self {
            comparator,
            resemblance: HashMap::new(),
        }
    }

    pub(crate) fn tie_break(&self) -> &'c [TieBreak] {
        &self.comparator.tie_break
    }

    pub(crate) fn resembles(&mut self, left: NodeRef<'_>, right: NodeRef<'_>) -> bool {
        if left.kind() != right.kind() {
            return false;
        }
        let key = (left.id(), right.id());
        if let Some(&known) = self.resemblance.get(&key) {
            return known;
        }
        let mut filter = self.comparator.resemblance_filter();
        let result = self.compare(left, Some(right), &mut filter);
        self.resemblance.insert(key, result);
        result
    }

    pub(crate) fn compare<'t, V>(
        &mut self,
        left: NodeRef<'t>,
        right: Option<NodeRef<'t>>,
        visitor: &mut V,
    ) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        if visitor.identity_short_cut(left, right) {
            return true;
        }
        if let Some(r) = right
            && r.kind() != left.kind()
        {
            return self.mismatch(None, left, r, visitor);
        }

        let mut equal = true;
        for desc in descriptors(left.kind()) {
            let key = desc.key;
            let same = match desc.kind {
                ValueKind::Scalar => {
                    let left_value = left.scalar(key);
                    let right_value = right.and_then(|r| r.scalar(key));
                    let cx = ValueContext {
                        key,
                        left,
                        right,
                        left_value,
                        right_value,
                    };
                    visitor.compare_value(&cx, &|| left_value == right_value)
                }
                _ if visitor.ignores(key) => true,
                ValueKind::Node => {
                    let l = left.child(key);
                    let r = right.and_then(|r| r.child(key));
                    self.compare_nested(key, l, r, visitor)
                }
                ValueKind::Collection(order) => {
                    self.compare_collection(key, order, left, right, visitor)
                }
            };
            if !same {
                equal = false;
                if visitor.fails_fast() {
                    return false;
                }
            }
        }
        visitor.finalize(left, right, equal)
    }

    fn compare_nested<'t, V>(
        &mut self,
        key: PropertyKey,
        left: Option<NodeRef<'t>>,
        right: Option<NodeRef<'t>>,
        visitor: &mut V,
    ) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        match (left, right) {
            (None, None) => true,
            (Some(l), Some(r)) if l.kind() != r.kind() => self.mismatch(Some(key), l, r, visitor),
            (Some(l), Some(r)) => self.descend(key, l, Some(r), visitor),
            (Some(l), None) if visitor.descends_unmatched() => self.descend(key, l, None, visitor),
            (l, r) => visitor.unmatched(Some(key), l, r),
        }
    }

    fn compare_collection<'t, V>(
        &mut self,
        key: PropertyKey,
        order: CollectionOrder,
        left: NodeRef<'t>,
        right: Option<NodeRef<'t>>,
        visitor: &mut V,
    ) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        let lefts: Vec<_> = left.children(key).collect();

        if visitor.collection_mode() == CollectionMode::Walk {
            let mut equal = true;
            for l in lefts {
                if !self.descend(key, l, None, visitor) {
                    equal = false;
                    if visitor.fails_fast() {
                        return false;
                    }
                }
            }
            return equal;
        }

        let rights: Vec<_> = right.map(|r| r.children(key).collect()).unwrap_or_default();
        let pairs = match order {
            CollectionOrder::Ordered => pairing::zip(&lefts, &rights),
            CollectionOrder::Unordered => pairing::pair(self, &lefts, &rights),
        };

        let mut equal = true;
        for (l, r) in pairs {
            let same = match (l, r) {
                (Some(l), Some(r)) if l.kind() != r.kind() => self.mismatch(Some(key), l, r, visitor),
                (Some(l), Some(r)) => self.descend(key, l, Some(r), visitor),
                (l, r) => visitor.unmatched(Some(key), l, r),
            };
            if !same {
                equal = false;
                if visitor.fails_fast() {
                    return false;
                }
            }
        }
        equal
    }

    fn descend<'t, V>(
        &mut self,
        key: PropertyKey,
        left: NodeRef<'t>,
        right: Option<NodeRef<'t>>,
        visitor: &mut V,
    ) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        visitor.enter(key, left, right);
        let equal = self.compare(left, right, visitor);
        visitor.leave(equal);
        equal
    }

    /// Two nodes of incompatible kinds: report both as unmatched, the lower
    /// kind first whichever side it is on.
    fn mismatch<'t, V>(
        &mut self,
        key: Option<PropertyKey>,
        left: NodeRef<'t>,
        right: NodeRef<'t>,
        visitor: &mut V,
    ) -> bool
    where
        V: ComparisonVisitor<'t> + ?Sized,
    {
        if left.kind() < right.kind() {
            let removed = visitor.unmatched(key, Some(left), None);
            let added = visitor.unmatched(key, None, Some(right));
            removed && added
        } else {
            let added = visitor.unmatched(key, None, Some(right));
            let removed = visitor.unmatched(key, Some(left), None);
            removed && added
        }
    }
}
