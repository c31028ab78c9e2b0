//! Element pairing for collection-valued properties.

use schemata_config::TieBreak;
use schemata_model::{Identity, NodeRef};

use crate::compare::Session;

pub(crate) type Pair<'t> = (Option<NodeRef<'t>>, Option<NodeRef<'t>>);

/// Positional pairing for ordered collections. The shorter side is padded
/// with `None`.
pub(crate) fn zip<'t>(lefts: &[NodeRef<'t>], rights: &[NodeRef<'t>]) -> Vec<Pair<'t>> {
    (0..lefts.len().max(rights.len()))
        .map(|i| (lefts.get(i).copied(), rights.get(i).copied()))
        .collect()
}

/// Matching for unordered collections.
///
/// Exact identity first, then resemblance. Resembling candidates are ranked
/// by the tie-break rules and taken greedily, best first. Neither the ranking
/// nor the output order depends on which side is the left one, so swapping
/// `lefts` and `rights` swaps every pair and changes nothing else.
pub(crate) fn pair<'t>(
    session: &mut Session<'_>,
    lefts: &[NodeRef<'t>],
    rights: &[NodeRef<'t>],
) -> Vec<Pair<'t>> {
    let mut partner: Vec<Option<usize>> = vec![None; lefts.len()];
    let mut taken = vec![false; rights.len()];

    // Exact identity. Kinds are not checked here; a same-named element of
    // another kind is paired and then reported as a mismatch.
    for (i, left) in lefts.iter().enumerate() {
        let found = rights
            .iter()
            .enumerate()
            .position(|(j, right)| !taken[j] && same_identity(*left, i, *right, j));
        if let Some(j) = found {
            partner[i] = Some(j);
            taken[j] = true;
        }
    }

    // Resemblance
    let free = Free {
        lefts: partner.iter().map(Option::is_none).collect(),
        rights: taken.iter().map(|t| !t).collect(),
    };
    let mut candidates = Vec::new();
    for i in (0..lefts.len()).filter(|&i| free.lefts[i]) {
        for j in (0..rights.len()).filter(|&j| free.rights[j]) {
            if session.resembles(lefts[i], rights[j]) {
                let flags = rank(session.tie_break(), lefts, rights, &free, i, j);
                let key = span(slot(lefts[i], i), slot(rights[j], j));
                candidates.push((flags, key, i, j));
            }
        }
    }
    candidates.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    for (_, _, i, j) in candidates {
        if partner[i].is_some() || taken[j] {
            continue;
        }
        tracing::trace!(left = %lefts[i], right = %rights[j], "paired by resemblance");
        partner[i] = Some(j);
        taken[j] = true;
    }

    let mut pairs: Vec<(Span<'t>, Pair<'t>)> = lefts
        .iter()
        .enumerate()
        .map(|(i, left)| match partner[i] {
            Some(j) => (
                span(slot(*left, i), slot(rights[j], j)),
                (Some(*left), Some(rights[j])),
            ),
            None => (span(slot(*left, i), slot(*left, i)), (Some(*left), None)),
        })
        .collect();
    pairs.extend(
        rights
            .iter()
            .enumerate()
            .filter(|(j, _)| !taken[*j])
            .map(|(j, right)| (span(slot(*right, j), slot(*right, j)), (None, Some(*right)))),
    );
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.into_iter().map(|(_, pair)| pair).collect()
}

/// Elements still unpaired after the exact pass.
struct Free {
    lefts: Vec<bool>,
    rights: Vec<bool>,
}

/// Position and name of one element.
type Slot<'t> = (i64, Option<&'t str>);

/// Order-insensitive sort key for a pair of slots.
type Span<'t> = (i64, i64, Option<&'t str>, Option<&'t str>);

fn slot<'t>(node: NodeRef<'t>, index: usize) -> Slot<'t> {
    (position(node, index), node.name())
}

fn span<'t>(a: Slot<'t>, b: Slot<'t>) -> Span<'t> {
    (a.0.min(b.0), a.0.max(b.0), a.1.min(b.1), a.1.max(b.1))
}

/// 1-based position: the ordinal property when set, otherwise the index.
fn position(node: NodeRef<'_>, index: usize) -> i64 {
    node.ordinal().unwrap_or(index as i64 + 1)
}

fn same_identity(left: NodeRef<'_>, i: usize, right: NodeRef<'_>, j: usize) -> bool {
    match left.kind().identity() {
        Identity::Ordinal => position(left, i) == position(right, j),
        Identity::Name => match (left.name(), right.name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// One flag per rule, `false` when the candidate satisfies it, so that
/// better candidates sort first.
fn rank(
    rules: &[TieBreak],
    lefts: &[NodeRef<'_>],
    rights: &[NodeRef<'_>],
    free: &Free,
    i: usize,
    j: usize,
) -> Vec<bool> {
    rules
        .iter()
        .map(|rule| match rule {
            TieBreak::Ordinal => position(lefts[i], i) != position(rights[j], j),
            TieBreak::Name => name_claimed(lefts, rights, free, i, j),
        })
        .collect()
}

/// Whether either side's name belongs to another free element across the
/// way.
fn name_claimed(
    lefts: &[NodeRef<'_>],
    rights: &[NodeRef<'_>],
    free: &Free,
    i: usize,
    j: usize,
) -> bool {
    claimed(rights[j].name(), lefts, &free.lefts, i)
        || claimed(lefts[i].name(), rights, &free.rights, j)
}

fn claimed(name: Option<&str>, others: &[NodeRef<'_>], open: &[bool], skip: usize) -> bool {
    name.is_some_and(|name| {
        others
            .iter()
            .enumerate()
            .any(|(k, other)| k != skip && open[k] && other.name() == Some(name))
    })
}
