//! Dependency planner - orders tables for CREATE and DROP.
//!
//! Foreign keys make tables depend on each other: `order` referencing
//! `customer` must be created after it and dropped before it. Real schemas
//! contain cycles, so a topological sort is not enough. Instead every pair
//! of tables is scored by how strongly one reaches the other through the
//! foreign key graph, and the tables are sorted by that score.
//!
//! ## Scoring
//!
//! For tables `a` and `b` (positive means `a` goes after `b`):
//!
//! 1. A table without a schema goes after one with a schema.
//! 2. If neither has dependencies, order by schema, then by name.
//! 3. If only one has dependencies, it goes after the other.
//! 4. Otherwise compare reach: a depth-first walk from `a` looking for `b`
//!    starts at the base score and pays a hop cost per edge. NOT NULL
//!    foreign keys are hard edges and cost far less than nullable ones, so
//!    an enforced dependency outweighs an optional one in the opposite
//!    direction. Each edge is walked at most once per search.
//! 5. Tie-break on the number of hard edges, then all edges, then name.
//!
//! CREATE follows outgoing edges (what a table references); DROP follows
//! incoming edges (what references a table).
//!
//! ## Example
//!
//! ```text
//! customer <- order (customer_id NOT NULL)
//!
//! create: customer, order
//! drop:   order, customer
//! ```
//!
//! The score is not guaranteed to be transitive when cycles are involved,
//! so ordering uses a merge sort that only ever asks "is this one before
//! that one" and cannot fail on an inconsistent answer.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use schemata_config::PlannerConfig;
use schemata_model::{NodeKind, NodeRef, PropertyKey};

/// Which way dependencies are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Create,
    Drop,
}

/// Orders tables so that foreign keys can be satisfied.
#[derive(Debug, Clone)]
pub struct DependencyPlanner {
    base_score: i64,
    hard_hop_cost: i64,
    soft_hop_cost: i64,
}

impl Default for DependencyPlanner {
    fn default() -> Self {
        Self::new(&PlannerConfig::default())
    }
}

impl DependencyPlanner {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            base_score: config.base_score(),
            hard_hop_cost: config.hard_hop_cost(),
            soft_hop_cost: config.soft_hop_cost(),
        }
    }

    /// Order for CREATE: referenced tables first.
    pub fn create_order<'t>(&self, tables: &[NodeRef<'t>]) -> Vec<NodeRef<'t>> {
        let _span = tracing::debug_span!("create_order", tables = tables.len()).entered();
        self.order(tables, Direction::Create)
    }

    /// Order for DROP: referencing tables first.
    pub fn drop_order<'t>(&self, tables: &[NodeRef<'t>]) -> Vec<NodeRef<'t>> {
        let _span = tracing::debug_span!("drop_order", tables = tables.len()).entered();
        self.order(tables, Direction::Drop)
    }

    pub fn order<'t>(&self, tables: &[NodeRef<'t>], direction: Direction) -> Vec<NodeRef<'t>> {
        let graph = Graph::build(tables);
        let mut plan = Plan {
            planner: self,
            graph: &graph,
            direction,
            reach: HashMap::new(),
        };
        let mut order: Vec<usize> = (0..graph.tables.len()).collect();
        merge_sort(&mut order, &mut |a, b| plan.score(a, b).cmp(&0));
        tracing::debug!(
            direction = ?direction,
            order = ?order.iter().map(|&i| graph.tables[i].node.qualified_name()).collect::<Vec<_>>(),
            "planned"
        );
        order.into_iter().map(|i| graph.tables[i].node).collect()
    }
}

#[derive(Debug)]
struct TableInfo<'t> {
    node: NodeRef<'t>,
    schema: Option<&'t str>,
    name: &'t str,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    id: usize,
    /// The table at the other end.
    other: usize,
    hard: bool,
}

#[derive(Debug)]
struct Graph<'t> {
    tables: Vec<TableInfo<'t>>,
    outgoing: Vec<Vec<Edge>>,
    incoming: Vec<Vec<Edge>>,
}

impl<'t> Graph<'t> {
    fn build(input: &[NodeRef<'t>]) -> Self {
        let mut tables: Vec<TableInfo<'t>> = Vec::with_capacity(input.len());
        for node in input {
            if node.kind() != NodeKind::Table {
                tracing::debug!(node = %node, "not a table, skipped");
                continue;
            }
            if tables.iter().any(|t| t.node == *node) {
                continue;
            }
            tables.push(TableInfo {
                node: *node,
                schema: node.schema_name(),
                name: node.name().unwrap_or(""),
            });
        }
        // Input order must not leak into the result.
        tables.sort_by(|a, b| {
            (a.schema, a.name, a.node.id()).cmp(&(b.schema, b.name, b.node.id()))
        });

        let lookup: HashMap<(Option<&str>, &str), usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| ((t.schema, t.name), i))
            .collect();

        let mut outgoing = vec![Vec::new(); tables.len()];
        let mut incoming = vec![Vec::new(); tables.len()];
        let mut next_id = 0;
        for (from, table) in tables.iter().enumerate() {
            for fk in table.node.children(PropertyKey::ForeignKeys) {
                let Some((schema, target)) = fk.references() else {
                    tracing::debug!(fk = %fk, "foreign key without a referenced table");
                    continue;
                };
                let Some(&to) = lookup.get(&(schema, target)) else {
                    tracing::debug!(
                        table = %table.node.qualified_name(),
                        references = target,
                        "foreign key target not among planned tables"
                    );
                    continue;
                };
                let hard = fk.is_hard();
                outgoing[from].push(Edge { id: next_id, other: to, hard });
                incoming[to].push(Edge { id: next_id, other: from, hard });
                next_id += 1;
            }
        }

        Self {
            tables,
            outgoing,
            incoming,
        }
    }

    fn edges(&self, table: usize, direction: Direction) -> &[Edge] {
        match direction {
            Direction::Create => &self.outgoing[table],
            Direction::Drop => &self.incoming[table],
        }
    }
}

/// State for one planner invocation.
struct Plan<'p, 't> {
    planner: &'p DependencyPlanner,
    graph: &'p Graph<'t>,
    direction: Direction,
    reach: HashMap<(usize, usize), Option<i64>>,
}

impl Plan<'_, '_> {
    /// Dependency edges of `table` that point at another table.
    fn edges(&self, table: usize) -> impl Iterator<Item = &Edge> {
        self.graph
            .edges(table, self.direction)
            .iter()
            .filter(move |e| e.other != table)
    }

    /// Positive when `a` belongs after `b`.
    fn score(&mut self, a: usize, b: usize) -> i64 {
        if a == b {
            return 0;
        }
        let graph = self.graph;
        let ta = &graph.tables[a];
        let tb = &graph.tables[b];

        match (ta.schema.is_some(), tb.schema.is_some()) {
            (false, true) => return 1,
            (true, false) => return -1,
            _ => {}
        }

        let ea = self.edges(a).count() as i64;
        let eb = self.edges(b).count() as i64;
        match (ea, eb) {
            (0, 0) => return 10 * sign(ta.schema.cmp(&tb.schema)) + sign(ta.name.cmp(tb.name)),
            (_, 0) => return ea,
            (0, _) => return -eb,
            _ => {}
        }

        let ab = self.reach(a, b);
        let ba = self.reach(b, a);
        let score = match (ab, ba) {
            (Some(x), Some(y)) => x - y,
            (Some(x), None) => x,
            (None, Some(y)) => -y,
            (None, None) => 0,
        };
        tracing::trace!(a = ta.name, b = tb.name, score, "reach");
        if score != 0 {
            return score;
        }
        self.tie_break(a, b)
    }

    fn tie_break(&self, a: usize, b: usize) -> i64 {
        let hard = |t: usize| self.edges(t).filter(|e| e.hard).count();
        let all = |t: usize| self.edges(t).count();
        let ta = &self.graph.tables[a];
        let tb = &self.graph.tables[b];
        let by_hard = hard(a).cmp(&hard(b));
        let by_all = all(a).cmp(&all(b));
        // Names stay ascending for DROP too, so a drop order is not simply
        // the reversed create order.
        sign(
            by_hard
                .then(by_all)
                .then((ta.schema, ta.name).cmp(&(tb.schema, tb.name))),
        )
    }

    /// Best score of a path from `from` to `to`, memoized per pair.
    fn reach(&mut self, from: usize, to: usize) -> Option<i64> {
        if let Some(&known) = self.reach.get(&(from, to)) {
            return known;
        }
        let mut visited = HashSet::new();
        let found = self.walk(from, to, self.planner.base_score, &mut visited);
        self.reach.insert((from, to), found);
        found
    }

    fn walk(&self, at: usize, to: usize, score: i64, visited: &mut HashSet<usize>) -> Option<i64> {
        let mut best = None;
        for edge in self.edges(at) {
            if !visited.insert(edge.id) {
                continue;
            }
            let cost = if edge.hard {
                self.planner.hard_hop_cost
            } else {
                self.planner.soft_hop_cost
            };
            let next = (score - cost).max(1);
            let found = if edge.other == to {
                Some(next)
            } else {
                self.walk(edge.other, to, next, visited)
            };
            // Edges are only off limits on the current path.
            visited.remove(&edge.id);
            best = best.max(found);
        }
        best
    }
}

fn sign(ordering: Ordering) -> i64 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Stable top-down merge sort.
fn merge_sort<T: Copy>(items: &mut Vec<T>, cmp: &mut impl FnMut(T, T) -> Ordering) {
    if items.len() <= 1 {
        return;
    }
    let mut right = items.split_off(items.len() / 2);
    merge_sort(items, cmp);
    merge_sort(&mut right, cmp);

    let left = std::mem::take(items);
    items.reserve(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if cmp(right[j], left[i]) == Ordering::Less {
            items.push(right[j]);
            j += 1;
        } else {
            items.push(left[i]);
            i += 1;
        }
    }
    items.extend_from_slice(&left[i..]);
    items.extend_from_slice(&right[j..]);
}
