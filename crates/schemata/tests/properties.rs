use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use schemata::model::{ForeignKeyDef, NodeId, NodeKind, SchemaTree};
use schemata::{
    ChangeState, Comparator, DependencyPlanner, collect_kind, diff, structurally_equal,
};

#[derive(Debug, Clone)]
struct ColumnSpec {
    data_type: &'static str,
    nullable: bool,
    comment: Option<&'static str>,
}

#[derive(Debug, Clone)]
struct TableSpec {
    name: String,
    columns: BTreeMap<&'static str, ColumnSpec>,
    references: Vec<(String, bool)>,
}

// Strategy for table names - use a fixed pool to increase FK hit rate
fn table_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("user".to_string()),
        Just("post".to_string()),
        Just("comment".to_string()),
        Just("tag".to_string()),
        Just("order".to_string()),
        Just("product".to_string()),
    ]
}

fn column_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("id"),
        Just("name"),
        Just("email"),
        Just("title"),
        Just("total"),
        Just("created"),
    ]
}

fn column_spec() -> impl Strategy<Value = ColumnSpec> {
    (
        prop_oneof![Just("BIGINT"), Just("TEXT"), Just("BOOLEAN"), Just("NUMERIC")],
        any::<bool>(),
        prop_oneof![Just(None), Just(Some("audited"))],
    )
        .prop_map(|(data_type, nullable, comment)| ColumnSpec {
            data_type,
            nullable,
            comment,
        })
}

fn table_spec() -> impl Strategy<Value = TableSpec> {
    (
        table_name(),
        prop::collection::btree_map(column_name(), column_spec(), 0..5),
        prop::collection::vec((table_name(), any::<bool>()), 0..3),
    )
        .prop_map(|(name, columns, references)| TableSpec {
            name,
            columns,
            references,
        })
}

fn schema_strategy() -> impl Strategy<Value = Vec<TableSpec>> {
    prop::collection::vec(table_spec(), 0..5).prop_map(|mut tables| {
        // Ensure unique table names
        let mut seen = HashSet::new();
        tables.retain(|t| seen.insert(t.name.clone()));
        tables
    })
}

/// Build a schema node from specs. Returns the tree and the schema id.
fn build(tables: &[TableSpec]) -> (SchemaTree, NodeId) {
    let mut tree = SchemaTree::new();
    let schema = tree.add_schema(None, "public").unwrap();
    for spec in tables {
        let table = tree.add_table(Some(schema), &spec.name).unwrap();
        for (name, col) in &spec.columns {
            let id = tree.add_column(table, name, col.data_type, col.nullable).unwrap();
            if let Some(comment) = col.comment {
                tree.set(id, schemata::model::PropertyKey::Comment, comment).unwrap();
            }
        }
        for (i, (target, not_null)) in spec.references.iter().enumerate() {
            let column = format!("{}_ref_{}", target, i);
            tree.add_column(table, &column, "BIGINT", !not_null).unwrap();
            let fk = ForeignKeyDef::new(
                format!("{}_{}_fkey", spec.name, column),
                &[column.as_str()],
                target.as_str(),
                &["id"],
            );
            tree.add_foreign_key(table, &fk).unwrap();
        }
    }
    (tree, schema)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Two independently built copies of the same schema are equal.
    #[test]
    fn prop_structural_equality_is_reflexive(tables in schema_strategy()) {
        let (a, sa) = build(&tables);
        let (b, sb) = build(&tables);
        prop_assert!(structurally_equal(a.node(sa).unwrap(), b.node(sb)));
        prop_assert!(diff(a.node(sa).unwrap(), b.node(sb).unwrap()).is_empty());
    }

    #[test]
    fn prop_structural_equality_is_symmetric(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let a = a.node(sa).unwrap();
        let b = b.node(sb).unwrap();
        prop_assert_eq!(structurally_equal(a, Some(b)), structurally_equal(b, Some(a)));
    }

    /// A diff is empty exactly when the trees are structurally equal.
    #[test]
    fn prop_empty_diff_iff_equal(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let a = a.node(sa).unwrap();
        let b = b.node(sb).unwrap();
        prop_assert_eq!(diff(a, b).is_empty(), structurally_equal(a, Some(b)));
    }

    #[test]
    fn prop_reverse_twice_is_identity(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let forward = diff(a.node(sa).unwrap(), b.node(sb).unwrap());
        let summary = |d: &schemata::DiffTree<'_>| {
            d.to_difference_list()
                .iter()
                .map(|n| (n.key(), n.state(), n.to_string()))
                .collect::<Vec<_>>()
        };

        let mut reversed = forward.clone();
        reversed.reverse();
        let count = |d: &schemata::DiffTree<'_>, state| {
            d.to_difference_list().iter().filter(|n| n.state() == state).count()
        };
        prop_assert_eq!(count(&reversed, ChangeState::Added), count(&forward, ChangeState::Deleted));
        prop_assert_eq!(count(&reversed, ChangeState::Deleted), count(&forward, ChangeState::Added));
        prop_assert_eq!(reversed.change_count(), forward.change_count());

        reversed.reverse();
        prop_assert_eq!(summary(&reversed), summary(&forward));
    }

    /// Reversing a diff gives the diff taken the other way round.
    #[test]
    fn prop_reversed_diff_is_diff_the_other_way(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let a = a.node(sa).unwrap();
        let b = b.node(sb).unwrap();
        let summary = |d: &schemata::DiffTree<'_>| {
            d.to_difference_list()
                .iter()
                .map(|n| (n.key(), n.state(), n.to_string()))
                .collect::<Vec<_>>()
        };

        let mut reversed = diff(a, b);
        reversed.reverse();
        let backward = diff(b, a);
        prop_assert_eq!(summary(&reversed), summary(&backward));
        prop_assert_eq!(reversed.to_string(), backward.to_string());
    }

    /// Pruning never leaves a matching node behind.
    #[test]
    fn prop_pruned_diff_has_no_matching_nodes(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let mut d = diff(a.node(sa).unwrap(), b.node(sb).unwrap());
        d.remove_recursive(|n| n.state() == ChangeState::Added);
        prop_assert!(d.to_difference_list().iter().all(|n| n.state() != ChangeState::Added));
    }

    #[test]
    fn prop_pruning_extremes(
        left in schema_strategy(),
        right in schema_strategy()
    ) {
        let (a, sa) = build(&left);
        let (b, sb) = build(&right);
        let mut d = diff(a.node(sa).unwrap(), b.node(sb).unwrap());
        let before = d.to_string();
        prop_assert_eq!(d.remove_recursive(|_| false), 0);
        prop_assert_eq!(d.to_string(), before);
        d.remove_recursive(|_| true);
        prop_assert!(d.is_empty());
        prop_assert_eq!(d.change_count(), 0);
    }

    /// The planner's output depends on the set of tables, not their order.
    #[test]
    fn prop_planner_ignores_input_order(tables in schema_strategy()) {
        let (tree, schema) = build(&tables);
        let mut input = collect_kind(tree.node(schema).unwrap(), NodeKind::Table);
        let planner = DependencyPlanner::default();
        let forward = planner.create_order(&input);
        input.reverse();
        prop_assert_eq!(planner.create_order(&input), forward.clone());
        prop_assert_eq!(forward.len(), input.len());

        let dropped = planner.drop_order(&input);
        prop_assert_eq!(dropped.len(), input.len());
        prop_assert!(input.iter().all(|t| dropped.contains(t)));
    }

    /// A chain of NOT NULL references always comes out in chain order, no
    /// matter how the tables are named.
    #[test]
    fn prop_chain_is_ordered(names in Just(vec!["a", "b", "c", "d", "e"]).prop_shuffle()) {
        let mut tree = SchemaTree::new();
        let schema = tree.add_schema(None, "public").unwrap();
        let mut previous: Option<&str> = None;
        for name in &names {
            let table = tree.add_table(Some(schema), name).unwrap();
            tree.add_column(table, "id", "BIGINT", false).unwrap();
            if let Some(target) = previous {
                tree.add_column(table, "parent_id", "BIGINT", false).unwrap();
                tree.add_foreign_key(
                    table,
                    &ForeignKeyDef::new(format!("{name}_parent_fkey"), &["parent_id"], target, &["id"]),
                )
                .unwrap();
            }
            previous = Some(*name);
        }

        let tables = collect_kind(tree.node(schema).unwrap(), NodeKind::Table);
        let planner = DependencyPlanner::default();
        let created: Vec<_> = planner
            .create_order(&tables)
            .iter()
            .map(|t| t.name().unwrap_or("").to_string())
            .collect();
        prop_assert_eq!(&created, &names);

        let mut dropped: Vec<_> = planner
            .drop_order(&tables)
            .iter()
            .map(|t| t.name().unwrap_or("").to_string())
            .collect();
        dropped.reverse();
        prop_assert_eq!(&dropped, &names);
    }

    /// Resemblance is what structural equality becomes once names stop
    /// mattering, so renaming every table keeps the schemas resembling.
    #[test]
    fn prop_renamed_tables_resemble(tables in schema_strategy()) {
        let (a, sa) = build(&tables);
        let (mut b, sb) = build(&tables);
        let ids: Vec<_> = collect_kind(b.node(sb).unwrap(), NodeKind::Table)
            .iter()
            .map(|t| t.id())
            .collect();
        for (i, id) in ids.into_iter().enumerate() {
            b.set(id, schemata::model::PropertyKey::Name, format!("renamed_{i}")).unwrap();
        }
        let comparator = Comparator::default();
        prop_assert!(comparator.resembles(a.node(sa).unwrap(), b.node(sb)));
    }
}
