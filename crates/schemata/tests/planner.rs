use schemata::model::{ForeignKeyDef, NodeId, NodeKind, NodeRef, SchemaTree};
use schemata::{DependencyPlanner, Settings, collect_kind, config};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn table(tree: &mut SchemaTree, schema: NodeId, name: &str) -> NodeId {
    let t = tree.add_table(Some(schema), name).unwrap();
    tree.add_column(t, "id", "BIGINT", false).unwrap();
    t
}

fn fk(tree: &mut SchemaTree, from: NodeId, to: &str, not_null: bool) {
    let column = format!("{to}_id");
    tree.add_column(from, &column, "BIGINT", !not_null).unwrap();
    tree.add_foreign_key(
        from,
        &ForeignKeyDef::new(format!("{column}_fkey"), &[column.as_str()], to, &["id"]),
    )
    .unwrap();
}

fn names(tables: &[NodeRef<'_>]) -> Vec<String> {
    tables
        .iter()
        .map(|t| t.name().unwrap_or("").to_string())
        .collect()
}

fn shop() -> (SchemaTree, NodeId) {
    let mut tree = SchemaTree::new();
    let catalog = tree.add_catalog("shop").unwrap();
    let s = tree.add_schema(Some(catalog), "public").unwrap();
    let customers = table(&mut tree, s, "customers");
    let orders = table(&mut tree, s, "orders");
    let products = table(&mut tree, s, "products");
    let items = table(&mut tree, s, "order_items");
    table(&mut tree, s, "settings");
    fk(&mut tree, orders, "customers", true);
    fk(&mut tree, items, "orders", true);
    fk(&mut tree, items, "products", true);
    // a customer's favourite product, optional
    fk(&mut tree, customers, "products", false);
    (tree, catalog)
}

#[test]
fn test_shop_create_and_drop_order() {
    init_tracing();
    let (tree, catalog) = shop();
    let tables = collect_kind(tree.node(catalog).unwrap(), NodeKind::Table);
    let planner = DependencyPlanner::default();

    let created = names(&planner.create_order(&tables));
    let position = |order: &[String], name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(position(&created, "products") < position(&created, "customers"));
    assert!(position(&created, "customers") < position(&created, "orders"));
    assert!(position(&created, "orders") < position(&created, "order_items"));

    let dropped = names(&planner.drop_order(&tables));
    assert!(position(&dropped, "order_items") < position(&dropped, "orders"));
    assert!(position(&dropped, "orders") < position(&dropped, "customers"));
    assert!(position(&dropped, "order_items") < position(&dropped, "products"));
}

#[test]
fn test_tables_without_foreign_keys_come_first() {
    init_tracing();
    let (tree, catalog) = shop();
    let tables = collect_kind(tree.node(catalog).unwrap(), NodeKind::Table);
    let created = names(&DependencyPlanner::default().create_order(&tables));
    assert_eq!(&created[..2], ["products", "settings"]);
}

#[test]
fn test_two_cycle_is_deterministic() {
    init_tracing();
    let mut tree = SchemaTree::new();
    let s = tree.add_schema(None, "public").unwrap();
    let a = table(&mut tree, s, "author");
    let b = table(&mut tree, s, "book");
    // both directions optional: nothing but the tie-break decides
    fk(&mut tree, a, "book", false);
    fk(&mut tree, b, "author", false);

    let tables = collect_kind(tree.node(s).unwrap(), NodeKind::Table);
    let planner = DependencyPlanner::default();
    let first = planner.create_order(&tables);
    let reversed: Vec<_> = tables.iter().rev().copied().collect();
    assert_eq!(planner.create_order(&reversed), first);
    assert_eq!(names(&first), ["author", "book"]);
}

#[test]
fn test_hard_edge_beats_soft_edge_in_cycle() {
    init_tracing();
    let mut tree = SchemaTree::new();
    let s = tree.add_schema(None, "public").unwrap();
    let a = table(&mut tree, s, "author");
    let b = table(&mut tree, s, "book");
    // book really needs an author; author's favourite book is optional
    fk(&mut tree, b, "author", true);
    fk(&mut tree, a, "book", false);

    let tables = collect_kind(tree.node(s).unwrap(), NodeKind::Table);
    let planner = DependencyPlanner::default();
    assert_eq!(names(&planner.create_order(&tables)), ["author", "book"]);
    assert_eq!(names(&planner.drop_order(&tables)), ["book", "author"]);
}

#[test]
fn test_planner_from_config() {
    init_tracing();
    let config = config::from_str(
        r#"
planner {
  base-score 100
  hard-hop-cost 200
  soft-hop-cost 1
}
"#,
    )
    .unwrap();
    let settings = Settings::from_config(&config).unwrap();

    // With hops flipped around, the optional edge now dominates.
    let mut tree = SchemaTree::new();
    let s = tree.add_schema(None, "public").unwrap();
    let a = table(&mut tree, s, "author");
    let b = table(&mut tree, s, "book");
    fk(&mut tree, b, "author", true);
    fk(&mut tree, a, "book", false);
    let tables = collect_kind(tree.node(s).unwrap(), NodeKind::Table);
    assert_eq!(
        names(&settings.planner.create_order(&tables)),
        ["book", "author"]
    );
}
