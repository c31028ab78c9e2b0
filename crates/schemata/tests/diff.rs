use schemata::model::{ForeignKeyDef, NodeId, NodeKind, PropertyKey, SchemaTree};
use schemata::{ChangeState, Comparator, DiffSubject, collect, diff};

struct Shop {
    tree: SchemaTree,
    catalog: NodeId,
}

fn shop(customer_table: &str, order_index: &str) -> Shop {
    let mut tree = SchemaTree::new();
    let catalog = tree.add_catalog("shop").unwrap();
    let public = tree.add_schema(Some(catalog), "public").unwrap();

    let customer = tree.add_table(Some(public), customer_table).unwrap();
    tree.add_column(customer, "id", "BIGINT", false).unwrap();
    tree.add_column(customer, "email", "TEXT", true).unwrap();
    tree.set_primary_key(customer, "customer_pkey", &["id"]).unwrap();

    let orders = tree.add_table(Some(public), "orders").unwrap();
    tree.add_column(orders, "id", "BIGINT", false).unwrap();
    tree.add_column(orders, "customer_id", "BIGINT", false).unwrap();
    tree.add_foreign_key(
        orders,
        &ForeignKeyDef::new("orders_customer_fkey", &["customer_id"], customer_table, &["id"]),
    )
    .unwrap();
    tree.add_index(orders, "orders_customer_idx", false, &[order_index])
        .unwrap();

    Shop { tree, catalog }
}

#[test]
fn test_table_rename_and_index_change() {
    let before = shop("customer", "customer_id");
    let after = shop("client", "customer_id DESC");

    let d = diff(
        before.tree.node(before.catalog).unwrap(),
        after.tree.node(after.catalog).unwrap(),
    );
    insta::assert_snapshot!(d.to_string(), @r"
    Changes detected:

      ~ schema public
        ~ table client
          ~ name: customer -> client
        ~ table orders
          ~ foreign key orders_customer_fkey
            ~ referenced-table: customer -> client
          ~ index orders_customer_idx
            ~ index column customer_id
              ~ sort-order: asc -> desc
    ");
}

#[test]
fn test_reversed_diff_reads_backwards() {
    let before = shop("customer", "customer_id");
    let after = shop("client", "customer_id");

    let mut d = diff(
        before.tree.node(before.catalog).unwrap(),
        after.tree.node(after.catalog).unwrap(),
    );
    d.reverse();
    let renamed = d
        .to_difference_list()
        .into_iter()
        .find(|n| n.key() == Some(PropertyKey::Name))
        .unwrap();
    assert_eq!(renamed.to_string(), "~ name: client -> customer");
    assert!(matches!(
        renamed.original(),
        Some(DiffSubject::Value(v)) if v.as_str() == Some("client")
    ));
}

#[test]
fn test_reversed_diff_matches_diff_in_other_direction() {
    let before = shop("customer", "customer_id");
    let after = shop("client", "customer_id DESC");
    let left = before.tree.node(before.catalog).unwrap();
    let right = after.tree.node(after.catalog).unwrap();

    let mut forward = diff(left, right);
    forward.reverse();
    assert_eq!(forward.to_string(), diff(right, left).to_string());
}

#[test]
fn test_reversed_diff_with_added_and_deleted_tables() {
    let mut before = shop("customer", "customer_id");
    let mut after = shop("customer", "customer_id");
    for (side, name, data_type) in [
        (&mut before, "legacy", "TEXT"),
        (&mut after, "audit", "JSONB"),
    ] {
        let public = side
            .tree
            .node(side.catalog)
            .unwrap()
            .children(PropertyKey::Schemas)
            .next()
            .unwrap()
            .id();
        let table = side.tree.add_table(Some(public), name).unwrap();
        side.tree.add_column(table, "payload", data_type, false).unwrap();
    }
    let left = before.tree.node(before.catalog).unwrap();
    let right = after.tree.node(after.catalog).unwrap();

    let mut forward = diff(left, right);
    insta::assert_snapshot!(forward.to_string(), @r"
    Changes detected:

      ~ schema public
        + table audit
        - table legacy
    ");
    forward.reverse();
    assert_eq!(forward.to_string(), diff(right, left).to_string());
}

#[test]
fn test_unrelated_tables_are_added_and_deleted() {
    let before = shop("customer", "customer_id");
    let mut after = shop("customer", "customer_id");
    let public = after
        .tree
        .node(after.catalog)
        .unwrap()
        .children(PropertyKey::Schemas)
        .next()
        .unwrap()
        .id();
    let audit = after.tree.add_table(Some(public), "audit_log").unwrap();
    after.tree.add_column(audit, "payload", "JSONB", false).unwrap();

    let d = diff(
        before.tree.node(before.catalog).unwrap(),
        after.tree.node(after.catalog).unwrap(),
    );
    let changes = d.to_difference_list();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[1].state(), ChangeState::Added);
    assert_eq!(changes[1].to_string(), "+ table audit_log");
}

#[test]
fn test_pruning_value_changes_keeps_structure() {
    let before = shop("customer", "customer_id");
    let after = shop("client", "customer_id DESC");
    let mut d = diff(
        before.tree.node(before.catalog).unwrap(),
        after.tree.node(after.catalog).unwrap(),
    );
    let total = d.change_count();
    let cut = d.remove_recursive(|n| n.key() == Some(PropertyKey::Indexes));
    assert_eq!(cut, 1);
    // index, index column and sort order leaf are gone
    assert_eq!(d.change_count(), total - 3);
    assert!(
        d.to_difference_list()
            .iter()
            .all(|n| n.key() != Some(PropertyKey::SortOrder))
    );
}

#[test]
fn test_volatile_keys_decide_what_a_rename_is() {
    let before = shop("customer", "customer_id");
    let mut after = shop("customer", "customer_id");
    let customer = collect(after.tree.node(after.catalog).unwrap(), |n| {
        n.kind() == NodeKind::Table && n.name() == Some("customer")
    })[0]
    .id();
    after.tree.set(customer, PropertyKey::Name, "client").unwrap();
    after.tree.set(customer, PropertyKey::Comment, "renamed").unwrap();

    let left = before.tree.node(before.catalog).unwrap();
    let right = after.tree.node(after.catalog).unwrap();

    // a comment change alone breaks resemblance
    let strict = Comparator::default().diff(left, right);
    assert!(
        strict
            .to_difference_list()
            .iter()
            .any(|n| n.state() == ChangeState::Deleted)
    );

    let lenient = Comparator::default()
        .with_volatile_keys([PropertyKey::Name, PropertyKey::Comment])
        .diff(left, right);
    assert!(
        lenient
            .to_difference_list()
            .iter()
            .all(|n| n.state() == ChangeState::Modified || n.state() == ChangeState::Added)
    );
}

#[test]
fn test_collect_every_column_in_catalog() {
    let shop = shop("customer", "customer_id");
    let columns = collect(shop.tree.node(shop.catalog).unwrap(), |n| {
        n.kind() == NodeKind::Column
    });
    let names: Vec<_> = columns
        .iter()
        .map(|c| {
            let table = c.ancestor_of_kind(NodeKind::Table).unwrap();
            format!("{}.{}", table.name().unwrap(), c.name().unwrap())
        })
        .collect();
    assert_eq!(
        names,
        ["customer.id", "customer.email", "orders.id", "orders.customer_id"]
    );
}
