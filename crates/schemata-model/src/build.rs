//! Convenience constructors for the common entity kinds.
//!
//! These are thin wrappers over [`SchemaTree::add`], [`SchemaTree::set`] and
//! [`SchemaTree::attach`]; anything they do can also be done by hand.

use crate::{ModelError, NodeId, NodeKind, PropertyKey as K, SchemaTree, Value};

/// Sort order for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order (default)
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Nulls ordering for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullsOrder {
    /// Use database default (NULLS LAST for ASC, NULLS FIRST for DESC)
    #[default]
    Default,
    /// Sort nulls before non-null values
    First,
    /// Sort nulls after non-null values
    Last,
}

impl NullsOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullsOrder::Default => "default",
            NullsOrder::First => "first",
            NullsOrder::Last => "last",
        }
    }
}

/// A column in an index with optional sort order and nulls ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// Column name
    pub name: String,
    /// Sort order (ASC or DESC)
    pub order: SortOrder,
    /// Nulls ordering (NULLS FIRST, NULLS LAST, or default)
    pub nulls: NullsOrder,
}

impl IndexColumn {
    /// Create a new index column with default (ASC) ordering and default nulls.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Asc,
            nulls: NullsOrder::Default,
        }
    }

    /// Parse a column specification like "col_name", "col_name DESC", or "col_name DESC NULLS FIRST".
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let upper = spec.to_uppercase();

        // Nulls ordering comes last, so strip it first
        let (spec_without_nulls, nulls) = if upper.ends_with(" NULLS FIRST") {
            (&spec[..spec.len() - 12], NullsOrder::First)
        } else if upper.ends_with(" NULLS LAST") {
            (&spec[..spec.len() - 11], NullsOrder::Last)
        } else {
            (spec, NullsOrder::Default)
        };

        let trimmed = spec_without_nulls.trim();
        let upper_trimmed = trimmed.to_uppercase();

        let (name, order) = if upper_trimmed.ends_with(" DESC") {
            (trimmed[..trimmed.len() - 5].trim(), SortOrder::Desc)
        } else if upper_trimmed.ends_with(" ASC") {
            (trimmed[..trimmed.len() - 4].trim(), SortOrder::Asc)
        } else {
            (trimmed, SortOrder::Asc)
        };

        let name = if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
            name[1..name.len() - 1].replace("\"\"", "\"")
        } else {
            name.to_string()
        };

        Self { name, order, nulls }
    }
}

/// A foreign key as handed to [`SchemaTree::add_foreign_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ForeignKeyDef {
    /// Constraint name
    pub name: String,
    /// Column(s) in the owning table
    pub columns: Vec<String>,
    /// Schema of the referenced table, `None` for the owning table's schema
    pub references_schema: Option<String>,
    /// Referenced table
    pub references_table: String,
    /// Referenced column(s)
    pub references_columns: Vec<String>,
}

impl ForeignKeyDef {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_schema: None,
            references_table: references_table.into(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Point the reference at a table in another schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.references_schema = Some(schema.into());
        self
    }
}

impl SchemaTree {
    fn add_named(&mut self, kind: NodeKind, name: &str) -> Result<NodeId, ModelError> {
        let id = self.add(kind)?;
        self.set(id, K::Name, name)?;
        Ok(id)
    }

    fn add_named_under(
        &mut self,
        parent: Option<NodeId>,
        key: K,
        kind: NodeKind,
        name: &str,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named(kind, name)?;
        if let Some(parent) = parent {
            self.attach(parent, key, id)?;
        }
        Ok(id)
    }

    fn collection_len(&self, id: NodeId, key: K) -> Result<usize, ModelError> {
        let node = self.node(id).ok_or(ModelError::UnknownNode(id))?;
        Ok(match node.get(key) {
            Some(Value::Collection(items)) => items.len(),
            _ => 0,
        })
    }

    pub fn add_catalog(&mut self, name: &str) -> Result<NodeId, ModelError> {
        self.add_named(NodeKind::Catalog, name)
    }

    /// Add a schema, optionally under a catalog.
    pub fn add_schema(&mut self, catalog: Option<NodeId>, name: &str) -> Result<NodeId, ModelError> {
        self.add_named_under(catalog, K::Schemas, NodeKind::Schema, name)
    }

    /// Add a table, optionally under a schema. A table with no schema is
    /// still a valid node; the planner sorts such tables last.
    pub fn add_table(&mut self, schema: Option<NodeId>, name: &str) -> Result<NodeId, ModelError> {
        self.add_named_under(schema, K::Tables, NodeKind::Table, name)
    }

    pub fn add_view(
        &mut self,
        schema: Option<NodeId>,
        name: &str,
        definition: &str,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(schema, K::Views, NodeKind::View, name)?;
        self.set(id, K::Definition, definition)?;
        Ok(id)
    }

    pub fn add_sequence(
        &mut self,
        schema: Option<NodeId>,
        name: &str,
        start: i64,
        increment: i64,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(schema, K::Sequences, NodeKind::Sequence, name)?;
        self.set(id, K::StartValue, start)?;
        self.set(id, K::Increment, increment)?;
        Ok(id)
    }

    /// Add a column to a table or view. The ordinal is the 1-based position
    /// among the columns already present.
    pub fn add_column(
        &mut self,
        owner: NodeId,
        name: &str,
        data_type: &str,
        nullable: bool,
    ) -> Result<NodeId, ModelError> {
        let ordinal = self.collection_len(owner, K::Columns)? as i64 + 1;
        let id = self.add_named_under(Some(owner), K::Columns, NodeKind::Column, name)?;
        self.set(id, K::Ordinal, ordinal)?;
        self.set(id, K::DataType, data_type)?;
        self.set(id, K::Nullable, nullable)?;
        Ok(id)
    }

    /// Set (or replace) a table's primary key.
    pub fn set_primary_key(
        &mut self,
        table: NodeId,
        name: &str,
        columns: &[&str],
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(Some(table), K::PrimaryKey, NodeKind::PrimaryKey, name)?;
        self.set(id, K::ColumnNames, columns)?;
        Ok(id)
    }

    pub fn add_foreign_key(
        &mut self,
        table: NodeId,
        fk: &ForeignKeyDef,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(Some(table), K::ForeignKeys, NodeKind::ForeignKey, &fk.name)?;
        self.set(id, K::ColumnNames, fk.columns.clone())?;
        if let Some(schema) = &fk.references_schema {
            self.set(id, K::ReferencedSchema, schema.as_str())?;
        }
        self.set(id, K::ReferencedTable, fk.references_table.as_str())?;
        self.set(id, K::ReferencedColumns, fk.references_columns.clone())?;
        Ok(id)
    }

    /// Add an index. Each column spec is parsed with [`IndexColumn::parse`].
    pub fn add_index(
        &mut self,
        table: NodeId,
        name: &str,
        unique: bool,
        columns: &[&str],
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(Some(table), K::Indexes, NodeKind::Index, name)?;
        self.set(id, K::Unique, unique)?;
        for (i, spec) in columns.iter().enumerate() {
            let col = IndexColumn::parse(spec);
            let col_id = self.add_named_under(Some(id), K::Columns, NodeKind::IndexColumn, &col.name)?;
            self.set(col_id, K::Ordinal, i as i64 + 1)?;
            self.set(col_id, K::SortOrder, col.order.as_str())?;
            self.set(col_id, K::NullsOrder, col.nulls.as_str())?;
        }
        Ok(id)
    }

    pub fn add_unique_constraint(
        &mut self,
        table: NodeId,
        name: &str,
        columns: &[&str],
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(
            Some(table),
            K::UniqueConstraints,
            NodeKind::UniqueConstraint,
            name,
        )?;
        self.set(id, K::ColumnNames, columns)?;
        Ok(id)
    }

    pub fn add_check_constraint(
        &mut self,
        table: NodeId,
        name: &str,
        expr: &str,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_named_under(
            Some(table),
            K::CheckConstraints,
            NodeKind::CheckConstraint,
            name,
        )?;
        self.set(id, K::Expression, expr)?;
        Ok(id)
    }
}
