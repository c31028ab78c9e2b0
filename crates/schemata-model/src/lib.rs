//! Schema node model for schemata.
//!
//! A database schema is held as a tree of nodes in a [`SchemaTree`] arena.
//! Every node has a [`NodeKind`] and an ordered set of properties. Which
//! properties a kind carries, in which order, and what shape of value each one
//! holds is fixed by a static descriptor table (see [`descriptors`]), so code
//! that walks the tree never has to probe concrete entity types.
//!
//! Property values come in three shapes:
//!
//! - [`Value::Scalar`]: a leaf value (text, integer, boolean or a list of names)
//! - [`Value::Node`]: a single nested node owned by this one
//! - [`Value::Collection`]: a sequence of owned nodes, declared either
//!   [`CollectionOrder::Ordered`] or [`CollectionOrder::Unordered`]
//!
//! Ownership flows strictly downwards. Each node keeps a non-owning parent id
//! that is set when it is attached and cleared when it is detached.

mod build;
mod tree;


pub use build::{ForeignKeyDef, IndexColumn, NullsOrder, SortOrder};
pub use tree::{ModelError, NodeId, NodeRef, SchemaTree};

use std::fmt;
use std::str::FromStr;

/// The closed set of node kinds a schema tree can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Catalog,
    Schema,
    Table,
    View,
    Sequence,
    Column,
    PrimaryKey,
    ForeignKey,
    Index,
    IndexColumn,
    UniqueConstraint,
    CheckConstraint,
}

impl NodeKind {
    /// Lowercase name used in rendered output.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Catalog => "catalog",
            NodeKind::Schema => "schema",
            NodeKind::Table => "table",
            NodeKind::View => "view",
            NodeKind::Sequence => "sequence",
            NodeKind::Column => "column",
            NodeKind::PrimaryKey => "primary key",
            NodeKind::ForeignKey => "foreign key",
            NodeKind::Index => "index",
            NodeKind::IndexColumn => "index column",
            NodeKind::UniqueConstraint => "unique",
            NodeKind::CheckConstraint => "check",
        }
    }

    /// How nodes of this kind are recognized across two versions of a tree.
    pub fn identity(&self) -> Identity {
        match self {
            NodeKind::IndexColumn => Identity::Ordinal,
            _ => Identity::Name,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity rule for a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Nodes are the same entity when their names match.
    Name,
    /// Nodes have no stable key; they are matched by position.
    Ordinal,
}

/// Symbolic property names.
///
/// The set is closed and shared by all node kinds; each kind declares which
/// keys it uses through its descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    Name,
    Comment,
    CreatedAt,
    LastAlteredAt,
    Ordinal,
    DataType,
    Nullable,
    Default,
    AutoIncrement,
    Definition,
    StartValue,
    Increment,
    Unique,
    SortOrder,
    NullsOrder,
    Expression,
    ColumnNames,
    ReferencedSchema,
    ReferencedTable,
    ReferencedColumns,
    OnDelete,
    OnUpdate,
    Schemas,
    Tables,
    Views,
    Sequences,
    Columns,
    PrimaryKey,
    ForeignKeys,
    Indexes,
    UniqueConstraints,
    CheckConstraints,
}

impl PropertyKey {
    pub const ALL: &'static [PropertyKey] = &[
        PropertyKey::Name,
        PropertyKey::Comment,
        PropertyKey::CreatedAt,
        PropertyKey::LastAlteredAt,
        PropertyKey::Ordinal,
        PropertyKey::DataType,
        PropertyKey::Nullable,
        PropertyKey::Default,
        PropertyKey::AutoIncrement,
        PropertyKey::Definition,
        PropertyKey::StartValue,
        PropertyKey::Increment,
        PropertyKey::Unique,
        PropertyKey::SortOrder,
        PropertyKey::NullsOrder,
        PropertyKey::Expression,
        PropertyKey::ColumnNames,
        PropertyKey::ReferencedSchema,
        PropertyKey::ReferencedTable,
        PropertyKey::ReferencedColumns,
        PropertyKey::OnDelete,
        PropertyKey::OnUpdate,
        PropertyKey::Schemas,
        PropertyKey::Tables,
        PropertyKey::Views,
        PropertyKey::Sequences,
        PropertyKey::Columns,
        PropertyKey::PrimaryKey,
        PropertyKey::ForeignKeys,
        PropertyKey::Indexes,
        PropertyKey::UniqueConstraints,
        PropertyKey::CheckConstraints,
    ];

    /// Stable kebab-case name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::Name => "name",
            PropertyKey::Comment => "comment",
            PropertyKey::CreatedAt => "created-at",
            PropertyKey::LastAlteredAt => "last-altered-at",
            PropertyKey::Ordinal => "ordinal",
            PropertyKey::DataType => "data-type",
            PropertyKey::Nullable => "nullable",
            PropertyKey::Default => "default",
            PropertyKey::AutoIncrement => "auto-increment",
            PropertyKey::Definition => "definition",
            PropertyKey::StartValue => "start-value",
            PropertyKey::Increment => "increment",
            PropertyKey::Unique => "unique",
            PropertyKey::SortOrder => "sort-order",
            PropertyKey::NullsOrder => "nulls-order",
            PropertyKey::Expression => "expression",
            PropertyKey::ColumnNames => "column-names",
            PropertyKey::ReferencedSchema => "referenced-schema",
            PropertyKey::ReferencedTable => "referenced-table",
            PropertyKey::ReferencedColumns => "referenced-columns",
            PropertyKey::OnDelete => "on-delete",
            PropertyKey::OnUpdate => "on-update",
            PropertyKey::Schemas => "schemas",
            PropertyKey::Tables => "tables",
            PropertyKey::Views => "views",
            PropertyKey::Sequences => "sequences",
            PropertyKey::Columns => "columns",
            PropertyKey::PrimaryKey => "primary-key",
            PropertyKey::ForeignKeys => "foreign-keys",
            PropertyKey::Indexes => "indexes",
            PropertyKey::UniqueConstraints => "unique-constraints",
            PropertyKey::CheckConstraints => "check-constraints",
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ModelError::UnknownPropertyName(s.to_string()))
    }
}

/// Whether a node collection's element order carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOrder {
    /// Elements are compared at matching positions.
    Ordered,
    /// Elements are paired by identity before comparison.
    Unordered,
}

/// The shape of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Node,
    Collection(CollectionOrder),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Scalar => write!(f, "scalar"),
            ValueKind::Node => write!(f, "nested node"),
            ValueKind::Collection(CollectionOrder::Ordered) => write!(f, "ordered collection"),
            ValueKind::Collection(CollectionOrder::Unordered) => {
                write!(f, "unordered collection")
            }
        }
    }
}

/// One entry of a node kind's descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub key: PropertyKey,
    pub kind: ValueKind,
}

const fn scalar(key: PropertyKey) -> PropertyDescriptor {
    PropertyDescriptor {
        key,
        kind: ValueKind::Scalar,
    }
}

const fn nested(key: PropertyKey) -> PropertyDescriptor {
    PropertyDescriptor {
        key,
        kind: ValueKind::Node,
    }
}

const fn ordered(key: PropertyKey) -> PropertyDescriptor {
    PropertyDescriptor {
        key,
        kind: ValueKind::Collection(CollectionOrder::Ordered),
    }
}

const fn unordered(key: PropertyKey) -> PropertyDescriptor {
    PropertyDescriptor {
        key,
        kind: ValueKind::Collection(CollectionOrder::Unordered),
    }
}

use PropertyKey as K;

static CATALOG: &[PropertyDescriptor] = &[scalar(K::Name), scalar(K::Comment), unordered(K::Schemas)];

static SCHEMA: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Comment),
    scalar(K::CreatedAt),
    unordered(K::Tables),
    unordered(K::Views),
    unordered(K::Sequences),
];

static TABLE: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Comment),
    scalar(K::CreatedAt),
    scalar(K::LastAlteredAt),
    unordered(K::Columns),
    nested(K::PrimaryKey),
    unordered(K::ForeignKeys),
    unordered(K::Indexes),
    unordered(K::UniqueConstraints),
    unordered(K::CheckConstraints),
];

static VIEW: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Comment),
    scalar(K::CreatedAt),
    scalar(K::LastAlteredAt),
    scalar(K::Definition),
    unordered(K::Columns),
];

static SEQUENCE: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::StartValue),
    scalar(K::Increment),
];

static COLUMN: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Comment),
    scalar(K::Ordinal),
    scalar(K::DataType),
    scalar(K::Nullable),
    scalar(K::Default),
    scalar(K::AutoIncrement),
];

static PRIMARY_KEY: &[PropertyDescriptor] = &[scalar(K::Name), scalar(K::ColumnNames)];

static FOREIGN_KEY: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::ColumnNames),
    scalar(K::ReferencedSchema),
    scalar(K::ReferencedTable),
    scalar(K::ReferencedColumns),
    scalar(K::OnDelete),
    scalar(K::OnUpdate),
];

static INDEX: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Unique),
    scalar(K::Expression),
    ordered(K::Columns),
];

static INDEX_COLUMN: &[PropertyDescriptor] = &[
    scalar(K::Name),
    scalar(K::Ordinal),
    scalar(K::SortOrder),
    scalar(K::NullsOrder),
];

static UNIQUE_CONSTRAINT: &[PropertyDescriptor] = &[scalar(K::Name), scalar(K::ColumnNames)];

static CHECK_CONSTRAINT: &[PropertyDescriptor] = &[scalar(K::Name), scalar(K::Expression)];

/// The declared properties of a node kind, in reporting order.
pub fn descriptors(kind: NodeKind) -> &'static [PropertyDescriptor] {
    match kind {
        NodeKind::Catalog => CATALOG,
        NodeKind::Schema => SCHEMA,
        NodeKind::Table => TABLE,
        NodeKind::View => VIEW,
        NodeKind::Sequence => SEQUENCE,
        NodeKind::Column => COLUMN,
        NodeKind::PrimaryKey => PRIMARY_KEY,
        NodeKind::ForeignKey => FOREIGN_KEY,
        NodeKind::Index => INDEX,
        NodeKind::IndexColumn => INDEX_COLUMN,
        NodeKind::UniqueConstraint => UNIQUE_CONSTRAINT,
        NodeKind::CheckConstraint => CHECK_CONSTRAINT,
    }
}

/// Look up the descriptor for `key` on `kind`, if the kind declares it.
pub fn descriptor(kind: NodeKind, key: PropertyKey) -> Option<&'static PropertyDescriptor> {
    descriptors(kind).iter().find(|d| d.key == key)
}

/// A leaf property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
    /// A raw collection of names (column lists and the like).
    List(Vec<String>),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Scalar::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::List(l) => write!(f, "({})", l.join(", ")),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Vec<String>> for Scalar {
    fn from(v: Vec<String>) -> Self {
        Scalar::List(v)
    }
}

impl From<&[&str]> for Scalar {
    fn from(v: &[&str]) -> Self {
        Scalar::List(v.iter().map(|s| s.to_string()).collect())
    }
}

/// A property value as stored on a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Node(NodeId),
    Collection(Vec<NodeId>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_matches(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (Value::Scalar(_), ValueKind::Scalar)
                | (Value::Node(_), ValueKind::Node)
                | (Value::Collection(_), ValueKind::Collection(_))
        )
    }
}
