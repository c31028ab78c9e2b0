//! The node arena and the borrowed node handle.

use crate::{NodeKind, PropertyKey, Scalar, Value, ValueKind, descriptor};
use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while building or mutating a schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{kind} has no property '{key}'")]
    UnknownProperty { kind: NodeKind, key: PropertyKey },

    #[error("unknown property name '{0}'")]
    UnknownPropertyName(String),

    #[error("property '{key}' of {kind} holds a {expected}")]
    ValueKindMismatch {
        kind: NodeKind,
        key: PropertyKey,
        expected: ValueKind,
    },

    #[error("node {0} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("node {node} is already attached to a parent")]
    AlreadyAttached { node: NodeId },

    #[error("node {node} is not attached under that property")]
    NotAttached { node: NodeId },

    #[error("attaching node {node} would make it its own ancestor")]
    Cycle { node: NodeId },

    #[error("tree is sealed and can no longer be modified")]
    Sealed,
}

/// Index of a node within its [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    props: IndexMap<PropertyKey, Value>,
}

/// An arena holding every node of one schema tree.
///
/// Nodes are mutable until [`SchemaTree::seal`] is called. After that every
/// mutating method returns [`ModelError::Sealed`].
#[derive(Debug, Clone, Default)]
pub struct SchemaTree {
    nodes: Vec<NodeData>,
    sealed: bool,
}

impl SchemaTree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freeze the tree. Further mutation fails with [`ModelError::Sealed`].
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Allocate a detached node of the given kind.
    pub fn add(&mut self, kind: NodeKind) -> Result<NodeId, ModelError> {
        self.check_mutable()?;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            props: IndexMap::new(),
        });
        Ok(id)
    }

    /// Get a handle to a node.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.index() < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// Iterate over nodes that have no parent, in allocation order.
    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| NodeRef {
                tree: self,
                id: NodeId(i as u32),
            })
    }

    /// Iterate over every node in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(|i| NodeRef {
            tree: self,
            id: NodeId(i as u32),
        })
    }

    /// Set a scalar property.
    pub fn set(
        &mut self,
        id: NodeId,
        key: PropertyKey,
        value: impl Into<Scalar>,
    ) -> Result<(), ModelError> {
        self.check_mutable()?;
        let kind = self.data(id)?.kind;
        expect_kind(kind, key, ValueKind::Scalar)?;
        self.data_mut(id)?
            .props
            .insert(key, Value::Scalar(value.into()));
        Ok(())
    }

    /// Remove a scalar property, returning its previous value.
    pub fn unset(&mut self, id: NodeId, key: PropertyKey) -> Result<Option<Scalar>, ModelError> {
        self.check_mutable()?;
        let kind = self.data(id)?.kind;
        expect_kind(kind, key, ValueKind::Scalar)?;
        let previous = self.data_mut(id)?.props.shift_remove(&key);
        Ok(previous.and_then(|v| match v {
            Value::Scalar(s) => Some(s),
            _ => None,
        }))
    }

    /// Attach `child` under `parent`'s node-valued or collection-valued property.
    ///
    /// A nested-node property holds at most one child; attaching a new one
    /// detaches the previous occupant. A collection appends.
    pub fn attach(
        &mut self,
        parent: NodeId,
        key: PropertyKey,
        child: NodeId,
    ) -> Result<(), ModelError> {
        self.check_mutable()?;
        let parent_kind = self.data(parent)?.kind;
        let desc = descriptor(parent_kind, key).ok_or(ModelError::UnknownProperty {
            kind: parent_kind,
            key,
        })?;
        let is_collection = match desc.kind {
            ValueKind::Scalar => {
                return Err(ModelError::ValueKindMismatch {
                    kind: parent_kind,
                    key,
                    expected: desc.kind,
                });
            }
            ValueKind::Node => false,
            ValueKind::Collection(_) => true,
        };
        if self.data(child)?.parent.is_some() {
            return Err(ModelError::AlreadyAttached { node: child });
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(ModelError::Cycle { node: child });
            }
            cursor = self.data(id)?.parent;
        }

        if is_collection {
            let props = &mut self.data_mut(parent)?.props;
            match props.get_mut(&key) {
                Some(Value::Collection(items)) => items.push(child),
                _ => {
                    props.insert(key, Value::Collection(vec![child]));
                }
            }
        } else {
            let previous = self.data_mut(parent)?.props.insert(key, Value::Node(child));
            if let Some(Value::Node(old)) = previous {
                self.data_mut(old)?.parent = None;
            }
        }
        self.data_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from `parent`'s property, clearing its parent link.
    pub fn detach(
        &mut self,
        parent: NodeId,
        key: PropertyKey,
        child: NodeId,
    ) -> Result<(), ModelError> {
        self.check_mutable()?;
        let props = &mut self.data_mut(parent)?.props;
        let removed = match props.get_mut(&key) {
            Some(Value::Node(id)) => *id == child,
            Some(Value::Collection(items)) => match items.iter().position(|id| *id == child) {
                Some(pos) => {
                    items.remove(pos);
                    true
                }
                None => false,
            },
            _ => false,
        };
        if removed && matches!(props.get(&key), Some(Value::Node(_))) {
            props.shift_remove(&key);
        }
        if !removed {
            return Err(ModelError::NotAttached { node: child });
        }
        self.data_mut(child)?.parent = None;
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), ModelError> {
        if self.sealed {
            Err(ModelError::Sealed)
        } else {
            Ok(())
        }
    }

    fn data(&self, id: NodeId) -> Result<&NodeData, ModelError> {
        self.nodes.get(id.index()).ok_or(ModelError::UnknownNode(id))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, ModelError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(ModelError::UnknownNode(id))
    }
}

fn expect_kind(kind: NodeKind, key: PropertyKey, expected: ValueKind) -> Result<(), ModelError> {
    let desc = descriptor(kind, key).ok_or(ModelError::UnknownProperty { kind, key })?;
    if desc.kind != expected {
        return Err(ModelError::ValueKindMismatch {
            kind,
            key,
            expected: desc.kind,
        });
    }
    Ok(())
}

/// A borrowed handle to one node of a [`SchemaTree`].
///
/// Handles are `Copy` and compare equal when they point at the same node of
/// the same tree.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SchemaTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SchemaTree {
        self.tree
    }

    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.index()]
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    /// Raw property value, `None` when unset.
    pub fn get(&self, key: PropertyKey) -> Option<&'t Value> {
        self.data().props.get(&key)
    }

    pub fn scalar(&self, key: PropertyKey) -> Option<&'t Scalar> {
        self.get(key).and_then(Value::as_scalar)
    }

    pub fn text(&self, key: PropertyKey) -> Option<&'t str> {
        self.scalar(key).and_then(Scalar::as_str)
    }

    pub fn flag(&self, key: PropertyKey) -> Option<bool> {
        self.scalar(key).and_then(Scalar::as_bool)
    }

    pub fn int(&self, key: PropertyKey) -> Option<i64> {
        self.scalar(key).and_then(Scalar::as_int)
    }

    pub fn list(&self, key: PropertyKey) -> Option<&'t [String]> {
        self.scalar(key).and_then(Scalar::as_list)
    }

    pub fn name(&self) -> Option<&'t str> {
        self.text(PropertyKey::Name)
    }

    pub fn ordinal(&self) -> Option<i64> {
        self.int(PropertyKey::Ordinal)
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.data().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// Nearest ancestor of the given kind.
    pub fn ancestor_of_kind(&self, kind: NodeKind) -> Option<NodeRef<'t>> {
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if node.kind() == kind {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// The nested node stored under `key`.
    pub fn child(&self, key: PropertyKey) -> Option<NodeRef<'t>> {
        match self.get(key) {
            Some(Value::Node(id)) => Some(NodeRef {
                tree: self.tree,
                id: *id,
            }),
            _ => None,
        }
    }

    /// Elements of the collection stored under `key` (empty when unset).
    pub fn children(&self, key: PropertyKey) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        let tree = self.tree;
        let items: &'t [NodeId] = match self.get(key) {
            Some(Value::Collection(items)) => items,
            _ => &[],
        };
        items.iter().map(move |id| NodeRef { tree, id: *id })
    }

    /// Wrap another id of the same tree.
    pub fn sibling(&self, id: NodeId) -> NodeRef<'t> {
        NodeRef {
            tree: self.tree,
            id,
        }
    }

    /// Name of the enclosing schema.
    pub fn schema_name(&self) -> Option<&'t str> {
        self.ancestor_of_kind(NodeKind::Schema).and_then(|s| s.name())
    }

    /// For a foreign key: the referenced `(schema, table)`. The schema falls
    /// back to the owning table's schema when the key doesn't name one.
    pub fn references(&self) -> Option<(Option<&'t str>, &'t str)> {
        if self.kind() != NodeKind::ForeignKey {
            return None;
        }
        let table = self.text(PropertyKey::ReferencedTable)?;
        let schema = self
            .text(PropertyKey::ReferencedSchema)
            .or_else(|| self.schema_name());
        Some((schema, table))
    }

    /// For a foreign key: true when every local column is a NOT NULL column
    /// of the owning table. Columns that can't be resolved count as nullable.
    pub fn is_hard(&self) -> bool {
        if self.kind() != NodeKind::ForeignKey {
            return false;
        }
        let (Some(columns), Some(table)) = (
            self.list(PropertyKey::ColumnNames),
            self.ancestor_of_kind(NodeKind::Table),
        ) else {
            return false;
        };
        !columns.is_empty()
            && columns.iter().all(|name| {
                table
                    .children(PropertyKey::Columns)
                    .find(|c| c.name() == Some(name.as_str()))
                    .and_then(|c| c.flag(PropertyKey::Nullable))
                    == Some(false)
            })
    }

    /// Name qualified by the enclosing schema, when there is one.
    pub fn qualified_name(&self) -> String {
        let name = self.name().unwrap_or("?");
        match self.schema_name() {
            Some(schema) => format!("{}.{}", schema, name),
            None => name.to_string(),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} {} ({})", self.kind(), name, self.id),
            None => write!(f, "{} {}", self.kind(), self.id),
        }
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.ordinal()) {
            (Some(name), _) => write!(f, "{} {}", self.kind(), name),
            (None, Some(ordinal)) => write!(f, "{} #{}", self.kind(), ordinal),
            (None, None) => write!(f, "{}", self.kind()),
        }
    }
}
