use std::fmt::{Display, Formatter};

use graphwire_structures::{EnumValue, GraphWireError, ScalarValue};

/// Identity of one node record within a frame, assigned in first-visit
/// traversal order starting at 0 for the root.
pub type NodeId = u32;

//region Node Kind

/// Major kind tag of a node record (byte 0 of the wire type tag).
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeKind {
    Null = 0u8,
    Object = 1u8,
    Array = 2u8,
    /// Scalar root node; scalars below the root are inlined into entries.
    Scalar = 3u8,
    /// Enum root node; enums below the root are inlined into entries.
    Enum = 4u8,
    /// String root node; strings below the root are inlined into entries.
    String = 5u8,
}

impl From<NodeKind> for u8 {
    fn from(value: NodeKind) -> u8 {
        value as u8
    }
}

impl TryFrom<u8> for NodeKind {
    type Error = GraphWireError;
    fn try_from(value: u8) -> Result<Self, GraphWireError> {
        match value {
            0 => Ok(NodeKind::Null),
            1 => Ok(NodeKind::Object),
            2 => Ok(NodeKind::Array),
            3 => Ok(NodeKind::Scalar),
            4 => Ok(NodeKind::Enum),
            5 => Ok(NodeKind::String),
            _ => Err(GraphWireError::MalformedFrame(format!(
                "Unknown node major kind tag {}",
                value
            ))),
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeKind::Null => "null",
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::Scalar => "scalar",
            NodeKind::Enum => "enum",
            NodeKind::String => "string",
        };
        write!(f, "{name}")
    }
}

//endregion

//region Entries

/// Wire category tags of a field/element entry value.
pub const ENTRY_TAG_NULL: u8 = 0;
pub const ENTRY_TAG_REFERENCE: u8 = 1;
pub const ENTRY_TAG_SCALAR: u8 = 2;
pub const ENTRY_TAG_STRING: u8 = 3;

/// The resolved value of one field/element entry: inline payload or node
/// reference. Enums travel as their underlying integer scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Null,
    Reference(NodeId),
    Scalar(ScalarValue),
    Str(String),
}

impl EntryValue {
    pub fn tag(&self) -> u8 {
        match self {
            EntryValue::Null => ENTRY_TAG_NULL,
            EntryValue::Reference(_) => ENTRY_TAG_REFERENCE,
            EntryValue::Scalar(_) => ENTRY_TAG_SCALAR,
            EntryValue::Str(_) => ENTRY_TAG_STRING,
        }
    }
}

/// One named field entry of an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: String,
    pub value: EntryValue,
}

/// One indexed element entry of an array node.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEntry {
    pub index: Vec<u32>,
    pub value: EntryValue,
}

//endregion

//region Node Record

/// Body payload of one node record, by major kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Null,
    Object { fields: Vec<FieldEntry> },
    Array {
        extents: Vec<u32>,
        entries: Vec<ElementEntry>,
    },
    Scalar(ScalarValue),
    Enum(EnumValue),
    Str(String),
}

/// One serialized representation of a single distinct reference-kind value
/// (or inline-kind frame root), addressed by its integer id.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Type identifier string; empty for null nodes, the declared
    /// element type for arrays.
    pub type_name: String,
    pub body: NodeBody,
}

impl NodeRecord {
    /// Primitive subtype byte (byte 1 of the wire type tag); zero when the
    /// kind carries no subtype.
    pub fn subtype_tag(&self) -> u8 {
        match &self.body {
            NodeBody::Scalar(scalar) => scalar.kind().into(),
            NodeBody::Enum(enum_value) => enum_value.underlying().kind().into(),
            _ => 0,
        }
    }
}

/// The flat id-ordered node map produced by one collection run. Node ids are
/// exactly the vector indexes.
#[derive(Debug, Default)]
pub struct NodeMap {
    nodes: Vec<NodeRecord>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push(&mut self, record: NodeRecord) {
        debug_assert_eq!(record.id as usize, self.nodes.len());
        self.nodes.push(record);
    }

    pub(crate) fn replace(&mut self, id: NodeId, record: NodeRecord) {
        debug_assert_eq!(record.id, id);
        self.nodes[id as usize] = record;
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter()
    }
}

//endregion
