use serde::{Deserialize, Serialize};

use crate::config::TableKind;
use crate::tokenizer::TokenizerKind;

/// Identifier of a catalog object (type, table, column, index column).
pub type ObjectId = u32;

/// Identifier of a record inside a table. Record ids start at 1.
pub type RecordId = u32;

/// The "no object" / "no record" id.
pub const ID_NIL: u32 = 0;

/// User objects are numbered from here; lower ids are reserved for built-in types.
pub const FIRST_USER_ID: ObjectId = 256;

/// Built-in value types. The discriminant is the type's object id.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool = 3,
    Int32 = 8,
    UInt32 = 9,
    Int64 = 10,
    Float = 12,
    ShortText = 14,
    Text = 15,
    LongText = 16,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Bool,
        DataType::Int32,
        DataType::UInt32,
        DataType::Int64,
        DataType::Float,
        DataType::ShortText,
        DataType::Text,
        DataType::LongText,
    ];

    pub fn id(self) -> ObjectId {
        self as u32
    }

    pub fn from_id(id: ObjectId) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "Bool",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Int64 => "Int64",
            DataType::Float => "Float",
            DataType::ShortText => "ShortText",
            DataType::Text => "Text",
            DataType::LongText => "LongText",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Width in bytes of fixed-size types; `None` for text types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::Int32 | DataType::UInt32 => Some(4),
            DataType::Int64 | DataType::Float => Some(8),
            DataType::ShortText | DataType::Text | DataType::LongText => None,
        }
    }

    pub fn is_text(self) -> bool {
        self.fixed_width().is_none()
    }

    /// Maximum encoded size of a single value.
    pub fn max_size(self) -> usize {
        match self {
            DataType::ShortText => 4 * 1024,
            DataType::Text => 64 * 1024,
            DataType::LongText => 2 * 1024 * 1024 * 1024 - 1,
            other => other.fixed_width().unwrap_or(0),
        }
    }
}

bitflags::bitflags! {
    /// Options chosen when an index column is defined.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct IndexFlags: u32 {
        const WITH_SECTION = 0x0080;
        const WITH_WEIGHT = 0x0100;
        const WITH_POSITION = 0x0200;
    }
}

/// What a catalog object is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Type(DataType),
    Table {
        kind: TableKind,
        key_type: Option<DataType>,
        tokenizer: TokenizerKind,
    },
    /// Scalar column holding one value per record of `table`.
    Column { table: ObjectId, value_type: DataType },
    /// Inverted index defined on the `lexicon` table, pointing at records of `range`.
    Index {
        lexicon: ObjectId,
        range: ObjectId,
        flags: IndexFlags,
    },
}

/// Resolved handle of a catalog object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub name: Option<String>,
    pub kind: ObjectKind,
}

impl ObjectInfo {
    /// Key space the object is addressed by: the owning table for columns,
    /// the lexicon for index columns, the key type for tables.
    pub fn domain(&self) -> ObjectId {
        match &self.kind {
            ObjectKind::Type(_) => ID_NIL,
            ObjectKind::Table { key_type, .. } => key_type.map_or(ID_NIL, DataType::id),
            ObjectKind::Column { table, .. } => *table,
            ObjectKind::Index { lexicon, .. } => *lexicon,
        }
    }

    /// Value space of the object: the value type for columns, the indexed
    /// table for index columns.
    pub fn range(&self) -> ObjectId {
        match &self.kind {
            ObjectKind::Type(_) | ObjectKind::Table { .. } => ID_NIL,
            ObjectKind::Column { value_type, .. } => value_type.id(),
            ObjectKind::Index { range, .. } => *range,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, ObjectKind::Table { .. })
    }

    pub fn is_column(&self) -> bool {
        matches!(self.kind, ObjectKind::Column { .. })
    }

    pub fn is_index(&self) -> bool {
        matches!(self.kind, ObjectKind::Index { .. })
    }

    pub fn index_flags(&self) -> Option<IndexFlags> {
        match self.kind {
            ObjectKind::Index { flags, .. } => Some(flags),
            _ => None,
        }
    }

    /// Display name used in error messages.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{}", self.id))
    }
}
