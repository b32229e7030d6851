//! Schema configuration
//!
//! Builder-style definitions for tables and index columns, with
//! case-insensitive parsing of the textual names used in schema files.
//!
//! # Example
//! ```ignore
//! use invcol::config::{IndexConfig, TableConfig};
//! use invcol::{DataType, TokenizerKind};
//!
//! let terms = TableConfig::patricia_trie(DataType::ShortText)
//!     .tokenizer(TokenizerKind::Bigram);
//! let index = IndexConfig::new().with_position().source("Articles.content");
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::tokenizer::TokenizerKind;
use crate::types::{DataType, IndexFlags};

/// Storage layout of a table's keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// No keys; records are addressed by id only.
    #[default]
    Array,
    /// Hashed keys.
    Hash,
    /// Sorted keys with prefix lookup.
    PatriciaTrie,
}

impl TableKind {
    pub fn has_key(self) -> bool {
        !matches!(self, TableKind::Array)
    }
}

impl FromStr for TableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "array" | "no_key" => Ok(TableKind::Array),
            "hash" | "hash_key" => Ok(TableKind::Hash),
            "patricia_trie" | "pat" | "pat_key" => Ok(TableKind::PatriciaTrie),
            other => Err(Error::argument("table kind", format!("unknown table kind: {other}"))),
        }
    }
}

/// Table definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub kind: TableKind,
    pub key_type: Option<DataType>,
    /// Tokenizer used when the table serves as a lexicon.
    pub default_tokenizer: TokenizerKind,
}

impl TableConfig {
    pub fn array() -> Self {
        Self::default()
    }

    pub fn hash(key_type: DataType) -> Self {
        Self {
            kind: TableKind::Hash,
            key_type: Some(key_type),
            ..Default::default()
        }
    }

    pub fn patricia_trie(key_type: DataType) -> Self {
        Self {
            kind: TableKind::PatriciaTrie,
            key_type: Some(key_type),
            ..Default::default()
        }
    }

    /// Set the lexicon tokenizer
    pub fn tokenizer(mut self, tokenizer: TokenizerKind) -> Self {
        self.default_tokenizer = tokenizer;
        self
    }

    /// Keyed tables need a text key type; arrays must not have one.
    pub fn validate(&self) -> Result<()> {
        match (self.kind.has_key(), self.key_type) {
            (false, Some(_)) => Err(Error::argument("key_type", "array tables have no key")),
            (true, None) => Err(Error::argument("key_type", "keyed tables need a key type")),
            (true, Some(t)) if !t.is_text() => Err(Error::argument(
                "key_type",
                format!("{} keys are not supported", t.name()),
            )),
            _ => Ok(()),
        }
    }
}

/// Index column definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub flags: IndexFlags,
    /// Source names (`Table.column`, or `Table` to index keys), in section order.
    pub sources: Vec<String>,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self) -> Self {
        self.flags |= IndexFlags::WITH_SECTION;
        self
    }

    pub fn with_weight(mut self) -> Self {
        self.flags |= IndexFlags::WITH_WEIGHT;
        self
    }

    pub fn with_position(mut self) -> Self {
        self.flags |= IndexFlags::WITH_POSITION;
        self
    }

    /// Append a source
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.sources.push(name.into());
        self
    }
}
