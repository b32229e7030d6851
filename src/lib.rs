// invcol v0.1.0 - Inverted Index Columns
// Source registry, delta updates and searches over an embedded engine

pub mod bulk;
pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub mod index;
pub mod options;
pub mod query;
pub mod result;
pub mod tokenizer;
pub mod types;

mod postings;
mod snapshot;
mod table;

// Re-export main types
pub use bulk::{Bulk, BulkFlags};
pub use config::{IndexConfig, TableConfig, TableKind};
pub use context::Context;
pub use db::Database;
pub use engine::Engine;
pub use error::{Error, ErrorCode, Result};
pub use index::{IndexColumn, ScratchBuffers, SourceRef};
pub use options::{IndexUpdateOptions, SearchOptions, UpdateArg, DEFAULT_SECTION};
pub use query::{CompiledQuery, Query, SearchMode, SelectOperator};
pub use result::{ResultRecord, ResultTable, TableFlags};
pub use tokenizer::TokenizerKind;
pub use types::{DataType, IndexFlags, ObjectId, ObjectInfo, ObjectKind, RecordId};
