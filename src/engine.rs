//! Storage engine trait
//!
//! Index columns talk to the storage layer only through this surface. Every
//! call that can fail receives the caller's [`Context`]; implementations
//! record failures in the context's sticky error slot as well as returning
//! them, so callers that check both see consistent errors.
//!
//! Implementations:
//! - [`Database`](crate::db::Database): in-memory engine with snapshots

use crate::bulk::Bulk;
use crate::context::Context;
use crate::error::Result;
use crate::query::{NormalizedQuery, SearchMode, SelectOperator};
use crate::result::{ResultTable, TableFlags};
use crate::types::{ObjectId, ObjectInfo, RecordId};

pub trait Engine: Send + Sync {
    /// Resolve an object by id
    fn object(&self, id: ObjectId) -> Option<ObjectInfo>;

    /// Resolve an object by name
    fn lookup(&self, name: &str) -> Option<ObjectInfo>;

    /// Remove an object and everything that depends on it
    fn remove_object(&self, ctx: &Context, id: ObjectId) -> Result<()>;

    /// Write the packed source ids of an index column into `out`
    fn source_info(&self, ctx: &Context, column: ObjectId, out: &mut Bulk) -> Result<()>;

    /// Replace the source list of an index column with the packed ids in `sources`.
    /// The list is installed entirely or not at all.
    fn set_source_info(&self, ctx: &Context, column: ObjectId, sources: &Bulk) -> Result<()>;

    /// Apply one delta to the postings of `column` for record `id`.
    /// `old` is retracted and `new` inserted as a single step.
    fn index_update(
        &self,
        ctx: &Context,
        column: ObjectId,
        id: RecordId,
        section: u32,
        old: Option<&Bulk>,
        new: Option<&Bulk>,
    ) -> Result<()>;

    /// Create a temporary table keyed by records of `key_table`
    fn create_result_table(&self, ctx: &Context, key_table: ObjectId, flags: TableFlags) -> Result<ResultTable>;

    /// Search `column` and merge the matches into `result`
    fn search(
        &self,
        ctx: &Context,
        column: ObjectId,
        query: NormalizedQuery<'_>,
        result: &mut ResultTable,
        operator: SelectOperator,
        mode: SearchMode,
    ) -> Result<()>;
}
