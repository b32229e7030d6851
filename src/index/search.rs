use crate::error::{Error, Result};
use crate::options::SearchOptions;
use crate::query::{NormalizedQuery, Query};
use crate::result::{ResultTable, TableFlags};

use super::{settle, IndexColumn};

impl IndexColumn {
    /// Search the index into a fresh result table keyed by the range.
    ///
    /// Term ids go through the id-query buffer, text through the string-query
    /// buffer; compiled queries are passed as they are. The new table is
    /// owned by the caller.
    pub fn search<'q>(
        &mut self,
        query: impl Into<Query<'q>>,
        options: SearchOptions,
    ) -> Result<ResultTable> {
        let range = self.range;
        let (ctx, _) = self.parts()?;
        let rc = ctx.engine().create_result_table(
            &ctx,
            range,
            TableFlags::HASH_KEY | TableFlags::WITH_SUBREC,
        );
        let mut result = settle(&ctx, rc)?;
        self.search_into(query, &mut result, options)?;
        Ok(result)
    }

    /// Search the index and merge matches into `result` in place.
    ///
    /// The table is left untouched when the call fails, so accumulated
    /// matches survive an engine error.
    pub fn search_into<'q>(
        &mut self,
        query: impl Into<Query<'q>>,
        result: &mut ResultTable,
        options: SearchOptions,
    ) -> Result<()> {
        let column = self.id;
        let (ctx, scratch) = self.parts()?;

        let query = match query.into() {
            Query::Compiled(compiled) => NormalizedQuery::Compiled(compiled),
            Query::RecordId(id) => {
                scratch.id_query.rewind();
                scratch.id_query.set_u32(id);
                NormalizedQuery::Bulk(&scratch.id_query)
            }
            Query::Text(bytes) => {
                std::str::from_utf8(bytes)
                    .map_err(|e| Error::argument("query", format!("query text is not UTF-8: {e}")))?;
                scratch.string_query.rewind();
                scratch.string_query.set_bytes(bytes);
                NormalizedQuery::Bulk(&scratch.string_query)
            }
        };

        let SearchOptions { operator, mode } = options;
        let rc = ctx
            .engine()
            .search(&ctx, column, query, result, operator, mode);
        settle(&ctx, rc)?;
        log::trace!(
            "index column #{column}: {} after {}",
            result.len(),
            operator.name()
        );
        Ok(())
    }
}
