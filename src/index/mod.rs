//! Index Column Module
//!
//! An [`IndexColumn`] wraps one inverted index of the storage engine and
//! carries the scratch buffers every update and search reuses.
//!
//! Design:
//! - Binding never creates the underlying column; it must already exist
//! - Buffers are private to the instance, so `&mut self` serializes use
//! - Sources, deltas and searches are thin calls into [`Engine`](crate::engine::Engine)
//! - Dropping the wrapper unbinds it; owners also remove the column

mod mutator;
mod scratch;
mod search;
mod sources;

pub use scratch::ScratchBuffers;
pub use sources::SourceRef;

use std::sync::{Arc, Weak};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::{IndexFlags, ObjectId, ObjectInfo};

pub struct IndexColumn {
    context: Weak<Context>,
    id: ObjectId,
    /// Lexicon table; id queries are typed to it.
    domain: ObjectId,
    /// Indexed table; result keys are typed to it.
    range: ObjectId,
    owner: bool,
    scratch: Option<ScratchBuffers>,
}

impl IndexColumn {
    /// Attach to an existing index column and allocate its buffers.
    /// With `owner`, unbinding also removes the column from the engine.
    pub fn bind(ctx: &Arc<Context>, column: ObjectId, owner: bool) -> Result<Self> {
        let info = ctx
            .engine()
            .object(column)
            .ok_or_else(|| Error::resolution(format!("#{column}"), "no such column"))?;
        if !info.is_index() {
            return Err(Error::argument(
                "column",
                format!("{} is not an index column", info.label()),
            ));
        }
        let (domain, range) = (info.domain(), info.range());
        let scratch = ScratchBuffers::open(ctx, domain, range)?;
        log::debug!("bound index column {} (owner: {owner})", info.label());
        Ok(Self {
            context: Arc::downgrade(ctx),
            id: column,
            domain,
            range,
            owner,
            scratch: Some(scratch),
        })
    }

    /// Bind by name, e.g. `"Terms.content"`.
    pub fn open(ctx: &Arc<Context>, name: &str) -> Result<Self> {
        let info = ctx
            .lookup(name)
            .ok_or_else(|| Error::resolution(name, "no such column"))?;
        Self::bind(ctx, info.id, false)
    }

    /// Release the buffers and, for owners, the underlying column. Safe to
    /// call more than once and after the context is gone; nothing is
    /// removed when the context no longer exists.
    pub fn unbind(&mut self) -> Result<()> {
        let Some(scratch) = self.scratch.take() else {
            return Ok(());
        };
        let Some(ctx) = self.context.upgrade() else {
            log::debug!("unbinding index column #{} after its context closed", self.id);
            return Ok(());
        };
        drop(scratch);
        log::debug!("unbound index column #{}", self.id);
        if self.owner {
            let rc = ctx.engine().remove_object(&ctx, self.id);
            settle(&ctx, rc)?;
        }
        Ok(())
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn domain(&self) -> ObjectId {
        self.domain
    }

    pub fn range(&self) -> ObjectId {
        self.range
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn is_bound(&self) -> bool {
        self.scratch.is_some()
    }

    /// Scratch buffers, for inspecting what the last operation handed over.
    pub fn scratch(&self) -> Option<&ScratchBuffers> {
        self.scratch.as_ref()
    }

    /// Current catalog entry of the column
    pub fn info(&self) -> Result<ObjectInfo> {
        let ctx = self.context()?;
        let info = ctx.engine().object(self.id);
        info.ok_or_else(|| Error::resolution(format!("#{}", self.id), "column was removed"))
    }

    pub fn is_index(&self) -> Result<bool> {
        Ok(self.info()?.is_index())
    }

    /// Index columns hold postings, not values: neither vector nor scalar.
    pub fn is_vector(&self) -> Result<bool> {
        self.info().map(|_| false)
    }

    pub fn is_scalar(&self) -> Result<bool> {
        Ok(self.info()?.is_column())
    }

    pub fn with_section(&self) -> Result<bool> {
        self.has_flag(IndexFlags::WITH_SECTION)
    }

    pub fn with_weight(&self) -> Result<bool> {
        self.has_flag(IndexFlags::WITH_WEIGHT)
    }

    pub fn with_position(&self) -> Result<bool> {
        self.has_flag(IndexFlags::WITH_POSITION)
    }

    fn has_flag(&self, flag: IndexFlags) -> Result<bool> {
        Ok(self
            .info()?
            .index_flags()
            .is_some_and(|flags| flags.contains(flag)))
    }

    fn context(&self) -> Result<Arc<Context>> {
        self.context.upgrade().ok_or(Error::ContextClosed)
    }

    /// Live context plus buffers, or `ContextClosed` once unbound.
    fn parts(&mut self) -> Result<(Arc<Context>, &mut ScratchBuffers)> {
        let ctx = self.context()?;
        let scratch = self.scratch.as_mut().ok_or(Error::ContextClosed)?;
        Ok((ctx, scratch))
    }
}

impl Drop for IndexColumn {
    fn drop(&mut self) {
        if let Err(e) = self.unbind() {
            log::warn!("failed to release index column #{}: {e}", self.id);
        }
    }
}

impl std::fmt::Debug for IndexColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexColumn")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("range", &self.range)
            .field("owner", &self.owner)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Engine calls report a failure twice: in the context's error slot and in
/// their own result. The slot is drained first so a recorded error is never
/// left behind for an unrelated later call.
fn settle<T>(ctx: &Context, rc: Result<T>) -> Result<T> {
    if let Err(err) = ctx.check() {
        log::warn!("engine call left an error in the context: {err}");
        return Err(err);
    }
    rc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, TableConfig};
    use crate::engine::Engine;
    use crate::db::Database;
    use crate::tokenizer::TokenizerKind;
    use crate::types::DataType;

    fn setup() -> (Arc<Database>, Arc<Context>, ObjectId, ObjectId, ObjectId) {
        let db = Arc::new(Database::new());
        let ctx = Context::new(db.clone());
        let docs = db.create_table(Some("Docs"), &TableConfig::array()).unwrap();
        db.define_column(docs, "body", DataType::Text).unwrap();
        let terms = db
            .create_table(
                Some("Terms"),
                &TableConfig::patricia_trie(DataType::ShortText).tokenizer(TokenizerKind::Bigram),
            )
            .unwrap();
        let index = db
            .define_index_column(terms, "body", docs, &IndexConfig::new().with_position())
            .unwrap();
        (db, ctx, docs, terms, index)
    }

    #[test]
    fn test_bind_resolves_domain_and_range() {
        let (_db, ctx, docs, terms, index) = setup();
        let column = IndexColumn::bind(&ctx, index, false).unwrap();
        assert_eq!(column.domain(), terms);
        assert_eq!(column.range(), docs);
        let scratch = column.scratch().unwrap();
        assert_eq!(scratch.value().domain(), docs);
        assert_eq!(scratch.old_value().domain(), docs);
        assert_eq!(scratch.id_query().domain(), terms);
        assert_eq!(scratch.string_query().domain(), crate::types::ID_NIL);
        assert!(scratch
            .string_query()
            .flags()
            .contains(crate::bulk::BulkFlags::DO_SHALLOW_COPY));
    }

    #[test]
    fn test_bind_rejects_non_index() {
        let (db, ctx, docs, ..) = setup();
        assert!(matches!(
            IndexColumn::bind(&ctx, docs, false),
            Err(Error::Argument { .. })
        ));
        assert!(matches!(
            IndexColumn::bind(&ctx, 9999, false),
            Err(Error::Resolution { .. })
        ));
        assert!(IndexColumn::open(&ctx, "Docs.body").is_err());
        drop(db);
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let (db, ctx, _, _, index) = setup();
        let mut column = IndexColumn::bind(&ctx, index, true).unwrap();
        column.unbind().unwrap();
        assert!(!column.is_bound());
        column.unbind().unwrap();
        assert!(db.lookup("Terms.body").is_none());
    }

    #[test]
    fn test_unbind_after_context_dropped() {
        let (db, ctx, _, _, index) = setup();
        let mut column = IndexColumn::bind(&ctx, index, true).unwrap();
        drop(ctx);
        column.unbind().unwrap();
        column.unbind().unwrap();
        // the owner could not reach the engine, so the column survives
        assert!(db.lookup("Terms.body").is_some());
        assert!(matches!(column.info(), Err(Error::ContextClosed)));
    }

    #[test]
    fn test_flag_predicates() {
        let (_db, ctx, _, _, index) = setup();
        let column = IndexColumn::open(&ctx, "Terms.body").unwrap();
        assert_eq!(column.id(), index);
        assert!(column.is_index().unwrap());
        assert!(!column.is_vector().unwrap());
        assert!(!column.is_scalar().unwrap());
        assert!(column.with_position().unwrap());
        assert!(!column.with_section().unwrap());
        assert!(!column.with_weight().unwrap());
    }
}
