use crate::bulk::{Bulk, BulkFlags};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::{ObjectId, ObjectInfo, ID_NIL};

use super::{settle, IndexColumn};

/// Reference to a column (or table) feeding an index.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRef {
    Id(ObjectId),
    Name(String),
    Object(ObjectInfo),
}

impl SourceRef {
    /// Resolve to the id of a live object.
    fn resolve(&self, ctx: &Context) -> Result<ObjectId> {
        let found = match self {
            SourceRef::Id(id) => ctx.engine().object(*id),
            SourceRef::Name(name) => ctx.lookup(name),
            SourceRef::Object(info) => ctx.engine().object(info.id),
        };
        found.map(|info| info.id).ok_or_else(|| {
            let reference = match self {
                SourceRef::Id(id) => format!("#{id}"),
                SourceRef::Name(name) => name.clone(),
                SourceRef::Object(info) => info.label(),
            };
            Error::resolution(reference, "no such object")
        })
    }
}

impl From<ObjectId> for SourceRef {
    fn from(id: ObjectId) -> Self {
        SourceRef::Id(id)
    }
}

impl From<&str> for SourceRef {
    fn from(name: &str) -> Self {
        SourceRef::Name(name.to_string())
    }
}

impl From<String> for SourceRef {
    fn from(name: String) -> Self {
        SourceRef::Name(name)
    }
}

impl From<ObjectInfo> for SourceRef {
    fn from(info: ObjectInfo) -> Self {
        SourceRef::Object(info)
    }
}

impl From<&ObjectInfo> for SourceRef {
    fn from(info: &ObjectInfo) -> Self {
        SourceRef::Object(info.clone())
    }
}

impl IndexColumn {
    /// Sources in section order: element `i` feeds section `i + 1`.
    pub fn sources(&self) -> Result<Vec<ObjectInfo>> {
        if !self.is_bound() {
            return Err(Error::ContextClosed);
        }
        let ctx = self.context()?;
        let mut packed = Bulk::new(BulkFlags::empty(), ID_NIL);
        let rc = ctx.engine().source_info(&ctx, self.id, &mut packed);
        settle(&ctx, rc)?;

        packed
            .ids()?
            .into_iter()
            .map(|id| {
                ctx.engine()
                    .object(id)
                    .ok_or_else(|| Error::resolution(format!("#{id}"), "source no longer exists"))
            })
            .collect()
    }

    /// Replace the source list. Every reference is resolved before the
    /// engine sees anything, so a bad entry leaves the old list in place.
    pub fn set_sources<I, S>(&mut self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceRef>,
    {
        let column = self.id;
        let (ctx, _) = self.parts()?;
        let ids = sources
            .into_iter()
            .map(|s| s.into().resolve(&ctx))
            .collect::<Result<Vec<_>>>()?;

        let mut packed = Bulk::new(BulkFlags::empty(), ID_NIL);
        packed.set_ids(&ids);
        let rc = ctx.engine().set_source_info(&ctx, column, &packed);
        settle(&ctx, rc)?;
        log::debug!("index column #{column} now has {} sources", ids.len());
        Ok(())
    }

    pub fn set_source(&mut self, source: impl Into<SourceRef>) -> Result<()> {
        self.set_sources([source.into()])
    }
}
