use crate::bulk::{Bulk, BulkFlags};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::{ObjectId, ID_NIL};

/// Per-column reusable buffers. Every operation rewinds the buffer it
/// writes before filling it, so nothing leaks from one call to the next.
#[derive(Debug)]
pub struct ScratchBuffers {
    pub(crate) value: Bulk,
    pub(crate) old_value: Bulk,
    pub(crate) id_query: Bulk,
    pub(crate) string_query: Bulk,
}

impl ScratchBuffers {
    /// Open all four buffers. Buffers opened before a failure are dropped
    /// on the way out.
    pub(crate) fn open(ctx: &Context, domain: ObjectId, range: ObjectId) -> Result<Self> {
        let open = |flags, ty| {
            Bulk::open(ctx, flags, ty).map_err(|e| match e {
                Error::Setup(_) => e,
                other => Error::Setup(other.to_string()),
            })
        };
        Ok(Self {
            value: open(BulkFlags::empty(), range)?,
            old_value: open(BulkFlags::empty(), range)?,
            id_query: open(BulkFlags::empty(), domain)?,
            string_query: open(BulkFlags::DO_SHALLOW_COPY, ID_NIL)?,
        })
    }

    pub fn value(&self) -> &Bulk {
        &self.value
    }

    pub fn old_value(&self) -> &Bulk {
        &self.old_value
    }

    pub fn id_query(&self) -> &Bulk {
        &self.id_query
    }

    pub fn string_query(&self) -> &Bulk {
        &self.string_query
    }
}
