use serde_json::Value;

use crate::error::Result;
use crate::options::{IndexUpdateOptions, UpdateArg};
use crate::types::RecordId;

use super::{settle, IndexColumn};

impl IndexColumn {
    /// Indexed assignment: apply one delta for record `id` and hand the
    /// argument back.
    ///
    /// A bare value is inserted into section 1. Options select the section
    /// and which sides are present: `old_value` alone retracts, `value`
    /// alone inserts, both replace in one engine call. A JSON object given
    /// as the value is read as options.
    pub fn assign(&mut self, id: RecordId, arg: impl Into<UpdateArg>) -> Result<UpdateArg> {
        let arg = arg.into();
        let parsed = arg.parse_object()?;
        let update = parsed.as_ref().unwrap_or(&arg);
        let section = update.section()?;
        let column = self.id;
        let (ctx, scratch) = self.parts()?;

        let (old, new) = update.sides();
        if let Some(value) = old {
            scratch.old_value.rewind();
            scratch.old_value.set_value(value)?;
        }
        if let Some(value) = new {
            scratch.value.rewind();
            scratch.value.set_value(value)?;
        }

        let rc = ctx.engine().index_update(
            &ctx,
            column,
            id,
            section,
            old.map(|_| &scratch.old_value),
            new.map(|_| &scratch.value),
        );
        // sticky context error first, then the call's own status
        settle(&ctx, rc)?;
        log::trace!("index column #{column}: updated record {id} section {section}");
        Ok(arg)
    }

    pub fn add(&mut self, id: RecordId, value: impl Into<Value>, section: u32) -> Result<()> {
        let options = IndexUpdateOptions::new().section(section).value(value);
        self.assign(id, options).map(drop)
    }

    pub fn delete(&mut self, id: RecordId, value: impl Into<Value>, section: u32) -> Result<()> {
        let options = IndexUpdateOptions::new().section(section).old_value(value);
        self.assign(id, options).map(drop)
    }

    pub fn update(
        &mut self,
        id: RecordId,
        old: impl Into<Value>,
        new: impl Into<Value>,
        section: u32,
    ) -> Result<()> {
        let options = IndexUpdateOptions::new()
            .section(section)
            .old_value(old)
            .value(new);
        self.assign(id, options).map(drop)
    }
}
