//! Bulk: a growable byte buffer tagged with the type it holds.
//!
//! Index columns keep a few of these as scratch space so that every update
//! and search reuses the same allocation. A bulk is either scalar (one value)
//! or a vector of text elements (one per array item of the source value).

use serde_json::Value;
use smallvec::SmallVec;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::{ObjectId, ID_NIL};

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BulkFlags: u32 {
        /// Untyped buffer that only ever carries caller bytes through to the engine.
        const DO_SHALLOW_COPY = 0x4000;
    }
}

#[derive(Debug, Clone)]
pub struct Bulk {
    domain: ObjectId,
    flags: BulkFlags,
    bytes: Vec<u8>,
    /// End offsets of vector elements; empty for scalar contents.
    elements: SmallVec<[u32; 4]>,
}

impl Bulk {
    /// Open a buffer typed to `domain`. The type must resolve unless it is `ID_NIL`.
    pub fn open(ctx: &Context, flags: BulkFlags, domain: ObjectId) -> Result<Self> {
        if domain != ID_NIL && ctx.engine().object(domain).is_none() {
            return Err(Error::Setup(format!("cannot open buffer: unknown type #{domain}")));
        }
        Ok(Self::new(flags, domain))
    }

    pub(crate) fn new(flags: BulkFlags, domain: ObjectId) -> Self {
        Self {
            domain,
            flags,
            bytes: Vec::new(),
            elements: SmallVec::new(),
        }
    }

    pub fn domain(&self) -> ObjectId {
        self.domain
    }

    pub fn flags(&self) -> BulkFlags {
        self.flags
    }

    /// Clear contents, keeping the allocation.
    pub fn rewind(&mut self) {
        self.bytes.clear();
        self.elements.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_vector(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Replace contents with raw bytes.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        self.rewind();
        self.bytes.extend_from_slice(bytes);
    }

    /// Replace contents with one fixed-width id.
    pub fn set_u32(&mut self, value: u32) {
        self.set_bytes(&value.to_le_bytes());
    }

    pub fn as_u32(&self) -> Option<u32> {
        let raw: [u8; 4] = self.bytes.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(raw))
    }

    /// Pack a list of ids, as stored in a column's source-info property.
    pub fn set_ids(&mut self, ids: &[u32]) {
        self.rewind();
        for id in ids {
            self.bytes.extend_from_slice(&id.to_le_bytes());
        }
    }

    pub fn ids(&self) -> Result<Vec<u32>> {
        if self.bytes.len() % 4 != 0 {
            return Err(Error::argument(
                "ids",
                format!("packed id buffer has {} bytes", self.bytes.len()),
            ));
        }
        Ok(self
            .bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Append a caller value in its indexable text form. Arrays become
    /// vector elements; nested arrays and objects are rejected.
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Array(items) => {
                for item in items {
                    if matches!(item, Value::Array(_) | Value::Object(_)) {
                        return Err(Error::argument("value", "nested values cannot be indexed"));
                    }
                    self.append_scalar(item)?;
                    self.elements.push(self.bytes.len() as u32);
                }
                Ok(())
            }
            other => self.append_scalar(other),
        }
    }

    fn append_scalar(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {}
            Value::String(s) => self.bytes.extend_from_slice(s.as_bytes()),
            Value::Number(n) => self.bytes.extend_from_slice(n.to_string().as_bytes()),
            Value::Bool(b) => self.bytes.extend_from_slice(if *b { b"true" } else { b"false" }),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::argument("value", "objects cannot be indexed"));
            }
        }
        Ok(())
    }

    /// Contents as text items: the vector elements, or the whole buffer.
    pub fn texts(&self) -> Result<Vec<&str>> {
        let mut items = Vec::with_capacity(self.elements.len().max(1));
        if self.elements.is_empty() {
            items.push(self.as_str()?);
            return Ok(items);
        }
        let mut start = 0usize;
        for &end in &self.elements {
            let end = end as usize;
            items.push(to_str(&self.bytes[start..end])?);
            start = end;
        }
        Ok(items)
    }

    pub fn as_str(&self) -> Result<&str> {
        to_str(&self.bytes)
    }
}

fn to_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::argument("text", e.to_string()))
}
