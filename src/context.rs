//! Context: the caller's session with an engine.
//!
//! Besides giving access to the engine, a context carries the sticky error
//! slot: the engine records failures here in addition to returning them, and
//! callers drain it with [`Context::check`].

use parking_lot::Mutex;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::types::ObjectInfo;

pub struct Context {
    engine: Arc<dyn Engine>,
    error: Mutex<Option<Error>>,
}

impl Context {
    pub fn new(engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            error: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Resolve an object by name
    pub fn lookup(&self, name: &str) -> Option<ObjectInfo> {
        self.engine.lookup(name)
    }

    /// Record a failure. A later failure replaces an unchecked earlier one.
    pub fn set_error(&self, err: Error) {
        let mut slot = self.error.lock();
        if let Some(previous) = slot.as_ref() {
            log::warn!("overwriting unchecked context error: {previous}");
        }
        *slot = Some(err);
    }

    pub fn has_error(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Take the sticky error, if any, leaving the context clean.
    pub fn check(&self) -> Result<()> {
        match self.error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn clear_error(&self) {
        self.error.lock().take();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("has_error", &self.has_error())
            .finish()
    }
}
