//! Per-operation options for index columns.
//!
//! Options can be built in code or parsed from a JSON object, which is how
//! schema files and bindings hand them over. Unknown keys are rejected.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::query::{SearchMode, SelectOperator};

/// Section used when none is given.
pub const DEFAULT_SECTION: u32 = 1;

/// Delta applied to one record of an index column.
///
/// `old_value` only: retract. `value` only: insert. Both: replace. Neither:
/// a no-op delta that is still handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexUpdateOptions {
    pub section: Option<u32>,
    pub old_value: Option<Value>,
    #[serde(alias = "new_value")]
    pub value: Option<Value>,
}

impl IndexUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, section: u32) -> Self {
        self.section = Some(section);
        self
    }

    pub fn old_value(mut self, value: impl Into<Value>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Section to update, defaulting to 1. Section 0 is invalid.
    pub fn effective_section(&self) -> Result<u32> {
        match self.section {
            None => Ok(DEFAULT_SECTION),
            Some(0) => Err(Error::argument("section", "sections start at 1")),
            Some(n) => Ok(n),
        }
    }

    /// Present sides of the delta. JSON `null` counts as absent.
    pub(crate) fn sides(&self) -> (Option<&Value>, Option<&Value>) {
        (present(&self.old_value), present(&self.value))
    }
}

fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| !v.is_null())
}

/// Argument of indexed assignment: a bare new value or full update options.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateArg {
    Value(Value),
    Options(IndexUpdateOptions),
}

impl UpdateArg {
    /// Parse an option dictionary. Objects are read as update options; any
    /// other value is a bare new value.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value)
                .map(UpdateArg::Options)
                .map_err(|e| Error::argument("options", e.to_string())),
            other => Ok(UpdateArg::Value(other)),
        }
    }

    /// Update options held as a bare object, parsed. `None` when the
    /// argument needs no parsing.
    pub(crate) fn parse_object(&self) -> Result<Option<UpdateArg>> {
        match self {
            UpdateArg::Value(value @ Value::Object(_)) => Self::from_json(value.clone()).map(Some),
            _ => Ok(None),
        }
    }

    pub(crate) fn section(&self) -> Result<u32> {
        match self {
            UpdateArg::Value(_) => Ok(DEFAULT_SECTION),
            UpdateArg::Options(options) => options.effective_section(),
        }
    }

    pub(crate) fn sides(&self) -> (Option<&Value>, Option<&Value>) {
        match self {
            UpdateArg::Value(v) if v.is_null() => (None, None),
            UpdateArg::Value(v) => (None, Some(v)),
            UpdateArg::Options(options) => options.sides(),
        }
    }
}

/// Objects stay unparsed here; `assign` reads them as update options.
impl From<Value> for UpdateArg {
    fn from(value: Value) -> Self {
        UpdateArg::Value(value)
    }
}

impl From<&str> for UpdateArg {
    fn from(value: &str) -> Self {
        UpdateArg::Value(Value::from(value))
    }
}

impl From<String> for UpdateArg {
    fn from(value: String) -> Self {
        UpdateArg::Value(Value::from(value))
    }
}

impl From<IndexUpdateOptions> for UpdateArg {
    fn from(options: IndexUpdateOptions) -> Self {
        UpdateArg::Options(options)
    }
}

/// Options of a search call. The table to merge into is passed to
/// `search_into` separately.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub operator: SelectOperator,
    pub mode: SearchMode,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchOptionsDef {
    operator: Option<SelectOperator>,
    mode: Option<SearchMode>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator(mut self, operator: SelectOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse `{"operator": ..., "mode": ...}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let def = SearchOptionsDef::deserialize(value)
            .map_err(|e| Error::argument("options", e.to_string()))?;
        Ok(Self {
            operator: def.operator.unwrap_or_default(),
            mode: def.mode.unwrap_or_default(),
        })
    }
}
