//! Query forms accepted by index column search, and the selection operators
//! that decide how matches are merged into a result table.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::bulk::Bulk;
use crate::error::{Error, Result};
use crate::types::RecordId;

/// Caller-supplied query. Exactly one form is active per search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Query<'q> {
    /// Record id in the index's lexicon, i.e. a term id.
    RecordId(RecordId),
    /// Text, tokenized with the lexicon's tokenizer. Must be UTF-8.
    Text(&'q [u8]),
    /// Precompiled query, passed to the engine unchanged.
    Compiled(&'q CompiledQuery),
}

impl From<RecordId> for Query<'_> {
    fn from(id: RecordId) -> Self {
        Query::RecordId(id)
    }
}

impl<'q> From<&'q str> for Query<'q> {
    fn from(text: &'q str) -> Self {
        Query::Text(text.as_bytes())
    }
}

impl<'q> From<&'q String> for Query<'q> {
    fn from(text: &'q String) -> Self {
        Query::Text(text.as_bytes())
    }
}

impl<'q> From<&'q [u8]> for Query<'q> {
    fn from(bytes: &'q [u8]) -> Self {
        Query::Text(bytes)
    }
}

impl<'q> From<&'q CompiledQuery> for Query<'q> {
    fn from(query: &'q CompiledQuery) -> Self {
        Query::Compiled(query)
    }
}

/// Query in the form handed to the engine: a filled scratch buffer or a
/// precompiled query.
#[derive(Debug, Clone, Copy)]
pub enum NormalizedQuery<'a> {
    Bulk(&'a Bulk),
    Compiled(&'a CompiledQuery),
}

/// How new matches are combined with what a result table already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelectOperator {
    #[default]
    Or,
    And,
    AndNot,
    Adjust,
}

impl SelectOperator {
    pub fn name(self) -> &'static str {
        match self {
            SelectOperator::Or => "or",
            SelectOperator::And => "and",
            SelectOperator::AndNot => "but",
            SelectOperator::Adjust => "adjust",
        }
    }
}

impl FromStr for SelectOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "or" | "||" => Ok(SelectOperator::Or),
            "and" | "+" | "&&" => Ok(SelectOperator::And),
            "but" | "not" | "-" | "and_not" => Ok(SelectOperator::AndNot),
            "adjust" | ">" => Ok(SelectOperator::Adjust),
            other => Err(Error::argument("operator", format!("unknown operator: {other}"))),
        }
    }
}

impl TryFrom<String> for SelectOperator {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SelectOperator> for String {
    fn from(op: SelectOperator) -> Self {
        op.name().to_string()
    }
}

/// How query terms are matched against lexicon keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Terms must equal lexicon keys; multi-term text is a phrase.
    #[default]
    Exact,
    /// Terms match every lexicon key they prefix.
    Prefix,
    /// Terms match every lexicon key they end.
    Suffix,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(SearchMode::Exact),
            "prefix" => Ok(SearchMode::Prefix),
            "suffix" => Ok(SearchMode::Suffix),
            other => Err(Error::argument("mode", format!("unknown search mode: {other}"))),
        }
    }
}

/// One step of a compiled query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub operator: SelectOperator,
    pub text: String,
    pub mode: SearchMode,
}

/// Query assembled programmatically from clauses.
///
/// The engine evaluates clauses in order into a fresh match set: the first
/// clause seeds it (its operator is ignored), each later clause is merged with
/// its own operator. The finished set is then merged into the caller's result
/// table with the search operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    clauses: Vec<Clause>,
}

impl CompiledQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, operator: SelectOperator, text: impl Into<String>, mode: SearchMode) -> Self {
        self.clauses.push(Clause {
            operator,
            text: text.into(),
            mode,
        });
        self
    }

    pub fn term(self, text: impl Into<String>) -> Self {
        self.push(SelectOperator::Or, text, SearchMode::Exact)
    }

    pub fn or(self, text: impl Into<String>) -> Self {
        self.push(SelectOperator::Or, text, SearchMode::Exact)
    }

    pub fn and(self, text: impl Into<String>) -> Self {
        self.push(SelectOperator::And, text, SearchMode::Exact)
    }

    pub fn but(self, text: impl Into<String>) -> Self {
        self.push(SelectOperator::AndNot, text, SearchMode::Exact)
    }

    pub fn adjust(self, text: impl Into<String>) -> Self {
        self.push(SelectOperator::Adjust, text, SearchMode::Exact)
    }

    pub fn prefix(self, operator: SelectOperator, text: impl Into<String>) -> Self {
        self.push(operator, text, SearchMode::Prefix)
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
