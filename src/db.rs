use ahash::AHashMap;
use dashmap::DashMap;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::bulk::{Bulk, BulkFlags};
use crate::config::{IndexConfig, TableConfig};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, ErrorCode, Result};
use crate::postings::Postings;
use crate::query::{NormalizedQuery, SearchMode, SelectOperator};
use crate::result::{Matches, ResultRecord, ResultTable, TableFlags};
use crate::table::TableData;
use crate::tokenizer::{Token, TokenizeMode, TokenizerKind};
use crate::types::{DataType, IndexFlags, ObjectId, ObjectInfo, ObjectKind, RecordId, FIRST_USER_ID, ID_NIL};

/// Position stride between sources of an index without `WITH_SECTION`.
const SECTION_SPAN: u32 = 1 << 20;

/// In-memory storage engine: tables, scalar columns and inverted indexes.
///
/// All catalog state sits behind one lock so that an index delta (lexicon
/// insertions plus posting changes) is applied as a single step. Names are
/// resolved through a separate lock-free map.
pub struct Database {
    pub(crate) catalog: RwLock<Catalog>,
    pub(crate) names: DashMap<String, ObjectId>,
}

#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub(crate) objects: BTreeMap<ObjectId, ObjectInfo>,
    pub(crate) tables: AHashMap<ObjectId, TableData>,
    pub(crate) columns: AHashMap<ObjectId, ColumnData>,
    pub(crate) indexes: AHashMap<ObjectId, IndexData>,
    pub(crate) next_id: ObjectId,
}

#[derive(Debug, Default)]
pub(crate) struct ColumnData {
    pub(crate) values: AHashMap<RecordId, Value>,
}

#[derive(Debug)]
pub(crate) struct IndexData {
    pub(crate) lexicon: ObjectId,
    pub(crate) range: ObjectId,
    pub(crate) flags: IndexFlags,
    pub(crate) tokenizer: TokenizerKind,
    pub(crate) sources: Vec<ObjectId>,
    pub(crate) postings: Postings,
}

/// Texts to retract and insert for one record of one index.
struct Delta {
    record: RecordId,
    section: u32,
    old: Vec<String>,
    new: Vec<String>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        let db = Self {
            catalog: RwLock::new(Catalog {
                next_id: FIRST_USER_ID,
                ..Default::default()
            }),
            names: DashMap::new(),
        };
        {
            let mut cat = db.catalog.write();
            for t in DataType::ALL {
                cat.objects.insert(
                    t.id(),
                    ObjectInfo {
                        id: t.id(),
                        name: Some(t.name().to_string()),
                        kind: ObjectKind::Type(t),
                    },
                );
                db.names.insert(t.name().to_string(), t.id());
            }
        }
        db
    }

    // --- Schema ---

    // Names are checked and claimed under the catalog write lock, so two
    // creators of the same name cannot both get through.

    /// Create a table. Anonymous tables (`name = None`) are only reachable by id.
    pub fn create_table(&self, name: Option<&str>, config: &TableConfig) -> Result<ObjectId> {
        config.validate()?;
        let mut cat = self.catalog.write();
        if let Some(name) = name {
            self.check_new_name(name)?;
        }
        let id = cat.allocate_id();
        cat.objects.insert(
            id,
            ObjectInfo {
                id,
                name: name.map(str::to_string),
                kind: ObjectKind::Table {
                    kind: config.kind,
                    key_type: config.key_type,
                    tokenizer: config.default_tokenizer,
                },
            },
        );
        cat.tables.insert(id, TableData::new(config.kind));
        if let Some(name) = name {
            self.names.insert(name.to_string(), id);
        }
        log::debug!("created table {} as #{id}", name.unwrap_or("(anonymous)"));
        Ok(id)
    }

    /// Define a scalar column named `Table.name`.
    pub fn define_column(&self, table: ObjectId, name: &str, value_type: DataType) -> Result<ObjectId> {
        let mut cat = self.catalog.write();
        let full_name = cat.column_name(table, name)?;
        self.check_new_name(&full_name)?;
        let id = cat.allocate_id();
        cat.objects.insert(
            id,
            ObjectInfo {
                id,
                name: Some(full_name.clone()),
                kind: ObjectKind::Column { table, value_type },
            },
        );
        cat.columns.insert(id, ColumnData::default());
        self.names.insert(full_name.clone(), id);
        log::debug!("defined column {full_name} as #{id}");
        Ok(id)
    }

    /// Define an index column named `Lexicon.name` over records of `range`.
    /// Sources named in `config` are resolved before anything is created.
    pub fn define_index_column(
        &self,
        lexicon: ObjectId,
        name: &str,
        range: ObjectId,
        config: &IndexConfig,
    ) -> Result<ObjectId> {
        let mut cat = self.catalog.write();
        let full_name = cat.column_name(lexicon, name)?;
        self.check_new_name(&full_name)?;
        let sources = config
            .sources
            .iter()
            .map(|s| {
                self.names
                    .get(s.as_str())
                    .map(|id| *id)
                    .ok_or_else(|| Error::resolution(s.as_str(), "no such object"))
            })
            .collect::<Result<Vec<_>>>()?;

        let tokenizer = match cat.objects.get(&lexicon).map(|o| &o.kind) {
            Some(ObjectKind::Table { kind, key_type: Some(k), tokenizer }) if kind.has_key() && k.is_text() => *tokenizer,
            _ => return Err(Error::argument("lexicon", "lexicons must be tables with text keys")),
        };
        if !cat.tables.contains_key(&range) {
            return Err(Error::argument("range", format!("#{range} is not a table")));
        }

        let id = cat.allocate_id();
        cat.objects.insert(
            id,
            ObjectInfo {
                id,
                name: Some(full_name.clone()),
                kind: ObjectKind::Index {
                    lexicon,
                    range,
                    flags: config.flags,
                },
            },
        );
        cat.indexes.insert(
            id,
            IndexData {
                lexicon,
                range,
                flags: config.flags,
                tokenizer,
                sources: Vec::new(),
                postings: Postings::default(),
            },
        );
        if let Err(e) = cat.install_sources(id, sources) {
            cat.objects.remove(&id);
            cat.indexes.remove(&id);
            return Err(e);
        }
        self.names.insert(full_name.clone(), id);
        log::debug!("defined index column {full_name} as #{id}");
        Ok(id)
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::argument("name", "names cannot be empty"));
        }
        if self.names.contains_key(name) {
            return Err(Error::argument("name", format!("{name} already exists")));
        }
        Ok(())
    }

    // --- Records ---

    /// Append a record to a table without keys
    pub fn add_record(&self, table: ObjectId) -> Result<RecordId> {
        let mut cat = self.catalog.write();
        let data = cat.table_mut(table)?;
        if data.kind().has_key() {
            return Err(Error::argument("key", "keyed tables need a key"));
        }
        Ok(data.add())
    }

    /// Find or create the record for `key`. New keys are indexed by every
    /// index that has the table itself as a source.
    pub fn add_record_with_key(&self, table: ObjectId, key: &str) -> Result<RecordId> {
        let mut cat = self.catalog.write();
        let max = match cat.objects.get(&table).map(|o| &o.kind) {
            Some(ObjectKind::Table { key_type: Some(k), .. }) => k.max_size(),
            Some(ObjectKind::Table { .. }) => {
                return Err(Error::argument("key", "array tables have no keys"));
            }
            _ => return Err(Error::engine(ErrorCode::NoSuchObject, format!("table #{table} not found"))),
        };
        if key.is_empty() {
            return Err(Error::engine(ErrorCode::InvalidArgument, "keys cannot be empty"));
        }
        if key.len() > max {
            return Err(Error::engine(ErrorCode::KeyTooLong, format!("key of {} bytes", key.len())));
        }
        let (id, created) = cat.table_mut(table)?.add_key(key);
        if created {
            for (index, section) in cat.indexes_fed_by(table) {
                cat.apply_delta(
                    index,
                    &Delta {
                        record: id,
                        section,
                        old: Vec::new(),
                        new: vec![key.to_string()],
                    },
                );
            }
        }
        Ok(id)
    }

    /// Delete a record, retracting its values from every index first.
    pub fn delete_record(&self, table: ObjectId, id: RecordId) -> Result<()> {
        let mut cat = self.catalog.write();
        if !cat.table_mut(table)?.exists(id) {
            return Err(Error::engine(ErrorCode::NoSuchObject, format!("record {id} not found")));
        }

        let columns: Vec<ObjectId> = cat
            .objects
            .values()
            .filter(|o| matches!(o.kind, ObjectKind::Column { table: t, .. } if t == table))
            .map(|o| o.id)
            .collect();
        for column in columns {
            let old = cat.columns.get_mut(&column).and_then(|c| c.values.remove(&id));
            if let Some(old) = old {
                let old = value_texts(&old)?;
                for (index, section) in cat.indexes_fed_by(column) {
                    cat.apply_delta(index, &Delta { record: id, section, old: old.clone(), new: Vec::new() });
                }
            }
        }

        let key = cat.tables.get(&table).and_then(|t| t.key(id)).map(str::to_string);
        if let Some(key) = key {
            for (index, section) in cat.indexes_fed_by(table) {
                cat.apply_delta(index, &Delta { record: id, section, old: vec![key.clone()], new: Vec::new() });
            }
        }

        for index in cat.indexes.values_mut() {
            if index.range == table {
                index.postings.remove_record(id);
            }
            // a deleted term takes its posting list with it
            if index.lexicon == table {
                index.postings.remove_term(id);
            }
        }
        cat.table_mut(table)?.delete(id);
        Ok(())
    }

    pub fn record_exists(&self, table: ObjectId, id: RecordId) -> bool {
        self.catalog.read().tables.get(&table).is_some_and(|t| t.exists(id))
    }

    pub fn record_key(&self, table: ObjectId, id: RecordId) -> Option<String> {
        self.catalog.read().tables.get(&table)?.key(id).map(str::to_string)
    }

    pub fn record_count(&self, table: ObjectId) -> u64 {
        self.catalog.read().tables.get(&table).map_or(0, TableData::len)
    }

    /// Id of `key` in a keyed table, e.g. a term in a lexicon
    pub fn record_id(&self, table: ObjectId, key: &str) -> Option<RecordId> {
        self.catalog.read().tables.get(&table)?.get(key)
    }

    /// Store a column value and run the delta of every index fed by the column.
    /// Setting `null` clears the value.
    pub fn set_value(&self, column: ObjectId, id: RecordId, value: Value) -> Result<()> {
        let mut cat = self.catalog.write();
        let (table, value_type) = match cat.objects.get(&column).map(|o| &o.kind) {
            Some(ObjectKind::Column { table, value_type }) => (*table, *value_type),
            _ => return Err(Error::engine(ErrorCode::NoSuchObject, format!("column #{column} not found"))),
        };
        if !cat.tables.get(&table).is_some_and(|t| t.exists(id)) {
            return Err(Error::engine(ErrorCode::InvalidArgument, format!("record {id} not found")));
        }
        check_value_type(value_type, &value)?;
        let new_texts = value_texts(&value)?;

        let values = &mut cat
            .columns
            .get_mut(&column)
            .ok_or_else(|| Error::engine(ErrorCode::CorruptData, format!("column #{column} has no data")))?
            .values;
        let old = if value.is_null() {
            values.remove(&id)
        } else {
            values.insert(id, value)
        };
        let old_texts = match old {
            Some(old) => value_texts(&old)?,
            None => Vec::new(),
        };

        for (index, section) in cat.indexes_fed_by(column) {
            cat.apply_delta(
                index,
                &Delta {
                    record: id,
                    section,
                    old: old_texts.clone(),
                    new: new_texts.clone(),
                },
            );
        }
        Ok(())
    }

    pub fn value(&self, column: ObjectId, id: RecordId) -> Option<Value> {
        self.catalog.read().columns.get(&column)?.values.get(&id).cloned()
    }
}

impl Catalog {
    fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn column_name(&self, table: ObjectId, name: &str) -> Result<String> {
        if name.is_empty() || name.contains('.') {
            return Err(Error::argument("name", format!("invalid column name: {name:?}")));
        }
        match self.objects.get(&table) {
            Some(info) if info.is_table() => match &info.name {
                Some(table_name) => Ok(format!("{table_name}.{name}")),
                None => Err(Error::argument("table", "anonymous tables cannot have columns")),
            },
            _ => Err(Error::argument("table", format!("#{table} is not a table"))),
        }
    }

    fn table_mut(&mut self, table: ObjectId) -> Result<&mut TableData> {
        self.tables
            .get_mut(&table)
            .ok_or_else(|| Error::engine(ErrorCode::NoSuchObject, format!("table #{table} not found")))
    }

    fn index(&self, column: ObjectId) -> Result<&IndexData> {
        self.indexes
            .get(&column)
            .ok_or_else(|| Error::engine(ErrorCode::InvalidArgument, format!("#{column} is not an index column")))
    }

    /// (index, section) pairs of every index listing `source`
    fn indexes_fed_by(&self, source: ObjectId) -> Vec<(ObjectId, u32)> {
        let mut fed = Vec::new();
        for (id, index) in &self.indexes {
            for (i, s) in index.sources.iter().enumerate() {
                if *s == source {
                    fed.push((*id, i as u32 + 1));
                }
            }
        }
        fed
    }

    /// Current texts of a source: column values, or keys when the source is
    /// the range table itself.
    fn source_texts(&self, source: ObjectId) -> Result<Vec<(RecordId, Vec<String>)>> {
        if let Some(column) = self.columns.get(&source) {
            let mut texts = Vec::with_capacity(column.values.len());
            for (record, value) in &column.values {
                texts.push((*record, value_texts(value)?));
            }
            return Ok(texts);
        }
        if let Some(table) = self.tables.get(&source) {
            return Ok(table
                .ids()
                .filter_map(|id| table.key(id).map(|k| (id, vec![k.to_string()])))
                .collect());
        }
        Err(Error::engine(ErrorCode::NoSuchObject, format!("source #{source} not found")))
    }

    /// Validate and install a new source list, moving existing contributions
    /// to match: sources dropped or moved are retracted from their old
    /// section, sources added or moved are indexed at their new one.
    fn install_sources(&mut self, index: ObjectId, sources: Vec<ObjectId>) -> Result<()> {
        let range = self.index(index)?.range;
        for source in &sources {
            match self.objects.get(source).map(|o| &o.kind) {
                Some(ObjectKind::Column { table, .. }) if *table == range => {}
                Some(ObjectKind::Table { .. }) if *source == range => {}
                Some(_) => {
                    return Err(Error::engine(
                        ErrorCode::InvalidArgument,
                        format!("source #{source} is not a column of table #{range}"),
                    ));
                }
                None => {
                    return Err(Error::engine(ErrorCode::NoSuchObject, format!("source #{source} not found")));
                }
            }
        }

        let pairs = |list: &[ObjectId]| -> BTreeSet<(ObjectId, u32)> {
            list.iter().enumerate().map(|(i, s)| (*s, i as u32 + 1)).collect()
        };
        let old_pairs = pairs(self.index(index)?.sources.as_slice());
        let new_pairs = pairs(&sources);

        let mut deltas = Vec::new();
        for (source, section) in old_pairs.difference(&new_pairs) {
            for (record, texts) in self.source_texts(*source)? {
                deltas.push(Delta { record, section: *section, old: texts, new: Vec::new() });
            }
        }
        for (source, section) in new_pairs.difference(&old_pairs) {
            for (record, texts) in self.source_texts(*source)? {
                deltas.push(Delta { record, section: *section, old: Vec::new(), new: texts });
            }
        }

        for delta in &deltas {
            self.apply_delta(index, delta);
        }
        if let Some(data) = self.indexes.get_mut(&index) {
            data.sources = sources;
        }
        log::debug!("installed sources of index #{index} ({} deltas)", deltas.len());
        Ok(())
    }

    /// Retract `old` and insert `new` for one record. Infallible once the
    /// texts are known, so a delta is never half applied.
    fn apply_delta(&mut self, index: ObjectId, delta: &Delta) {
        let Catalog { tables, indexes, .. } = self;
        let Some(data) = indexes.get_mut(&index) else {
            return;
        };
        let Some(lexicon) = tables.get_mut(&data.lexicon) else {
            return;
        };
        // Folded sections keep their positions apart so that a phrase never
        // spans two sources.
        let (section, start) = if data.flags.contains(IndexFlags::WITH_SECTION) {
            (delta.section, 0)
        } else {
            (1, delta.section.saturating_sub(1).saturating_mul(SECTION_SPAN))
        };

        for (text, position) in positioned_tokens(data.tokenizer, &delta.old, start) {
            if let Some(term) = lexicon.get(text) {
                data.postings.remove(term, delta.record, section, position);
            }
        }
        for (text, position) in positioned_tokens(data.tokenizer, &delta.new, start) {
            let (term, _) = lexicon.add_key(text);
            data.postings.add(term, delta.record, section, position);
        }
        log::trace!(
            "index #{index} record {} section {section}: -{} +{}",
            delta.record,
            delta.old.len(),
            delta.new.len()
        );
    }

    // --- Search ---

    fn term_ids(lexicon: &TableData, token: &Token<'_>, mode: SearchMode) -> Vec<RecordId> {
        match mode {
            SearchMode::Suffix => lexicon.suffix(token.text),
            _ if token.prefix || mode == SearchMode::Prefix => lexicon.prefix(token.text),
            _ => lexicon.get(token.text).into_iter().collect(),
        }
    }

    fn match_term(&self, index: &IndexData, term: RecordId) -> Matches {
        let mut matches = Matches::new();
        if let Some(list) = index.postings.list(term) {
            for record in list.records() {
                matches.insert(
                    record,
                    ResultRecord {
                        score: list.frequency(record),
                        n_subrecs: list.sections(record).count() as u32,
                    },
                );
            }
        }
        matches
    }

    /// Records containing every token of `text`. With positions, multi-token
    /// text must also appear as a phrase within one section.
    fn match_text(&self, index: &IndexData, text: &str, mode: SearchMode) -> Matches {
        let mut matches = Matches::new();
        let Some(lexicon) = self.tables.get(&index.lexicon) else {
            return matches;
        };
        let tokens = index.tokenizer.tokenize(text, TokenizeMode::Get);
        if tokens.is_empty() {
            return matches;
        }
        let term_sets: Vec<Vec<RecordId>> = tokens.iter().map(|t| Self::term_ids(lexicon, t, mode)).collect();
        if term_sets.iter().any(Vec::is_empty) {
            return matches;
        }

        let mut candidates: Option<RoaringBitmap> = None;
        for terms in &term_sets {
            let mut union = RoaringBitmap::new();
            for term in terms {
                if let Some(list) = index.postings.list(*term) {
                    union |= list.records();
                }
            }
            candidates = Some(match candidates {
                None => union,
                Some(c) => c & union,
            });
        }
        let candidates = candidates.unwrap_or_default();
        let phrase = tokens.len() > 1 && index.flags.contains(IndexFlags::WITH_POSITION);

        for record in &candidates {
            let mut by_section: BTreeMap<u32, Vec<Vec<u32>>> = BTreeMap::new();
            for (k, terms) in term_sets.iter().enumerate() {
                for term in terms {
                    let Some(list) = index.postings.list(*term) else { continue };
                    for (section, positions) in list.sections(record) {
                        let slots = by_section.entry(section).or_insert_with(|| vec![Vec::new(); tokens.len()]);
                        slots[k].extend_from_slice(positions);
                    }
                }
            }

            let mut score = 0u32;
            let mut n_subrecs = 0u32;
            for slots in by_section.values_mut() {
                let hits = if phrase {
                    for slot in slots.iter_mut() {
                        slot.sort_unstable();
                    }
                    phrase_hits(&tokens, slots)
                } else {
                    slots.iter().map(|s| s.len() as u32).sum::<u32>()
                };
                if hits > 0 {
                    score += hits;
                    n_subrecs += 1;
                }
            }
            if score > 0 {
                matches.insert(record, ResultRecord { score, n_subrecs });
            }
        }
        matches
    }
}

/// Occurrences of the token sequence at consecutive positions.
fn phrase_hits(tokens: &[Token<'_>], slots: &[Vec<u32>]) -> u32 {
    let base = tokens[0].position;
    slots[0]
        .iter()
        .filter(|&&start| {
            tokens.iter().zip(slots).skip(1).all(|(token, positions)| {
                positions.binary_search(&(start + (token.position - base))).is_ok()
            })
        })
        .count() as u32
}

/// Tokens of every text with positions; each vector element starts past the
/// previous one so elements never form phrases together.
fn positioned_tokens(tokenizer: TokenizerKind, texts: &[String], start: u32) -> Vec<(&str, u32)> {
    let mut out = Vec::new();
    let mut base = start;
    for text in texts {
        let tokens = tokenizer.tokenize(text, TokenizeMode::Add);
        let mut last = 0u32;
        for token in tokens {
            last = last.max(token.position);
            out.push((token.text, base.saturating_add(token.position)));
        }
        base = base.saturating_add(last + 2);
    }
    out
}

fn value_texts(value: &Value) -> Result<Vec<String>> {
    let mut bulk = Bulk::new(BulkFlags::empty(), ID_NIL);
    bulk.set_value(value)?;
    texts_of(&bulk)
}

fn texts_of(bulk: &Bulk) -> Result<Vec<String>> {
    if bulk.is_empty() && !bulk.is_vector() {
        return Ok(Vec::new());
    }
    Ok(bulk.texts()?.into_iter().map(str::to_string).collect())
}

fn check_value_type(value_type: DataType, value: &Value) -> Result<()> {
    let ok = match value {
        Value::Null => true,
        Value::Array(items) => return items.iter().try_for_each(|v| check_value_type(value_type, v)),
        Value::String(_) => value_type.is_text(),
        Value::Bool(_) => value_type == DataType::Bool,
        Value::Number(n) => match value_type {
            DataType::Int32 => n.as_i64().is_some_and(|v| i32::try_from(v).is_ok()),
            DataType::UInt32 => n.as_u64().is_some_and(|v| u32::try_from(v).is_ok()),
            DataType::Int64 => n.as_i64().is_some(),
            DataType::Float => true,
            _ => false,
        },
        Value::Object(_) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::argument("value", format!("{value} is not a valid {}", value_type.name())))
    }
}

/// Record an engine failure in the context and hand it back to the caller.
fn report(ctx: &Context, err: Error) -> Error {
    if let Error::Engine { code, message } = &err {
        ctx.set_error(Error::engine(*code, message.clone()));
    }
    err
}

fn fail(ctx: &Context, code: ErrorCode, message: String) -> Error {
    report(ctx, Error::engine(code, message))
}

impl Engine for Database {
    fn object(&self, id: ObjectId) -> Option<ObjectInfo> {
        self.catalog.read().objects.get(&id).cloned()
    }

    fn lookup(&self, name: &str) -> Option<ObjectInfo> {
        let id = *self.names.get(name)?;
        self.object(id)
    }

    fn remove_object(&self, ctx: &Context, id: ObjectId) -> Result<()> {
        let mut cat = self.catalog.write();
        let info = match cat.objects.get(&id) {
            Some(info) => info.clone(),
            None => return Err(fail(ctx, ErrorCode::NoSuchObject, format!("object #{id} not found"))),
        };

        let mut doomed = vec![id];
        match &info.kind {
            ObjectKind::Type(_) => {
                return Err(fail(ctx, ErrorCode::InvalidOperation, format!("{} is built in", info.label())));
            }
            ObjectKind::Table { .. } => {
                if let Some((user, _)) = cat.indexes.iter().find(|(_, i)| i.range == id && i.lexicon != id) {
                    return Err(fail(
                        ctx,
                        ErrorCode::InvalidOperation,
                        format!("{} is indexed by #{user}", info.label()),
                    ));
                }
                doomed.extend(cat.objects.values().filter_map(|o| match o.kind {
                    ObjectKind::Column { table, .. } if table == id => Some(o.id),
                    ObjectKind::Index { lexicon, .. } if lexicon == id => Some(o.id),
                    _ => None,
                }));
            }
            ObjectKind::Column { .. } | ObjectKind::Index { .. } => {}
        }

        // Detach removed sources from surviving indexes before dropping them.
        let users: Vec<ObjectId> = cat
            .indexes
            .iter()
            .filter(|(index, data)| !doomed.contains(index) && data.sources.iter().any(|s| doomed.contains(s)))
            .map(|(index, _)| *index)
            .collect();
        for index in users {
            let remaining: Vec<ObjectId> = cat
                .indexes
                .get(&index)
                .map(|data| data.sources.iter().copied().filter(|s| !doomed.contains(s)).collect())
                .unwrap_or_default();
            cat.install_sources(index, remaining).map_err(|e| report(ctx, e))?;
        }

        for gone in &doomed {
            if let Some(info) = cat.objects.remove(gone) {
                if let Some(name) = info.name {
                    self.names.remove(&name);
                }
            }
            cat.tables.remove(gone);
            cat.columns.remove(gone);
            cat.indexes.remove(gone);
        }
        log::debug!("removed {} (and {} dependents)", info.label(), doomed.len() - 1);
        Ok(())
    }

    fn source_info(&self, ctx: &Context, column: ObjectId, out: &mut Bulk) -> Result<()> {
        let cat = self.catalog.read();
        let index = cat.index(column).map_err(|e| report(ctx, e))?;
        out.set_ids(&index.sources);
        Ok(())
    }

    fn set_source_info(&self, ctx: &Context, column: ObjectId, sources: &Bulk) -> Result<()> {
        let ids = sources
            .ids()
            .map_err(|e| fail(ctx, ErrorCode::InvalidArgument, e.to_string()))?;
        self.catalog
            .write()
            .install_sources(column, ids)
            .map_err(|e| report(ctx, e))
    }

    fn index_update(
        &self,
        ctx: &Context,
        column: ObjectId,
        id: RecordId,
        section: u32,
        old: Option<&Bulk>,
        new: Option<&Bulk>,
    ) -> Result<()> {
        if section == 0 {
            return Err(fail(ctx, ErrorCode::InvalidArgument, "section must be positive".into()));
        }
        let texts = |bulk: Option<&Bulk>| match bulk {
            Some(b) => texts_of(b).map_err(|e| fail(ctx, ErrorCode::InvalidArgument, e.to_string())),
            None => Ok(Vec::new()),
        };
        let delta = Delta {
            record: id,
            section,
            old: texts(old)?,
            new: texts(new)?,
        };

        let mut cat = self.catalog.write();
        let range = cat.index(column).map_err(|e| report(ctx, e))?.range;
        if !cat.tables.get(&range).is_some_and(|t| t.exists(id)) {
            return Err(fail(
                ctx,
                ErrorCode::InvalidArgument,
                format!("record {id} does not exist in table #{range}"),
            ));
        }
        cat.apply_delta(column, &delta);
        Ok(())
    }

    fn create_result_table(&self, ctx: &Context, key_table: ObjectId, flags: TableFlags) -> Result<ResultTable> {
        if !self.catalog.read().tables.contains_key(&key_table) {
            return Err(fail(ctx, ErrorCode::InvalidArgument, format!("#{key_table} is not a table")));
        }
        log::debug!("created result table keyed by #{key_table}");
        Ok(ResultTable::with_flags(key_table, flags))
    }

    fn search(
        &self,
        ctx: &Context,
        column: ObjectId,
        query: NormalizedQuery<'_>,
        result: &mut ResultTable,
        operator: SelectOperator,
        mode: SearchMode,
    ) -> Result<()> {
        let cat = self.catalog.read();
        let index = cat.index(column).map_err(|e| report(ctx, e))?;
        if result.key_table() != index.range {
            return Err(fail(
                ctx,
                ErrorCode::InvalidArgument,
                format!("result table is keyed by #{}, index by #{}", result.key_table(), index.range),
            ));
        }

        let matches = match query {
            NormalizedQuery::Bulk(bulk) if bulk.domain() == index.lexicon => match bulk.as_u32() {
                Some(term) => cat.match_term(index, term),
                None => {
                    return Err(fail(ctx, ErrorCode::InvalidArgument, "term id query must be 4 bytes".into()));
                }
            },
            NormalizedQuery::Bulk(bulk)
                if bulk.domain() == ID_NIL || DataType::from_id(bulk.domain()).is_some_and(DataType::is_text) =>
            {
                let text = bulk
                    .as_str()
                    .map_err(|e| fail(ctx, ErrorCode::InvalidArgument, e.to_string()))?;
                cat.match_text(index, text, mode)
            }
            NormalizedQuery::Bulk(bulk) => {
                return Err(fail(
                    ctx,
                    ErrorCode::InvalidArgument,
                    format!("cannot search with a query typed #{}", bulk.domain()),
                ));
            }
            NormalizedQuery::Compiled(compiled) => {
                let mut set = ResultTable::with_flags(index.range, result.flags());
                for (i, clause) in compiled.clauses().iter().enumerate() {
                    let m = cat.match_text(index, &clause.text, clause.mode);
                    let op = if i == 0 { SelectOperator::Or } else { clause.operator };
                    set.merge(&m, op);
                }
                set.into_matches()
            }
        };
        log::trace!("search on #{column}: {} matches merged with {}", matches.len(), operator.name());
        result.merge(&matches, operator);
        Ok(())
    }
}
