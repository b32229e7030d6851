//! Record storage of one table: live record ids and, for keyed tables, the
//! key ↔ id mapping. Keys are kept sorted so lexicons can answer prefix
//! lookups.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;

use crate::config::TableKind;
use crate::types::RecordId;

#[derive(Debug, Clone)]
pub(crate) struct TableData {
    kind: TableKind,
    keys: BTreeMap<String, RecordId>,
    key_of: AHashMap<RecordId, String>,
    live: RoaringBitmap,
    next_id: RecordId,
}

impl TableData {
    pub(crate) fn new(kind: TableKind) -> Self {
        Self {
            kind,
            keys: BTreeMap::new(),
            key_of: AHashMap::new(),
            live: RoaringBitmap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn kind(&self) -> TableKind {
        self.kind
    }

    /// Append a record to a table without keys.
    pub(crate) fn add(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        id
    }

    /// Find or create the record for `key`. Returns the id and whether it is new.
    pub(crate) fn add_key(&mut self, key: &str) -> (RecordId, bool) {
        if let Some(id) = self.keys.get(key) {
            return (*id, false);
        }
        let id = self.add();
        self.keys.insert(key.to_string(), id);
        self.key_of.insert(id, key.to_string());
        (id, true)
    }

    pub(crate) fn get(&self, key: &str) -> Option<RecordId> {
        self.keys.get(key).copied()
    }

    pub(crate) fn key(&self, id: RecordId) -> Option<&str> {
        self.key_of.get(&id).map(String::as_str)
    }

    pub(crate) fn exists(&self, id: RecordId) -> bool {
        self.live.contains(id)
    }

    pub(crate) fn delete(&mut self, id: RecordId) -> bool {
        if !self.live.remove(id) {
            return false;
        }
        if let Some(key) = self.key_of.remove(&id) {
            self.keys.remove(&key);
        }
        true
    }

    pub(crate) fn len(&self) -> u64 {
        self.live.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.live.iter()
    }

    pub(crate) fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Ids of keys starting with `prefix`, in key order
    pub(crate) fn prefix(&self, prefix: &str) -> Vec<RecordId> {
        self.keys
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Ids of keys ending with `suffix`, in key order
    pub(crate) fn suffix(&self, suffix: &str) -> Vec<RecordId> {
        self.keys
            .iter()
            .filter(|(k, _)| k.ends_with(suffix))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Rebuild from a snapshot: live records with their keys.
    pub(crate) fn restore(kind: TableKind, next_id: RecordId, records: Vec<(RecordId, Option<String>)>) -> Self {
        let mut table = Self::new(kind);
        table.next_id = next_id;
        for (id, key) in records {
            table.live.insert(id);
            if let Some(key) = key {
                table.keys.insert(key.clone(), id);
                table.key_of.insert(id, key);
            }
        }
        table
    }

    pub(crate) fn records(&self) -> Vec<(RecordId, Option<String>)> {
        self.live
            .iter()
            .map(|id| (id, self.key(id).map(str::to_string)))
            .collect()
    }
}
