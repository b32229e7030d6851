//! ResultTable: keyed search results merged with a selection operator.

use std::collections::BTreeMap;

use crate::query::SelectOperator;
use crate::types::{ObjectId, RecordId};

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TableFlags: u32 {
        const HASH_KEY = 0x0001;
        const WITH_SUBREC = 0x0080;
    }
}

/// Accumulated match information for one key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultRecord {
    pub score: u32,
    /// Number of matching sub-records (sections); only counted with `WITH_SUBREC`.
    pub n_subrecs: u32,
}

/// Per-key matches produced by one engine search before merging.
pub(crate) type Matches = BTreeMap<RecordId, ResultRecord>;

/// Search results keyed by records of `key_table`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    key_table: ObjectId,
    flags: TableFlags,
    records: BTreeMap<RecordId, ResultRecord>,
}

impl ResultTable {
    /// Empty table keyed by records of `key_table`, with sub-record support.
    pub fn new(key_table: ObjectId) -> Self {
        Self::with_flags(key_table, TableFlags::HASH_KEY | TableFlags::WITH_SUBREC)
    }

    pub fn with_flags(key_table: ObjectId, flags: TableFlags) -> Self {
        Self {
            key_table,
            flags,
            records: BTreeMap::new(),
        }
    }

    pub fn key_table(&self) -> ObjectId {
        self.key_table
    }

    pub fn flags(&self) -> TableFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: RecordId) -> bool {
        self.records.contains_key(&key)
    }

    pub fn get(&self, key: RecordId) -> Option<&ResultRecord> {
        self.records.get(&key)
    }

    pub fn score(&self, key: RecordId) -> Option<u32> {
        self.records.get(&key).map(|r| r.score)
    }

    /// Keys in ascending record id order
    pub fn keys(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &ResultRecord)> + '_ {
        self.records.iter().map(|(k, v)| (*k, v))
    }

    pub fn remove(&mut self, key: RecordId) -> Option<ResultRecord> {
        self.records.remove(&key)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Combine `matches` into this table.
    ///
    /// - `Or` inserts new keys and accumulates scores of existing ones.
    /// - `And` keeps only existing keys that also match, accumulating their score.
    /// - `AndNot` removes every matching key.
    /// - `Adjust` adds the match score to existing keys and never inserts.
    pub(crate) fn merge(&mut self, matches: &Matches, operator: SelectOperator) {
        let with_subrec = self.flags.contains(TableFlags::WITH_SUBREC);
        match operator {
            SelectOperator::Or => {
                for (key, m) in matches {
                    let entry = self.records.entry(*key).or_default();
                    accumulate(entry, m, with_subrec);
                }
            }
            SelectOperator::And => {
                self.records.retain(|key, entry| match matches.get(key) {
                    Some(m) => {
                        accumulate(entry, m, with_subrec);
                        true
                    }
                    None => false,
                });
            }
            SelectOperator::AndNot => {
                for key in matches.keys() {
                    self.records.remove(key);
                }
            }
            SelectOperator::Adjust => {
                for (key, m) in matches {
                    if let Some(entry) = self.records.get_mut(key) {
                        entry.score = entry.score.saturating_add(m.score);
                    }
                }
            }
        }
    }

    pub(crate) fn into_matches(self) -> Matches {
        self.records
    }
}

fn accumulate(entry: &mut ResultRecord, m: &ResultRecord, with_subrec: bool) {
    entry.score = entry.score.saturating_add(m.score);
    if with_subrec {
        entry.n_subrecs = entry.n_subrecs.saturating_add(m.n_subrecs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(keys: &[RecordId]) -> Matches {
        keys.iter()
            .map(|k| (*k, ResultRecord { score: 1, n_subrecs: 1 }))
            .collect()
    }

    fn table(keys: &[RecordId]) -> ResultTable {
        let mut t = ResultTable::new(256);
        t.merge(&matches(keys), SelectOperator::Or);
        t
    }

    #[test]
    fn test_or_accumulates() {
        let mut t = table(&[1, 2]);
        t.merge(&matches(&[2, 3]), SelectOperator::Or);
        assert_eq!(t.keys(), vec![1, 2, 3]);
        assert_eq!(t.score(2), Some(2));
        assert_eq!(t.get(2).unwrap().n_subrecs, 2);
    }

    #[test]
    fn test_and_keeps_intersection() {
        let mut t = table(&[1, 2]);
        t.merge(&matches(&[2, 3]), SelectOperator::And);
        assert_eq!(t.keys(), vec![2]);
        assert_eq!(t.score(2), Some(2));
    }

    #[test]
    fn test_and_not_removes_matches() {
        let mut t = table(&[1, 2]);
        t.merge(&matches(&[2]), SelectOperator::AndNot);
        assert_eq!(t.keys(), vec![1]);
    }

    #[test]
    fn test_adjust_never_inserts() {
        let mut t = table(&[1, 2]);
        t.merge(&matches(&[2, 3]), SelectOperator::Adjust);
        assert_eq!(t.keys(), vec![1, 2]);
        assert_eq!(t.score(1), Some(1));
        assert_eq!(t.score(2), Some(2));
    }

    #[test]
    fn test_without_subrec() {
        let mut t = ResultTable::with_flags(256, TableFlags::HASH_KEY);
        t.merge(&matches(&[7]), SelectOperator::Or);
        t.merge(&matches(&[7]), SelectOperator::Or);
        assert_eq!(t.get(7), Some(&ResultRecord { score: 2, n_subrecs: 0 }));
    }
}
