//! Posting lists: term id → records, with per-section positions.
//!
//! Each list keeps a RoaringBitmap of the records it mentions so that
//! multi-term queries can intersect candidates before looking at positions.
//! Positions are a multiset: indexing the same value twice needs two
//! retractions to disappear.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::types::RecordId;

pub(crate) type Positions = SmallVec<[u32; 4]>;

#[derive(Debug, Clone, Default)]
pub(crate) struct PostingList {
    records: RoaringBitmap,
    /// (record, section) → sorted positions
    entries: BTreeMap<(RecordId, u32), Positions>,
}

impl PostingList {
    pub(crate) fn add(&mut self, record: RecordId, section: u32, position: u32) {
        let positions = self.entries.entry((record, section)).or_default();
        let at = positions.partition_point(|&p| p < position);
        positions.insert(at, position);
        self.records.insert(record);
    }

    /// Remove one occurrence. Returns false if it was not there.
    pub(crate) fn remove(&mut self, record: RecordId, section: u32, position: u32) -> bool {
        let Some(positions) = self.entries.get_mut(&(record, section)) else {
            return false;
        };
        let Ok(at) = positions.binary_search(&position) else {
            return false;
        };
        positions.remove(at);
        if positions.is_empty() {
            self.entries.remove(&(record, section));
            if self.sections(record).next().is_none() {
                self.records.remove(record);
            }
        }
        true
    }

    pub(crate) fn remove_record(&mut self, record: RecordId) {
        let keys: Vec<(RecordId, u32)> = self.sections(record).map(|(s, _)| (record, s)).collect();
        for key in keys {
            self.entries.remove(&key);
        }
        self.records.remove(record);
    }

    pub(crate) fn records(&self) -> &RoaringBitmap {
        &self.records
    }

    /// Sections of `record` in ascending order
    pub(crate) fn sections(&self, record: RecordId) -> impl Iterator<Item = (u32, &Positions)> + '_ {
        self.entries
            .range((record, 0)..=(record, u32::MAX))
            .map(|((_, section), positions)| (*section, positions))
    }

    /// Number of occurrences in `record` across all sections
    pub(crate) fn frequency(&self, record: RecordId) -> u32 {
        self.sections(record).map(|(_, p)| p.len() as u32).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (RecordId, u32, &Positions)> + '_ {
        self.entries.iter().map(|((r, s), p)| (*r, *s, p))
    }
}

#[derive(Debug, Default)]
pub(crate) struct Postings {
    lists: AHashMap<RecordId, PostingList>,
}

impl Postings {
    pub(crate) fn add(&mut self, term: RecordId, record: RecordId, section: u32, position: u32) {
        self.lists.entry(term).or_default().add(record, section, position);
    }

    pub(crate) fn remove(&mut self, term: RecordId, record: RecordId, section: u32, position: u32) -> bool {
        let Some(list) = self.lists.get_mut(&term) else {
            return false;
        };
        let removed = list.remove(record, section, position);
        if list.is_empty() {
            self.lists.remove(&term);
        }
        removed
    }

    pub(crate) fn list(&self, term: RecordId) -> Option<&PostingList> {
        self.lists.get(&term)
    }

    /// Drop every occurrence of `record` from all lists.
    pub(crate) fn remove_record(&mut self, record: RecordId) {
        self.lists.retain(|_, list| {
            if list.records().contains(record) {
                list.remove_record(record);
            }
            !list.is_empty()
        });
    }

    /// Drop the whole list of `term`.
    pub(crate) fn remove_term(&mut self, term: RecordId) {
        self.lists.remove(&term);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (RecordId, &PostingList)> + '_ {
        self.lists.iter().map(|(t, l)| (*t, l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_frequency() {
        let mut postings = Postings::default();
        postings.add(10, 1, 1, 0);
        postings.add(10, 1, 1, 5);
        postings.add(10, 1, 2, 3);
        postings.add(10, 2, 1, 0);

        let list = postings.list(10).unwrap();
        assert_eq!(list.records().len(), 2);
        assert_eq!(list.frequency(1), 3);
        assert_eq!(list.sections(1).next().unwrap().1.as_slice(), &[0, 5]);
        let sections: Vec<u32> = list.sections(1).map(|(s, _)| s).collect();
        assert_eq!(sections, vec![1, 2]);
    }

    #[test]
    fn test_remove_is_per_occurrence() {
        let mut postings = Postings::default();
        postings.add(7, 3, 1, 2);
        postings.add(7, 3, 1, 2);

        assert!(postings.remove(7, 3, 1, 2));
        assert!(postings.list(7).unwrap().records().contains(3));
        assert!(postings.remove(7, 3, 1, 2));
        assert!(postings.list(7).is_none());
        assert!(!postings.remove(7, 3, 1, 2));
    }

    #[test]
    fn test_record_bitmap_tracks_sections() {
        let mut list = PostingList::default();
        list.add(4, 1, 0);
        list.add(4, 2, 0);
        assert!(list.remove(4, 1, 0));
        assert!(list.records().contains(4));
        assert!(list.remove(4, 2, 0));
        assert!(!list.records().contains(4));
    }

    #[test]
    fn test_remove_record() {
        let mut postings = Postings::default();
        postings.add(1, 1, 1, 0);
        postings.add(1, 2, 1, 0);
        postings.add(2, 1, 1, 1);

        postings.remove_record(1);
        assert_eq!(postings.iter().count(), 1);
        assert!(!postings.list(1).unwrap().records().contains(1));
        assert!(postings.list(2).is_none());
    }

    #[test]
    fn test_remove_term() {
        let mut postings = Postings::default();
        postings.add(1, 1, 1, 0);
        postings.add(2, 1, 1, 1);

        postings.remove_term(1);
        assert!(postings.list(1).is_none());
        assert!(postings.list(2).unwrap().records().contains(1));
        postings.remove_term(1);
    }
}
