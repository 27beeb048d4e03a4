use std::collections::TryReserveError;

use crate::record::{Address, BlockRecord};

/// Stable handle to a record inside a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Insertion-ordered arena of block records.
///
/// Records are appended at the tail and never moved, reordered or removed until the
/// registry is destroyed, so a [`RecordId`] stays valid for the registry's whole life and
/// iteration order is allocation order.
///
/// Lookup is a linear scan.
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<BlockRecord>,
}

impl Registry {
    /// Creates an empty registry without allocating.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Whether backing storage has been obtained yet.
    pub fn is_initialized(&self) -> bool {
        self.records.capacity() > 0
    }

    /// Makes room for `additional` more records. After a successful call, that many
    /// [`insert`](Self::insert)s do not allocate.
    pub fn reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.records.try_reserve(additional)
    }

    pub fn insert(&mut self, record: BlockRecord) -> RecordId {
        let id = RecordId(self.records.len());
        self.records.push(record);
        id
    }

    /// Finds the record currently keyed by `address`.
    ///
    /// A live record wins over released ones: once a block is really freed, the allocator
    /// may hand out the same address again, and the new block must not be matched to the
    /// stale record. Without a live match, the first released record with that address is
    /// returned.
    pub fn find(&self, address: Address) -> Option<RecordId> {
        let mut released = None;

        for (index, record) in self.records.iter().enumerate() {
            if record.address() != address {
                continue;
            }
            if record.is_live() {
                return Some(RecordId(index));
            }
            if released.is_none() {
                released = Some(RecordId(index));
            }
        }

        released
    }

    pub fn get(&self, id: RecordId) -> Option<&BlockRecord> {
        self.records.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Option<&mut BlockRecord> {
        self.records.get_mut(id.0)
    }

    /// Records in insertion order. Each call starts a fresh pass.
    pub fn iter(&self) -> std::slice::Iter<'_, BlockRecord> {
        self.records.iter()
    }

    pub fn live(&self) -> impl Iterator<Item = &BlockRecord> + '_ {
        self.records.iter().filter(|record| record.is_live())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record and the registry's storage. `on_live` sees each record that is
    /// still live first; the tracked memory itself is left alone unless `on_live` frees it.
    ///
    /// Returns the number of records destroyed.
    pub fn destroy(self, mut on_live: impl FnMut(&BlockRecord)) -> usize {
        let count = self.records.len();
        for record in self.records.iter().filter(|record| record.is_live()) {
            on_live(record);
        }
        count
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a BlockRecord;
    type IntoIter = std::slice::Iter<'a, BlockRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
