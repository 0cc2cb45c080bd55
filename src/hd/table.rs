//! Header table storage: refcounted entry slab and the indexed table with
//! its size accounting and eviction rules.
//!
//! A table entry can simultaneously be referenced by the table itself, by the
//! reference set, and by working-set cells; the slab keeps one refcount per
//! slot and frees the entry bytes when the last reference drops. An entry's
//! `index` is its *current* position in the table, or `INVALID_INDEX` once it
//! has been evicted while still referenced elsewhere.

use alloc::vec::Vec;

use super::{HD_ENTRY_OVERHEAD, HD_MAX_BUFFER_SIZE, HD_MAX_ENTRY_SIZE, INITIAL_HD_TABLE_SIZE};
use crate::nv::Nv;

/// Position marker for entries no longer in the table.
pub(crate) const INVALID_INDEX: usize = usize::MAX;

/// Nominal byte cost of an entry for capacity accounting.
#[inline]
pub(crate) fn entry_room(namelen: usize, valuelen: usize) -> usize {
    HD_ENTRY_OVERHEAD + namelen + valuelen
}

/// Handle to a slab slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Handle(usize);

/// A header-table entry.
#[derive(Debug)]
pub(crate) struct HdEntry {
    pub(crate) nv: Nv,
    pub(crate) index: usize,
}

impl HdEntry {
    #[inline]
    pub(crate) fn room(&self) -> usize {
        entry_room(self.nv.name.len(), self.nv.value.len())
    }
}

struct Slot {
    refcnt: usize,
    entry: HdEntry,
}

/// Refcounted entry storage shared by the table, reference set and working
/// set.
pub(crate) struct Slab {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Slab {
    fn new() -> Self {
        Slab {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store `entry` with a refcount of one.
    pub(crate) fn insert(&mut self, entry: HdEntry) -> Handle {
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = Slot { refcnt: 1, entry };
                Handle(i)
            }
            None => {
                self.slots.push(Slot { refcnt: 1, entry });
                Handle(self.slots.len() - 1)
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, h: Handle) -> &HdEntry {
        debug_assert!(self.slots[h.0].refcnt > 0);
        &self.slots[h.0].entry
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, h: Handle) -> &mut HdEntry {
        debug_assert!(self.slots[h.0].refcnt > 0);
        &mut self.slots[h.0].entry
    }

    #[inline]
    pub(crate) fn incref(&mut self, h: Handle) {
        debug_assert!(self.slots[h.0].refcnt > 0);
        self.slots[h.0].refcnt += 1;
    }

    /// Drop one reference; the entry bytes are released when the count
    /// reaches zero and the slot goes back on the free list.
    pub(crate) fn decref(&mut self, h: Handle) {
        let slot = &mut self.slots[h.0];
        debug_assert!(slot.refcnt > 0);
        slot.refcnt -= 1;
        if slot.refcnt == 0 {
            slot.entry.nv = Nv::default();
            slot.entry.index = INVALID_INDEX;
            self.free.push(h.0);
        }
    }

    #[cfg(test)]
    pub(crate) fn refcnt(&self, h: Handle) -> usize {
        self.slots[h.0].refcnt
    }
}

#[cfg(test)]
pub(crate) fn handle_id(h: Handle) -> usize {
    h.0
}

/// The indexed header table. Index 0 is the oldest entry; inserts append,
/// evictions pop from the front and re-index the remainder.
pub(crate) struct HdTable {
    pub(crate) entries: heapless::Vec<Handle, INITIAL_HD_TABLE_SIZE>,
    pub(crate) bufsize: usize,
    pub(crate) slab: Slab,
}

impl HdTable {
    pub(crate) fn seeded(seed: &[(&[u8], &[u8])]) -> Self {
        let mut table = HdTable {
            entries: heapless::Vec::new(),
            bufsize: 0,
            slab: Slab::new(),
        };
        for (i, &(name, value)) in seed.iter().enumerate() {
            let entry = HdEntry {
                nv: Nv::new(name, value),
                index: i,
            };
            table.bufsize += entry.room();
            let h = table.slab.insert(entry);
            if table.entries.push(h).is_err() {
                // Seed tables are far below the table capacity.
                table.slab.decref(h);
            }
        }
        table
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// First entry equal to `nv`, oldest first.
    pub(crate) fn find(&self, nv: &Nv) -> Option<Handle> {
        self.entries
            .iter()
            .copied()
            .find(|&h| self.slab.get(h).nv == *nv)
    }

    /// First entry whose name equals `nv.name`, oldest first.
    pub(crate) fn find_name(&self, nv: &Nv) -> Option<Handle> {
        self.entries
            .iter()
            .copied()
            .find(|&h| self.slab.get(h).nv.name == nv.name)
    }

    /// Shift entries `[from..]` down to start at `to`, fixing up live
    /// indices, and truncate.
    fn compact(&mut self, from: usize, to: usize) {
        let mut j = to;
        let mut src = from;
        while src < self.entries.len() {
            let h = self.entries[src];
            self.entries[j] = h;
            self.slab.get_mut(h).index = j;
            j += 1;
            src += 1;
        }
        self.entries.truncate(j);
    }

    /// Append `nv` as a new entry, evicting oldest entries as needed.
    ///
    /// Returns `None` when the table is at capacity or the entry alone is
    /// larger than `HD_MAX_ENTRY_SIZE`.
    pub(crate) fn add_incremental(&mut self, nv: &Nv) -> Option<Handle> {
        let room = entry_room(nv.name.len(), nv.value.len());
        if self.entries.len() == INITIAL_HD_TABLE_SIZE || room > HD_MAX_ENTRY_SIZE {
            return None;
        }
        self.bufsize += room;
        let mut i = 0;
        while i < self.entries.len() && self.bufsize > HD_MAX_BUFFER_SIZE {
            let h = self.entries[i];
            self.bufsize -= self.slab.get(h).room();
            self.slab.get_mut(h).index = INVALID_INDEX;
            self.slab.decref(h);
            i += 1;
        }
        if i > 0 {
            self.compact(i, 0);
        }
        let index = self.entries.len();
        let h = self.slab.insert(HdEntry {
            nv: nv.clone(),
            index,
        });
        if self.entries.push(h).is_err() {
            self.slab.decref(h);
            return None;
        }
        Some(h)
    }

    /// Replace the entry at `subindex` with `nv`, evicting oldest entries as
    /// needed to fit the exchanged room.
    ///
    /// The eviction sweep skips `subindex` in the size accounting (its room
    /// was already exchanged up front) but still releases every swept slot.
    /// If the sweep runs past `subindex`, the slot to substitute is already
    /// gone; the new entry then lands at index 0 and the survivors are
    /// compacted to start at index 1.
    pub(crate) fn add_subst(&mut self, nv: &Nv, subindex: usize) -> Option<Handle> {
        let room = entry_room(nv.name.len(), nv.value.len());
        if room > HD_MAX_ENTRY_SIZE || self.entries.len() <= subindex {
            return None;
        }
        self.bufsize -= self.slab.get(self.entries[subindex]).room();
        self.bufsize += room;
        let mut i = 0;
        let mut k = subindex as isize;
        while i < self.entries.len() && self.bufsize > HD_MAX_BUFFER_SIZE {
            let h = self.entries[i];
            if i != subindex {
                self.bufsize -= self.slab.get(h).room();
            }
            self.slab.get_mut(h).index = INVALID_INDEX;
            self.slab.decref(h);
            i += 1;
            k -= 1;
        }
        if i > 0 {
            let start = if k < 0 { 1 } else { 0 };
            self.compact(i, start);
        }
        let index = if k >= 0 {
            // The substituted slot survived the sweep (shifted down by `i`);
            // release it and reuse its position.
            let k = k as usize;
            let old = self.entries[k];
            self.slab.get_mut(old).index = INVALID_INDEX;
            self.slab.decref(old);
            k
        } else {
            0
        };
        let h = self.slab.insert(HdEntry {
            nv: nv.clone(),
            index,
        });
        self.entries[index] = h;
        Some(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn nv_with_room(tag: u8, room: usize) -> Nv {
        // room = overhead + namelen + valuelen; name is 1 byte.
        assert!(room > HD_ENTRY_OVERHEAD + 1);
        Nv {
            name: vec![tag],
            value: vec![b'v'; room - HD_ENTRY_OVERHEAD - 1],
        }
    }

    fn names(table: &HdTable) -> Vec<Vec<u8>> {
        table
            .entries
            .iter()
            .map(|&h| table.slab.get(h).nv.name.clone())
            .collect()
    }

    fn room_sum(table: &HdTable) -> usize {
        table
            .entries
            .iter()
            .map(|&h| table.slab.get(h).room())
            .sum()
    }

    #[test]
    fn seeded_indices_and_accounting() {
        let table = HdTable::seeded(&[(b"a", b"1"), (b"bb", b"22")]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.slab.get(table.entries[0]).index, 0);
        assert_eq!(table.slab.get(table.entries[1]).index, 1);
        assert_eq!(table.bufsize, (32 + 2) + (32 + 4));
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn incremental_appends_at_tail() {
        let mut table = HdTable::seeded(&[(b"a", b"1")]);
        let before = table.bufsize;
        let h = table.add_incremental(&Nv::new(b"x-custom", b"v")).unwrap();
        assert_eq!(table.slab.get(h).index, 1);
        assert_eq!(table.bufsize, before + 32 + 8 + 1);
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn incremental_rejects_oversize_entry() {
        let mut table = HdTable::seeded(&[]);
        let nv = nv_with_room(b'x', HD_MAX_ENTRY_SIZE + 1);
        assert!(table.add_incremental(&nv).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn incremental_evicts_oldest_and_reindexes() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 1000)).unwrap();
        table.add_incremental(&nv_with_room(b'b', 1000)).unwrap();
        // 1000 + 1000 + 2500 > 4096: evicting a alone brings it back under.
        let h = table.add_incremental(&nv_with_room(b'c', 2500)).unwrap();
        assert_eq!(names(&table), vec![b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(table.slab.get(table.entries[0]).index, 0);
        assert_eq!(table.slab.get(h).index, 1);
        assert_eq!(table.bufsize, 1000 + 2500);
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn evicted_entry_kept_alive_by_outside_reference() {
        let mut table = HdTable::seeded(&[]);
        let a = table.add_incremental(&nv_with_room(b'a', 2100)).unwrap();
        table.slab.incref(a); // simulate a working-set reference
        table.add_incremental(&nv_with_room(b'b', 2100)).unwrap();
        // a was evicted but survives with an invalid index.
        assert_eq!(table.len(), 1);
        assert_eq!(table.slab.get(a).index, INVALID_INDEX);
        assert_eq!(table.slab.get(a).nv.name, b"a");
        assert_eq!(table.slab.refcnt(a), 1);
        table.slab.decref(a);
    }

    #[test]
    fn subst_in_place_without_eviction() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 1000)).unwrap();
        table.add_incremental(&nv_with_room(b'b', 1000)).unwrap();
        table.add_incremental(&nv_with_room(b'c', 1000)).unwrap();
        let h = table.add_subst(&nv_with_room(b'n', 1500), 1).unwrap();
        assert_eq!(
            names(&table),
            vec![b"a".to_vec(), b"n".to_vec(), b"c".to_vec()]
        );
        assert_eq!(table.slab.get(h).index, 1);
        assert_eq!(table.bufsize, 1000 + 1500 + 1000);
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn subst_rejects_out_of_range_index() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 500)).unwrap();
        assert!(table.add_subst(&nv_with_room(b'n', 500), 1).is_none());
    }

    #[test]
    fn subst_with_eviction_before_surviving_slot() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 1500)).unwrap();
        table.add_incremental(&nv_with_room(b'b', 1000)).unwrap();
        table.add_incremental(&nv_with_room(b'c', 1000)).unwrap();
        // Exchange c (1000) for 2600: 1500+1000+2600 = 5100 > 4096, so a is
        // evicted; c's slot shifts from 2 to 1 and is then substituted.
        let h = table.add_subst(&nv_with_room(b'n', 2600), 2).unwrap();
        assert_eq!(names(&table), vec![b"b".to_vec(), b"n".to_vec()]);
        assert_eq!(table.slab.get(h).index, 1);
        assert_eq!(table.bufsize, 1000 + 2600);
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn subst_whose_target_is_evicted_lands_at_zero() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 1500)).unwrap();
        table.add_incremental(&nv_with_room(b'b', 1500)).unwrap();
        table.add_incremental(&nv_with_room(b'c', 1000)).unwrap();
        // Exchange a (1500) for 3000: 3000+1500+1000 = 5500 > 4096 sweeps a
        // (skipped in accounting) and then b. The target itself was swept, so
        // the new entry lands at index 0 and c compacts to index 1.
        let h = table.add_subst(&nv_with_room(b'n', 3000), 0).unwrap();
        assert_eq!(names(&table), vec![b"n".to_vec(), b"c".to_vec()]);
        assert_eq!(table.slab.get(h).index, 0);
        assert_eq!(
            table.slab.get(table.entries[1]).index,
            1,
            "survivor must be re-indexed"
        );
        assert_eq!(table.bufsize, 3000 + 1000);
        assert_eq!(table.bufsize, room_sum(&table));
    }

    #[test]
    fn subst_eviction_consumes_whole_table() {
        let mut table = HdTable::seeded(&[]);
        table.add_incremental(&nv_with_room(b'a', 1500)).unwrap();
        table.add_incremental(&nv_with_room(b'b', 1500)).unwrap();
        // Exchange a for 3000: 3000+1500 = 4500 > 4096 sweeps a then b.
        let h = table.add_subst(&nv_with_room(b'n', 3000), 0).unwrap();
        assert_eq!(names(&table), vec![b"n".to_vec()]);
        assert_eq!(table.slab.get(h).index, 0);
        assert_eq!(table.bufsize, 3000);
        assert_eq!(table.bufsize, room_sum(&table));
    }
}
