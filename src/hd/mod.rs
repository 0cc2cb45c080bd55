//! Stateful header compression.
//!
//! Two peers keep synchronized header tables that evolve with every block;
//! the deflater and inflater here apply identical mutations so the tables
//! never diverge. A block is a sequence of representations:
//!
//! ```text
//! 1xxxxxxx  indexed            index (7-bit prefix)
//! 011xxxxx  literal, no index  index+1 (5), value-len (8), value
//! 0110 0000 literal, no index  new name: name-len (8), name, value-len, value
//! 010xxxxx  literal, index     index+1 (5), value-len (8), value
//! 0100 0000 literal, index     new name: name-len (8), name, value-len, value
//! 00xxxxxx  substitution       index+1 (6), subindex (8), value-len, value
//! 0000 0000 substitution       new name: name-len, name, subindex, value-len, value
//! ```
//!
//! Literals carry length-prefixed raw octets. An indexed representation
//! toggles the entry in or out of the peer's working set; at the end of a
//! header block the surviving working set becomes the reference set, the
//! state both sides carry into the next block.
//!
//! Any failure poisons the context permanently: there is no way to
//! resynchronize the tables, so the connection must be torn down.

pub mod integer;
mod seed;
mod table;

use alloc::vec::Vec;

use crate::buf::reserve_buffer;
use crate::bytes::downcase;
use crate::error::Error;
use crate::frame::MAX_FRAME_LENGTH;
use crate::nv::{nv_array_sort, Nv};

use integer::{count_encoded, encode_integer, decode_integer};
use table::{entry_room, Handle, HdTable, INVALID_INDEX};

/// Header-table slot capacity.
pub const INITIAL_HD_TABLE_SIZE: usize = 128;
/// Reference-set slot capacity.
pub const INITIAL_REFSET_SIZE: usize = 128;
/// Working-set slot capacity.
pub const INITIAL_WS_SIZE: usize = 128;
/// Upper bound on the accounted size of the header table.
pub const HD_MAX_BUFFER_SIZE: usize = 4096;
/// Largest single entry the table will absorb.
pub const HD_MAX_ENTRY_SIZE: usize = 3072;
/// Per-entry accounting overhead added to the name and value lengths.
pub const HD_ENTRY_OVERHEAD: usize = 32;

/// Which endpoint of the connection this context belongs to.
///
/// The side selects the seed table: a deflater compresses blocks it sends,
/// an inflater decompresses blocks its peer sent, so the inflater seeds with
/// the opposite side's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    #[inline]
    fn opposite(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }

    fn seed(self) -> &'static [(&'static [u8], &'static [u8])] {
        match self {
            Side::Client => seed::REQ_SEED,
            Side::Server => seed::RES_SEED,
        }
    }
}

/// One working-set cell.
///
/// `Indexed` cells remember the table index the entry had when the cell was
/// created; toggling compares against that frozen index, not the live one,
/// because evictions during a block can move or invalidate the entry.
enum WsEntry {
    Indexed { entry: Handle, index: usize },
    IndName { entry: Handle, value: Vec<u8> },
    NewName { nv: Nv },
    None,
}

/// One side of the compression state machine; one per connection per
/// direction. Not a shared structure: a deflater and an inflater are
/// independent contexts even on the same connection.
pub struct Context {
    #[allow(dead_code)]
    side: Side,
    bad: bool,
    table: HdTable,
    refset: heapless::Vec<Handle, INITIAL_REFSET_SIZE>,
    ws: heapless::Vec<WsEntry, INITIAL_WS_SIZE>,
}

impl Context {
    /// Context for compressing outbound header blocks.
    pub fn deflater(side: Side) -> Self {
        Self::with_seed(side, side)
    }

    /// Context for decompressing inbound header blocks.
    pub fn inflater(side: Side) -> Self {
        Self::with_seed(side, side.opposite())
    }

    fn with_seed(side: Side, seed_side: Side) -> Self {
        Context {
            side,
            bad: false,
            table: HdTable::seeded(seed_side.seed()),
            refset: heapless::Vec::new(),
            ws: heapless::Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of entries currently in the header table.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Accounted byte size of the header table.
    pub fn table_room(&self) -> usize {
        self.table.bufsize
    }

    /// Name and value of the table entry at `index`.
    pub fn table_entry(&self, index: usize) -> Option<(&[u8], &[u8])> {
        self.table.entries.get(index).map(|&h| {
            let nv = &self.table.slab.get(h).nv;
            (nv.name.as_slice(), nv.value.as_slice())
        })
    }

    /// Number of entries in the reference set.
    pub fn refset_len(&self) -> usize {
        self.refset.len()
    }

    // -----------------------------------------------------------------------
    // Working set
    // -----------------------------------------------------------------------

    fn ws_push(&mut self, cell: WsEntry) -> Result<(), Error> {
        self.ws.push(cell).map_err(|_| Error::HeaderComp)
    }

    /// Move every reference-set entry into the working set, freezing its
    /// current table index.
    fn create_workingset(&mut self) -> Result<(), Error> {
        debug_assert!(self.ws.is_empty());
        self.ws.clear();
        for i in 0..self.refset.len() {
            let entry = self.refset[i];
            let index = self.table.slab.get(entry).index;
            self.ws_push(WsEntry::Indexed { entry, index })?;
        }
        self.refset.clear();
        Ok(())
    }

    /// Reference a table entry from the working set (freezes its index).
    fn add_workingset(&mut self, entry: Handle) -> Result<(), Error> {
        let index = self.table.slab.get(entry).index;
        self.ws_push(WsEntry::Indexed { entry, index })?;
        self.table.slab.incref(entry);
        Ok(())
    }

    fn add_workingset_indname(&mut self, entry: Handle, value: Vec<u8>) -> Result<(), Error> {
        self.ws_push(WsEntry::IndName { entry, value })?;
        self.table.slab.incref(entry);
        Ok(())
    }

    fn add_workingset_newname(&mut self, nv: Nv) -> Result<(), Error> {
        self.ws_push(WsEntry::NewName { nv })
    }

    /// Is `nv` already represented by some working-set cell?
    fn find_in_workingset(&self, nv: &Nv) -> bool {
        self.ws.iter().any(|cell| match cell {
            WsEntry::Indexed { entry, .. } => self.table.slab.get(*entry).nv == *nv,
            WsEntry::IndName { entry, value } => {
                self.table.slab.get(*entry).nv.name == nv.name && *value == nv.value
            }
            WsEntry::NewName { nv: cell_nv } => cell_nv == nv,
            WsEntry::None => false,
        })
    }

    /// Is some `Indexed` cell frozen at `index`?
    fn find_in_workingset_by_index(&self, index: usize) -> bool {
        self.ws.iter().any(
            |cell| matches!(cell, WsEntry::Indexed { index: frozen, .. } if *frozen == index),
        )
    }

    /// Tombstone every `Indexed` cell frozen at `index`; returns how many
    /// were removed.
    fn remove_from_workingset_by_index(&mut self, index: usize) -> usize {
        let mut removed = 0;
        for i in 0..self.ws.len() {
            let entry = match &self.ws[i] {
                WsEntry::Indexed { entry, index: frozen } if *frozen == index => *entry,
                _ => continue,
            };
            removed += 1;
            self.table.slab.decref(entry);
            self.ws[i] = WsEntry::None;
        }
        removed
    }

    /// Close the current header block: rebuild the reference set from the
    /// surviving working-set cells and release everything else.
    ///
    /// Only `Indexed` cells whose entry still holds a valid table index make
    /// it into the reference set, and each index at most once.
    pub fn end_headers(&mut self) {
        debug_assert!(self.refset.is_empty());
        let mut checks = [false; INITIAL_HD_TABLE_SIZE];
        for i in 0..self.ws.len() {
            let cell = core::mem::replace(&mut self.ws[i], WsEntry::None);
            match cell {
                WsEntry::Indexed { entry, .. } => {
                    let live = self.table.slab.get(entry).index;
                    if live != INVALID_INDEX && !checks[live] && self.refset.push(entry).is_ok() {
                        checks[live] = true;
                    } else {
                        self.table.slab.decref(entry);
                    }
                }
                WsEntry::IndName { entry, .. } => {
                    self.table.slab.decref(entry);
                }
                WsEntry::NewName { .. } | WsEntry::None => {}
            }
        }
        self.ws.clear();
    }

    // -----------------------------------------------------------------------
    // Deflate
    // -----------------------------------------------------------------------

    /// Compress `nva` into `buf` starting at `nv_offset`.
    ///
    /// Returns the number of block bytes written (not counting the offset).
    /// Any failure poisons the context; the buffer contents are then
    /// unspecified and must be discarded.
    pub fn deflate(&mut self, buf: &mut Vec<u8>, nv_offset: usize, nva: &[Nv]) -> Result<usize, Error> {
        if self.bad {
            return Err(Error::HeaderComp);
        }
        match self.deflate_run(buf, nv_offset, nva) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.bad = true;
                Err(e)
            }
        }
    }

    fn deflate_run(
        &mut self,
        buf: &mut Vec<u8>,
        nv_offset: usize,
        nva: &[Nv],
    ) -> Result<usize, Error> {
        self.create_workingset()?;
        let mut offset = nv_offset;
        // Toggle out stale references first: an index emitted later for a new
        // entry may collide with one vacated by eviction.
        for i in 0..self.ws.len() {
            let (entry, index) = match &self.ws[i] {
                WsEntry::Indexed { entry, index } => (*entry, *index),
                _ => continue,
            };
            let found = nva.iter().any(|nv| self.table.slab.get(entry).nv == *nv);
            if !found {
                emit_indexed_block(buf, &mut offset, index)?;
                self.table.slab.decref(entry);
                self.ws[i] = WsEntry::None;
            }
        }
        for nv in nva {
            if self.find_in_workingset(nv) {
                continue;
            }
            if let Some(entry) = self.table.find(nv) {
                let index = self.table.slab.get(entry).index;
                if !self.find_in_workingset_by_index(index) {
                    self.add_workingset(entry)?;
                    emit_indexed_block(buf, &mut offset, index)?;
                    continue;
                }
            }
            let room = entry_room(nv.name.len(), nv.value.len());
            if let Some(entry) = self.table.find_name(nv) {
                // The source index must be captured before insertion: the
                // insert may evict the source entry.
                let index = self.table.slab.get(entry).index;
                if room < HD_MAX_ENTRY_SIZE {
                    let new_entry = self.table.add_incremental(nv).ok_or(Error::HeaderComp)?;
                    self.add_workingset(new_entry)?;
                    emit_indname_block(buf, &mut offset, index, &nv.value, true)?;
                } else {
                    self.add_workingset_indname(entry, nv.value.clone())?;
                    emit_indname_block(buf, &mut offset, index, &nv.value, false)?;
                }
            } else if room < HD_MAX_ENTRY_SIZE {
                let new_entry = self.table.add_incremental(nv).ok_or(Error::HeaderComp)?;
                self.add_workingset(new_entry)?;
                emit_newname_block(buf, &mut offset, nv, true)?;
            } else {
                self.add_workingset_newname(nv.clone())?;
                emit_newname_block(buf, &mut offset, nv, false)?;
            }
        }
        Ok(offset - nv_offset)
    }

    // -----------------------------------------------------------------------
    // Inflate
    // -----------------------------------------------------------------------

    /// Decompress a header block.
    ///
    /// Returns the decoded fields sorted by name. Any decode error or
    /// capacity exhaustion poisons the context.
    pub fn inflate(&mut self, input: &[u8]) -> Result<Vec<Nv>, Error> {
        if self.bad {
            return Err(Error::HeaderComp);
        }
        match self.inflate_run(input) {
            Ok(nva) => Ok(nva),
            Err(e) => {
                self.bad = true;
                Err(e)
            }
        }
    }

    fn inflate_run(&mut self, input: &[u8]) -> Result<Vec<Nv>, Error> {
        self.create_workingset()?;
        let mut pos = 0;
        while pos < input.len() {
            let c = input[pos];
            if c & 0x80 != 0 {
                // Indexed: toggles the frozen index out of the working set,
                // or references the table entry if nothing was toggled.
                let (index, n) = decode_integer(&input[pos..], 7)?;
                pos += n;
                if self.remove_from_workingset_by_index(index) == 0 {
                    if index >= self.table.len() {
                        return Err(Error::HeaderComp);
                    }
                    let entry = self.table.entries[index];
                    self.add_workingset(entry)?;
                }
            } else if c == 0x60 || c == 0x40 {
                // Literal with a new name, without (0x60) or with (0x40)
                // incremental indexing.
                pos += 1;
                let (name, value, consumed) = decode_literal_nv(&input[pos..])?;
                pos += consumed;
                let nv = Nv { name, value };
                if c == 0x60 {
                    self.add_workingset_newname(nv)?;
                } else {
                    let entry = self.table.add_incremental(&nv).ok_or(Error::HeaderComp)?;
                    self.add_workingset(entry)?;
                }
            } else if c & 0xe0 == 0x60 || c & 0xe0 == 0x40 {
                // Literal with an indexed name (index is offset by one on the
                // wire so zero can mark the new-name forms).
                let (raw, n) = decode_integer(&input[pos..], 5)?;
                pos += n;
                if raw == 0 {
                    return Err(Error::HeaderComp);
                }
                let index = raw - 1;
                if index >= self.table.len() {
                    return Err(Error::HeaderComp);
                }
                let entry = self.table.entries[index];
                let (valuelen, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                if input.len() - pos < valuelen {
                    return Err(Error::HeaderComp);
                }
                let value = input[pos..pos + valuelen].to_vec();
                pos += valuelen;
                if c & 0xe0 == 0x60 {
                    self.add_workingset_indname(entry, value)?;
                } else {
                    // Clone the name out before inserting: the insert may
                    // evict the source entry and release its bytes.
                    let name = self.table.slab.get(entry).nv.name.clone();
                    let nv = Nv { name, value };
                    let new_entry = self.table.add_incremental(&nv).ok_or(Error::HeaderComp)?;
                    self.add_workingset(new_entry)?;
                }
            } else if c == 0x00 {
                // Substitution with a new name.
                pos += 1;
                let (namelen, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                if input.len() - pos < namelen {
                    return Err(Error::HeaderComp);
                }
                let mut name = input[pos..pos + namelen].to_vec();
                pos += namelen;
                let (subindex, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                let (valuelen, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                if input.len() - pos < valuelen {
                    return Err(Error::HeaderComp);
                }
                let value = input[pos..pos + valuelen].to_vec();
                pos += valuelen;
                downcase(&mut name);
                let nv = Nv { name, value };
                let new_entry = self
                    .table
                    .add_subst(&nv, subindex)
                    .ok_or(Error::HeaderComp)?;
                self.add_workingset(new_entry)?;
            } else {
                // Substitution with an indexed name (0x01..=0x3f).
                let (raw, n) = decode_integer(&input[pos..], 6)?;
                pos += n;
                if raw == 0 {
                    return Err(Error::HeaderComp);
                }
                let index = raw - 1;
                if index >= self.table.len() {
                    return Err(Error::HeaderComp);
                }
                let entry = self.table.entries[index];
                let (subindex, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                let (valuelen, n) = decode_integer(&input[pos..], 8)?;
                pos += n;
                if input.len() - pos < valuelen {
                    return Err(Error::HeaderComp);
                }
                let value = input[pos..pos + valuelen].to_vec();
                pos += valuelen;
                let name = self.table.slab.get(entry).nv.name.clone();
                let nv = Nv { name, value };
                let new_entry = self
                    .table
                    .add_subst(&nv, subindex)
                    .ok_or(Error::HeaderComp)?;
                self.add_workingset(new_entry)?;
            }
        }
        Ok(self.build_nv_array())
    }

    /// Materialize the working set into an owned, sorted header array.
    fn build_nv_array(&self) -> Vec<Nv> {
        let mut nva = Vec::new();
        for cell in self.ws.iter() {
            match cell {
                WsEntry::Indexed { entry, .. } => {
                    nva.push(self.table.slab.get(*entry).nv.clone());
                }
                WsEntry::IndName { entry, value } => {
                    nva.push(Nv {
                        name: self.table.slab.get(*entry).nv.name.clone(),
                        value: value.clone(),
                    });
                }
                WsEntry::NewName { nv } => nva.push(nv.clone()),
                WsEntry::None => {}
            }
        }
        nv_array_sort(&mut nva);
        nva
    }

    #[cfg(test)]
    fn assert_refcounts_consistent(&self) {
        use alloc::collections::BTreeMap;
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        let mut bump = |h: &Handle| {
            *counts.entry(table::handle_id(*h)).or_insert(0) += 1;
        };
        for h in self.table.entries.iter() {
            bump(h);
        }
        for h in self.refset.iter() {
            bump(h);
        }
        for cell in self.ws.iter() {
            match cell {
                WsEntry::Indexed { entry, .. } | WsEntry::IndName { entry, .. } => bump(entry),
                _ => {}
            }
        }
        for h in self
            .table
            .entries
            .iter()
            .chain(self.refset.iter())
            .copied()
        {
            assert_eq!(
                self.table.slab.refcnt(h),
                counts[&table::handle_id(h)],
                "refcount must equal the number of holding slots"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Block emitters
// ---------------------------------------------------------------------------

/// Grow `buf` for `need` more bytes at `offset`, refusing to exceed the
/// maximum frame length.
fn ensure_write_buffer(buf: &mut Vec<u8>, offset: usize, need: usize) -> Result<(), Error> {
    if offset + need > MAX_FRAME_LENGTH {
        return Err(Error::HeaderComp);
    }
    reserve_buffer(buf, offset + need);
    Ok(())
}

/// Emit an indexed representation for `index`.
pub fn emit_indexed_block(buf: &mut Vec<u8>, offset: &mut usize, index: usize) -> Result<(), Error> {
    let blocklen = count_encoded(index, 7);
    ensure_write_buffer(buf, *offset, blocklen)?;
    encode_integer(&mut buf[*offset..], index, 7, 0x80);
    *offset += blocklen;
    Ok(())
}

/// Emit a literal with an indexed name, with or without incremental indexing.
pub fn emit_indname_block(
    buf: &mut Vec<u8>,
    offset: &mut usize,
    index: usize,
    value: &[u8],
    inc_indexing: bool,
) -> Result<(), Error> {
    let blocklen =
        count_encoded(index + 1, 5) + count_encoded(value.len(), 8) + value.len();
    ensure_write_buffer(buf, *offset, blocklen)?;
    let tag = if inc_indexing { 0x40 } else { 0x60 };
    let mut p = *offset;
    p += encode_integer(&mut buf[p..], index + 1, 5, tag);
    p += encode_integer(&mut buf[p..], value.len(), 8, 0);
    buf[p..p + value.len()].copy_from_slice(value);
    *offset += blocklen;
    Ok(())
}

/// Emit a literal with a new name, with or without incremental indexing.
pub fn emit_newname_block(
    buf: &mut Vec<u8>,
    offset: &mut usize,
    nv: &Nv,
    inc_indexing: bool,
) -> Result<(), Error> {
    let blocklen = 1
        + count_encoded(nv.name.len(), 8)
        + nv.name.len()
        + count_encoded(nv.value.len(), 8)
        + nv.value.len();
    ensure_write_buffer(buf, *offset, blocklen)?;
    let mut p = *offset;
    buf[p] = if inc_indexing { 0x40 } else { 0x60 };
    p += 1;
    p += encode_integer(&mut buf[p..], nv.name.len(), 8, 0);
    buf[p..p + nv.name.len()].copy_from_slice(&nv.name);
    p += nv.name.len();
    p += encode_integer(&mut buf[p..], nv.value.len(), 8, 0);
    buf[p..p + nv.value.len()].copy_from_slice(&nv.value);
    *offset += blocklen;
    Ok(())
}

/// Emit a substitution with an indexed name.
pub fn emit_subst_indname_block(
    buf: &mut Vec<u8>,
    offset: &mut usize,
    index: usize,
    value: &[u8],
    subindex: usize,
) -> Result<(), Error> {
    let blocklen = count_encoded(index + 1, 6)
        + count_encoded(subindex, 8)
        + count_encoded(value.len(), 8)
        + value.len();
    ensure_write_buffer(buf, *offset, blocklen)?;
    let mut p = *offset;
    p += encode_integer(&mut buf[p..], index + 1, 6, 0);
    p += encode_integer(&mut buf[p..], subindex, 8, 0);
    p += encode_integer(&mut buf[p..], value.len(), 8, 0);
    buf[p..p + value.len()].copy_from_slice(value);
    *offset += blocklen;
    Ok(())
}

/// Emit a substitution with a new name.
pub fn emit_subst_newname_block(
    buf: &mut Vec<u8>,
    offset: &mut usize,
    nv: &Nv,
    subindex: usize,
) -> Result<(), Error> {
    let blocklen = 1
        + count_encoded(nv.name.len(), 8)
        + nv.name.len()
        + count_encoded(subindex, 8)
        + count_encoded(nv.value.len(), 8)
        + nv.value.len();
    ensure_write_buffer(buf, *offset, blocklen)?;
    let mut p = *offset;
    buf[p] = 0;
    p += 1;
    p += encode_integer(&mut buf[p..], nv.name.len(), 8, 0);
    buf[p..p + nv.name.len()].copy_from_slice(&nv.name);
    p += nv.name.len();
    p += encode_integer(&mut buf[p..], subindex, 8, 0);
    p += encode_integer(&mut buf[p..], nv.value.len(), 8, 0);
    buf[p..p + nv.value.len()].copy_from_slice(&nv.value);
    *offset += blocklen;
    Ok(())
}

/// Decode a name-length / name / value-length / value run (8-bit prefixes),
/// lower-casing the name. Returns `(name, value, bytes_consumed)`.
fn decode_literal_nv(input: &[u8]) -> Result<(Vec<u8>, Vec<u8>, usize), Error> {
    let mut pos = 0;
    let (namelen, n) = decode_integer(&input[pos..], 8)?;
    pos += n;
    if input.len() - pos < namelen {
        return Err(Error::HeaderComp);
    }
    let mut name = input[pos..pos + namelen].to_vec();
    pos += namelen;
    let (valuelen, n) = decode_integer(&input[pos..], 8)?;
    pos += n;
    if input.len() - pos < valuelen {
        return Err(Error::HeaderComp);
    }
    let value = input[pos..pos + valuelen].to_vec();
    pos += valuelen;
    downcase(&mut name);
    Ok((name, value, pos))
}
