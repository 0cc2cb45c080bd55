//! Caller-owned growable write buffers.
//!
//! Frame packing and header deflation write into a `Vec<u8>` supplied by the
//! caller, growing it in place as needed. The buffer is treated as raw
//! scratch: its length is the usable size, and packers index into it at
//! explicit offsets rather than appending.

use alloc::vec::Vec;

/// Grow `buf` so that at least `new_len` bytes are addressable.
///
/// New bytes are zero-filled. Existing contents below `new_len` are kept.
#[inline]
pub fn reserve_buffer(buf: &mut Vec<u8>, new_len: usize) {
    if buf.len() < new_len {
        buf.resize(new_len, 0);
    }
}
