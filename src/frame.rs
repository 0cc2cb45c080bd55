//! Frame codec.
//!
//! Control and data frames share an 8-byte header:
//!
//! ```text
//!  +----------------+--------+--------+
//!  |  Length (16)   | Type(8)|Flags(8)|
//!  +-+--------------+--------+--------+
//!  |R|        Stream Identifier (31)  |
//!  +-+--------------------------------+
//!  |          Frame Payload          ...
//!  +---------------------------------+
//! ```
//!
//! All multi-byte integers are big-endian; reserved high bits in stream
//! identifiers and priorities are zero on emit and masked off on parse.
//! Packers write `header || payload` into a caller-owned growable buffer and
//! return the total length; unpackers take the already-read 8-byte head and
//! the payload and reject payload lengths that are wrong for the type.
//!
//! HEADERS and PUSH_PROMISE carry a compressed header block produced and
//! consumed by [`crate::hd::Context`]; packing those is not atomic — if the
//! deflater fails, the buffer contents are unspecified and the context is
//! poisoned.

use alloc::vec::Vec;

use crate::buf::reserve_buffer;
use crate::bytes::{get_u16, get_u32, put_u16, put_u32};
use crate::error::Error;
use crate::hd;
use crate::nv::Nv;

// Frame type constants.
pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_PRIORITY: u8 = 0x2;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PUSH_PROMISE: u8 = 0x5;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;

// Flag bits.
pub const FLAG_NONE: u8 = 0x0;
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PRIORITY: u8 = 0x8;
pub const FLAG_PONG: u8 = 0x1;

/// Error codes carried by RST_STREAM and GOAWAY.
pub mod error_code {
    pub const NO_ERROR: u32 = 0;
    pub const PROTOCOL_ERROR: u32 = 1;
    pub const INTERNAL_ERROR: u32 = 2;
    pub const FLOW_CONTROL_ERROR: u32 = 3;
    pub const STREAM_CLOSED: u32 = 5;
    pub const FRAME_TOO_LARGE: u32 = 6;
    pub const REFUSED_STREAM: u32 = 7;
    pub const CANCEL: u32 = 8;
    pub const COMPRESSION_ERROR: u32 = 9;
}

// Settings identifiers.
pub const SETTINGS_UPLOAD_BANDWIDTH: u32 = 1;
pub const SETTINGS_DOWNLOAD_BANDWIDTH: u32 = 2;
pub const SETTINGS_ROUND_TRIP_TIME: u32 = 3;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u32 = 4;
pub const SETTINGS_CURRENT_CWND: u32 = 5;
pub const SETTINGS_DOWNLOAD_RETRANS_RATE: u32 = 6;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u32 = 7;
pub const SETTINGS_MAX: u32 = 7;

pub const FRAME_HEAD_LENGTH: usize = 8;
/// Hard ceiling on a packed frame, header included.
pub const MAX_FRAME_LENGTH: usize = 16384;

pub const STREAM_ID_MASK: u32 = (1 << 31) - 1;
pub const PRIORITY_MASK: u32 = (1 << 31) - 1;
pub const WINDOW_SIZE_INCREMENT_MASK: u32 = (1 << 31) - 1;
pub const SETTINGS_ID_MASK: u32 = (1 << 24) - 1;

/// Lowest priority; assigned when a HEADERS frame carries none.
pub const PRI_DEFAULT: i32 = 1 << 30;

/// The shared 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub length: u16,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    fn new(length: u16, frame_type: u8, flags: u8, stream_id: u32) -> Self {
        FrameHeader {
            length,
            frame_type,
            flags,
            stream_id,
        }
    }
}

/// Write the 8-byte frame header into the front of `buf`.
///
/// `buf` must hold at least `FRAME_HEAD_LENGTH` bytes.
pub fn pack_frame_hd(buf: &mut [u8], hd: &FrameHeader) {
    put_u16(&mut buf[0..], hd.length);
    buf[2] = hd.frame_type;
    buf[3] = hd.flags;
    put_u32(&mut buf[4..], hd.stream_id & STREAM_ID_MASK);
}

/// Parse the 8-byte frame header from the front of `buf`.
pub fn unpack_frame_hd(buf: &[u8]) -> Result<FrameHeader, Error> {
    if buf.len() < FRAME_HEAD_LENGTH {
        return Err(Error::InvalidFrame);
    }
    Ok(FrameHeader {
        length: get_u16(buf),
        frame_type: buf[2],
        flags: buf[3],
        stream_id: get_u32(&buf[4..]) & STREAM_ID_MASK,
    })
}

/// Fast-path predicate: DATA frames are type zero.
#[inline]
pub fn is_data_frame(head: &[u8]) -> bool {
    head.get(2) == Some(&FRAME_DATA)
}

/// Offset of the compressed header block inside the payload, for the frame
/// types that carry one.
pub fn nv_offset(head: &[u8]) -> Option<usize> {
    match head.get(2)? {
        &FRAME_HEADERS => {
            if head.get(3)? & FLAG_PRIORITY != 0 {
                Some(4)
            } else {
                Some(0)
            }
        }
        &FRAME_PUSH_PROMISE => Some(4),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// HEADERS
// ---------------------------------------------------------------------------

/// What a HEADERS frame opens or continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadersCategory {
    #[default]
    Request,
    Response,
    Headers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    pub hd: FrameHeader,
    pub pri: i32,
    pub nva: Vec<Nv>,
    pub cat: HeadersCategory,
}

impl Headers {
    pub fn new(flags: u8, stream_id: u32, pri: i32, nva: Vec<Nv>) -> Self {
        Headers {
            hd: FrameHeader::new(0, FRAME_HEADERS, flags, stream_id),
            pri,
            nva,
            cat: HeadersCategory::Request,
        }
    }

    fn nv_offset_from_head(&self) -> usize {
        if self.hd.flags & FLAG_PRIORITY != 0 {
            FRAME_HEAD_LENGTH + 4
        } else {
            FRAME_HEAD_LENGTH
        }
    }
}

/// Pack a HEADERS frame: the compressed block is written first at its final
/// offset, then the header is back-patched with the resulting length.
pub fn pack_headers(
    buf: &mut Vec<u8>,
    frame: &mut Headers,
    deflater: &mut hd::Context,
) -> Result<usize, Error> {
    let nv_offset = frame.nv_offset_from_head();
    let n = deflater.deflate(buf, nv_offset, &frame.nva)?;
    let framelen = n + nv_offset;
    frame.hd.length = (framelen - FRAME_HEAD_LENGTH) as u16;
    // With no block bytes the buffer may still be shorter than the offset.
    reserve_buffer(buf, nv_offset);
    buf[..nv_offset].fill(0);
    pack_frame_hd(buf, &frame.hd);
    if frame.hd.flags & FLAG_PRIORITY != 0 {
        put_u32(&mut buf[8..], (frame.pri as u32) & PRIORITY_MASK);
    }
    Ok(framelen)
}

/// Unpack the fixed fields of a HEADERS frame, leaving the header block
/// untouched.
pub fn unpack_headers_without_nv(head: &[u8], payload: &[u8]) -> Result<Headers, Error> {
    let hd = unpack_frame_hd(head)?;
    let pri = if hd.flags & FLAG_PRIORITY != 0 {
        if payload.len() < 4 {
            return Err(Error::InvalidFrame);
        }
        (get_u32(payload) & PRIORITY_MASK) as i32
    } else {
        PRI_DEFAULT
    };
    Ok(Headers {
        hd,
        pri,
        nva: Vec::new(),
        cat: HeadersCategory::Request,
    })
}

/// Unpack a HEADERS frame, inflating the compressed block.
pub fn unpack_headers(
    head: &[u8],
    payload: &[u8],
    inflater: &mut hd::Context,
) -> Result<Headers, Error> {
    let mut frame = unpack_headers_without_nv(head, payload)?;
    let pnv_offset = frame.nv_offset_from_head() - FRAME_HEAD_LENGTH;
    frame.nva = inflater.inflate(&payload[pnv_offset..])?;
    Ok(frame)
}

// ---------------------------------------------------------------------------
// PRIORITY
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub hd: FrameHeader,
    pub pri: i32,
}

impl Priority {
    pub fn new(stream_id: u32, pri: i32) -> Self {
        Priority {
            hd: FrameHeader::new(4, FRAME_PRIORITY, FLAG_NONE, stream_id),
            pri,
        }
    }
}

pub fn pack_priority(buf: &mut Vec<u8>, frame: &Priority) -> usize {
    let framelen = FRAME_HEAD_LENGTH + 4;
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    put_u32(&mut buf[8..], (frame.pri as u32) & PRIORITY_MASK);
    framelen
}

pub fn unpack_priority(head: &[u8], payload: &[u8]) -> Result<Priority, Error> {
    if payload.len() != 4 {
        return Err(Error::InvalidFrame);
    }
    Ok(Priority {
        hd: unpack_frame_hd(head)?,
        pri: (get_u32(payload) & PRIORITY_MASK) as i32,
    })
}

// ---------------------------------------------------------------------------
// RST_STREAM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStream {
    pub hd: FrameHeader,
    pub error_code: u32,
}

impl RstStream {
    pub fn new(stream_id: u32, error_code: u32) -> Self {
        RstStream {
            hd: FrameHeader::new(4, FRAME_RST_STREAM, FLAG_NONE, stream_id),
            error_code,
        }
    }
}

pub fn pack_rst_stream(buf: &mut Vec<u8>, frame: &RstStream) -> usize {
    let framelen = FRAME_HEAD_LENGTH + 4;
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    put_u32(&mut buf[8..], frame.error_code);
    framelen
}

pub fn unpack_rst_stream(head: &[u8], payload: &[u8]) -> Result<RstStream, Error> {
    if payload.len() != 4 {
        return Err(Error::InvalidFrame);
    }
    Ok(RstStream {
        hd: unpack_frame_hd(head)?,
        error_code: get_u32(payload),
    })
}

// ---------------------------------------------------------------------------
// SETTINGS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsEntry {
    pub settings_id: u32,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub hd: FrameHeader,
    pub iv: Vec<SettingsEntry>,
}

impl Settings {
    pub fn new(iv: Vec<SettingsEntry>) -> Self {
        Settings {
            hd: FrameHeader::new((iv.len() * 8) as u16, FRAME_SETTINGS, FLAG_NONE, 0),
            iv,
        }
    }
}

pub fn pack_settings(buf: &mut Vec<u8>, frame: &Settings) -> usize {
    let framelen = FRAME_HEAD_LENGTH + frame.iv.len() * 8;
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    pack_settings_payload(&mut buf[8..], &frame.iv);
    framelen
}

/// Write settings entries; `buf` must hold `8 * iv.len()` bytes.
pub fn pack_settings_payload(buf: &mut [u8], iv: &[SettingsEntry]) -> usize {
    for (i, entry) in iv.iter().enumerate() {
        put_u32(&mut buf[i * 8..], entry.settings_id);
        put_u32(&mut buf[i * 8 + 4..], entry.value);
    }
    iv.len() * 8
}

pub fn unpack_settings(head: &[u8], payload: &[u8]) -> Result<Settings, Error> {
    if payload.len() % 8 != 0 {
        return Err(Error::InvalidFrame);
    }
    Ok(Settings {
        hd: unpack_frame_hd(head)?,
        iv: unpack_settings_payload(payload),
    })
}

/// Parse settings entries; identifiers are masked to 24 bits.
pub fn unpack_settings_payload(payload: &[u8]) -> Vec<SettingsEntry> {
    let niv = payload.len() / 8;
    let mut iv = Vec::with_capacity(niv);
    for i in 0..niv {
        iv.push(SettingsEntry {
            settings_id: get_u32(&payload[i * 8..]) & SETTINGS_ID_MASK,
            value: get_u32(&payload[i * 8 + 4..]),
        });
    }
    iv
}

/// Sort settings entries ascending by identifier.
pub fn settings_sort(iv: &mut [SettingsEntry]) {
    iv.sort_by_key(|entry| entry.settings_id);
}

/// Check a settings array for validity: no identifier may be zero, above the
/// registry maximum, or repeated.
pub fn settings_check_duplicate(iv: &[SettingsEntry]) -> bool {
    let mut check = [false; SETTINGS_MAX as usize + 1];
    for entry in iv {
        let id = entry.settings_id;
        if id == 0 || id > SETTINGS_MAX || check[id as usize] {
            return false;
        }
        check[id as usize] = true;
    }
    true
}

// ---------------------------------------------------------------------------
// PUSH_PROMISE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromise {
    pub hd: FrameHeader,
    pub promised_stream_id: u32,
    pub nva: Vec<Nv>,
}

impl PushPromise {
    pub fn new(flags: u8, stream_id: u32, promised_stream_id: u32, nva: Vec<Nv>) -> Self {
        PushPromise {
            hd: FrameHeader::new(0, FRAME_PUSH_PROMISE, flags, stream_id),
            promised_stream_id,
            nva,
        }
    }
}

pub fn pack_push_promise(
    buf: &mut Vec<u8>,
    frame: &mut PushPromise,
    deflater: &mut hd::Context,
) -> Result<usize, Error> {
    let nv_offset = FRAME_HEAD_LENGTH + 4;
    let n = deflater.deflate(buf, nv_offset, &frame.nva)?;
    let framelen = n + nv_offset;
    frame.hd.length = (framelen - FRAME_HEAD_LENGTH) as u16;
    reserve_buffer(buf, nv_offset);
    buf[..nv_offset].fill(0);
    pack_frame_hd(buf, &frame.hd);
    put_u32(&mut buf[8..], frame.promised_stream_id & STREAM_ID_MASK);
    Ok(framelen)
}

pub fn unpack_push_promise_without_nv(head: &[u8], payload: &[u8]) -> Result<PushPromise, Error> {
    let hd = unpack_frame_hd(head)?;
    if payload.len() < 4 {
        return Err(Error::InvalidFrame);
    }
    Ok(PushPromise {
        hd,
        promised_stream_id: get_u32(payload) & STREAM_ID_MASK,
        nva: Vec::new(),
    })
}

pub fn unpack_push_promise(
    head: &[u8],
    payload: &[u8],
    inflater: &mut hd::Context,
) -> Result<PushPromise, Error> {
    let mut frame = unpack_push_promise_without_nv(head, payload)?;
    frame.nva = inflater.inflate(&payload[4..])?;
    Ok(frame)
}

// ---------------------------------------------------------------------------
// PING
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub hd: FrameHeader,
    pub opaque_data: [u8; 8],
}

impl Ping {
    pub fn new(flags: u8, opaque_data: Option<[u8; 8]>) -> Self {
        Ping {
            hd: FrameHeader::new(8, FRAME_PING, flags, 0),
            opaque_data: opaque_data.unwrap_or([0; 8]),
        }
    }
}

pub fn pack_ping(buf: &mut Vec<u8>, frame: &Ping) -> usize {
    let framelen = FRAME_HEAD_LENGTH + 8;
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    buf[8..16].copy_from_slice(&frame.opaque_data);
    framelen
}

pub fn unpack_ping(head: &[u8], payload: &[u8]) -> Result<Ping, Error> {
    if payload.len() != 8 {
        return Err(Error::InvalidFrame);
    }
    let mut opaque_data = [0u8; 8];
    opaque_data.copy_from_slice(payload);
    Ok(Ping {
        hd: unpack_frame_hd(head)?,
        opaque_data,
    })
}

// ---------------------------------------------------------------------------
// GOAWAY
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goaway {
    pub hd: FrameHeader,
    pub last_stream_id: u32,
    pub error_code: u32,
    pub opaque_data: Vec<u8>,
}

impl Goaway {
    pub fn new(last_stream_id: u32, error_code: u32, opaque_data: Vec<u8>) -> Self {
        Goaway {
            hd: FrameHeader::new((8 + opaque_data.len()) as u16, FRAME_GOAWAY, FLAG_NONE, 0),
            last_stream_id,
            error_code,
            opaque_data,
        }
    }
}

pub fn pack_goaway(buf: &mut Vec<u8>, frame: &Goaway) -> usize {
    let framelen = FRAME_HEAD_LENGTH + 8 + frame.opaque_data.len();
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    put_u32(&mut buf[8..], frame.last_stream_id & STREAM_ID_MASK);
    put_u32(&mut buf[12..], frame.error_code);
    buf[16..framelen].copy_from_slice(&frame.opaque_data);
    framelen
}

pub fn unpack_goaway(head: &[u8], payload: &[u8]) -> Result<Goaway, Error> {
    if payload.len() < 8 {
        return Err(Error::InvalidFrame);
    }
    Ok(Goaway {
        hd: unpack_frame_hd(head)?,
        last_stream_id: get_u32(payload) & STREAM_ID_MASK,
        error_code: get_u32(&payload[4..]),
        opaque_data: payload[8..].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// WINDOW_UPDATE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    pub hd: FrameHeader,
    pub window_size_increment: u32,
}

impl WindowUpdate {
    pub fn new(flags: u8, stream_id: u32, window_size_increment: u32) -> Self {
        WindowUpdate {
            hd: FrameHeader::new(4, FRAME_WINDOW_UPDATE, flags, stream_id),
            window_size_increment,
        }
    }
}

pub fn pack_window_update(buf: &mut Vec<u8>, frame: &WindowUpdate) -> usize {
    let framelen = FRAME_HEAD_LENGTH + 4;
    reserve_buffer(buf, framelen);
    buf[..framelen].fill(0);
    pack_frame_hd(buf, &frame.hd);
    put_u32(
        &mut buf[8..],
        frame.window_size_increment & WINDOW_SIZE_INCREMENT_MASK,
    );
    framelen
}

pub fn unpack_window_update(head: &[u8], payload: &[u8]) -> Result<WindowUpdate, Error> {
    if payload.len() != 4 {
        return Err(Error::InvalidFrame);
    }
    Ok(WindowUpdate {
        hd: unpack_frame_hd(head)?,
        window_size_increment: get_u32(payload) & WINDOW_SIZE_INCREMENT_MASK,
    })
}

// ---------------------------------------------------------------------------
// DATA
// ---------------------------------------------------------------------------

/// Pull-model payload source for DATA frames.
pub trait ReadSource {
    /// Fill `buf` with the next chunk. Returns the number of bytes written
    /// and whether the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> (usize, bool);
}

/// A DATA frame is a pass-through: it records the payload source; byte
/// emission is driven by a higher layer, so there is no pack function and
/// the length stays zero until then.
#[derive(Debug)]
pub struct Data<S> {
    pub hd: FrameHeader,
    pub source: S,
}

impl<S: ReadSource> Data<S> {
    pub fn new(flags: u8, stream_id: u32, source: S) -> Self {
        Data {
            hd: FrameHeader::new(0, FRAME_DATA, flags, stream_id),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn split(buf: &[u8]) -> (&[u8], &[u8]) {
        buf.split_at(FRAME_HEAD_LENGTH)
    }

    #[test]
    fn frame_hd_roundtrip_masks_reserved_bit() {
        let hd = FrameHeader::new(0x1234, FRAME_HEADERS, 0x05, 42);
        let mut buf = [0u8; 8];
        pack_frame_hd(&mut buf, &hd);
        assert_eq!(unpack_frame_hd(&buf).unwrap(), hd);

        // Reserved bit set on the wire is ignored.
        buf[4] |= 0x80;
        assert_eq!(unpack_frame_hd(&buf).unwrap().stream_id, 42);
    }

    #[test]
    fn frame_hd_short_input() {
        assert_eq!(unpack_frame_hd(&[0; 7]), Err(Error::InvalidFrame));
    }

    #[test]
    fn data_frame_predicate() {
        let mut buf = [0u8; 8];
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_DATA, 0, 1));
        assert!(is_data_frame(&buf));
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_PING, 0, 0));
        assert!(!is_data_frame(&buf));
    }

    #[test]
    fn nv_offset_per_type() {
        let mut buf = [0u8; 8];
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_HEADERS, FLAG_NONE, 1));
        assert_eq!(nv_offset(&buf), Some(0));
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_HEADERS, FLAG_PRIORITY, 1));
        assert_eq!(nv_offset(&buf), Some(4));
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_PUSH_PROMISE, 0, 1));
        assert_eq!(nv_offset(&buf), Some(4));
        pack_frame_hd(&mut buf, &FrameHeader::new(0, FRAME_PING, 0, 0));
        assert_eq!(nv_offset(&buf), None);
    }

    #[test]
    fn wire_ping() {
        let frame = Ping::new(FLAG_NONE, Some([1, 2, 3, 4, 5, 6, 7, 8]));
        let mut buf = Vec::new();
        let n = pack_ping(&mut buf, &frame);
        assert_eq!(
            &buf[..n],
            &[0x00, 0x08, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5, 6, 7, 8]
        );
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_ping(head, payload).unwrap(), frame);
    }

    #[test]
    fn ping_wrong_length() {
        let head = [0x00, 0x07, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(unpack_ping(&head, &[0; 7]), Err(Error::InvalidFrame));
    }

    #[test]
    fn wire_settings() {
        let frame = Settings::new(vec![
            SettingsEntry {
                settings_id: SETTINGS_MAX_CONCURRENT_STREAMS,
                value: 100,
            },
            SettingsEntry {
                settings_id: SETTINGS_INITIAL_WINDOW_SIZE,
                value: 65535,
            },
        ]);
        let mut buf = Vec::new();
        let n = pack_settings(&mut buf, &frame);
        assert_eq!(
            &buf[..8],
            &[0x00, 0x10, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            &buf[8..n],
            &[
                0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x64, // id 4 = 100
                0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0xff, 0xff, // id 7 = 65535
            ]
        );
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_settings(head, payload).unwrap(), frame);
    }

    #[test]
    fn settings_odd_payload_rejected() {
        let head = [0x00, 0x07, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(unpack_settings(&head, &[0; 7]), Err(Error::InvalidFrame));
    }

    #[test]
    fn settings_id_is_masked_to_24_bits() {
        let payload = [0xff, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01];
        let iv = unpack_settings_payload(&payload);
        assert_eq!(iv[0].settings_id, 4);
    }

    #[test]
    fn settings_duplicate_check() {
        let ok = [
            SettingsEntry { settings_id: 4, value: 1 },
            SettingsEntry { settings_id: 7, value: 2 },
        ];
        assert!(settings_check_duplicate(&ok));
        let dup = [
            SettingsEntry { settings_id: 4, value: 1 },
            SettingsEntry { settings_id: 4, value: 2 },
        ];
        assert!(!settings_check_duplicate(&dup));
        let zero = [SettingsEntry { settings_id: 0, value: 1 }];
        assert!(!settings_check_duplicate(&zero));
        let out_of_registry = [SettingsEntry { settings_id: SETTINGS_MAX + 1, value: 1 }];
        assert!(!settings_check_duplicate(&out_of_registry));
    }

    #[test]
    fn settings_sort_ascending() {
        let mut iv = [
            SettingsEntry { settings_id: 7, value: 1 },
            SettingsEntry { settings_id: 1, value: 2 },
            SettingsEntry { settings_id: 4, value: 3 },
        ];
        settings_sort(&mut iv);
        assert_eq!(iv[0].settings_id, 1);
        assert_eq!(iv[1].settings_id, 4);
        assert_eq!(iv[2].settings_id, 7);
    }

    #[test]
    fn wire_window_update() {
        let frame = WindowUpdate::new(FLAG_NONE, 1, 32768);
        let mut buf = Vec::new();
        let n = pack_window_update(&mut buf, &frame);
        assert_eq!(
            &buf[..n],
            &[0x00, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00]
        );
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_window_update(head, payload).unwrap(), frame);
    }

    #[test]
    fn window_update_wrong_length() {
        let head = [0x00, 0x05, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            unpack_window_update(&head, &[0; 5]),
            Err(Error::InvalidFrame)
        );
    }

    #[test]
    fn wire_goaway() {
        let frame = Goaway::new(3, error_code::INTERNAL_ERROR, b"END".to_vec());
        let mut buf = Vec::new();
        let n = pack_goaway(&mut buf, &frame);
        assert_eq!(
            &buf[..8],
            &[0x00, 0x0b, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            &buf[8..n],
            &[0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02, 0x45, 0x4e, 0x44]
        );
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_goaway(head, payload).unwrap(), frame);
    }

    #[test]
    fn goaway_payload_too_short() {
        let head = [0x00, 0x07, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(unpack_goaway(&head, &[0; 7]), Err(Error::InvalidFrame));
    }

    #[test]
    fn rst_stream_roundtrip() {
        let frame = RstStream::new(1, error_code::CANCEL);
        let mut buf = Vec::new();
        let n = pack_rst_stream(&mut buf, &frame);
        assert_eq!(n, 12);
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_rst_stream(head, payload).unwrap(), frame);
    }

    #[test]
    fn rst_stream_wrong_length() {
        let head = [0x00, 0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(unpack_rst_stream(&head, &[0; 3]), Err(Error::InvalidFrame));
    }

    #[test]
    fn priority_roundtrip_masks_reserved_bit() {
        let frame = Priority::new(3, 1000);
        let mut buf = Vec::new();
        let n = pack_priority(&mut buf, &frame);
        let (head, payload) = split(&buf[..n]);
        assert_eq!(unpack_priority(head, payload).unwrap(), frame);

        // Reserved high bit in the priority word is masked on parse.
        let payload = [0xc0, 0x00, 0x00, 0x01];
        let parsed = unpack_priority(head, &payload).unwrap();
        assert_eq!(parsed.pri, 0x4000_0001);
    }

    #[test]
    fn data_records_source() {
        struct Body(&'static [u8]);
        impl ReadSource for Body {
            fn read(&mut self, buf: &mut [u8]) -> (usize, bool) {
                let n = self.0.len().min(buf.len());
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                (n, self.0.is_empty())
            }
        }
        let mut frame = Data::new(FLAG_END_STREAM, 1, Body(b"hello"));
        assert_eq!(frame.hd.length, 0, "length is unknown until emission");
        let mut out = [0u8; 16];
        let (n, eof) = frame.source.read(&mut out);
        assert_eq!(&out[..n], b"hello");
        assert!(eof);
    }
}
