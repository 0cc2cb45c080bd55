//! milli-h2: sans-I/O HTTP/2 draft frame codec and header compression.
//!
//! This crate is the wire core of an HTTP/2 endpoint: a bit-exact codec for
//! the eight control/data frame types, and the stateful header compression
//! engine whose output travels inside HEADERS and PUSH_PROMISE frames. It
//! performs no I/O and owns no sockets — the embedding layer supplies
//! buffers, schedules frames, and moves bytes.
//!
//! The compression engine is a protocol of its own: both peers keep a
//! header table that mutates with every block, and the two tables must stay
//! in lockstep. One [`hd::Context`] per connection per direction:
//!
//! ```
//! use milli_h2::{frame, hd, nv::Nv};
//!
//! let mut deflater = hd::Context::deflater(hd::Side::Client);
//! let mut inflater = hd::Context::inflater(hd::Side::Server);
//!
//! let nva = vec![Nv::new(b":path", b"/"), Nv::new(b"user-agent", b"mh2")];
//! let mut frame = frame::Headers::new(frame::FLAG_END_HEADERS, 1, 0, nva);
//! let mut buf = Vec::new();
//! let n = frame::pack_headers(&mut buf, &mut frame, &mut deflater).unwrap();
//! deflater.end_headers();
//!
//! let (head, payload) = buf[..n].split_at(frame::FRAME_HEAD_LENGTH);
//! let parsed = frame::unpack_headers(head, payload, &mut inflater).unwrap();
//! inflater.end_headers();
//! assert_eq!(parsed.nva.len(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod buf;
pub mod bytes;
pub mod error;
pub mod frame;
pub mod hd;
pub mod nv;

pub use error::Error;
pub use hd::{Context, Side};
pub use nv::Nv;
