//! Header name/value pairs.
//!
//! A header field is a pair of raw octet strings. Names are ASCII and
//! normalized to lower case on ingestion; zero-length names are illegal.
//! Arrays of pairs are kept sorted by name (lexicographic byte order, so a
//! name that is a prefix of another sorts first).

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::bytes::downcase;
use crate::error::Error;

/// Upper bound on the length of a single header name or value.
pub const MAX_HD_VALUE_LENGTH: usize = 8192;

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Nv {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl Nv {
    pub fn new(name: &[u8], value: &[u8]) -> Self {
        Nv {
            name: name.to_vec(),
            value: value.to_vec(),
        }
    }
}

/// Name ordering used for header arrays: compare the common prefix bytewise,
/// then put the shorter name first.
#[inline]
pub fn nv_compare_name(a: &Nv, b: &Nv) -> Ordering {
    a.name.as_slice().cmp(b.name.as_slice())
}

/// Sort a header array by name. Pairs with equal names keep their order.
pub fn nv_array_sort(nva: &mut [Nv]) {
    nva.sort_by(nv_compare_name);
}

/// Check that a pair list is well formed: every name is non-empty printable
/// ASCII (0x20..=0x7E).
pub fn nv_pairs_valid(pairs: &[(&[u8], &[u8])]) -> bool {
    for (name, _) in pairs {
        if name.is_empty() {
            return false;
        }
        if name.iter().any(|&c| !(0x20..=0x7e).contains(&c)) {
            return false;
        }
    }
    true
}

/// Build an owned, sorted header array from a flat pair list.
///
/// Names are lower-cased. Consecutive pairs with the same name are merged
/// into one field whose values are joined with a NUL separator; empty values
/// are dropped from the join, and an empty first value is simply replaced.
/// Returns `InvalidArgument` if any name or value exceeds
/// `MAX_HD_VALUE_LENGTH`, and an empty array if every string is empty.
pub fn nv_array_from_pairs(pairs: &[(&[u8], &[u8])]) -> Result<Vec<Nv>, Error> {
    let mut buflen = 0;
    for &(name, value) in pairs {
        if name.len() > MAX_HD_VALUE_LENGTH || value.len() > MAX_HD_VALUE_LENGTH {
            return Err(Error::InvalidArgument);
        }
        buflen += name.len() + value.len();
    }
    if pairs.is_empty() || buflen == 0 {
        return Ok(Vec::new());
    }
    let mut nva: Vec<Nv> = Vec::with_capacity(pairs.len());
    for &(name, value) in pairs {
        let mut name = name.to_vec();
        downcase(&mut name);
        if let Some(prev) = nva.last_mut() {
            if prev.name == name {
                if value.is_empty() {
                    continue;
                }
                if prev.value.is_empty() {
                    prev.value = value.to_vec();
                } else {
                    prev.value.push(0);
                    prev.value.extend_from_slice(value);
                }
                continue;
            }
        }
        nva.push(Nv {
            name,
            value: value.to_vec(),
        });
    }
    nv_array_sort(&mut nva);
    Ok(nva)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        assert_eq!(Nv::new(b"host", b"a"), Nv::new(b"host", b"a"));
        assert_ne!(Nv::new(b"host", b"a"), Nv::new(b"host", b"b"));
        assert_ne!(Nv::new(b"host", b"a"), Nv::new(b"hosts", b"a"));
    }

    #[test]
    fn shorter_name_sorts_first() {
        let mut nva = alloc::vec![
            Nv::new(b"accept-charset", b""),
            Nv::new(b"accept", b""),
            Nv::new(b"via", b""),
            Nv::new(b"age", b""),
        ];
        nv_array_sort(&mut nva);
        assert_eq!(nva[0].name, b"accept");
        assert_eq!(nva[1].name, b"accept-charset");
        assert_eq!(nva[2].name, b"age");
        assert_eq!(nva[3].name, b"via");
    }

    #[test]
    fn from_pairs_downcases_and_sorts() {
        let nva = nv_array_from_pairs(&[
            (b"User-Agent".as_slice(), b"moz".as_slice()),
            (b"Accept", b"*/*"),
        ])
        .unwrap();
        assert_eq!(nva.len(), 2);
        assert_eq!(nva[0].name, b"accept");
        assert_eq!(nva[1].name, b"user-agent");
        assert_eq!(nva[1].value, b"moz");
    }

    #[test]
    fn from_pairs_joins_consecutive_duplicates() {
        let nva = nv_array_from_pairs(&[
            (b"cookie".as_slice(), b"a=1".as_slice()),
            (b"cookie", b"b=2"),
            (b"cookie", b""),
        ])
        .unwrap();
        assert_eq!(nva.len(), 1);
        assert_eq!(nva[0].value, b"a=1\0b=2");
    }

    #[test]
    fn from_pairs_replaces_empty_first_value() {
        let nva = nv_array_from_pairs(&[
            (b"warning".as_slice(), b"".as_slice()),
            (b"warning", b"199"),
        ])
        .unwrap();
        assert_eq!(nva.len(), 1);
        assert_eq!(nva[0].value, b"199");
    }

    #[test]
    fn from_pairs_all_empty_is_empty_array() {
        let nva = nv_array_from_pairs(&[(b"".as_slice(), b"".as_slice())]).unwrap();
        assert!(nva.is_empty());
    }

    #[test]
    fn from_pairs_rejects_overlong() {
        let big = alloc::vec![b'v'; MAX_HD_VALUE_LENGTH + 1];
        let r = nv_array_from_pairs(&[(b"x".as_slice(), big.as_slice())]);
        assert_eq!(r, Err(Error::InvalidArgument));
    }

    #[test]
    fn pair_validation() {
        assert!(nv_pairs_valid(&[(b"content-type".as_slice(), b"text/html".as_slice())]));
        assert!(!nv_pairs_valid(&[(b"".as_slice(), b"v".as_slice())]));
        assert!(!nv_pairs_valid(&[(b"bad\x01name".as_slice(), b"v".as_slice())]));
    }
}
