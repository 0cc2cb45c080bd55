//! Initial header-table contents.
//!
//! Each side of a connection seeds its table with a fixed set of common
//! header fields before any block is processed: request headers for blocks
//! flowing toward the server, response headers for blocks flowing back.
//! Entry order is part of the wire contract — indices are assigned by
//! position.

/// Seed entries for request header blocks.
pub(crate) static REQ_SEED: &[(&[u8], &[u8])] = &[
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":host", b""),
    (b":path", b"/"),
    (b":method", b"GET"),
    (b"accept", b""),
    (b"accept-charset", b""),
    (b"accept-encoding", b""),
    (b"accept-language", b""),
    (b"cookie", b""),
    (b"if-modified-since", b""),
    (b"keep-alive", b""),
    (b"user-agent", b""),
    (b"proxy-connection", b""),
    (b"referer", b""),
    (b"accept-datetime", b""),
    (b"authorization", b""),
    (b"allow", b""),
    (b"cache-control", b""),
    (b"connection", b""),
    (b"content-length", b""),
    (b"content-md5", b""),
    (b"content-type", b""),
    (b"date", b""),
    (b"expect", b""),
    (b"from", b""),
    (b"if-match", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"max-forwards", b""),
    (b"pragma", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"te", b""),
    (b"upgrade", b""),
    (b"via", b""),
    (b"warning", b""),
];

/// Seed entries for response header blocks.
pub(crate) static RES_SEED: &[(&[u8], &[u8])] = &[
    (b":status", b"200"),
    (b"age", b""),
    (b"cache-control", b""),
    (b"content-length", b""),
    (b"content-type", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expires", b""),
    (b"last-modified", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"access-control-allow-origin", b""),
    (b"accept-ranges", b""),
    (b"allow", b""),
    (b"connection", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-location", b""),
    (b"content-md5", b""),
    (b"content-range", b""),
    (b"link", b""),
    (b"location", b""),
    (b"p3p", b""),
    (b"pragma", b""),
    (b"proxy-authenticate", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"strict-transport-security", b""),
    (b"trailer", b""),
    (b"transfer-encoding", b""),
    (b"warning", b""),
    (b"www-authenticate", b""),
];
