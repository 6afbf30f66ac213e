//! Format constants (§6 EXTERNAL INTERFACES).
//!
//! Both constants are part of the on-disk format contract and are
//! versioned with the overall storage format; changing either value
//! changes the byte layout a page round-trips through.

/// Per-page slot count `N`. A record's node-key decomposes as
/// `page_key * N + offset` with `offset in [0, N)`.
pub const NODE_PAGE_NODE_COUNT: usize = 512;

/// Maximum inline record size in bytes. A serialized record body
/// larger than this is moved to an overflow page.
pub const MAX_RECORD_SIZE: usize = 1_000;

/// Sentinel denoting the absence of a persistent key (GLOSSARY:
/// `NULL_ID_LONG`).
pub const NULL_ID_LONG: i64 = -1;
