//! Error taxonomy for the record-page layer.
//!
//! A library consumed by a transaction manager needs to distinguish
//! *which* failure happened — a format error aborts the load, an
//! overflow-resolution error is masked, a codec error propagates, a
//! contract violation is fatal — so this is a typed enum rather than
//! an opaque boxed error.

use thiserror::Error;

/// Errors raised by the record-page layer.
#[derive(Debug, Error)]
pub enum PageError {
    /// Malformed bytes encountered while reconstructing a page.
    #[error("malformed page bytes: {detail}")]
    Format { detail: String },

    /// The record codec failed to serialize or deserialize a record body.
    #[error("record codec failure: {0}")]
    Codec(String),

    /// A referenced overflow page could not be read. Callers of
    /// `KeyValuePage::get_value` must never see this variant directly;
    /// it is masked to `Ok(None)` there. It is surfaced as-is from
    /// `commit`, where masking would silently lose data.
    #[error("overflow page for node-key {node_key} unreadable: {detail}")]
    Overflow { node_key: u64, detail: String },

    /// An invariant violation: mutating a page not held by a writer,
    /// mutating a cloned origin, or calling an indexed-reference
    /// accessor on a keyed page. Always fatal.
    #[error("contract violation: {0}")]
    Contract(&'static str),

    /// Propagated I/O failure from the underlying byte sink/source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PageError>;
