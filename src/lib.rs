//! Versioned, copy-on-write record-page layer for a tree-oriented
//! document store.
//!
//! A [`kv_page::KeyValuePage`] groups up to `N` records under a shared
//! page key, partitioning them at commit time between small inline
//! slots and an overflow escape hatch for oversized payloads, with an
//! optional Dewey-ID prefix-compressed index for resources that track
//! hierarchical node position. See `SPEC_FULL.md` for the full module
//! breakdown.

pub mod bitset;
pub mod config;
pub mod consts;
pub mod dewey;
pub mod error;
pub mod kv_page;
pub mod overflow;
pub mod page_kind;
pub mod record;
pub mod reference;
pub mod varint;

pub use config::ResourceConfiguration;
pub use dewey::DeweyId;
pub use error::{PageError, Result};
pub use kv_page::{IndexedPageOps, KeyValuePage, SerializationType};
pub use overflow::OverflowPage;
pub use page_kind::PageKind;
pub use record::{
    BytesRecord, BytesRecordCodec, JsonRecord, JsonRecordCodec, NodeKind, Record, RecordSerializer,
};
pub use reference::{InMemoryPageStore, PageReadTrx, PageReference, PageWriteTrx};
