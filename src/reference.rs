//! Page references and the page-read / page-write contracts a
//! key-value page depends on but never implements.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::config::ResourceConfiguration;
use crate::consts::NULL_ID_LONG;
use crate::error::{PageError, Result};
use crate::overflow::OverflowPage;
use crate::page_kind::PageKind;
use crate::record::Record;

/// A reference to a persisted (or not-yet-persisted) overflow page.
/// While uncommitted it
/// carries the in-memory payload that `commit` will hand to the
/// page-write context; once committed, `key()` is the persistent
/// identity and the payload is dropped.
#[derive(Debug, Clone)]
pub struct PageReference {
    key: i64,
    pending: Option<Arc<OverflowPage>>,
}

impl PageReference {
    /// A reference to an already-persisted overflow page.
    pub fn from_key(key: i64) -> Self {
        Self { key, pending: None }
    }

    /// A reference awaiting commit, carrying the overflow payload
    /// that will be durably persisted when `commit()` runs.
    pub fn pending(payload: OverflowPage) -> Self {
        Self {
            key: NULL_ID_LONG,
            pending: Some(Arc::new(payload)),
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn is_persisted(&self) -> bool {
        self.key != NULL_ID_LONG
    }

    pub fn pending_payload(&self) -> Option<&OverflowPage> {
        self.pending.as_deref()
    }

    /// Record that the reference's payload has been durably persisted
    /// under `key`; called by a `PageWriteTrx::commit` implementation.
    pub fn mark_persisted(&mut self, key: i64) {
        self.key = key;
        self.pending = None;
    }
}

/// Page-read context: resolves overflow references and computes
/// per-page offsets. Consumed, never implemented, by `KeyValuePage`.
pub trait PageReadTrx {
    /// Resource-level configuration (Dewey enabled, codec identity).
    fn resource_manager(&self) -> &ResourceConfiguration;

    /// Resolve an overflow reference to its page.
    fn read(&self, reference: &PageReference) -> Result<OverflowPage>;

    /// Deterministic function computing `offset in [0, N)` for `key`,
    /// used during serialization to compute bitmap positions.
    fn record_page_offset(&self, key: u64) -> usize;

    /// Used only by layers above the record-page layer; the key-value
    /// page never calls this itself, but a conforming implementation
    /// still has to provide it as part of the contract surface.
    fn get_record(
        &self,
        key: u64,
        page_kind: PageKind,
        index_number: i32,
    ) -> Result<Option<Arc<dyn Record>>>;
}

/// Page-write context: durably persists overflow pages at commit
/// time.
pub trait PageWriteTrx: PageReadTrx {
    /// Durably persist the overflow page referenced, mutating
    /// `reference` to carry its new persistent key.
    fn commit(&mut self, reference: &mut PageReference) -> Result<()>;
}

/// A minimal in-memory implementation of both contracts, used by this
/// crate's own tests and available to callers that want a working
/// fixture without standing up the (out-of-scope) full transaction
/// manager.
pub struct InMemoryPageStore {
    resource_config: ResourceConfiguration,
    pages: HashMap<i64, OverflowPage>,
    next_key: AtomicI64,
}

impl InMemoryPageStore {
    pub fn new(resource_config: ResourceConfiguration) -> Self {
        Self {
            resource_config,
            pages: HashMap::new(),
            next_key: AtomicI64::new(0),
        }
    }

    /// Simulate an unreadable overflow page, for exercising the
    /// masked-error path of `KeyValuePage::get_value`.
    pub fn poison(&mut self, key: i64) {
        self.pages.remove(&key);
    }
}

impl PageReadTrx for InMemoryPageStore {
    fn resource_manager(&self) -> &ResourceConfiguration {
        &self.resource_config
    }

    fn read(&self, reference: &PageReference) -> Result<OverflowPage> {
        if let Some(payload) = reference.pending_payload() {
            return Ok(payload.clone());
        }
        self.pages.get(&reference.key()).cloned().ok_or_else(|| {
            PageError::Overflow {
                node_key: 0,
                detail: format!("no overflow page for key {}", reference.key()),
            }
        })
    }

    fn record_page_offset(&self, key: u64) -> usize {
        self.resource_config.offset_of(key)
    }

    fn get_record(
        &self,
        _key: u64,
        _page_kind: PageKind,
        _index_number: i32,
    ) -> Result<Option<Arc<dyn Record>>> {
        Ok(None)
    }
}

impl PageWriteTrx for InMemoryPageStore {
    fn commit(&mut self, reference: &mut PageReference) -> Result<()> {
        if reference.is_persisted() {
            return Ok(());
        }
        let payload = reference
            .pending_payload()
            .ok_or_else(|| PageError::Contract("commit called on reference with no payload"))?
            .clone();
        let key = self.next_key.fetch_add(1, Ordering::SeqCst);
        self.pages.insert(key, payload);
        reference.mark_persisted(key);
        Ok(())
    }
}
