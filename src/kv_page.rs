//! Key-value page: the central component of the record-page layer.
//! Groups up to `N` records
//! sharing a page key, partitions them between inline slots and
//! overflow references at commit time, and optionally prefix-
//! compresses a Dewey-ID index.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;

use crate::bitset::{BitSet, SetBitCursor};
use crate::config::ResourceConfiguration;
use crate::dewey::DeweyId;
use crate::error::{PageError, Result};
use crate::overflow::OverflowPage;
use crate::page_kind::PageKind;
use crate::record::{NodeKind, Record, RecordSerializer};
use crate::reference::{PageReadTrx, PageReference, PageWriteTrx};
use crate::varint::{read_varlong, write_varlong};

/// Parameter of `KeyValuePage::serialize`. Both variants currently
/// produce the identical byte layout — the abbreviated intent-log
/// layout belongs to the out-of-scope write-ahead machinery — see
/// DESIGN.md for the reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationType {
    Data,
    TransactionIntentLog,
}

/// An ordered collection of up to `N` records sharing a page key. Not
/// internally thread-safe: concurrency is the node-transaction
/// layer's job.
pub struct KeyValuePage {
    page_key: u64,
    page_kind: PageKind,

    records: IndexMap<u64, Arc<dyn Record>>,
    inline_slots: BTreeMap<u64, Vec<u8>>,
    overflow_refs: BTreeMap<u64, PageReference>,
    dewey_index: BTreeMap<DeweyId, u64>,
    previous_page_ref: Option<i64>,

    resource_config: Arc<ResourceConfiguration>,
    codec: Arc<dyn RecordSerializer>,
    read_ctx: Arc<dyn PageReadTrx>,

    /// Set once `prepare()` has run since the last mutation.
    prepared: bool,

    /// Pages reconstructed from bytes, and origins that have been
    /// cloned for copy-on-write, are logically immutable: `set_entry`
    /// on such a page is a contract violation. See DESIGN.md for why
    /// this is enforced at runtime rather than left to caller
    /// discipline.
    read_only: bool,
}

impl KeyValuePage {
    /// A fresh page allocated by a writing transaction.
    pub fn new(
        page_key: u64,
        page_kind: PageKind,
        resource_config: Arc<ResourceConfiguration>,
        codec: Arc<dyn RecordSerializer>,
        read_ctx: Arc<dyn PageReadTrx>,
    ) -> Self {
        Self {
            page_key,
            page_kind,
            records: IndexMap::new(),
            inline_slots: BTreeMap::new(),
            overflow_refs: BTreeMap::new(),
            dewey_index: BTreeMap::new(),
            previous_page_ref: None,
            resource_config,
            codec,
            read_ctx,
            prepared: false,
            read_only: false,
        }
    }

    pub fn page_key(&self) -> u64 {
        self.page_key
    }

    pub fn page_kind(&self) -> PageKind {
        self.page_kind
    }

    pub fn previous_page_ref(&self) -> Option<i64> {
        self.previous_page_ref
    }

    pub fn set_previous_page_ref(&mut self, key: Option<i64>) -> Result<()> {
        self.check_writable()?;
        self.previous_page_ref = key;
        Ok(())
    }

    pub fn dewey_index(&self) -> &BTreeMap<DeweyId, u64> {
        &self.dewey_index
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(PageError::Contract(
                "mutating operation called on a read-only key-value page",
            ));
        }
        Ok(())
    }

    fn dewey_active(&self) -> bool {
        self.resource_config.stores_dewey_ids && self.codec.supports_dewey()
    }

    // ---------------------------------------------------------- reads

    /// In-memory hit, else fault in through the overflow reference
    /// (masking resolution failures as absent), else absent.
    pub fn get_value(&mut self, key: u64) -> Result<Option<Arc<dyn Record>>> {
        if let Some(record) = self.records.get(&key) {
            return Ok(Some(record.clone()));
        }
        let Some(reference) = self.overflow_refs.get(&key).cloned() else {
            return Ok(None);
        };
        match self.resolve_overflow(key, &reference) {
            Ok(record) => {
                self.records.insert(key, record.clone());
                Ok(Some(record))
            }
            Err(e) => {
                log::warn!(
                    "overflow resolution for node-key {key} failed, treating as absent: {e}"
                );
                Ok(None)
            }
        }
    }

    fn resolve_overflow(&self, key: u64, reference: &PageReference) -> Result<Arc<dyn Record>> {
        let overflow = self.read_ctx.read(reference).map_err(|e| PageError::Overflow {
            node_key: key,
            detail: e.to_string(),
        })?;
        let mut cursor = overflow.data();
        self.codec
            .deserialize(&mut cursor, key, None, self.read_ctx.as_ref())
    }

    /// `|records| + |overflow-refs|`, deliberately not deduplicated
    /// against records already faulted in from overflow — see
    /// DESIGN.md.
    pub fn size(&self) -> usize {
        self.records.len() + self.overflow_refs.len()
    }

    /// Live in-memory records, insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, &Arc<dyn Record>)> {
        self.records.iter().map(|(k, v)| (*k, v))
    }

    // --------------------------------------------------------- writes

    /// Insert or replace the live value for `key`, dropping any stale
    /// inline/overflow slot until the next `prepare()`.
    pub fn set_entry(&mut self, key: u64, record: Arc<dyn Record>) -> Result<()> {
        self.check_writable()?;
        self.records.insert(key, record);
        self.inline_slots.remove(&key);
        self.overflow_refs.remove(&key);
        self.prepared = false;
        Ok(())
    }

    /// Move every live record into exactly one of `inline_slots` or
    /// `overflow_refs`, populating `dewey_index` along the way.
    /// Idempotent; invoked lazily by `serialize` and `commit`.
    fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }

        let dewey_active = self.dewey_active();
        let mut working: Vec<(u64, Arc<dyn Record>)> = self
            .records
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        if dewey_active {
            working.sort_by(|(ka, ra), (kb, rb)| {
                let da = if *ka == 0 { None } else { ra.dewey_id() };
                let db = if *kb == 0 { None } else { rb.dewey_id() };
                match (da, db) {
                    (Some(a), Some(b)) => a.cmp(b),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            });
        }

        for (key, record) in working {
            if self.inline_slots.contains_key(&key) || self.overflow_refs.contains_key(&key) {
                continue;
            }

            let mut buf = Vec::new();
            self.codec
                .serialize(&mut buf, record.as_ref(), self.read_ctx.as_ref())?;

            if buf.len() > self.resource_config.max_record_size {
                log::debug!("node-key {key} ({} bytes) routed to overflow", buf.len());
                self.overflow_refs
                    .insert(key, PageReference::pending(OverflowPage::new(buf)));
            } else {
                if dewey_active {
                    if let (Some(dewey_id), true) = (record.dewey_id(), key != 0) {
                        self.dewey_index.insert(dewey_id.clone(), key);
                    }
                }
                self.inline_slots.insert(key, buf);
            }
        }

        self.prepared = true;
        log::debug!(
            "prepared page-key {}: {} inline, {} overflow, {} dewey-indexed",
            self.page_key,
            self.inline_slots.len(),
            self.overflow_refs.len(),
            self.dewey_index.len()
        );
        Ok(())
    }

    /// Write the canonical byte layout: page key, optional Dewey
    /// section, inline/overflow bitmaps, inline entries, overflow
    /// references, previous-page-ref, page-kind tag.
    pub fn serialize(&mut self, out: &mut dyn Write, serialization_type: SerializationType) -> Result<()> {
        self.prepare()?;
        // Both variants share the same layout; see DESIGN.md.
        let _ = serialization_type;

        write_varlong(out, self.page_key)?;

        let dewey_active = self.dewey_active();
        // Working copy: entries consumed by the Dewey section are
        // removed here, not from `self.inline_slots`, so repeated
        // calls to `serialize` stay idempotent.
        let mut remaining_inline = self.inline_slots.clone();

        if dewey_active {
            let mut dewey_entries: Vec<(&DeweyId, &u64)> = self.dewey_index.iter().collect();
            dewey_entries.sort_by_key(|(id, _)| id.encoded_len());

            out.write_u32::<LittleEndian>(dewey_entries.len() as u32)?;
            let mut previous: Option<DeweyId> = None;
            for (dewey_id, node_key) in dewey_entries {
                self.codec.serialize_dewey_id(
                    out,
                    NodeKind::Element,
                    dewey_id,
                    previous.as_ref(),
                    &self.resource_config,
                )?;
                write_varlong(out, *node_key)?;
                let bytes = remaining_inline.remove(node_key).ok_or_else(|| PageError::Format {
                    detail: format!("dewey-indexed node-key {node_key} has no inline slot"),
                })?;
                out.write_u32::<LittleEndian>(bytes.len() as u32)?;
                out.write_all(&bytes)?;
                previous = Some(dewey_id.clone());
            }
        }

        let n = self.resource_config.node_page_node_count;

        let mut inline_bitmap = BitSet::new(n);
        for &key in remaining_inline.keys() {
            inline_bitmap.set(self.read_ctx.record_page_offset(key));
        }
        inline_bitmap.write_to(out)?;

        let mut overflow_bitmap = BitSet::new(n);
        for &key in self.overflow_refs.keys() {
            overflow_bitmap.set(self.read_ctx.record_page_offset(key));
        }
        overflow_bitmap.write_to(out)?;

        out.write_u32::<LittleEndian>(remaining_inline.len() as u32)?;
        for bytes in remaining_inline.values() {
            out.write_u32::<LittleEndian>(bytes.len() as u32)?;
            out.write_all(bytes)?;
        }

        out.write_u32::<LittleEndian>(self.overflow_refs.len() as u32)?;
        for reference in self.overflow_refs.values() {
            out.write_i64::<LittleEndian>(reference.key())?;
        }

        match self.previous_page_ref {
            Some(key) => {
                out.write_u8(1)?;
                out.write_i64::<LittleEndian>(key)?;
            }
            None => out.write_u8(0)?,
        }

        out.write_u8(self.page_kind as u8)?;

        log::debug!(
            "serialized page-key {} ({} inline, {} overflow)",
            self.page_key,
            self.inline_slots.len(),
            self.overflow_refs.len()
        );
        Ok(())
    }

    /// Reconstruct a page from bytes previously produced by
    /// `serialize`.
    pub fn deserialize(
        input: &mut dyn Read,
        page_kind_hint: Option<PageKind>,
        resource_config: Arc<ResourceConfiguration>,
        codec: Arc<dyn RecordSerializer>,
        read_ctx: Arc<dyn PageReadTrx>,
    ) -> Result<Self> {
        let _ = page_kind_hint; // the kind is authoritative from the trailing byte (step 8)

        let page_key = read_varlong(input)?;
        let dewey_active = resource_config.stores_dewey_ids && codec.supports_dewey();

        let mut records: IndexMap<u64, Arc<dyn Record>> = IndexMap::new();
        let mut inline_slots: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
        let mut dewey_index: BTreeMap<DeweyId, u64> = BTreeMap::new();

        if dewey_active {
            let dewey_count = input.read_u32::<LittleEndian>()?;
            let mut previous: Option<DeweyId> = None;
            for _ in 0..dewey_count {
                let (dewey_id, _tag) = DeweyId::deserialize_delta(input, previous.as_ref())?;
                let node_key = read_varlong(input)?;
                let len = input.read_u32::<LittleEndian>()? as usize;
                let mut body = vec![0u8; len];
                input.read_exact(&mut body)?;

                let record = codec.deserialize(
                    &mut &body[..],
                    node_key,
                    Some(dewey_id.clone()),
                    read_ctx.as_ref(),
                )?;

                if node_key != 0 {
                    dewey_index.insert(dewey_id.clone(), node_key);
                }
                inline_slots.insert(node_key, body);
                records.insert(node_key, record);
                previous = Some(dewey_id);
            }
        }

        let n = resource_config.node_page_node_count;
        let inline_bitmap = BitSet::read_from(input, n)?;
        let overflow_bitmap = BitSet::read_from(input, n)?;

        let inline_count = input.read_u32::<LittleEndian>()?;
        let mut inline_cursor = SetBitCursor::new(&inline_bitmap);
        for _ in 0..inline_count {
            let offset = inline_cursor.advance().ok_or_else(|| PageError::Format {
                detail: "inline bitmap exhausted before inline count".to_string(),
            })?;
            let key = page_key * n as u64 + offset as u64;
            let len = input.read_u32::<LittleEndian>()? as usize;
            let mut body = vec![0u8; len];
            input.read_exact(&mut body)?;

            let record = codec.deserialize(&mut &body[..], key, None, read_ctx.as_ref())?;
            inline_slots.insert(key, body);
            records.insert(key, record);
        }

        let overflow_count = input.read_u32::<LittleEndian>()?;
        let mut overflow_cursor = SetBitCursor::new(&overflow_bitmap);
        let mut overflow_refs: BTreeMap<u64, PageReference> = BTreeMap::new();
        for _ in 0..overflow_count {
            let offset = overflow_cursor.advance().ok_or_else(|| PageError::Format {
                detail: "overflow bitmap exhausted before overflow count".to_string(),
            })?;
            let key = page_key * n as u64 + offset as u64;
            let reference_key = input.read_i64::<LittleEndian>()?;
            overflow_refs.insert(key, PageReference::from_key(reference_key));
        }

        let has_previous = input.read_u8()? != 0;
        let previous_page_ref = if has_previous {
            Some(input.read_i64::<LittleEndian>()?)
        } else {
            None
        };

        let page_kind = PageKind::from_tag(input.read_u8()?)?;

        Ok(Self {
            page_key,
            page_kind,
            records,
            inline_slots,
            overflow_refs,
            dewey_index,
            previous_page_ref,
            resource_config,
            codec,
            read_ctx,
            prepared: true,
            read_only: true,
        })
    }

    /// Prepare, then durably persist every not-yet-persisted overflow
    /// page, in ascending key order, before the key-value page itself
    /// is considered durable.
    pub fn commit(&mut self, write_ctx: &mut dyn PageWriteTrx) -> Result<()> {
        self.prepare()?;
        for reference in self.overflow_refs.values_mut() {
            if !reference.is_persisted() {
                write_ctx.commit(reference)?;
            }
        }
        Ok(())
    }

    /// Shallow copy sharing all maps, for copy-on-write. The origin
    /// becomes immutable to the caller from this point on, enforced
    /// here by flipping its `read_only` flag — see DESIGN.md.
    pub fn clone_for_cow(&mut self, new_read_ctx: Arc<dyn PageReadTrx>) -> Self {
        self.read_only = true;
        Self {
            page_key: self.page_key,
            page_kind: self.page_kind,
            records: self.records.clone(),
            inline_slots: self.inline_slots.clone(),
            overflow_refs: self.overflow_refs.clone(),
            dewey_index: self.dewey_index.clone(),
            previous_page_ref: self.previous_page_ref,
            resource_config: self.resource_config.clone(),
            codec: self.codec.clone(),
            read_ctx: new_read_ctx,
            prepared: self.prepared,
            read_only: false,
        }
    }

    // ------------------------------------------- indexed-page surface

    /// Unsupported on a keyed page: `KeyValuePage` does not implement
    /// [`IndexedPageOps`] below, so these exist only as fatal
    /// compatibility shims for a caller still holding a type-erased
    /// "any page" handle.
    pub fn get_references(&self) -> Result<Vec<PageReference>> {
        Err(PageError::Contract(
            "getReferences is unsupported on a key-value page",
        ))
    }

    pub fn get_reference(&self, _index: usize) -> Result<PageReference> {
        Err(PageError::Contract(
            "getReference(int) is unsupported on a key-value page",
        ))
    }

    pub fn set_reference(&mut self, _index: usize, _reference: PageReference) -> Result<()> {
        Err(PageError::Contract(
            "setReference(int, _) is unsupported on a key-value page",
        ))
    }
}

/// The reference-array contract belonging to the *indexed* page
/// variant of the page hierarchy: keyed and indexed pages are
/// separate variants, not one page implementing both surfaces.
/// Nothing in this crate implements it — indexed pages are out of
/// scope — it exists so `KeyValuePage`'s three unsupported methods
/// above read as a deliberate non-impl rather than an oversight.
#[allow(dead_code)]
pub trait IndexedPageOps {
    fn get_references(&self) -> Result<Vec<PageReference>>;
    fn get_reference(&self, index: usize) -> Result<PageReference>;
    fn set_reference(&mut self, index: usize, reference: PageReference) -> Result<()>;
}
