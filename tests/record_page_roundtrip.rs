use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sirix_record_page::{
    BytesRecord, BytesRecordCodec, DeweyId, InMemoryPageStore, KeyValuePage, NodeKind, PageKind,
    PageReadTrx, PageReference, PageWriteTrx, Record, ResourceConfiguration, Result,
    SerializationType,
};

/// A `PageReadTrx`/`PageWriteTrx` fixture backed by a shared, interior-
/// mutable `InMemoryPageStore`, so a test can hold one `Arc` for the
/// page's read context and still reach in with `&mut` for `commit`.
#[derive(Clone)]
struct SharedStore {
    resource_config: ResourceConfiguration,
    inner: Rc<RefCell<InMemoryPageStore>>,
}

impl SharedStore {
    fn new(resource_config: ResourceConfiguration) -> Self {
        let inner = InMemoryPageStore::new(resource_config.clone());
        Self {
            resource_config,
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    fn poison(&self, key: i64) {
        self.inner.borrow_mut().poison(key);
    }
}

impl PageReadTrx for SharedStore {
    fn resource_manager(&self) -> &ResourceConfiguration {
        &self.resource_config
    }

    fn read(&self, reference: &PageReference) -> Result<sirix_record_page::OverflowPage> {
        self.inner.borrow().read(reference)
    }

    fn record_page_offset(&self, key: u64) -> usize {
        self.resource_config.offset_of(key)
    }

    fn get_record(
        &self,
        key: u64,
        page_kind: PageKind,
        index_number: i32,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.inner.borrow().get_record(key, page_kind, index_number)
    }
}

impl PageWriteTrx for SharedStore {
    fn commit(&mut self, reference: &mut PageReference) -> Result<()> {
        self.inner.borrow_mut().commit(reference)
    }
}

/// Mirrors the teacher binary's own `init_logger`: route `log`
/// output through `env_logger`, reading `RUST_LOG` for the filter.
/// `try_init` rather than `init` since every test in this binary calls
/// it and only the first call may succeed.
fn init_logging() {
    let _ = env_logger::try_init();
}

fn bytes_record(node_key: u64, dewey_id: Option<DeweyId>, payload: Vec<u8>) -> Arc<dyn Record> {
    Arc::new(BytesRecord {
        node_key,
        dewey_id,
        kind: NodeKind::Element,
        payload,
    })
}

fn roundtrip(
    page: &mut KeyValuePage,
    resource_config: Arc<ResourceConfiguration>,
    codec: Arc<BytesRecordCodec>,
    ctx: Arc<dyn PageReadTrx>,
) -> KeyValuePage {
    let mut bytes = Vec::new();
    page.serialize(&mut bytes, SerializationType::Data).unwrap();
    KeyValuePage::deserialize(&mut &bytes[..], None, resource_config, codec, ctx).unwrap()
}

// S1: a handful of small records with no Dewey-ID tracking round-trip
// byte-for-byte equivalent (same entries, same values).
#[test]
fn small_records_without_dewey_roundtrip() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default());
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    page.set_entry(2, bytes_record(2, None, vec![1, 2, 3])).unwrap();
    page.set_entry(5, bytes_record(5, None, b"hello".to_vec())).unwrap();
    page.set_entry(9, bytes_record(9, None, vec![])).unwrap();

    let mut reconstructed = roundtrip(&mut page, cfg, codec, ctx);

    assert_eq!(reconstructed.size(), 3);
    for key in [2u64, 5, 9] {
        let got = reconstructed.get_value(key).unwrap().unwrap();
        let original = page.get_value(key).unwrap().unwrap();
        let a = got.as_any().downcast_ref::<BytesRecord>().unwrap();
        let b = original.as_any().downcast_ref::<BytesRecord>().unwrap();
        assert_eq!(a.payload, b.payload);
    }
    assert!(reconstructed.get_value(3).unwrap().is_none());
}

// S2: a record larger than the configured overflow threshold is routed
// through an overflow reference rather than stored inline, and is
// still retrievable by value after a full commit + round-trip.
#[test]
fn oversized_record_goes_to_overflow_and_is_retrievable() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default().with_max_record_size(8));
    let mut store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    let big_payload = vec![7u8; 64];
    page.set_entry(1, bytes_record(1, None, big_payload.clone())).unwrap();
    page.set_entry(2, bytes_record(2, None, vec![1])).unwrap();

    page.commit(&mut store).unwrap();

    let mut bytes = Vec::new();
    page.serialize(&mut bytes, SerializationType::Data).unwrap();
    let mut reconstructed =
        KeyValuePage::deserialize(&mut &bytes[..], None, cfg, codec, ctx).unwrap();

    let got = reconstructed.get_value(1).unwrap().unwrap();
    let record = got.as_any().downcast_ref::<BytesRecord>().unwrap();
    assert_eq!(record.payload, big_payload);

    let small = reconstructed.get_value(2).unwrap().unwrap();
    assert_eq!(
        small.as_any().downcast_ref::<BytesRecord>().unwrap().payload,
        vec![1u8]
    );
}

// S3: records at page-local offsets 0, 1 and N-1 set exactly those
// bits, and nothing else, in the reconstructed page (exercised
// indirectly through get-value on every offset in between).
#[test]
fn boundary_offsets_roundtrip_without_bleeding_into_neighbors() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default());
    let n = cfg.node_page_node_count as u64;
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    for key in [0u64, 1, n - 1] {
        page.set_entry(key, bytes_record(key, None, vec![key as u8])).unwrap();
    }

    let mut reconstructed = roundtrip(&mut page, cfg, codec, ctx);

    assert_eq!(reconstructed.size(), 3);
    for key in [0u64, 1, n - 1] {
        assert!(reconstructed.get_value(key).unwrap().is_some());
    }
    for key in [2u64, 3, n - 2] {
        assert!(reconstructed.get_value(key).unwrap().is_none());
    }
}

// S4: with Dewey-ID tracking enabled, the dewey-index is populated for
// every non-root record and the ancestor/descendant relationship
// between ids survives a round trip.
#[test]
fn dewey_enabled_page_roundtrips_index_and_ids() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default().with_dewey_ids(true));
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let root = DeweyId::from_levels(vec![1]);
    let child = DeweyId::from_levels(vec![1, 1]);
    let grandchild = DeweyId::from_levels(vec![1, 1, 1]);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    // node-key 0 is the document root and is never dewey-indexed, even
    // though it carries a dewey-id here.
    page.set_entry(0, bytes_record(0, Some(root.clone()), b"root".to_vec()))
        .unwrap();
    page.set_entry(1, bytes_record(1, Some(child.clone()), b"child".to_vec()))
        .unwrap();
    page.set_entry(
        2,
        bytes_record(2, Some(grandchild.clone()), b"grandchild".to_vec()),
    )
    .unwrap();

    let reconstructed = roundtrip(&mut page, cfg, codec, ctx);

    assert_eq!(reconstructed.dewey_index().len(), 2);
    assert_eq!(reconstructed.dewey_index().get(&child), Some(&1));
    assert_eq!(reconstructed.dewey_index().get(&grandchild), Some(&2));
    assert!(reconstructed.dewey_index().get(&root).is_none());
}

// S5: cloning a page for copy-on-write yields an independently
// mutable copy; mutating the clone never affects the origin's
// subsequent serialized output, and the origin becomes immutable.
#[test]
fn clone_for_cow_isolates_mutation_from_origin() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default());
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut origin = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    origin.set_entry(1, bytes_record(1, None, vec![1])).unwrap();

    let mut origin_bytes_before = Vec::new();
    origin.serialize(&mut origin_bytes_before, SerializationType::Data).unwrap();

    let mut clone = origin.clone_for_cow(ctx.clone());
    clone.set_entry(2, bytes_record(2, None, vec![2])).unwrap();

    assert_eq!(clone.size(), 2);
    assert_eq!(origin.size(), 1);

    let mut origin_bytes_after = Vec::new();
    origin.serialize(&mut origin_bytes_after, SerializationType::Data).unwrap();
    assert_eq!(origin_bytes_before, origin_bytes_after);

    assert!(origin.set_entry(3, bytes_record(3, None, vec![3])).is_err());
}

// S6: an absent previous-page-ref round-trips as absent, and a present
// one preserves its exact key.
#[test]
fn previous_page_ref_sentinel_preserved() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default());
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg.clone(), codec.clone(), ctx.clone());
    page.set_entry(1, bytes_record(1, None, vec![9])).unwrap();
    let reconstructed_none = roundtrip(&mut page, cfg.clone(), codec.clone(), ctx.clone());
    assert_eq!(reconstructed_none.previous_page_ref(), None);

    page.set_previous_page_ref(Some(42)).unwrap();
    let reconstructed_some = roundtrip(&mut page, cfg, codec, ctx);
    assert_eq!(reconstructed_some.previous_page_ref(), Some(42));
}

// Invariant: get-value never surfaces an overflow resolution failure;
// an unreadable overflow page is masked as absent.
#[test]
fn unreadable_overflow_is_masked_as_absent() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default().with_max_record_size(4));
    let mut store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg, codec, ctx);
    page.set_entry(1, bytes_record(1, None, vec![1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
    page.commit(&mut store).unwrap();

    // Poison the one overflow page this page committed.
    store.poison(0);

    assert!(page.get_value(1).unwrap().is_none());
}

// Invariant: size() is the literal |records| + |overflow-refs|, so
// faulting an overflow record into memory via get-value grows it by
// one rather than leaving it unchanged.
#[test]
fn size_reflects_overflow_refs_even_after_fault_in() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default().with_max_record_size(4));
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg, codec, ctx);
    page.set_entry(1, bytes_record(1, None, vec![1, 2, 3, 4, 5, 6, 7, 8])).unwrap();

    let mut bytes = Vec::new();
    page.serialize(&mut bytes, SerializationType::Data).unwrap();
    assert_eq!(page.size(), 2); // 1 record + 1 overflow-ref, not yet faulted in

    page.get_value(1).unwrap();
    assert_eq!(page.size(), 3); // faulted-in record now counted alongside its overflow-ref
}

// Invariant: serialize() is idempotent across repeated calls as long
// as the page is not mutated in between.
#[test]
fn serialize_is_idempotent_without_mutation() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default().with_dewey_ids(true));
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store.clone());
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg, codec, ctx);
    let id = DeweyId::from_levels(vec![1, 1]);
    page.set_entry(1, bytes_record(1, Some(id), b"x".to_vec())).unwrap();

    let mut first = Vec::new();
    page.serialize(&mut first, SerializationType::Data).unwrap();
    let mut second = Vec::new();
    page.serialize(&mut second, SerializationType::Data).unwrap();
    assert_eq!(first, second);
}

// Invariant: the unsupported indexed-reference operations are always
// a contract violation on a key-value page.
#[test]
fn indexed_reference_operations_are_unsupported() {
    init_logging();
    let cfg = Arc::new(ResourceConfiguration::default());
    let store = SharedStore::new((*cfg).clone());
    let ctx: Arc<dyn PageReadTrx> = Arc::new(store);
    let codec = Arc::new(BytesRecordCodec);

    let mut page = KeyValuePage::new(0, PageKind::NodePage, cfg, codec, ctx);
    assert!(page.get_references().is_err());
    assert!(page.get_reference(0).is_err());
    assert!(page
        .set_reference(0, PageReference::from_key(1))
        .is_err());
}
