//! Fixtures shared by the isolate-level tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    CodecError, Heap, HeapCreateInfo, Isolate, IsolateCreateInfo, Library,
    LibraryId, MessageCodec, PortMap, SnapshotCodec, Value,
};

/// Isolate settings with a private port registry.
pub(crate) fn create_info() -> IsolateCreateInfo {
    IsolateCreateInfo {
        name_prefix: Some("test".into()),
        registry: Arc::new(PortMap::new()),
        ..Default::default()
    }
}

/// Encode a value that needs no heap.
pub(crate) fn encode(value: Value) -> Vec<u8> {
    SnapshotCodec
        .encode(&Heap::new(HeapCreateInfo { capacity: 0 }), value)
        .unwrap()
}

/// Install a library as both the isolate and root library.
pub(crate) fn install_library(
    isolate: &mut Isolate,
    build: impl FnOnce(&mut Library),
) -> LibraryId {
    let mut library = Library::new("test:main");
    build(&mut library);
    let store = isolate.object_store_mut();
    let id = store.add_library(library);
    store.set_isolate_library(id);
    store.set_root_library(id);
    id
}

/// Snapshot codec that counts decode calls.
#[derive(Debug, Default)]
pub(crate) struct CountingCodec {
    pub(crate) decodes: AtomicUsize,
}

impl MessageCodec for CountingCodec {
    fn encode(&self, heap: &Heap, value: Value) -> Result<Vec<u8>, CodecError> {
        SnapshotCodec.encode(heap, value)
    }

    fn decode(&self, data: &[u8], heap: &mut Heap) -> Result<Value, CodecError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        SnapshotCodec.decode(data, heap)
    }
}

/// Encode a service request `[command, args...]`.
pub(crate) fn encode_request(parts: &[&str]) -> Vec<u8> {
    let mut heap = Heap::new(HeapCreateInfo::default());
    let items: Vec<Value> = parts
        .iter()
        .map(|part| Value::Ref(heap.allocate_string(*part).unwrap()))
        .collect();
    let request = heap.allocate_array(&items).unwrap();
    SnapshotCodec.encode(&heap, Value::Ref(request)).unwrap()
}
