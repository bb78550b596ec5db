//! Out-of-band diagnostic metadata for normalized errors
//!
//! Request details (method, url, start time, original cause) are useful when
//! debugging a failure but must never appear in the serialized form of an error
//! shown to users or shipped to external log sinks. They live in a process-wide
//! side table keyed by an opaque id; errors hold a reference-counted handle, and
//! the table entry is evicted when the last clone of the owning error drops it.
//! Nothing the default serializer can traverse reaches the record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Diagnostic record associated with a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    /// HTTP method of the originating request
    pub method: String,
    /// Full request URL
    pub url: String,
    /// Request start time (epoch milliseconds), if the correlation injector ran
    pub start_time_ms: Option<i64>,
    /// Correlation id of the originating request
    pub correlation_id: Option<String>,
    /// Text rendering of the original failure, for diagnostics only
    pub cause: Option<String>,
}

struct MetadataStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, RequestMetadata>>,
}

fn store() -> &'static MetadataStore {
    static STORE: OnceLock<MetadataStore> = OnceLock::new();
    STORE.get_or_init(|| MetadataStore {
        next_id: AtomicU64::new(1),
        entries: Mutex::new(HashMap::new()),
    })
}

/// Opaque handle tying an error to its side-table entry.
///
/// Dropping the last handle clone evicts the entry, so metadata lives exactly
/// as long as the error it describes.
#[derive(Debug)]
pub struct MetaHandle {
    id: u64,
}

impl PartialEq for MetaHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MetaHandle {}

impl Drop for MetaHandle {
    fn drop(&mut self) {
        if let Ok(mut entries) = store().entries.lock() {
            entries.remove(&self.id);
        }
    }
}

/// Store a metadata record and return the handle that keeps it alive.
pub fn attach(meta: RequestMetadata) -> Arc<MetaHandle> {
    let store = store();
    let id = store.next_id.fetch_add(1, Ordering::Relaxed);
    store
        .entries
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(id, meta);
    Arc::new(MetaHandle { id })
}

/// Retrieve the metadata record for a handle, if it is still alive.
pub fn lookup(handle: &MetaHandle) -> Option<RequestMetadata> {
    store()
        .entries
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&handle.id)
        .cloned()
}
