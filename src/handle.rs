//! Ownership of native handles.
//!
//! A [`NativeHandle`] is the single owner of one id handed out by the decoding
//! library. It cannot be cloned, releases its id at most once, and releases it
//! on drop if nobody did so explicitly. Once released, every access reports
//! [`GribError::ResourceReleased`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

use crate::codes::{CodesApi, IndexId, IteratorId, MessageId};
use crate::diagnostics::{self, Counter};
use crate::error::{GribError, Result};

/// Describes one family of native handles.
pub trait HandleKind {
    type Id: Copy + fmt::Debug;

    /// Human readable name used in logs and errors
    const NAME: &'static str;

    const COUNTER: Counter;

    fn release(codes: &dyn CodesApi, id: Self::Id) -> Result<()>;
}

/// Decoded GRIB messages
pub struct MessageKind;

impl HandleKind for MessageKind {
    type Id = MessageId;
    const NAME: &'static str = "GRIB message";
    const COUNTER: Counter = Counter::Messages;

    fn release(codes: &dyn CodesApi, id: MessageId) -> Result<()> {
        codes.release_message(id)
    }
}

/// Key iterators over a message
pub struct KeyIteratorKind;

impl HandleKind for KeyIteratorKind {
    type Id = IteratorId;
    const NAME: &'static str = "GRIB key iterator";
    const COUNTER: Counter = Counter::KeyIterators;

    fn release(codes: &dyn CodesApi, id: IteratorId) -> Result<()> {
        codes.keys_iterator_release(id)
    }
}

/// Composite indices over a file
pub struct IndexKind;

impl HandleKind for IndexKind {
    type Id = IndexId;
    const NAME: &'static str = "GRIB index";
    const COUNTER: Counter = Counter::Indices;

    fn release(codes: &dyn CodesApi, id: IndexId) -> Result<()> {
        codes.index_release(id)
    }
}

/// The unique owner of a live native handle.
pub struct NativeHandle<K: HandleKind> {
    id: Option<K::Id>,
    codes: Arc<dyn CodesApi>,
    _kind: PhantomData<K>,
}

impl<K: HandleKind> NativeHandle<K> {
    /// Take ownership of a freshly acquired id.
    pub fn new(codes: Arc<dyn CodesApi>, id: K::Id) -> Self {
        diagnostics::record_acquired(K::COUNTER);
        debug!(kind = K::NAME, id = ?id, "acquired native handle");
        Self {
            id: Some(id),
            codes,
            _kind: PhantomData,
        }
    }

    /// The id, or `ResourceReleased` once the handle has been released.
    pub fn id(&self) -> Result<K::Id> {
        self.id
            .ok_or(GribError::ResourceReleased { kind: K::NAME })
    }

    pub fn codes(&self) -> &dyn CodesApi {
        self.codes.as_ref()
    }

    pub fn shared_codes(&self) -> Arc<dyn CodesApi> {
        Arc::clone(&self.codes)
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    /// Release the id. Only the first call reaches the decoding library.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(e) = K::release(self.codes.as_ref(), id) {
                error!(kind = K::NAME, id = ?id, error = %e, "failed to release native handle");
            }
            diagnostics::record_released(K::COUNTER);
            debug!(kind = K::NAME, id = ?id, "released native handle");
        }
    }
}

impl<K: HandleKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: HandleKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .finish()
    }
}

/// Common lifecycle of every wrapper that owns a native resource.
///
/// `close` must be idempotent, and every implementor also closes itself on
/// drop, so forgetting an explicit close only delays the release.
pub trait GribItem {
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Run `f` with `item`, closing the item afterwards whatever `f` returned.
pub fn scoped<T, R, F>(mut item: T, f: F) -> R
where
    T: GribItem,
    F: FnOnce(&mut T) -> R,
{
    let result = f(&mut item);
    item.close();
    result
}
