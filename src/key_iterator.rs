//! Iteration over the key names of a message.

use std::marker::PhantomData;
use tracing::trace;

use crate::error::Result;
use crate::handle::{GribItem, KeyIteratorKind, NativeHandle};
use crate::message::GribMessage;

/// Walks the key names of one message, optionally restricted to a namespace.
///
/// Duplicate key names are skipped. The native iterator is released as soon as
/// it is exhausted or fails, so a fully consumed iterator holds nothing.
pub struct KeyIterator<'a> {
    handle: NativeHandle<KeyIteratorKind>,
    _message: PhantomData<&'a GribMessage>,
}

impl<'a> KeyIterator<'a> {
    pub(crate) fn new(message: &'a GribMessage, namespace: Option<&str>) -> Result<Self> {
        let id = message.with_library(|codes, msg| codes.keys_iterator_new(msg, namespace))?;
        let codes = message.handle().shared_codes();
        let mut handle = NativeHandle::new(codes, id);
        if let Err(e) = handle.codes().keys_iterator_skip_duplicates(id) {
            handle.release();
            return Err(e);
        }
        trace!(namespace = ?namespace, "opened key iterator");
        Ok(Self {
            handle,
            _message: PhantomData,
        })
    }
}

impl Iterator for KeyIterator<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.handle.id().ok()?;
        match self.handle.codes().keys_iterator_next(id) {
            Ok(Some(name)) => Some(Ok(name)),
            Ok(None) => {
                self.handle.release();
                None
            }
            Err(e) => {
                self.handle.release();
                Some(Err(e))
            }
        }
    }
}

impl GribItem for KeyIterator<'_> {
    fn close(&mut self) {
        self.handle.release();
    }

    fn is_closed(&self) -> bool {
        self.handle.is_released()
    }
}

impl std::fmt::Debug for KeyIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIterator")
            .field("handle", &self.handle)
            .finish()
    }
}
