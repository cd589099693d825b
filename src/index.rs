//! Keyed access to the messages of a GRIB file.
//!
//! A [`GribIndex`] is built over an ordered tuple of key names. A lookup
//! supplies one value per key and returns every matching message.
//! [`UniqueGribIndex`] additionally requires that exactly one message matches.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::codes::{CodesApi, KeyValue};
use crate::error::{GribError, Result};
use crate::handle::{GribItem, IndexKind, NativeHandle};
use crate::message::{GribMessage, Origin};

/// A composite index over a GRIB file.
pub struct GribIndex {
    handle: NativeHandle<IndexKind>,
    path: PathBuf,
    keys: Vec<String>,
    cache: bool,
}

impl GribIndex {
    /// Build an index of `path` over `keys`, in that order.
    pub fn open<S: AsRef<str>>(
        codes: Arc<dyn CodesApi>,
        path: impl AsRef<Path>,
        keys: &[S],
        cache: bool,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(GribError::EmptyIndexKeys);
        }
        let path = path.as_ref().to_path_buf();
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();

        let id = codes.index_new(&path, &keys)?;
        let handle = NativeHandle::new(codes, id);
        info!(path = %path.display(), keys = ?keys, "opened GRIB index");

        Ok(Self {
            handle,
            path,
            keys,
            cache,
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every message whose index keys equal `values`, in file order.
    ///
    /// Fails with `KeyNotFound` when nothing matches. If any matching message
    /// fails to decode, the messages collected so far are closed before the
    /// error is returned.
    pub fn lookup(&mut self, values: &[KeyValue]) -> Result<Vec<GribMessage>> {
        if values.len() != self.keys.len() {
            return Err(GribError::IndexArity {
                expected: self.keys.len(),
                got: values.len(),
            });
        }
        let id = self.handle.id()?;
        let codes = self.handle.codes();
        for (key, value) in self.keys.iter().zip(values) {
            codes.index_select(id, key, value)?;
        }

        let mut messages = Vec::new();
        if let Err(e) = self.drain(&mut messages) {
            for message in messages.iter_mut() {
                message.close();
            }
            debug!(released = messages.len(), error = %e, "index lookup failed");
            return Err(e);
        }

        if messages.is_empty() {
            return Err(GribError::KeyNotFound {
                message: format!("no GRIB message for {:?}={}", self.keys, render(values)),
            });
        }
        debug!(keys = ?self.keys, values = %render(values), found = messages.len(), "index lookup");
        Ok(messages)
    }

    fn drain(&self, messages: &mut Vec<GribMessage>) -> Result<()> {
        let id = self.handle.id()?;
        while let Some(msg) = self.handle.codes().index_next(id)? {
            messages.push(GribMessage::new(
                self.handle.shared_codes(),
                msg,
                Origin::Index {
                    path: self.path.clone(),
                },
                false,
                self.cache,
            )?);
        }
        Ok(())
    }

    /// Distinct values of one of the index keys.
    pub fn get_indices(&self, key: &str) -> Result<Vec<KeyValue>> {
        if !self.keys.iter().any(|k| k == key) {
            return Err(GribError::KeyNotFound {
                message: format!("invalid key={}. Available keys={:?}", key, self.keys),
            });
        }
        self.handle.codes().index_values(self.handle.id()?, key)
    }
}

fn render(values: &[KeyValue]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

impl GribItem for GribIndex {
    fn close(&mut self) {
        self.handle.release();
    }

    fn is_closed(&self) -> bool {
        self.handle.is_released()
    }
}

/// `<path>, keys: [..]`
impl fmt::Display for GribIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, keys: {:?}", self.path.display(), self.keys)
    }
}

impl fmt::Debug for GribIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GribIndex")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .field("keys", &self.keys)
            .finish()
    }
}

/// An index whose lookups must match exactly one message.
#[derive(Debug)]
pub struct UniqueGribIndex {
    inner: GribIndex,
}

impl UniqueGribIndex {
    pub fn open<S: AsRef<str>>(
        codes: Arc<dyn CodesApi>,
        path: impl AsRef<Path>,
        keys: &[S],
        cache: bool,
    ) -> Result<Self> {
        GribIndex::open(codes, path, keys, cache).map(|inner| Self { inner })
    }

    /// The single message matching `values`.
    ///
    /// Fails with `AmbiguousMatch` when several messages match; all of them
    /// are closed first.
    pub fn lookup(&mut self, values: &[KeyValue]) -> Result<GribMessage> {
        let mut messages = self.inner.lookup(values)?;
        if messages.len() > 1 {
            let count = messages.len();
            for message in messages.iter_mut() {
                message.close();
            }
            return Err(GribError::AmbiguousMatch {
                message: format!(
                    "there are {} GRIB messages for {:?}={}",
                    count,
                    self.inner.keys,
                    render(values)
                ),
            });
        }
        messages.pop().ok_or_else(|| GribError::KeyNotFound {
            message: format!("no GRIB message for {:?}={}", self.inner.keys, render(values)),
        })
    }

    pub fn get_indices(&self, key: &str) -> Result<Vec<KeyValue>> {
        self.inner.get_indices(key)
    }

    pub fn keys(&self) -> &[String] {
        self.inner.keys()
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl GribItem for UniqueGribIndex {
    fn close(&mut self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl fmt::Display for UniqueGribIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
