//! Single entry point for opening GRIB data.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::codes::CodesApi;
use crate::error::{GribError, Result};
use crate::file::GribFile;
use crate::handle::GribItem;
use crate::index::{GribIndex, UniqueGribIndex};

/// How [`open_grib`] opens a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Build an index over these keys instead of reading sequentially
    pub index_keys: Vec<String>,
    /// Index lookups must match exactly one message
    pub unique: bool,
    /// Skip the data section of each message
    pub headers_only: bool,
    /// Memoise key values per message
    pub cache: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn headers_only(mut self, headers_only: bool) -> Self {
        self.headers_only = headers_only;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}

/// What [`open_grib`] produced.
#[derive(Debug)]
pub enum GribSource {
    File(GribFile),
    Index(GribIndex),
    UniqueIndex(UniqueGribIndex),
}

impl GribItem for GribSource {
    fn close(&mut self) {
        match self {
            GribSource::File(file) => file.close(),
            GribSource::Index(index) => index.close(),
            GribSource::UniqueIndex(index) => index.close(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            GribSource::File(file) => file.is_closed(),
            GribSource::Index(index) => index.is_closed(),
            GribSource::UniqueIndex(index) => index.is_closed(),
        }
    }
}

/// Open `path` as a sequential file, an index, or a unique index.
///
/// Without index keys the file is read sequentially; `unique` then makes no
/// sense and is rejected. Indexed access always decodes full messages.
pub fn open_grib(codes: Arc<dyn CodesApi>, path: impl AsRef<Path>, options: &OpenOptions) -> Result<GribSource> {
    let path = path.as_ref();
    if options.index_keys.is_empty() {
        if options.unique {
            return Err(GribError::Config {
                message: "a unique index requires at least one index key".to_string(),
            });
        }
        return GribFile::open(codes, path, options.headers_only, options.cache).map(GribSource::File);
    }

    if options.unique {
        UniqueGribIndex::open(codes, path, &options.index_keys, options.cache).map(GribSource::UniqueIndex)
    } else {
        GribIndex::open(codes, path, &options.index_keys, options.cache).map(GribSource::Index)
    }
}
