//! Sequential access to the messages of a GRIB file.
//!
//! A [`GribFile`] opens its stream on construction and yields one
//! [`GribMessage`] per decoded message until the end of the stream. Messages
//! keep the stream alive through a shared reference, so closing the file
//! while messages are still around is safe.

use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::codes::{CodesApi, MessageId};
use crate::diagnostics::{self, Counter};
use crate::error::{GribError, Result};
use crate::handle::GribItem;
use crate::message::{GribMessage, Origin};

/// The open byte stream behind a [`GribFile`].
pub struct SourceStream {
    path: PathBuf,
    reader: Mutex<BufReader<File>>,
}

impl SourceStream {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            GribError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open GRIB file {}: {}", path.display(), e),
            ))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: Mutex::new(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SourceStream {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "closed GRIB stream");
    }
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream").field("path", &self.path).finish()
    }
}

/// A GRIB file read message by message.
pub struct GribFile {
    path: PathBuf,
    codes: Arc<dyn CodesApi>,
    stream: Option<Arc<SourceStream>>,
    headers_only: bool,
    cache: bool,
    /// Set once the stream is exhausted, failed, or was read after close
    done: bool,
}

impl GribFile {
    /// Open `path` for reading.
    ///
    /// With `headers_only` the data section of each message is skipped; with
    /// `cache` every message memoises its key values.
    pub fn open(
        codes: Arc<dyn CodesApi>,
        path: impl AsRef<Path>,
        headers_only: bool,
        cache: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let stream = SourceStream::open(path)?;
        diagnostics::record_acquired(Counter::Files);
        info!(path = %path.display(), headers_only, cache, "opened GRIB file");

        Ok(Self {
            path: path.to_path_buf(),
            codes,
            stream: Some(Arc::new(stream)),
            headers_only,
            cache,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next message, `None` at the end of the stream.
    ///
    /// A message that decodes but fails validation (an inconsistent grid,
    /// say) is returned as an error; the stream is already past it, so the
    /// next call reads the following message.
    pub fn next_message(&mut self) -> Result<Option<GribMessage>> {
        match self.decode_next()? {
            Some((id, stream)) => self.wrap(id, stream).map(Some),
            None => Ok(None),
        }
    }

    fn decode_next(&self) -> Result<Option<(MessageId, Arc<SourceStream>)>> {
        let stream = self
            .stream
            .as_ref()
            .ok_or(GribError::ResourceReleased { kind: "GRIB file" })?;
        let id = {
            let mut reader = stream.reader.lock();
            self.codes.decode_next_message(&mut *reader, self.headers_only)?
        };
        Ok(id.map(|id| (id, Arc::clone(stream))))
    }

    fn wrap(&self, id: MessageId, stream: Arc<SourceStream>) -> Result<GribMessage> {
        GribMessage::new(
            Arc::clone(&self.codes),
            id,
            Origin::Stream(stream),
            self.headers_only,
            self.cache,
        )
    }
}

/// One pass over the file.
///
/// Ends at the end of the stream, or after an error reading the stream
/// itself. A message rejected after decoding is yielded as an error and
/// iteration carries on with the next one.
impl Iterator for GribFile {
    type Item = Result<GribMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decode_next() {
            Ok(Some((id, stream))) => Some(self.wrap(id, stream)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl GribItem for GribFile {
    fn close(&mut self) {
        if self.stream.take().is_some() {
            diagnostics::record_released(Counter::Files);
            debug!(path = %self.path.display(), "closed GRIB file");
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for GribFile {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for GribFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl fmt::Debug for GribFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GribFile")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("headers_only", &self.headers_only)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::json::JsonCodes;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_iterates_every_message() {
        let file = fixture(&[r#"{"shortName": "t"}"#, "", r#"{"shortName": "u"}"#]);
        let codes = Arc::new(JsonCodes::new());
        let grib = GribFile::open(codes.clone(), file.path(), false, false).unwrap();

        let names: Vec<String> = grib
            .map(|m| m.unwrap().get("shortName").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["t", "u"]);
        assert_eq!(codes.stats().live_messages(), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let codes = Arc::new(JsonCodes::new());
        let err = GribFile::open(codes, "/nonexistent/data.grib", false, false).unwrap_err();
        assert!(matches!(err, GribError::Io(_)));
    }

    #[test]
    fn test_decode_error_ends_iteration() {
        let file = fixture(&[r#"{"shortName": "t"}"#, "not json", r#"{"shortName": "u"}"#]);
        let codes = Arc::new(JsonCodes::new());
        let mut grib = GribFile::open(codes, file.path(), false, false).unwrap();

        assert!(grib.next().unwrap().is_ok());
        assert!(grib.next().unwrap().is_err());
        assert!(grib.next().is_none());
    }

    #[test]
    fn test_messages_outlive_closed_file() {
        let file = fixture(&[r#"{"shortName": "t"}"#, r#"{"shortName": "u"}"#]);
        let codes = Arc::new(JsonCodes::new());
        let mut grib = GribFile::open(codes, file.path(), false, false).unwrap();

        let message = grib.next().unwrap().unwrap();
        grib.close();
        grib.close();
        assert!(grib.is_closed());
        assert_eq!(message.get("shortName").unwrap().to_string(), "t");
        assert_eq!(message.origin().path(), file.path());

        match grib.next() {
            Some(Err(GribError::ResourceReleased { kind })) => assert_eq!(kind, "GRIB file"),
            other => panic!("Expected ResourceReleased, got {:?}", other),
        }
        assert!(grib.next().is_none());
    }
}
