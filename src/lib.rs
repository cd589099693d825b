//! # gribmanager
//!
//! Resource-safe access to GRIB messages and point interpolation on regular
//! latitude/longitude grids.
//!
//! ## Key Features
//!
//! - **Owned native handles**: every message, key iterator and index handed out
//!   by the decoding library is released exactly once, on `close` or on drop
//! - **Sequential and indexed access**: iterate a file or look messages up by a
//!   composite key tuple
//! - **Grid geometry**: regular grids are reconstructed and validated from the
//!   message headers, including scanning direction and longitude wraparound
//! - **Bilinear interpolation**: values at arbitrary points from the four
//!   surrounding grid points
//!
//! ## Architecture
//!
//! - **Decoding seam**: [`codes::CodesApi`] abstracts the decoding library;
//!   [`codes::json::JsonCodes`] is a reference backend over JSON lines
//! - **Wrappers**: [`GribFile`], [`GribIndex`], [`UniqueGribIndex`],
//!   [`GribMessage`] and [`KeyIterator`] own the native handles
//! - **Geometry**: [`grid`] and [`interpolation`] are pure functions over a
//!   validated [`GridDescriptor`]

pub mod codes;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod file;
pub mod grib_keys;
pub mod grid;
pub mod handle;
pub mod index;
pub mod interpolation;
pub mod key_iterator;
pub mod logging;
pub mod message;
pub mod metadata;
pub mod open;

pub use codes::{CodesApi, KeyValue};
pub use config::Config;
pub use diagnostics::HandleStats;
pub use error::{GribError, Result};
pub use file::GribFile;
pub use grid::{GridDescriptor, StructuredGrid};
pub use handle::{scoped, GribItem};
pub use index::{GribIndex, UniqueGribIndex};
pub use interpolation::{FourPoints, GridPoint};
pub use key_iterator::KeyIterator;
pub use logging::{
    generate_operation_id, init_tracing, log_error, log_handle_stats, log_operation_end,
    log_operation_start, log_timed_operation,
};
pub use message::{GribMessage, Lookup, NearestMode, ValueCache};
pub use metadata::MessageMetadata;
pub use open::{open_grib, GribSource, OpenOptions};
