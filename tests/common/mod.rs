//! Common test utilities for gribmanager.
//!
//! Fixture writers for JSON-lines GRIB files and floating-point assertions.

#![allow(dead_code)]

pub mod assertions;
pub mod test_data;
