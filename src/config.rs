//! Configuration management for gribmanager.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codes::KeyValue;
use crate::error::{GribError, Result};
use crate::open::OpenOptions;

/// Command-line arguments for gribmanager
#[derive(Parser, Debug)]
#[command(name = "gribmanager")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the GRIB file to read
    pub grib_file: PathBuf,

    /// Build an index over these keys (comma separated)
    #[arg(short, long, env = "GRIBMANAGER_INDEX_KEYS", value_delimiter = ',')]
    pub index_keys: Option<Vec<String>>,

    /// Values to look up in the index, one per index key (comma separated)
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub select: Vec<String>,

    /// Require index lookups to match exactly one message
    #[arg(short, long, env = "GRIBMANAGER_UNIQUE")]
    pub unique: bool,

    /// Skip the data section of each message
    #[arg(long, env = "GRIBMANAGER_HEADERS_ONLY")]
    pub headers_only: bool,

    /// Memoise key values per message
    #[arg(long, env = "GRIBMANAGER_CACHE")]
    pub cache: bool,

    /// Latitude of the point to interpolate at
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude of the point to interpolate at
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Print message metadata as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Path to JSON configuration file
    #[arg(short, long, env = "GRIBMANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GRIBMANAGER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// How GRIB files are opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenConfig {
    /// Keys of the composite index; empty for sequential reading
    #[serde(default)]
    pub index_keys: Vec<String>,

    /// Index lookups must match exactly one message
    #[serde(default)]
    pub unique: bool,

    /// Skip the data section of each message
    #[serde(default)]
    pub headers_only: bool,

    /// Memoise key values per message
    #[serde(default)]
    pub cache: bool,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// File access configuration
    #[serde(default)]
    pub open: OpenConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// What the command line asks for, besides configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub path: PathBuf,
    /// One value per index key
    pub select: Vec<KeyValue>,
    /// `(lat, lon)` to interpolate at
    pub point: Option<(f64, f64)>,
    pub json: bool,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, Request)> {
        Self::from_args(Args::parse())
    }

    /// Layer parsed arguments over the config file and defaults
    pub fn from_args(args: Args) -> Result<(Self, Request)> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments
        if let Some(keys) = args.index_keys {
            config.open.index_keys = keys.into_iter().filter(|k| !k.is_empty()).collect();
        }
        config.open.unique |= args.unique;
        config.open.headers_only |= args.headers_only;
        config.open.cache |= args.cache;
        if let Some(level) = args.log_level {
            config.log_level = level;
        }

        let request = Request {
            path: args.grib_file,
            select: args.select.iter().filter_map(|v| v.parse().ok()).collect(),
            point: args.lat.zip(args.lon),
            json: args.json,
        };

        Ok((config, request))
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if !other.open.index_keys.is_empty() {
            self.open.index_keys = other.open.index_keys;
        }
        self.open.unique = other.open.unique;
        self.open.headers_only = other.open.headers_only;
        self.open.cache = other.open.cache;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(GribError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        if self.open.unique && self.open.index_keys.is_empty() {
            return Err(GribError::Config {
                message: "A unique index requires at least one index key".to_string(),
            });
        }

        if self.open.headers_only && !self.open.index_keys.is_empty() {
            return Err(GribError::Config {
                message: "Headers-only reading is not available for indexed access".to_string(),
            });
        }

        Ok(())
    }

    /// Validate a request against this configuration
    pub fn validate_request(&self, request: &Request) -> Result<()> {
        if !request.select.is_empty() && self.open.index_keys.is_empty() {
            return Err(GribError::Config {
                message: "Selecting values requires index keys".to_string(),
            });
        }
        if !self.open.index_keys.is_empty() && request.select.len() != self.open.index_keys.len() {
            return Err(GribError::Config {
                message: format!(
                    "Expected {} selected value(s) for index keys {:?}, got {}",
                    self.open.index_keys.len(),
                    self.open.index_keys,
                    request.select.len()
                ),
            });
        }
        if request.point.is_some() && self.open.headers_only {
            return Err(GribError::Config {
                message: "Interpolation needs message values; drop --headers-only".to_string(),
            });
        }
        Ok(())
    }

    /// Options for [`open_grib`](crate::open::open_grib)
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .index_keys(self.open.index_keys.iter().cloned())
            .unique(self.open.unique)
            .headers_only(self.open.headers_only)
            .cache(self.open.cache)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            open: OpenConfig::default(),
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}
