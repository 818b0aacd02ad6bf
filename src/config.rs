//! # Configuration Module
//!
//! Handles loading and validating decoder configuration from TOML files.
//!
//! Every value has a default matching the Spektrum TLM layout, so an empty
//! file (or no file at all) yields a working configuration. Overriding the
//! `[layout]` section lets the same decoder read other format revisions.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, TlmError};
use crate::tlm::protocol::{
    TLM_DATA_FRAME_SIZE, TLM_HEADER_FRAME_SIZE, TLM_HEADER_MARKER, TLM_MAIN_HEADER_SIGNATURE,
    TLM_MARKER_SIZE, TLM_MODEL_NAME_LONG, TLM_TIMESTAMP_TICK_MS,
};

/// Largest frame size accepted in a layout
pub const MAX_FRAME_SIZE: usize = 4096;

/// Longest timestamp tick accepted in a layout
pub const MAX_TIMESTAMP_TICK_MS: u64 = 1000;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub layout: FrameLayout,

    #[serde(default)]
    pub decoding: DecodingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Frame structure of a TLM file
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    /// Leading little-endian `u32` that marks a header frame
    #[serde(default = "default_header_marker")]
    pub header_marker: u32,

    #[serde(default = "default_header_frame_size")]
    pub header_frame_size: usize,

    #[serde(default = "default_data_frame_size")]
    pub data_frame_size: usize,

    /// Byte present in every main header frame
    #[serde(default = "default_main_header_signature")]
    pub main_header_signature: u8,

    /// Milliseconds per data-frame timestamp tick
    #[serde(default = "default_timestamp_tick_ms")]
    pub timestamp_tick_ms: u64,
}

/// Decoding policy
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DecodingConfig {
    /// Treat data frames from sensors no supplemental header declared as unknown
    #[serde(default)]
    pub require_declared_sensors: bool,
}

/// Output options for the command-line decoder
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: String,

    /// Also emit header records
    #[serde(default)]
    pub include_headers: bool,

    /// Also emit the per-sensor data records
    #[serde(default)]
    pub include_records: bool,
}

// Default value functions
fn default_header_marker() -> u32 { TLM_HEADER_MARKER }
fn default_header_frame_size() -> usize { TLM_HEADER_FRAME_SIZE }
fn default_data_frame_size() -> usize { TLM_DATA_FRAME_SIZE }
fn default_main_header_signature() -> u8 { TLM_MAIN_HEADER_SIGNATURE }
fn default_timestamp_tick_ms() -> u64 { TLM_TIMESTAMP_TICK_MS }

fn default_output_format() -> String { "jsonl".to_string() }

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            header_marker: default_header_marker(),
            header_frame_size: default_header_frame_size(),
            data_frame_size: default_data_frame_size(),
            main_header_signature: default_main_header_signature(),
            timestamp_tick_ms: default_timestamp_tick_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            include_headers: false,
            include_records: false,
        }
    }
}

impl FrameLayout {
    /// Check that frame boundaries can be computed from this layout
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayout` for zero or implausible frame sizes
    pub fn validate(&self) -> Result<()> {
        if self.data_frame_size <= TLM_MARKER_SIZE || self.data_frame_size > MAX_FRAME_SIZE {
            return Err(TlmError::InvalidLayout(format!(
                "data_frame_size {} must be between {} and {}",
                self.data_frame_size,
                TLM_MARKER_SIZE + 1,
                MAX_FRAME_SIZE
            )));
        }

        if self.header_frame_size < TLM_MODEL_NAME_LONG.end
            || self.header_frame_size > MAX_FRAME_SIZE
        {
            return Err(TlmError::InvalidLayout(format!(
                "header_frame_size {} must be between {} and {}",
                self.header_frame_size,
                TLM_MODEL_NAME_LONG.end,
                MAX_FRAME_SIZE
            )));
        }

        if self.timestamp_tick_ms == 0 || self.timestamp_tick_ms > MAX_TIMESTAMP_TICK_MS {
            return Err(TlmError::InvalidLayout(format!(
                "timestamp_tick_ms {} must be between 1 and {}",
                self.timestamp_tick_ms, MAX_TIMESTAMP_TICK_MS
            )));
        }

        Ok(())
    }

    /// Stride of a frame that starts with `marker`
    pub fn stride(&self, marker: u32) -> usize {
        if marker == self.header_marker {
            self.header_frame_size
        } else {
            self.data_frame_size
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spektrum_tlm::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        self.layout
            .validate()
            .map_err(|e| TlmError::Config(toml::de::Error::custom(e.to_string())))?;

        // Validate output format
        if self.output.format != "jsonl" {
            return Err(TlmError::Config(toml::de::Error::custom(
                "output format must be 'jsonl' (only supported format)",
            )));
        }

        Ok(())
    }
}
