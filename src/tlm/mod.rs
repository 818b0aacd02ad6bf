//! # TLM Log Module
//!
//! Decoder for the Spektrum TLM telemetry log format.
//!
//! This module handles:
//! - Frame boundaries and classification (header vs data frames)
//! - Session tracking from main and supplemental headers
//! - Per-sensor payload decoding through a codec registry
//! - Recovery from truncated files and unknown sensor types

pub mod reader;
pub mod protocol;
pub mod codec;
pub mod sensors;
pub mod classifier;
pub mod parser;

#[cfg(test)]
pub(crate) mod fixtures;
