//! # Spektrum TLM Library
//!
//! Decode Spektrum transmitter telemetry (TLM) log files.
//!
//! A TLM file holds one or more logging sessions. Each session opens with a
//! main header naming the model, lists its sensors in supplemental headers,
//! and then carries timestamped 16-byte sensor payloads. This library splits
//! the file into frames, decodes each payload into named physical values, and
//! merges readings taken at the same instant into rows.
//!
//! ```no_run
//! let bytes = std::fs::read("flight.TLM")?;
//! let log = spektrum_tlm::parse(&bytes)?;
//! for row in spektrum_tlm::assemble(&log.data_records) {
//!     println!("{} ms: {:?}", row.timestamp_ms, row.fields.get("esc_vInput"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod tlm;
pub mod assembler;
pub mod export;

pub use assembler::{assemble, AssembledRow, Assembler, FieldCollision};
pub use error::{ParseWarning, Result, TlmError};
pub use tlm::codec::CodecRegistry;
pub use tlm::parser::{parse, ParseState, TlmLog, TlmParser};
