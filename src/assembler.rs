//! # Row Assembler
//!
//! Merges per-sensor data records into time-aligned rows.
//!
//! Records sharing a session and timestamp become one row holding the union
//! of their fields. Every row carries every column seen in the input, with
//! `None` where no sensor reported the field at that instant.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::tlm::protocol::{DataRecord, Fields, Reading};

/// Two records at the same instant reported different values for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCollision {
    pub field: String,
    /// Value that was overwritten
    pub previous: Reading,
    /// Value kept in the row
    pub current: Reading,
}

/// All readings for one session at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledRow {
    pub session_id: u32,
    pub timestamp_ms: u64,
    /// Seconds since the first row of the session
    pub elapsed_s: f64,
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<FieldCollision>,
}

#[derive(Debug, Default)]
struct PendingRow {
    fields: Fields,
    collisions: Vec<FieldCollision>,
}

/// Streaming row assembler
///
/// Records can arrive in any order; rows come out sorted by session then
/// timestamp.
#[derive(Debug, Default)]
pub struct Assembler {
    rows: BTreeMap<(u32, u64), PendingRow>,
    columns: BTreeSet<String>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one record into its row
    ///
    /// Unknown payloads and payloads without fields are ignored. A field
    /// already present in the row is overwritten; a differing value is noted
    /// as a [`FieldCollision`].
    pub fn push(&mut self, record: &DataRecord) {
        let Some(fields) = record.fields() else {
            return;
        };
        if fields.is_empty() {
            return;
        }

        let row = self
            .rows
            .entry((record.session_id, record.timestamp_ms))
            .or_default();

        for (name, reading) in fields {
            if !self.columns.contains(name) {
                self.columns.insert(name.clone());
            }

            if let Some(previous) = row.fields.insert(name.clone(), reading.clone()) {
                if previous != *reading {
                    debug!(
                        "Field {} overwritten in session {} at {} ms",
                        name, record.session_id, record.timestamp_ms
                    );
                    row.collisions.push(FieldCollision {
                        field: name.clone(),
                        previous,
                        current: reading.clone(),
                    });
                }
            }
        }
    }

    /// Fold another assembler into this one
    ///
    /// Lets record ranges be assembled separately and combined. Fields seen
    /// in both halves for the same row go through the same collision check
    /// as [`Assembler::push`], with `other` as the later write.
    pub fn merge(&mut self, other: Assembler) {
        self.columns.extend(other.columns);

        for (key, incoming) in other.rows {
            let row = self.rows.entry(key).or_default();
            row.collisions.extend(incoming.collisions);

            for (name, reading) in incoming.fields {
                match row.fields.get(&name) {
                    Some(previous) if *previous != reading => {
                        row.collisions.push(FieldCollision {
                            field: name.clone(),
                            previous: previous.clone(),
                            current: reading.clone(),
                        });
                    }
                    _ => {}
                }
                row.fields.insert(name, reading);
            }
        }
    }

    /// Number of rows assembled so far
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Emit the rows, each filled out to the full column set
    pub fn finish(self) -> Vec<AssembledRow> {
        let Assembler { rows, columns } = self;
        let blank: Fields = columns.into_iter().map(|column| (column, None)).collect();

        let mut assembled = Vec::with_capacity(rows.len());
        let mut session_start: Option<(u32, u64)> = None;

        for ((session_id, timestamp_ms), pending) in rows {
            let start = match session_start {
                Some((session, start)) if session == session_id => start,
                _ => {
                    session_start = Some((session_id, timestamp_ms));
                    timestamp_ms
                }
            };

            let mut fields = blank.clone();
            fields.extend(pending.fields);

            assembled.push(AssembledRow {
                session_id,
                timestamp_ms,
                elapsed_s: (timestamp_ms - start) as f64 / 1000.0,
                fields,
                collisions: pending.collisions,
            });
        }

        debug!("Assembled {} rows over {} columns", assembled.len(), blank.len());
        assembled
    }
}

impl Extend<DataRecord> for Assembler {
    fn extend<I: IntoIterator<Item = DataRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(&record);
        }
    }
}

impl<'a> Extend<&'a DataRecord> for Assembler {
    fn extend<I: IntoIterator<Item = &'a DataRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Assemble data records into time-aligned rows
///
/// # Arguments
///
/// * `records` - Data records, typically `TlmLog::data_records`
///
/// # Returns
///
/// * `Vec<AssembledRow>` - Rows ordered by session then timestamp
pub fn assemble(records: &[DataRecord]) -> Vec<AssembledRow> {
    let mut assembler = Assembler::new();
    assembler.extend(records);
    assembler.finish()
}
