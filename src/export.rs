//! # JSONL Export
//!
//! Writes decoded logs as JSON Lines, one object per line. Every line carries
//! a `type` tag naming what it holds.

use std::io::Write;

use serde::Serialize;

use crate::assembler::AssembledRow;
use crate::error::Result;
use crate::tlm::parser::TlmLog;
use crate::tlm::protocol::{DataRecord, MainHeaderRecord, SupplementalHeaderRecord};

/// One output line
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Line<'a> {
    MainHeader(&'a MainHeaderRecord),
    SupplementalHeader(&'a SupplementalHeaderRecord),
    Record(&'a DataRecord),
    Row(&'a AssembledRow),
}

/// JSON Lines writer
pub struct JsonlWriter<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Write one line
    pub fn write_line(&mut self, line: &Line<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Write a decoded log followed by its assembled rows
    ///
    /// Headers and raw records are only written when asked for; rows are
    /// always written.
    pub fn write_log(
        &mut self,
        log: &TlmLog,
        rows: &[AssembledRow],
        include_headers: bool,
        include_records: bool,
    ) -> Result<()> {
        if include_headers {
            for header in &log.main_headers {
                self.write_line(&Line::MainHeader(header))?;
            }
            for header in &log.supplemental_headers {
                self.write_line(&Line::SupplementalHeader(header))?;
            }
        }

        if include_records {
            for record in &log.data_records {
                self.write_line(&Line::Record(record))?;
            }
        }

        for row in rows {
            self.write_line(&Line::Row(row))?;
        }

        Ok(())
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::tlm::fixtures::*;
    use crate::tlm::parser::parse;

    fn lines(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn sample_log() -> TlmLog {
        parse(&file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(100, esc_payload(1240, 110)),
        ]))
        .unwrap()
    }

    #[test]
    fn test_rows_only_by_default() {
        let log = sample_log();
        let rows = assemble(&log.data_records);

        let mut writer = JsonlWriter::new(Vec::new());
        writer.write_log(&log, &rows, false, false).unwrap();
        assert_eq!(writer.lines(), 1);

        let output = lines(&writer.into_inner());
        assert_eq!(output[0]["type"], "row");
        assert_eq!(output[0]["timestamp_ms"], 1000);
        assert_eq!(output[0]["esc_throttle_%"], 55.0);
        assert!(output[0]["esc_rpm"].is_null());
    }

    #[test]
    fn test_headers_and_records() {
        let log = sample_log();
        let rows = assemble(&log.data_records);

        let mut writer = JsonlWriter::new(Vec::new());
        writer.write_log(&log, &rows, true, true).unwrap();

        let output = lines(&writer.into_inner());
        let types: Vec<_> = output.iter().map(|line| line["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["main_header", "supplemental_header", "record", "row"]);
        assert_eq!(output[0]["model_name"], "Trainer");
        assert_eq!(output[1]["sensor_name"], "ESC Sensor");
        assert_eq!(output[2]["payload"]["status"], "decoded");
        assert_eq!(output[2]["payload"]["sensor"], "ESC");
    }

    #[test]
    fn test_write_to_file() {
        use std::fs::File;
        use std::io::BufWriter;

        let log = sample_log();
        let rows = assemble(&log.data_records);
        let temp = tempfile::NamedTempFile::new().unwrap();

        let mut writer = JsonlWriter::new(BufWriter::new(File::create(temp.path()).unwrap()));
        writer.write_log(&log, &rows, false, false).unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(temp.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with('\n'));
    }
}
