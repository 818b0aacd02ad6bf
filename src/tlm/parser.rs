//! # TLM File Parser
//!
//! Walks a TLM file image frame by frame and decodes every frame it can.
//!
//! The scan is a small state machine: it waits for a main header, then reads
//! supplemental headers and data frames into the current session until the
//! next main header opens a new one. A file that ends inside a frame stops
//! the scan with a [`ParseWarning::TruncatedFile`] instead of an error.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, FrameLayout};
use crate::error::{ParseWarning, Result, TlmError};
use crate::tlm::classifier::{classify, FrameKind, RawFrame};
use crate::tlm::codec::CodecRegistry;
use crate::tlm::protocol::*;
use crate::tlm::reader::{ByteOrder, ByteReader};

/// How the scan of a file ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
    /// Every byte belonged to a complete frame
    Done,
    /// The file ended inside a frame; the partial frame was dropped
    DoneTruncated,
}

/// Everything decoded from one TLM file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlmLog {
    pub main_headers: Vec<MainHeaderRecord>,
    pub supplemental_headers: Vec<SupplementalHeaderRecord>,
    /// Data records in file order
    pub data_records: Vec<DataRecord>,
    pub warnings: Vec<ParseWarning>,
    pub state: ParseState,
}

impl TlmLog {
    fn new() -> Self {
        Self {
            main_headers: Vec::new(),
            supplemental_headers: Vec::new(),
            data_records: Vec::new(),
            warnings: Vec::new(),
            state: ParseState::Done,
        }
    }

    /// Number of sessions in the file
    pub fn session_count(&self) -> usize {
        self.main_headers.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.state == ParseState::DoneTruncated
    }

    /// Data records belonging to one session
    pub fn session_records(&self, session_id: u32) -> impl Iterator<Item = &DataRecord> {
        self.data_records
            .iter()
            .filter(move |record| record.session_id == session_id)
    }

    fn warn(&mut self, warning: ParseWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Scan position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ExpectMainHeader,
    ReadingSession(u32),
}

/// Per-session bookkeeping
#[derive(Debug, Default)]
struct Session {
    declared: HashSet<u8>,
    reported: HashSet<u8>,
}

/// TLM file parser
///
/// Holds the frame layout and the codec registry used to decode sensor
/// payloads. Parsing never mutates the parser, so one instance can decode
/// any number of files.
#[derive(Debug, Clone)]
pub struct TlmParser<'r> {
    layout: FrameLayout,
    registry: &'r CodecRegistry,
    require_declared_sensors: bool,
}

impl<'r> TlmParser<'r> {
    /// Create a parser for `layout` decoding with `registry`
    pub fn new(layout: FrameLayout, registry: &'r CodecRegistry) -> Self {
        Self {
            layout,
            registry,
            require_declared_sensors: false,
        }
    }

    /// Create a parser from the layout and decoding policy in `config`
    pub fn from_config(config: &Config, registry: &'r CodecRegistry) -> Self {
        Self::new(config.layout.clone(), registry)
            .require_declared_sensors(config.decoding.require_declared_sensors)
    }

    /// Leave payloads of sensors no supplemental header declared undecoded
    pub fn require_declared_sensors(mut self, required: bool) -> Self {
        self.require_declared_sensors = required;
        self
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Parse a complete TLM file image
    ///
    /// # Arguments
    ///
    /// * `bytes` - File contents
    ///
    /// # Returns
    ///
    /// * `Result<TlmLog>` - Headers, data records and recovered warnings
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The frame layout is invalid
    /// - The first frame is not a main header
    pub fn parse(&self, bytes: &[u8]) -> Result<TlmLog> {
        self.layout.validate()?;

        let mut log = TlmLog::new();
        let mut state = ScanState::ExpectMainHeader;
        let mut session = Session::default();
        let mut offset = 0;

        while offset < bytes.len() {
            let frame = match classify(bytes, offset, &self.layout) {
                Ok(frame) => frame,
                Err(truncated) => {
                    log.warn(ParseWarning::TruncatedFile {
                        offset: truncated.offset,
                        trailing_bytes: truncated.available,
                        expected: truncated.expected,
                    });
                    log.state = ParseState::DoneTruncated;
                    break;
                }
            };

            state = match (state, frame.kind) {
                (_, FrameKind::MainHeader) => {
                    let session_id = log.main_headers.len() as u32 + 1;
                    let header = self.decode_main_header(&frame, session_id);
                    info!(
                        "Session {} at offset {}: {} '{}' ({})",
                        session_id,
                        frame.offset,
                        header.model_type.name(),
                        header.model_name,
                        header.bind_info.name()
                    );
                    log.main_headers.push(header);
                    session = Session::default();
                    ScanState::ReadingSession(session_id)
                }
                (ScanState::ExpectMainHeader, _) => {
                    return Err(TlmError::MissingMainHeader {
                        offset: frame.offset,
                    });
                }
                (ScanState::ReadingSession(session_id), FrameKind::SupplementalHeader) => {
                    let header = decode_supplemental_header(&frame, session_id);
                    debug!(
                        "Session {} declares sensor 0x{:02X} ({})",
                        session_id, header.sensor_type, header.sensor_name
                    );
                    if header.sensor_name != "Unknown" {
                        session.declared.extend(declared_data_tags(header.sensor_type));
                    }
                    log.supplemental_headers.push(header);
                    ScanState::ReadingSession(session_id)
                }
                (ScanState::ReadingSession(session_id), FrameKind::Data(sensor_type)) => {
                    self.decode_data_frame(&frame, session_id, sensor_type, &mut session, &mut log);
                    ScanState::ReadingSession(session_id)
                }
            };

            if let Some(header) = log.main_headers.last_mut() {
                if frame.kind != FrameKind::MainHeader {
                    header.frame_count += 1;
                }
            }

            offset += frame.bytes.len();
        }

        info!(
            "Parsed {} sessions, {} data records, {} warnings",
            log.session_count(),
            log.data_records.len(),
            log.warnings.len()
        );

        Ok(log)
    }

    fn decode_main_header(&self, frame: &RawFrame<'_>, session_id: u32) -> MainHeaderRecord {
        let bind_info = BindInfo::from_byte(frame.bytes[TLM_HEADER_SUBTYPE_OFFSET]);
        let name_bytes = frame.bytes.get(bind_info.model_name_span()).unwrap_or_default();
        let end = name_bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);

        MainHeaderRecord {
            session_id,
            offset: frame.offset,
            model_type: ModelType::from_byte(frame.bytes[TLM_HEADER_TYPE_OFFSET]),
            bind_info,
            model_name: String::from_utf8_lossy(&name_bytes[..end]).into_owned(),
            frame_count: 0,
        }
    }

    fn decode_data_frame(
        &self,
        frame: &RawFrame<'_>,
        session_id: u32,
        sensor_type: u8,
        session: &mut Session,
        log: &mut TlmLog,
    ) {
        let mut reader = ByteReader::new(frame.bytes);
        let ticks = match reader.read_u32(ByteOrder::Little) {
            Ok(ticks) => ticks,
            Err(e) => {
                log.warn(ParseWarning::OutOfBounds {
                    frame_offset: frame.offset,
                    detail: e.to_string(),
                });
                return;
            }
        };
        let timestamp_ms = u64::from(ticks) * self.layout.timestamp_tick_ms;
        let payload = frame.payload();

        let unknown = |log: &mut TlmLog| {
            log.data_records.push(DataRecord {
                session_id,
                offset: frame.offset,
                timestamp_ms,
                sensor_type,
                payload: SensorPayload::Unknown {
                    raw: payload.to_vec(),
                },
            });
        };

        let Some(codec) = self.registry.get(sensor_type) else {
            // One warning per tag and session; every frame keeps its record
            if session.reported.insert(sensor_type) {
                log.warn(ParseWarning::UnknownSensorType {
                    offset: frame.offset,
                    sensor_type,
                });
            }
            unknown(log);
            return;
        };

        if !session.declared.contains(&sensor_type) {
            if session.reported.insert(sensor_type) {
                log.warn(ParseWarning::UndeclaredSensor {
                    session_id,
                    sensor_type,
                });
            }
            if self.require_declared_sensors {
                unknown(log);
                return;
            }
        }

        match codec.decode(payload) {
            Ok(fields) => log.data_records.push(DataRecord {
                session_id,
                offset: frame.offset,
                timestamp_ms,
                sensor_type,
                payload: SensorPayload::Decoded {
                    sensor: codec.name,
                    fields,
                },
            }),
            Err(e) => log.warn(ParseWarning::OutOfBounds {
                frame_offset: frame.offset,
                detail: format!("{} codec: {}", codec.name, e),
            }),
        }
    }
}

fn decode_supplemental_header(frame: &RawFrame<'_>, session_id: u32) -> SupplementalHeaderRecord {
    let sensor_type = frame.bytes[TLM_HEADER_TYPE_OFFSET];
    let repeat = frame.bytes[TLM_HEADER_SUBTYPE_OFFSET];

    SupplementalHeaderRecord {
        session_id,
        offset: frame.offset,
        sensor_type,
        sensor_name: declared_sensor_name(sensor_type, repeat),
        setup: frame.bytes.get(TLM_SENSOR_SETUP).unwrap_or_default().to_vec(),
    }
}

/// Parse a TLM file image with the default layout and the built-in codecs
///
/// # Examples
///
/// ```
/// let log = spektrum_tlm::parse(&[]).unwrap();
/// assert!(log.data_records.is_empty());
/// ```
pub fn parse(bytes: &[u8]) -> Result<TlmLog> {
    let registry = CodecRegistry::spektrum();
    TlmParser::new(FrameLayout::default(), &registry).parse(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlm::codec::{FieldDescriptor, Layout, SensorCodec};
    use crate::tlm::fixtures::*;
    use crate::tlm::reader::Width;

    fn float(record: &DataRecord, name: &str) -> f64 {
        match record.fields().and_then(|fields| fields.get(name)) {
            Some(Some(value)) => value.as_f64().unwrap(),
            other => panic!("{name} has no value: {other:?}"),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn test_empty_file() {
        let log = parse(&[]).unwrap();
        assert_eq!(log.state, ParseState::Done);
        assert_eq!(log.session_count(), 0);
        assert!(log.warnings.is_empty());
    }

    #[test]
    fn test_esc_reading() {
        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(100, esc_payload(1240, 110)),
        ]);
        let log = parse(&bytes).unwrap();

        assert_eq!(log.state, ParseState::Done);
        assert_eq!(log.data_records.len(), 1);
        let record = &log.data_records[0];
        assert_eq!(record.session_id, 1);
        assert_eq!(record.offset, 72);
        assert_eq!(record.timestamp_ms, 1000);
        assert_close(float(record, "esc_vInput"), 12.40);
        assert_close(float(record, "esc_throttle_%"), 55.0);
        assert_eq!(record.fields().unwrap()["esc_rpm"], None);
        assert!(log.warnings.is_empty());
    }

    #[test]
    fn test_main_header_fields() {
        let bytes = file(&[main_header(0x01, 0x00, "Blade 230S"), data_frame(1, esc_payload(1, 1))]);
        let log = parse(&bytes).unwrap();

        let header = &log.main_headers[0];
        assert_eq!(header.model_type, ModelType::Helicopter);
        assert_eq!(header.bind_info, BindInfo::IXxx);
        assert_eq!(header.model_name, "Blade 230S");
        assert_eq!(header.frame_count, 1);
    }

    #[test]
    fn test_supplemental_header_record() {
        let bytes = file(&[default_main_header(), supplemental_header(0x7E)]);
        let log = parse(&bytes).unwrap();

        let header = &log.supplemental_headers[0];
        assert_eq!(header.session_id, 1);
        assert_eq!(header.offset, 36);
        assert_eq!(header.sensor_name, "RPM Sensor");
        assert_eq!(header.setup.len(), 15);
    }

    #[test]
    fn test_sessions_partition_records() {
        let bytes = file(&[
            default_main_header(),
            data_frame(1, esc_payload(100, 10)),
            data_frame(2, esc_payload(200, 20)),
            main_header(0x02, 0xB2, "Glider"),
            data_frame(1, esc_payload(300, 30)),
        ]);
        let log = parse(&bytes).unwrap();

        assert_eq!(log.session_count(), 2);
        assert_eq!(log.main_headers[1].session_id, 2);
        assert_eq!(log.main_headers[0].frame_count, 2);
        assert_eq!(log.main_headers[1].frame_count, 1);
        assert_eq!(log.session_records(1).count(), 2);
        assert_eq!(log.session_records(2).count(), 1);
        assert!(log
            .session_records(2)
            .all(|record| record.offset > log.main_headers[1].offset));
    }

    #[test]
    fn test_unknown_sensor_preserved() {
        let mut raw = [0u8; 16];
        raw[0] = 0x55;
        raw[1] = 0x01;
        raw[15] = 0xAB;
        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(1, raw),
            data_frame(2, raw),
            data_frame(3, esc_payload(1240, 110)),
        ]);
        let log = parse(&bytes).unwrap();

        assert_eq!(log.data_records.len(), 3);
        assert!(log.data_records[0].is_unknown());
        assert_eq!(
            log.data_records[0].payload,
            SensorPayload::Unknown { raw: raw.to_vec() }
        );
        assert!(!log.data_records[2].is_unknown());
        assert_eq!(
            log.warnings,
            vec![ParseWarning::UnknownSensorType {
                offset: 72,
                sensor_type: 0x55
            }]
        );
    }

    #[test]
    fn test_truncated_tail() {
        let mut bytes = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(1, esc_payload(1240, 110)),
        ]);
        bytes.extend_from_slice(&[0x01, 0x02, 0x03]);
        let log = parse(&bytes).unwrap();

        assert_eq!(log.state, ParseState::DoneTruncated);
        assert!(log.is_truncated());
        assert_eq!(log.data_records.len(), 1);
        assert_eq!(
            log.warnings,
            vec![ParseWarning::TruncatedFile {
                offset: 92,
                trailing_bytes: 3,
                expected: 20
            }]
        );
    }

    #[test]
    fn test_trailing_bytes_only_flag_truncation() {
        let frames = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(100, esc_payload(1240, 110)),
            data_frame(110, esc_payload(1250, 112)),
        ]);
        let clean = parse(&frames).unwrap();

        for extra in 0..TLM_DATA_FRAME_SIZE {
            let mut bytes = frames.clone();
            bytes.extend(std::iter::repeat(0xA5).take(extra));
            let log = parse(&bytes).unwrap();

            assert_eq!(log.data_records, clean.data_records, "{extra} trailing bytes");
            assert_eq!(log.is_truncated(), extra > 0, "{extra} trailing bytes");
            assert_eq!(log.warnings.len(), usize::from(extra > 0));
        }
    }

    #[test]
    fn test_missing_main_header() {
        let bytes = file(&[data_frame(1, esc_payload(1240, 110))]);
        let result = parse(&bytes);
        assert!(matches!(result, Err(TlmError::MissingMainHeader { offset: 0 })));
    }

    #[test]
    fn test_supplemental_before_main_header() {
        let bytes = file(&[supplemental_header(0x20), default_main_header()]);
        assert!(matches!(parse(&bytes), Err(TlmError::MissingMainHeader { .. })));
    }

    #[test]
    fn test_invalid_layout_is_fatal() {
        let registry = CodecRegistry::spektrum();
        let layout = FrameLayout {
            data_frame_size: 0,
            ..FrameLayout::default()
        };
        let result = TlmParser::new(layout, &registry).parse(&default_main_header());
        assert!(matches!(result, Err(TlmError::InvalidLayout(_))));
    }

    #[test]
    fn test_frame_size_from_layout() {
        let registry = CodecRegistry::spektrum();
        let layout = FrameLayout {
            data_frame_size: 24,
            ..FrameLayout::default()
        };
        let mut wide = data_frame(100, esc_payload(1240, 110));
        wide.extend_from_slice(&[0u8; 4]);
        let bytes = file(&[default_main_header(), wide.clone(), wide]);

        let log = TlmParser::new(layout, &registry).parse(&bytes).unwrap();
        let narrow = parse(&file(&[
            default_main_header(),
            data_frame(100, esc_payload(1240, 110)),
        ]))
        .unwrap();

        assert_eq!(log.state, ParseState::Done);
        assert_eq!(log.data_records.len(), 2);
        assert_eq!(log.data_records[1].offset, 60);
        assert_eq!(log.data_records[0].payload, narrow.data_records[0].payload);
    }

    #[test]
    fn test_field_read_past_frame_skips_frame() {
        const WIDE: &[FieldDescriptor] =
            &[FieldDescriptor::int("wide", 14, Width::Four, ByteOrder::Big)];
        let mut registry = CodecRegistry::spektrum();
        registry.register(SensorCodec {
            sensor_type: 0x20,
            name: "Wide",
            layout: Layout::Fields(WIDE),
        });

        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(1, esc_payload(1240, 110)),
            data_frame(2, esc_payload(1240, 110)),
        ]);
        let log = TlmParser::new(FrameLayout::default(), &registry)
            .parse(&bytes)
            .unwrap();

        assert!(log.data_records.is_empty());
        assert_eq!(log.warnings.len(), 2);
        assert!(matches!(
            log.warnings[0],
            ParseWarning::OutOfBounds { frame_offset: 72, .. }
        ));
        assert_eq!(log.main_headers[0].frame_count, 3);
    }

    #[test]
    fn test_require_declared_sensors() {
        let registry = CodecRegistry::spektrum();
        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x7F),
            data_frame(1, esc_payload(1240, 110)),
            data_frame(2, esc_payload(1240, 110)),
        ]);

        let strict = TlmParser::new(FrameLayout::default(), &registry)
            .require_declared_sensors(true)
            .parse(&bytes)
            .unwrap();
        assert!(strict.data_records.iter().all(DataRecord::is_unknown));
        assert_eq!(
            strict.warnings,
            vec![ParseWarning::UndeclaredSensor {
                session_id: 1,
                sensor_type: 0x20
            }]
        );

        let lenient = TlmParser::new(FrameLayout::default(), &registry)
            .parse(&bytes)
            .unwrap();
        assert_eq!(lenient.data_records.len(), 2);
        assert!(lenient.data_records.iter().all(|r| !r.is_unknown()));
        assert_eq!(
            lenient.warnings,
            vec![ParseWarning::UndeclaredSensor {
                session_id: 1,
                sensor_type: 0x20
            }]
        );
    }

    #[test]
    fn test_gps_declaration_covers_status_frames() {
        let registry = CodecRegistry::spektrum();
        let mut status = [0u8; 16];
        status[0] = 0x17;
        let mut location = [0u8; 16];
        location[0] = 0x16;
        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x16),
            supplemental_header(0x17),
            data_frame(1, location),
            data_frame(1, status),
        ]);
        let log = TlmParser::new(FrameLayout::default(), &registry)
            .require_declared_sensors(true)
            .parse(&bytes)
            .unwrap();

        assert_eq!(log.data_records.len(), 2);
        assert!(log.data_records.iter().all(|r| !r.is_unknown()));
        assert_eq!(log.data_records[1].sensor_type, 0x17);
        assert!(log.warnings.is_empty());
    }

    #[test]
    fn test_unknown_tag_not_reported_as_undeclared() {
        let registry = CodecRegistry::spektrum();
        let mut raw = [0u8; 16];
        raw[0] = 0x55;
        let bytes = file(&[default_main_header(), data_frame(1, raw)]);
        let log = TlmParser::new(FrameLayout::default(), &registry)
            .require_declared_sensors(true)
            .parse(&bytes)
            .unwrap();

        assert!(log.data_records[0].is_unknown());
        assert_eq!(
            log.warnings,
            vec![ParseWarning::UnknownSensorType {
                offset: 36,
                sensor_type: 0x55
            }]
        );
    }

    #[test]
    fn test_short_main_header_is_truncation() {
        let header = default_main_header();
        let log = parse(&header[..30]).unwrap();

        assert_eq!(log.state, ParseState::DoneTruncated);
        assert_eq!(log.session_count(), 0);
        assert_eq!(
            log.warnings,
            vec![ParseWarning::TruncatedFile {
                offset: 0,
                trailing_bytes: 30,
                expected: 36
            }]
        );
    }

    #[test]
    fn test_oversized_tick_is_fatal() {
        let registry = CodecRegistry::spektrum();
        let layout = FrameLayout {
            timestamp_tick_ms: u64::MAX,
            ..FrameLayout::default()
        };
        let bytes = file(&[default_main_header(), data_frame(u32::MAX, esc_payload(1, 1))]);
        let result = TlmParser::new(layout, &registry).parse(&bytes);
        assert!(matches!(result, Err(TlmError::InvalidLayout(_))));
    }

    #[test]
    fn test_declarations_reset_per_session() {
        let registry = CodecRegistry::spektrum();
        let bytes = file(&[
            default_main_header(),
            supplemental_header(0x20),
            data_frame(1, esc_payload(1240, 110)),
            default_main_header(),
            data_frame(1, esc_payload(1240, 110)),
        ]);
        let log = TlmParser::new(FrameLayout::default(), &registry)
            .require_declared_sensors(true)
            .parse(&bytes)
            .unwrap();

        assert!(!log.data_records[0].is_unknown());
        assert!(log.data_records[1].is_unknown());
    }

    #[test]
    fn test_from_config() {
        let registry = CodecRegistry::spektrum();
        let config = Config::from_toml("[decoding]\nrequire_declared_sensors = true\n").unwrap();
        let parser = TlmParser::from_config(&config, &registry);
        assert!(parser.require_declared_sensors);
        assert_eq!(parser.layout(), &FrameLayout::default());
    }

    #[test]
    fn test_custom_tick_length() {
        let registry = CodecRegistry::spektrum();
        let layout = FrameLayout {
            timestamp_tick_ms: 1,
            ..FrameLayout::default()
        };
        let bytes = file(&[default_main_header(), data_frame(250, esc_payload(1, 1))]);
        let log = TlmParser::new(layout, &registry).parse(&bytes).unwrap();
        assert_eq!(log.data_records[0].timestamp_ms, 250);
    }
}
