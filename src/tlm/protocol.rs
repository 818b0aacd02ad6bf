//! # TLM Protocol Constants and Types
//!
//! Core definitions for the Spektrum TLM log layout and the records decoded
//! from it.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use chrono::NaiveTime;
use serde::Serialize;

/// Leading `u32` that marks a header frame
pub const TLM_HEADER_MARKER: u32 = 0xFFFF_FFFF;

/// Header frame size (main and supplemental)
pub const TLM_HEADER_FRAME_SIZE: usize = 36;

/// Data frame size
pub const TLM_DATA_FRAME_SIZE: usize = 20;

/// Size of the marker / timestamp word at the start of every frame
pub const TLM_MARKER_SIZE: usize = 4;

/// Byte that appears somewhere in every main header frame
pub const TLM_MAIN_HEADER_SIGNATURE: u8 = b'\'';

/// Length of one data-frame timestamp tick in milliseconds
pub const TLM_TIMESTAMP_TICK_MS: u64 = 10;

/// Header byte holding the model type (main) or sensor type (supplemental)
pub const TLM_HEADER_TYPE_OFFSET: usize = 4;

/// Header byte holding the bind info (main) or repeated sensor type (supplemental)
pub const TLM_HEADER_SUBTYPE_OFFSET: usize = 5;

/// Model name span in a main header when bind info is `0x00`
pub const TLM_MODEL_NAME_LONG: std::ops::Range<usize> = 10..22;

/// Model name span in a main header for every other bind info
pub const TLM_MODEL_NAME_SHORT: std::ops::Range<usize> = 12..22;

/// Telemetry setup block in a supplemental header
pub const TLM_SENSOR_SETUP: std::ops::Range<usize> = 7..22;

/// A decoded physical value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer count or identifier
    Int(i64),
    /// Scaled physical quantity
    Float(f64),
    /// Status flag
    Bool(bool),
    /// Enumerated label
    Text(String),
    /// Time of day (GPS UTC)
    Time(NaiveTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
        }
    }
}

impl Value {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A field reading; `None` means the sensor reported "not measured"
pub type Reading = Option<Value>;

/// Field name to reading, in name order
pub type Fields = BTreeMap<String, Reading>;

/// Aircraft type stored in the main header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelType {
    /// Airplane (`0x00`)
    FixedWing,
    /// Helicopter (`0x01`)
    Helicopter,
    /// Sailplane (`0x02`)
    Glider,
    /// Unlisted type byte
    Unknown(u8),
}

impl ModelType {
    /// Model type from main header byte 4
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => ModelType::FixedWing,
            0x01 => ModelType::Helicopter,
            0x02 => ModelType::Glider,
            other => ModelType::Unknown(other),
        }
    }

    /// Display name as shown on the transmitter
    pub fn name(self) -> &'static str {
        match self {
            ModelType::FixedWing => "Fixed Wing",
            ModelType::Helicopter => "Helicopter",
            ModelType::Glider => "Glider",
            ModelType::Unknown(_) => "Unknown",
        }
    }
}

/// Receiver bind / protocol mode stored in the main header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindInfo {
    /// DSMX, 22 ms frame rate (`0xB2`)
    Dsmx22ms,
    /// iX-series transmitter (`0x00`); the model name starts two bytes earlier
    IXxx,
    /// DSM2, 6000 series (`0x01`)
    Dsm2_6000,
    /// DSM2, 8000 series receiver (`0x02`)
    Dsm2_8000Rx,
    /// DSMX, 8000 series receiver (`0x03`)
    Dsmx8000Rx,
    /// DSMX, 6000 series receiver (`0x04`)
    Dsmx6000Rx,
    /// Unlisted bind byte
    Unknown(u8),
}

impl BindInfo {
    /// Bind info from main header byte 5
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0xB2 => BindInfo::Dsmx22ms,
            0x00 => BindInfo::IXxx,
            0x01 => BindInfo::Dsm2_6000,
            0x02 => BindInfo::Dsm2_8000Rx,
            0x03 => BindInfo::Dsmx8000Rx,
            0x04 => BindInfo::Dsmx6000Rx,
            other => BindInfo::Unknown(other),
        }
    }

    /// Display name as shown on the transmitter
    pub fn name(self) -> &'static str {
        match self {
            BindInfo::Dsmx22ms => "DSMX 22ms",
            BindInfo::IXxx => "iXxx",
            BindInfo::Dsm2_6000 => "DSM2 6000",
            BindInfo::Dsm2_8000Rx => "DSM2 8000 RX",
            BindInfo::Dsmx8000Rx => "DSMX 8000 RX",
            BindInfo::Dsmx6000Rx => "DSMX 6000 RX",
            BindInfo::Unknown(_) => "Unknown",
        }
    }

    /// Span of the model name inside a main header with this bind info
    pub fn model_name_span(self) -> std::ops::Range<usize> {
        match self {
            BindInfo::IXxx => TLM_MODEL_NAME_LONG,
            _ => TLM_MODEL_NAME_SHORT,
        }
    }
}

/// Sensor name declared by a supplemental header
///
/// Both type bytes of the header must agree; anything else is "Unknown".
pub fn declared_sensor_name(type_byte: u8, repeat_byte: u8) -> &'static str {
    if type_byte != repeat_byte {
        return "Unknown";
    }
    match type_byte {
        0x01 => "Volt sensor",
        0x02 => "Temp sensor",
        0x03 => "Amps Sensor",
        0x0A => "Power Box",
        0x11 => "Airspeed Sensor",
        0x12 => "Altitude Sensor",
        0x14 => "G-Force Sensor",
        0x15 => "JetCat Sensor",
        0x16 => "GPS Sensor",
        0x17 => "end of header",
        0x1A => "Gyro Sensor",
        0x20 => "ESC Sensor",
        0x40 => "Vario-S Sensor",
        0x42 => "Smart Battery",
        0x7E => "RPM Sensor",
        0x7F => "RX Telemetry",
        _ => "Unknown",
    }
}

/// Data-frame tags covered by a supplemental header declaring `sensor_type`
///
/// A GPS sensor is declared once (0x16) but logs both location (0x16) and
/// status (0x17) frames. The 0x17 header marks the end of the header block
/// and declares nothing.
pub fn declared_data_tags(sensor_type: u8) -> RangeInclusive<u8> {
    match sensor_type {
        0x16 => 0x16..=0x17,
        #[allow(clippy::reversed_empty_ranges)]
        0x17 => 1..=0,
        other => other..=other,
    }
}

/// One logging session's main header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainHeaderRecord {
    /// Session number, starting at 1 in file order
    pub session_id: u32,

    /// Byte offset of the header frame
    pub offset: usize,

    /// Aircraft type
    pub model_type: ModelType,

    /// Receiver bind mode
    pub bind_info: BindInfo,

    /// Model name as entered on the transmitter
    pub model_name: String,

    /// Frames (supplemental + data) that followed this header in its session
    pub frame_count: usize,
}

/// A sensor declaration from a supplemental header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplementalHeaderRecord {
    pub session_id: u32,

    pub offset: usize,

    /// Declared sensor type tag
    pub sensor_type: u8,

    /// Human readable sensor name
    pub sensor_name: &'static str,

    /// Raw telemetry setup bytes
    pub setup: Vec<u8>,
}

/// Decoded content of one data frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SensorPayload {
    /// Payload decoded by a registered codec
    Decoded {
        /// Codec name
        sensor: &'static str,
        /// Named readings
        fields: Fields,
    },
    /// No codec applied; the 16 payload bytes are kept verbatim
    Unknown {
        raw: Vec<u8>,
    },
}

/// One sensor reading from one data frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    pub session_id: u32,

    /// Byte offset of the data frame
    pub offset: usize,

    /// Milliseconds on the transmitter clock
    pub timestamp_ms: u64,

    /// Sensor type tag (payload byte 0)
    pub sensor_type: u8,

    pub payload: SensorPayload,
}

impl DataRecord {
    /// Decoded fields, or `None` for unknown payloads
    pub fn fields(&self) -> Option<&Fields> {
        match &self.payload {
            SensorPayload::Decoded { fields, .. } => Some(fields),
            SensorPayload::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.payload, SensorPayload::Unknown { .. })
    }
}
