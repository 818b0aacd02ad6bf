//! # Sensor Codec Registry
//!
//! Maps a sensor type tag to the description of its payload layout.
//!
//! Most sensors are described purely by data: an ordered list of
//! [`FieldDescriptor`]s giving offset, width, byte order, scale and the raw
//! sentinel that means "not measured". Sensors whose payload cannot be
//! expressed that way (BCD-encoded GPS frames) plug in a decode function.
//! The built-in Spektrum tables live in [`super::sensors`].

use std::collections::BTreeMap;

use super::protocol::{Fields, Reading, Value};
use super::reader::{ByteOrder, ByteReader, Width};
use super::sensors::SPEKTRUM_CODECS;
use crate::error::Result;

/// How a raw integer becomes a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// `raw * scale + bias` as a float
    Float,
    /// The raw integer itself
    Int,
    /// Label from an exact-match table, `default` when no entry matches
    Lookup {
        table: &'static [(i64, &'static str)],
        default: &'static str,
    },
}

/// Location and conversion of one named field inside a sensor payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    /// Column name of the decoded value
    pub name: &'static str,
    /// Byte offset within the 16-byte sensor payload
    pub offset: usize,
    pub width: Width,
    pub order: ByteOrder,
    /// Two's complement when true
    pub signed: bool,
    pub scale: f64,
    pub bias: f64,
    /// Raw value reserved for "not measured"
    pub sentinel: Option<i64>,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Unsigned float field with the given scale and no sentinel
    pub const fn float(
        name: &'static str,
        offset: usize,
        width: Width,
        order: ByteOrder,
        scale: f64,
    ) -> Self {
        Self {
            name,
            offset,
            width,
            order,
            signed: false,
            scale,
            bias: 0.0,
            sentinel: None,
            kind: FieldKind::Float,
        }
    }

    /// Unsigned integer field with no sentinel
    pub const fn int(name: &'static str, offset: usize, width: Width, order: ByteOrder) -> Self {
        Self {
            name,
            offset,
            width,
            order,
            signed: false,
            scale: 1.0,
            bias: 0.0,
            sentinel: None,
            kind: FieldKind::Int,
        }
    }

    /// Single-byte field mapped through a label table
    pub const fn lookup(
        name: &'static str,
        offset: usize,
        table: &'static [(i64, &'static str)],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            offset,
            width: Width::One,
            order: ByteOrder::Big,
            signed: false,
            scale: 1.0,
            bias: 0.0,
            sentinel: None,
            kind: FieldKind::Lookup { table, default },
        }
    }

    /// Interpret the field as two's complement
    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Reserve a raw value for "not measured"
    pub const fn sentinel(mut self, raw: i64) -> Self {
        self.sentinel = Some(raw);
        self
    }

    /// Add a constant after scaling
    pub const fn bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    /// Decode this field from a sensor payload
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the field does not fit in `payload`
    pub fn decode(&self, payload: &[u8]) -> Result<Reading> {
        let mut reader = ByteReader::new(payload);
        reader.seek(self.offset)?;
        let raw = reader.read_int(self.width, self.order, self.signed)?;

        if self.sentinel == Some(raw) {
            return Ok(None);
        }

        let value = match self.kind {
            FieldKind::Float => Value::Float(raw as f64 * self.scale + self.bias),
            FieldKind::Int => Value::Int(raw),
            FieldKind::Lookup { table, default } => {
                let label = table
                    .iter()
                    .find(|(key, _)| *key == raw)
                    .map_or(default, |(_, label)| *label);
                Value::Text(label.to_string())
            }
        };
        Ok(Some(value))
    }
}

/// Decode every descriptor into a field map
///
/// # Errors
///
/// Fails on the first descriptor that does not fit in `payload`
pub fn decode_fields(descriptors: &[FieldDescriptor], payload: &[u8]) -> Result<Fields> {
    let mut fields = Fields::new();
    for descriptor in descriptors {
        fields.insert(descriptor.name.to_string(), descriptor.decode(payload)?);
    }
    Ok(fields)
}

/// Hand-written decoder for payloads that are not a flat field table
pub type CustomDecoder = fn(&[u8]) -> Result<Fields>;

/// Payload structure of one sensor type
#[derive(Debug, Clone, Copy)]
pub enum Layout {
    /// Known sensor that carries no decodable fields
    Empty,
    /// Flat field table
    Fields(&'static [FieldDescriptor]),
    /// Field table chosen by the byte at `selector`; unmatched selectors decode to nothing
    Multiplexed {
        selector: usize,
        variants: &'static [(u8, &'static [FieldDescriptor])],
    },
    Custom(CustomDecoder),
}

/// Decoding entry for one sensor type tag
#[derive(Debug, Clone, Copy)]
pub struct SensorCodec {
    /// Payload byte 0 value handled by this codec
    pub sensor_type: u8,
    /// Display name of the sensor
    pub name: &'static str,
    pub layout: Layout,
}

impl SensorCodec {
    /// Decode a 16-byte sensor payload
    ///
    /// # Arguments
    ///
    /// * `payload` - Data frame bytes after the timestamp (tag at index 0)
    ///
    /// # Returns
    ///
    /// * `Result<Fields>` - Named readings, `None` where the sentinel was seen
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if a field lies outside the payload
    pub fn decode(&self, payload: &[u8]) -> Result<Fields> {
        match self.layout {
            Layout::Empty => Ok(Fields::new()),
            Layout::Fields(descriptors) => decode_fields(descriptors, payload),
            Layout::Multiplexed { selector, variants } => {
                let mut reader = ByteReader::new(payload);
                reader.seek(selector)?;
                let channel = reader.read_u8()?;
                match variants.iter().find(|(key, _)| *key == channel) {
                    Some((_, descriptors)) => decode_fields(descriptors, payload),
                    None => Ok(Fields::new()),
                }
            }
            Layout::Custom(decode) => decode(payload),
        }
    }

    /// Field names this codec can produce, where statically known
    pub fn field_names(&self) -> Vec<&'static str> {
        match self.layout {
            Layout::Fields(descriptors) => descriptors.iter().map(|d| d.name).collect(),
            Layout::Multiplexed { variants, .. } => variants
                .iter()
                .flat_map(|(_, descriptors)| descriptors.iter().map(|d| d.name))
                .collect(),
            Layout::Empty | Layout::Custom(_) => Vec::new(),
        }
    }
}

/// Lookup from sensor type tag to codec
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: BTreeMap<u8, SensorCodec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::spektrum()
    }
}

impl CodecRegistry {
    /// Registry with no codecs; every data frame decodes as unknown
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in Spektrum sensor tables
    pub fn spektrum() -> Self {
        let mut registry = Self::empty();
        for codec in SPEKTRUM_CODECS {
            registry.register(*codec);
        }
        registry
    }

    /// Add or replace the codec for `codec.sensor_type`
    ///
    /// Returns the codec previously registered for that tag.
    pub fn register(&mut self, codec: SensorCodec) -> Option<SensorCodec> {
        self.codecs.insert(codec.sensor_type, codec)
    }

    pub fn get(&self, sensor_type: u8) -> Option<&SensorCodec> {
        self.codecs.get(&sensor_type)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Codecs in ascending tag order
    pub fn iter(&self) -> impl Iterator<Item = &SensorCodec> {
        self.codecs.values()
    }
}
