//! # Spektrum Sensor Tables
//!
//! Payload layouts for the sensors a Spektrum transmitter logs. Offsets are
//! relative to the 16-byte sensor payload: byte 0 is the type tag, byte 1 the
//! sensor instance id, bytes 2..16 the readings.
//!
//! Byte order differs per sensor family. PowerBox, Air Speed and Smart
//! Battery frames are little-endian; the rest are big-endian. GPS frames use
//! packed BCD and are decoded by hand.

use chrono::NaiveTime;

use super::codec::{decode_fields, FieldDescriptor, Layout, SensorCodec};
use super::protocol::{Fields, Value};
use super::reader::ByteReader;
use crate::error::Result;

use super::reader::ByteOrder::{Big as BE, Little as LE};
use super::reader::Width::{Four as W4, One as W1, Two as W2};

pub const SENSOR_NO_DATA: u8 = 0x00;
pub const SENSOR_HIGH_VOLTAGE: u8 = 0x01;
pub const SENSOR_TEMPERATURE: u8 = 0x02;
pub const SENSOR_POWERBOX: u8 = 0x0A;
pub const SENSOR_AIRSPEED: u8 = 0x11;
pub const SENSOR_ALTITUDE: u8 = 0x12;
pub const SENSOR_GFORCE: u8 = 0x14;
pub const SENSOR_JETCAT: u8 = 0x15;
pub const SENSOR_GPS_LOCATION: u8 = 0x16;
pub const SENSOR_GPS_STATUS: u8 = 0x17;
pub const SENSOR_GYRO: u8 = 0x1A;
pub const SENSOR_ESC: u8 = 0x20;
pub const SENSOR_VARIO: u8 = 0x40;
pub const SENSOR_SMART_BATTERY: u8 = 0x42;
pub const SENSOR_RECEIVER: u8 = 0x7E;
pub const SENSOR_QOS: u8 = 0x7F;

/// Knots to km/h
const KNOTS_TO_KMH: f64 = 1.852;

const fn sid(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::int(name, 1, W1, BE)
}

const POWERBOX_ALARMS: &[(i64, &str)] = &[
    (0x01, "Voltage_1"),
    (0x02, "Voltage_2"),
    (0x04, "Capacity_1"),
    (0x08, "Capacity_2"),
    (0x10, "RPM?"),
    (0x20, "Temperature?"),
    (0x40, "Reserved_1"),
    (0x80, "Reserved_2"),
];

// 0.01 V and 1 mAh steps
const POWERBOX: &[FieldDescriptor] = &[
    sid("pwrBox_sid"),
    FieldDescriptor::float("pwrBox_volt1_v", 2, W2, LE, 0.01).sentinel(0xFFFF),
    FieldDescriptor::float("pwrBox_volt2_v", 4, W2, LE, 0.01).sentinel(0xFFFF),
    FieldDescriptor::float("pwrBox_capacity1_mAh", 6, W2, LE, 1.0).sentinel(0xFFFF),
    FieldDescriptor::float("pwrBox_capacity2_mAh", 8, W2, LE, 1.0).sentinel(0xFFFF),
    FieldDescriptor::lookup("pwrBox_alarms", 15, POWERBOX_ALARMS, "Unknown"),
];

const AIRSPEED: &[FieldDescriptor] = &[
    sid("airSpeed_sid"),
    FieldDescriptor::float("airSpeed_airspeed_km/h", 2, W2, LE, 1.0).sentinel(0xFFFF),
    FieldDescriptor::float("airSpeed_maxAirspeed_km/h", 4, W2, LE, 1.0).sentinel(0xFFFF),
];

const ALTITUDE: &[FieldDescriptor] = &[
    sid("alt_sid"),
    FieldDescriptor::float("alt_altitude_m", 2, W2, BE, 0.1).sentinel(0xFFFF),
    FieldDescriptor::float("alt_altitude_max_m", 4, W2, BE, 0.1).sentinel(0xFFFF),
];

const fn g_axis(name: &'static str, offset: usize) -> FieldDescriptor {
    FieldDescriptor::float(name, offset, W2, BE, 0.01)
        .signed()
        .sentinel(0x7FFF)
}

// Range is +/-40 G on pro units, +/-8 G on standard ones
const GFORCE: &[FieldDescriptor] = &[
    sid("gForce_sid"),
    g_axis("gForce_x_g", 2),
    g_axis("gForce_y_g", 4),
    g_axis("gForce_z_g", 6),
    g_axis("gForce_x_abs_max_g", 8),
    g_axis("gForce_y_abs_max_g", 10),
    g_axis("gForce_z_max_g", 12),
    g_axis("gForce_z_min_g", 14),
];

const RECEIVER: &[FieldDescriptor] = &[
    sid("rcvr_sid"),
    FieldDescriptor::float("rcvr_msPulse", 2, W2, BE, 1.0).sentinel(0xFFFF),
    FieldDescriptor::float("rcvr_volt_v", 4, W2, BE, 0.01).sentinel(0xFFFF),
    FieldDescriptor::float("rcvr_temp_F", 6, W2, BE, 1.0).signed().sentinel(0x7FFF),
    FieldDescriptor::float("rcvr_dBmA", 8, W1, BE, 1.0).signed().sentinel(0x7F),
    FieldDescriptor::float("rcvr_dBmB", 9, W1, BE, 1.0).signed().sentinel(0x7F),
];

const fn qos_counter(name: &'static str, offset: usize) -> FieldDescriptor {
    FieldDescriptor::int(name, offset, W2, BE).sentinel(0xFFFF)
}

const QOS: &[FieldDescriptor] = &[
    sid("QoS_sid"),
    qos_counter("QoS_A", 2),
    qos_counter("QoS_B", 4),
    qos_counter("QoS_L", 6),
    qos_counter("QoS_R", 8),
    qos_counter("QoS_F", 10),
    qos_counter("QoS_H", 12),
    FieldDescriptor::float("QoS_rxVolts_v", 14, W2, BE, 0.01).sentinel(0xFFFF),
];

const ESC: &[FieldDescriptor] = &[
    sid("esc_sid"),
    FieldDescriptor::float("esc_rpm", 2, W2, BE, 10.0).sentinel(0xFFFF),
    FieldDescriptor::float("esc_vInput", 4, W2, BE, 0.01).sentinel(0xFFFF),
    FieldDescriptor::float("esc_tempFET_C", 6, W2, BE, 0.1).sentinel(0xFFFF),
    FieldDescriptor::float("esc_currentMotor_amp", 8, W2, BE, 0.01).sentinel(0xFFFF),
    // BEC temperature uses the signed sentinel even though it is read unsigned
    FieldDescriptor::float("esc_tempBEC_C", 10, W2, BE, 0.1).sentinel(0x7FFF),
    FieldDescriptor::float("esc_currentBEC_amp", 12, W1, BE, 0.1).sentinel(0xFF),
    FieldDescriptor::float("esc_vBEC", 13, W1, BE, 0.05).sentinel(0xFF),
    FieldDescriptor::float("esc_throttle_%", 14, W1, BE, 0.5).sentinel(0xFF),
    FieldDescriptor::float("esc_powerOut_%", 15, W1, BE, 0.5).sentinel(0xFF),
];

const fn rate_axis(name: &'static str, offset: usize) -> FieldDescriptor {
    FieldDescriptor::float(name, offset, W2, BE, 0.1)
        .signed()
        .sentinel(0x7FFF)
}

const GYRO: &[FieldDescriptor] = &[
    sid("gyro_sid"),
    rate_axis("gyro_gyroX_deg/s", 2),
    rate_axis("gyro_gyroY_deg/s", 4),
    rate_axis("gyro_gyroZ_deg/s", 6),
    rate_axis("gyro_gyroX_abs_max_deg/s", 8),
    rate_axis("gyro_gyroY_abs_max_deg/s", 10),
    rate_axis("gyro_gyroZ_abs_max_deg/s", 12),
];

const VARIO: &[FieldDescriptor] = &[
    sid("vario_sid"),
    rate_axis("vario_altitude_m", 2),
    rate_axis("vario_delta_0250ms_m/s", 4),
    rate_axis("vario_delta_0500ms_m/s", 6),
    rate_axis("vario_delta_1000ms_m/s", 8),
    rate_axis("vario_delta_1500ms_m/s", 10),
    rate_axis("vario_delta_2000ms_m/s", 12),
    rate_axis("vario_delta_3000ms_m/s", 14),
];

const fn cell(name: &'static str, offset: usize) -> FieldDescriptor {
    FieldDescriptor::float(name, offset, W2, LE, 0.001).sentinel(0xFFFF)
}

/// Smart Battery real-time channel (selector 0)
const SMART_BATTERY_REALTIME: &[FieldDescriptor] = &[
    sid("smartBatRT_sid"),
    FieldDescriptor::float("smartBatRT_temp_C", 3, W1, LE, 1.0).signed().sentinel(0x7F),
    FieldDescriptor::float("smartBatRT_dischargeCurrent_mA", 4, W4, LE, 1.0).sentinel(0xFFFF_FFFF),
    FieldDescriptor::float("smartBatRT_battCapacityUse_mAh", 8, W2, LE, 1.0).sentinel(0xFFFF),
    cell("smartBatRT_minCellVoltage_v", 10),
    cell("smartBatRT_maxCellVoltage_v", 12),
];

/// Smart Battery cell-voltage channel (selector 16)
///
/// The temperature shares its byte with the channel selector and the cells
/// start directly after it.
const SMART_BATTERY_CELLS: &[FieldDescriptor] = &[
    sid("smartBatCells_sid"),
    FieldDescriptor::float("smartBatCells_temp_C", 2, W1, LE, 1.0).signed().sentinel(0x7F),
    cell("smartBatCells_cell1_v", 3),
    cell("smartBatCells_cell2_v", 5),
    cell("smartBatCells_cell3_v", 7),
    cell("smartBatCells_cell4_v", 9),
    cell("smartBatCells_cell5_v", 11),
    cell("smartBatCells_cell6_v", 13),
];

const SMART_BATTERY: &[(u8, &[FieldDescriptor])] =
    &[(0, SMART_BATTERY_REALTIME), (16, SMART_BATTERY_CELLS)];

/// Built-in codec table, ascending by tag
pub const SPEKTRUM_CODECS: &[SensorCodec] = &[
    SensorCodec { sensor_type: SENSOR_NO_DATA, name: "No Data", layout: Layout::Empty },
    SensorCodec { sensor_type: SENSOR_HIGH_VOLTAGE, name: "High-Voltage (Internal)", layout: Layout::Empty },
    SensorCodec { sensor_type: SENSOR_TEMPERATURE, name: "Temperature (Internal)", layout: Layout::Empty },
    SensorCodec { sensor_type: SENSOR_POWERBOX, name: "PowerBox", layout: Layout::Fields(POWERBOX) },
    SensorCodec { sensor_type: SENSOR_AIRSPEED, name: "Air Speed", layout: Layout::Fields(AIRSPEED) },
    SensorCodec { sensor_type: SENSOR_ALTITUDE, name: "Altitude", layout: Layout::Fields(ALTITUDE) },
    SensorCodec { sensor_type: SENSOR_GFORCE, name: "GForce", layout: Layout::Fields(GFORCE) },
    SensorCodec { sensor_type: SENSOR_JETCAT, name: "JetCat interface", layout: Layout::Empty },
    SensorCodec { sensor_type: SENSOR_GPS_LOCATION, name: "GPS Location", layout: Layout::Custom(decode_gps_location) },
    SensorCodec { sensor_type: SENSOR_GPS_STATUS, name: "GPS Status", layout: Layout::Custom(decode_gps_status) },
    SensorCodec { sensor_type: SENSOR_GYRO, name: "Gyro", layout: Layout::Fields(GYRO) },
    SensorCodec { sensor_type: SENSOR_ESC, name: "ESC", layout: Layout::Fields(ESC) },
    SensorCodec { sensor_type: SENSOR_VARIO, name: "Vario-S", layout: Layout::Fields(VARIO) },
    SensorCodec {
        sensor_type: SENSOR_SMART_BATTERY,
        name: "Smart Battery",
        layout: Layout::Multiplexed { selector: 2, variants: SMART_BATTERY },
    },
    SensorCodec { sensor_type: SENSOR_RECEIVER, name: "Standard Receiver Telemetry", layout: Layout::Fields(RECEIVER) },
    SensorCodec { sensor_type: SENSOR_QOS, name: "QoS", layout: Layout::Fields(QOS) },
];

/// Read a packed-BCD group as a digit string
///
/// Multi-byte groups are stored least significant byte first. Returns `None`
/// when any nibble is not a decimal digit.
fn bcd_digits(payload: &[u8], offset: usize, len: usize) -> Result<Option<String>> {
    let mut reader = ByteReader::new(payload);
    reader.seek(offset)?;
    let bytes = reader.read_bytes(len)?;

    let mut digits = String::with_capacity(len * 2);
    for byte in bytes.iter().rev() {
        for nibble in [byte >> 4, byte & 0x0F] {
            match char::from_digit(u32::from(nibble), 10) {
                Some(digit) => digits.push(digit),
                None => return Ok(None),
            }
        }
    }
    Ok(Some(digits))
}

/// Split a digit string into `whole.fraction`
fn decimal(digits: &str, whole: usize) -> Option<f64> {
    let (int, frac) = digits.split_at(whole);
    format!("{int}.{frac}").parse().ok()
}

/// `DDMM.MMMM` to decimal degrees
fn degrees_minutes(digits: &str) -> Option<f64> {
    let degrees: f64 = digits[..2].parse().ok()?;
    let minutes = decimal(&digits[2..], 2)?;
    Some(degrees + minutes / 60.0)
}

fn bcd_decimal(payload: &[u8], offset: usize, len: usize, whole: usize) -> Result<Option<f64>> {
    Ok(bcd_digits(payload, offset, len)?.and_then(|d| decimal(&d, whole)))
}

const GPS_LOCATION_SID: FieldDescriptor = sid("gpsLoc_sid");
const GPS_STATUS_SID: FieldDescriptor = sid("gpsStat_sid");

/// GPS flag bits, most significant first
const GPS_FLAGS: [(&str, u8); 7] = [
    ("gpsLoc_isNorth", 7),
    ("gpsLoc_isEast", 6),
    ("gpsLoc_isLongGT99", 5),
    ("gpsLoc_isGpsFixValid", 4),
    ("gpsLoc_isGpsDataReceived", 3),
    ("gpsLoc_is3Dfix", 2),
    ("gpsLoc_isNegAltitude", 1),
];

/// Decode a GPS Location payload (tag 0x16)
///
/// # Errors
///
/// Returns `OutOfBounds` if the payload is shorter than 16 bytes
pub fn decode_gps_location(payload: &[u8]) -> Result<Fields> {
    let mut fields = decode_fields(&[GPS_LOCATION_SID], payload)?;

    let mut reader = ByteReader::new(payload);
    reader.seek(15)?;
    let flags = reader.read_u8()?;
    let flag = |bit: u8| flags & (1 << bit) != 0;

    let altitude = bcd_decimal(payload, 2, 2, 3)?;

    // Hemisphere stays in gpsLoc_isNorth; the magnitude is not signed
    let latitude = bcd_digits(payload, 4, 4)?.and_then(|d| degrees_minutes(&d));

    let longitude = bcd_digits(payload, 8, 4)?
        .and_then(|d| degrees_minutes(&d))
        .map(|lon| if flag(5) { lon + 100.0 } else { lon })
        .map(|lon| if flag(6) { lon } else { -lon });

    let course = bcd_decimal(payload, 12, 2, 3)?;
    let hdop = bcd_decimal(payload, 14, 1, 1)?;

    let readings = [
        ("gpsLoc_altitudeLow_m", altitude),
        ("gpsLoc_latitude_deg", latitude),
        ("gpsLoc_longitude_deg", longitude),
        ("gpsLoc_course", course),
        ("gpsLoc_hdop", hdop),
    ];
    for (name, reading) in readings {
        fields.insert(name.to_string(), reading.map(Value::Float));
    }
    for (name, bit) in GPS_FLAGS {
        fields.insert(name.to_string(), Some(Value::Bool(flag(bit))));
    }

    Ok(fields)
}

/// Decode a GPS Status payload (tag 0x17)
///
/// # Errors
///
/// Returns `OutOfBounds` if the payload is shorter than 10 bytes
pub fn decode_gps_status(payload: &[u8]) -> Result<Fields> {
    let mut fields = decode_fields(&[GPS_STATUS_SID], payload)?;

    let speed = bcd_decimal(payload, 2, 2, 3)?.map(|knots| knots * KNOTS_TO_KMH);

    // HHMMSS.CC
    let utc = bcd_digits(payload, 4, 4)?.and_then(|d| {
        let field = |range: std::ops::Range<usize>| d[range].parse::<u32>().ok();
        NaiveTime::from_hms_milli_opt(field(0..2)?, field(2..4)?, field(4..6)?, field(6..8)? * 10)
    });

    let sats = bcd_digits(payload, 8, 1)?.and_then(|d| d.parse::<i64>().ok());
    let altitude_high = bcd_digits(payload, 9, 1)?
        .and_then(|d| d.parse::<f64>().ok())
        .map(|hundreds| hundreds * 100.0);

    fields.insert("gpsStat_speed_km/h".to_string(), speed.map(Value::Float));
    fields.insert("gpsStat_utc".to_string(), utc.map(Value::Time));
    fields.insert("gpsStat_numSats".to_string(), sats.map(Value::Int));
    fields.insert("gpsStat_altitudeHigh_m".to_string(), altitude_high.map(Value::Float));

    Ok(fields)
}
