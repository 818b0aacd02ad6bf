//! Builders for synthetic TLM frames used across the test suites.

use super::protocol::{TLM_HEADER_FRAME_SIZE, TLM_MAIN_HEADER_SIGNATURE};
use super::sensors::SENSOR_ESC;

/// Main header frame: model type, bind info, name and the signature byte
pub fn main_header(model_type: u8, bind_info: u8, name: &str) -> Vec<u8> {
    let mut frame = vec![0u8; TLM_HEADER_FRAME_SIZE];
    frame[..4].copy_from_slice(&[0xFF; 4]);
    frame[4] = model_type;
    frame[5] = bind_info;
    let start = if bind_info == 0x00 { 10 } else { 12 };
    frame[start..start + name.len()].copy_from_slice(name.as_bytes());
    frame[24] = TLM_MAIN_HEADER_SIGNATURE;
    frame
}

/// Main header for a fixed-wing model bound DSMX 22ms
pub fn default_main_header() -> Vec<u8> {
    main_header(0x00, 0xB2, "Trainer")
}

/// Supplemental header declaring one sensor type
pub fn supplemental_header(sensor_type: u8) -> Vec<u8> {
    let mut frame = vec![0u8; TLM_HEADER_FRAME_SIZE];
    frame[..4].copy_from_slice(&[0xFF; 4]);
    frame[4] = sensor_type;
    frame[5] = sensor_type;
    frame
}

/// Data frame: timestamp in 10 ms ticks followed by a 16-byte payload
pub fn data_frame(ticks: u32, payload: [u8; 16]) -> Vec<u8> {
    let mut frame = ticks.to_le_bytes().to_vec();
    frame.extend_from_slice(&payload);
    frame
}

/// ESC payload with only input voltage and throttle measured
pub fn esc_payload(v_input_raw: u16, throttle_raw: u8) -> [u8; 16] {
    let mut payload = [0xFF; 16];
    payload[0] = SENSOR_ESC;
    payload[1] = 0x00;
    payload[4..6].copy_from_slice(&v_input_raw.to_be_bytes());
    payload[10..12].copy_from_slice(&[0x7F, 0xFF]);
    payload[14] = throttle_raw;
    payload
}

/// Concatenate frames into a file image
pub fn file(frames: &[Vec<u8>]) -> Vec<u8> {
    frames.concat()
}
