//! UBX initial-position aiding message
//!
//! When the caller supplies a position, a `UBX-MGA-INI-POS_LLH` message is
//! prepended to the assistance payload so the receiver starts from a coarse
//! location instead of a cold search. Frame layout: two sync characters,
//! class, id, little-endian payload length, payload, and the two-byte
//! Fletcher checksum computed over class, id, length and payload.

/// UBX sync characters
const SYNC1: u8 = 0xb5;
const SYNC2: u8 = 0x62;

/// Message class and id for MGA-INI
const CLASS_MGA: u8 = 0x13;
const ID_INI: u8 = 0x40;

/// Altitude used when the caller did not supply one, in metres
pub const DEFAULT_ALT_M: f64 = 0.0;

/// Position accuracy used when the caller did not supply one, in kilometres
pub const DEFAULT_PACC_KM: f64 = 300.0;

/// Builds a framed `UBX-MGA-INI-POS_LLH` message
///
/// Latitude and longitude are scaled to 1e-7 degrees, altitude and accuracy
/// to centimetres, all packed little-endian into the 20-byte payload.
pub fn mga_ini_pos_llh(lat_deg: f64, lon_deg: f64, alt_m: f64, pacc_km: f64) -> Vec<u8> {
    let lat = (lat_deg * 1e7) as i32;
    let lon = (lon_deg * 1e7) as i32;
    let alt = (alt_m * 1e2) as i32;
    let acc = (pacc_km * 1e6) as u32;

    let mut payload = Vec::with_capacity(20);
    payload.push(0x01); // type: position in lat/lon/height form
    payload.push(0x00); // message version
    payload.extend_from_slice(&[0x00, 0x00]); // reserved
    payload.extend_from_slice(&lat.to_le_bytes());
    payload.extend_from_slice(&lon.to_le_bytes());
    payload.extend_from_slice(&alt.to_le_bytes());
    payload.extend_from_slice(&acc.to_le_bytes());

    make_frame(CLASS_MGA, ID_INI, &payload)
}

/// Wraps a payload in a UBX frame with sync characters and checksum
fn make_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.push(SYNC1);
    frame.push(SYNC2);
    frame.push(class);
    frame.push(id);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    let (ck_a, ck_b) = checksum(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}

/// 8-bit Fletcher checksum over class, id, length and payload
fn checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}
