//! Script-number encoding.
//!
//! Amounts inside unlocking scripts are pushed as little-endian
//! sign-magnitude integers with no redundant trailing bytes, which is what
//! `OP_BIN2NUM` and the arithmetic opcodes consume.

/// Encode `value` as a minimal little-endian sign-magnitude byte string.
///
/// Zero encodes as the empty string.
pub fn encode_script_number(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    // The top bit of the last byte is the sign; add a byte if it is taken.
    if out.last().map_or(false, |b| b & 0x80 != 0) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        if let Some(last) = out.last_mut() {
            *last |= 0x80;
        }
    }
    out
}

/// Decode a little-endian sign-magnitude byte string.
///
/// Returns `None` when the encoding is longer than 8 bytes.
pub fn decode_script_number(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 9 {
        return None;
    }
    let last = bytes.len() - 1;
    let mut magnitude: u128 = 0;
    for (i, b) in bytes.iter().enumerate() {
        let byte = if i == last { b & 0x7f } else { *b };
        magnitude |= (byte as u128) << (8 * i);
    }
    let magnitude = i64::try_from(magnitude).ok()?;
    if bytes[last] & 0x80 != 0 {
        Some(-magnitude)
    } else {
        Some(magnitude)
    }
}
