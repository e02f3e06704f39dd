//! G.711 A-law expansion to 16-bit linear PCM.

/// Expand one A-law code to a linear sample.
pub fn alaw_decode(code: u8) -> i16 {
    let c = code ^ 0x55;
    let exponent = (c & 0x70) >> 4;
    let mut magnitude = i32::from(c & 0x0F);
    if exponent > 0 {
        magnitude |= 0x10;
    }
    magnitude = (magnitude << 4) | 0x08;
    if exponent > 1 {
        magnitude <<= exponent - 1;
    }
    // Largest magnitude is 0x1F8 << 6 = 32256, within i16.
    let magnitude = magnitude as i16;
    if c < 0x80 { -magnitude } else { magnitude }
}

/// Expand a whole recording. Only the low byte of each value is the code.
pub fn decode_alaw(codes: &[i64]) -> Vec<i64> {
    codes
        .iter()
        .map(|&c| i64::from(alaw_decode((c & 0xFF) as u8)))
        .collect()
}
