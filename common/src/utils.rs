//! Common Utilities
//!
//! Bit packing and fixed-point helpers shared by every PHY stage

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pack one-bit-per-byte values into bytes (MSB first)
pub fn pack_bits(bits: &[u8]) -> Bytes {
    let mut bytes = BytesMut::with_capacity((bits.len() + 7) / 8);

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= (bit & 1) << (7 - i);
        }
        bytes.put_u8(byte);
    }

    trace!("Packed {} bits into {} bytes", bits.len(), bytes.len());
    bytes.freeze()
}

/// Unpack the first `num_bits` bits of a byte buffer (MSB first), one bit per byte
pub fn unpack_bits(bytes: &[u8], num_bits: usize) -> Vec<u8> {
    (0..num_bits).map(|i| get_bit(bytes, i)).collect()
}

/// Read bit `index` of an MSB-first packed buffer
#[inline]
pub fn get_bit(bytes: &[u8], index: usize) -> u8 {
    (bytes[index / 8] >> (7 - (index % 8))) & 1
}

/// Write bit `index` of an MSB-first packed buffer
#[inline]
pub fn set_bit(bytes: &mut [u8], index: usize, bit: u8) {
    let mask = 1u8 << (7 - (index % 8));
    if bit & 1 != 0 {
        bytes[index / 8] |= mask;
    } else {
        bytes[index / 8] &= !mask;
    }
}

/// Saturate a wide integer into the signed 16-bit range
#[inline]
pub fn saturate_i16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Saturate a wide integer into the symmetric 8-bit LLR range [-127, 127]
#[inline]
pub fn saturate_llr8(value: i32) -> i8 {
    value.clamp(-127, 127) as i8
}

/// Integer division rounding half away from zero
///
/// `den` must be non-zero.
#[inline]
pub fn div_round(num: i128, den: i128) -> i128 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

/// Arithmetic right shift rounding half away from zero
#[inline]
pub fn shift_round(value: i64, shift: u32) -> i64 {
    if shift == 0 {
        return value;
    }
    let half = 1i64 << (shift - 1);
    if value >= 0 {
        (value + half) >> shift
    } else {
        -((-value + half) >> shift)
    }
}

/// Round a float half away from zero and saturate into i16
#[inline]
pub fn round_to_i16(value: f64) -> i16 {
    // f64::round rounds half away from zero
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        let data = vec![0x12, 0x34, 0xAB, 0xCD];
        assert_eq!(bytes_to_hex(&data), "12 34 ab cd");
    }

    #[test]
    fn test_bit_packing() {
        let bits = vec![1, 0, 1, 0, 1, 0, 1, 0, 1];
        let packed = pack_bits(&bits);
        assert_eq!(packed[0], 0xAA); // 10101010
        assert_eq!(packed[1], 0x80);

        let unpacked = unpack_bits(&packed, bits.len());
        assert_eq!(unpacked, bits);
    }

    #[test]
    fn test_set_get_bit() {
        let mut buf = [0u8; 2];
        set_bit(&mut buf, 0, 1);
        set_bit(&mut buf, 9, 1);
        assert_eq!(buf, [0x80, 0x40]);
        assert_eq!(get_bit(&buf, 9), 1);
        set_bit(&mut buf, 9, 0);
        assert_eq!(buf[1], 0);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(7, -2), -4);
        assert_eq!(shift_round(3, 1), 2);
        assert_eq!(shift_round(-3, 1), -2);
        assert_eq!(round_to_i16(-2.5), -3);
        assert_eq!(round_to_i16(1e9), i16::MAX);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(saturate_i16(40_000), i16::MAX);
        assert_eq!(saturate_i16(-40_000), i16::MIN);
        assert_eq!(saturate_llr8(-300), -127);
        assert_eq!(saturate_llr8(12), 12);
    }
}
