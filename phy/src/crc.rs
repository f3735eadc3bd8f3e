//! CRC attachment and verification
//! Based on 3GPP TS 38.212 Section 5.1
//!
//! Registers are kept left-aligned in a `u32`: a 24-bit CRC occupies bits
//! 8..31 of the returned value, a 16-bit CRC bits 16..31.

use common::{get_bit, set_bit};
use tracing::trace;

/// CRC24A generator polynomial (x^24 + x^23 + x^18 + x^17 + x^14 + x^11 + x^10 + x^7 + x^6 + x^5 + x^4 + x^3 + x + 1)
pub const CRC24A_POLY: u32 = 0x1864CFB;
/// CRC24A register preset
pub const CRC24A_INIT: u32 = 0xB704CE;
/// CRC24B generator polynomial (x^24 + x^23 + x^6 + x^5 + x + 1)
pub const CRC24B_POLY: u32 = 0x1800063;
/// CRC16 generator polynomial (x^16 + x^12 + x^5 + 1)
pub const CRC16_POLY: u32 = 0x11021;

/// Table-driven MSB-first CRC engine
#[derive(Debug, Clone)]
pub struct CrcEngine {
    table: [u32; 256],
    poly: u32,
    init: u32,
    width: u32,
}

const fn build_table(aligned_poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut reg = (byte as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            reg = if reg & 0x8000_0000 != 0 {
                (reg << 1) ^ aligned_poly
            } else {
                reg << 1
            };
            bit += 1;
        }
        table[byte] = reg;
        byte += 1;
    }
    table
}

impl CrcEngine {
    /// Build an engine for a `width`-bit CRC; `poly` includes the x^width term
    pub const fn new(poly: u32, init: u32, width: u32) -> Self {
        let aligned_poly = (poly & ((1 << width) - 1)) << (32 - width);
        Self {
            table: build_table(aligned_poly),
            poly: aligned_poly,
            init: init << (32 - width),
            width,
        }
    }

    /// CRC width in bits
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Compute the left-aligned CRC register over the first `bit_len` bits of `data`
    ///
    /// Bits past the end of `data` are taken as zero.
    pub fn compute(&self, data: &[u8], bit_len: usize) -> u32 {
        let mut crc = self.init;
        let octets = bit_len / 8;

        for j in 0..octets {
            let byte = data.get(j).copied().unwrap_or(0);
            crc = (crc << 8) ^ self.table[((crc >> 24) as u8 ^ byte) as usize];
        }

        for i in octets * 8..bit_len {
            let feedback = (crc >> 31) ^ padded_bit(data, i) as u32;
            crc <<= 1;
            if feedback != 0 {
                crc ^= self.poly;
            }
        }

        crc
    }

    /// Right-aligned CRC value
    pub fn value(&self, data: &[u8], bit_len: usize) -> u32 {
        self.compute(data, bit_len) >> (32 - self.width)
    }

    /// Check the trailing CRC of a `total_bits` long block
    ///
    /// Returns `false` on mismatch or when the block is shorter than the CRC.
    pub fn verify(&self, data: &[u8], total_bits: usize) -> bool {
        let width = self.width as usize;
        if total_bits < width || data.len() * 8 < total_bits {
            return false;
        }
        let payload_bits = total_bits - width;
        let received = (payload_bits..total_bits)
            .fold(0u32, |acc, i| (acc << 1) | get_bit(data, i) as u32);
        let computed = self.value(data, payload_bits);
        trace!(
            "CRC{} check: computed={:06x} received={:06x}",
            self.width,
            computed,
            received
        );
        computed == received
    }

    /// Append the CRC of the first `bit_len` bits, returning the packed block
    ///
    /// A `data` buffer shorter than `bit_len` is zero-extended.
    pub fn attach(&self, data: &[u8], bit_len: usize) -> Vec<u8> {
        let width = self.width as usize;
        let crc = self.value(data, bit_len);
        let mut out = vec![0u8; (bit_len + width + 7) / 8];
        let copied = data.len().min((bit_len + 7) / 8);
        out[..copied].copy_from_slice(&data[..copied]);
        if bit_len % 8 != 0 {
            // clear stale bits past the payload
            let last = bit_len / 8;
            out[last] &= !(0xFFu8 >> (bit_len % 8));
        }
        for i in 0..width {
            set_bit(&mut out, bit_len + i, ((crc >> (width - 1 - i)) & 1) as u8);
        }
        out
    }
}

fn padded_bit(data: &[u8], index: usize) -> u8 {
    if index / 8 < data.len() {
        get_bit(data, index)
    } else {
        0
    }
}

/// Transport-block CRC
pub static CRC24A: CrcEngine = CrcEngine::new(CRC24A_POLY, CRC24A_INIT, 24);
/// Code-block CRC
pub static CRC24B: CrcEngine = CrcEngine::new(CRC24B_POLY, 0, 24);
/// Small transport-block CRC
pub static CRC16: CrcEngine = CrcEngine::new(CRC16_POLY, 0, 16);

/// CRC24A over `bit_length` bits; the CRC occupies bits 8..31 of the result
pub fn compute_crc24a(data: &[u8], bit_length: usize) -> u32 {
    CRC24A.compute(data, bit_length)
}

/// Verify a block whose last 24 bits carry its CRC24A
pub fn verify_crc24a(data: &[u8], total_bit_length: usize) -> bool {
    CRC24A.verify(data, total_bit_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bitwise_crc(data: &[u8], bit_len: usize, poly: u32, init: u32, width: u32) -> u32 {
        let mask = (1u32 << width) - 1;
        let mut reg = init & mask;
        for i in 0..bit_len {
            let feedback = ((reg >> (width - 1)) & 1) ^ get_bit(data, i) as u32;
            reg = (reg << 1) & mask;
            if feedback != 0 {
                reg ^= poly & mask;
            }
        }
        reg
    }

    #[test]
    fn test_table_matches_bitwise() {
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
        for bit_len in [0, 1, 7, 8, 13, 100, 511, 512] {
            assert_eq!(
                CRC24A.value(&data, bit_len),
                bitwise_crc(&data, bit_len, CRC24A_POLY, CRC24A_INIT, 24),
                "bit_len {}",
                bit_len
            );
            assert_eq!(
                CRC16.value(&data, bit_len),
                bitwise_crc(&data, bit_len, CRC16_POLY, 0, 16)
            );
        }
    }

    #[test]
    fn test_register_alignment() {
        let data = [0x5Au8; 4];
        let reg = compute_crc24a(&data, 32);
        assert_eq!(reg & 0xFF, 0);
        assert_eq!(reg >> 8, CRC24A.value(&data, 32));
    }

    #[test]
    fn test_round_trip_and_single_bit_flips() {
        let mut rng = StdRng::seed_from_u64(42);
        for bit_len in [8usize, 45, 200] {
            let payload: Vec<u8> = (0..(bit_len + 7) / 8).map(|_| rng.gen()).collect();
            let block = CRC24A.attach(&payload, bit_len);
            let total = bit_len + 24;
            assert!(verify_crc24a(&block, total));

            for flip in 0..total {
                let mut corrupted = block.clone();
                corrupted[flip / 8] ^= 0x80 >> (flip % 8);
                assert!(!verify_crc24a(&corrupted, total), "flip {} undetected", flip);
            }
        }
    }

    #[test]
    fn test_crc24b_and_crc16_round_trip() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        assert!(CRC24B.verify(&CRC24B.attach(&payload, 40), 64));
        assert!(CRC16.verify(&CRC16.attach(&payload, 37), 53));
    }

    #[test]
    fn test_short_block_fails() {
        assert!(!verify_crc24a(&[0xFF, 0xFF], 16));
    }

    #[test]
    fn test_short_buffer_is_zero_extended() {
        assert_eq!(compute_crc24a(&[0u8; 1], 64), compute_crc24a(&[0u8; 8], 64));
        assert_eq!(compute_crc24a(&[0xA5], 13), compute_crc24a(&[0xA5, 0x00], 13));
        assert_eq!(CRC16.compute(&[], 20), CRC16.compute(&[0u8; 3], 20));

        let attached = CRC24B.attach(&[0x5A], 40);
        assert_eq!(attached.len(), 8);
        assert_eq!(&attached[..5], &[0x5A, 0, 0, 0, 0]);
        assert!(CRC24B.verify(&attached, 64));
    }
}
