//! Constellation tables for 5G NR
//!
//! Gray-mapped QPSK/16QAM/64QAM/256QAM per 3GPP TS 38.211 Section 5.1,
//! stored in Q14 with unit average power. Index bit `i` of a table entry is
//! bit `b(i)` of the symbol's bit group.

use crate::PhyError;
use common::{get_bit, ModulationScheme, C16};
use tracing::debug;

/// Fractional bits of the constellation tables
pub const CONSTELLATION_SHIFT: u32 = 14;

/// 2^14 / sqrt(2)
pub const QPSK_UNIT: i32 = 11585;
/// 2^14 / sqrt(10)
pub const QAM16_UNIT: i32 = 5181;
/// 2^14 / sqrt(42)
pub const QAM64_UNIT: i32 = 2528;
/// 2^14 / sqrt(170)
pub const QAM256_UNIT: i32 = 1257;

/// Amplitude of one PAM axis for the bit group `group`
///
/// `offset` selects the in-phase (0) or quadrature (1) bits.
const fn pam_level(group: u32, pam_bits: u32, offset: u32) -> i32 {
    let mut magnitude: i32 = 1;
    let mut k = pam_bits;
    while k > 1 {
        k -= 1;
        let bit = ((group >> (2 * k + offset)) & 1) as i32;
        magnitude = (1 << (pam_bits - k)) - (1 - 2 * bit) * magnitude;
    }
    let sign = ((group >> offset) & 1) as i32;
    (1 - 2 * sign) * magnitude
}

const fn build_table<const N: usize>(bits_per_symbol: u32, unit: i32) -> [C16; N] {
    let mut table = [C16::new(0, 0); N];
    let pam_bits = bits_per_symbol / 2;
    let mut index = 0;
    while index < N {
        let re = pam_level(index as u32, pam_bits, 0) * unit;
        let im = pam_level(index as u32, pam_bits, 1) * unit;
        table[index] = C16::new(re as i16, im as i16);
        index += 1;
    }
    table
}

pub static QPSK_TABLE: [C16; 4] = build_table::<4>(2, QPSK_UNIT);
pub static QAM16_TABLE: [C16; 16] = build_table::<16>(4, QAM16_UNIT);
pub static QAM64_TABLE: [C16; 64] = build_table::<64>(6, QAM64_UNIT);
pub static QAM256_TABLE: [C16; 256] = build_table::<256>(8, QAM256_UNIT);

/// Constellation table for a modulation scheme
pub fn table(modulation: ModulationScheme) -> &'static [C16] {
    match modulation {
        ModulationScheme::Qpsk => &QPSK_TABLE,
        ModulationScheme::Qam16 => &QAM16_TABLE,
        ModulationScheme::Qam64 => &QAM64_TABLE,
        ModulationScheme::Qam256 => &QAM256_TABLE,
    }
}

/// Distance between adjacent PAM levels divided by two, in Q14
pub fn unit_amplitude(modulation: ModulationScheme) -> i32 {
    match modulation {
        ModulationScheme::Qpsk => QPSK_UNIT,
        ModulationScheme::Qam16 => QAM16_UNIT,
        ModulationScheme::Qam64 => QAM64_UNIT,
        ModulationScheme::Qam256 => QAM256_UNIT,
    }
}

/// Soft-decision boundaries of the amplitude rings, outermost first, in Q14
///
/// QPSK has none; each further pair of bits adds one boundary.
pub fn ring_thresholds(modulation: ModulationScheme) -> Vec<i32> {
    let unit = unit_amplitude(modulation);
    let rings = modulation.bits_per_symbol() / 2 - 1;
    (0..rings).map(|r| unit << (rings - r)).collect()
}

/// Apply a Q15 amplitude to a constellation point
#[inline]
pub fn scale_by_amplitude(point: C16, amplitude: i16) -> C16 {
    C16::new(
        ((point.re as i32 * amplitude as i32) >> 15) as i16,
        ((point.im as i32 * amplitude as i32) >> 15) as i16,
    )
}

/// Map a packed (MSB-first) bit stream to constellation points
pub fn modulate(bits: &[u8], num_bits: usize, modulation: ModulationScheme) -> Result<Vec<C16>, PhyError> {
    let qm = modulation.bits_per_symbol();
    if num_bits % qm != 0 {
        return Err(PhyError::InvalidConfiguration(format!(
            "{} bits is not a multiple of modulation order {}",
            num_bits, qm
        )));
    }
    if bits.len() * 8 < num_bits {
        return Err(PhyError::LengthMismatch {
            what: "modulation input",
            expected: (num_bits + 7) / 8,
            actual: bits.len(),
        });
    }

    let table = table(modulation);
    let symbols: Vec<C16> = (0..num_bits / qm)
        .map(|s| {
            let group = (0..qm).fold(0usize, |acc, i| acc | ((get_bit(bits, s * qm + i) as usize) << i));
            table[group]
        })
        .collect();

    debug!("Modulated {} bits into {} {:?} symbols", num_bits, symbols.len(), modulation);
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn average_power(table: &[C16]) -> f64 {
        table
            .iter()
            .map(|c| (c.re as f64).powi(2) + (c.im as f64).powi(2))
            .sum::<f64>()
            / table.len() as f64
    }

    #[test]
    fn test_unit_average_power() {
        let unit_power = (1u32 << (2 * CONSTELLATION_SHIFT)) as f64;
        for modulation in [
            ModulationScheme::Qpsk,
            ModulationScheme::Qam16,
            ModulationScheme::Qam64,
            ModulationScheme::Qam256,
        ] {
            let ratio = average_power(table(modulation)) / unit_power;
            assert!((ratio - 1.0).abs() < 1e-3, "{:?} power ratio {}", modulation, ratio);
        }
    }

    #[test]
    fn test_qpsk_mapping() {
        // b0 drives I, b1 drives Q, bit 0 maps to the positive axis
        assert_eq!(QPSK_TABLE[0], C16::new(11585, 11585));
        assert_eq!(QPSK_TABLE[1], C16::new(-11585, 11585));
        assert_eq!(QPSK_TABLE[2], C16::new(11585, -11585));
    }

    #[test]
    fn test_qam16_gray_mapping() {
        // b = 0000 -> (1+1j)/sqrt(10), b2 = 1 moves I to the outer ring
        assert_eq!(QAM16_TABLE[0b0000], C16::new(5181, 5181));
        assert_eq!(QAM16_TABLE[0b0100], C16::new(3 * 5181, 5181));
        assert_eq!(QAM16_TABLE[0b1001], C16::new(-5181, 3 * 5181));
    }

    #[test]
    fn test_qam64_levels() {
        // I = (1-2b0)(4-(1-2b2)(2-(1-2b4)))
        assert_eq!(QAM64_TABLE[0].re, 3 * 2528);
        assert_eq!(QAM64_TABLE[0b010000].re, 2528);
        assert_eq!(QAM64_TABLE[0b000100].re, 5 * 2528);
        assert_eq!(QAM64_TABLE[0b010100].re, 7 * 2528);
        assert_eq!(QAM64_TABLE[0b010101].re, -7 * 2528);
    }

    #[test]
    fn test_ring_thresholds() {
        assert!(ring_thresholds(ModulationScheme::Qpsk).is_empty());
        assert_eq!(ring_thresholds(ModulationScheme::Qam16), vec![2 * QAM16_UNIT]);
        assert_eq!(
            ring_thresholds(ModulationScheme::Qam256),
            vec![8 * QAM256_UNIT, 4 * QAM256_UNIT, 2 * QAM256_UNIT]
        );
    }

    #[test]
    fn test_modulate_bit_order() {
        // first two bits 1,0 -> QPSK index 0b01
        let symbols = modulate(&[0b1000_0000], 2, ModulationScheme::Qpsk).unwrap();
        assert_eq!(symbols, vec![QPSK_TABLE[1]]);
        assert!(modulate(&[0], 3, ModulationScheme::Qpsk).is_err());
    }
}
