//! Pseudo-random sequence generation and PDSCH scrambling
//! Based on 3GPP TS 38.211 Sections 5.2.1 and 7.3.1.1

use crate::PhyError;
use common::{get_bit, set_bit, Rnti};
use tracing::debug;

/// Number of initial LFSR outputs discarded (Nc)
const GOLD_NC: usize = 1600;

/// Length-31 Gold sequence generator
///
/// c(n) = (x1(n + Nc) + x2(n + Nc)) mod 2 with x1 seeded to 1 and x2 to `c_init`.
#[derive(Debug, Clone)]
pub struct GoldSequence {
    x1: u32,
    x2: u32,
}

impl GoldSequence {
    /// Create a generator positioned at c(0)
    pub fn new(c_init: u32) -> Self {
        let mut gold = Self {
            x1: 1,
            x2: c_init & 0x7FFF_FFFF,
        };
        for _ in 0..GOLD_NC {
            gold.advance();
        }
        gold
    }

    #[inline]
    fn advance(&mut self) {
        // x1(n+31) = (x1(n+3) + x1(n)) mod 2
        let x1_new = ((self.x1 >> 3) ^ self.x1) & 1;
        self.x1 = (self.x1 >> 1) | (x1_new << 30);

        // x2(n+31) = (x2(n+3) + x2(n+2) + x2(n+1) + x2(n)) mod 2
        let x2_new = ((self.x2 >> 3) ^ (self.x2 >> 2) ^ (self.x2 >> 1) ^ self.x2) & 1;
        self.x2 = (self.x2 >> 1) | (x2_new << 30);
    }

    /// Next sequence bit
    #[inline]
    pub fn next_bit(&mut self) -> u8 {
        let c = (self.x1 ^ self.x2) & 1;
        self.advance();
        c as u8
    }

    /// Skip `n` sequence bits
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Next `len` sequence bits, one per byte
    pub fn take_bits(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_bit()).collect()
    }
}

/// Scrambling initialisation for codeword `q`: n_RNTI * 2^15 + q * 2^14 + n_ID
pub fn scrambling_c_init(rnti: Rnti, codeword_index: u8, n_id: u16) -> u32 {
    ((rnti.value() as u32) << 15) + ((codeword_index as u32) << 14) + n_id as u32
}

fn check_params(codeword_index: u8, n_id: u16) -> Result<(), PhyError> {
    if codeword_index > 1 {
        return Err(PhyError::InvalidCodewords(format!(
            "codeword index {} (0 or 1 expected)",
            codeword_index
        )));
    }
    if n_id > 1023 {
        return Err(PhyError::InvalidConfiguration(format!(
            "data scrambling identity {} exceeds 1023",
            n_id
        )));
    }
    Ok(())
}

/// Scramble the first `num_bits` bits of a packed buffer in place
pub fn scramble_in_place(
    bits: &mut [u8],
    num_bits: usize,
    codeword_index: u8,
    n_id: u16,
    rnti: Rnti,
) -> Result<(), PhyError> {
    check_params(codeword_index, n_id)?;
    if bits.len() * 8 < num_bits {
        return Err(PhyError::LengthMismatch {
            what: "scrambling input",
            expected: (num_bits + 7) / 8,
            actual: bits.len(),
        });
    }

    let mut gold = GoldSequence::new(scrambling_c_init(rnti, codeword_index, n_id));
    for i in 0..num_bits {
        let c = gold.next_bit();
        if c != 0 {
            set_bit(bits, i, get_bit(bits, i) ^ 1);
        }
    }

    debug!(
        "Scrambled {} bits: q={}, n_id={}, rnti={:#06x}",
        num_bits,
        codeword_index,
        n_id,
        rnti.value()
    );
    Ok(())
}

/// Scramble the first `num_bits` bits of a packed buffer
pub fn scramble(
    bits: &[u8],
    num_bits: usize,
    codeword_index: u8,
    n_id: u16,
    rnti: Rnti,
) -> Result<Vec<u8>, PhyError> {
    let mut out = bits.to_vec();
    scramble_in_place(&mut out, num_bits, codeword_index, n_id, rnti)?;
    Ok(out)
}

/// Descramble soft bits in place by negating every LLR whose mask bit is 1
pub fn descramble_llrs(
    llrs: &mut [i16],
    codeword_index: u8,
    n_id: u16,
    rnti: Rnti,
) -> Result<(), PhyError> {
    check_params(codeword_index, n_id)?;

    let mut gold = GoldSequence::new(scrambling_c_init(rnti, codeword_index, n_id));
    for llr in llrs.iter_mut() {
        if gold.next_bit() != 0 {
            *llr = llr.saturating_neg();
        }
    }

    debug!(
        "Descrambled {} LLRs: q={}, n_id={}, rnti={:#06x}",
        llrs.len(),
        codeword_index,
        n_id,
        rnti.value()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_c_init() {
        assert_eq!(scrambling_c_init(Rnti::SI, 0, 0), 0xFFFF << 15);
        assert_eq!(scrambling_c_init(Rnti::new(1), 1, 5), (1 << 15) + (1 << 14) + 5);
    }

    #[test]
    fn test_zero_seed_sequence_is_x1_only() {
        // with c_init = 0 the x2 register stays zero
        let mut gold = GoldSequence::new(0);
        assert_eq!(gold.x2, 0);
        let bits = gold.take_bits(64);
        assert!(bits.iter().any(|&b| b == 1));
        assert!(bits.iter().any(|&b| b == 0));
    }

    #[test]
    fn test_skip_matches_take() {
        let mut a = GoldSequence::new(0x1234_5678);
        let mut b = a.clone();
        let seq = a.take_bits(100);
        b.skip(37);
        assert_eq!(b.take_bits(63), seq[37..].to_vec());
    }

    #[test]
    fn test_scramble_is_involution() {
        let mut rng = StdRng::seed_from_u64(3);
        let bits: Vec<u8> = (0..336).map(|_| rng.gen()).collect();
        let num_bits = 2688;
        let scrambled = scramble(&bits, num_bits, 0, 0, Rnti::SI).unwrap();
        assert_ne!(scrambled, bits);
        let restored = scramble(&scrambled, num_bits, 0, 0, Rnti::SI).unwrap();
        assert_eq!(restored, bits);
    }

    #[test]
    fn test_sequence_depends_on_codeword() {
        let zeros = vec![0u8; 16];
        let cw0 = scramble(&zeros, 128, 0, 7, Rnti::new(0x4601)).unwrap();
        let cw1 = scramble(&zeros, 128, 1, 7, Rnti::new(0x4601)).unwrap();
        assert_ne!(cw0, cw1);
    }

    #[test]
    fn test_llr_descrambling_matches_hard_bits() {
        let zeros = vec![0u8; 8];
        let mask = scramble(&zeros, 64, 0, 11, Rnti::SI).unwrap();

        let mut llrs = vec![100i16; 64];
        descramble_llrs(&mut llrs, 0, 11, Rnti::SI).unwrap();
        for (i, &llr) in llrs.iter().enumerate() {
            let expected = if get_bit(&mask, i) == 1 { -100 } else { 100 };
            assert_eq!(llr, expected);
        }

        // applying twice restores the sign pattern
        descramble_llrs(&mut llrs, 0, 11, Rnti::SI).unwrap();
        assert!(llrs.iter().all(|&l| l == 100));
    }

    #[test]
    fn test_invalid_parameters() {
        let mut llrs = vec![0i16; 4];
        assert!(descramble_llrs(&mut llrs, 2, 0, Rnti::SI).is_err());
        assert!(scramble(&[0u8], 8, 0, 1024, Rnti::SI).is_err());
        assert!(scramble(&[0u8], 9, 0, 0, Rnti::SI).is_err());
    }
}
