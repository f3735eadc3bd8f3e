//! Soft demodulation of equalized PDSCH symbols
//!
//! Max-log LLRs in closed form. Each amplitude ring beyond QPSK needs one
//! channel-magnitude buffer holding the ring boundary on the equalized scale:
//! 16QAM one, 64QAM two, 256QAM three. Output is bit-major within a symbol,
//! positive values favouring bit 0.

use crate::constellation::ring_thresholds;
use crate::{check_len, PhyError};
use common::{saturate_i16, saturate_llr8, shift_round, ModulationScheme, C16};
use tracing::debug;

/// Decision boundaries per resource element, outermost ring first
///
/// `gains` are the equalizer's Q12 per-RE gains and `data_amplitude` the Q15
/// amplitude the transmitter applied to the constellation.
pub fn channel_magnitudes(modulation: ModulationScheme, gains: &[i16], data_amplitude: i16) -> Vec<Vec<i16>> {
    ring_thresholds(modulation)
        .into_iter()
        .map(|threshold| {
            let scaled = threshold as i64 * data_amplitude as i64;
            gains
                .iter()
                .map(|&g| saturate_i16(shift_round(scaled * g as i64, 15 + 12)))
                .collect()
        })
        .collect()
}

/// Quantise demodulator LLRs to the decoder's 8-bit range
pub fn quantize_llrs(llrs: &[i16], shift: u32) -> Vec<i8> {
    llrs.iter()
        .map(|&l| saturate_llr8(shift_round(l as i64, shift) as i32))
        .collect()
}

/// Soft demodulator for one modulation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDemodulator {
    modulation: ModulationScheme,
}

impl SoftDemodulator {
    pub fn new(modulation: ModulationScheme) -> Self {
        Self { modulation }
    }

    pub fn modulation(&self) -> ModulationScheme {
        self.modulation
    }

    /// Channel-magnitude buffers this modulation order consumes
    pub fn nb_magnitudes(&self) -> usize {
        self.modulation.bits_per_symbol() / 2 - 1
    }

    /// Compute `Qm` LLRs per symbol
    pub fn demodulate(&self, symbols: &[C16], magnitudes: &[Vec<i16>]) -> Result<Vec<i16>, PhyError> {
        check_len("channel magnitude buffers", self.nb_magnitudes(), magnitudes.len())?;
        for mag in magnitudes {
            check_len("channel magnitude buffer", symbols.len(), mag.len())?;
        }

        let qm = self.modulation.bits_per_symbol();
        let mut llrs = Vec::with_capacity(symbols.len() * qm);
        let mut distances = [0i32; 2];
        for (i, s) in symbols.iter().enumerate() {
            // b0 / b1: sign of each axis
            let axes = [s.re as i32, s.im as i32];
            llrs.extend(axes.iter().map(|&v| saturate_i16(v as i64)));
            distances.copy_from_slice(&axes);

            // b(2r) / b(2r+1): distance to the ring boundary r
            for mag in magnitudes {
                let m = mag[i] as i32;
                for d in distances.iter_mut() {
                    *d = m - d.abs();
                    llrs.push(saturate_i16(*d as i64));
                }
            }
        }

        debug!(
            "Soft demodulated {} {:?} symbols into {} LLRs",
            symbols.len(),
            self.modulation,
            llrs.len()
        );
        Ok(llrs)
    }
}
