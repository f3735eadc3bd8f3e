//! OFDM front-end processing
//!
//! Receive: cyclic-prefix removal and DFT per (slot, symbol), with the DFT
//! window advanced into the prefix by `cp / ofdm_offset_divisor` samples.
//! Transmit: IDFT and cyclic-prefix insertion by copying the symbol tail.
//! Time-domain buffers hold a whole frame for one antenna.

use crate::dft::{DftKernel, DftSize, Direction};
use crate::resource_grid::FrequencyGrid;
use crate::{check_len, PhyError};
use common::{round_to_i16, FrameParams, C16};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// OFDM modulator / demodulator for one carrier configuration
pub struct OfdmFrontEnd {
    fp: FrameParams,
    kernel: Arc<dyn DftKernel>,
    size: DftSize,
}

impl OfdmFrontEnd {
    /// Bind a DFT kernel to a carrier; fails for FFT sizes outside the supported set
    pub fn new(fp: FrameParams, kernel: Arc<dyn DftKernel>) -> Result<Self, PhyError> {
        fp.validate()?;
        let size = DftSize::from_len(fp.fft_size)?;
        debug!(
            "OFDM front end: fft_size={}, cp0={}, cp={}, kernel={}",
            fp.fft_size,
            fp.nb_prefix_samples0(),
            fp.nb_prefix_samples(),
            kernel.name()
        );
        Ok(Self { fp, kernel, size })
    }

    pub fn frame_params(&self) -> &FrameParams {
        &self.fp
    }

    /// Samples needed for a time-domain buffer spanning `nb_slots` slots
    pub fn buffer_len(&self, nb_slots: u32) -> usize {
        self.fp.slot_offset(nb_slots)
    }

    /// Process one OFDM symbol in either direction
    ///
    /// `time` is a frame-aligned buffer; `freq` holds `fft_size` bins in DFT
    /// order. Forward reads `time` and writes `freq`; Inverse does the reverse.
    pub fn fep(
        &self,
        direction: Direction,
        slot: u32,
        symbol: usize,
        time: &mut [C16],
        freq: &mut [C16],
    ) -> Result<(), PhyError> {
        match direction {
            Direction::Forward => self.demodulate_symbol(slot, symbol, time, freq),
            Direction::Inverse => self.modulate_symbol(slot, symbol, freq, time),
        }
    }

    /// DFT of one received symbol with guard-phase compensation
    pub fn demodulate_symbol(&self, slot: u32, symbol: usize, time: &[C16], freq: &mut [C16]) -> Result<(), PhyError> {
        self.fp.check_slot_symbol(slot, symbol)?;
        let n = self.fp.fft_size;
        check_len("frequency-domain symbol", n, freq.len())?;

        let cp = self.fp.cp_length(slot, symbol);
        let advance = self.fp.guard_advance(slot, symbol);
        let offset = self.fp.slot_offset(slot) + self.fp.symbol_offset_in_slot(slot, symbol) + cp - advance;
        if offset + n > time.len() {
            return Err(PhyError::LengthMismatch {
                what: "time-domain buffer",
                expected: offset + n,
                actual: time.len(),
            });
        }

        self.kernel
            .transform(self.size, Direction::Forward, &time[offset..offset + n], freq, true)?;

        // Undo the linear phase of the early window: W[k] = X[k] e^{-j2pi k d / N}
        if advance != 0 {
            for (k, bin) in freq.iter_mut().enumerate() {
                let phase = 2.0 * PI * ((k * advance) % n) as f64 / n as f64;
                let (sin, cos) = phase.sin_cos();
                let (re, im) = (bin.re as f64, bin.im as f64);
                *bin = C16::new(round_to_i16(re * cos - im * sin), round_to_i16(re * sin + im * cos));
            }
        }
        Ok(())
    }

    /// IDFT of one symbol and prefix insertion
    pub fn modulate_symbol(&self, slot: u32, symbol: usize, freq: &[C16], time: &mut [C16]) -> Result<(), PhyError> {
        self.fp.check_slot_symbol(slot, symbol)?;
        let n = self.fp.fft_size;
        check_len("frequency-domain symbol", n, freq.len())?;

        let cp = self.fp.cp_length(slot, symbol);
        let start = self.fp.slot_offset(slot) + self.fp.symbol_offset_in_slot(slot, symbol);
        if start + cp + n > time.len() {
            return Err(PhyError::LengthMismatch {
                what: "time-domain buffer",
                expected: start + cp + n,
                actual: time.len(),
            });
        }

        let body = start + cp;
        self.kernel
            .transform(self.size, Direction::Inverse, freq, &mut time[body..body + n], true)?;
        time.copy_within(body + n - cp..body + n, start);
        Ok(())
    }

    /// Demodulate every symbol of `slot` for every receive antenna
    ///
    /// Symbols are independent and processed on the rayon pool.
    pub fn demodulate_slot(&self, slot: u32, rx: &[Vec<C16>], grid: &mut FrequencyGrid) -> Result<(), PhyError> {
        check_len("receive antenna buffers", grid.nb_antennas(), rx.len())?;
        check_len("grid symbols", self.fp.symbols_per_slot(), grid.symbols_per_slot())?;
        check_len("grid bins", self.fp.fft_size, grid.fft_size())?;

        let nb_symbols = self.fp.symbols_per_slot();
        let n = self.fp.fft_size;
        let symbols: Vec<Vec<C16>> = (0..rx.len() * nb_symbols)
            .into_par_iter()
            .map(|job| {
                let (antenna, symbol) = (job / nb_symbols, job % nb_symbols);
                let mut freq = vec![C16::new(0, 0); n];
                self.demodulate_symbol(slot, symbol, &rx[antenna], &mut freq)?;
                Ok(freq)
            })
            .collect::<Result<_, PhyError>>()?;

        for (job, freq) in symbols.into_iter().enumerate() {
            let (antenna, symbol) = (job / nb_symbols, job % nb_symbols);
            for (dst, src) in grid.symbol_mut(antenna, symbol).iter_mut().zip(freq) {
                *dst = src;
            }
        }
        debug!("Demodulated slot {} ({} antennas x {} symbols)", slot, rx.len(), nb_symbols);
        Ok(())
    }

    /// Modulate every symbol of `slot` for every transmit antenna into frame buffers
    pub fn modulate_slot(&self, slot: u32, grid: &FrequencyGrid, tx: &mut [Vec<C16>]) -> Result<(), PhyError> {
        check_len("transmit antenna buffers", grid.nb_antennas(), tx.len())?;
        check_len("grid symbols", self.fp.symbols_per_slot(), grid.symbols_per_slot())?;

        tx.par_iter_mut().enumerate().try_for_each(|(antenna, time)| {
            for symbol in 0..self.fp.symbols_per_slot() {
                let freq: Vec<C16> = grid.symbol(antenna, symbol).iter().copied().collect();
                self.modulate_symbol(slot, symbol, &freq, time)?;
            }
            Ok::<(), PhyError>(())
        })?;
        debug!("Modulated slot {} on {} antennas", slot, tx.len());
        Ok(())
    }
}
