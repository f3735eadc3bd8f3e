//! Carrier / frame configuration snapshot
//!
//! Immutable per scheduling decision; every PHY stage receives it by reference.

use crate::types::{CyclicPrefix, Pci, SubcarrierSpacing};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Subcarriers per resource block
pub const SUBCARRIERS_PER_RB: usize = 12;

/// Maximum antennas / layers handled by the downlink chain
pub const MAX_ANTENNAS: usize = 4;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{nb_rb} resource blocks do not fit in an FFT of size {fft_size}")]
    BandwidthExceedsFft { nb_rb: u16, fft_size: usize },

    #[error("Invalid antenna count {0} (1..=4 supported)")]
    InvalidAntennaCount(usize),

    #[error("Extended cyclic prefix requires 60 kHz subcarrier spacing")]
    ExtendedCpNotAllowed,

    #[error("Slot {slot} out of range (frame has {slots_per_frame} slots)")]
    SlotOutOfRange { slot: u32, slots_per_frame: u32 },

    #[error("Symbol {symbol} out of range (slot has {symbols_per_slot} symbols)")]
    SymbolOutOfRange { symbol: usize, symbols_per_slot: usize },

    #[error("Invalid physical cell identity {0} (0..=1007)")]
    InvalidPci(u16),
}

fn default_offset_divisor() -> u32 {
    8
}

/// Frame parameters for one carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameParams {
    /// Subcarrier spacing
    pub scs: SubcarrierSpacing,
    /// Cyclic prefix type
    pub cyclic_prefix: CyclicPrefix,
    /// DFT size
    pub fft_size: usize,
    /// Carrier bandwidth in resource blocks
    pub nb_rb: u16,
    /// Number of transmit antennas
    pub nb_antennas_tx: usize,
    /// Number of receive antennas
    pub nb_antennas_rx: usize,
    /// The receive DFT window starts `cp / divisor` samples inside the prefix (0 disables)
    #[serde(default = "default_offset_divisor")]
    pub ofdm_offset_divisor: u32,
}

impl FrameParams {
    /// Create and validate a frame configuration
    pub fn new(
        scs: SubcarrierSpacing,
        cyclic_prefix: CyclicPrefix,
        fft_size: usize,
        nb_rb: u16,
        nb_antennas_tx: usize,
        nb_antennas_rx: usize,
    ) -> Result<Self, ConfigError> {
        let params = Self {
            scs,
            cyclic_prefix,
            fft_size,
            nb_rb,
            nb_antennas_tx,
            nb_antennas_rx,
            ofdm_offset_divisor: default_offset_divisor(),
        };
        params.validate()?;
        debug!(
            "Frame params: scs={:?}, fft={}, nb_rb={}, tx={}, rx={}",
            scs, fft_size, nb_rb, nb_antennas_tx, nb_antennas_rx
        );
        Ok(params)
    }

    /// Validate a deserialized configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nb_rb as usize * SUBCARRIERS_PER_RB >= self.fft_size {
            return Err(ConfigError::BandwidthExceedsFft {
                nb_rb: self.nb_rb,
                fft_size: self.fft_size,
            });
        }
        for count in [self.nb_antennas_tx, self.nb_antennas_rx] {
            if count == 0 || count > MAX_ANTENNAS {
                return Err(ConfigError::InvalidAntennaCount(count));
            }
        }
        if self.cyclic_prefix == CyclicPrefix::Extended && self.scs != SubcarrierSpacing::Scs60 {
            return Err(ConfigError::ExtendedCpNotAllowed);
        }
        Ok(())
    }

    /// OFDM symbols per slot
    pub fn symbols_per_slot(&self) -> usize {
        self.cyclic_prefix.symbols_per_slot()
    }

    /// Number of slots in a 10 ms frame
    pub fn slots_per_frame(&self) -> u32 {
        self.scs.slots_per_frame()
    }

    /// Occupied subcarriers
    pub fn nb_subcarriers(&self) -> usize {
        self.nb_rb as usize * SUBCARRIERS_PER_RB
    }

    /// DFT bin holding subcarrier 0 of the carrier
    pub fn first_carrier_offset(&self) -> usize {
        self.fft_size - self.nb_subcarriers() / 2
    }

    /// Map a carrier subcarrier index to its DFT bin
    pub fn subcarrier_to_bin(&self, subcarrier: usize) -> usize {
        (self.first_carrier_offset() + subcarrier) % self.fft_size
    }

    /// Regular cyclic prefix length in samples
    pub fn nb_prefix_samples(&self) -> usize {
        match self.cyclic_prefix {
            CyclicPrefix::Normal => self.fft_size * 144 / 2048,
            CyclicPrefix::Extended => self.fft_size * 512 / 2048,
        }
    }

    /// Long cyclic prefix length (first symbol of each half subframe)
    pub fn nb_prefix_samples0(&self) -> usize {
        match self.cyclic_prefix {
            CyclicPrefix::Normal => {
                (self.fft_size * 144 + (self.fft_size << self.scs.numerology()) * 16) / 2048
            }
            CyclicPrefix::Extended => self.fft_size * 512 / 2048,
        }
    }

    /// Cyclic prefix length for `symbol` of `slot`
    pub fn cp_length(&self, slot: u32, symbol: usize) -> usize {
        let slots_per_subframe = self.scs.slots_per_subframe();
        let symbols_per_half_subframe = (self.symbols_per_slot() as u32 * slots_per_subframe) / 2;
        let index_in_subframe =
            (slot % slots_per_subframe) * self.symbols_per_slot() as u32 + symbol as u32;
        if index_in_subframe % symbols_per_half_subframe == 0 {
            self.nb_prefix_samples0()
        } else {
            self.nb_prefix_samples()
        }
    }

    /// Samples in `slot` including every cyclic prefix
    pub fn samples_per_slot(&self, slot: u32) -> usize {
        (0..self.symbols_per_slot())
            .map(|symbol| self.fft_size + self.cp_length(slot, symbol))
            .sum()
    }

    /// Sample offset of the start of `slot` within the frame
    pub fn slot_offset(&self, slot: u32) -> usize {
        (0..slot).map(|s| self.samples_per_slot(s)).sum()
    }

    /// Offset of the first prefix sample of `symbol` relative to the slot start
    pub fn symbol_offset_in_slot(&self, slot: u32, symbol: usize) -> usize {
        (0..symbol)
            .map(|s| self.fft_size + self.cp_length(slot, s))
            .sum()
    }

    /// Samples the receive DFT window is advanced into the prefix of `symbol`
    pub fn guard_advance(&self, slot: u32, symbol: usize) -> usize {
        if self.ofdm_offset_divisor == 0 {
            0
        } else {
            self.cp_length(slot, symbol) / self.ofdm_offset_divisor as usize
        }
    }

    /// Check slot/symbol indices against the frame layout
    pub fn check_slot_symbol(&self, slot: u32, symbol: usize) -> Result<(), ConfigError> {
        if slot >= self.slots_per_frame() {
            return Err(ConfigError::SlotOutOfRange {
                slot,
                slots_per_frame: self.slots_per_frame(),
            });
        }
        if symbol >= self.symbols_per_slot() {
            return Err(ConfigError::SymbolOutOfRange {
                symbol,
                symbols_per_slot: self.symbols_per_slot(),
            });
        }
        Ok(())
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.fft_size as f64 * self.scs.as_hz() as f64
    }
}

impl Default for FrameParams {
    /// 5 MHz / 25 PRB at 15 kHz, one antenna each side
    fn default() -> Self {
        Self {
            scs: SubcarrierSpacing::Scs15,
            cyclic_prefix: CyclicPrefix::Normal,
            fft_size: 512,
            nb_rb: 25,
            nb_antennas_tx: 1,
            nb_antennas_rx: 1,
            ofdm_offset_divisor: default_offset_divisor(),
        }
    }
}

/// One downlink carrier: frame layout plus cell identity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Frame layout
    #[serde(default)]
    pub frame: FrameParams,
    /// Physical cell identity, the default data scrambling identity
    #[serde(default)]
    pub pci: u16,
}

impl CarrierConfig {
    pub fn new(frame: FrameParams, pci: u16) -> Result<Self, ConfigError> {
        let config = Self { frame, pci };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frame.validate()?;
        Pci::new(self.pci).ok_or(ConfigError::InvalidPci(self.pci))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp_lengths_15khz() {
        let fp = FrameParams::new(SubcarrierSpacing::Scs15, CyclicPrefix::Normal, 2048, 106, 1, 1).unwrap();
        assert_eq!(fp.cp_length(0, 0), 160);
        assert_eq!(fp.cp_length(0, 1), 144);
        assert_eq!(fp.cp_length(0, 7), 160);
        assert_eq!(fp.samples_per_slot(0), 30_720);
    }

    #[test]
    fn test_cp_lengths_30khz() {
        let fp = FrameParams::new(SubcarrierSpacing::Scs30, CyclicPrefix::Normal, 1024, 51, 1, 1).unwrap();
        // Every slot starts a half subframe at 30 kHz
        assert_eq!(fp.cp_length(0, 0), 88);
        assert_eq!(fp.cp_length(0, 7), 72);
        assert_eq!(fp.cp_length(1, 0), 88);
        assert_eq!(fp.cp_length(1, 1), 72);
        assert_eq!(fp.samples_per_slot(0), 15_360);
    }

    #[test]
    fn test_slot_and_symbol_offsets() {
        let fp = FrameParams::default();
        assert_eq!(fp.samples_per_slot(0), 7680);
        assert_eq!(fp.slot_offset(2), 2 * 7680);
        assert_eq!(fp.symbol_offset_in_slot(0, 1), 512 + 40);
        assert_eq!(fp.symbol_offset_in_slot(0, 2), 512 + 40 + 512 + 36);
        assert_eq!(fp.guard_advance(0, 0), 5);
        assert_eq!(fp.guard_advance(0, 1), 4);
    }

    #[test]
    fn test_subcarrier_mapping() {
        let fp = FrameParams::default();
        assert_eq!(fp.first_carrier_offset(), 512 - 150);
        assert_eq!(fp.subcarrier_to_bin(0), 362);
        assert_eq!(fp.subcarrier_to_bin(150), 0);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            FrameParams::new(SubcarrierSpacing::Scs15, CyclicPrefix::Normal, 256, 25, 1, 1),
            Err(ConfigError::BandwidthExceedsFft { nb_rb: 25, fft_size: 256 })
        );
        assert_eq!(
            FrameParams::new(SubcarrierSpacing::Scs15, CyclicPrefix::Normal, 512, 25, 5, 1),
            Err(ConfigError::InvalidAntennaCount(5))
        );
        assert!(FrameParams::default().check_slot_symbol(10, 0).is_err());
        assert!(FrameParams::default().check_slot_symbol(9, 13).is_ok());
    }

    #[test]
    fn test_deserialize_with_default_divisor() {
        let text = r#"
            scs = "Scs30"
            cyclic_prefix = "Normal"
            fft_size = 1024
            nb_rb = 51
            nb_antennas_tx = 2
            nb_antennas_rx = 2
        "#;
        let fp: FrameParams = toml::from_str(text).unwrap();
        assert_eq!(fp.ofdm_offset_divisor, 8);
        assert!(fp.validate().is_ok());
    }

    #[test]
    fn test_carrier_config() {
        let text = r#"
            pci = 500
            [frame]
            scs = "Scs15"
            cyclic_prefix = "Normal"
            fft_size = 512
            nb_rb = 25
            nb_antennas_tx = 1
            nb_antennas_rx = 2
        "#;
        let carrier: CarrierConfig = toml::from_str(text).unwrap();
        assert!(carrier.validate().is_ok());
        assert_eq!(carrier.frame.nb_antennas_rx, 2);
        assert_eq!(
            CarrierConfig::new(FrameParams::default(), 1008),
            Err(ConfigError::InvalidPci(1008))
        );
    }
}
