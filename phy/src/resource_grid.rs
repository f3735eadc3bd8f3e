//! Frequency-domain resource grid and PDSCH resource allocation
//!
//! Implements resource element mapping according to 3GPP TS 38.211 Section 7.3.1.5

use crate::{try_alloc, PhyError};
use common::{FrameParams, C16, MAX_ANTENNAS, SUBCARRIERS_PER_RB};
use ndarray::{s, Array3, ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frequency-domain samples for one slot, indexed (antenna, symbol, DFT bin)
#[derive(Debug, Clone)]
pub struct FrequencyGrid {
    grid: Array3<C16>,
}

impl FrequencyGrid {
    /// Create a zeroed grid
    pub fn new(nb_antennas: usize, symbols_per_slot: usize, fft_size: usize) -> Result<Self, PhyError> {
        let len = nb_antennas * symbols_per_slot * fft_size;
        let storage = try_alloc(len, C16::new(0, 0), "frequency grid")?;
        let grid = Array3::from_shape_vec((nb_antennas, symbols_per_slot, fft_size), storage)
            .map_err(|e| PhyError::ProcessingError(format!("grid shape: {}", e)))?;
        debug!(
            "Created frequency grid: {} antennas x {} symbols x {} bins",
            nb_antennas, symbols_per_slot, fft_size
        );
        Ok(Self { grid })
    }

    /// Create a grid sized for the receive side of `fp`
    pub fn for_rx(fp: &FrameParams) -> Result<Self, PhyError> {
        Self::new(fp.nb_antennas_rx, fp.symbols_per_slot(), fp.fft_size)
    }

    /// Create a grid sized for the transmit side of `fp`
    pub fn for_tx(fp: &FrameParams) -> Result<Self, PhyError> {
        Self::new(fp.nb_antennas_tx, fp.symbols_per_slot(), fp.fft_size)
    }

    pub fn nb_antennas(&self) -> usize {
        self.grid.dim().0
    }

    pub fn symbols_per_slot(&self) -> usize {
        self.grid.dim().1
    }

    pub fn fft_size(&self) -> usize {
        self.grid.dim().2
    }

    /// Zero the whole grid for reuse in the next slot
    pub fn clear(&mut self) {
        self.grid.fill(C16::new(0, 0));
    }

    /// One OFDM symbol of one antenna in DFT bin order
    pub fn symbol(&self, antenna: usize, symbol: usize) -> ArrayView1<'_, C16> {
        self.grid.slice(s![antenna, symbol, ..])
    }

    /// Mutable view of one OFDM symbol of one antenna
    pub fn symbol_mut(&mut self, antenna: usize, symbol: usize) -> ArrayViewMut1<'_, C16> {
        self.grid.slice_mut(s![antenna, symbol, ..])
    }

    /// Read the resource element at carrier subcarrier `subcarrier`
    #[inline]
    pub fn re(&self, fp: &FrameParams, antenna: usize, symbol: usize, subcarrier: usize) -> C16 {
        self.grid[[antenna, symbol, fp.subcarrier_to_bin(subcarrier)]]
    }

    /// Write the resource element at carrier subcarrier `subcarrier`
    #[inline]
    pub fn set_re(&mut self, fp: &FrameParams, antenna: usize, symbol: usize, subcarrier: usize, value: C16) {
        self.grid[[antenna, symbol, fp.subcarrier_to_bin(subcarrier)]] = value;
    }
}

fn default_cdm_groups() -> u8 {
    1
}

fn default_dmrs_ports() -> Vec<u8> {
    vec![0]
}

/// PDSCH time/frequency allocation and DMRS layout for one scheduling decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdschAllocation {
    /// First allocated resource block
    pub start_rb: u16,
    /// Number of allocated resource blocks
    pub nb_rb: u16,
    /// First allocated OFDM symbol
    pub start_symbol: usize,
    /// Number of allocated OFDM symbols
    pub nb_symbols: usize,
    /// Bit `l` set when symbol `l` carries DMRS
    pub dmrs_symbol_mask: u16,
    /// DMRS CDM groups without data (1: odd subcarriers of DMRS symbols carry data, 2: none do)
    #[serde(default = "default_cdm_groups")]
    pub cdm_groups_no_data: u8,
    /// Bit `l` set when symbol `l` is reserved for PTRS
    #[serde(default)]
    pub ptrs_symbol_mask: u16,
    /// Antenna ports of the DMRS, one per layer
    #[serde(default = "default_dmrs_ports")]
    pub dmrs_ports: Vec<u8>,
    /// DMRS scrambling identity N_ID
    #[serde(default)]
    pub dmrs_scrambling_id: u16,
    /// DMRS scrambling selector n_SCID
    #[serde(default)]
    pub n_scid: u8,
}

impl PdschAllocation {
    /// Number of transmission layers
    pub fn nb_layers(&self) -> usize {
        self.dmrs_ports.len()
    }

    /// Validate the allocation against the carrier
    pub fn validate(&self, fp: &FrameParams) -> Result<(), PhyError> {
        let layers = self.nb_layers();
        if layers == 0 || layers > MAX_ANTENNAS {
            return Err(PhyError::UnsupportedLayerCount(layers));
        }
        if self.nb_rb == 0 || self.start_rb as usize + self.nb_rb as usize > fp.nb_rb as usize {
            return Err(PhyError::InvalidConfiguration(format!(
                "RBs {}..{} outside carrier of {} RBs",
                self.start_rb,
                self.start_rb as usize + self.nb_rb as usize,
                fp.nb_rb
            )));
        }
        if self.nb_symbols == 0 || self.start_symbol + self.nb_symbols > fp.symbols_per_slot() {
            return Err(PhyError::InvalidConfiguration(format!(
                "symbols {}..{} outside slot of {} symbols",
                self.start_symbol,
                self.start_symbol + self.nb_symbols,
                fp.symbols_per_slot()
            )));
        }
        if self.dmrs_symbols().is_empty() {
            return Err(PhyError::InvalidConfiguration(
                "no DMRS symbol inside the allocation".into(),
            ));
        }
        if !(1..=2).contains(&self.cdm_groups_no_data) {
            return Err(PhyError::InvalidConfiguration(format!(
                "CDM groups without data must be 1 or 2, got {}",
                self.cdm_groups_no_data
            )));
        }
        if self.n_scid > 1 {
            return Err(PhyError::InvalidConfiguration(format!("n_SCID {}", self.n_scid)));
        }
        for (i, &port) in self.dmrs_ports.iter().enumerate() {
            if port > 3 {
                return Err(PhyError::InvalidConfiguration(format!("DMRS port {} (0..=3 supported)", port)));
            }
            if self.dmrs_ports[..i].contains(&port) {
                return Err(PhyError::InvalidConfiguration(format!("DMRS port {} repeated", port)));
            }
            if self.cdm_groups_no_data == 1 && port > 1 {
                return Err(PhyError::InvalidConfiguration(format!(
                    "DMRS port {} needs two CDM groups without data",
                    port
                )));
            }
        }
        Ok(())
    }

    /// First subcarrier of the allocation
    pub fn first_subcarrier(&self) -> usize {
        self.start_rb as usize * SUBCARRIERS_PER_RB
    }

    /// Allocated subcarriers
    pub fn nb_subcarriers(&self) -> usize {
        self.nb_rb as usize * SUBCARRIERS_PER_RB
    }

    pub fn is_dmrs_symbol(&self, symbol: usize) -> bool {
        symbol < 16 && self.dmrs_symbol_mask & (1 << symbol) != 0
    }

    pub fn is_ptrs_symbol(&self, symbol: usize) -> bool {
        symbol < 16 && self.ptrs_symbol_mask & (1 << symbol) != 0
    }

    /// DMRS-bearing symbols inside the allocation, ascending
    pub fn dmrs_symbols(&self) -> Vec<usize> {
        (self.start_symbol..self.start_symbol + self.nb_symbols)
            .filter(|&l| self.is_dmrs_symbol(l))
            .collect()
    }

    /// Carrier subcarriers of `symbol` that carry PDSCH data, ascending
    pub fn data_subcarriers(&self, symbol: usize) -> Vec<usize> {
        if symbol < self.start_symbol || symbol >= self.start_symbol + self.nb_symbols || self.is_ptrs_symbol(symbol) {
            return Vec::new();
        }
        let first = self.first_subcarrier();
        let range = first..first + self.nb_subcarriers();
        if self.is_dmrs_symbol(symbol) {
            if self.cdm_groups_no_data == 1 {
                // CDM group 1 positions are free
                range.filter(|k| k % 2 == 1).collect()
            } else {
                Vec::new()
            }
        } else {
            range.collect()
        }
    }

    /// Data resource elements per layer over the whole slot
    pub fn nb_data_res(&self) -> usize {
        (self.start_symbol..self.start_symbol + self.nb_symbols)
            .map(|l| self.data_subcarriers(l).len())
            .sum()
    }

    /// Coded bits carried by one codeword (G)
    pub fn coded_bits(&self, bits_per_symbol: usize) -> usize {
        self.nb_data_res() * self.nb_layers() * bits_per_symbol
    }
}

impl Default for PdschAllocation {
    /// Full 25 PRB carrier, 14 symbols, one front-loaded DMRS symbol, one layer
    fn default() -> Self {
        Self {
            start_rb: 0,
            nb_rb: 25,
            start_symbol: 0,
            nb_symbols: 14,
            dmrs_symbol_mask: 1 << 2,
            cdm_groups_no_data: default_cdm_groups(),
            ptrs_symbol_mask: 0,
            dmrs_ports: default_dmrs_ports(),
            dmrs_scrambling_id: 0,
            n_scid: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_subcarrier_access() {
        let fp = FrameParams::default();
        let mut grid = FrequencyGrid::for_rx(&fp).unwrap();
        assert_eq!(grid.fft_size(), 512);
        assert_eq!(grid.symbols_per_slot(), 14);

        grid.set_re(&fp, 0, 3, 0, C16::new(7, -7));
        assert_eq!(grid.symbol(0, 3)[362], C16::new(7, -7));
        assert_eq!(grid.re(&fp, 0, 3, 0), C16::new(7, -7));

        grid.clear();
        assert_eq!(grid.re(&fp, 0, 3, 0), C16::new(0, 0));
    }

    #[test]
    fn test_default_allocation_res() {
        let fp = FrameParams::default();
        let alloc = PdschAllocation::default();
        alloc.validate(&fp).unwrap();

        assert_eq!(alloc.dmrs_symbols(), vec![2]);
        assert_eq!(alloc.data_subcarriers(2).len(), 150);
        assert_eq!(alloc.data_subcarriers(2)[0], 1);
        assert_eq!(alloc.data_subcarriers(3).len(), 300);
        assert_eq!(alloc.nb_data_res(), 13 * 300 + 150);
        assert_eq!(alloc.coded_bits(6), 24_300);
    }

    #[test]
    fn test_two_cdm_groups_and_ptrs() {
        let alloc = PdschAllocation {
            cdm_groups_no_data: 2,
            ptrs_symbol_mask: 1 << 5,
            dmrs_ports: vec![0, 1, 2, 3],
            ..Default::default()
        };
        assert!(alloc.data_subcarriers(2).is_empty());
        assert!(alloc.data_subcarriers(5).is_empty());
        assert_eq!(alloc.nb_data_res(), 12 * 300);
        assert_eq!(alloc.coded_bits(2), 12 * 300 * 4 * 2);
    }

    #[test]
    fn test_allocation_validation() {
        let fp = FrameParams::default();
        let too_wide = PdschAllocation { nb_rb: 26, ..Default::default() };
        assert!(too_wide.validate(&fp).is_err());

        let no_dmrs = PdschAllocation { dmrs_symbol_mask: 0, ..Default::default() };
        assert!(no_dmrs.validate(&fp).is_err());

        let bad_port = PdschAllocation { dmrs_ports: vec![0, 2], ..Default::default() };
        assert!(bad_port.validate(&fp).is_err());

        let five_layers = PdschAllocation { dmrs_ports: vec![0, 1, 2, 3, 0], ..Default::default() };
        assert_eq!(five_layers.validate(&fp), Err(PhyError::UnsupportedLayerCount(5)));
    }
}
