//! Common Types for the NR downlink PHY
//!
//! Defines fundamental types used throughout the signal-processing chain

use num_complex::Complex;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Complex I/Q sample with 16-bit signed fixed-point components
pub type C16 = Complex<i16>;

/// Pack an I/Q sample into a 32-bit word (low 16 bits real, high 16 bits imaginary)
#[inline]
pub fn pack_iq(sample: C16) -> u32 {
    (sample.re as u16 as u32) | ((sample.im as u16 as u32) << 16)
}

/// Unpack a 32-bit word produced by [`pack_iq`]
#[inline]
pub fn unpack_iq(word: u32) -> C16 {
    C16::new(word as u16 as i16, (word >> 16) as u16 as i16)
}

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// SI-RNTI / default value used by the benchmark drivers
    pub const SI: Self = Self(0xFFFF);

    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid PCI value (0-1007)
    pub const MAX: u16 = 1007;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
    /// 240 kHz
    Scs240 = 240,
}

impl SubcarrierSpacing {
    /// Numerology index (mu)
    pub fn numerology(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15 => 0,
            SubcarrierSpacing::Scs30 => 1,
            SubcarrierSpacing::Scs60 => 2,
            SubcarrierSpacing::Scs120 => 3,
            SubcarrierSpacing::Scs240 => 4,
        }
    }

    /// Spacing in Hz
    pub fn as_hz(&self) -> u32 {
        15_000 << self.numerology()
    }

    /// Number of slots per 1 ms subframe
    pub fn slots_per_subframe(&self) -> u32 {
        1 << self.numerology()
    }

    /// Number of slots per 10 ms frame
    pub fn slots_per_frame(&self) -> u32 {
        10 * self.slots_per_subframe()
    }
}

/// Cyclic prefix type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclicPrefix {
    Normal,
    Extended,
}

impl CyclicPrefix {
    /// OFDM symbols per slot
    pub fn symbols_per_slot(&self) -> usize {
        match self {
            CyclicPrefix::Normal => 14,
            CyclicPrefix::Extended => 12,
        }
    }
}

/// Modulation scheme, discriminant is the number of bits per symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum ModulationScheme {
    Qpsk = 2,
    Qam16 = 4,
    Qam64 = 6,
    Qam256 = 8,
}

impl ModulationScheme {
    /// Bits per constellation symbol (Qm)
    pub fn bits_per_symbol(&self) -> usize {
        *self as usize
    }

    /// Look up the scheme from its modulation order
    pub fn from_bits_per_symbol(qm: usize) -> Option<Self> {
        num_traits::FromPrimitive::from_usize(qm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_validation() {
        assert!(Pci::new(0).is_some());
        assert!(Pci::new(1007).is_some());
        assert!(Pci::new(1008).is_none());
    }

    #[test]
    fn test_iq_packing_layout() {
        let sample = C16::new(-2, 3);
        let word = pack_iq(sample);
        assert_eq!(word & 0xFFFF, 0xFFFE);
        assert_eq!(word >> 16, 3);
        assert_eq!(unpack_iq(word), sample);
    }

    #[test]
    fn test_iq_packing_matches_memory_layout() {
        // Complex<i16> is repr(C) {re, im}; on little-endian hosts the packed
        // word must be bit-identical to the in-memory pair.
        let sample = C16::new(0x1234, -0x5678);
        let mut bytes = [0u8; 4];
        bytes[..2].copy_from_slice(&sample.re.to_le_bytes());
        bytes[2..].copy_from_slice(&sample.im.to_le_bytes());
        assert_eq!(u32::from_le_bytes(bytes), pack_iq(sample));
    }

    #[test]
    fn test_scs_numerology() {
        assert_eq!(SubcarrierSpacing::Scs15.as_hz(), 15_000);
        assert_eq!(SubcarrierSpacing::Scs30.slots_per_frame(), 20);
        assert_eq!(SubcarrierSpacing::Scs120.numerology(), 3);
    }

    #[test]
    fn test_modulation_order_lookup() {
        assert_eq!(ModulationScheme::from_bits_per_symbol(6), Some(ModulationScheme::Qam64));
        assert_eq!(ModulationScheme::from_bits_per_symbol(3), None);
        assert_eq!(ModulationScheme::Qam256.bits_per_symbol(), 8);
    }
}
