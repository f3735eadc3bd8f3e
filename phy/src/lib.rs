//! 5G NR Downlink Shared Channel Physical Layer
//!
//! This crate implements the PDSCH/DL-SCH signal-processing chain according
//! to 3GPP TS 38.211 and TS 38.212: the receive path (OFDM front end, channel
//! estimation, MMSE equalization, soft demodulation, layer demapping,
//! descrambling, LDPC decoding and CRC verification) and the transmit-side
//! stages needed to drive it.

pub mod channel_estimation;
pub mod constellation;
pub mod crc;
pub mod demodulation;
pub mod dft;
pub mod dmrs;
pub mod layer_mapping;
pub mod ldpc;
pub mod matrix;
pub mod mmse;
pub mod ofdm;
pub mod pdsch;
pub mod precoding;
pub mod resource_grid;
pub mod scrambling;

// Re-export commonly used types
pub use channel_estimation::{ChannelEstimate, ChannelEstimator};
pub use crc::{compute_crc24a, verify_crc24a, CrcEngine};
pub use demodulation::SoftDemodulator;
pub use dft::{default_kernel, DftKernel, DftSize, Direction, RustFftKernel};
pub use layer_mapping::{demap_layers, map_layers, ActiveCodewords};
pub use ldpc::{DecodeOutput, LdpcBaseGraph, LdpcDecoder, LdpcEncoder, LdpcParams};
pub use mmse::{EqualizerArithmetic, MmseEqualizer};
pub use ofdm::OfdmFrontEnd;
pub use pdsch::{DlschReceiver, DlschTransmitter, PdschConfig, ReceiverConfig, ReceiverStats, RxResult};
pub use resource_grid::{FrequencyGrid, PdschAllocation};
pub use scrambling::{descramble_llrs, scramble, GoldSequence};

use common::ConfigError;
use thiserror::Error;

/// Errors raised by the PHY processing stages
///
/// Decode failures (CRC mismatch, non-convergence) are normal outcomes and are
/// reported through result structs, never through this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhyError {
    #[error("Unsupported FFT size {0}")]
    UnsupportedFftSize(usize),

    #[error("Unsupported layer count {0}")]
    UnsupportedLayerCount(usize),

    #[error("Invalid LDPC parameters: {0}")]
    InvalidLdpcParams(String),

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid codeword activity: {0}")]
    InvalidCodewords(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting
pub(crate) fn try_alloc<T: Clone>(len: usize, fill: T, what: &str) -> Result<Vec<T>, PhyError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| PhyError::ResourceUnavailable(format!("{} ({} elements): {}", what, len, e)))?;
    buffer.resize(len, fill);
    Ok(buffer)
}

/// Fail unless `actual` equals `expected`
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), PhyError> {
    if expected != actual {
        return Err(PhyError::LengthMismatch { what, expected, actual });
    }
    Ok(())
}
