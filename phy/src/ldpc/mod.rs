//! LDPC channel coding for the 5G NR DL-SCH
//! Based on 3GPP TS 38.212 Sections 5.2.2, 5.3.2 and 5.4.2

pub mod base_graph;
pub mod decoder;
pub mod encoder;
pub mod rate_matching;
pub mod segmentation;

pub use base_graph::{LdpcBaseGraph, LiftedGraph, LIFTING_SIZE_SET};
pub use decoder::LdpcDecoder;
pub use encoder::LdpcEncoder;
pub use rate_matching::LdpcRateMatcher;
pub use segmentation::{CodeBlockSegmentation, TransportBlockCrc};

use crate::PhyError;
use base_graph::check_lifting_size;
use serde::{Deserialize, Serialize};

/// Default decoder iteration limit
pub const DEFAULT_MAX_ITERATIONS: u8 = 8;

/// Layout of decoded bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// MSB-first packed bytes
    #[default]
    Packed,
    /// One bit per byte
    BytePerBit,
}

/// Encoder/decoder parameters for one code block
#[derive(Debug, Clone, PartialEq)]
pub struct LdpcParams {
    /// Base graph
    pub base_graph: LdpcBaseGraph,
    /// Lifting size (Zc)
    pub lifting_size: usize,
    /// Information bits including CRC, excluding fillers (K')
    pub k_prime: usize,
    /// Decoder iteration limit
    pub max_iterations: u8,
    /// Decoded bit layout
    pub output_mode: OutputMode,
}

/// Encoder output geometry for a mother code rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Puncturing {
    /// Block rows used
    pub nrows: usize,
    /// Parity columns beyond `nrows` that are dropped entirely
    pub punctured_columns: usize,
    /// Bits removed from the last used parity column
    pub removed_bits: usize,
    /// Transmitted bits, `K * inverse_rate`
    pub output_len: usize,
}

impl LdpcParams {
    pub fn new(base_graph: LdpcBaseGraph, lifting_size: usize, k_prime: usize) -> Result<Self, PhyError> {
        check_lifting_size(lifting_size)?;
        let k = base_graph.systematic_columns() * lifting_size;
        if k_prime == 0 || k_prime > k {
            return Err(PhyError::InvalidLdpcParams(format!(
                "K'={} does not fit {:?} with Zc={} (K={})",
                k_prime, base_graph, lifting_size, k
            )));
        }
        if k_prime <= 2 * lifting_size {
            return Err(PhyError::InvalidLdpcParams(format!(
                "K'={} leaves no transmitted systematic bits with Zc={}",
                k_prime, lifting_size
            )));
        }
        Ok(Self {
            base_graph,
            lifting_size,
            k_prime,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            output_mode: OutputMode::Packed,
        })
    }

    pub fn with_max_iterations(mut self, max_iterations: u8) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    /// Systematic bits including fillers (K)
    pub fn k(&self) -> usize {
        self.base_graph.systematic_columns() * self.lifting_size
    }

    /// Filler bits (F = K - K')
    pub fn fillers(&self) -> usize {
        self.k() - self.k_prime
    }

    /// Full lifted codeword length, including the first 2*Zc punctured bits
    pub fn codeword_len(&self) -> usize {
        self.base_graph.columns() * self.lifting_size
    }

    /// Circular buffer length N_cb
    pub fn circular_buffer_len(&self) -> usize {
        self.codeword_len() - 2 * self.lifting_size
    }

    /// Output geometry when transmitting `K * inverse_rate` bits
    pub fn puncturing(&self, inverse_rate: usize) -> Result<Puncturing, PhyError> {
        let z = self.lifting_size;
        let k = self.k();
        let output_len = k * inverse_rate;
        let max_rows = self.base_graph.rows();
        let nrows = ((output_len + 2 * z).saturating_sub(k) + z - 1) / z;
        if inverse_rate == 0 || nrows < 4 || nrows > max_rows {
            return Err(PhyError::InvalidLdpcParams(format!(
                "inverse rate {} unsupported for {:?}",
                inverse_rate, self.base_graph
            )));
        }
        let punctured_columns = ((nrows - 2) * z + k - output_len) / z;
        let removed_bits = (nrows - punctured_columns - 2) * z + k - output_len;
        Ok(Puncturing {
            nrows,
            punctured_columns,
            removed_bits,
            output_len,
        })
    }
}

/// Result of decoding one code block
///
/// Non-convergence is not an error: `parity_ok` is false and `iterations`
/// equals the iteration limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutput {
    /// Hard decisions for the K' information bits
    pub bits: Vec<u8>,
    /// Iterations run
    pub iterations: u8,
    /// All active parity checks satisfied
    pub parity_ok: bool,
    /// The caller-supplied CRC check passed
    pub crc_ok: bool,
    /// Stopped by the abort flag
    pub aborted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params() {
        let p = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 256, 5632).unwrap();
        assert_eq!(p.k(), 5632);
        assert_eq!(p.fillers(), 0);
        assert_eq!(p.codeword_len(), 68 * 256);
        assert_eq!(p.circular_buffer_len(), 66 * 256);

        assert!(LdpcParams::new(LdpcBaseGraph::BaseGraph2, 256, 2561).is_err());
        assert!(LdpcParams::new(LdpcBaseGraph::BaseGraph1, 100, 2000).is_err());
    }

    #[test]
    fn test_full_rate_puncturing() {
        // mother code rates use every row and drop nothing
        let p1 = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 384, 8448).unwrap();
        let punct = p1.puncturing(3).unwrap();
        assert_eq!(punct.nrows, 46);
        assert_eq!(punct.punctured_columns, 0);
        assert_eq!(punct.removed_bits, 0);
        assert_eq!(punct.output_len, 3 * 8448);

        let p2 = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 64, 640).unwrap();
        assert_eq!(p2.puncturing(5).unwrap().nrows, 42);
    }

    #[test]
    fn test_higher_rate_puncturing() {
        let p = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 10, 220).unwrap();
        // 1/2: K*2 = 440 bits = 22 systematic-minus-2 columns + 24 parity columns
        let punct = p.puncturing(2).unwrap();
        assert_eq!(punct.nrows, 24);
        assert_eq!(punct.punctured_columns, 0);
        assert_eq!(punct.removed_bits, 0);
        assert!(p.puncturing(4).is_err());
    }
}
