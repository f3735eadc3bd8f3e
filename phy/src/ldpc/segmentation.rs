//! Transport block CRC attachment, LDPC base graph selection and code block segmentation
//! Based on 3GPP TS 38.212 Sections 5.2.2, 6.2.1, 6.2.2 and 5.4.2.1

use super::base_graph::{LdpcBaseGraph, LIFTING_SIZE_SET};
use super::LdpcParams;
use crate::crc::{CrcEngine, CRC16, CRC24A, CRC24B};
use crate::PhyError;
use common::{get_bit, set_bit};
use tracing::debug;

/// Payload size above which the transport block carries CRC24A
const TB_CRC24_THRESHOLD: usize = 3824;

/// Code block CRC length when a transport block is split
const CB_CRC_LEN: usize = 24;

/// Transport-block CRC type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBlockCrc {
    Crc16,
    Crc24A,
}

impl TransportBlockCrc {
    /// CRC used for a payload of `a` bits
    pub fn for_payload(a: usize) -> Self {
        if a > TB_CRC24_THRESHOLD {
            TransportBlockCrc::Crc24A
        } else {
            TransportBlockCrc::Crc16
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TransportBlockCrc::Crc16 => 16,
            TransportBlockCrc::Crc24A => 24,
        }
    }

    fn engine(&self) -> &'static CrcEngine {
        match self {
            TransportBlockCrc::Crc16 => &CRC16,
            TransportBlockCrc::Crc24A => &CRC24A,
        }
    }
}

/// LDPC base graph for a payload size and target code rate (Section 6.2.2)
pub fn select_base_graph(a: usize, code_rate: f64) -> LdpcBaseGraph {
    if a <= 292 || (a <= TB_CRC24_THRESHOLD && code_rate <= 0.67) || code_rate <= 0.25 {
        LdpcBaseGraph::BaseGraph2
    } else {
        LdpcBaseGraph::BaseGraph1
    }
}

/// Segmentation of one transport block into LDPC code blocks
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlockSegmentation {
    /// Payload bits (A)
    pub tb_size: usize,
    /// Transport-block CRC
    pub tb_crc: TransportBlockCrc,
    /// Base graph
    pub base_graph: LdpcBaseGraph,
    /// Number of code blocks (C)
    pub nb_segments: usize,
    /// Code-block CRC bits (L), 0 for a single block
    pub cb_crc_len: usize,
    /// Bits per code block including CB CRC (K')
    pub k_prime: usize,
    /// Systematic block columns actually used (Kb)
    pub kb: usize,
    /// Lifting size (Zc)
    pub lifting_size: usize,
}

impl CodeBlockSegmentation {
    /// Segment a payload of `tb_size` bits (Section 5.2.2)
    pub fn new(tb_size: usize, base_graph: LdpcBaseGraph) -> Result<Self, PhyError> {
        if tb_size == 0 {
            return Err(PhyError::InvalidConfiguration("empty transport block".into()));
        }
        let tb_crc = TransportBlockCrc::for_payload(tb_size);
        let b = tb_size + tb_crc.len();
        let kcb = base_graph.max_code_block_size();

        let (nb_segments, cb_crc_len) = if b <= kcb {
            (1, 0)
        } else {
            ((b + kcb - CB_CRC_LEN - 1) / (kcb - CB_CRC_LEN), CB_CRC_LEN)
        };
        let b_prime = b + nb_segments * cb_crc_len;
        let k_prime = (b_prime + nb_segments - 1) / nb_segments;

        let kb = match base_graph {
            LdpcBaseGraph::BaseGraph1 => 22,
            LdpcBaseGraph::BaseGraph2 => match b {
                b if b > 640 => 10,
                b if b > 560 => 9,
                b if b > 192 => 8,
                _ => 6,
            },
        };
        let lifting_size = LIFTING_SIZE_SET
            .iter()
            .copied()
            .find(|&z| kb * z >= k_prime)
            .ok_or_else(|| {
                PhyError::InvalidLdpcParams(format!("no lifting size fits K'={} with Kb={}", k_prime, kb))
            })?;

        let seg = Self {
            tb_size,
            tb_crc,
            base_graph,
            nb_segments,
            cb_crc_len,
            k_prime,
            kb,
            lifting_size,
        };
        debug!(
            "Segmentation: A={}, B={}, C={}, K'={}, K={}, Zc={}, F={}, {:?}",
            tb_size,
            b,
            nb_segments,
            k_prime,
            seg.k(),
            lifting_size,
            seg.fillers(),
            base_graph
        );
        Ok(seg)
    }

    /// Transport block length with its CRC (B)
    pub fn tb_len_with_crc(&self) -> usize {
        self.tb_size + self.tb_crc.len()
    }

    /// Bits per code block including fillers (K)
    pub fn k(&self) -> usize {
        self.base_graph.systematic_columns() * self.lifting_size
    }

    /// Filler bits per code block
    pub fn fillers(&self) -> usize {
        self.k() - self.k_prime
    }

    /// Code block parameters
    pub fn ldpc_params(&self) -> Result<LdpcParams, PhyError> {
        LdpcParams::new(self.base_graph, self.lifting_size, self.k_prime)
    }

    /// Payload bits carried per code block before the CB CRC
    fn data_bits_per_block(&self) -> usize {
        self.k_prime - self.cb_crc_len
    }

    /// Attach the TB CRC and split into code blocks of K' packed bits each
    ///
    /// Padding bits at the end of the last block are zero.
    pub fn segment(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>, PhyError> {
        if payload.len() * 8 < self.tb_size {
            return Err(PhyError::LengthMismatch {
                what: "transport block",
                expected: (self.tb_size + 7) / 8,
                actual: payload.len(),
            });
        }
        let with_crc = self.tb_crc.engine().attach(payload, self.tb_size);
        let b = self.tb_len_with_crc();
        let per_block = self.data_bits_per_block();

        let blocks = (0..self.nb_segments)
            .map(|r| {
                let mut block = vec![0u8; (self.k_prime + 7) / 8];
                for i in 0..per_block {
                    let src = r * per_block + i;
                    if src < b {
                        set_bit(&mut block, i, get_bit(&with_crc, src));
                    }
                }
                if self.cb_crc_len > 0 {
                    let attached = CRC24B.attach(&block, per_block);
                    block.copy_from_slice(&attached);
                }
                block
            })
            .collect();
        Ok(blocks)
    }

    /// Check a decoded code block's CRC24B (always true for a single block)
    pub fn check_code_block(&self, block: &[u8]) -> bool {
        self.cb_crc_len == 0 || CRC24B.verify(block, self.k_prime)
    }

    /// CRC a decoder can test on one block's K' hard decisions
    ///
    /// A lone block is the whole transport block plus its CRC, so the TB CRC
    /// applies; split blocks carry CRC24B.
    pub fn block_crc_ok(&self, block: &[u8], k_prime: usize) -> bool {
        if self.cb_crc_len == 0 {
            self.tb_crc.engine().verify(block, k_prime)
        } else {
            CRC24B.verify(block, k_prime)
        }
    }

    /// Strip code block CRCs, concatenate and verify the TB CRC
    ///
    /// Returns the packed payload and the TB CRC verdict.
    pub fn reassemble(&self, blocks: &[Vec<u8>]) -> Result<(Vec<u8>, bool), PhyError> {
        if blocks.len() != self.nb_segments {
            return Err(PhyError::LengthMismatch {
                what: "code blocks",
                expected: self.nb_segments,
                actual: blocks.len(),
            });
        }
        let b = self.tb_len_with_crc();
        let per_block = self.data_bits_per_block();
        let mut with_crc = vec![0u8; (b + 7) / 8];

        for (r, block) in blocks.iter().enumerate() {
            if block.len() * 8 < self.k_prime {
                return Err(PhyError::LengthMismatch {
                    what: "code block",
                    expected: (self.k_prime + 7) / 8,
                    actual: block.len(),
                });
            }
            for i in 0..per_block {
                let dst = r * per_block + i;
                if dst < b {
                    set_bit(&mut with_crc, dst, get_bit(block, i));
                }
            }
        }

        let crc_ok = self.tb_crc.engine().verify(&with_crc, b);
        let mut payload = with_crc;
        payload.truncate((self.tb_size + 7) / 8);
        if self.tb_size % 8 != 0 {
            if let Some(last) = payload.last_mut() {
                *last &= !(0xFFu8 >> (self.tb_size % 8));
            }
        }
        Ok((payload, crc_ok))
    }
}

/// Rate-matched length E_r of every code block (Section 5.4.2.1)
///
/// `g` is the number of coded bits available to the transport block.
pub fn rate_matched_lengths(
    nb_segments: usize,
    g: usize,
    nb_layers: usize,
    qm: usize,
) -> Result<Vec<usize>, PhyError> {
    if nb_segments == 0 || nb_layers == 0 || qm == 0 {
        return Err(PhyError::InvalidConfiguration(
            "rate matching needs at least one segment, layer and bit per symbol".into(),
        ));
    }
    let unit = nb_layers * qm;
    let g_prime = g / unit;
    let c = nb_segments;
    let threshold = c - g_prime % c;
    Ok((0..c)
        .map(|r| {
            if r < threshold {
                unit * (g_prime / c)
            } else {
                unit * ((g_prime + c - 1) / c)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_base_graph_selection() {
        assert_eq!(select_base_graph(200, 0.9), LdpcBaseGraph::BaseGraph2);
        assert_eq!(select_base_graph(3000, 0.5), LdpcBaseGraph::BaseGraph2);
        assert_eq!(select_base_graph(3000, 0.8), LdpcBaseGraph::BaseGraph1);
        assert_eq!(select_base_graph(5608, 0.2), LdpcBaseGraph::BaseGraph2);
        assert_eq!(select_base_graph(5608, 0.5), LdpcBaseGraph::BaseGraph1);
    }

    #[test]
    fn test_single_block_bg1() {
        let seg = CodeBlockSegmentation::new(5608, LdpcBaseGraph::BaseGraph1).unwrap();
        assert_eq!(seg.tb_crc, TransportBlockCrc::Crc24A);
        assert_eq!(seg.nb_segments, 1);
        assert_eq!(seg.k_prime, 5632);
        assert_eq!(seg.lifting_size, 256);
        assert_eq!(seg.k(), 5632);
        assert_eq!(seg.fillers(), 0);
    }

    #[test]
    fn test_small_block_bg2() {
        let seg = CodeBlockSegmentation::new(100, LdpcBaseGraph::BaseGraph2).unwrap();
        assert_eq!(seg.tb_crc, TransportBlockCrc::Crc16);
        // B = 116 -> Kb = 6, Zc = 20, K = 200
        assert_eq!(seg.kb, 6);
        assert_eq!(seg.lifting_size, 20);
        assert_eq!(seg.k(), 200);
        assert_eq!(seg.fillers(), 84);
    }

    #[test]
    fn test_multi_block_round_trip() {
        let a = 20_000;
        let seg = CodeBlockSegmentation::new(a, LdpcBaseGraph::BaseGraph1).unwrap();
        // B = 20024, C = ceil(20024 / 8424) = 3
        assert_eq!(seg.nb_segments, 3);
        assert_eq!(seg.k_prime, (20_024 + 72 + 2) / 3);
        assert!(seg.k() >= seg.k_prime);

        let mut rng = StdRng::seed_from_u64(8);
        let payload: Vec<u8> = (0..a / 8).map(|_| rng.gen()).collect();
        let blocks = seg.segment(&payload).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| seg.check_code_block(b)));

        let (restored, ok) = seg.reassemble(&blocks).unwrap();
        assert!(ok);
        assert_eq!(restored, payload);

        let mut corrupted = blocks.clone();
        corrupted[1][10] ^= 0x01;
        assert!(!seg.check_code_block(&corrupted[1]));
        let (_, ok) = seg.reassemble(&corrupted).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_rate_matched_lengths() {
        // G' = 24300 / 6 = 4050 symbols over one block
        assert_eq!(rate_matched_lengths(1, 24_300, 1, 6).unwrap(), vec![24_300]);
        // 3 blocks, G' = 1000 -> 333, 333, 334
        assert_eq!(rate_matched_lengths(3, 2 * 2 * 1000, 2, 2).unwrap(), vec![1332, 1332, 1336]);
        assert!(rate_matched_lengths(0, 100, 1, 2).is_err());
    }
}
