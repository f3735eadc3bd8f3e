//! Systematic LDPC encoding
//! Based on 3GPP TS 38.212 Section 5.3.2

use super::base_graph::LiftedGraph;
use super::LdpcParams;
use crate::{check_len, PhyError};
use common::get_bit;
use tracing::debug;

/// LDPC encoder for one code block configuration
#[derive(Debug, Clone)]
pub struct LdpcEncoder {
    graph: LiftedGraph,
    params: LdpcParams,
    /// Shift left on the first parity column after summing the core rows
    p0_shift: usize,
}

impl LdpcEncoder {
    pub fn new(params: LdpcParams) -> Result<Self, PhyError> {
        let graph = LiftedGraph::new(params.base_graph, params.lifting_size)?;
        let p0_shift = core_residual_shift(&graph)?;
        Ok(Self { graph, params, p0_shift })
    }

    pub fn params(&self) -> &LdpcParams {
        &self.params
    }

    pub fn graph(&self) -> &LiftedGraph {
        &self.graph
    }

    /// Encode K' packed information bits into the full codeword, one bit per byte
    ///
    /// Filler positions K'..K are zero. The first K bits of the output are the
    /// systematic bits; the codeword is `68 * Zc` (BG1) or `52 * Zc` (BG2) long.
    pub fn encode(&self, info: &[u8], num_bits: usize) -> Result<Vec<u8>, PhyError> {
        check_len("LDPC information bits", self.params.k_prime, num_bits)?;
        if info.len() * 8 < num_bits {
            return Err(PhyError::LengthMismatch {
                what: "LDPC information buffer",
                expected: (num_bits + 7) / 8,
                actual: info.len(),
            });
        }

        let z = self.params.lifting_size;
        let kb = self.params.base_graph.systematic_columns();
        let mut codeword = vec![0u8; self.graph.codeword_len()];
        for (i, bit) in codeword.iter_mut().take(num_bits).enumerate() {
            *bit = get_bit(info, i);
        }

        // lambda_r = sum over the systematic circulants of core row r
        let mut lambda = vec![vec![0u8; z]; CORE_ROWS];
        for (r, acc) in lambda.iter_mut().enumerate() {
            for e in self.graph.row(r).iter().filter(|e| e.column < kb) {
                xor_shifted(acc, &codeword[e.column * z..(e.column + 1) * z], e.shift);
            }
        }

        // Summing the core rows leaves P^s * p0 = sum(lambda)
        let mut core: Vec<Option<Vec<u8>>> = vec![None; CORE_ROWS];
        let mut p0 = vec![0u8; z];
        for i in 0..z {
            p0[(i + self.p0_shift) % z] = lambda.iter().fold(0, |acc, l| acc ^ l[i]);
        }
        core[0] = Some(p0);

        // Each remaining core parity column is the last unknown of some core row
        while core.iter().any(Option::is_none) {
            let mut progress = false;
            for r in 0..CORE_ROWS {
                let row = self.graph.row(r);
                let mut unknown = row
                    .iter()
                    .filter(|e| e.column >= kb && core[e.column - kb].is_none());
                let (target, rest) = (unknown.next(), unknown.next());
                let target = match (target, rest) {
                    (Some(t), None) => *t,
                    _ => continue,
                };
                let mut acc = lambda[r].clone();
                for e in row.iter().filter(|e| e.column >= kb && e.column != target.column) {
                    if let Some(block) = &core[e.column - kb] {
                        xor_shifted(&mut acc, block, e.shift);
                    }
                }
                let mut parity = vec![0u8; z];
                for (i, &a) in acc.iter().enumerate() {
                    parity[(i + target.shift) % z] = a;
                }
                core[target.column - kb] = Some(parity);
                progress = true;
            }
            if !progress {
                return Err(PhyError::InvalidLdpcParams(format!(
                    "core parity of {:?} with Zc={} is not solvable",
                    self.params.base_graph, z
                )));
            }
        }
        for (j, parity) in core.into_iter().flatten().enumerate() {
            codeword[(kb + j) * z..(kb + j + 1) * z].copy_from_slice(&parity);
        }

        // Extension rows carry a single identity parity column each
        for r in CORE_ROWS..self.graph.nb_rows() {
            let own = kb + r;
            let mut parity = vec![0u8; z];
            for e in self.graph.row(r).iter().filter(|e| e.column != own) {
                xor_shifted(&mut parity, &codeword[e.column * z..(e.column + 1) * z], e.shift);
            }
            codeword[own * z..(own + 1) * z].copy_from_slice(&parity);
        }

        debug!(
            "LDPC encoded: base_graph={:?}, Zc={}, K'={}, K={}, N={}",
            self.params.base_graph,
            z,
            self.params.k_prime,
            self.params.k(),
            codeword.len()
        );

        Ok(codeword)
    }
}

/// Block rows whose parity columns form the dual-diagonal core
const CORE_ROWS: usize = 4;

/// acc[i] ^= block[(i + shift) % Zc]
fn xor_shifted(acc: &mut [u8], block: &[u8], shift: usize) {
    let z = block.len();
    for (i, a) in acc.iter_mut().enumerate() {
        *a ^= block[(i + shift) % z];
    }
}

/// Shift of the first parity column that survives the sum of the core rows
///
/// Every other core parity column appears in exactly two core rows with equal
/// shifts, so the sum must leave one circulant on the first parity column.
fn core_residual_shift(graph: &LiftedGraph) -> Result<usize, PhyError> {
    let kb = graph.base_graph().systematic_columns();
    for column in kb + 1..kb + CORE_ROWS {
        let shifts: Vec<usize> = (0..CORE_ROWS)
            .flat_map(|r| graph.row(r).iter().filter(|e| e.column == column).map(|e| e.shift).collect::<Vec<_>>())
            .collect();
        if shifts.len() != 2 || shifts[0] != shifts[1] {
            return Err(PhyError::InvalidLdpcParams(format!(
                "parity column {} of {:?} does not cancel in the core",
                column,
                graph.base_graph()
            )));
        }
    }

    let mut shifts: Vec<usize> = (0..CORE_ROWS)
        .flat_map(|r| graph.row(r).iter().filter(|e| e.column == kb).map(|e| e.shift).collect::<Vec<_>>())
        .collect();
    shifts.sort_unstable();
    let mut residual: Vec<usize> = Vec::with_capacity(shifts.len());
    for s in shifts {
        if residual.last() == Some(&s) {
            residual.pop();
        } else {
            residual.push(s);
        }
    }
    match residual.as_slice() {
        [s] => Ok(*s),
        _ => Err(PhyError::InvalidLdpcParams(format!(
            "first parity column of {:?} with Zc={} is singular",
            graph.base_graph(),
            graph.zc()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldpc::LdpcBaseGraph;
    use common::pack_bits;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_bits(rng: &mut StdRng, n: usize) -> Vec<u8> {
        (0..n).map(|_| rng.gen_range(0..2u8)).collect()
    }

    #[test]
    fn test_systematic_and_parity_checks() {
        let mut rng = StdRng::seed_from_u64(1);
        for (bg, zc, k_prime) in [
            (LdpcBaseGraph::BaseGraph1, 256, 5632),
            (LdpcBaseGraph::BaseGraph1, 16, 300),
            (LdpcBaseGraph::BaseGraph2, 384, 3840),
            (LdpcBaseGraph::BaseGraph2, 7, 60),
        ] {
            let params = LdpcParams::new(bg, zc, k_prime).unwrap();
            let encoder = LdpcEncoder::new(params).unwrap();
            let bits = random_bits(&mut rng, k_prime);
            let codeword = encoder.encode(&pack_bits(&bits), k_prime).unwrap();

            assert_eq!(&codeword[..k_prime], &bits[..]);
            assert!(codeword[k_prime..encoder.params().k()].iter().all(|&b| b == 0));
            assert!(encoder.graph().syndrome_ok(&codeword, encoder.graph().nb_rows()));
        }
    }

    #[test]
    fn test_every_lifting_set_encodes() {
        // one lifting size per set, including the 105 shift of BG1 set 6
        // and the moved p0 circulant of BG2 sets 3 and 7
        let mut rng = StdRng::seed_from_u64(2);
        for bg in [LdpcBaseGraph::BaseGraph1, LdpcBaseGraph::BaseGraph2] {
            for zc in [64, 384, 320, 224, 288, 352, 208, 240, 13, 15, 7] {
                let k_prime = bg.systematic_columns() * zc;
                let params = LdpcParams::new(bg, zc, k_prime).unwrap();
                let encoder = LdpcEncoder::new(params).unwrap();
                let bits = random_bits(&mut rng, k_prime);
                let codeword = encoder.encode(&pack_bits(&bits), k_prime).unwrap();
                assert!(
                    encoder.graph().syndrome_ok(&codeword, encoder.graph().nb_rows()),
                    "{:?} Zc={}",
                    bg,
                    zc
                );
            }
        }
    }

    #[test]
    fn test_single_bit_codeword() {
        // BG2, Zc=2 (set 0): row-0 shifts of column 0 are odd in rows 0..2,
        // p0 has shift 1 in rows 0 and 3 and shift 0 in row 2
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 2, 8).unwrap();
        let encoder = LdpcEncoder::new(params).unwrap();
        let codeword = encoder.encode(&[0x80], 8).unwrap();

        assert_eq!(codeword[0], 1);
        assert!(codeword[1..20].iter().all(|&b| b == 0));
        assert_eq!(&codeword[20..28], &[0, 1, 1, 1, 1, 0, 1, 0]);
        // row 4: columns 0 and 11 with odd shifts, column 1 empty
        assert_eq!(&codeword[28..30], &[1, 0]);
        assert!(encoder.graph().syndrome_ok(&codeword, encoder.graph().nb_rows()));
    }

    #[test]
    fn test_zero_information_gives_zero_codeword() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 208, 4000).unwrap();
        let encoder = LdpcEncoder::new(params).unwrap();
        let codeword = encoder.encode(&[0u8; 500], 4000).unwrap();
        assert_eq!(codeword.len(), 68 * 208);
        assert!(codeword.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 8, 80).unwrap();
        let encoder = LdpcEncoder::new(params).unwrap();
        assert!(encoder.encode(&[0u8; 10], 79).is_err());
        assert!(encoder.encode(&[0u8; 9], 80).is_err());
    }
}
