//! LDPC rate matching and rate recovery
//! Based on 3GPP TS 38.212 Section 5.4.2

use super::LdpcParams;
use crate::{check_len, PhyError};
use tracing::debug;

/// LDPC rate matcher for one code block configuration
///
/// Selection reads the circular buffer `d = codeword[2*Zc..]` of length N_cb
/// from k0(rv), skipping filler bits and wrapping around; bit interleaving
/// writes the E selected bits row-wise into Qm rows and reads column-wise.
#[derive(Debug, Clone)]
pub struct LdpcRateMatcher {
    params: LdpcParams,
}

impl LdpcRateMatcher {
    pub fn new(params: LdpcParams) -> Self {
        Self { params }
    }

    /// Starting position k0 for a redundancy version (Table 5.4.2.1-2)
    pub fn k0(&self, rv: u8) -> Result<usize, PhyError> {
        if rv > 3 {
            return Err(PhyError::InvalidLdpcParams(format!("redundancy version {}", rv)));
        }
        let (numerators, denominator) = self.params.base_graph.rv_fractions();
        let z = self.params.lifting_size;
        let n_cb = self.params.circular_buffer_len();
        Ok((numerators[rv as usize] * n_cb / (denominator * z)) * z)
    }

    /// Full-codeword index of every selected bit, in selection order
    fn selection(&self, e: usize, rv: u8, qm: usize) -> Result<Vec<usize>, PhyError> {
        if qm == 0 || e % qm != 0 {
            return Err(PhyError::InvalidConfiguration(format!(
                "rate-matched length {} is not a multiple of Qm={}",
                e, qm
            )));
        }
        let z = self.params.lifting_size;
        let n_cb = self.params.circular_buffer_len();
        let filler_start = self.params.k_prime;
        let filler_end = self.params.k();
        let k0 = self.k0(rv)?;

        let mut positions = Vec::with_capacity(e);
        let mut j = 0;
        while positions.len() < e {
            let full = (k0 + j) % n_cb + 2 * z;
            if full < filler_start || full >= filler_end {
                positions.push(full);
            }
            j += 1;
        }
        Ok(positions)
    }

    /// Select and interleave E bits from a one-bit-per-byte codeword
    pub fn rate_match(&self, codeword: &[u8], e: usize, rv: u8, qm: usize) -> Result<Vec<u8>, PhyError> {
        check_len("codeword", self.params.codeword_len(), codeword.len())?;
        let positions = self.selection(e, rv, qm)?;
        let rows = e / qm;

        let mut output = vec![0u8; e];
        for (idx, &pos) in positions.iter().enumerate() {
            let (i, j) = (idx / rows, idx % rows);
            output[i + j * qm] = codeword[pos];
        }

        debug!(
            "Rate matched N={} to E={} bits (rv={}, Qm={}, k0={})",
            codeword.len(),
            e,
            rv,
            qm,
            positions.first().copied().unwrap_or_default()
        );
        Ok(output)
    }

    /// Deinterleave E soft bits and accumulate them into a full-codeword buffer
    ///
    /// `combined` is `codeword_len()` long and may already hold LLRs of earlier
    /// transmissions. Accumulation saturates at the i16 range.
    pub fn rate_recover(
        &self,
        llrs: &[i8],
        rv: u8,
        qm: usize,
        combined: &mut [i16],
    ) -> Result<(), PhyError> {
        check_len("soft combining buffer", self.params.codeword_len(), combined.len())?;
        let e = llrs.len();
        let positions = self.selection(e, rv, qm)?;
        let rows = e / qm;

        for (idx, &pos) in positions.iter().enumerate() {
            let (i, j) = (idx / rows, idx % rows);
            combined[pos] = combined[pos].saturating_add(llrs[i + j * qm] as i16);
        }

        debug!("Rate recovered E={} soft bits (rv={}, Qm={})", e, rv, qm);
        Ok(())
    }
}

/// Saturate combined soft bits to the decoder's 8-bit input range
pub fn to_decoder_llrs(combined: &[i16]) -> Vec<i8> {
    combined.iter().map(|&l| l.clamp(-127, 127) as i8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldpc::LdpcBaseGraph;

    fn ramp(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 2) as u8).collect()
    }

    #[test]
    fn test_k0_bg1() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 256, 5632).unwrap();
        let rm = LdpcRateMatcher::new(params);
        assert_eq!(rm.k0(0).unwrap(), 0);
        assert_eq!(rm.k0(1).unwrap(), 17 * 256);
        assert_eq!(rm.k0(2).unwrap(), 33 * 256);
        assert_eq!(rm.k0(3).unwrap(), 56 * 256);
        assert!(rm.k0(4).is_err());
    }

    #[test]
    fn test_k0_bg2() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 64, 640).unwrap();
        let rm = LdpcRateMatcher::new(params);
        assert_eq!(rm.k0(1).unwrap(), 13 * 64);
        assert_eq!(rm.k0(3).unwrap(), 43 * 64);
    }

    #[test]
    fn test_selection_skips_punctured_and_fillers() {
        // K = 10 * 8 = 80, K' = 70: fillers at codeword positions 70..80
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 8, 70).unwrap();
        let rm = LdpcRateMatcher::new(params.clone());
        let positions = rm.selection(100, 0, 2).unwrap();
        assert_eq!(positions[0], 16);
        assert!(positions.iter().all(|&p| !(70..80).contains(&p)));
        assert_eq!(positions[54], 80);
    }

    #[test]
    fn test_repetition_wraps() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 4, 40).unwrap();
        let rm = LdpcRateMatcher::new(params.clone());
        let n_cb = params.circular_buffer_len();
        let positions = rm.selection(n_cb + 8, 0, 2).unwrap();
        assert_eq!(positions[n_cb], positions[0]);
    }

    #[test]
    fn test_interleaver_layout() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph2, 4, 40).unwrap();
        let rm = LdpcRateMatcher::new(params.clone());
        let mut codeword = vec![0u8; params.codeword_len()];
        // first selected bits are codeword[8..]
        codeword[8] = 1;
        codeword[9] = 1;
        let out = rm.rate_match(&codeword, 12, 0, 4).unwrap();
        // e_0 and e_1 land at f_0 and f_4 (row 0 holds e_0..e_2)
        assert_eq!(out, vec![1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_recover_inverts_match() {
        let params = LdpcParams::new(LdpcBaseGraph::BaseGraph1, 16, 352).unwrap();
        let rm = LdpcRateMatcher::new(params.clone());
        let codeword = ramp(params.codeword_len());
        let e = 600;
        let tx = rm.rate_match(&codeword, e, 2, 6).unwrap();
        let llrs: Vec<i8> = tx.iter().map(|&b| if b == 0 { 10 } else { -10 }).collect();

        let mut combined = vec![0i16; params.codeword_len()];
        rm.rate_recover(&llrs, 2, 6, &mut combined).unwrap();
        let positions = rm.selection(e, 2, 6).unwrap();
        for &p in &positions {
            let expected = if codeword[p] == 0 { 10 } else { -10 };
            assert_eq!(combined[p], expected);
        }
        assert!(combined[..32].iter().all(|&l| l == 0));

        // a second transmission accumulates
        rm.rate_recover(&llrs, 2, 6, &mut combined).unwrap();
        assert_eq!(combined[positions[0]].abs(), 20);
        assert_eq!(to_decoder_llrs(&[300, -300, 5]), vec![127, -127, 5]);
    }
}
