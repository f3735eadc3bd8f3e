//! Flooding normalized min-sum LDPC decoder
//!
//! Messages are integers; channel LLRs are 8-bit with positive values
//! favouring bit 0. A variable whose posterior is exactly zero carries no
//! information and blocks convergence.

use super::base_graph::LiftedGraph;
use super::{DecodeOutput, LdpcParams, OutputMode};
use crate::{check_len, PhyError};
use common::pack_bits;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Message magnitude bound
const MAX_MESSAGE: i32 = 1023;

/// Posterior assigned to filler bits (known zero)
const PINNED_LLR: i32 = MAX_MESSAGE;

/// Caller-supplied CRC check over packed K' bits
pub type CrcCheck<'a> = &'a (dyn Fn(&[u8], usize) -> bool + Sync);

#[inline]
fn normalize(magnitude: i32) -> i32 {
    // 0.75 scaling, rounded
    (magnitude * 3 + 2) >> 2
}

/// LDPC decoder for one code block configuration
#[derive(Debug, Clone)]
pub struct LdpcDecoder {
    graph: LiftedGraph,
    params: LdpcParams,
}

impl LdpcDecoder {
    pub fn new(params: LdpcParams) -> Result<Self, PhyError> {
        let graph = LiftedGraph::new(params.base_graph, params.lifting_size)?;
        Ok(Self { graph, params })
    }

    pub fn params(&self) -> &LdpcParams {
        &self.params
    }

    /// Block rows taking part in decoding: the core plus every extension row
    /// whose parity column received any soft information
    fn active_rows(&self, llrs: &[i8]) -> usize {
        let z = self.params.lifting_size;
        let kb = self.params.base_graph.systematic_columns();
        let last_column = (0..self.params.base_graph.columns())
            .rev()
            .find(|&c| llrs[c * z..(c + 1) * z].iter().any(|&l| l != 0));
        match last_column {
            Some(c) if c >= kb => (c + 1 - kb).clamp(4, self.graph.nb_rows()),
            _ => 4,
        }
    }

    /// Decode one code block
    ///
    /// `llrs` covers the full codeword (`codeword_len()`), with zeros at
    /// punctured or untransmitted positions. Decoding stops early when no bit
    /// is erased and either every active parity check holds or `crc_check`
    /// accepts the hard decisions. `abort` is polled once per iteration.
    pub fn decode(
        &self,
        llrs: &[i8],
        crc_check: Option<CrcCheck<'_>>,
        abort: Option<&AtomicBool>,
    ) -> Result<DecodeOutput, PhyError> {
        let z = self.params.lifting_size;
        let kb = self.params.base_graph.systematic_columns();
        let n = self.graph.codeword_len();
        check_len("LDPC decoder input", n, llrs.len())?;

        let k_prime = self.params.k_prime;
        let k = self.params.k();
        let active_rows = self.active_rows(llrs);
        let active_vars = (kb + active_rows) * z;

        let mut channel: Vec<i32> = llrs.iter().map(|&l| l as i32).collect();
        for c in channel.iter_mut().take(k).skip(k_prime) {
            *c = PINNED_LLR;
        }

        let offsets: Vec<usize> = (0..active_rows)
            .scan(0, |acc, r| {
                let start = *acc;
                *acc += self.graph.row(r).len() * z;
                Some(start)
            })
            .collect();
        let nb_messages = self.graph.nb_edges(active_rows) * z;
        let mut c2v = vec![0i32; nb_messages];
        let mut next_c2v = vec![0i32; nb_messages];
        let mut posterior = channel.clone();
        let mut hard = vec![0u8; n];
        let mut scratch = Vec::new();

        let mut iterations = 0u8;
        let mut parity_ok = false;
        let mut crc_ok = false;
        let mut aborted = false;

        while iterations < self.params.max_iterations {
            if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                aborted = true;
                break;
            }

            // check node update
            for r in 0..active_rows {
                let row = self.graph.row(r);
                for i in 0..z {
                    scratch.clear();
                    let mut negative = false;
                    let (mut min1, mut min2, mut argmin) = (i32::MAX, i32::MAX, 0);
                    for (e_idx, e) in row.iter().enumerate() {
                        let var = e.column * z + (i + e.shift) % z;
                        let msg = offsets[r] + e_idx * z + i;
                        let v2c = (posterior[var] - c2v[msg]).clamp(-MAX_MESSAGE, MAX_MESSAGE);
                        scratch.push(v2c);
                        negative ^= v2c < 0;
                        let mag = v2c.abs();
                        if mag < min1 {
                            min2 = min1;
                            min1 = mag;
                            argmin = e_idx;
                        } else if mag < min2 {
                            min2 = mag;
                        }
                    }
                    for (e_idx, &v2c) in scratch.iter().enumerate() {
                        let mag = normalize(if e_idx == argmin { min2 } else { min1 });
                        let sign_out = negative ^ (v2c < 0);
                        let msg = offsets[r] + e_idx * z + i;
                        next_c2v[msg] = if sign_out { -mag } else { mag };
                    }
                }
            }
            std::mem::swap(&mut c2v, &mut next_c2v);

            // variable node update
            posterior.copy_from_slice(&channel);
            for r in 0..active_rows {
                for (e_idx, e) in self.graph.row(r).iter().enumerate() {
                    let base = offsets[r] + e_idx * z;
                    for i in 0..z {
                        posterior[e.column * z + (i + e.shift) % z] += c2v[base + i];
                    }
                }
            }
            for p in posterior.iter_mut().take(k).skip(k_prime) {
                *p = PINNED_LLR;
            }
            iterations += 1;

            let mut erased = 0usize;
            for (h, &p) in hard.iter_mut().zip(posterior.iter()).take(active_vars) {
                *h = (p < 0) as u8;
                erased += (p == 0) as usize;
            }

            parity_ok = erased == 0 && self.graph.syndrome_ok(&hard, active_rows);
            crc_ok = match crc_check {
                Some(check) if erased == 0 => check(&pack_bits(&hard[..k_prime]), k_prime),
                _ => false,
            };
            trace!(
                "LDPC iteration {}: erased={}, parity_ok={}, crc_ok={}",
                iterations,
                erased,
                parity_ok,
                crc_ok
            );
            if parity_ok || crc_ok {
                break;
            }
        }

        let bits = match self.params.output_mode {
            OutputMode::Packed => pack_bits(&hard[..k_prime]).to_vec(),
            OutputMode::BytePerBit => hard[..k_prime].to_vec(),
        };

        debug!(
            "LDPC decoded: K'={}, active_rows={}, iterations={}, parity_ok={}, crc_ok={}, aborted={}",
            k_prime, active_rows, iterations, parity_ok, crc_ok, aborted
        );

        Ok(DecodeOutput {
            bits,
            iterations,
            parity_ok,
            crc_ok,
            aborted,
        })
    }
}
