//! MMSE MIMO equalization
//!
//! Per resource element, with `H` the R x L channel (Q12):
//!
//! ```text
//! G  = H^H H >> shift0 + nv I      Q(24 - shift0)
//! z  = H^H y >> 12
//! x  = G^-1 z                      via adjugate / determinant
//! ```
//!
//! The per-layer gain `diag(G^-1 H^H H)` (Q12) is returned alongside the
//! symbols; it scales the soft demodulator's decision boundaries.

use crate::channel_estimation::{ChannelEstimate, CHANNEL_SHIFT, NOISE_VARIANCE_SENTINEL};
use crate::matrix::SquareMatrix;
use crate::resource_grid::{FrequencyGrid, PdschAllocation};
use crate::{check_len, PhyError};
use common::{div_round, round_to_i16, saturate_i16, shift_round, FrameParams, C16, MAX_ANTENNAS};
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default right shift applied to Gram-matrix products
pub const DEFAULT_SHIFT0: u32 = 12;

type Ci = Complex<i128>;
type Cf = Complex<f64>;

/// Arithmetic used for the matrix inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualizerArithmetic {
    /// Exact integer cofactor expansion with rounded division
    #[default]
    Fixed,
    /// Double precision, rounded half away from zero at the output
    Float,
}

/// Equalized symbols of one slot
#[derive(Debug, Clone, Default)]
pub struct EqualizedSymbols {
    /// Per layer, in resource-element order (symbol, then subcarrier)
    pub symbols: Vec<Vec<C16>>,
    /// Per layer post-equalization gain, Q12
    pub gains: Vec<Vec<i16>>,
    /// Resource elements that fell back to the default regularization
    pub fallbacks: usize,
}

/// Noise variance on the data scale
///
/// Estimates are measured against pilots sent at `dmrs_amplitude`; the data
/// symbols were sent at `data_amplitude`.
pub fn data_noise_variance(estimate: &ChannelEstimate, dmrs_amplitude: i16, data_amplitude: i16) -> u32 {
    let nv = &estimate.noise_variance;
    if nv.is_empty() || data_amplitude == 0 {
        return NOISE_VARIANCE_SENTINEL;
    }
    let mean = nv.iter().map(|&v| v as u64).sum::<u64>() / nv.len() as u64;
    let dmrs = (dmrs_amplitude as i64).pow(2) as i128;
    let data = (data_amplitude as i64).pow(2) as i128;
    div_round(mean as i128 * dmrs, data).clamp(0, u32::MAX as i128) as u32
}

/// MMSE equalizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmseEqualizer {
    arithmetic: EqualizerArithmetic,
    shift0: u32,
}

impl Default for MmseEqualizer {
    fn default() -> Self {
        Self {
            arithmetic: EqualizerArithmetic::Fixed,
            shift0: DEFAULT_SHIFT0,
        }
    }
}

impl MmseEqualizer {
    pub fn new(arithmetic: EqualizerArithmetic, shift0: u32) -> Result<Self, PhyError> {
        if shift0 > 24 {
            return Err(PhyError::InvalidConfiguration(format!("shift0 {} exceeds 24", shift0)));
        }
        Ok(Self { arithmetic, shift0 })
    }

    pub fn arithmetic(&self) -> EqualizerArithmetic {
        self.arithmetic
    }

    /// Equalize one resource element
    ///
    /// `h[rx][layer]` are Q12 estimates and `y[rx]` the received samples.
    /// Returns `(symbol, gain)` per layer and whether the default noise
    /// variance replaced a singular regularized Gram matrix.
    pub fn equalize_re(&self, h: &[Vec<C16>], y: &[C16], noise_variance: u32) -> Result<(Vec<(C16, i16)>, bool), PhyError> {
        let nb_rx = h.len();
        check_len("received samples", nb_rx, y.len())?;
        let nb_layers = h.first().map_or(0, |row| row.len());
        if nb_layers == 0 || nb_layers > MAX_ANTENNAS {
            return Err(PhyError::UnsupportedLayerCount(nb_layers));
        }
        if let Some(row) = h.iter().find(|row| row.len() != nb_layers) {
            return Err(PhyError::LengthMismatch {
                what: "channel matrix row",
                expected: nb_layers,
                actual: row.len(),
            });
        }

        match self.arithmetic {
            EqualizerArithmetic::Fixed => {
                if let Some(out) = self.fixed(h, y, noise_variance) {
                    return Ok((out, false));
                }
                let fallback = self.fixed(h, y, NOISE_VARIANCE_SENTINEL.max(noise_variance));
                Ok((fallback.unwrap_or_else(|| vec![(C16::new(0, 0), 0); nb_layers]), true))
            }
            EqualizerArithmetic::Float => {
                if let Some(out) = Self::float(h, y, noise_variance) {
                    return Ok((out, false));
                }
                let fallback = Self::float(h, y, NOISE_VARIANCE_SENTINEL.max(noise_variance));
                Ok((fallback.unwrap_or_else(|| vec![(C16::new(0, 0), 0); nb_layers]), true))
            }
        }
    }

    /// Fixed-point path; `None` when the regularized Gram matrix is singular
    fn fixed(&self, h: &[Vec<C16>], y: &[C16], noise_variance: u32) -> Option<Vec<(C16, i16)>> {
        let nb_layers = h[0].len();
        let shift0 = self.shift0;
        let wide = |c: C16| Ci::new(c.re as i128, c.im as i128);
        let round_shift = |v: Ci, s: u32| Ci::new(shift_round(v.re as i64, s) as i128, shift_round(v.im as i64, s) as i128);

        let gram = SquareMatrix::from_fn(nb_layers, |i, j| {
            let acc = h.iter().fold(Ci::new(0, 0), |acc, row| acc + wide(row[i]).conj() * wide(row[j]));
            round_shift(acc, shift0)
        });
        // noise variance is Q12; the Gram matrix is Q(24 - shift0)
        let nv = if shift0 <= CHANNEL_SHIFT {
            (noise_variance as i128) << (CHANNEL_SHIFT - shift0)
        } else {
            shift_round(noise_variance as i64, shift0 - CHANNEL_SHIFT) as i128
        };
        let mut regularized = gram.clone();
        regularized.add_diagonal(Ci::new(nv, 0));

        // Hermitian positive semi-definite plus loading: the determinant is real
        let det = regularized.determinant().re;
        if det <= 0 {
            return None;
        }
        let adj = regularized.adjugate();

        let z: Vec<Ci> = (0..nb_layers)
            .map(|j| {
                let acc = h
                    .iter()
                    .zip(y)
                    .fold(Ci::new(0, 0), |acc, (row, &yr)| acc + wide(row[j]).conj() * wide(yr));
                round_shift(acc, CHANNEL_SHIFT)
            })
            .collect();
        let scale = 1i128 << (24 - shift0);
        let numerators = adj.mul_vec(&z);

        Some(
            (0..nb_layers)
                .map(|l| {
                    let x = numerators[l] * scale;
                    let symbol = C16::new(
                        saturate_i16(clamp_i64(div_round(x.re, det))),
                        saturate_i16(clamp_i64(div_round(x.im, det))),
                    );
                    let gain = div_round(adj.product_diagonal(&gram, l).re << CHANNEL_SHIFT, det);
                    (symbol, saturate_i16(clamp_i64(gain)))
                })
                .collect(),
        )
    }

    /// Floating-point path; `None` when the regularized Gram matrix is singular
    fn float(h: &[Vec<C16>], y: &[C16], noise_variance: u32) -> Option<Vec<(C16, i16)>> {
        let nb_layers = h[0].len();
        let unit = (1u32 << CHANNEL_SHIFT) as f64;
        let hf: Vec<Vec<Cf>> = h
            .iter()
            .map(|row| row.iter().map(|c| Cf::new(c.re as f64 / unit, c.im as f64 / unit)).collect())
            .collect();

        let gram = SquareMatrix::from_fn(nb_layers, |i, j| {
            hf.iter().fold(Cf::new(0.0, 0.0), |acc, row| acc + row[i].conj() * row[j])
        });
        let mut regularized = gram.clone();
        regularized.add_diagonal(Cf::new(noise_variance as f64 / unit, 0.0));

        let det = regularized.determinant().re;
        if det.abs() < 1e-12 {
            return None;
        }
        let adj = regularized.adjugate();
        let z: Vec<Cf> = (0..nb_layers)
            .map(|j| {
                hf.iter()
                    .zip(y)
                    .fold(Cf::new(0.0, 0.0), |acc, (row, yr)| acc + row[j].conj() * Cf::new(yr.re as f64, yr.im as f64))
            })
            .collect();
        let numerators = adj.mul_vec(&z);

        Some(
            (0..nb_layers)
                .map(|l| {
                    let x = numerators[l] / det;
                    let gain = adj.product_diagonal(&gram, l).re / det * unit;
                    (C16::new(round_to_i16(x.re), round_to_i16(x.im)), round_to_i16(gain))
                })
                .collect(),
        )
    }

    /// Equalize every data resource element of an allocation
    pub fn equalize(
        &self,
        fp: &FrameParams,
        grid: &FrequencyGrid,
        estimate: &ChannelEstimate,
        alloc: &PdschAllocation,
        noise_variance: u32,
    ) -> Result<EqualizedSymbols, PhyError> {
        let nb_layers = alloc.nb_layers();
        let nb_rx = grid.nb_antennas();
        check_len("channel estimate layers", nb_layers, estimate.nb_layers())?;
        check_len("channel estimate antennas", nb_rx, estimate.nb_rx())?;

        let symbols: Vec<usize> = (alloc.start_symbol..alloc.start_symbol + alloc.nb_symbols).collect();
        let per_symbol = symbols
            .par_iter()
            .map(|&l| {
                let mut out = vec![Vec::new(); nb_layers];
                let mut fallbacks = 0usize;
                for k in alloc.data_subcarriers(l) {
                    let h: Vec<Vec<C16>> = (0..nb_rx)
                        .map(|rx| (0..nb_layers).map(|layer| estimate.get(layer, rx, k)).collect())
                        .collect();
                    let y: Vec<C16> = (0..nb_rx).map(|rx| grid.re(fp, rx, l, k)).collect();
                    let (values, fallback) = self.equalize_re(&h, &y, noise_variance)?;
                    fallbacks += fallback as usize;
                    for (layer, value) in values.into_iter().enumerate() {
                        out[layer].push(value);
                    }
                }
                Ok((out, fallbacks))
            })
            .collect::<Result<Vec<_>, PhyError>>()?;

        let mut result = EqualizedSymbols {
            symbols: vec![Vec::with_capacity(alloc.nb_data_res()); nb_layers],
            gains: vec![Vec::with_capacity(alloc.nb_data_res()); nb_layers],
            fallbacks: 0,
        };
        for (layers, fallbacks) in per_symbol {
            result.fallbacks += fallbacks;
            for (layer, values) in layers.into_iter().enumerate() {
                for (symbol, gain) in values {
                    result.symbols[layer].push(symbol);
                    result.gains[layer].push(gain);
                }
            }
        }

        if result.fallbacks > 0 {
            warn!(
                "MMSE: {} resource elements used the default noise variance {}",
                result.fallbacks, NOISE_VARIANCE_SENTINEL
            );
        }
        debug!(
            "MMSE equalized {} REs x {} layers from {} antennas ({:?}, nv={})",
            alloc.nb_data_res(),
            nb_layers,
            nb_rx,
            self.arithmetic,
            noise_variance
        );
        Ok(result)
    }
}

#[inline]
fn clamp_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
