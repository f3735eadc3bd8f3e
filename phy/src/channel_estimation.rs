//! DMRS-based channel estimation for PDSCH
//!
//! Least-squares estimates on the pilot resource elements, frequency OCC
//! despreading over adjacent pilot pairs, averaging across DMRS symbols and
//! linear interpolation over the allocated subcarriers. Estimates are Q12
//! (4096 = unit gain) and valid for the whole slot.

use crate::constellation::scale_by_amplitude;
use crate::dmrs::{dmrs_resource_elements, DmrsPort};
use crate::resource_grid::{FrequencyGrid, PdschAllocation};
use crate::{check_len, try_alloc, PhyError};
use common::{div_round, saturate_i16, FrameParams, C16};
use ndarray::{Array3, ArrayView1};
use num_complex::Complex;
use tracing::{debug, warn};

/// Fractional bits of channel estimates
pub const CHANNEL_SHIFT: u32 = 12;

/// Noise variance reported when no pilot was observed
pub const NOISE_VARIANCE_SENTINEL: u32 = 255;

/// Bounds applied to measured noise variance
pub const NOISE_VARIANCE_MIN: u32 = 1;
pub const NOISE_VARIANCE_MAX: u32 = 65_535;

type C64 = Complex<i64>;

#[inline]
fn widen(c: C16) -> C64 {
    C64::new(c.re as i64, c.im as i64)
}

#[inline]
fn narrow(num: C64, den: i64) -> C16 {
    C16::new(
        saturate_i16(div_round(num.re as i128, den as i128) as i64),
        saturate_i16(div_round(num.im as i128, den as i128) as i64),
    )
}

/// Least-squares estimate `Y / P` in Q12
pub fn ls_estimate(received: C16, reference: C16) -> C16 {
    let power = widen(reference).norm_sqr();
    if power == 0 {
        return C16::new(0, 0);
    }
    narrow(widen(received) * widen(reference).conj() * (1 << CHANNEL_SHIFT), power)
}

/// Channel estimate and per-antenna noise variance for one slot
#[derive(Debug, Clone)]
pub struct ChannelEstimate {
    /// Q12 estimates indexed (layer, receive antenna, allocated subcarrier)
    h: Array3<C16>,
    /// Noise power relative to one pilot, Q12, per receive antenna
    pub noise_variance: Vec<u32>,
    /// Carrier subcarrier of index 0 of the estimate
    pub first_subcarrier: usize,
}

impl ChannelEstimate {
    /// Estimate with every coefficient set to `value`, used for known channels
    pub fn flat(
        nb_layers: usize,
        nb_rx: usize,
        first_subcarrier: usize,
        nb_subcarriers: usize,
        value: C16,
        noise_variance: u32,
    ) -> Self {
        Self {
            h: Array3::from_elem((nb_layers, nb_rx, nb_subcarriers), value),
            noise_variance: vec![noise_variance; nb_rx],
            first_subcarrier,
        }
    }

    pub fn nb_layers(&self) -> usize {
        self.h.dim().0
    }

    pub fn nb_rx(&self) -> usize {
        self.h.dim().1
    }

    pub fn nb_subcarriers(&self) -> usize {
        self.h.dim().2
    }

    /// Coefficient of `layer` seen by `rx` at carrier subcarrier `subcarrier`
    #[inline]
    pub fn get(&self, layer: usize, rx: usize, subcarrier: usize) -> C16 {
        self.h[[layer, rx, subcarrier - self.first_subcarrier]]
    }

    /// All coefficients of one (layer, antenna) pair
    pub fn row(&self, layer: usize, rx: usize) -> ArrayView1<'_, C16> {
        self.h.slice(ndarray::s![layer, rx, ..])
    }
}

/// PDSCH channel estimator for one carrier
#[derive(Debug, Clone)]
pub struct ChannelEstimator {
    fp: FrameParams,
    dmrs_amplitude: i16,
}

impl ChannelEstimator {
    /// `dmrs_amplitude` is the Q15 amplitude the transmitter applied to the pilots
    pub fn new(fp: FrameParams, dmrs_amplitude: i16) -> Self {
        Self { fp, dmrs_amplitude }
    }

    /// Pilot values of one port, scaled as transmitted
    fn pilots(&self, alloc: &PdschAllocation, port: &DmrsPort, slot: u32, symbol: usize) -> Vec<(usize, C16)> {
        dmrs_resource_elements(alloc, port, slot, symbol, self.fp.symbols_per_slot())
            .into_iter()
            .map(|(k, p)| (k, scale_by_amplitude(p, self.dmrs_amplitude)))
            .collect()
    }

    /// Estimate every (layer, receive antenna) channel of the allocation
    pub fn estimate(&self, grid: &FrequencyGrid, alloc: &PdschAllocation, slot: u32) -> Result<ChannelEstimate, PhyError> {
        alloc.validate(&self.fp)?;
        check_len("frequency grid bins", self.fp.fft_size, grid.fft_size())?;
        let nb_layers = alloc.nb_layers();
        let nb_rx = grid.nb_antennas();
        let nb_sc = alloc.nb_subcarriers();
        let first = alloc.first_subcarrier();
        let dmrs_symbols = alloc.dmrs_symbols();

        let storage = try_alloc(nb_layers * nb_rx * nb_sc, C16::new(0, 0), "channel estimate")?;
        let mut h = Array3::from_shape_vec((nb_layers, nb_rx, nb_sc), storage)
            .map_err(|e| PhyError::ProcessingError(format!("channel estimate shape: {}", e)))?;

        let ports: Vec<DmrsPort> = alloc
            .dmrs_ports
            .iter()
            .map(|&p| DmrsPort::new(p))
            .collect::<Result<_, _>>()?;

        for (layer, port) in ports.iter().enumerate() {
            let pilots: Vec<Vec<(usize, C16)>> = dmrs_symbols
                .iter()
                .map(|&l| self.pilots(alloc, port, slot, l))
                .collect();
            let nb_pairs = pilots[0].len() / 2;
            // centre subcarrier of pilot pair n
            let centres: Vec<usize> = pilots[0].chunks_exact(2).map(|pair| pair[0].0 + 1).collect();

            for rx in 0..nb_rx {
                let mut pairs = vec![C64::new(0, 0); nb_pairs];
                for (&l, symbol_pilots) in dmrs_symbols.iter().zip(&pilots) {
                    for (n, pair) in symbol_pilots.chunks_exact(2).enumerate() {
                        // despread: the other port of the CDM group cancels over the pair
                        let (k0, p0) = pair[0];
                        let (k1, p1) = pair[1];
                        let y0 = widen(grid.re(&self.fp, rx, l, k0));
                        let y1 = widen(grid.re(&self.fp, rx, l, k1));
                        let num = (y0 * widen(p0).conj() + y1 * widen(p1).conj()) * (1 << CHANNEL_SHIFT);
                        let den = widen(p0).norm_sqr() + widen(p1).norm_sqr();
                        if den != 0 {
                            let ls = narrow(num, den);
                            pairs[n] += widen(ls);
                        }
                    }
                }
                let averaged: Vec<C64> = pairs
                    .iter()
                    .map(|&sum| widen(narrow(sum, dmrs_symbols.len() as i64)))
                    .collect();

                let mut row = h.slice_mut(ndarray::s![layer, rx, ..]);
                for (i, out) in row.iter_mut().enumerate() {
                    *out = interpolate(&centres, &averaged, first + i);
                }
            }
        }

        let noise_variance = (0..nb_rx)
            .map(|rx| self.noise_variance(grid, alloc, slot, &ports, &h, rx))
            .collect::<Vec<_>>();

        debug!(
            "Channel estimate: {} layers x {} rx over {} subcarriers, {} DMRS symbols, noise_variance={:?}",
            nb_layers,
            nb_rx,
            nb_sc,
            dmrs_symbols.len(),
            noise_variance
        );

        Ok(ChannelEstimate {
            h,
            noise_variance,
            first_subcarrier: first,
        })
    }

    /// Mean residual power between received and reconstructed pilots, Q12 of one pilot's power
    fn noise_variance(
        &self,
        grid: &FrequencyGrid,
        alloc: &PdschAllocation,
        slot: u32,
        ports: &[DmrsPort],
        h: &Array3<C16>,
        rx: usize,
    ) -> u32 {
        let first = alloc.first_subcarrier();
        let mut residual_power: i128 = 0;
        let mut pilot_power: i128 = 0;

        for l in alloc.dmrs_symbols() {
            for group in 0..2 {
                let members: Vec<usize> = (0..ports.len()).filter(|&i| ports[i].cdm_group == group).collect();
                if members.is_empty() {
                    continue;
                }
                let pilots: Vec<Vec<(usize, C16)>> = members
                    .iter()
                    .map(|&i| self.pilots(alloc, &ports[i], slot, l))
                    .collect();
                for re in 0..pilots[0].len() {
                    let k = pilots[0][re].0;
                    let mut reconstructed = C64::new(0, 0);
                    for (&layer, layer_pilots) in members.iter().zip(&pilots) {
                        reconstructed += widen(h[[layer, rx, k - first]]) * widen(layer_pilots[re].1);
                    }
                    let reconstructed = widen(narrow(reconstructed, 1 << CHANNEL_SHIFT));
                    let residual = widen(grid.re(&self.fp, rx, l, k)) - reconstructed;
                    residual_power += residual.norm_sqr() as i128;
                    pilot_power += widen(pilots[0][re].1).norm_sqr() as i128;
                }
            }
        }

        if pilot_power == 0 {
            warn!("No DMRS observed on antenna {}, using default noise variance", rx);
            return NOISE_VARIANCE_SENTINEL;
        }
        let nv = div_round(residual_power << CHANNEL_SHIFT, pilot_power);
        nv.clamp(NOISE_VARIANCE_MIN as i128, NOISE_VARIANCE_MAX as i128) as u32
    }
}

/// Linear interpolation between pilot-pair estimates, held flat beyond the ends
fn interpolate(centres: &[usize], values: &[C64], k: usize) -> C16 {
    let last = match centres.len().checked_sub(1) {
        Some(last) => last,
        None => return C16::new(0, 0),
    };
    if k <= centres[0] {
        return narrow(values[0], 1);
    }
    if k >= centres[last] {
        return narrow(values[last], 1);
    }
    let upper = centres.partition_point(|&c| c <= k);
    let lower = upper - 1;
    let (c0, c1) = (centres[lower] as i64, centres[upper] as i64);
    let offset = k as i64 - c0;
    let span = c1 - c0;
    narrow(values[lower] * span + (values[upper] - values[lower]) * offset, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constellation::QPSK_UNIT;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const AMP: i16 = 8192;

    fn cmul_q12(h: C16, x: C16) -> C16 {
        narrow(widen(h) * widen(x), 1 << CHANNEL_SHIFT)
    }

    /// Place the pilots of every port through per-(layer, rx) flat gains
    fn received_pilots(
        fp: &FrameParams,
        alloc: &PdschAllocation,
        slot: u32,
        gains: &[Vec<C16>],
        nb_rx: usize,
    ) -> FrequencyGrid {
        let estimator = ChannelEstimator::new(fp.clone(), AMP);
        let mut grid = FrequencyGrid::new(nb_rx, fp.symbols_per_slot(), fp.fft_size).unwrap();
        for (layer, &p) in alloc.dmrs_ports.iter().enumerate() {
            let port = DmrsPort::new(p).unwrap();
            for l in alloc.dmrs_symbols() {
                for (k, pilot) in estimator.pilots(alloc, &port, slot, l) {
                    for rx in 0..nb_rx {
                        let prev = grid.re(fp, rx, l, k);
                        let add = cmul_q12(gains[layer][rx], pilot);
                        grid.set_re(fp, rx, l, k, C16::new(prev.re + add.re, prev.im + add.im));
                    }
                }
            }
        }
        grid
    }

    #[test]
    fn test_ls_estimate() {
        let p = C16::new(2896, -2896);
        assert_eq!(ls_estimate(p, p), C16::new(4096, 0));
        let y = C16::new(-2896, 2896);
        assert_eq!(ls_estimate(y, p), C16::new(-4096, 0));
        assert_eq!(ls_estimate(y, C16::new(0, 0)), C16::new(0, 0));
    }

    #[test]
    fn test_identity_channel() {
        let fp = FrameParams::default();
        let alloc = PdschAllocation::default();
        let grid = received_pilots(&fp, &alloc, 0, &[vec![C16::new(4096, 0)]], 1);
        let est = ChannelEstimator::new(fp, AMP).estimate(&grid, &alloc, 0).unwrap();

        assert_eq!(est.nb_subcarriers(), 300);
        for k in 0..300 {
            let h = est.get(0, 0, k);
            assert!((h.re - 4096).abs() <= 2 && h.im.abs() <= 2, "k={} h={:?}", k, h);
        }
        assert!(est.noise_variance[0] <= 2);
    }

    #[test]
    fn test_occ_separates_ports_of_one_cdm_group() {
        let fp = FrameParams {
            nb_antennas_rx: 2,
            ..Default::default()
        };
        let alloc = PdschAllocation {
            dmrs_ports: vec![0, 1],
            dmrs_symbol_mask: (1 << 2) | (1 << 11),
            ..Default::default()
        };
        let gains = vec![
            vec![C16::new(4096, 0), C16::new(0, 2048)],
            vec![C16::new(-1024, 3000), C16::new(2000, 2000)],
        ];
        let grid = received_pilots(&fp, &alloc, 5, &gains, 2);
        let est = ChannelEstimator::new(fp, AMP).estimate(&grid, &alloc, 5).unwrap();

        for layer in 0..2 {
            for rx in 0..2 {
                for k in [0, 1, 150, 299] {
                    let h = est.get(layer, rx, k);
                    let g = gains[layer][rx];
                    assert!((h.re - g.re).abs() <= 3 && (h.im - g.im).abs() <= 3, "{} {} {} {:?}", layer, rx, k, h);
                }
            }
        }
    }

    #[test]
    fn test_interpolates_frequency_ramp() {
        let centres = vec![1, 5, 9];
        let values = vec![C64::new(0, 0), C64::new(400, -400), C64::new(400, -400)];
        assert_eq!(interpolate(&centres, &values, 0), C16::new(0, 0));
        assert_eq!(interpolate(&centres, &values, 3), C16::new(200, -200));
        assert_eq!(interpolate(&centres, &values, 4), C16::new(300, -300));
        assert_eq!(interpolate(&centres, &values, 7), C16::new(400, -400));
        assert_eq!(interpolate(&centres, &values, 12), C16::new(400, -400));
    }

    #[test]
    fn test_interpolate_without_pilots() {
        assert_eq!(interpolate(&[], &[], 3), C16::new(0, 0));
        assert_eq!(interpolate(&[4], &[C64::new(8, -8)], 0), C16::new(8, -8));
        assert_eq!(interpolate(&[4], &[C64::new(8, -8)], 9), C16::new(8, -8));
    }

    #[test]
    fn test_noise_variance_tracks_noise() {
        let fp = FrameParams::default();
        let alloc = PdschAllocation::default();
        let mut grid = received_pilots(&fp, &alloc, 0, &[vec![C16::new(4096, 0)]], 1);
        let clean = ChannelEstimator::new(fp.clone(), AMP).estimate(&grid, &alloc, 0).unwrap();

        // pilot amplitude per axis is QPSK_UNIT * AMP >> 15 = 2896; add +-300 noise
        let mut rng = StdRng::seed_from_u64(3);
        for k in 0..300 {
            let v = grid.re(&fp, 0, 2, k);
            let n = C16::new(rng.gen_range(-300..=300), rng.gen_range(-300..=300));
            grid.set_re(&fp, 0, 2, k, C16::new(v.re + n.re, v.im + n.im));
        }
        let noisy = ChannelEstimator::new(fp, AMP).estimate(&grid, &alloc, 0).unwrap();
        assert!(noisy.noise_variance[0] > clean.noise_variance[0]);
        assert!(noisy.noise_variance[0] < 200);
        assert_eq!(QPSK_UNIT * AMP as i32 >> 15, 2896);
    }

    #[test]
    fn test_flat_estimate() {
        let est = ChannelEstimate::flat(2, 2, 12, 24, C16::new(4096, 0), 255);
        assert_eq!(est.get(1, 1, 35), C16::new(4096, 0));
        assert_eq!(est.noise_variance, vec![255, 255]);
        assert_eq!(est.row(0, 1).len(), 24);
    }
}
