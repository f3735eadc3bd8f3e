//! Stage drivers
//!
//! Every stage prepares its inputs from the configured carrier and PDSCH
//! once, then times only the stage call itself.

use crate::config::BenchConfig;
use anyhow::{Context, Result};
use common::{FrameParams, C16};
use nr_phy::constellation::modulate;
use nr_phy::crc::CRC24A;
use nr_phy::demodulation::channel_magnitudes;
use nr_phy::ldpc::segmentation::rate_matched_lengths;
use nr_phy::ldpc::LdpcRateMatcher;
use nr_phy::mmse::{data_noise_variance, EqualizedSymbols};
use nr_phy::pdsch::TxSlot;
use nr_phy::precoding::{Precoder, PrecodingMatrix};
use nr_phy::{
    compute_crc24a, demap_layers, descramble_llrs, map_layers, scramble, verify_crc24a, ActiveCodewords,
    ChannelEstimate, ChannelEstimator, DftKernel, DlschReceiver, DlschTransmitter, FrequencyGrid, LdpcEncoder,
    MmseEqualizer, OfdmFrontEnd, PdschConfig, ReceiverStats, SoftDemodulator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Timing and outcome of one stage run
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub iterations: usize,
    pub total_us: f64,
    pub mean_us: f64,
    pub ok: bool,
    pub details: Value,
}

/// Run `f` `iterations` times, returning the elapsed microseconds
fn time_stage(iterations: usize, mut f: impl FnMut() -> Result<()>) -> Result<f64> {
    let start = Instant::now();
    for _ in 0..iterations {
        f()?;
    }
    Ok(start.elapsed().as_secs_f64() * 1e6)
}

fn random_bits(rng: &mut StdRng, bits: usize) -> Vec<u8> {
    let mut packed: Vec<u8> = (0..(bits + 7) / 8).map(|_| rng.gen()).collect();
    if bits % 8 != 0 {
        if let Some(last) = packed.last_mut() {
            *last &= !(0xFFu8 >> (bits % 8));
        }
    }
    packed
}

pub struct Bench {
    config: BenchConfig,
    iterations: usize,
    rng: StdRng,
    kernel: Arc<dyn DftKernel>,
}

impl Bench {
    pub fn new(config: BenchConfig, iterations: usize, kernel: Arc<dyn DftKernel>) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            iterations: iterations.max(1),
            rng,
            kernel,
        }
    }

    fn fp(&self) -> &FrameParams {
        &self.config.carrier.frame
    }

    fn pdsch(&self) -> &PdschConfig {
        &self.config.pdsch
    }

    fn report(&self, stage: &'static str, total_us: f64, ok: bool, details: Value) -> StageReport {
        StageReport {
            stage,
            iterations: self.iterations,
            total_us,
            mean_us: total_us / self.iterations as f64,
            ok,
            details,
        }
    }

    fn transmitter(&self) -> Result<DlschTransmitter> {
        DlschTransmitter::new(self.fp().clone(), self.pdsch().clone(), self.kernel.clone())
            .context("Failed to build the transmitter")
    }

    fn receiver(&self) -> Result<DlschReceiver> {
        DlschReceiver::new(
            self.fp().clone(),
            self.pdsch().clone(),
            self.config.receiver.clone(),
            self.kernel.clone(),
        )
        .context("Failed to build the receiver")
    }

    /// Transmit one random transport block
    fn transmit(&mut self) -> Result<(Vec<u8>, TxSlot)> {
        let tb_size = self.pdsch().tb_size;
        let payload = random_bits(&mut self.rng, tb_size);
        let slot = self.transmitter()?.transmit(self.config.slot, &payload)?;
        Ok((payload, slot))
    }

    /// Receive antenna `r` hears transmit antenna `r mod Ntx`, plus AWGN
    fn channel(&mut self, tx: &[Vec<C16>]) -> Result<Vec<Vec<C16>>> {
        let noise = Normal::new(0.0, self.config.noise_sigma).context("Invalid noise level")?;
        let nb_rx = self.fp().nb_antennas_rx;
        let rng = &mut self.rng;
        Ok((0..nb_rx)
            .map(|r| {
                tx[r % tx.len()]
                    .iter()
                    .map(|s| {
                        let re = s.re as f64 + noise.sample(rng);
                        let im = s.im as f64 + noise.sample(rng);
                        C16::new(
                            re.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16,
                            im.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16,
                        )
                    })
                    .collect()
            })
            .collect())
    }

    /// Received frequency grid of one transmitted slot
    fn received_grid(&mut self) -> Result<FrequencyGrid> {
        let (_, sent) = self.transmit()?;
        let rx = self.channel(&sent.time)?;
        let ofdm = OfdmFrontEnd::new(self.fp().clone(), self.kernel.clone())?;
        let mut grid = FrequencyGrid::for_rx(self.fp())?;
        ofdm.demodulate_slot(self.config.slot, &rx, &mut grid)?;
        Ok(grid)
    }

    fn estimate(&self, grid: &FrequencyGrid) -> Result<ChannelEstimate> {
        let estimator = ChannelEstimator::new(self.fp().clone(), self.pdsch().dmrs_amplitude);
        Ok(estimator.estimate(grid, &self.pdsch().allocation, self.config.slot)?)
    }

    fn equalize(&self, grid: &FrequencyGrid, estimate: &ChannelEstimate) -> Result<(EqualizedSymbols, u32)> {
        let cfg = self.pdsch();
        let rx = &self.config.receiver;
        let nv = data_noise_variance(estimate, cfg.dmrs_amplitude, cfg.data_amplitude);
        let equalizer = MmseEqualizer::new(rx.arithmetic, rx.shift0)?;
        let equalized = equalizer.equalize(self.fp(), grid, estimate, &cfg.allocation, nv)?;
        Ok((equalized, nv))
    }

    fn layer_llrs(&self, equalized: &EqualizedSymbols) -> Result<Vec<Vec<i16>>> {
        let cfg = self.pdsch();
        let demod = SoftDemodulator::new(cfg.modulation);
        equalized
            .symbols
            .iter()
            .zip(&equalized.gains)
            .map(|(symbols, gains)| {
                let mags = channel_magnitudes(cfg.modulation, gains, cfg.data_amplitude);
                Ok(demod.demodulate(symbols, &mags)?)
            })
            .collect()
    }

    pub fn crc(&mut self) -> Result<StageReport> {
        let a = self.pdsch().tb_size;
        let payload = random_bits(&mut self.rng, a);
        let mut crc = 0u32;
        let total = time_stage(self.iterations, || {
            crc = compute_crc24a(&payload, a);
            Ok(())
        })?;
        Ok(self.report("nr_crc", total, true, json!({ "bits": a, "crc": format!("{:06x}", crc >> 8) })))
    }

    pub fn ldpc_encode(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let seg = cfg.segmentation()?;
        let params = seg.ldpc_params()?;
        let encoder = LdpcEncoder::new(params.clone())?;
        let rate_matcher = LdpcRateMatcher::new(params.clone());
        let payload = random_bits(&mut self.rng, cfg.tb_size);
        let blocks = seg.segment(&payload)?;
        let lengths = rate_matched_lengths(seg.nb_segments, cfg.coded_bits(), cfg.allocation.nb_layers(), cfg.qm())?;

        let total = time_stage(self.iterations, || {
            for (block, &e) in blocks.iter().zip(&lengths) {
                let codeword = encoder.encode(block, seg.k_prime)?;
                rate_matcher.rate_match(&codeword, e, cfg.rv, cfg.qm())?;
            }
            Ok(())
        })?;
        Ok(self.report(
            "nr_ldpc",
            total,
            true,
            json!({
                "base_graph": format!("{:?}", seg.base_graph),
                "segments": seg.nb_segments,
                "k_prime": seg.k_prime,
                "zc": seg.lifting_size,
                "codeword_len": params.codeword_len(),
                "e": lengths,
            }),
        ))
    }

    pub fn scramble(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let g = cfg.coded_bits();
        let bits = random_bits(&mut self.rng, g);
        let mut scrambled = Vec::new();
        let total = time_stage(self.iterations, || {
            scrambled = scramble(&bits, g, cfg.codeword_index, cfg.data_scrambling_id, cfg.rnti)?;
            Ok(())
        })?;
        let flipped: u32 = bits.iter().zip(&scrambled).map(|(a, b)| (a ^ b).count_ones()).sum();
        Ok(self.report("nr_scramble", total, true, json!({ "bits": g, "flipped": flipped })))
    }

    pub fn modulation(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let g = cfg.coded_bits();
        let bits = random_bits(&mut self.rng, g);
        let mut nb_symbols = 0;
        let total = time_stage(self.iterations, || {
            nb_symbols = modulate(&bits, g, cfg.modulation)?.len();
            Ok(())
        })?;
        Ok(self.report(
            "nr_modulation",
            total,
            true,
            json!({ "modulation": format!("{:?}", cfg.modulation), "symbols": nb_symbols }),
        ))
    }

    pub fn layer_mapping(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let g = cfg.coded_bits();
        let symbols = modulate(&random_bits(&mut self.rng, g), g, cfg.modulation)?;
        let nb_layers = cfg.allocation.nb_layers();
        let total = time_stage(self.iterations, || {
            map_layers(&symbols, nb_layers)?;
            Ok(())
        })?;
        Ok(self.report(
            "nr_layermapping",
            total,
            true,
            json!({ "layers": nb_layers, "symbols_per_layer": symbols.len() / nb_layers }),
        ))
    }

    pub fn precoding(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let g = cfg.coded_bits();
        let symbols = modulate(&random_bits(&mut self.rng, g), g, cfg.modulation)?;
        let layers = map_layers(&symbols, cfg.allocation.nb_layers())?;
        let matrix = PrecodingMatrix::identity(self.fp().nb_antennas_tx, cfg.allocation.nb_layers())?;
        let precoder = Precoder::new(self.fp().clone(), matrix)?;
        let mut grid = FrequencyGrid::for_tx(self.fp())?;
        let slot = self.config.slot;
        let total = time_stage(self.iterations, || {
            precoder.precode(&cfg.allocation, slot, &layers, cfg.dmrs_amplitude, &mut grid)?;
            Ok(())
        })?;
        Ok(self.report(
            "nr_precoding",
            total,
            true,
            json!({ "antennas": grid.nb_antennas(), "layers": layers.len() }),
        ))
    }

    pub fn ofdm_modulation(&mut self) -> Result<StageReport> {
        let (_, sent) = self.transmit()?;
        let ofdm = OfdmFrontEnd::new(self.fp().clone(), self.kernel.clone())?;
        let slot = self.config.slot;
        let mut time = vec![vec![C16::new(0, 0); ofdm.buffer_len(slot + 1)]; self.fp().nb_antennas_tx];
        let total = time_stage(self.iterations, || {
            ofdm.modulate_slot(slot, &sent.grid, &mut time)?;
            Ok(())
        })?;
        Ok(self.report(
            "nr_ofdm_mod",
            total,
            time == sent.time,
            json!({ "kernel": self.kernel.name(), "fft_size": self.fp().fft_size, "samples": time[0].len() }),
        ))
    }

    pub fn ofdm_demodulation(&mut self) -> Result<StageReport> {
        let (_, sent) = self.transmit()?;
        let rx = self.channel(&sent.time)?;
        let ofdm = OfdmFrontEnd::new(self.fp().clone(), self.kernel.clone())?;
        let mut grid = FrequencyGrid::for_rx(self.fp())?;
        let slot = self.config.slot;
        let total = time_stage(self.iterations, || {
            ofdm.demodulate_slot(slot, &rx, &mut grid)?;
            Ok(())
        })?;
        Ok(self.report(
            "nr_ofdm_demo",
            total,
            true,
            json!({ "kernel": self.kernel.name(), "fft_size": self.fp().fft_size, "antennas": rx.len() }),
        ))
    }

    pub fn channel_estimation(&mut self) -> Result<StageReport> {
        let grid = self.received_grid()?;
        let mut estimate = None;
        let total = time_stage(self.iterations, || {
            estimate = Some(self.estimate(&grid)?);
            Ok(())
        })?;
        let noise_variance = estimate.map(|e| e.noise_variance).unwrap_or_default();
        Ok(self.report("nr_ch_estimation", total, true, json!({ "noise_variance": noise_variance })))
    }

    pub fn mmse(&mut self) -> Result<StageReport> {
        let grid = self.received_grid()?;
        let estimate = self.estimate(&grid)?;
        let mut outcome = (0usize, 0u32);
        let total = time_stage(self.iterations, || {
            let (equalized, nv) = self.equalize(&grid, &estimate)?;
            outcome = (equalized.fallbacks, nv);
            Ok(())
        })?;
        Ok(self.report(
            "nr_mmse_eq",
            total,
            outcome.0 == 0,
            json!({
                "layers": estimate.nb_layers(),
                "antennas": estimate.nb_rx(),
                "arithmetic": format!("{:?}", self.config.receiver.arithmetic),
                "noise_variance": outcome.1,
                "fallbacks": outcome.0,
            }),
        ))
    }

    pub fn soft_demodulation(&mut self) -> Result<StageReport> {
        let grid = self.received_grid()?;
        let estimate = self.estimate(&grid)?;
        let (equalized, _) = self.equalize(&grid, &estimate)?;
        let mut nb_llrs = 0;
        let total = time_stage(self.iterations, || {
            nb_llrs = self.layer_llrs(&equalized)?.iter().map(Vec::len).sum();
            Ok(())
        })?;
        Ok(self.report("nr_soft_demod", total, true, json!({ "llrs": nb_llrs })))
    }

    pub fn layer_demapping(&mut self) -> Result<StageReport> {
        let grid = self.received_grid()?;
        let estimate = self.estimate(&grid)?;
        let (equalized, _) = self.equalize(&grid, &estimate)?;
        let layer_llrs = self.layer_llrs(&equalized)?;
        let cfg = self.pdsch().clone();
        let active = ActiveCodewords::single(cfg.codeword_index as usize)?;
        let total = time_stage(self.iterations, || {
            demap_layers(&layer_llrs, cfg.allocation.nb_layers(), cfg.qm(), cfg.coded_bits(), active)?;
            Ok(())
        })?;
        Ok(self.report(
            "nr_layer_demapping",
            total,
            true,
            json!({ "layers": layer_llrs.len(), "codeword_llrs": cfg.coded_bits() }),
        ))
    }

    pub fn descrambling(&mut self) -> Result<StageReport> {
        let cfg = self.pdsch().clone();
        let (_, sent) = self.transmit()?;
        let g = cfg.coded_bits();
        // hard LLRs of the transmitted scrambled codeword
        let mut llrs: Vec<i16> = (0..g)
            .map(|i| if common::get_bit(&sent.codeword, i) == 0 { 64 } else { -64 })
            .collect();
        let total = time_stage(self.iterations, || {
            descramble_llrs(&mut llrs, cfg.codeword_index, cfg.data_scrambling_id, cfg.rnti)?;
            Ok(())
        })?;
        Ok(self.report("nr_descrambling", total, true, json!({ "llrs": g })))
    }

    pub fn ldpc_decode(&mut self) -> Result<StageReport> {
        let grid = self.received_grid()?;
        let receiver = self.receiver()?;
        let soft = receiver.soft_bits(self.config.slot, &grid)?;
        let mut outcome = None;
        let total = time_stage(self.iterations, || {
            outcome = Some(receiver.decode(&soft.llrs, None)?);
            Ok(())
        })?;
        let result = outcome.context("decoder produced no result")?;
        Ok(self.report(
            "nr_ldpc_dec",
            total,
            result.tb_crc_ok,
            json!({
                "segments": result.segments,
                "max_iterations": self.config.receiver.max_iterations,
            }),
        ))
    }

    pub fn crc_check(&mut self) -> Result<StageReport> {
        let a = self.pdsch().tb_size;
        let payload = random_bits(&mut self.rng, a);
        let block = CRC24A.attach(&payload, a);
        let mut ok = false;
        let total = time_stage(self.iterations, || {
            ok = verify_crc24a(&block, a + 24);
            Ok(())
        })?;
        Ok(self.report("nr_crc_check", total, ok, json!({ "bits": a + 24 })))
    }

    pub fn dlsch_e2e(&mut self) -> Result<StageReport> {
        let tx = self.transmitter()?;
        let rx = self.receiver()?;
        let slot = self.config.slot;
        let tb_size = self.pdsch().tb_size;
        let mut stats = ReceiverStats::default();
        let mut payload_errors = 0usize;

        let start = Instant::now();
        for i in 0..self.iterations {
            let payload = random_bits(&mut self.rng, tb_size);
            let sent = tx.transmit(slot, &payload)?;
            let received = self.channel(&sent.time)?;
            let result = rx.receive(slot, &received, None)?;
            if result.tb_crc_ok && result.payload != payload {
                payload_errors += 1;
            }
            debug!("e2e run {}: crc_ok={}", i, result.tb_crc_ok);
            stats.merge(&result.stats);
        }
        let total = start.elapsed().as_secs_f64() * 1e6;

        let bler = stats.tb_failed as f64 / stats.slots.max(1) as f64;
        Ok(self.report(
            "nr_dlsch_e2e",
            total,
            stats.tb_failed == 0 && payload_errors == 0,
            json!({
                "bler": bler,
                "undetected_errors": payload_errors,
                "mean_iterations": stats.mean_iterations(),
                "noise_sigma": self.config.noise_sigma,
                "stats": stats,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_phy::default_kernel;

    fn bench(iterations: usize) -> Bench {
        Bench::new(BenchConfig::default(), iterations, default_kernel())
    }

    #[test]
    fn test_every_stage_runs_on_defaults() {
        let mut b = bench(1);
        let reports = [
            b.crc().unwrap(),
            b.ldpc_encode().unwrap(),
            b.scramble().unwrap(),
            b.modulation().unwrap(),
            b.layer_mapping().unwrap(),
            b.precoding().unwrap(),
            b.ofdm_modulation().unwrap(),
            b.ofdm_demodulation().unwrap(),
            b.channel_estimation().unwrap(),
            b.mmse().unwrap(),
            b.soft_demodulation().unwrap(),
            b.layer_demapping().unwrap(),
            b.descrambling().unwrap(),
            b.ldpc_decode().unwrap(),
            b.crc_check().unwrap(),
        ];
        for report in &reports {
            assert!(report.ok, "{}", report.stage);
            assert_eq!(report.iterations, 1);
        }
    }

    #[test]
    fn test_e2e_report() {
        let mut b = bench(2);
        let report = b.dlsch_e2e().unwrap();
        assert!(report.ok);
        assert_eq!(report.details["stats"]["slots"], 2);
        assert_eq!(report.details["bler"], 0.0);
    }

    #[test]
    fn test_zero_iterations_run_once() {
        let mut b = bench(0);
        assert_eq!(b.crc().unwrap().iterations, 1);
    }
}
