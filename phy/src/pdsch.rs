//! DL-SCH / PDSCH processing chains
//! Based on 3GPP TS 38.212 Section 7.2 and TS 38.211 Section 7.3.1
//!
//! The transmitter runs TB CRC, segmentation, LDPC encoding, rate matching,
//! scrambling, modulation, layer mapping, precoding and OFDM modulation. The
//! receiver runs the same stages backwards: FEP, channel estimation, MMSE,
//! soft demodulation, layer demapping, descrambling, rate recovery, LDPC
//! decoding and TB CRC verification.

use crate::channel_estimation::{ChannelEstimate, ChannelEstimator};
use crate::constellation::{modulate, scale_by_amplitude};
use crate::demodulation::{channel_magnitudes, quantize_llrs, SoftDemodulator};
use crate::dft::DftKernel;
use crate::layer_mapping::{demap_layers, map_layers, ActiveCodewords};
use crate::ldpc::rate_matching::to_decoder_llrs;
use crate::ldpc::segmentation::{rate_matched_lengths, select_base_graph};
use crate::ldpc::{CodeBlockSegmentation, DecodeOutput, LdpcDecoder, LdpcEncoder, LdpcRateMatcher, DEFAULT_MAX_ITERATIONS};
use crate::mmse::{data_noise_variance, EqualizerArithmetic, MmseEqualizer, DEFAULT_SHIFT0};
use crate::ofdm::OfdmFrontEnd;
use crate::precoding::{Precoder, PrecodingMatrix};
use crate::resource_grid::{FrequencyGrid, PdschAllocation};
use crate::scrambling::{descramble_llrs, scramble_in_place};
use crate::{check_len, try_alloc, PhyError};
use bytes::Bytes;
use common::{pack_bits, FrameParams, ModulationScheme, Rnti, C16};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn default_rnti() -> Rnti {
    Rnti::SI
}

fn default_code_rate() -> f64 {
    0.5
}

fn default_amplitude() -> i16 {
    8192
}

fn default_max_iterations() -> u8 {
    DEFAULT_MAX_ITERATIONS
}

fn default_llr_shift() -> u32 {
    6
}

fn default_shift0() -> u32 {
    DEFAULT_SHIFT0
}

/// One PDSCH transmission: transport block, codeword and allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdschConfig {
    /// Modulation order of the codeword
    pub modulation: ModulationScheme,
    /// Transport block size in bits (A)
    pub tb_size: usize,
    /// Target code rate, only used to pick the base graph
    #[serde(default = "default_code_rate")]
    pub target_code_rate: f64,
    /// Redundancy version 0..3
    #[serde(default)]
    pub rv: u8,
    /// Scrambling RNTI
    #[serde(default = "default_rnti")]
    pub rnti: Rnti,
    /// Data scrambling identity (0..1023)
    #[serde(default)]
    pub data_scrambling_id: u16,
    /// Codeword index q (0 or 1)
    #[serde(default)]
    pub codeword_index: u8,
    /// Q15 amplitude applied to data symbols
    #[serde(default = "default_amplitude")]
    pub data_amplitude: i16,
    /// Q15 amplitude applied to DMRS
    #[serde(default = "default_amplitude")]
    pub dmrs_amplitude: i16,
    /// Resource allocation and DMRS layout
    #[serde(default)]
    pub allocation: PdschAllocation,
}

impl Default for PdschConfig {
    fn default() -> Self {
        Self {
            modulation: ModulationScheme::Qam64,
            tb_size: 5608,
            target_code_rate: default_code_rate(),
            rv: 0,
            rnti: default_rnti(),
            data_scrambling_id: 0,
            codeword_index: 0,
            data_amplitude: default_amplitude(),
            dmrs_amplitude: default_amplitude(),
            allocation: PdschAllocation::default(),
        }
    }
}

impl PdschConfig {
    /// Check the transmission against the carrier
    pub fn validate(&self, fp: &FrameParams) -> Result<(), PhyError> {
        self.allocation.validate(fp)?;
        if self.tb_size == 0 {
            return Err(PhyError::InvalidConfiguration("empty transport block".into()));
        }
        if self.rv > 3 {
            return Err(PhyError::InvalidConfiguration(format!("redundancy version {}", self.rv)));
        }
        if self.codeword_index > 1 {
            return Err(PhyError::InvalidCodewords(format!("codeword index {}", self.codeword_index)));
        }
        if self.data_scrambling_id > 1023 {
            return Err(PhyError::InvalidConfiguration(format!(
                "data scrambling identity {} exceeds 1023",
                self.data_scrambling_id
            )));
        }
        if self.data_amplitude <= 0 || self.dmrs_amplitude <= 0 {
            return Err(PhyError::InvalidConfiguration("amplitudes must be positive".into()));
        }
        if !(self.target_code_rate > 0.0 && self.target_code_rate < 1.0) {
            return Err(PhyError::InvalidConfiguration(format!(
                "target code rate {}",
                self.target_code_rate
            )));
        }
        Ok(())
    }

    /// Bits per modulation symbol (Qm)
    pub fn qm(&self) -> usize {
        self.modulation.bits_per_symbol()
    }

    /// Coded bits available to the transport block (G)
    pub fn coded_bits(&self) -> usize {
        self.allocation.coded_bits(self.qm())
    }

    /// Code block segmentation of the transport block
    pub fn segmentation(&self) -> Result<CodeBlockSegmentation, PhyError> {
        let base_graph = select_base_graph(self.tb_size, self.target_code_rate);
        CodeBlockSegmentation::new(self.tb_size, base_graph)
    }

    /// Rate-matched length of every code block
    fn block_lengths(&self, seg: &CodeBlockSegmentation) -> Result<Vec<usize>, PhyError> {
        let g = self.coded_bits();
        let nb_layers = self.allocation.nb_layers();
        if g < seg.nb_segments * nb_layers * self.qm() {
            return Err(PhyError::InvalidConfiguration(format!(
                "{} coded bits cannot carry {} code blocks over {} layers",
                g, seg.nb_segments, nb_layers
            )));
        }
        rate_matched_lengths(seg.nb_segments, g, nb_layers, self.qm())
    }
}

/// Receiver tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// LDPC iteration limit
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u8,
    /// Right shift from demodulator LLRs to 8-bit decoder LLRs
    #[serde(default = "default_llr_shift")]
    pub llr_shift: u32,
    /// MMSE matrix arithmetic
    #[serde(default)]
    pub arithmetic: EqualizerArithmetic,
    /// Gram matrix right shift
    #[serde(default = "default_shift0")]
    pub shift0: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            llr_shift: default_llr_shift(),
            arithmetic: EqualizerArithmetic::default(),
            shift0: default_shift0(),
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), PhyError> {
        if self.max_iterations == 0 {
            return Err(PhyError::InvalidConfiguration("LDPC needs at least one iteration".into()));
        }
        if self.llr_shift > 15 {
            return Err(PhyError::InvalidConfiguration(format!("LLR shift {}", self.llr_shift)));
        }
        Ok(())
    }
}

/// Output of one transmitted slot
#[derive(Debug, Clone)]
pub struct TxSlot {
    /// Precoded frequency grid, one per transmit antenna
    pub grid: FrequencyGrid,
    /// Frame-aligned time samples per transmit antenna
    pub time: Vec<Vec<C16>>,
    /// Scrambled codeword, packed (G bits)
    pub codeword: Vec<u8>,
}

/// Builds the time-domain PDSCH signal of one transport block
pub struct DlschTransmitter {
    fp: FrameParams,
    config: PdschConfig,
    segmentation: CodeBlockSegmentation,
    encoder: LdpcEncoder,
    rate_matcher: LdpcRateMatcher,
    precoder: Precoder,
    ofdm: OfdmFrontEnd,
}

impl DlschTransmitter {
    /// Transmitter with identity precoding
    pub fn new(fp: FrameParams, config: PdschConfig, kernel: Arc<dyn DftKernel>) -> Result<Self, PhyError> {
        let matrix = PrecodingMatrix::identity(fp.nb_antennas_tx, config.allocation.nb_layers())?;
        Self::with_precoding(fp, config, matrix, kernel)
    }

    pub fn with_precoding(
        fp: FrameParams,
        config: PdschConfig,
        matrix: PrecodingMatrix,
        kernel: Arc<dyn DftKernel>,
    ) -> Result<Self, PhyError> {
        config.validate(&fp)?;
        let segmentation = config.segmentation()?;
        config.block_lengths(&segmentation)?;
        let params = segmentation.ldpc_params()?;
        let encoder = LdpcEncoder::new(params.clone())?;
        let rate_matcher = LdpcRateMatcher::new(params);
        let precoder = Precoder::new(fp.clone(), matrix)?;
        let ofdm = OfdmFrontEnd::new(fp.clone(), kernel)?;
        Ok(Self {
            fp,
            config,
            segmentation,
            encoder,
            rate_matcher,
            precoder,
            ofdm,
        })
    }

    pub fn config(&self) -> &PdschConfig {
        &self.config
    }

    pub fn segmentation(&self) -> &CodeBlockSegmentation {
        &self.segmentation
    }

    /// Encode and rate match a packed transport block into G bits, one per byte
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, PhyError> {
        let seg = &self.segmentation;
        let lengths = self.config.block_lengths(seg)?;
        let blocks = seg.segment(payload)?;
        let rv = self.config.rv;
        let qm = self.config.qm();

        let coded = blocks
            .par_iter()
            .zip(lengths.par_iter())
            .map(|(block, &e)| {
                let codeword = self.encoder.encode(block, seg.k_prime)?;
                self.rate_matcher.rate_match(&codeword, e, rv, qm)
            })
            .collect::<Result<Vec<_>, PhyError>>()?;

        let bits: Vec<u8> = coded.concat();
        debug!(
            "DL-SCH encoded A={} into {} code blocks, G={}",
            self.config.tb_size,
            seg.nb_segments,
            bits.len()
        );
        Ok(bits)
    }

    /// Encode, modulate and map one slot onto the transmit antennas
    pub fn transmit(&self, slot: u32, payload: &[u8]) -> Result<TxSlot, PhyError> {
        let cfg = &self.config;
        let bits = self.encode(payload)?;
        let g = bits.len();

        let mut codeword = pack_bits(&bits).to_vec();
        scramble_in_place(&mut codeword, g, cfg.codeword_index, cfg.data_scrambling_id, cfg.rnti)?;
        let symbols: Vec<C16> = modulate(&codeword, g, cfg.modulation)?
            .into_iter()
            .map(|s| scale_by_amplitude(s, cfg.data_amplitude))
            .collect();
        let layers = map_layers(&symbols, cfg.allocation.nb_layers())?;

        let mut grid = FrequencyGrid::for_tx(&self.fp)?;
        self.precoder
            .precode(&cfg.allocation, slot, &layers, cfg.dmrs_amplitude, &mut grid)?;

        let len = self.ofdm.buffer_len(slot + 1);
        let mut time = (0..self.fp.nb_antennas_tx)
            .map(|_| try_alloc(len, C16::new(0, 0), "transmit time buffer"))
            .collect::<Result<Vec<_>, _>>()?;
        self.ofdm.modulate_slot(slot, &grid, &mut time)?;

        info!(
            "PDSCH TX slot {}: A={}, G={}, {:?}, {} layer(s), {} code block(s)",
            slot,
            cfg.tb_size,
            g,
            cfg.modulation,
            cfg.allocation.nb_layers(),
            self.segmentation.nb_segments
        );
        Ok(TxSlot { grid, time, codeword })
    }
}

/// Decoder outcome of one code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentResult {
    pub iterations: u8,
    pub parity_ok: bool,
    pub crc_ok: bool,
    pub aborted: bool,
}

impl From<&DecodeOutput> for SegmentResult {
    fn from(out: &DecodeOutput) -> Self {
        Self {
            iterations: out.iterations,
            parity_ok: out.parity_ok,
            crc_ok: out.crc_ok,
            aborted: out.aborted,
        }
    }
}

/// Receiver counters, accumulated across slots by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceiverStats {
    pub slots: u64,
    pub tb_ok: u64,
    pub tb_failed: u64,
    pub segments_decoded: u64,
    pub segments_failed: u64,
    pub segments_aborted: u64,
    pub ldpc_iterations: u64,
    pub mmse_fallbacks: u64,
    /// Data-scale noise variance of the last slot (Q12)
    pub noise_variance: u32,
}

impl ReceiverStats {
    pub fn merge(&mut self, other: &ReceiverStats) {
        self.slots += other.slots;
        self.tb_ok += other.tb_ok;
        self.tb_failed += other.tb_failed;
        self.segments_decoded += other.segments_decoded;
        self.segments_failed += other.segments_failed;
        self.segments_aborted += other.segments_aborted;
        self.ldpc_iterations += other.ldpc_iterations;
        self.mmse_fallbacks += other.mmse_fallbacks;
        self.noise_variance = other.noise_variance;
    }

    /// Mean LDPC iterations per decoded code block
    pub fn mean_iterations(&self) -> f64 {
        if self.segments_decoded == 0 {
            0.0
        } else {
            self.ldpc_iterations as f64 / self.segments_decoded as f64
        }
    }
}

/// Decoded transport block
#[derive(Debug, Clone)]
pub struct RxResult {
    /// Packed payload (A bits), valid only when `tb_crc_ok`
    pub payload: Bytes,
    pub tb_crc_ok: bool,
    pub segments: Vec<SegmentResult>,
    pub stats: ReceiverStats,
}

/// Soft bits of one slot ahead of rate recovery
#[derive(Debug, Clone)]
pub struct SoftBits {
    /// Descrambled 16-bit LLRs of the codeword (G values)
    pub llrs: Vec<i16>,
    pub estimate: ChannelEstimate,
    pub noise_variance: u32,
    pub mmse_fallbacks: usize,
}

/// Recovers one transport block from received samples
pub struct DlschReceiver {
    fp: FrameParams,
    config: PdschConfig,
    rx_config: ReceiverConfig,
    segmentation: CodeBlockSegmentation,
    decoder: LdpcDecoder,
    rate_matcher: LdpcRateMatcher,
    ofdm: OfdmFrontEnd,
    estimator: ChannelEstimator,
    equalizer: MmseEqualizer,
    demodulator: SoftDemodulator,
}

impl DlschReceiver {
    pub fn new(
        fp: FrameParams,
        config: PdschConfig,
        rx_config: ReceiverConfig,
        kernel: Arc<dyn DftKernel>,
    ) -> Result<Self, PhyError> {
        config.validate(&fp)?;
        rx_config.validate()?;
        if config.allocation.nb_layers() > fp.nb_antennas_rx {
            return Err(PhyError::UnsupportedLayerCount(config.allocation.nb_layers()));
        }
        let segmentation = config.segmentation()?;
        config.block_lengths(&segmentation)?;
        let params = segmentation
            .ldpc_params()?
            .with_max_iterations(rx_config.max_iterations);
        let decoder = LdpcDecoder::new(params.clone())?;
        let rate_matcher = LdpcRateMatcher::new(params);
        let ofdm = OfdmFrontEnd::new(fp.clone(), kernel)?;
        let estimator = ChannelEstimator::new(fp.clone(), config.dmrs_amplitude);
        let equalizer = MmseEqualizer::new(rx_config.arithmetic, rx_config.shift0)?;
        let demodulator = SoftDemodulator::new(config.modulation);
        Ok(Self {
            fp,
            config,
            rx_config,
            segmentation,
            decoder,
            rate_matcher,
            ofdm,
            estimator,
            equalizer,
            demodulator,
        })
    }

    pub fn config(&self) -> &PdschConfig {
        &self.config
    }

    pub fn segmentation(&self) -> &CodeBlockSegmentation {
        &self.segmentation
    }

    /// Receive one slot from frame-aligned time samples, one buffer per antenna
    pub fn receive(&self, slot: u32, rx: &[Vec<C16>], abort: Option<&AtomicBool>) -> Result<RxResult, PhyError> {
        let mut grid = FrequencyGrid::for_rx(&self.fp)?;
        self.ofdm.demodulate_slot(slot, rx, &mut grid)?;
        self.receive_grid(slot, &grid, abort)
    }

    /// Receive one slot from an already demodulated grid
    pub fn receive_grid(&self, slot: u32, grid: &FrequencyGrid, abort: Option<&AtomicBool>) -> Result<RxResult, PhyError> {
        let soft = self.soft_bits(slot, grid)?;
        let mut result = self.decode(&soft.llrs, abort)?;
        result.stats.mmse_fallbacks = soft.mmse_fallbacks as u64;
        result.stats.noise_variance = soft.noise_variance;
        Ok(result)
    }

    /// Channel estimation through descrambling
    pub fn soft_bits(&self, slot: u32, grid: &FrequencyGrid) -> Result<SoftBits, PhyError> {
        let cfg = &self.config;
        let alloc = &cfg.allocation;
        let nb_layers = alloc.nb_layers();

        let estimate = self.estimator.estimate(grid, alloc, slot)?;
        let noise_variance = data_noise_variance(&estimate, cfg.dmrs_amplitude, cfg.data_amplitude);
        let equalized = self
            .equalizer
            .equalize(&self.fp, grid, &estimate, alloc, noise_variance)?;

        let layer_llrs = equalized
            .symbols
            .par_iter()
            .zip(equalized.gains.par_iter())
            .map(|(symbols, gains)| {
                let magnitudes = channel_magnitudes(cfg.modulation, gains, cfg.data_amplitude);
                self.demodulator.demodulate(symbols, &magnitudes)
            })
            .collect::<Result<Vec<_>, PhyError>>()?;

        let g = cfg.coded_bits();
        let active = ActiveCodewords::single(cfg.codeword_index as usize)?;
        let [cw0, cw1] = demap_layers(&layer_llrs, nb_layers, cfg.qm(), g, active)?;
        let mut llrs = cw0
            .or(cw1)
            .ok_or_else(|| PhyError::InvalidCodewords("demapper produced no codeword".into()))?;
        descramble_llrs(&mut llrs, cfg.codeword_index, cfg.data_scrambling_id, cfg.rnti)?;

        debug!(
            "PDSCH RX slot {}: {} soft bits, nv={}, {} MMSE fallback(s)",
            slot,
            llrs.len(),
            noise_variance,
            equalized.fallbacks
        );
        Ok(SoftBits {
            llrs,
            estimate,
            noise_variance,
            mmse_fallbacks: equalized.fallbacks,
        })
    }

    /// Rate recovery, LDPC decoding and CRC checks of one codeword's soft bits
    pub fn decode(&self, llrs: &[i16], abort: Option<&AtomicBool>) -> Result<RxResult, PhyError> {
        let cfg = &self.config;
        let seg = &self.segmentation;
        check_len("codeword soft bits", cfg.coded_bits(), llrs.len())?;
        let lengths = cfg.block_lengths(seg)?;
        let quantized = quantize_llrs(llrs, self.rx_config.llr_shift);

        let mut offsets = Vec::with_capacity(lengths.len());
        let mut offset = 0usize;
        for &e in &lengths {
            offsets.push(offset);
            offset += e;
        }

        let codeword_len = self.decoder.params().codeword_len();
        let crc_check = |bits: &[u8], k_prime: usize| seg.block_crc_ok(bits, k_prime);
        let outputs = offsets
            .par_iter()
            .zip(lengths.par_iter())
            .map(|(&start, &e)| {
                let mut combined = try_alloc(codeword_len, 0i16, "soft combining buffer")?;
                self.rate_matcher
                    .rate_recover(&quantized[start..start + e], cfg.rv, cfg.qm(), &mut combined)?;
                self.decoder
                    .decode(&to_decoder_llrs(&combined), Some(&crc_check), abort)
            })
            .collect::<Result<Vec<DecodeOutput>, PhyError>>()?;

        let blocks: Vec<Vec<u8>> = outputs.iter().map(|o| o.bits.clone()).collect();
        let (payload, tb_crc_ok) = seg.reassemble(&blocks)?;
        let segments: Vec<SegmentResult> = outputs.iter().map(SegmentResult::from).collect();

        let mut stats = ReceiverStats {
            slots: 1,
            segments_decoded: segments.len() as u64,
            ..Default::default()
        };
        for (r, s) in segments.iter().enumerate() {
            stats.ldpc_iterations += s.iterations as u64;
            if s.aborted {
                stats.segments_aborted += 1;
            }
            if !s.crc_ok {
                stats.segments_failed += 1;
                debug!("Code block {} failed after {} iterations", r, s.iterations);
            }
        }
        if tb_crc_ok {
            stats.tb_ok = 1;
            info!(
                "DL-SCH decoded A={}: {} code block(s), {:.1} iterations on average",
                cfg.tb_size,
                segments.len(),
                stats.mean_iterations()
            );
        } else {
            stats.tb_failed = 1;
            warn!(
                "DL-SCH TB CRC failed: A={}, {} of {} code block(s) failed",
                cfg.tb_size,
                stats.segments_failed,
                segments.len()
            );
        }

        Ok(RxResult {
            payload: Bytes::from(payload),
            tb_crc_ok,
            segments,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dft::RustFftKernel;
    use common::{CyclicPrefix, SubcarrierSpacing};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::Ordering;

    fn kernel() -> Arc<dyn DftKernel> {
        Arc::new(RustFftKernel::new())
    }

    fn random_payload(rng: &mut StdRng, bits: usize) -> Vec<u8> {
        let mut payload: Vec<u8> = (0..(bits + 7) / 8).map(|_| rng.gen()).collect();
        if bits % 8 != 0 {
            if let Some(last) = payload.last_mut() {
                *last &= !(0xFFu8 >> (bits % 8));
            }
        }
        payload
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let fp = FrameParams::default();
        let cfg = PdschConfig::default();
        assert!(cfg.validate(&fp).is_ok());
        assert_eq!(cfg.coded_bits(), 24300);

        let seg = cfg.segmentation().unwrap();
        assert_eq!(seg.nb_segments, 1);
        assert_eq!(seg.k_prime, 5632);
        assert_eq!(seg.lifting_size, 256);

        let bad = PdschConfig { rv: 4, ..PdschConfig::default() };
        assert!(bad.validate(&fp).is_err());
        let bad = PdschConfig { data_scrambling_id: 1024, ..PdschConfig::default() };
        assert!(bad.validate(&fp).is_err());
        let bad = PdschConfig { codeword_index: 2, ..PdschConfig::default() };
        assert!(matches!(bad.validate(&fp), Err(PhyError::InvalidCodewords(_))));
        assert!(ReceiverConfig { max_iterations: 0, ..ReceiverConfig::default() }.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let text = r#"
            modulation = "Qam16"
            tb_size = 1000
            rv = 2

            [allocation]
            start_rb = 0
            nb_rb = 10
            start_symbol = 1
            nb_symbols = 12
            dmrs_symbol_mask = 0x0804
        "#;
        let cfg: PdschConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.modulation, ModulationScheme::Qam16);
        assert_eq!(cfg.rnti, Rnti::SI);
        assert_eq!(cfg.dmrs_amplitude, 8192);
        assert_eq!(cfg.allocation.dmrs_ports, vec![0]);
        assert!(cfg.validate(&FrameParams::default()).is_ok());

        let rx: ReceiverConfig = toml::from_str("arithmetic = \"float\"").unwrap();
        assert_eq!(rx.arithmetic, EqualizerArithmetic::Float);
        assert_eq!(rx.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_tb_too_large_for_allocation() {
        let fp = FrameParams::default();
        let mut cfg = PdschConfig::default();
        cfg.allocation.nb_rb = 1;
        cfg.allocation.nb_symbols = 3;
        cfg.tb_size = 100_000;
        assert!(DlschTransmitter::new(fp, cfg, kernel()).is_err());
    }

    #[test]
    fn test_grid_round_trip_without_ofdm() {
        let mut rng = StdRng::seed_from_u64(11);
        let fp = FrameParams::default();
        let cfg = PdschConfig {
            modulation: ModulationScheme::Qpsk,
            tb_size: 2000,
            data_scrambling_id: 17,
            rnti: Rnti::new(0x4601),
            ..PdschConfig::default()
        };
        let payload = random_payload(&mut rng, cfg.tb_size);
        let tx = DlschTransmitter::new(fp.clone(), cfg.clone(), kernel()).unwrap();
        let rx = DlschReceiver::new(fp, cfg, ReceiverConfig::default(), kernel()).unwrap();

        let slot = tx.transmit(3, &payload).unwrap();
        let result = rx.receive_grid(3, &slot.grid, None).unwrap();
        assert!(result.tb_crc_ok);
        assert_eq!(result.payload, payload);
        assert_eq!(result.stats.tb_ok, 1);
        assert_eq!(result.stats.mmse_fallbacks, 0);
    }

    #[test]
    fn test_erased_soft_bits_fail_crc() {
        let fp = FrameParams::default();
        let cfg = PdschConfig::default();
        let rx = DlschReceiver::new(
            fp,
            cfg.clone(),
            ReceiverConfig {
                max_iterations: 2,
                ..ReceiverConfig::default()
            },
            kernel(),
        )
        .unwrap();
        let result = rx.decode(&vec![0i16; cfg.coded_bits()], None).unwrap();
        assert!(!result.tb_crc_ok);
        assert_eq!(result.stats.tb_failed, 1);
        assert_eq!(result.stats.segments_failed, 1);
        assert!(rx.decode(&[0i16; 10], None).is_err());
    }

    #[test]
    fn test_abort_flag_stops_decoding() {
        let fp = FrameParams::default();
        let cfg = PdschConfig::default();
        let rx = DlschReceiver::new(fp, cfg.clone(), ReceiverConfig::default(), kernel()).unwrap();
        let abort = AtomicBool::new(true);
        let result = rx.decode(&vec![0i16; cfg.coded_bits()], Some(&abort)).unwrap();
        assert!(abort.load(Ordering::Relaxed));
        assert!(result.segments.iter().all(|s| s.aborted));
        assert_eq!(result.stats.segments_aborted, 1);
        assert!(!result.tb_crc_ok);
    }

    #[test]
    fn test_receiver_rejects_more_layers_than_antennas() {
        let fp = FrameParams::new(SubcarrierSpacing::Scs15, CyclicPrefix::Normal, 512, 25, 2, 1).unwrap();
        let mut cfg = PdschConfig::default();
        cfg.allocation.dmrs_ports = vec![0, 1];
        assert_eq!(
            DlschReceiver::new(fp, cfg, ReceiverConfig::default(), kernel()).err(),
            Some(PhyError::UnsupportedLayerCount(2))
        );
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ReceiverStats::default();
        let one = ReceiverStats {
            slots: 1,
            tb_ok: 1,
            segments_decoded: 2,
            ldpc_iterations: 6,
            noise_variance: 40,
            ..Default::default()
        };
        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.slots, 2);
        assert_eq!(total.ldpc_iterations, 12);
        assert_eq!(total.mean_iterations(), 3.0);
        assert_eq!(total.noise_variance, 40);
    }
}
