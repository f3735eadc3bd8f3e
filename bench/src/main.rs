//! 5G NR downlink PHY stage benchmark
//!
//! Runs one processing stage of the PDSCH chain (or the whole chain) on a
//! configured carrier and reports its timing.

mod config;
mod stages;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::BenchConfig;
use stages::{Bench, StageReport};

/// Downlink PHY stage benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bench.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Repetitions of the timed stage
    #[arg(short = 'n', long, default_value = "100")]
    iterations: usize,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the LDPC iteration limit
    #[arg(long)]
    max_iterations: Option<u8>,

    /// Override the per-axis AWGN standard deviation
    #[arg(long)]
    noise_sigma: Option<f64>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Stage {
    /// Transport block CRC24A
    #[command(name = "nr_crc")]
    Crc,
    /// LDPC encoding and rate matching
    #[command(name = "nr_ldpc")]
    Ldpc,
    /// Bit scrambling
    #[command(name = "nr_scramble")]
    Scramble,
    /// Constellation mapping
    #[command(name = "nr_modulation")]
    Modulation,
    /// Layer mapping
    #[command(name = "nr_layermapping")]
    LayerMapping,
    /// Precoding and resource element mapping
    #[command(name = "nr_precoding")]
    Precoding,
    /// OFDM modulation
    #[command(name = "nr_ofdm_mod")]
    OfdmMod,
    /// OFDM demodulation (front-end processing)
    #[command(name = "nr_ofdm_demo")]
    OfdmDemod,
    /// DMRS channel estimation
    #[command(name = "nr_ch_estimation")]
    ChannelEstimation,
    /// MMSE equalization
    #[command(name = "nr_mmse_eq")]
    Mmse,
    /// Layer demapping
    #[command(name = "nr_layer_demapping")]
    LayerDemapping,
    /// Soft demodulation
    #[command(name = "nr_soft_demod")]
    SoftDemod,
    /// Soft-bit descrambling
    #[command(name = "nr_descrambling")]
    Descrambling,
    /// Rate recovery and LDPC decoding
    #[command(name = "nr_ldpc_dec")]
    LdpcDecode,
    /// CRC24A verification
    #[command(name = "nr_crc_check")]
    CrcCheck,
    /// Complete transmit and receive chain
    #[command(name = "nr_dlsch_e2e")]
    DlschE2e,
}

fn run(bench: &mut Bench, stage: Stage) -> Result<StageReport> {
    match stage {
        Stage::Crc => bench.crc(),
        Stage::Ldpc => bench.ldpc_encode(),
        Stage::Scramble => bench.scramble(),
        Stage::Modulation => bench.modulation(),
        Stage::LayerMapping => bench.layer_mapping(),
        Stage::Precoding => bench.precoding(),
        Stage::OfdmMod => bench.ofdm_modulation(),
        Stage::OfdmDemod => bench.ofdm_demodulation(),
        Stage::ChannelEstimation => bench.channel_estimation(),
        Stage::Mmse => bench.mmse(),
        Stage::LayerDemapping => bench.layer_demapping(),
        Stage::SoftDemod => bench.soft_demodulation(),
        Stage::Descrambling => bench.descrambling(),
        Stage::LdpcDecode => bench.ldpc_decode(),
        Stage::CrcCheck => bench.crc_check(),
        Stage::DlschE2e => bench.dlsch_e2e(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = BenchConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.receiver.max_iterations = max_iterations;
    }
    if let Some(sigma) = args.noise_sigma {
        config.noise_sigma = sigma;
    }
    config.validate()?;

    let fp = &config.carrier.frame;
    info!("Carrier configuration:");
    info!("  SCS: {:?}, FFT: {}, RBs: {}", fp.scs, fp.fft_size, fp.nb_rb);
    info!("  Antennas: {} TX, {} RX", fp.nb_antennas_tx, fp.nb_antennas_rx);
    info!(
        "  PDSCH: A={}, {:?}, {} layer(s), rv={}",
        config.pdsch.tb_size,
        config.pdsch.modulation,
        config.pdsch.allocation.nb_layers(),
        config.pdsch.rv
    );

    let kernel = nr_phy::default_kernel();
    let mut bench = Bench::new(config, args.iterations, kernel);
    let report = run(&mut bench, args.stage)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            "{}: {} iteration(s), {:.1} us total, {:.2} us mean",
            report.stage, report.iterations, report.total_us, report.mean_us
        );
        info!("  {}", report.details);
    }
    if !report.ok {
        warn!("{} reported a failed check", report.stage);
        std::process::exit(1);
    }
    Ok(())
}
