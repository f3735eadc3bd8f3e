//! Benchmark configuration file
//!
//! ```toml
//! seed = 7
//!
//! [carrier]
//! pci = 1
//! [carrier.frame]
//! scs = "Scs30"
//! cyclic_prefix = "Normal"
//! fft_size = 1024
//! nb_rb = 51
//! nb_antennas_tx = 2
//! nb_antennas_rx = 2
//!
//! [pdsch]
//! modulation = "Qam64"
//! tb_size = 5608
//!
//! [receiver]
//! max_iterations = 10
//! ```

use anyhow::{Context, Result};
use common::CarrierConfig;
use nr_phy::{PdschConfig, ReceiverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

fn default_seed() -> u64 {
    0x5EED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Seed of the payload and noise generators
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Slot number within the frame
    #[serde(default)]
    pub slot: u32,
    /// Per-axis standard deviation of the AWGN added by `nr_dlsch_e2e`
    #[serde(default)]
    pub noise_sigma: f64,
    #[serde(default)]
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub pdsch: PdschConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            slot: 0,
            noise_sigma: 0.0,
            carrier: CarrierConfig::default(),
            pdsch: PdschConfig::default(),
            receiver: ReceiverConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load `path`, falling back to the built-in carrier when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Configuration file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: BenchConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.carrier.validate().context("Invalid carrier")?;
        self.pdsch
            .validate(&self.carrier.frame)
            .context("Invalid PDSCH configuration")?;
        self.receiver.validate().context("Invalid receiver configuration")?;
        if self.slot >= self.carrier.frame.slots_per_frame() {
            anyhow::bail!(
                "slot {} outside a frame of {} slots",
                self.slot,
                self.carrier.frame.slots_per_frame()
            );
        }
        if !(self.noise_sigma >= 0.0 && self.noise_sigma.is_finite()) {
            anyhow::bail!("noise_sigma must be a finite non-negative value, got {}", self.noise_sigma);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ModulationScheme;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.carrier.frame.fft_size, 512);
        assert_eq!(config.carrier.frame.nb_rb, 25);
    }

    #[test]
    fn test_parse_partial_file() {
        let text = r#"
            seed = 7
            noise_sigma = 20.0

            [pdsch]
            modulation = "Qam256"
            tb_size = 12000

            [receiver]
            max_iterations = 12
            arithmetic = "float"
        "#;
        let config: BenchConfig = toml::from_str(text).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.pdsch.modulation, ModulationScheme::Qam256);
        assert_eq!(config.receiver.max_iterations, 12);
        assert_eq!(config.carrier, CarrierConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = BenchConfig::load(Path::new("/nonexistent/bench.toml")).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_invalid_carrier_rejected() {
        let text = r#"
            [carrier]
            pci = 2000
        "#;
        let config: BenchConfig = toml::from_str(text).unwrap();
        assert!(config.validate().is_err());
    }
}
