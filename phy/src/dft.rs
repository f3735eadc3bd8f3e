//! DFT/IDFT kernels for OFDM processing
//!
//! The front end only sees the [`DftKernel`] trait. A pure-software rustfft
//! kernel is always available; an FFTW kernel is built with the `fftw` feature.

use crate::PhyError;
use common::{round_to_i16, C16};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Transform direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Time to frequency (receive)
    Forward,
    /// Frequency to time (transmit)
    Inverse,
}

/// Supported transform sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DftSize {
    Size128,
    Size256,
    Size512,
    Size768,
    Size1024,
    Size1536,
    Size2048,
    Size3072,
    Size4096,
    Size6144,
    Size8192,
}

impl DftSize {
    /// Size class for a transform length, failing for anything outside the set
    pub fn from_len(len: usize) -> Result<Self, PhyError> {
        Ok(match len {
            128 => DftSize::Size128,
            256 => DftSize::Size256,
            512 => DftSize::Size512,
            768 => DftSize::Size768,
            1024 => DftSize::Size1024,
            1536 => DftSize::Size1536,
            2048 => DftSize::Size2048,
            3072 => DftSize::Size3072,
            4096 => DftSize::Size4096,
            6144 => DftSize::Size6144,
            8192 => DftSize::Size8192,
            other => return Err(PhyError::UnsupportedFftSize(other)),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            DftSize::Size128 => 128,
            DftSize::Size256 => 256,
            DftSize::Size512 => 512,
            DftSize::Size768 => 768,
            DftSize::Size1024 => 1024,
            DftSize::Size1536 => 1536,
            DftSize::Size2048 => 2048,
            DftSize::Size3072 => 3072,
            DftSize::Size4096 => 4096,
            DftSize::Size6144 => 6144,
            DftSize::Size8192 => 8192,
        }
    }
}

/// Opaque DFT primitive
///
/// `scale` applies 1/sqrt(N) so that forward followed by inverse is the
/// identity. Outputs are rounded half away from zero and saturated.
pub trait DftKernel: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Transform a buffer of exactly `size.len()` samples
    fn transform(
        &self,
        size: DftSize,
        direction: Direction,
        input: &[C16],
        output: &mut [C16],
        scale: bool,
    ) -> Result<(), PhyError>;
}

fn check_buffers(size: DftSize, input: &[C16], output: &[C16]) -> Result<(), PhyError> {
    let n = size.len();
    if input.len() != n || output.len() != n {
        return Err(PhyError::LengthMismatch {
            what: "DFT buffer",
            expected: n,
            actual: if input.len() != n { input.len() } else { output.len() },
        });
    }
    Ok(())
}

fn write_rounded(buffer: &[Complex64], output: &mut [C16], scale: f64) {
    for (out, v) in output.iter_mut().zip(buffer) {
        *out = C16::new(round_to_i16(v.re * scale), round_to_i16(v.im * scale));
    }
}

fn scale_factor(size: DftSize, scale: bool) -> f64 {
    if scale {
        1.0 / (size.len() as f64).sqrt()
    } else {
        1.0
    }
}

/// Software kernel backed by rustfft
pub struct RustFftKernel {
    planner: Mutex<FftPlanner<f64>>,
}

impl RustFftKernel {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    fn plan(&self, size: DftSize, direction: Direction) -> Result<Arc<dyn Fft<f64>>, PhyError> {
        let mut planner = self
            .planner
            .lock()
            .map_err(|_| PhyError::ProcessingError("FFT planner lock poisoned".into()))?;
        Ok(match direction {
            Direction::Forward => planner.plan_fft_forward(size.len()),
            Direction::Inverse => planner.plan_fft_inverse(size.len()),
        })
    }
}

impl Default for RustFftKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl DftKernel for RustFftKernel {
    fn name(&self) -> &'static str {
        "rustfft"
    }

    fn transform(
        &self,
        size: DftSize,
        direction: Direction,
        input: &[C16],
        output: &mut [C16],
        scale: bool,
    ) -> Result<(), PhyError> {
        check_buffers(size, input, output)?;
        let fft = self.plan(size, direction)?;
        let mut buffer: Vec<Complex64> = input
            .iter()
            .map(|s| Complex64::new(s.re as f64, s.im as f64))
            .collect();
        fft.process(&mut buffer);
        write_rounded(&buffer, output, scale_factor(size, scale));
        Ok(())
    }
}

#[cfg(feature = "fftw")]
pub use self::fftw_kernel::FftwKernel;

#[cfg(feature = "fftw")]
mod fftw_kernel {
    use super::*;
    use fftw::array::AlignedVec;
    use fftw::plan::{C2CPlan, C2CPlan64};
    use fftw::types::{c64, Flag, Sign};
    use std::collections::HashMap;

    /// FFTW-backed kernel; plans are created once per size and direction
    pub struct FftwKernel {
        plans: Mutex<HashMap<(DftSize, Direction), C2CPlan64>>,
    }

    impl FftwKernel {
        pub fn new() -> Self {
            Self {
                plans: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for FftwKernel {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DftKernel for FftwKernel {
        fn name(&self) -> &'static str {
            "fftw"
        }

        fn transform(
            &self,
            size: DftSize,
            direction: Direction,
            input: &[C16],
            output: &mut [C16],
            scale: bool,
        ) -> Result<(), PhyError> {
            check_buffers(size, input, output)?;
            let n = size.len();
            let mut fft_input: AlignedVec<c64> = AlignedVec::new(n);
            let mut fft_output: AlignedVec<c64> = AlignedVec::new(n);
            for (dst, s) in fft_input.iter_mut().zip(input) {
                *dst = c64::new(s.re as f64, s.im as f64);
            }

            let mut plans = self
                .plans
                .lock()
                .map_err(|_| PhyError::ProcessingError("FFTW plan cache lock poisoned".into()))?;
            let plan = match plans.entry((size, direction)) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let sign = match direction {
                        Direction::Forward => Sign::Forward,
                        Direction::Inverse => Sign::Backward,
                    };
                    let plan = C2CPlan64::aligned(&[n], sign, Flag::MEASURE | Flag::DESTROYINPUT)
                        .map_err(|e| PhyError::ProcessingError(format!("FFTW plan for {}: {:?}", n, e)))?;
                    e.insert(plan)
                }
            };
            plan.c2c(&mut fft_input, &mut fft_output)
                .map_err(|e| PhyError::ProcessingError(format!("FFTW transform failed: {:?}", e)))?;
            drop(plans);

            write_rounded(&fft_output, output, scale_factor(size, scale));
            Ok(())
        }
    }
}

/// Kernel selected at build time
pub fn default_kernel() -> Arc<dyn DftKernel> {
    #[cfg(feature = "fftw")]
    {
        info!("Using FFTW DFT kernel");
        return Arc::new(FftwKernel::new());
    }
    #[cfg(not(feature = "fftw"))]
    {
        info!("Using software DFT kernel (rustfft)");
        Arc::new(RustFftKernel::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_sizes() {
        for n in [128, 256, 512, 768, 1024, 1536, 2048, 3072, 4096, 6144, 8192] {
            assert_eq!(DftSize::from_len(n).unwrap().len(), n);
        }
        assert_eq!(DftSize::from_len(1000), Err(PhyError::UnsupportedFftSize(1000)));
        assert!(DftSize::from_len(64).is_err());
    }

    #[test]
    fn test_single_tone() {
        let kernel = RustFftKernel::new();
        let size = DftSize::Size128;
        // impulse at bin 3 -> complex exponential -> back to bin 3
        let mut freq = vec![C16::new(0, 0); 128];
        freq[3] = C16::new(11_314, 0);
        let mut time = vec![C16::new(0, 0); 128];
        kernel.transform(size, Direction::Inverse, &freq, &mut time, true).unwrap();
        // |x[n]| = 11314 / sqrt(128) = 1000
        assert!(time.iter().all(|s| ((s.re as f64).hypot(s.im as f64) - 1000.0).abs() < 2.0));

        let mut back = vec![C16::new(0, 0); 128];
        kernel.transform(size, Direction::Forward, &time, &mut back, true).unwrap();
        assert!((back[3].re - 11_314).abs() <= 8);
        assert!(back.iter().enumerate().filter(|(k, _)| *k != 3).all(|(_, s)| s.re.abs() <= 4 && s.im.abs() <= 4));
    }

    #[test]
    fn test_length_mismatch() {
        let kernel = RustFftKernel::new();
        let input = vec![C16::new(0, 0); 256];
        let mut output = vec![C16::new(0, 0); 128];
        assert!(kernel
            .transform(DftSize::Size256, Direction::Forward, &input, &mut output, true)
            .is_err());
    }

    #[test]
    fn test_default_kernel_transforms() {
        let kernel = default_kernel();
        let input = vec![C16::new(100, 0); 768];
        let mut output = vec![C16::new(0, 0); 768];
        kernel
            .transform(DftSize::Size768, Direction::Forward, &input, &mut output, false)
            .unwrap();
        assert_eq!(output[0], C16::new(76_800i32.min(i16::MAX as i32) as i16, 0));
        assert_eq!(output[1], C16::new(0, 0));
    }
}
