use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;

/// FFT sizes the analyser accepts.
pub const FFT_SIZES: [u32; 7] = [512, 1024, 2048, 4096, 8192, 16384, 32768];

/// A validated FFT size. Construction goes through `TryFrom<u32>`, so every
/// value in circulation is one of [`FFT_SIZES`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FftSize(u32);

impl FftSize {
    pub const DEFAULT: FftSize = FftSize(2048);

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Number of magnitude bins the analyser produces (`size / 2`).
    pub fn bin_count(self) -> usize {
        self.get() / 2
    }
}

impl Default for FftSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for FftSize {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if FFT_SIZES.contains(&value) {
            Ok(FftSize(value))
        } else {
            Err(ConfigError::UnsupportedFftSize(value))
        }
    }
}

impl From<FftSize> for u32 {
    fn from(size: FftSize) -> u32 {
        size.0
    }
}

impl fmt::Display for FftSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One analysis cycle: dB magnitudes per bin plus the parameters needed to
/// interpret them. The magnitude slice is shared read-only; nothing holds a
/// writable reference once the frame is built.
#[derive(Clone, Debug)]
pub struct SpectrumFrame {
    magnitudes: Arc<[f32]>,
    sample_rate: f64,
    fft_size: FftSize,
}

impl SpectrumFrame {
    /// Returns `None` when the magnitude count does not match `fft_size / 2`.
    pub fn new(magnitudes: Vec<f32>, sample_rate: f64, fft_size: FftSize) -> Option<Self> {
        if magnitudes.len() != fft_size.bin_count() {
            return None;
        }
        Some(Self {
            magnitudes: magnitudes.into(),
            sample_rate,
            fft_size,
        })
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn fft_size(&self) -> FftSize {
        self.fft_size
    }

    /// Centre frequency of bin `i` in Hz.
    pub fn bin_frequency(&self, i: usize) -> f64 {
        i as f64 * self.sample_rate / self.fft_size.get() as f64
    }
}
