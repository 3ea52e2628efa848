use thiserror::Error;

/// Rejections raised while validating visualizer settings.
///
/// None of these are fatal: the caller keeps whatever configuration was
/// valid before the update and carries on rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported FFT size {0} (expected one of 512, 1024, 2048, 4096, 8192, 16384, 32768)")]
    UnsupportedFftSize(u32),

    #[error("window radius exponent {0} out of range (expected 1..=6)")]
    WindowExponentOutOfRange(u32),
}
