use crate::audio::frame::FftSize;
use crate::error::ConfigError;

pub const MIN_WINDOW_EXPONENT: u32 = 1;
pub const MAX_WINDOW_EXPONENT: u32 = 6;

/// Everything the surrounding UI can tune while the loop is running.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerSettings {
    pub fft_size: FftSize,
    /// 0 = logarithmic frequency axis, 1 = linear.
    pub blend: f32,
    /// Opacity of the per-frame erase; lower leaves longer trails.
    pub trail_alpha: f32,
    /// Analyser smoothing time constant.
    pub smoothing: f32,
    pub segment_detection: bool,
    pub window_radius_exponent: u32,
    /// Share of the bins that get drawn, counted from bin 0.
    pub range_fraction: f32,
    pub auto_downgrade: bool,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            fft_size: FftSize::DEFAULT,
            blend: 0.0,
            trail_alpha: 1.0,
            smoothing: 0.5,
            segment_detection: false,
            window_radius_exponent: 3,
            range_fraction: 0.9,
            auto_downgrade: false,
        }
    }
}

impl VisualizerSettings {
    /// Neighbourhood radius for segment detection: `2^exp * fft_size / 256`.
    pub fn window_radius(&self) -> usize {
        ((1usize << self.window_radius_exponent) * self.fft_size.get() / 256).max(1)
    }

    /// Validate and merge an update. Nothing is changed unless the whole
    /// update is valid.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), ConfigError> {
        let fft_size = update.fft_size.map(FftSize::try_from).transpose()?;
        if let Some(exp) = update.window_radius_exponent {
            if !(MIN_WINDOW_EXPONENT..=MAX_WINDOW_EXPONENT).contains(&exp) {
                return Err(ConfigError::WindowExponentOutOfRange(exp));
            }
            self.window_radius_exponent = exp;
        }

        if let Some(size) = fft_size {
            self.fft_size = size;
        }
        set_unit(&mut self.blend, update.blend);
        set_unit(&mut self.trail_alpha, update.trail_alpha);
        set_unit(&mut self.smoothing, update.smoothing);
        set_unit(&mut self.range_fraction, update.range_fraction);
        if let Some(enabled) = update.segment_detection {
            self.segment_detection = enabled;
        }
        if let Some(enabled) = update.auto_downgrade {
            self.auto_downgrade = enabled;
        }
        Ok(())
    }
}

// NaN leaves the old value alone.
fn set_unit(target: &mut f32, value: Option<f32>) {
    if let Some(v) = value.filter(|v| !v.is_nan()) {
        *target = v.clamp(0.0, 1.0);
    }
}

/// A partial settings change, delivered whenever a control moves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsUpdate {
    pub fft_size: Option<u32>,
    pub blend: Option<f32>,
    pub trail_alpha: Option<f32>,
    pub smoothing: Option<f32>,
    pub segment_detection: Option<bool>,
    pub window_radius_exponent: Option<u32>,
    pub range_fraction: Option<f32>,
    pub auto_downgrade: Option<bool>,
}
