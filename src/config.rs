use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};


#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub font_url: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Deserialize)]
pub struct AnalyserConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: u32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub blend: f32,
    #[serde(default = "default_trail_alpha")]
    pub trail_alpha: f32,
    #[serde(default)]
    pub segment_detection: bool,
    #[serde(default = "default_window_radius_exponent")]
    pub window_radius_exponent: u32,
    #[serde(default = "default_range_fraction")]
    pub range_fraction: f32,
    #[serde(default)]
    pub auto_downgrade: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            font: None,
            font_url: None,
            font_size: default_font_size(),
        }
    }
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            blend: 0.0,
            trail_alpha: default_trail_alpha(),
            segment_detection: false,
            window_radius_exponent: default_window_radius_exponent(),
            range_fraction: default_range_fraction(),
            auto_downgrade: false,
        }
    }
}

pub fn default_width() -> u32 { 1920 }
pub fn default_height() -> u32 { 1080 }
pub fn default_fps() -> u32 { 60 }
pub fn default_crf() -> u32 { 18 }
pub fn default_codec() -> String { "libx264".into() }
pub fn default_pix_fmt() -> String { "yuv420p".into() }
pub fn default_font_size() -> f32 { 12.0 }
pub fn default_fft_size() -> u32 { 2048 }
pub fn default_smoothing() -> f32 { 0.5 }
pub fn default_trail_alpha() -> f32 { 1.0 }
pub fn default_window_radius_exponent() -> u32 { 3 }
pub fn default_range_fraction() -> f32 { 0.9 }

/// Explicit path first, then `./peakscope.toml`, then the user config
/// directories.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    let local = PathBuf::from("peakscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("peakscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("peakscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
