use clap::Parser;
use std::path::PathBuf;

use crate::render::settings::SettingsUpdate;

#[derive(Parser, Debug)]
#[command(name = "peakscope", about = "Spectrum visualizer with peak detection and persistent trails")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to ./peakscope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Display refresh rate to simulate (ticks per second)
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Analyser FFT size (512, 1024, ..., 32768)
    #[arg(long, default_value_t = 2048)]
    pub fft_size: u32,

    /// Analyser smoothing time constant (0.0-1.0)
    #[arg(long, default_value_t = 0.5)]
    pub smoothing: f32,

    /// Frequency axis blend: 0 = logarithmic, 1 = linear
    #[arg(long, default_value_t = 0.0)]
    pub blend: f32,

    /// Opacity of the per-frame erase; lower values leave longer trails
    #[arg(long, default_value_t = 1.0)]
    pub trail_alpha: f32,

    /// Mark locally prominent spectral peaks
    #[arg(long)]
    pub detect_peaks: bool,

    /// Peak window size exponent (1-6); radius = 2^n * fft_size / 256
    #[arg(long, default_value_t = 3)]
    pub window_exponent: u32,

    /// Share of bins drawn, counted from the lowest (default 0.9)
    #[arg(long)]
    pub range_fraction: Option<f32>,

    /// Lower the peak window when ticks overrun the frame budget
    #[arg(long)]
    pub auto_downgrade: bool,

    /// Font file for labels and the diagnostics overlay
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Download the label font from a URL
    #[arg(long)]
    pub font_url: Option<String>,

    /// Label font size in pixels
    #[arg(long, default_value_t = 12.0)]
    pub font_size: f32,

    /// Write each tick's draw commands as a JSON line to this file
    #[arg(long)]
    pub dump_commands: Option<PathBuf>,

    /// Skip video encoding
    #[arg(long)]
    pub no_video: bool,

    /// Run a transcoding command (e.g. "-i in.wav out.flac") and exit
    #[arg(long)]
    pub exec: Option<String>,
}

impl Cli {
    pub fn settings_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            fft_size: Some(self.fft_size),
            blend: Some(self.blend),
            trail_alpha: Some(self.trail_alpha),
            smoothing: Some(self.smoothing),
            segment_detection: Some(self.detect_peaks),
            window_radius_exponent: Some(self.window_exponent),
            range_fraction: self.range_fraction,
            auto_downgrade: Some(self.auto_downgrade),
        }
    }
}
