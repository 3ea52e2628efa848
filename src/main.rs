mod analysis;
mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod render;
mod transcode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;

use audio::graph::{FileAudioGraph, MediaHandle};
use cli::Cli;
use encode::ffmpeg::{FfmpegEncoder, VideoOptions};
use render::canvas::Canvas;
use render::renderer::Renderer;
use render::settings::{SettingsUpdate, VisualizerSettings};
use render::text::{load_font_from_url, TextOverlay};
use transcode::executor::{CommandExecutor, FfmpegExecutor};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::find_config(cli.config.clone()) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                merge_config(&mut cli, cfg);
            }
            Err(err) => log::warn!("Ignoring config: {:#}", err),
        }
    }

    if let Some(ref command) = cli.exec {
        return run_transcode(command);
    }

    let input = cli.input.clone().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("peakscope - spectrum visualizer");
    log::info!("Input: {}", input.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    // 1. Decode
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(&input)?;
    let label = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    // 2. Renderer and audio graph. Settings go in through the same path as
    // a live reconfiguration; each range-checked field goes in on its own so
    // one bad value doesn't discard the rest.
    let fps = cli.fps.max(1);
    let defaults = VisualizerSettings::default();
    let mut renderer = Renderer::new(defaults.clone(), cli.width, cli.height);
    renderer.set_frame_budget(Duration::from_secs_f64(1.0 / fps as f64));
    renderer.attach(FileAudioGraph::new(defaults.fft_size, defaults.smoothing));
    for part in split_update(cli.settings_update()) {
        // Rejections are logged by the renderer; the default stays.
        let _ = renderer.apply(&part);
    }

    let settings = renderer.settings();
    log::info!(
        "FFT size {}, blend {:.2}, trail alpha {:.2}, smoothing {:.2}, peaks {}",
        settings.fft_size,
        settings.blend,
        settings.trail_alpha,
        settings.smoothing,
        if settings.segment_detection { "on" } else { "off" }
    );

    renderer
        .load(MediaHandle::new(label, audio_data))
        .map_err(|m| anyhow::anyhow!("No audio graph attached for {}", m.label()))?;
    log::debug!("Renderer state: {:?}", renderer.loop_state());
    let duration = renderer.adapter_mut().map_or(0.0, |g| g.duration());

    // 3. Raster target
    let font_bytes = match cli.font_url {
        Some(ref url) => match load_font_from_url(url) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("Failed to load font from URL: {:#}", err);
                None
            }
        },
        None => None,
    };
    let text = match TextOverlay::new(cli.font_size, cli.font.as_deref(), font_bytes.as_deref()) {
        Ok(overlay) => Some(overlay),
        Err(err) => {
            log::warn!("Text disabled: {:#}", err);
            None
        }
    };
    let mut canvas = Canvas::new(cli.width, cli.height, text);

    // 4. Sinks
    let mut encoder = if cli.no_video {
        None
    } else {
        log::info!("Starting FFmpeg encoder...");
        let opts = VideoOptions {
            width: cli.width,
            height: cli.height,
            fps,
            codec: cli.codec.clone(),
            pix_fmt: cli.pix_fmt.clone(),
            crf: cli.crf,
            bitrate: cli.bitrate.clone(),
        };
        Some(FfmpegEncoder::new(&cli.output, &input, &opts)?)
    };

    let mut dump = match cli.dump_commands {
        Some(ref path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => None,
    };

    if encoder.is_none() && dump.is_none() {
        log::warn!("No video and no command dump requested; frames will be discarded");
    }

    // 5. Draw loop, one tick per display frame
    let total_frames = (duration * fps as f64).ceil() as u64;
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, duration);

    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    for frame_idx in 0..total_frames {
        let now = Duration::from_secs_f64(frame_idx as f64 / fps as f64);
        if let Some(graph) = renderer.adapter_mut() {
            graph.seek(now.as_secs_f64());
        }

        let commands = renderer.tick(now);
        canvas.execute(&commands);

        if let Some(ref mut out) = dump {
            serde_json::to_writer(&mut *out, &commands).context("Failed to write draw commands")?;
            out.write_all(b"\n")?;
        }
        if let Some(ref mut enc) = encoder {
            enc.write_frame(canvas.pixels())?;
        }
        pb.set_position(frame_idx + 1);
    }

    pb.finish_with_message("Rendering complete");
    renderer.teardown();

    if let Some(mut out) = dump {
        out.flush()?;
    }
    if let Some(enc) = encoder {
        log::info!("Finishing encoding...");
        enc.finish()?;
        log::info!("Done! Output: {}", cli.output.display());
    }
    Ok(())
}

/// Config values apply only where the CLI is still at its default.
fn merge_config(cli: &mut Cli, cfg: config::Config) {
    if cli.width == config::default_width() { cli.width = cfg.output.width; }
    if cli.height == config::default_height() { cli.height = cfg.output.height; }
    if cli.fps == config::default_fps() { cli.fps = cfg.output.fps; }
    if cli.crf == config::default_crf() { cli.crf = cfg.output.crf; }
    if cli.codec == config::default_codec() { cli.codec = cfg.output.codec; }
    if cli.pix_fmt == config::default_pix_fmt() { cli.pix_fmt = cfg.output.pix_fmt; }
    if cli.font_size == config::default_font_size() { cli.font_size = cfg.output.font_size; }
    if cli.font.is_none() { cli.font = cfg.output.font; }
    if cli.font_url.is_none() { cli.font_url = cfg.output.font_url; }

    if cli.fft_size == config::default_fft_size() { cli.fft_size = cfg.analyser.fft_size; }
    if cli.smoothing == config::default_smoothing() { cli.smoothing = cfg.analyser.smoothing; }
    if cli.blend == 0.0 { cli.blend = cfg.display.blend; }
    if cli.trail_alpha == config::default_trail_alpha() { cli.trail_alpha = cfg.display.trail_alpha; }
    if !cli.detect_peaks { cli.detect_peaks = cfg.display.segment_detection; }
    if cli.window_exponent == config::default_window_radius_exponent() {
        cli.window_exponent = cfg.display.window_radius_exponent;
    }
    if !cli.auto_downgrade { cli.auto_downgrade = cfg.display.auto_downgrade; }
    if cli.range_fraction.is_none() { cli.range_fraction = Some(cfg.display.range_fraction); }
}

/// Separate the fields that can be rejected from the ones that only clamp.
fn split_update(update: SettingsUpdate) -> [SettingsUpdate; 3] {
    let fft = SettingsUpdate {
        fft_size: update.fft_size,
        ..Default::default()
    };
    let window = SettingsUpdate {
        window_radius_exponent: update.window_radius_exponent,
        ..Default::default()
    };
    let rest = SettingsUpdate {
        fft_size: None,
        window_radius_exponent: None,
        ..update
    };
    [fft, window, rest]
}

fn run_transcode(command: &str) -> Result<()> {
    let args = transcode::command::engine_args(command);
    if args.is_empty() {
        anyhow::bail!("Empty transcoding command");
    }
    log::info!("Running ffmpeg {:?}", args);

    let mut executor = FfmpegExecutor::new();
    let code = executor.exec(&args, &mut |line| log::info!("[ffmpeg] {}", line))?;
    if code != 0 {
        anyhow::bail!("ffmpeg exited with code {}", code);
    }
    Ok(())
}
