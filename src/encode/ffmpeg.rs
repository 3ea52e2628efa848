use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::canvas::rgba_len;

/// Output options for the rendered video.
#[derive(Clone, Debug)]
pub struct VideoOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

/// Streams raw RGBA frames into an ffmpeg child process, muxing the source
/// audio back in.
pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
}

pub fn encoder_args(output_path: &Path, input_audio: &Path, opts: &VideoOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", opts.width, opts.height),
        "-framerate".into(), opts.fps.to_string(),
        "-i".into(), "pipe:0".into(),
        "-i".into(), input_audio.to_string_lossy().into_owned(),
        "-c:v".into(), opts.codec.clone(),
        "-pix_fmt".into(), opts.pix_fmt.clone(),
    ];

    if let Some(ref br) = opts.bitrate {
        args.extend(["-b:v".to_string(), br.clone()]);
    } else {
        args.extend(["-crf".to_string(), opts.crf.to_string()]);
        args.extend(["-preset".to_string(), "medium".to_string()]);
    }

    args.extend([
        "-c:a".into(), "aac".into(),
        "-b:a".into(), "192k".into(),
        "-shortest".into(),
        output_path.to_string_lossy().into_owned(),
    ]);
    args
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, input_audio: &Path, opts: &VideoOptions) -> Result<Self> {
        let args = encoder_args(output_path, input_audio, opts);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            opts.width, opts.height, opts.fps, opts.codec
        );

        Ok(Self {
            child,
            frame_bytes: rgba_len(opts.width, opts.height),
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // EOF on stdin ends the stream.
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(bitrate: Option<&str>) -> VideoOptions {
        VideoOptions {
            width: 640,
            height: 360,
            fps: 60,
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 18,
            bitrate: bitrate.map(String::from),
        }
    }

    #[test]
    fn crf_mode_args() {
        let args = encoder_args(Path::new("out.mp4"), Path::new("in.flac"), &opts(None));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-video_size 640x360"));
        assert!(joined.contains("-framerate 60"));
        assert!(joined.contains("-crf 18 -preset medium"));
        assert!(!joined.contains("-b:v"));
    }

    #[test]
    fn bitrate_mode_args() {
        let args = encoder_args(Path::new("out.mp4"), Path::new("in.flac"), &opts(Some("5M")));
        let joined = args.join(" ");
        assert!(joined.contains("-b:v 5M"));
        assert!(!joined.contains("-crf"));
    }
}
