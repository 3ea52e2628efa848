use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};

/// Fonts tried when none is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading font from {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch font: {}", url))?
        .error_for_status()
        .with_context(|| format!("Font request failed: {}", url))?;
    let bytes = response.bytes().context("Failed to read font body")?;
    Ok(bytes.to_vec())
}

fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    /// Font precedence: raw bytes, then an explicit path, then the first
    /// system font found.
    pub fn new(font_size: f32, font_path: Option<&Path>, font_bytes: Option<&[u8]>) -> Result<Self> {
        let data = match (font_bytes, font_path) {
            (Some(bytes), _) => bytes.to_vec(),
            (None, Some(path)) => std::fs::read(path)
                .with_context(|| format!("Failed to read font: {}", path.display()))?,
            (None, None) => {
                let path = find_system_font().context("No usable system font found")?;
                log::debug!("Using system font {}", path.display());
                std::fs::read(&path)
                    .with_context(|| format!("Failed to read font: {}", path.display()))?
            }
        };
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, font_size })
    }

    pub fn line_height(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.font_size)
            .map_or(self.font_size * 1.2, |m| m.new_line_size)
    }

    /// Blend one line of text into an RGBA buffer. `(x, baseline)` is the
    /// left end of the baseline.
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: i32,
        baseline: i32,
        color: [u8; 3],
    ) {
        let mut cursor_x = x as f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let left = cursor_x as i32 + metrics.xmin;
            let top = baseline - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }

                    let px = left + gx as i32;
                    let py = top + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }

                    let idx = (py as usize * width as usize + px as usize) * 4;
                    if idx + 3 >= pixels.len() {
                        continue;
                    }

                    let a = coverage as f32 / 255.0;
                    let inv_a = 1.0 - a;
                    for c in 0..3 {
                        pixels[idx + c] = (color[c] as f32 * a + pixels[idx + c] as f32 * inv_a) as u8;
                    }
                    pixels[idx + 3] = 255;
                }
            }

            cursor_x += metrics.advance_width;
        }
    }
}
