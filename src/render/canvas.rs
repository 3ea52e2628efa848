use rayon::prelude::*;

use super::commands::{DrawCommand, Point, Rect, Rgba};
use super::text::TextOverlay;

/// Byte length of a `width` x `height` RGBA frame.
pub fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Software RGBA surface that executes draw commands with source-over
/// blending. Starts out opaque black.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    text: Option<TextOverlay>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, text: Option<TextOverlay>) -> Self {
        let mut pixels = vec![0u8; rgba_len(width, height)];
        pixels.par_chunks_mut(4).for_each(|px| px[3] = 255);
        Self {
            width,
            height,
            pixels,
            text,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn execute(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            if !command.is_finite() {
                log::trace!("Dropping non-finite draw command: {:?}", command);
                continue;
            }
            match command {
                DrawCommand::FillRect { rect, color } => self.fill_rect(rect, *color),
                DrawCommand::Line { from, to, color } => self.line(*from, *to, color.to_rgb()),
                DrawCommand::Circle {
                    center,
                    radius,
                    color,
                } => self.circle(*center, *radius, color.to_rgb()),
                DrawCommand::Text { text, position } => self.text(text, *position),
            }
        }
    }

    fn fill_rect(&mut self, rect: &Rect, color: Rgba) {
        let x0 = rect.x.max(0.0).floor() as usize;
        let y0 = rect.y.max(0.0).floor() as usize;
        let x1 = ((rect.x + rect.width).ceil().max(0.0) as usize).min(self.width as usize);
        let y1 = ((rect.y + rect.height).ceil().max(0.0) as usize).min(self.height as usize);
        if x0 >= x1 || y0 >= y1 || color.a <= 0.0 {
            return;
        }

        let a = color.a.min(1.0);
        let inv_a = 1.0 - a;
        let src = [color.r as f32 * a, color.g as f32 * a, color.b as f32 * a];
        let stride = self.width as usize * 4;

        self.pixels
            .par_chunks_mut(stride)
            .skip(y0)
            .take(y1 - y0)
            .for_each(|row| {
                for px in row[x0 * 4..x1 * 4].chunks_mut(4) {
                    for c in 0..3 {
                        px[c] = (src[c] + px[c] as f32 * inv_a).round() as u8;
                    }
                    px[3] = 255;
                }
            });
    }

    fn plot(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = ((y as usize * self.width as usize) + x as usize) * 4;
        self.pixels[idx..idx + 3].copy_from_slice(&rgb);
        self.pixels[idx + 3] = 255;
    }

    fn line(&mut self, from: Point, to: Point, rgb: [u8; 3]) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
        // Segments far off-canvas would otherwise plot millions of points.
        let limit = (self.width + self.height) as f32 * 4.0;
        if steps > limit {
            return;
        }
        let steps = steps as i64;
        for k in 0..=steps {
            let t = k as f32 / steps as f32;
            let x = (from.x + dx * t).round() as i64;
            let y = (from.y + dy * t).round() as i64;
            self.plot(x, y, rgb);
        }
    }

    fn circle(&mut self, center: Point, radius: f32, rgb: [u8; 3]) {
        let r = radius.max(0.0);
        let x0 = (center.x - r).floor() as i64;
        let x1 = (center.x + r).ceil() as i64;
        let y0 = (center.y - r).floor() as i64;
        let y1 = (center.y + r).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let ddx = x as f32 + 0.5 - center.x;
                let ddy = y as f32 + 0.5 - center.y;
                if ddx * ddx + ddy * ddy <= r * r {
                    self.plot(x, y, rgb);
                }
            }
        }
    }

    fn text(&mut self, text: &str, position: Point) {
        let Some(overlay) = &self.text else {
            return;
        };
        let line_height = overlay.line_height();
        for (i, line) in text.split('\n').enumerate() {
            let baseline = position.y + i as f32 * line_height;
            overlay.composite(
                &mut self.pixels,
                self.width,
                self.height,
                line,
                position.x as i32,
                baseline as i32,
                [255, 255, 255],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::commands::Hsl;

    fn pixel(canvas: &Canvas, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * canvas.width as usize + x as usize) * 4;
        let p = &canvas.pixels()[idx..idx + 4];
        [p[0], p[1], p[2], p[3]]
    }

    fn white_rect() -> DrawCommand {
        DrawCommand::FillRect {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
            },
            color: Rgba {
                r: 255,
                g: 255,
                b: 255,
                a: 1.0,
            },
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn frame_length_does_not_wrap_at_u32() {
        // 70000 * 70000 * 4 is far past u32::MAX.
        assert_eq!(rgba_len(70_000, 70_000), 19_600_000_000);
        assert_eq!(rgba_len(3, 2), 24);
    }

    #[test]
    fn starts_black_and_opaque() {
        let canvas = Canvas::new(3, 2, None);
        assert_eq!(canvas.pixels().len(), 24);
        assert_eq!(pixel(&canvas, 2, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_fill_fades() {
        let mut canvas = Canvas::new(4, 4, None);
        canvas.execute(&[white_rect()]);
        assert_eq!(pixel(&canvas, 1, 1), [255, 255, 255, 255]);

        canvas.execute(&[DrawCommand::FillRect {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
            },
            color: Rgba::black(0.5),
        }]);
        assert_eq!(pixel(&canvas, 1, 1), [128, 128, 128, 255]);
    }

    #[test]
    fn zero_alpha_fill_keeps_trails() {
        let mut canvas = Canvas::new(4, 4, None);
        canvas.execute(&[white_rect()]);
        canvas.execute(&[DrawCommand::FillRect {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
            },
            color: Rgba::black(0.0),
        }]);
        assert_eq!(pixel(&canvas, 3, 3), [255, 255, 255, 255]);
    }

    #[test]
    fn fill_is_clipped() {
        let mut canvas = Canvas::new(4, 4, None);
        canvas.execute(&[DrawCommand::FillRect {
            rect: Rect {
                x: 2.0,
                y: -10.0,
                width: 100.0,
                height: 11.0,
            },
            color: Rgba {
                r: 10,
                g: 20,
                b: 30,
                a: 1.0,
            },
        }]);
        assert_eq!(pixel(&canvas, 3, 0), [10, 20, 30, 255]);
        assert_eq!(pixel(&canvas, 1, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&canvas, 3, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn line_hits_both_ends() {
        let mut canvas = Canvas::new(10, 10, None);
        canvas.execute(&[DrawCommand::Line {
            from: Point::new(1.0, 1.0),
            to: Point::new(8.0, 5.0),
            color: Hsl::new(0, 100, 50),
        }]);
        assert_eq!(pixel(&canvas, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&canvas, 8, 5), [255, 0, 0, 255]);
        assert_eq!(pixel(&canvas, 8, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn offscreen_and_nan_are_ignored() {
        let mut canvas = Canvas::new(4, 4, None);
        canvas.execute(&[
            DrawCommand::Line {
                from: Point::new(-1e9, 0.0),
                to: Point::new(1e9, 0.0),
                color: Hsl::WHITE,
            },
            DrawCommand::Circle {
                center: Point::new(f32::NAN, 1.0),
                radius: 2.5,
                color: Hsl::WHITE,
            },
        ]);
        assert!(canvas.pixels().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn circle_fills_center() {
        let mut canvas = Canvas::new(10, 10, None);
        canvas.execute(&[DrawCommand::Circle {
            center: Point::new(5.0, 5.0),
            radius: 2.5,
            color: Hsl::WHITE,
        }]);
        assert_eq!(pixel(&canvas, 5, 5), [255, 255, 255, 255]);
        assert_eq!(pixel(&canvas, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut canvas = Canvas::new(8, 8, None);
        canvas.execute(&[DrawCommand::Text {
            text: "FPS: 60.00".into(),
            position: Point::new(0.0, 4.0),
        }]);
        assert!(canvas.pixels().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }
}
