use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Straight RGB with a unit-range alpha.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub fn black(alpha: f32) -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: alpha.clamp(0.0, 1.0),
        }
    }
}

/// Hue in degrees, saturation and lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

impl Hsl {
    pub const WHITE: Hsl = Hsl { h: 0, s: 0, l: 100 };

    pub fn new(h: u16, s: u8, l: u8) -> Self {
        Self {
            h: h % 360,
            s: s.min(100),
            l: l.min(100),
        }
    }

    pub fn to_rgb(self) -> [u8; 3] {
        let s = self.s as f32 / 100.0;
        let l = self.l as f32 / 100.0;
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let hp = (self.h % 360) as f32 / 60.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r, g, b) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        [to_byte(r), to_byte(g), to_byte(b)]
    }
}

/// Backend-agnostic 2D drawing instruction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect { rect: Rect, color: Rgba },
    Line { from: Point, to: Point, color: Hsl },
    Circle { center: Point, radius: f32, color: Hsl },
    /// `position` is the baseline-left of the first line; `\n` starts a new
    /// line.
    Text { text: String, position: Point },
}

impl DrawCommand {
    /// True when every coordinate in the command is a finite number.
    pub fn is_finite(&self) -> bool {
        match self {
            DrawCommand::FillRect { rect, color } => {
                rect.x.is_finite()
                    && rect.y.is_finite()
                    && rect.width.is_finite()
                    && rect.height.is_finite()
                    && color.a.is_finite()
            }
            DrawCommand::Line { from, to, .. } => from.is_finite() && to.is_finite(),
            DrawCommand::Circle { center, radius, .. } => center.is_finite() && radius.is_finite(),
            DrawCommand::Text { position, .. } => position.is_finite(),
        }
    }
}
