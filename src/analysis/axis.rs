/// Offset that lifts analyser dB values (roughly -150..0) above zero.
pub const MAGNITUDE_OFFSET: f32 = 150.0;
/// Vertical scale divisor: `(m + 150) * height / 64 / 1.5`.
pub const HEIGHT_DIVISOR: f32 = 64.0 * 1.5;
/// Degrees of hue per dB above the offset.
pub const HUE_PER_DB: f32 = 6.0;

/// Map bin `i` onto `[0, canvas_width]`.
///
/// `blend` interpolates between a logarithmic axis (0) and a linear one (1).
/// Bin 0 always maps to 0; `ln(0)` never enters the result.
pub fn map_bin_to_x(i: usize, range_length: usize, blend: f32, canvas_width: f32) -> f32 {
    if i == 0 || range_length == 0 {
        return 0.0;
    }
    let blend = blend.clamp(0.0, 1.0) as f64;
    let n = range_length as f64;
    let i = i as f64;

    let linear = i / n;
    let log = if range_length > 1 { i.ln() / n.ln() } else { linear };

    ((log * (1.0 - blend) + linear * blend) * canvas_width as f64) as f32
}

/// Height of the contour at a given dB magnitude.
pub fn bar_height(magnitude: f32, canvas_height: f32) -> f32 {
    (magnitude + MAGNITUDE_OFFSET) * canvas_height / HEIGHT_DIVISOR
}

/// Hue in degrees, `[0, 360)`.
pub fn hue(magnitude: f32) -> u16 {
    ((magnitude + MAGNITUDE_OFFSET) * HUE_PER_DB).floor().rem_euclid(360.0) as u16
}

/// Number of bins drawn out of `bin_count`; the top slice near Nyquist is
/// left off.
pub fn range_length(bin_count: usize, fraction: f32) -> usize {
    ((bin_count as f64 * fraction.clamp(0.0, 1.0) as f64) as usize).min(bin_count)
}
