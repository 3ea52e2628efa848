/// A run of consecutive prominent bins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub length: usize,
}

/// Find locally prominent bins and merge neighbours into segments.
///
/// Bin `i` is prominent when, inside `[i - radius, i + radius]` clipped to
/// the slice, it is strictly above the window mean and equal to the window
/// maximum. Runs cost O(N * radius).
pub fn detect(magnitudes: &[f32], window_radius: usize) -> Vec<Segment> {
    let n = magnitudes.len();
    let radius = window_radius.max(1);
    let mut segments = Vec::new();
    let mut open: Option<usize> = None;

    for i in 0..n {
        if is_prominent(magnitudes, i, radius) {
            open.get_or_insert(i);
        } else if let Some(start) = open.take() {
            segments.push(Segment {
                start,
                length: i - start,
            });
        }
    }

    if let Some(start) = open {
        segments.push(Segment {
            start,
            length: n - start,
        });
    }

    segments
}

fn is_prominent(magnitudes: &[f32], i: usize, radius: usize) -> bool {
    let start = i.saturating_sub(radius);
    let end = (i + radius + 1).min(magnitudes.len());
    let window = &magnitudes[start..end];

    let mut sum = 0.0f64;
    let mut max = f32::NEG_INFINITY;
    for &v in window {
        sum += v as f64;
        if v > max {
            max = v;
        }
    }
    let mean = sum / window.len() as f64;
    let value = magnitudes[i];

    (value as f64) > mean && value == max
}
