use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::frame::FftSize;

/// Lowest dB value reported for a bin. Silent bins would otherwise come out
/// as `-inf`, which must never reach the renderer.
pub const DB_FLOOR: f32 = -200.0;

/// Realtime frequency-analysis primitive.
///
/// Mirrors the analyser node of a browser audio graph: the newest
/// `fft_size` samples are Blackman-windowed, transformed, scaled by
/// `1 / fft_size`, blended with the previous magnitudes by the smoothing
/// time constant and finally reported in dB.
pub struct Analyser {
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_size: FftSize,
    smoothing: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(fft_size: FftSize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size.get());
        Self {
            planner,
            fft,
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            window: blackman_window(fft_size.get()),
            smoothed: vec![0.0; fft_size.bin_count()],
            scratch: vec![Complex::new(0.0, 0.0); fft_size.get()],
        }
    }

    pub fn fft_size(&self) -> FftSize {
        self.fft_size
    }

    /// Switch to a new FFT size. Buffers are reallocated and the smoothing
    /// history is dropped, since old bins do not line up with new ones.
    pub fn set_fft_size(&mut self, fft_size: FftSize) {
        if fft_size == self.fft_size {
            return;
        }
        self.fft = self.planner.plan_fft_forward(fft_size.get());
        self.window = blackman_window(fft_size.get());
        self.smoothed = vec![0.0; fft_size.bin_count()];
        self.scratch = vec![Complex::new(0.0, 0.0); fft_size.get()];
        self.fft_size = fft_size;
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    /// Analyse the `fft_size` samples that end right before `end`.
    /// Positions before the start of `samples` read as silence.
    pub fn analyse(&mut self, samples: &[f32], end: usize) -> Vec<f32> {
        let n = self.fft_size.get();
        let end = end.min(samples.len());
        let available = end.min(n);
        let pad = n - available;

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad {
                0.0
            } else {
                samples[end - available + (i - pad)]
            };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        self.smoothed
            .iter_mut()
            .zip(self.scratch.iter())
            .map(|(prev, bin)| {
                let magnitude = bin.norm() * scale;
                let value = tau * *prev + (1.0 - tau) * magnitude;
                // Keep the history finite so one bad sample can't poison it.
                *prev = if value.is_finite() { value } else { 0.0 };
                to_decibels(*prev)
            })
            .collect()
    }
}

fn to_decibels(magnitude: f32) -> f32 {
    if magnitude > 0.0 {
        (20.0 * magnitude.log10()).max(DB_FLOOR)
    } else {
        DB_FLOOR
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.42f32;
    let a1 = 0.5f32;
    let a2 = 0.08f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
        })
        .collect()
}
