use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::analyser::Analyser;
use super::decode::AudioData;
use super::frame::{FftSize, SpectrumFrame};

static NEXT_MEDIA_ID: AtomicU64 = AtomicU64::new(1);

/// Capability handle for one loaded media file.
///
/// Acquired once per file and released when dropped, which happens as soon
/// as the graph is handed a replacement or torn down.
pub struct MediaHandle {
    id: u64,
    label: String,
    audio: Arc<AudioData>,
}

impl MediaHandle {
    pub fn new(label: impl Into<String>, audio: AudioData) -> Self {
        let handle = Self {
            id: NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            audio: Arc::new(audio),
        };
        log::info!("Acquired media #{} ({})", handle.id, handle.label);
        handle
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn audio(&self) -> &Arc<AudioData> {
        &self.audio
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        log::info!("Released media #{} ({})", self.id, self.label);
    }
}

/// Boundary between the renderer and whatever owns the live audio source.
///
/// `latest_frame` must never block: if nothing new has been analysed the
/// adapter hands back its most recent frame again.
pub trait AudioGraphAdapter {
    fn latest_frame(&mut self) -> Option<SpectrumFrame>;

    fn set_fft_size(&mut self, fft_size: FftSize);

    fn set_smoothing(&mut self, smoothing: f32);

    /// Attach a new media source, releasing the previous one.
    fn load(&mut self, media: MediaHandle);

    /// Release the current media source, if any.
    fn release(&mut self);
}

/// Audio graph over a fully decoded file, driven by an explicit playhead.
pub struct FileAudioGraph {
    analyser: Analyser,
    media: Option<MediaHandle>,
    playhead: f64,
    cached: Option<(usize, SpectrumFrame)>,
}

impl FileAudioGraph {
    pub fn new(fft_size: FftSize, smoothing: f32) -> Self {
        Self {
            analyser: Analyser::new(fft_size, smoothing),
            media: None,
            playhead: 0.0,
            cached: None,
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        self.playhead = seconds.max(0.0);
    }

    pub fn duration(&self) -> f64 {
        self.media.as_ref().map_or(0.0, |m| m.audio().duration())
    }
}

impl AudioGraphAdapter for FileAudioGraph {
    fn latest_frame(&mut self) -> Option<SpectrumFrame> {
        let media = self.media.as_ref()?;
        let audio = media.audio();
        let end = (self.playhead * audio.sample_rate as f64) as usize;

        if let Some((cached_end, frame)) = &self.cached {
            if *cached_end == end && frame.fft_size() == self.analyser.fft_size() {
                return Some(frame.clone());
            }
        }

        let magnitudes = self.analyser.analyse(&audio.samples, end);
        let frame = SpectrumFrame::new(
            magnitudes,
            audio.sample_rate as f64,
            self.analyser.fft_size(),
        )?;
        self.cached = Some((end, frame.clone()));
        Some(frame)
    }

    fn set_fft_size(&mut self, fft_size: FftSize) {
        if fft_size != self.analyser.fft_size() {
            log::info!("Analyser FFT size {} -> {}", self.analyser.fft_size(), fft_size);
            self.analyser.set_fft_size(fft_size);
            self.cached = None;
        }
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.analyser.set_smoothing(smoothing);
    }

    fn load(&mut self, media: MediaHandle) {
        // Assigning drops the old handle before the new one is in use.
        self.media = Some(media);
        self.playhead = 0.0;
        self.cached = None;
    }

    fn release(&mut self) {
        self.media = None;
        self.cached = None;
    }
}
