use std::time::{Duration, Instant};

use crate::analysis::axis::{bar_height, hue, map_bin_to_x, range_length};
use crate::analysis::segments;
use crate::audio::analyser::DB_FLOOR;
use crate::audio::graph::{AudioGraphAdapter, MediaHandle};
use crate::error::ConfigError;

use super::commands::{DrawCommand, Hsl, Point, Rect, Rgba};
use super::settings::{SettingsUpdate, VisualizerSettings, MIN_WINDOW_EXPONENT};

const LINE_SATURATION: u8 = 80;
const LINE_LIGHTNESS: u8 = 60;
const MARKER_RADIUS: f32 = 2.5;
const OVERLAY_WIDTH: f32 = 100.0;
const OVERLAY_HEIGHT: f32 = 48.0;
const OVER_BUDGET_LIMIT: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// No audio graph attached.
    Idle,
    /// Graph attached, waiting for media.
    Armed,
    /// Drawing every tick.
    Running,
}

/// State carried from one tick to the next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    pub previous_point: Point,
    pub trail_alpha: f32,
}

/// Tracks how many consecutive ticks blew the frame budget.
#[derive(Debug)]
pub struct FrameBudget {
    budget: Duration,
    over_streak: u32,
    warned: bool,
}

impl FrameBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            over_streak: 0,
            warned: false,
        }
    }

    /// Record one tick. Returns true once the streak of over-budget ticks
    /// reaches the limit; the streak then starts over.
    pub fn observe(&mut self, elapsed: Duration) -> bool {
        if elapsed <= self.budget {
            self.over_streak = 0;
            return false;
        }
        self.over_streak += 1;
        if self.over_streak >= OVER_BUDGET_LIMIT {
            self.over_streak = 0;
            return true;
        }
        false
    }
}

/// Owns the draw loop: pulls frames from the audio graph and turns them
/// into draw commands.
pub struct Renderer<A: AudioGraphAdapter> {
    settings: VisualizerSettings,
    width: f32,
    height: f32,
    state: RenderState,
    adapter: Option<A>,
    running: bool,
    last_tick: Option<Duration>,
    fps: f64,
    budget: FrameBudget,
}

impl<A: AudioGraphAdapter> Renderer<A> {
    pub fn new(settings: VisualizerSettings, width: u32, height: u32) -> Self {
        let state = RenderState {
            previous_point: Point::ORIGIN,
            trail_alpha: settings.trail_alpha,
        };
        Self {
            settings,
            width: width as f32,
            height: height as f32,
            state,
            adapter: None,
            running: false,
            last_tick: None,
            fps: 0.0,
            budget: FrameBudget::new(Duration::from_secs_f64(1.0 / 60.0)),
        }
    }

    pub fn loop_state(&self) -> LoopState {
        match (&self.adapter, self.running) {
            (None, _) => LoopState::Idle,
            (Some(_), false) => LoopState::Armed,
            (Some(_), true) => LoopState::Running,
        }
    }

    pub fn settings(&self) -> &VisualizerSettings {
        &self.settings
    }

    pub fn adapter_mut(&mut self) -> Option<&mut A> {
        self.adapter.as_mut()
    }

    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.budget = FrameBudget::new(budget);
    }

    /// Attach an audio graph. A previously attached graph is dropped along
    /// with its media.
    pub fn attach(&mut self, mut adapter: A) {
        adapter.set_fft_size(self.settings.fft_size);
        adapter.set_smoothing(self.settings.smoothing);
        self.adapter = Some(adapter);
        self.running = false;
        log::info!("Renderer armed");
    }

    /// Hand new media to the graph and start drawing. Hands the media back
    /// if no graph is attached.
    pub fn load(&mut self, media: MediaHandle) -> Result<(), MediaHandle> {
        let Some(adapter) = self.adapter.as_mut() else {
            return Err(media);
        };
        log::info!("Loading media #{} ({})", media.id(), media.label());
        adapter.load(media);
        if !self.running {
            self.running = true;
            self.last_tick = None;
            log::info!("Renderer running");
        }
        Ok(())
    }

    /// Stop drawing and drop the graph, releasing its media.
    pub fn teardown(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.release();
        }
        self.running = false;
        self.state.previous_point = Point::ORIGIN;
        self.last_tick = None;
        log::info!("Renderer idle");
    }

    /// Apply a control change. Takes effect on the next tick; a rejected
    /// update leaves everything as it was.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), ConfigError> {
        if let Err(err) = self.settings.apply(update) {
            log::warn!("Rejected settings update: {}", err);
            return Err(err);
        }
        self.state.trail_alpha = self.settings.trail_alpha;
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_fft_size(self.settings.fft_size);
            adapter.set_smoothing(self.settings.smoothing);
        }
        Ok(())
    }

    /// Draw one frame. `now` is the host's frame timestamp, used for the
    /// frame-rate readout. Returns nothing unless the loop is running and
    /// the graph has a frame matching the configured FFT size.
    pub fn tick(&mut self, now: Duration) -> Vec<DrawCommand> {
        if !self.running {
            return Vec::new();
        }
        let started = Instant::now();

        if let Some(last) = self.last_tick {
            let delta = now.saturating_sub(last).as_secs_f64();
            if delta > 0.0 {
                self.fps = 1.0 / delta;
            }
        }
        self.last_tick = Some(now);

        let Some(frame) = self.adapter.as_mut().and_then(|a| a.latest_frame()) else {
            log::trace!("No frame available, skipping tick");
            return Vec::new();
        };
        if frame.fft_size() != self.settings.fft_size {
            log::debug!(
                "Frame size {} does not match configured {}, skipping tick",
                frame.fft_size(),
                self.settings.fft_size
            );
            return Vec::new();
        }

        let magnitudes = frame.magnitudes();
        let bins = magnitudes.len();

        let mut marked = vec![false; bins];
        if self.settings.segment_detection {
            for seg in segments::detect(magnitudes, self.settings.window_radius()) {
                marked[seg.start] = true;
            }
        }

        let range = range_length(bins, self.settings.range_fraction);
        let mut commands = Vec::with_capacity(range + 8);

        commands.push(DrawCommand::FillRect {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: self.width,
                height: self.height,
            },
            color: Rgba::black(self.state.trail_alpha),
        });

        for (i, &raw) in magnitudes.iter().enumerate().take(range) {
            let magnitude = if raw.is_finite() { raw } else { DB_FLOOR };
            let x = map_bin_to_x(i, range, self.settings.blend, self.width);
            let y = self.height - bar_height(magnitude, self.height) / 2.0;
            let point = Point::new(x, y);

            commands.push(DrawCommand::Line {
                from: self.state.previous_point,
                to: point,
                color: Hsl::new(hue(magnitude), LINE_SATURATION, LINE_LIGHTNESS),
            });
            self.state.previous_point = point;

            if marked[i] {
                commands.push(DrawCommand::Circle {
                    center: point,
                    radius: MARKER_RADIUS,
                    color: Hsl::WHITE,
                });
                commands.push(DrawCommand::Text {
                    text: format!("{:.0}\n{:.2}", frame.bin_frequency(i), raw),
                    position: point,
                });
            }
        }

        self.state.previous_point = Point::ORIGIN;
        let elapsed = started.elapsed();

        commands.push(DrawCommand::FillRect {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: OVERLAY_WIDTH,
                height: OVERLAY_HEIGHT,
            },
            color: Rgba::black(1.0),
        });
        commands.push(DrawCommand::Text {
            text: format!("FPS: {:.2}", self.fps),
            position: Point::new(0.0, 24.0),
        });
        commands.push(DrawCommand::Text {
            text: format!("Delay: {:.2} ms", elapsed.as_secs_f64() * 1000.0),
            position: Point::new(0.0, 48.0),
        });

        self.check_budget(elapsed);
        commands
    }

    fn check_budget(&mut self, elapsed: Duration) {
        if !self.budget.observe(elapsed) {
            return;
        }
        let exp = self.settings.window_radius_exponent;
        if self.settings.auto_downgrade
            && self.settings.segment_detection
            && exp > MIN_WINDOW_EXPONENT
        {
            self.settings.window_radius_exponent = exp - 1;
            log::warn!(
                "Ticks over frame budget, lowering window radius exponent to {}",
                exp - 1
            );
        } else if !self.budget.warned {
            self.budget.warned = true;
            log::warn!(
                "Ticks consistently exceed the {:.1} ms frame budget",
                self.budget.budget.as_secs_f64() * 1000.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::AudioData;
    use crate::audio::frame::{FftSize, SpectrumFrame};
    use std::sync::Arc;

    /// Adapter that serves a fixed frame and records calls.
    struct ScriptedAdapter {
        frame: Option<SpectrumFrame>,
        media: Option<MediaHandle>,
        fft_sizes: Vec<FftSize>,
        smoothing: Vec<f32>,
    }

    impl ScriptedAdapter {
        fn new(frame: Option<SpectrumFrame>) -> Self {
            Self {
                frame,
                media: None,
                fft_sizes: Vec::new(),
                smoothing: Vec::new(),
            }
        }
    }

    impl AudioGraphAdapter for ScriptedAdapter {
        fn latest_frame(&mut self) -> Option<SpectrumFrame> {
            self.frame.clone()
        }
        fn set_fft_size(&mut self, fft_size: FftSize) {
            self.fft_sizes.push(fft_size);
        }
        fn set_smoothing(&mut self, smoothing: f32) {
            self.smoothing.push(smoothing);
        }
        fn load(&mut self, media: MediaHandle) {
            self.media = Some(media);
        }
        fn release(&mut self) {
            self.media = None;
        }
    }

    fn media() -> MediaHandle {
        MediaHandle::new(
            "test",
            AudioData {
                samples: vec![0.0; 16],
                sample_rate: 44100,
            },
        )
    }

    fn flat_frame(level: f32) -> SpectrumFrame {
        SpectrumFrame::new(vec![level; 1024], 44100.0, FftSize::DEFAULT).unwrap()
    }

    fn running(frame: SpectrumFrame, settings: VisualizerSettings) -> Renderer<ScriptedAdapter> {
        let mut renderer = Renderer::new(settings, 1000, 600);
        renderer.attach(ScriptedAdapter::new(Some(frame)));
        assert!(renderer.load(media()).is_ok());
        renderer
    }

    fn lines(commands: &[DrawCommand]) -> Vec<(Point, Point)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lifecycle_transitions() {
        let mut renderer: Renderer<ScriptedAdapter> =
            Renderer::new(VisualizerSettings::default(), 100, 100);
        assert_eq!(renderer.loop_state(), LoopState::Idle);
        assert!(renderer.tick(Duration::ZERO).is_empty());

        assert!(renderer.load(media()).is_err());

        renderer.attach(ScriptedAdapter::new(Some(flat_frame(-80.0))));
        assert_eq!(renderer.loop_state(), LoopState::Armed);
        assert!(renderer.tick(Duration::ZERO).is_empty());

        renderer.load(media()).unwrap();
        assert_eq!(renderer.loop_state(), LoopState::Running);
        assert!(!renderer.tick(Duration::ZERO).is_empty());

        renderer.teardown();
        assert_eq!(renderer.loop_state(), LoopState::Idle);
        assert!(renderer.tick(Duration::ZERO).is_empty());
    }

    #[test]
    fn attach_pushes_current_settings() {
        let mut renderer = Renderer::new(VisualizerSettings::default(), 100, 100);
        renderer.attach(ScriptedAdapter::new(None));
        let adapter = renderer.adapter_mut().unwrap();
        assert_eq!(adapter.fft_sizes, vec![FftSize::DEFAULT]);
        assert_eq!(adapter.smoothing, vec![0.5]);
    }

    #[test]
    fn teardown_releases_media() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        let audio = Arc::downgrade(renderer.adapter_mut().unwrap().media.as_ref().unwrap().audio());
        renderer.teardown();
        assert!(audio.upgrade().is_none());
    }

    #[test]
    fn replacing_media_releases_previous() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        let first = Arc::downgrade(renderer.adapter_mut().unwrap().media.as_ref().unwrap().audio());
        renderer.load(media()).unwrap();
        assert!(first.upgrade().is_none());
        assert_eq!(renderer.loop_state(), LoopState::Running);
    }

    #[test]
    fn fade_comes_first_and_overlay_last() {
        let settings = VisualizerSettings {
            trail_alpha: 0.25,
            ..Default::default()
        };
        let mut renderer = running(flat_frame(-80.0), settings);
        let commands = renderer.tick(Duration::from_millis(16));

        match &commands[0] {
            DrawCommand::FillRect { rect, color } => {
                assert_eq!((rect.width, rect.height), (1000.0, 600.0));
                assert_eq!(color.a, 0.25);
            }
            other => panic!("expected fade rect, got {:?}", other),
        }

        let n = commands.len();
        assert!(matches!(
            &commands[n - 3],
            DrawCommand::FillRect { rect, .. } if rect.width == 100.0 && rect.height == 48.0
        ));
        assert!(matches!(&commands[n - 2], DrawCommand::Text { text, .. } if text.starts_with("FPS: ")));
        assert!(matches!(&commands[n - 1], DrawCommand::Text { text, .. } if text.starts_with("Delay: ") && text.ends_with(" ms")));
    }

    #[test]
    fn polyline_covers_range_and_restarts_each_frame() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        for tick in 0..3 {
            let commands = renderer.tick(Duration::from_millis(16 * tick));
            let segs = lines(&commands);
            assert_eq!(segs.len(), 921);
            assert_eq!(segs[0].0, Point::ORIGIN);
            for pair in segs.windows(2) {
                assert_eq!(pair[0].1, pair[1].0);
            }
            assert_eq!(renderer.state.previous_point, Point::ORIGIN);
        }
    }

    #[test]
    fn contour_geometry() {
        let mut renderer = running(flat_frame(-54.0), VisualizerSettings::default());
        let commands = renderer.tick(Duration::ZERO);
        let segs = lines(&commands);
        // (-54 + 150) * 600 / 96 = 600, so y = 600 - 300
        assert_eq!(segs[0].1, Point::new(0.0, 300.0));
        assert!(commands.iter().all(DrawCommand::is_finite));
    }

    #[test]
    fn non_finite_magnitudes_never_reach_commands() {
        let mut data = vec![-80.0f32; 1024];
        data[3] = f32::NAN;
        data[4] = f32::NEG_INFINITY;
        let frame = SpectrumFrame::new(data, 44100.0, FftSize::DEFAULT).unwrap();
        let mut renderer = running(
            frame,
            VisualizerSettings {
                segment_detection: true,
                ..Default::default()
            },
        );
        let commands = renderer.tick(Duration::ZERO);
        assert!(commands.iter().all(DrawCommand::is_finite));
    }

    #[test]
    fn marks_segment_starts() {
        let mut data = vec![-80.0f32; 1024];
        data[100] = -10.0;
        let frame = SpectrumFrame::new(data, 44100.0, FftSize::DEFAULT).unwrap();
        let settings = VisualizerSettings {
            segment_detection: true,
            window_radius_exponent: 1,
            ..Default::default()
        };
        let mut renderer = running(frame, settings);
        let commands = renderer.tick(Duration::ZERO);

        let circles: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { .. }))
            .collect();
        assert_eq!(circles.len(), 1);
        // 100 * 44100 / 2048 = 2153.3
        assert!(commands.iter().any(
            |c| matches!(c, DrawCommand::Text { text, .. } if text == "2153\n-10.00")
        ));
    }

    #[test]
    fn detection_disabled_draws_no_markers() {
        let mut data = vec![-80.0f32; 1024];
        data[100] = -10.0;
        let frame = SpectrumFrame::new(data, 44100.0, FftSize::DEFAULT).unwrap();
        let mut renderer = running(frame, VisualizerSettings::default());
        let commands = renderer.tick(Duration::ZERO);
        assert!(!commands.iter().any(|c| matches!(c, DrawCommand::Circle { .. })));
    }

    #[test]
    fn skips_tick_on_fft_size_mismatch() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        renderer
            .apply(&SettingsUpdate {
                fft_size: Some(8192),
                ..Default::default()
            })
            .unwrap();
        // The scripted graph still serves 2048-point frames.
        assert!(renderer.tick(Duration::ZERO).is_empty());
        assert_eq!(renderer.loop_state(), LoopState::Running);
        assert_eq!(
            renderer.adapter_mut().unwrap().fft_sizes.last(),
            Some(&FftSize::try_from(8192).unwrap())
        );
    }

    #[test]
    fn rejected_update_keeps_running_config() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        let before = renderer.settings().clone();
        let err = renderer.apply(&SettingsUpdate {
            window_radius_exponent: Some(9),
            ..Default::default()
        });
        assert_eq!(err, Err(ConfigError::WindowExponentOutOfRange(9)));
        assert_eq!(renderer.settings(), &before);
        assert!(!renderer.tick(Duration::ZERO).is_empty());
    }

    #[test]
    fn trail_alpha_update_applies_next_tick() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        renderer
            .apply(&SettingsUpdate {
                trail_alpha: Some(0.1),
                smoothing: Some(0.9),
                ..Default::default()
            })
            .unwrap();
        let commands = renderer.tick(Duration::ZERO);
        assert!(matches!(&commands[0], DrawCommand::FillRect { color, .. } if color.a == 0.1));
        assert_eq!(renderer.adapter_mut().unwrap().smoothing.last(), Some(&0.9));
    }

    #[test]
    fn fps_from_tick_spacing() {
        let mut renderer = running(flat_frame(-80.0), VisualizerSettings::default());
        renderer.tick(Duration::from_millis(1000));
        let commands = renderer.tick(Duration::from_millis(1020));
        assert!(commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "FPS: 50.00")));
    }

    #[test]
    fn budget_trips_after_streak() {
        let mut budget = FrameBudget::new(Duration::from_millis(16));
        for _ in 0..OVER_BUDGET_LIMIT - 1 {
            assert!(!budget.observe(Duration::from_millis(40)));
        }
        assert!(budget.observe(Duration::from_millis(40)));

        for _ in 0..10 {
            budget.observe(Duration::from_millis(40));
        }
        assert!(!budget.observe(Duration::from_millis(5)));
        assert_eq!(budget.over_streak, 0);
    }

    #[test]
    fn downgrade_lowers_exponent() {
        let settings = VisualizerSettings {
            segment_detection: true,
            auto_downgrade: true,
            window_radius_exponent: 2,
            ..Default::default()
        };
        let mut renderer = running(flat_frame(-80.0), settings);
        renderer.set_frame_budget(Duration::ZERO);
        for _ in 0..OVER_BUDGET_LIMIT {
            renderer.check_budget(Duration::from_millis(50));
        }
        assert_eq!(renderer.settings().window_radius_exponent, 1);
        for _ in 0..OVER_BUDGET_LIMIT {
            renderer.check_budget(Duration::from_millis(50));
        }
        assert_eq!(renderer.settings().window_radius_exponent, 1);
    }
}
