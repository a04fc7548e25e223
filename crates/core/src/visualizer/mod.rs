//! Pulse-line visualizer.
//!
//! With an analyser tap connected, every tick samples the spectrum into a
//! short history and draws the newest frames as fading, glowing curves.
//! Without one, an idle pulse driven by wall-clock time keeps the surface
//! alive.

use std::{collections::VecDeque, f64::consts::TAU};

use crate::{
    audio::SharedAnalyzer,
    config::VisualizerConfig,
    manifest::ColorTheme,
    render::{DrawSurface, LinearGradient, Paint, Path, Point, Shadow, StrokeStyle},
    timeline::{FrameScheduler, FrameToken},
};

const BASE_LINE_WIDTH: f32 = 3.0;
const LINE_WIDTH_STEP: f32 = 0.4;
const OPACITY_STEP: f32 = 0.2;
const AMPLITUDE_SCALE: f32 = 0.4;
const PHASE_PER_SAMPLE: f32 = 0.3;
const PULSE_PHASE_PER_SAMPLE: f32 = 0.5;
const PULSE_RATE: f64 = 0.003;
const PULSE_HEIGHT: f32 = 5.0;
const BASE_GLOW: f32 = 10.0;
const EXTRA_GLOW: f32 = 20.0;
const CENTER_LINE_OPACITY: f32 = 0.1;
const IDLE_OPACITY: f32 = 0.3;
const IDLE_LINE_WIDTH: f32 = 2.0;

pub struct PulseVisualizer {
    config: VisualizerConfig,
    history: VecDeque<Vec<u8>>,
    mean_magnitude: f32,
    bins: Vec<u8>,
    theme: ColorTheme,
    tap: Option<SharedAnalyzer>,
    width: f32,
    height: f32,
    scale: f32,
    active: bool,
    pending: Option<FrameToken>,
}

impl PulseVisualizer {
    pub fn new(config: VisualizerConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            mean_magnitude: 0.0,
            bins: Vec::new(),
            theme: ColorTheme::default(),
            tap: None,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
            active: false,
            pending: None,
        }
    }

    /// Attaches the analyser tap lent by the playback engine.
    pub fn connect(&mut self, tap: SharedAnalyzer) {
        tracing::debug!(bins = tap.frequency_bin_count(), "visualizer connected to analyser");
        self.tap = Some(tap);
    }

    pub fn is_connected(&self) -> bool {
        self.tap.is_some()
    }

    /// Replaces the palette used from the next frame on.
    pub fn set_theme(&mut self, theme: ColorTheme) {
        self.theme = theme;
    }

    pub fn theme(&self) -> &ColorTheme {
        &self.theme
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frames sampled so far, newest first.
    pub fn history(&self) -> &VecDeque<Vec<u8>> {
        &self.history
    }

    pub fn mean_magnitude(&self) -> f32 {
        self.mean_magnitude
    }

    pub fn dimensions(&self) -> (f32, f32, f32) {
        (self.width, self.height, self.scale)
    }

    /// Matches the surface to its container. The render loop keeps running.
    pub fn resize<S: DrawSurface>(&mut self, surface: &mut S, width: f32, height: f32, pixel_ratio: f32) {
        let scale = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.scale = scale;

        let physical_width = (self.width * scale).round() as u32;
        let physical_height = (self.height * scale).round() as u32;
        surface.resize(physical_width, physical_height, scale);
        tracing::trace!(physical_width, physical_height, scale, "visualizer resized");
    }

    pub fn show<F: FrameScheduler>(&mut self, scheduler: &mut F) {
        if self.active {
            return;
        }
        self.active = true;
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_frame());
        }
    }

    pub fn hide<S: DrawSurface>(&mut self, surface: &mut S) {
        self.active = false;
        surface.clear();
    }

    pub fn dispose<S: DrawSurface, F: FrameScheduler>(&mut self, surface: &mut S, scheduler: &mut F) {
        self.active = false;
        if let Some(token) = self.pending.take() {
            scheduler.cancel_frame(token);
        }
        surface.clear();
    }

    /// Animation callback. Renders and schedules the next frame while active;
    /// stale or unexpected tokens are ignored.
    pub fn on_frame<S: DrawSurface, F: FrameScheduler>(
        &mut self,
        token: FrameToken,
        now_ms: f64,
        surface: &mut S,
        scheduler: &mut F,
    ) {
        if self.pending != Some(token) {
            return;
        }
        self.pending = None;
        if !self.active {
            return;
        }

        self.render(now_ms, surface);
        self.pending = Some(scheduler.request_frame());
    }

    /// One tick: sample the tap when connected, then draw.
    pub fn render<S: DrawSurface>(&mut self, now_ms: f64, surface: &mut S) {
        surface.clear();

        if self.tap.is_none() {
            self.draw_center_line(surface);
            self.draw_idle(now_ms, surface);
            return;
        }

        self.sample();
        self.draw_center_line(surface);
        self.draw_history(now_ms, surface);
    }

    /// Pulls the current spectrum into the history. Returns whether a frame
    /// was recorded.
    pub fn sample(&mut self) -> bool {
        let Some(tap) = &self.tap else {
            return false;
        };
        if let Err(err) = tap.read_frequency_data(&mut self.bins) {
            tracing::warn!(%err, "could not read analyser data");
            return false;
        }

        let frame = downsample(&self.bins, self.config.sample_count);
        self.mean_magnitude = mean(&self.bins);
        self.history.push_front(frame);
        self.history.truncate(self.config.history_capacity);
        true
    }

    fn draw_center_line<S: DrawSurface>(&self, surface: &mut S) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let center = self.height / 2.0;
        let mut path = Path::new();
        path.move_to(Point::new(0.0, center))
            .line_to(Point::new(self.width, center));

        surface.stroke_path(
            &path,
            &StrokeStyle {
                paint: Paint::Solid(self.theme.accent.with_alpha(CENTER_LINE_OPACITY)),
                width: 1.0,
                shadow: None,
            },
        );
    }

    fn draw_history<S: DrawSurface>(&self, now_ms: f64, surface: &mut S) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }

        let visible = self.history.len().min(self.config.rendered_frames);
        let glow = BASE_GLOW + self.mean_magnitude / 255.0 * EXTRA_GLOW;

        for age in (0..visible).rev() {
            let opacity = (1.0 - age as f32 * OPACITY_STEP).max(0.0);
            let width = (BASE_LINE_WIDTH - age as f32 * LINE_WIDTH_STEP).max(0.0);
            let points = self.pulse_points(&self.history[age], now_ms);
            surface.stroke_path(
                &Path::smooth_through(&points),
                &self.gradient_style(opacity, width, glow),
            );
        }
    }

    /// Sample positions for one history frame.
    pub fn pulse_points(&self, frame: &[u8], now_ms: f64) -> Vec<Point> {
        let center = self.height / 2.0;
        let step = spacing(self.width, frame.len());
        let time_phase = phase(now_ms, PULSE_RATE);

        frame
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let i = i as f32;
                let amplitude = value as f32 / 255.0 * AMPLITUDE_SCALE * self.height;
                let pulse = (i * PULSE_PHASE_PER_SAMPLE + time_phase).sin() * PULSE_HEIGHT;
                Point::new(
                    i * step,
                    center + amplitude * (i * PHASE_PER_SAMPLE).sin() + pulse,
                )
            })
            .collect()
    }

    /// Positions of the idle pulse at `now_ms`.
    pub fn idle_points(&self, now_ms: f64) -> Vec<Point> {
        let count = self.config.idle_points;
        let center = self.height / 2.0;
        let step = spacing(self.width, count);
        let slow = phase(now_ms, 0.002);
        let slower = phase(now_ms, 0.0013);

        (0..count)
            .map(|i| {
                let i = i as f32;
                let wave = (i * 0.2 + slow).sin() * 15.0 + (i * 0.13 + slower + 1.0).sin() * 10.0;
                Point::new(i * step, center + wave)
            })
            .collect()
    }

    fn draw_idle<S: DrawSurface>(&self, now_ms: f64, surface: &mut S) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let points = self.idle_points(now_ms);
        surface.stroke_path(
            &Path::smooth_through(&points),
            &self.gradient_style(IDLE_OPACITY, IDLE_LINE_WIDTH, BASE_GLOW),
        );
    }

    fn gradient_style(&self, opacity: f32, width: f32, glow: f32) -> StrokeStyle {
        let edge = self.theme.accent.with_alpha(opacity);
        let middle = self.theme.primary.with_alpha(opacity);
        StrokeStyle {
            paint: Paint::Gradient(LinearGradient::symmetric(self.width, edge, middle)),
            width,
            shadow: Some(Shadow { blur: glow, color: edge }),
        }
    }
}

impl std::fmt::Debug for PulseVisualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseVisualizer")
            .field("connected", &self.tap.is_some())
            .field("active", &self.active)
            .field("history", &self.history.len())
            .field("size", &(self.width, self.height, self.scale))
            .finish()
    }
}

/// Picks every `floor(bins.len() / count)`-th bin. Bins past the end read
/// as silence.
pub fn downsample(bins: &[u8], count: usize) -> Vec<u8> {
    let step = (bins.len() / count.max(1)).max(1);
    (0..count)
        .map(|i| bins.get(i * step).copied().unwrap_or(0))
        .collect()
}

fn mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().map(|&b| b as f32).sum::<f32>() / bins.len() as f32
}

/// `now_ms * rate` wrapped to one period before narrowing, so epoch-scale
/// timestamps keep sub-millisecond resolution.
fn phase(now_ms: f64, rate: f64) -> f32 {
    (now_ms * rate).rem_euclid(TAU) as f32
}

fn spacing(width: f32, points: usize) -> f32 {
    if points > 1 {
        width / (points - 1) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests;
