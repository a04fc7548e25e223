use std::sync::{Arc, Mutex};

use super::*;
use crate::{
    audio::FrequencyAnalyzer,
    render::{Color, DrawCommand, RecordingSurface},
    timeline::FrameQueue,
    Result,
};

struct FixedTap {
    bins: Mutex<Vec<u8>>,
}

impl FixedTap {
    fn shared(bins: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bins: Mutex::new(bins),
        })
    }

    fn set(&self, value: u8) {
        let mut bins = self.bins.lock().unwrap();
        bins.iter_mut().for_each(|b| *b = value);
    }
}

impl FrequencyAnalyzer for FixedTap {
    fn frequency_bin_count(&self) -> usize {
        self.bins.lock().unwrap().len()
    }

    fn read_frequency_data(&self, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.extend_from_slice(&self.bins.lock().unwrap());
        Ok(())
    }
}

fn sized() -> (PulseVisualizer, RecordingSurface) {
    let mut visualizer = PulseVisualizer::new(VisualizerConfig::default());
    let mut surface = RecordingSurface::new();
    visualizer.resize(&mut surface, 320.0, 100.0, 1.0);
    (visualizer, surface)
}

fn opacity(style: &StrokeStyle) -> f32 {
    match &style.paint {
        Paint::Gradient(gradient) => gradient.stops[0].color.alpha,
        Paint::Solid(color) => color.alpha,
    }
}

#[test]
fn idle_pulse_moves_without_audio() {
    let (mut visualizer, mut surface) = sized();

    for now in [0.5, 16.0, 1_000.0, 987_654.0] {
        visualizer.render(now, &mut surface);
        let strokes = surface.current_strokes();
        assert_eq!(strokes.len(), 2, "center line plus one idle pulse");

        let ys: Vec<f32> = strokes[1].0.end_points().map(|p| p.y).collect();
        let min = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(max - min > 1.0, "idle pulse is flat at t={now}");
        assert!((opacity(strokes[1].1) - 0.3).abs() < 1e-6);
    }
    assert!(visualizer.history().is_empty());
}

#[test]
fn idle_pulse_spans_the_width() {
    let (visualizer, _surface) = sized();
    let points = visualizer.idle_points(250.0);
    assert_eq!(points.len(), 50);
    assert_eq!(points[0].x, 0.0);
    assert!((points[49].x - 320.0).abs() < 1e-3);
}

#[test]
fn downsamples_by_fixed_step() {
    let bins: Vec<u8> = (0..=255).collect();
    let frame = downsample(&bins, 32);
    assert_eq!(frame.len(), 32);
    assert_eq!(frame[0], 0);
    assert_eq!(frame[1], 8);
    assert_eq!(frame[31], 248);
}

#[test]
fn downsampling_short_spectra_pads_with_silence() {
    let frame = downsample(&[9, 9, 9], 32);
    assert_eq!(frame.len(), 32);
    assert_eq!(&frame[..3], &[9, 9, 9]);
    assert!(frame[3..].iter().all(|&b| b == 0));
}

#[test]
fn history_keeps_newest_first_within_capacity() {
    let (mut visualizer, _surface) = sized();
    let tap = FixedTap::shared(vec![0; 256]);
    visualizer.connect(tap.clone());

    for value in 0..120u8 {
        tap.set(value);
        assert!(visualizer.sample());
    }

    assert_eq!(visualizer.history().len(), 100);
    assert_eq!(visualizer.history()[0][0], 119);
    assert_eq!(visualizer.history()[99][0], 20);
    assert!(visualizer.history().iter().all(|frame| frame.len() == 32));
}

#[test]
fn renders_five_fading_frames_over_the_center_line() {
    let (mut visualizer, mut surface) = sized();
    visualizer.connect(FixedTap::shared(vec![128; 256]));
    for _ in 0..6 {
        visualizer.sample();
    }

    visualizer.render(40.0, &mut surface);
    let strokes = surface.current_strokes();
    assert_eq!(strokes.len(), 1 + 5);

    let (center, center_style) = strokes[0];
    assert!(center.end_points().all(|p| p.y == 50.0));
    assert!((opacity(center_style) - 0.1).abs() < 1e-6);

    let expected = [(0.2, 1.4), (0.4, 1.8), (0.6, 2.2), (0.8, 2.6), (1.0, 3.0)];
    for ((_, style), (alpha, width)) in strokes[1..].iter().zip(expected) {
        assert!((opacity(style) - alpha).abs() < 1e-5);
        assert!((style.width - width).abs() < 1e-5);
    }
}

#[test]
fn short_history_renders_what_it_has() {
    let (mut visualizer, mut surface) = sized();
    visualizer.connect(FixedTap::shared(vec![10; 256]));

    visualizer.render(0.0, &mut surface);
    assert_eq!(surface.current_strokes().len(), 2);
    visualizer.render(16.0, &mut surface);
    assert_eq!(surface.current_strokes().len(), 3);
}

#[test]
fn pulse_points_follow_the_waveform_formula() {
    let (visualizer, _surface) = sized();
    let frame = vec![255u8; 32];
    let now = 1_234.0;
    let points = visualizer.pulse_points(&frame, now);

    assert_eq!(points.len(), 32);
    for (i, point) in points.iter().enumerate() {
        let i = i as f32;
        let amplitude = 0.4 * 100.0;
        let pulse = (i * 0.5 + (now * 0.003) as f32).sin() * 5.0;
        let expected = 50.0 + amplitude * (i * 0.3).sin() + pulse;
        assert!((point.y - expected).abs() < 1e-3);
        assert!((point.x - i * 320.0 / 31.0).abs() < 1e-3);
    }
}

#[test]
fn glow_tracks_mean_magnitude() {
    let (mut visualizer, mut surface) = sized();
    let tap = FixedTap::shared(vec![255; 256]);
    visualizer.connect(tap.clone());

    visualizer.render(0.0, &mut surface);
    let loud = surface.current_strokes().last().unwrap().1.shadow.unwrap().blur;
    assert!((loud - 30.0).abs() < 1e-4);

    tap.set(0);
    visualizer.render(16.0, &mut surface);
    let quiet = surface.current_strokes().last().unwrap().1.shadow.unwrap().blur;
    assert!((quiet - 10.0).abs() < 1e-4);
}

#[test]
fn theme_changes_apply_on_the_next_frame() {
    let (mut visualizer, mut surface) = sized();
    visualizer.render(0.0, &mut surface);

    let mut theme = ColorTheme::default();
    theme.accent = Color::rgb(255, 0, 0);
    theme.primary = Color::rgb(0, 0, 255);
    visualizer.set_theme(theme);
    visualizer.render(16.0, &mut surface);

    let (_, style) = *surface.current_strokes().last().unwrap();
    let Paint::Gradient(gradient) = &style.paint else {
        panic!("idle pulse uses a gradient");
    };
    assert_eq!(gradient.stops[0].color.color, theme.accent);
    assert_eq!(gradient.stops[1].color.color, theme.primary);
    assert_eq!(gradient.stops[2].color.color, theme.accent);
}

#[test]
fn render_loop_reschedules_itself_while_shown() {
    let (mut visualizer, mut surface) = sized();
    let mut frames = FrameQueue::new();

    visualizer.show(&mut frames);
    visualizer.show(&mut frames);
    assert_eq!(frames.pending(), 1, "show schedules a single frame");

    for tick in 0..3 {
        let due = frames.take_due();
        assert_eq!(due.len(), 1);
        visualizer.on_frame(due[0], tick as f64 * 16.0, &mut surface, &mut frames);
    }
    assert_eq!(frames.pending(), 1);
    let clears = surface
        .commands()
        .iter()
        .filter(|c| **c == DrawCommand::Clear)
        .count();
    assert_eq!(clears, 3);
}

#[test]
fn hide_stops_rendering_and_clears() {
    let (mut visualizer, mut surface) = sized();
    let mut frames = FrameQueue::new();
    visualizer.show(&mut frames);

    visualizer.hide(&mut surface);
    assert_eq!(surface.commands(), &[DrawCommand::Clear]);

    let due = frames.take_due();
    visualizer.on_frame(due[0], 16.0, &mut surface, &mut frames);
    assert_eq!(frames.pending(), 0);
    assert_eq!(surface.commands().len(), 1);

    visualizer.show(&mut frames);
    assert_eq!(frames.pending(), 1);
}

#[test]
fn dispose_cancels_the_pending_frame() {
    let (mut visualizer, mut surface) = sized();
    let mut frames = FrameQueue::new();
    visualizer.show(&mut frames);

    visualizer.dispose(&mut surface, &mut frames);
    assert_eq!(frames.pending(), 0);
    assert!(!visualizer.is_active());
    assert_eq!(surface.commands().last(), Some(&DrawCommand::Clear));
}

#[test]
fn resize_honours_pixel_density_without_restarting() {
    let (mut visualizer, mut surface) = sized();
    let mut frames = FrameQueue::new();
    visualizer.show(&mut frames);

    visualizer.resize(&mut surface, 400.0, 120.0, 2.0);
    assert_eq!((surface.physical_width, surface.physical_height), (800, 240));
    assert_eq!(surface.scale, 2.0);
    assert_eq!(visualizer.dimensions(), (400.0, 120.0, 2.0));
    assert!(visualizer.is_active());
    assert_eq!(frames.pending(), 1);

    visualizer.resize(&mut surface, 400.0, 120.0, f32::NAN);
    assert_eq!(surface.scale, 1.0);
}

#[test]
fn pulse_keeps_moving_at_epoch_timestamps() {
    let (visualizer, _surface) = sized();
    let now = 1_792_272_814_954.0;
    let frame = vec![128u8; 32];

    let idle = visualizer.idle_points(now);
    let idle_later = visualizer.idle_points(now + 1_000.0);
    assert!(idle.iter().zip(&idle_later).any(|(a, b)| (a.y - b.y).abs() > 0.5));

    let pulse = visualizer.pulse_points(&frame, now);
    let pulse_later = visualizer.pulse_points(&frame, now + 500.0);
    assert!(pulse.iter().zip(&pulse_later).any(|(a, b)| (a.y - b.y).abs() > 0.5));
}

#[test]
fn wrapped_phase_matches_the_unwrapped_formula() {
    let (visualizer, _surface) = sized();
    let now = 86_400_123.0;
    let points = visualizer.idle_points(now);

    for (i, point) in points.iter().enumerate().take(5) {
        let i = i as f64;
        let expected = 50.0
            + (i * 0.2 + now * 0.002).sin() * 15.0
            + (i * 0.13 + now * 0.0013 + 1.0).sin() * 10.0;
        assert!((point.y as f64 - expected).abs() < 1e-2);
    }
}
