//! Glue between input, the playback engine and the presentation slots.

use std::collections::HashMap;

use crate::{
    audio::AudioOutputDevice,
    manifest::TrackDescriptor,
    playback::{PlaybackEngine, PlaybackStatus, PlayerEvent},
};

/// Cover shown when a track has no image.
pub const PLACEHOLDER_COVER: &str = "placeholder.svg";

/// Transport requests issued by user input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    /// Percent of the track, clamped to `[0, 100]` by the engine.
    Seek(f64),
}

pub async fn dispatch<D: AudioOutputDevice>(engine: &mut PlaybackEngine<D>, command: Command) {
    tracing::debug!(?command, "dispatching command");
    match command {
        Command::Play => engine.play().await,
        Command::Pause => engine.pause(),
        Command::TogglePlayPause => engine.toggle_play_pause().await,
        Command::Next => engine.next_track().await,
        Command::Previous => engine.previous_track().await,
        Command::Seek(percent) => engine.seek(percent),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyBinding {
    pub command: Command,
    /// Whether the host's default action for the key must be suppressed.
    pub prevent_default: bool,
}

/// Maps a key name (as reported by the host) to a transport command.
pub fn key_binding(key: &str) -> Option<KeyBinding> {
    let (command, prevent_default) = match key {
        "ArrowRight" => (Command::Next, false),
        "ArrowLeft" => (Command::Previous, false),
        " " | "Space" | "Spacebar" => (Command::TogglePlayPause, true),
        _ => return None,
    };
    Some(KeyBinding {
        command,
        prevent_default,
    })
}

/// Horizontal extent of the progress track in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBounds {
    pub left: f32,
    pub width: f32,
}

impl TrackBounds {
    /// Linear position of `x` within the track as a percent in `[0, 100]`.
    pub fn percent_at(&self, x: f32) -> f64 {
        if self.width <= 0.0 || !x.is_finite() {
            return 0.0;
        }
        let offset = x as f64 - self.left as f64;
        (offset * 100.0 / self.width as f64).clamp(0.0, 100.0)
    }
}

/// Press-drag-release seeking on the progress track, for mouse and touch.
#[derive(Debug, Clone)]
pub struct ProgressDrag {
    bounds: TrackBounds,
    dragging: bool,
}

impl ProgressDrag {
    pub fn new(bounds: TrackBounds) -> Self {
        Self {
            bounds,
            dragging: false,
        }
    }

    pub fn set_bounds(&mut self, bounds: TrackBounds) {
        self.bounds = bounds;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn pointer_down(&mut self, x: f32) -> Command {
        self.dragging = true;
        Command::Seek(self.bounds.percent_at(x))
    }

    pub fn pointer_move(&mut self, x: f32) -> Option<Command> {
        self.dragging
            .then(|| Command::Seek(self.bounds.percent_at(x)))
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }
}

/// Stable identifiers of the presentation regions the binder writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    AlbumArt,
    Title,
    Artist,
    ProgressFill,
    CurrentTime,
    Duration,
    PlayPauseGlyph,
    RecordIndicator,
    Visualizer,
}

/// Presentation layer as seen by the binder.
pub trait View {
    fn set_text(&mut self, slot: SlotId, text: &str);
    fn set_image(&mut self, slot: SlotId, source: &str);
    /// Fill level in percent.
    fn set_fill(&mut self, slot: SlotId, percent: f64);
    /// On/off state: playing glyph, spinning record.
    fn set_flag(&mut self, slot: SlotId, on: bool);
    fn set_style_variable(&mut self, name: &str, value: &str);
}

/// Renders engine notifications into a [`View`].
#[derive(Debug, Default)]
pub struct UiBinder {
    track: Option<TrackDescriptor>,
}

impl UiBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<V: View>(&mut self, view: &mut V, event: &PlayerEvent) {
        match event {
            PlayerEvent::TrackChanged { track, .. } => {
                view.set_image(
                    SlotId::AlbumArt,
                    track.image.as_deref().unwrap_or(PLACEHOLDER_COVER),
                );
                view.set_text(SlotId::Title, &track.title);
                view.set_text(SlotId::Artist, &track.artist);
                for (name, value) in track.colors.style_variables() {
                    view.set_style_variable(name, &value);
                }
                view.set_fill(SlotId::ProgressFill, 0.0);
                view.set_text(SlotId::CurrentTime, &format_time(0.0));
                view.set_text(SlotId::Duration, &label_for(track));
                self.track = Some(track.clone());
            }
            PlayerEvent::StatusChanged(status) => {
                let playing = matches!(status, PlaybackStatus::Playing(_));
                view.set_flag(SlotId::PlayPauseGlyph, playing);
                view.set_flag(SlotId::RecordIndicator, playing);
            }
            PlayerEvent::Progress { position, duration } => {
                view.set_text(SlotId::CurrentTime, &format_time(*position));
                match duration.filter(|d| d.is_finite() && *d > 0.0) {
                    Some(duration) => {
                        let percent = (position / duration * 100.0).clamp(0.0, 100.0);
                        view.set_fill(SlotId::ProgressFill, percent);
                        view.set_text(SlotId::Duration, &format_time(duration));
                    }
                    None => {
                        view.set_fill(SlotId::ProgressFill, 0.0);
                        if let Some(track) = &self.track {
                            view.set_text(SlotId::Duration, &label_for(track));
                        }
                    }
                }
            }
            PlayerEvent::AnalyserConnected(_) => {}
        }
    }
}

fn label_for(track: &TrackDescriptor) -> String {
    match track.duration_hint() {
        Some(seconds) => format_time(seconds),
        None if !track.duration_label.is_empty() => track.duration_label.clone(),
        None => format_time(0.0),
    }
}

/// `M:SS`, minutes unbounded. Negative or non-finite input reads as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Value last written into a slot of a [`RecordingView`].
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Text(String),
    Image(String),
    Fill(f64),
    Flag(bool),
}

/// In-memory [`View`] that remembers the latest value per slot.
#[derive(Debug, Default, Clone)]
pub struct RecordingView {
    slots: HashMap<SlotId, SlotValue>,
    variables: HashMap<String, String>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SlotValue> {
        self.slots.get(&slot)
    }

    pub fn text(&self, slot: SlotId) -> Option<&str> {
        match self.slots.get(&slot) {
            Some(SlotValue::Text(text)) | Some(SlotValue::Image(text)) => Some(text),
            _ => None,
        }
    }

    pub fn flag(&self, slot: SlotId) -> Option<bool> {
        match self.slots.get(&slot) {
            Some(SlotValue::Flag(on)) => Some(*on),
            _ => None,
        }
    }

    pub fn fill(&self, slot: SlotId) -> Option<f64> {
        match self.slots.get(&slot) {
            Some(SlotValue::Fill(percent)) => Some(*percent),
            _ => None,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

impl View for RecordingView {
    fn set_text(&mut self, slot: SlotId, text: &str) {
        self.slots.insert(slot, SlotValue::Text(text.to_string()));
    }

    fn set_image(&mut self, slot: SlotId, source: &str) {
        self.slots.insert(slot, SlotValue::Image(source.to_string()));
    }

    fn set_fill(&mut self, slot: SlotId, percent: f64) {
        self.slots.insert(slot, SlotValue::Fill(percent));
    }

    fn set_flag(&mut self, slot: SlotId, on: bool) {
        self.slots.insert(slot, SlotValue::Flag(on));
    }

    fn set_style_variable(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ColorTheme;

    fn track(image: Option<&str>) -> TrackDescriptor {
        TrackDescriptor {
            id: 1,
            title: "A".into(),
            artist: "X".into(),
            album: String::new(),
            duration_label: "3:05".into(),
            image: image.map(str::to_string),
            audio: Some("a.mp3".into()),
            colors: ColorTheme::default(),
        }
    }

    #[test]
    fn keyboard_shortcuts() {
        assert_eq!(key_binding("ArrowRight").unwrap().command, Command::Next);
        assert_eq!(key_binding("ArrowLeft").unwrap().command, Command::Previous);

        let space = key_binding(" ").unwrap();
        assert_eq!(space.command, Command::TogglePlayPause);
        assert!(space.prevent_default);
        assert!(!key_binding("ArrowRight").unwrap().prevent_default);
        assert!(key_binding("Enter").is_none());
    }

    #[test]
    fn pointer_position_maps_to_clamped_percent() {
        let bounds = TrackBounds {
            left: 100.0,
            width: 200.0,
        };
        assert_eq!(bounds.percent_at(200.0), 50.0);
        assert_eq!(bounds.percent_at(50.0), 0.0);
        assert_eq!(bounds.percent_at(400.0), 100.0);

        let degenerate = TrackBounds {
            left: 0.0,
            width: 0.0,
        };
        assert_eq!(degenerate.percent_at(10.0), 0.0);
    }

    #[test]
    fn drag_only_seeks_while_pressed() {
        let mut drag = ProgressDrag::new(TrackBounds {
            left: 0.0,
            width: 100.0,
        });

        assert_eq!(drag.pointer_move(30.0), None);
        assert_eq!(drag.pointer_down(10.0), Command::Seek(10.0));
        assert_eq!(drag.pointer_move(75.0), Some(Command::Seek(75.0)));
        assert_eq!(drag.pointer_move(150.0), Some(Command::Seek(100.0)));
        drag.pointer_up();
        assert!(!drag.is_dragging());
        assert_eq!(drag.pointer_move(20.0), None);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3_600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn track_change_fills_metadata_slots() {
        let mut view = RecordingView::new();
        let mut binder = UiBinder::new();
        binder.apply(
            &mut view,
            &PlayerEvent::TrackChanged {
                index: 0,
                track: track(None),
            },
        );

        assert_eq!(view.text(SlotId::Title), Some("A"));
        assert_eq!(view.text(SlotId::Artist), Some("X"));
        assert_eq!(view.text(SlotId::AlbumArt), Some(PLACEHOLDER_COVER));
        assert_eq!(view.text(SlotId::Duration), Some("3:05"));
        assert_eq!(view.variable("--color-accent"), Some("#1ed760"));
    }

    #[test]
    fn progress_and_status_update_slots() {
        let mut view = RecordingView::new();
        let mut binder = UiBinder::new();
        binder.apply(
            &mut view,
            &PlayerEvent::TrackChanged {
                index: 0,
                track: track(Some("covers/a.webp")),
            },
        );
        binder.apply(
            &mut view,
            &PlayerEvent::Progress {
                position: 30.0,
                duration: Some(120.0),
            },
        );
        binder.apply(&mut view, &PlayerEvent::StatusChanged(PlaybackStatus::Playing(0)));

        assert_eq!(view.text(SlotId::AlbumArt), Some("covers/a.webp"));
        assert_eq!(view.fill(SlotId::ProgressFill), Some(25.0));
        assert_eq!(view.text(SlotId::CurrentTime), Some("0:30"));
        assert_eq!(view.text(SlotId::Duration), Some("2:00"));
        assert_eq!(view.flag(SlotId::PlayPauseGlyph), Some(true));
        assert_eq!(view.flag(SlotId::RecordIndicator), Some(true));

        binder.apply(&mut view, &PlayerEvent::StatusChanged(PlaybackStatus::Paused(0)));
        assert_eq!(view.flag(SlotId::RecordIndicator), Some(false));
    }
}
