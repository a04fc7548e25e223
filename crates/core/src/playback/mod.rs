//! Playback engine: the single owner of the audio output, the current-track
//! pointer and the audio preload cache.

mod preload;

use std::{collections::HashSet, fmt};

use tokio::sync::mpsc;

use crate::{
    analysis::AnalyserSettings,
    assets::AudioHandle,
    audio::{AudioOutputDevice, AudioSource, DeviceEvent, DeviceMessage, SharedAnalyzer},
    cache::{Admission, PreloadCache},
    config::PlayerConfig,
    manifest::{Manifest, TrackDescriptor},
};

pub use preload::{
    spawn_preloader, PreloadEvent, PreloadReceiver, PreloadRequest, PreloadSender,
};

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Empty,
    Ready(usize),
    Playing(usize),
    Paused(usize),
}

/// Observable playback data, reset on every track change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
}

/// Notifications consumed by the UI binder and the visualizer.
#[derive(Clone)]
pub enum PlayerEvent {
    TrackChanged {
        index: usize,
        track: TrackDescriptor,
    },
    StatusChanged(PlaybackStatus),
    Progress {
        position: f64,
        duration: Option<f64>,
    },
    AnalyserConnected(SharedAnalyzer),
}

impl fmt::Debug for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::TrackChanged { index, track } => f
                .debug_struct("TrackChanged")
                .field("index", index)
                .field("title", &track.title)
                .finish(),
            PlayerEvent::StatusChanged(status) => {
                f.debug_tuple("StatusChanged").field(status).finish()
            }
            PlayerEvent::Progress { position, duration } => f
                .debug_struct("Progress")
                .field("position", position)
                .field("duration", duration)
                .finish(),
            PlayerEvent::AnalyserConnected(_) => f.write_str("AnalyserConnected"),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// Transport state machine over one persistent [`AudioOutputDevice`].
///
/// Operations never fail outward. Device and preload problems are logged and
/// leave the engine in a valid state (at worst `Ready` with nothing playable).
pub struct PlaybackEngine<D> {
    manifest: Manifest,
    device: D,
    audio_cache: PreloadCache<AudioHandle>,
    analyser_settings: AnalyserSettings,
    analyser: Option<SharedAnalyzer>,
    state: PlaybackState,
    status: PlaybackStatus,
    source_bound: bool,
    generation: u64,
    in_flight: HashSet<String>,
    preloader: Option<PreloadSender>,
    events: EventSender,
}

impl<D: AudioOutputDevice> PlaybackEngine<D> {
    pub fn new(manifest: Manifest, device: D, config: &PlayerConfig, events: EventSender) -> Self {
        Self {
            manifest,
            device,
            audio_cache: PreloadCache::new(config.audio_cache_capacity),
            analyser_settings: AnalyserSettings {
                fft_size: config.fft_size,
                smoothing: config.smoothing,
            },
            analyser: None,
            state: PlaybackState::default(),
            status: PlaybackStatus::Empty,
            source_bound: false,
            generation: 0,
            in_flight: HashSet::new(),
            preloader: None,
            events,
        }
    }

    /// Routes adjacent-track preloads to a worker from [`spawn_preloader`].
    pub fn with_preloader(mut self, preloader: PreloadSender) -> Self {
        self.preloader = Some(preloader);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn track_count(&self) -> usize {
        self.manifest.len()
    }

    pub fn current_track(&self) -> Option<&TrackDescriptor> {
        self.state
            .current_index
            .and_then(|index| self.manifest.get(index))
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Stops output and hands the device back.
    pub fn into_device(mut self) -> D {
        self.device.pause();
        self.device
    }

    pub fn audio_cache(&self) -> &PreloadCache<AudioHandle> {
        &self.audio_cache
    }

    pub fn analyser(&self) -> Option<&SharedAnalyzer> {
        self.analyser.as_ref()
    }

    pub fn has_playable_source(&self) -> bool {
        self.source_bound
    }

    /// Binds the first track without starting playback. No-op when the
    /// manifest is empty.
    pub async fn start(&mut self) {
        if self.manifest.is_empty() {
            tracing::info!("no tracks available, player stays empty");
            return;
        }
        self.load_track(0, false).await;
    }

    pub async fn load_track(&mut self, index: usize, autoplay: bool) {
        let Some(track) = self.manifest.get(index).cloned() else {
            tracing::debug!(index, count = self.manifest.len(), "ignoring out-of-range track");
            return;
        };

        self.device.pause();
        self.state = PlaybackState {
            current_index: Some(index),
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: None,
        };

        tracing::info!(index, id = track.id, title = %track.title, "loading track");
        self.emit(PlayerEvent::TrackChanged {
            index,
            track: track.clone(),
        });

        self.source_bound = match &track.audio {
            None => {
                self.device.clear_source();
                tracing::info!(index, "track has no audio, playback disabled");
                false
            }
            Some(url) => self.bind(url),
        };
        self.generation = self.device.generation();
        self.set_status(PlaybackStatus::Ready(index));
        self.emit_progress();

        self.preload_adjacent(index);

        if autoplay {
            self.play().await;
        }
    }

    fn bind(&mut self, url: &str) -> bool {
        let source = match self.audio_cache.get(url) {
            Some(handle) => AudioSource::Primed(handle.clone()),
            None => AudioSource::Url(url.to_string()),
        };
        let primed = source.is_primed();

        match self.device.bind_source(source) {
            Ok(()) => {
                tracing::debug!(url, primed, "audio source bound");
                self.ensure_analyser();
                true
            }
            Err(err) => {
                tracing::warn!(url, %err, "failed to bind audio source");
                false
            }
        }
    }

    fn ensure_analyser(&mut self) {
        if self.analyser.is_some() {
            return;
        }
        match self.device.connect_analyser(self.analyser_settings) {
            Ok(tap) => {
                tracing::info!(
                    fft_size = self.analyser_settings.fft_size,
                    "analyser tap connected"
                );
                self.analyser = Some(tap.clone());
                self.emit(PlayerEvent::AnalyserConnected(tap));
            }
            Err(err) => tracing::warn!(%err, "could not connect analyser tap"),
        }
    }

    /// Starts output once the audio graph is running. No-op without a bound
    /// source.
    pub async fn play(&mut self) {
        let Some(index) = self.state.current_index else {
            return;
        };
        if !self.source_bound {
            tracing::debug!(index, "play ignored, nothing playable bound");
            return;
        }

        if let Err(err) = self.device.resume().await {
            tracing::warn!(%err, "audio graph did not resume");
            return;
        }
        if let Err(err) = self.device.play() {
            tracing::warn!(%err, "audio output refused to play");
            return;
        }

        self.state.is_playing = true;
        self.set_status(PlaybackStatus::Playing(index));
    }

    pub fn pause(&mut self) {
        self.device.pause();
        self.state.is_playing = false;

        let status = match self.state.current_index {
            None => PlaybackStatus::Empty,
            Some(index) if self.source_bound => PlaybackStatus::Paused(index),
            Some(index) => PlaybackStatus::Ready(index),
        };
        self.set_status(status);
    }

    pub async fn toggle_play_pause(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play().await;
        }
    }

    pub async fn next_track(&mut self) {
        if let Some(index) = self.adjacent(1) {
            let autoplay = self.state.is_playing;
            self.load_track(index, autoplay).await;
        }
    }

    pub async fn previous_track(&mut self) {
        if let Some(index) = self.adjacent(-1) {
            let autoplay = self.state.is_playing;
            self.load_track(index, autoplay).await;
        }
    }

    /// Jumps to `percent` (clamped to `[0, 100]`) of the known duration.
    pub fn seek(&mut self, percent: f64) {
        let duration = self.device.duration().or(self.state.duration_seconds);
        let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            tracing::debug!(percent, "seek ignored, duration unknown");
            return;
        };

        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let position = percent / 100.0 * duration;
        self.device.seek(position);
        self.state.position_seconds = position;
        self.emit_progress();
    }

    /// Applies a message from the device channel. Messages from an earlier
    /// binding are dropped so a stale end or position never reaches the
    /// current track.
    pub async fn handle_device_message(&mut self, message: DeviceMessage) {
        if message.generation != self.generation {
            tracing::debug!(
                event = ?message.event,
                generation = message.generation,
                current = self.generation,
                "dropping device event from a previous source"
            );
            return;
        }
        self.handle_device_event(message.event).await;
    }

    /// Applies an event known to concern the current binding.
    pub async fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::DurationChanged(duration) if duration.is_finite() && duration > 0.0 => {
                self.state.duration_seconds = Some(duration);
                self.emit_progress();
            }
            DeviceEvent::DurationChanged(duration) => {
                tracing::debug!(duration, "ignoring unusable duration");
            }
            DeviceEvent::TimeUpdate(position) => {
                self.state.position_seconds = position;
                self.emit_progress();
            }
            DeviceEvent::Ended => {
                if !self.source_bound {
                    return;
                }
                tracing::info!(index = ?self.state.current_index, "track ended, advancing");
                self.next_track().await;
            }
            DeviceEvent::Error(message) => {
                if self.current_track().is_some_and(|track| !track.has_audio()) {
                    tracing::info!(%message, "device error for track without audio");
                } else {
                    tracing::warn!(%message, "audio device error");
                }
            }
        }
    }

    pub fn handle_preload_event(&mut self, event: PreloadEvent) {
        match event {
            PreloadEvent::Primed { url, handle } => {
                self.in_flight.remove(&url);
                match self.audio_cache.insert(url.clone(), handle) {
                    Admission::Inserted { evicted } => {
                        tracing::debug!(%url, ?evicted, "preloaded audio cached");
                    }
                    Admission::AlreadyPresent => {
                        tracing::debug!(%url, "preload finished for a cached url");
                    }
                    Admission::Disabled => {}
                }
            }
            PreloadEvent::Failed { url, error } => {
                self.in_flight.remove(&url);
                tracing::warn!(%url, %error, "preload failed");
            }
        }
    }

    fn adjacent(&self, step: isize) -> Option<usize> {
        let count = self.manifest.len();
        if count == 0 {
            return None;
        }
        let current = self.state.current_index.unwrap_or(0) as isize;
        Some((current + step).rem_euclid(count as isize) as usize)
    }

    fn preload_adjacent(&mut self, index: usize) {
        let Some(preloader) = &self.preloader else {
            return;
        };

        let count = self.manifest.len();
        let next = (index + 1) % count;
        let previous = (index + count - 1) % count;

        for candidate in [next, previous] {
            if candidate == index || (candidate == previous && previous == next) {
                continue;
            }
            let Some(url) = self.manifest.get(candidate).and_then(|t| t.audio.as_ref()) else {
                continue;
            };
            if self.audio_cache.contains(url) || self.in_flight.contains(url) {
                continue;
            }

            if preloader.send(PreloadRequest { url: url.clone() }).is_err() {
                tracing::warn!("preload worker is gone, skipping preloads");
                return;
            }
            tracing::debug!(%url, index = candidate, "preload requested");
            self.in_flight.insert(url.clone());
        }
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        self.status = status;
        self.emit(PlayerEvent::StatusChanged(status));
    }

    fn emit_progress(&self) {
        self.emit(PlayerEvent::Progress {
            position: self.state.position_seconds,
            duration: self.state.duration_seconds,
        });
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }
}
