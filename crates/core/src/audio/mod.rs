//! Capabilities the host media pipeline provides to the player.
//!
//! The engine only talks to [`AudioOutputDevice`]; the visualizer only talks
//! to [`FrequencyAnalyzer`]. Any binding satisfying these contracts can be
//! swapped in. [`SimulatedOutput`] is the headless binding used by the
//! command line session and the tests.

mod simulated;

use std::{future::Future, sync::Arc};

use tokio::sync::mpsc;

use crate::{analysis::AnalyserSettings, assets::AudioHandle, Result};

pub use simulated::SimulatedOutput;

/// Read-only tap into the output signal, lent to the visualizer.
pub type SharedAnalyzer = Arc<dyn FrequencyAnalyzer>;

/// Byte-scaled frequency-domain view of the audio currently playing.
pub trait FrequencyAnalyzer: Send + Sync {
    fn frequency_bin_count(&self) -> usize;

    /// Replaces `out` with the latest spectrum, one byte per bin.
    fn read_frequency_data(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// What the output should play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Not primed yet; the device fetches it itself.
    Url(String),
    /// Already loaded by the preloader.
    Primed(AudioHandle),
}

impl AudioSource {
    pub fn url(&self) -> &str {
        match self {
            AudioSource::Url(url) => url,
            AudioSource::Primed(handle) => &handle.url,
        }
    }

    pub fn is_primed(&self) -> bool {
        matches!(self, AudioSource::Primed(_))
    }
}

/// Callbacks raised by the output, delivered as messages.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Metadata for the bound source is available.
    DurationChanged(f64),
    /// Playback position moved.
    TimeUpdate(f64),
    /// The bound source played to its natural end.
    Ended,
    /// Device-level failure for the bound source.
    Error(String),
}

/// A [`DeviceEvent`] stamped with the source binding that produced it.
///
/// The generation changes on every `bind_source` and `clear_source`, so
/// events queued for a previous track can be recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMessage {
    pub generation: u64,
    pub event: DeviceEvent,
}

/// The single persistent audio output owned by the playback engine.
pub trait AudioOutputDevice {
    /// Registers the channel that receives [`DeviceMessage`]s.
    fn subscribe(&mut self, events: mpsc::UnboundedSender<DeviceMessage>);

    /// Identity of the current binding. Bumped by `bind_source` and
    /// `clear_source`; every emitted message carries the value current at
    /// emission.
    fn generation(&self) -> u64;

    /// Replaces the current source. Playback stays halted.
    fn bind_source(&mut self, source: AudioSource) -> Result<()>;

    /// Drops the current source, leaving the device silent.
    fn clear_source(&mut self);

    /// Moves the processing graph from suspended to running. Output is only
    /// audible once this has completed.
    fn resume(&mut self) -> impl Future<Output = Result<()>>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    fn current_time(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    /// Connects the analysis tap. Most hosts allow this once per output
    /// lifetime, so callers keep the returned handle across source changes.
    fn connect_analyser(&mut self, settings: AnalyserSettings) -> Result<SharedAnalyzer>;
}
