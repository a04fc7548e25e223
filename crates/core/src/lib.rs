//! Core library for the pulse music player.
//!
//! A playlist manifest drives a [`PlaybackEngine`] that owns one persistent
//! audio output, preloads neighbouring tracks in the background and lends an
//! analyser tap to the [`PulseVisualizer`]. The [`session`] module wires
//! these together behind a startup gate; hosts supply the output device, the
//! drawing surface and the view.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod playback;
pub mod render;
pub mod session;
pub mod timeline;
pub mod ui;
pub mod visualizer;

pub use analysis::{AnalyserSettings, AnalysisHandle, SpectrumAnalyser};
pub use assets::{AudioHandle, FsLoader, ImageHandle, ResourceLoader, StaticLoader};
pub use audio::{
    AudioOutputDevice, DeviceEvent, DeviceMessage, FrequencyAnalyzer, SimulatedOutput,
};
pub use cache::PreloadCache;
pub use config::{AppConfig, PlayerConfig, StartupConfig, VisualizerConfig};
pub use error::{PlayerError, Result};
pub use manifest::{ColorTheme, Manifest, TrackDescriptor};
pub use playback::{PlaybackEngine, PlaybackState, PlaybackStatus, PlayerEvent};
pub use session::{load_library, Library, Session};
pub use ui::{Command, UiBinder, View};
pub use visualizer::PulseVisualizer;
