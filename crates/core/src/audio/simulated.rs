use std::{
    collections::{HashMap, HashSet},
    f32::consts::TAU,
    sync::Arc,
};

use tokio::sync::mpsc;

use super::{AudioOutputDevice, AudioSource, DeviceEvent, DeviceMessage, SharedAnalyzer};
use crate::{
    analysis::{AnalyserSettings, AnalysisHandle},
    PlayerError, Result,
};

const SAMPLE_RATE: f32 = 44_100.0;
const MAX_SYNTH_BLOCK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Suspended,
    Running,
}

/// Headless output that keeps time without producing sound.
///
/// Time only moves through [`SimulatedOutput::advance`]. While playing, each
/// advance feeds a synthesized chord into the analyser tap so the visualizer
/// has a live spectrum to sample.
#[derive(Debug)]
pub struct SimulatedOutput {
    source: Option<AudioSource>,
    durations: HashMap<String, f64>,
    default_duration: Option<f64>,
    failing: HashSet<String>,
    graph: GraphState,
    paused: bool,
    position: f64,
    duration: Option<f64>,
    analyser: Option<AnalysisHandle>,
    events: Option<mpsc::UnboundedSender<DeviceMessage>>,
    generation: u64,
    binds: Vec<AudioSource>,
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedOutput {
    pub fn new() -> Self {
        Self {
            source: None,
            durations: HashMap::new(),
            default_duration: Some(180.0),
            failing: HashSet::new(),
            graph: GraphState::Suspended,
            paused: true,
            position: 0.0,
            duration: None,
            analyser: None,
            events: None,
            generation: 0,
            binds: Vec::new(),
        }
    }

    /// Reports `seconds` as the duration of `url` once bound.
    pub fn with_duration(mut self, url: impl Into<String>, seconds: f64) -> Self {
        self.durations.insert(url.into(), seconds);
        self
    }

    /// Duration for sources without an explicit entry. `None` models a
    /// source whose metadata never arrives.
    pub fn with_default_duration(mut self, seconds: Option<f64>) -> Self {
        self.default_duration = seconds;
        self
    }

    /// Makes binding `url` fail with a device error.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    /// Every source bound so far, oldest first.
    pub fn binds(&self) -> &[AudioSource] {
        &self.binds
    }

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.graph == GraphState::Running
    }

    /// Moves the clock forward. Emits `TimeUpdate` while playing and `Ended`
    /// when the position reaches the duration.
    pub fn advance(&mut self, seconds: f64) {
        if self.paused || self.source.is_none() || seconds <= 0.0 {
            return;
        }

        let start = self.position;
        self.position += seconds;
        self.feed_analyser(start, seconds);

        match self.duration {
            Some(duration) if self.position >= duration => {
                self.position = duration;
                self.paused = true;
                self.emit(DeviceEvent::TimeUpdate(self.position));
                self.emit(DeviceEvent::Ended);
            }
            _ => self.emit(DeviceEvent::TimeUpdate(self.position)),
        }
    }

    fn emit(&self, event: DeviceEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(DeviceMessage {
                generation: self.generation,
                event,
            });
        }
    }

    fn feed_analyser(&self, start: f64, seconds: f64) {
        let Some(analyser) = &self.analyser else {
            return;
        };

        let count = ((seconds as f32 * SAMPLE_RATE) as usize).clamp(1, MAX_SYNTH_BLOCK);
        let offset = start as f32;
        let swell = 0.5 + 0.5 * (offset * 0.7).sin().abs();
        let block: Vec<f32> = (0..count)
            .map(|n| {
                let t = offset + n as f32 / SAMPLE_RATE;
                swell
                    * (0.30 * (TAU * 110.0 * t).sin()
                        + 0.15 * (TAU * 440.0 * t).sin()
                        + 0.05 * (TAU * 1760.0 * t).sin())
            })
            .collect();

        if let Err(err) = analyser.push_samples(&block) {
            tracing::warn!(%err, "simulated output could not feed the analyser");
        }
    }
}

impl AudioOutputDevice for SimulatedOutput {
    fn subscribe(&mut self, events: mpsc::UnboundedSender<DeviceMessage>) {
        self.events = Some(events);
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn bind_source(&mut self, source: AudioSource) -> Result<()> {
        self.generation += 1;
        self.paused = true;
        self.position = 0.0;
        self.duration = None;

        if self.failing.contains(source.url()) {
            self.source = None;
            let message = format!("cannot decode `{}`", source.url());
            self.emit(DeviceEvent::Error(message.clone()));
            return Err(PlayerError::AudioDevice(message));
        }

        self.duration = self
            .durations
            .get(source.url())
            .copied()
            .or(self.default_duration);
        self.binds.push(source.clone());
        self.source = Some(source);

        if let Some(analyser) = &self.analyser {
            if let Err(err) = analyser.reset() {
                tracing::warn!(%err, "simulated output could not reset the analyser");
            }
        }
        if let Some(duration) = self.duration {
            self.emit(DeviceEvent::DurationChanged(duration));
        }
        Ok(())
    }

    fn clear_source(&mut self) {
        self.generation += 1;
        self.source = None;
        self.paused = true;
        self.position = 0.0;
        self.duration = None;
    }

    async fn resume(&mut self) -> Result<()> {
        if self.graph == GraphState::Suspended {
            tokio::task::yield_now().await;
            self.graph = GraphState::Running;
            tracing::debug!("simulated audio graph resumed");
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(PlayerError::AudioDevice("no source bound".into()));
        }
        if self.graph != GraphState::Running {
            return Err(PlayerError::AudioDevice("audio graph is suspended".into()));
        }
        if let Some(duration) = self.duration {
            if self.position >= duration {
                self.position = 0.0;
            }
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn seek(&mut self, seconds: f64) {
        let upper = self.duration.unwrap_or(f64::MAX);
        self.position = seconds.clamp(0.0, upper);
        self.emit(DeviceEvent::TimeUpdate(self.position));
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn connect_analyser(&mut self, settings: AnalyserSettings) -> Result<SharedAnalyzer> {
        if self.analyser.is_some() {
            return Err(PlayerError::AudioDevice(
                "output already has an analyser connected".into(),
            ));
        }
        let handle = AnalysisHandle::new(settings)?;
        self.analyser = Some(handle.clone());
        Ok(Arc::new(handle))
    }
}
