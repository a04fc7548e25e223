//! Application wiring: the startup gate followed by a running player whose
//! engine, preload worker, UI binder and visualizer talk over channels.

mod startup;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    assets::{ImageHandle, ResourceLoader},
    audio::{AudioOutputDevice, DeviceMessage},
    cache::PreloadCache,
    config::AppConfig,
    playback::{spawn_preloader, EventReceiver, PlaybackEngine, PlayerEvent, PreloadReceiver},
    render::DrawSurface,
    timeline::FrameQueue,
    ui::{dispatch, key_binding, Command, ProgressDrag, TrackBounds, UiBinder, View},
    visualizer::PulseVisualizer,
};

pub use startup::{load_library, Library, StartupProgress};

/// A player that has passed the startup gate.
///
/// The session is the only place where the three event streams meet. Call
/// [`Session::pump`] after anything that may have produced events; commands
/// and key presses do so on their own.
pub struct Session<D, S, V> {
    engine: PlaybackEngine<D>,
    visualizer: PulseVisualizer,
    binder: UiBinder,
    view: V,
    surface: S,
    frames: FrameQueue,
    drag: ProgressDrag,
    covers: PreloadCache<ImageHandle>,
    player_events: EventReceiver,
    device_events: mpsc::UnboundedReceiver<DeviceMessage>,
    preload_events: PreloadReceiver,
}

impl<D, S, V> Session<D, S, V>
where
    D: AudioOutputDevice,
    S: DrawSurface,
    V: View,
{
    /// Builds the engine around `device`, binds the first track and starts
    /// the render loop. Taking a [`Library`] keeps the player from appearing
    /// before the gate has finished.
    pub async fn start<L: ResourceLoader>(
        library: Library,
        mut device: D,
        loader: Arc<L>,
        config: &AppConfig,
        surface: S,
        view: V,
    ) -> Self {
        let (device_tx, device_events) = mpsc::unbounded_channel();
        device.subscribe(device_tx);

        let (player_tx, player_events) = mpsc::unbounded_channel();
        let (preload_tx, preload_events) = spawn_preloader(loader);
        let engine = PlaybackEngine::new(library.manifest, device, &config.player, player_tx)
            .with_preloader(preload_tx);

        let mut session = Self {
            engine,
            visualizer: PulseVisualizer::new(config.visualizer.clone()),
            binder: UiBinder::new(),
            view,
            surface,
            frames: FrameQueue::new(),
            drag: ProgressDrag::new(TrackBounds {
                left: 0.0,
                width: 0.0,
            }),
            covers: library.covers,
            player_events,
            device_events,
            preload_events,
        };

        session.engine.start().await;
        session.pump().await;
        session.visualizer.show(&mut session.frames);
        tracing::info!(tracks = session.engine.track_count(), "player shown");
        session
    }

    pub fn engine(&self) -> &PlaybackEngine<D> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine<D> {
        &mut self.engine
    }

    pub fn visualizer(&self) -> &PulseVisualizer {
        &self.visualizer
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Cover bytes decoded during startup, if that image loaded.
    pub fn cover(&self, url: &str) -> Option<&ImageHandle> {
        self.covers.get(url)
    }

    pub async fn command(&mut self, command: Command) {
        dispatch(&mut self.engine, command).await;
        self.pump().await;
    }

    /// Handles a key press. Returns whether the host should suppress the
    /// key's default action.
    pub async fn key(&mut self, key: &str) -> bool {
        let Some(binding) = key_binding(key) else {
            return false;
        };
        self.command(binding.command).await;
        binding.prevent_default
    }

    /// Places the progress track in pointer coordinates.
    pub fn set_progress_bounds(&mut self, bounds: TrackBounds) {
        self.drag.set_bounds(bounds);
    }

    /// Press on the progress track: seeks and starts a drag.
    pub async fn pointer_down(&mut self, x: f32) {
        let command = self.drag.pointer_down(x);
        self.command(command).await;
    }

    /// Seeks while a drag is in progress, otherwise ignored.
    pub async fn pointer_move(&mut self, x: f32) {
        if let Some(command) = self.drag.pointer_move(x) {
            self.command(command).await;
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag.pointer_up();
    }

    /// Drains every pending event until all three streams are quiet.
    pub async fn pump(&mut self) {
        loop {
            let mut progressed = false;

            while let Ok(message) = self.device_events.try_recv() {
                progressed = true;
                self.engine.handle_device_message(message).await;
            }
            while let Ok(event) = self.preload_events.try_recv() {
                progressed = true;
                self.engine.handle_preload_event(event);
            }
            while let Ok(event) = self.player_events.try_recv() {
                progressed = true;
                self.present(&event);
            }

            if !progressed {
                break;
            }
        }
    }

    /// Waits for the preload worker to report once, then pumps. Returns
    /// `false` when the worker has shut down.
    pub async fn settle_preload(&mut self) -> bool {
        match self.preload_events.recv().await {
            Some(event) => {
                self.engine.handle_preload_event(event);
                self.pump().await;
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32, pixel_ratio: f32) {
        self.visualizer
            .resize(&mut self.surface, width, height, pixel_ratio);
    }

    /// Runs every animation frame that is due.
    pub fn tick(&mut self, now_ms: f64) {
        for token in self.frames.take_due() {
            self.visualizer
                .on_frame(token, now_ms, &mut self.surface, &mut self.frames);
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            self.visualizer.show(&mut self.frames);
        } else {
            self.visualizer.hide(&mut self.surface);
        }
    }

    /// Stops the render loop and releases the surface.
    pub fn shutdown(mut self) -> (D, S, V) {
        self.visualizer.dispose(&mut self.surface, &mut self.frames);
        tracing::info!("session closed");
        let Session {
            engine,
            surface,
            view,
            ..
        } = self;
        (engine.into_device(), surface, view)
    }

    fn present(&mut self, event: &PlayerEvent) {
        self.binder.apply(&mut self.view, event);
        match event {
            PlayerEvent::TrackChanged { track, .. } => {
                self.visualizer.set_theme(track.colors);
            }
            PlayerEvent::AnalyserConnected(tap) => {
                self.visualizer.connect(Arc::clone(tap));
            }
            PlayerEvent::StatusChanged(_) | PlayerEvent::Progress { .. } => {}
        }
    }
}
