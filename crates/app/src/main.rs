use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use pulse_player_core::{
    load_library,
    render::RecordingSurface,
    session::StartupProgress,
    timeline::{Clock, ManualClock, SystemClock},
    ui::{RecordingView, SlotId, TrackBounds},
    AppConfig, Command, FsLoader, PlayerError, Session, SimulatedOutput,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> pulse_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { manifest } => run_inspect(&manifest, &config).await,
        Commands::Simulate {
            manifest,
            steps,
            step_ms,
            wall_clock,
        } => run_simulate(&manifest, &config, &steps, step_ms, wall_clock).await,
    }
}

async fn run_inspect(manifest: &Path, config: &AppConfig) -> pulse_player_core::Result<()> {
    let (loader, url) = loader_for(manifest)?;
    let library = load_library(&loader, &url, config, log_progress).await;

    let tracks: Vec<_> = library
        .manifest
        .tracks()
        .iter()
        .map(|track| {
            json!({
                "id": track.id,
                "title": track.title,
                "artist": track.artist,
                "duration": track.duration_label,
                "playable": track.has_audio(),
                "cover_loaded": track
                    .image
                    .as_deref()
                    .is_some_and(|image| library.covers.contains(image)),
            })
        })
        .collect();

    let report = json!({
        "tracks": tracks,
        "covers_loaded": library.covers.len(),
        "covers_failed": library.failed_covers,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_simulate(
    manifest: &Path,
    config: &AppConfig,
    steps: &[Step],
    step_ms: f64,
    wall_clock: bool,
) -> pulse_player_core::Result<()> {
    let (loader, url) = loader_for(manifest)?;
    let loader = Arc::new(loader);
    let library = load_library(loader.as_ref(), &url, config, log_progress).await;

    let device = SimulatedOutput::new();
    let mut session = Session::start(
        library,
        device,
        loader,
        config,
        RecordingSurface::new(),
        RecordingView::new(),
    )
    .await;
    session.resize(800.0, 200.0, 1.0);
    session.set_progress_bounds(TrackBounds {
        left: 0.0,
        width: 800.0,
    });

    let simulated = ManualClock::at(0.0);
    let clock: &dyn Clock = if wall_clock { &SystemClock } else { &simulated };
    let frame_ms = step_ms.max(1.0);
    let mut frames = 0usize;

    for step in steps {
        tracing::info!(?step, "simulation step");
        match *step {
            Step::Command(command) => session.command(command).await,
            Step::Key(ref key) => {
                let suppressed = session.key(key).await;
                tracing::debug!(%key, suppressed, "key handled");
            }
            Step::Advance(seconds) => {
                let mut remaining = seconds;
                while remaining > 0.0 {
                    let slice = remaining.min(frame_ms / 1000.0);
                    session.engine_mut().device_mut().advance(slice);
                    session.pump().await;
                    simulated.advance(slice * 1000.0);
                    session.tick(clock.now_ms());
                    frames += 1;
                    remaining -= slice;
                }
            }
            Step::Press(x) => session.pointer_down(x).await,
            Step::Drag(x) => session.pointer_move(x).await,
            Step::Release => session.pointer_up(),
            Step::Settle => {
                if !session.settle_preload().await {
                    tracing::warn!("preload worker stopped");
                }
            }
        }
        simulated.advance(frame_ms);
        session.tick(clock.now_ms());
        frames += 1;
    }

    let state = session.engine().state().clone();
    let view = session.view();
    let report = json!({
        "status": format!("{:?}", session.engine().status()),
        "current_index": state.current_index,
        "is_playing": state.is_playing,
        "position_seconds": state.position_seconds,
        "duration_seconds": state.duration_seconds,
        "title": view.text(SlotId::Title),
        "current_time": view.text(SlotId::CurrentTime),
        "progress_percent": view.fill(SlotId::ProgressFill),
        "cached_audio": session.engine().audio_cache().keys().collect::<Vec<_>>(),
        "visualizer_history": session.visualizer().history().len(),
        "frames_rendered": frames,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let (_device, surface, _view) = session.shutdown();
    tracing::info!(commands = surface.commands().len(), "simulation finished");
    Ok(())
}

/// Serves assets relative to the manifest's directory.
fn loader_for(manifest: &Path) -> pulse_player_core::Result<(FsLoader, String)> {
    let name = manifest
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PlayerError::Manifest(format!("invalid manifest path {manifest:?}")))?;
    let root = manifest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((FsLoader::new(root), name.to_string()))
}

fn log_progress(progress: StartupProgress) {
    tracing::info!(
        processed = progress.processed,
        total = progress.total,
        percent = progress.fraction() * 100.0,
        "loading assets"
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pulse music player", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the startup gate and summarise the playlist.
    Inspect {
        /// Path to the tracks manifest.
        manifest: PathBuf,
    },
    /// Drive a headless session through scripted steps.
    Simulate {
        /// Path to the tracks manifest.
        manifest: PathBuf,
        /// Steps such as `play`, `next`, `seek=50`, `advance=12.5`, `key=ArrowLeft`,
        /// `settle`, or `press=200`, `drag=420`, `release` on an 800px progress track.
        #[arg(value_delimiter = ',')]
        steps: Vec<Step>,
        /// Simulated milliseconds between animation frames.
        #[arg(long, default_value_t = 16.0)]
        step_ms: f64,
        /// Animate with wall-clock time instead of simulated frame time.
        #[arg(long)]
        wall_clock: bool,
    },
}

#[derive(Debug, Clone)]
enum Step {
    Command(Command),
    Key(String),
    Advance(f64),
    Settle,
    Press(f32),
    Drag(f32),
    Release,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match value.split_once('=') {
            Some((name, argument)) => (name.trim(), Some(argument)),
            None => (value.trim(), None),
        };
        let number = |argument: Option<&str>| -> Result<f64, String> {
            argument
                .ok_or_else(|| format!("`{name}` needs a value"))?
                .trim()
                .parse::<f64>()
                .map_err(|err| format!("`{name}`: {err}"))
        };

        let step = match name {
            "play" => Step::Command(Command::Play),
            "pause" => Step::Command(Command::Pause),
            "toggle" => Step::Command(Command::TogglePlayPause),
            "next" => Step::Command(Command::Next),
            "prev" | "previous" => Step::Command(Command::Previous),
            "seek" => Step::Command(Command::Seek(number(argument)?)),
            "advance" => Step::Advance(number(argument)?),
            "key" => Step::Key(
                argument
                    .ok_or_else(|| "`key` needs a key name".to_string())?
                    .to_string(),
            ),
            "settle" => Step::Settle,
            "press" => Step::Press(number(argument)? as f32),
            "drag" => Step::Drag(number(argument)? as f32),
            "release" => Step::Release,
            other => return Err(format!("unknown step `{other}`")),
        };
        Ok(step)
    }
}
