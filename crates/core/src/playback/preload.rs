//! Background priming of adjacent tracks.
//!
//! The worker owns nothing but the loader. Results travel back to the engine
//! as [`PreloadEvent`]s so that only the engine ever mutates the cache.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    assets::{prime_audio, AudioHandle, ResourceLoader},
    PlayerError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadRequest {
    pub url: String,
}

#[derive(Debug)]
pub enum PreloadEvent {
    Primed { url: String, handle: AudioHandle },
    Failed { url: String, error: PlayerError },
}

pub type PreloadSender = mpsc::UnboundedSender<PreloadRequest>;
pub type PreloadReceiver = mpsc::UnboundedReceiver<PreloadEvent>;

/// Spawns the preload task. Requests are served one at a time in arrival
/// order; the task ends when every request sender has been dropped.
pub fn spawn_preloader<L: ResourceLoader>(loader: Arc<L>) -> (PreloadSender, PreloadReceiver) {
    let (tx_req, mut rx_req) = mpsc::unbounded_channel::<PreloadRequest>();
    let (tx_evt, rx_evt) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(PreloadRequest { url }) = rx_req.recv().await {
            let event = match prime_audio(loader.as_ref(), &url).await {
                Ok(handle) => PreloadEvent::Primed { url, handle },
                Err(err) => PreloadEvent::Failed {
                    error: PlayerError::Preload {
                        url: url.clone(),
                        reason: err.to_string(),
                    },
                    url,
                },
            };
            if tx_evt.send(event).is_err() {
                break;
            }
        }
        tracing::debug!("preload worker stopped");
    });

    (tx_req, rx_evt)
}
