//! Track list produced by the content pipeline.

mod theme;

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{PlayerError, Result};

pub use theme::ColorTheme;

/// Static metadata and asset references for one playable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(rename = "duration", default)]
    pub duration_label: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub audio: Option<String>,
    #[serde(default)]
    pub colors: ColorTheme,
}

impl TrackDescriptor {
    /// Seconds encoded in the `M:SS` (or `H:MM:SS`) label, if it parses.
    pub fn duration_hint(&self) -> Option<f64> {
        parse_duration_label(&self.duration_label)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Ordered track sequence. Order defines next/previous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    tracks: Vec<TrackDescriptor>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a manifest from already-parsed tracks, rejecting duplicate ids.
    pub fn new(tracks: Vec<TrackDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id) {
                return Err(PlayerError::Manifest(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
        }
        Ok(Self { tracks })
    }

    /// Parses the `{ "tracks": [...] }` document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: Manifest = serde_json::from_slice(bytes)?;
        Self::new(raw.tracks)
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&TrackDescriptor> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Cover image references in track order, skipping tracks without one.
    pub fn image_refs(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().filter_map(|track| track.image.as_deref())
    }
}

fn non_empty<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|path| !path.trim().is_empty()))
}

/// Parses `M:SS` or `H:MM:SS` into seconds.
pub fn parse_duration_label(label: &str) -> Option<f64> {
    let mut total = 0u64;
    let mut parts = 0;
    for (position, part) in label.trim().split(':').enumerate() {
        let value: u64 = part.parse().ok()?;
        if position > 0 && value >= 60 {
            return None;
        }
        total = total * 60 + value;
        parts += 1;
    }

    if (2..=3).contains(&parts) {
        Some(total as f64)
    } else {
        None
    }
}
