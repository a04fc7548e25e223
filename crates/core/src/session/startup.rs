use std::time::Duration;

use crate::{
    assets::{load_image, within, ImageHandle, ResourceLoader},
    cache::PreloadCache,
    config::AppConfig,
    manifest::Manifest,
    Result,
};

/// Everything the player needs before it may be shown.
#[derive(Debug)]
pub struct Library {
    pub manifest: Manifest,
    pub covers: PreloadCache<ImageHandle>,
    pub failed_covers: usize,
}

/// Cover loading progress, reported once per processed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartupProgress {
    pub processed: usize,
    pub total: usize,
}

impl StartupProgress {
    /// Fraction in `[0, 1]`; an empty workload counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Loads the manifest, then every cover image strictly one after another so
/// progress advances monotonically. Failures never abort the gate: a broken
/// manifest yields an empty library and a broken cover still counts as
/// processed.
pub async fn load_library<L, P>(
    loader: &L,
    manifest_url: &str,
    config: &AppConfig,
    mut on_progress: P,
) -> Library
where
    L: ResourceLoader,
    P: FnMut(StartupProgress),
{
    let limit = config.startup.asset_timeout_ms.map(Duration::from_millis);

    let manifest = match fetch_manifest(loader, manifest_url, limit).await {
        Ok(manifest) => {
            tracing::info!(tracks = manifest.len(), url = manifest_url, "manifest loaded");
            manifest
        }
        Err(err) => {
            tracing::error!(%err, url = manifest_url, "could not load manifest, starting empty");
            Manifest::empty()
        }
    };

    let images: Vec<String> = manifest.image_refs().map(str::to_string).collect();
    let total = images.len();
    let mut covers = PreloadCache::new(config.player.image_cache_capacity);
    let mut failed_covers = 0;

    if total == 0 {
        on_progress(StartupProgress {
            processed: 0,
            total: 0,
        });
    }

    for (position, url) in images.iter().enumerate() {
        match within(limit, url, load_image(loader, url)).await {
            Ok(image) => {
                covers.insert(url.clone(), image);
            }
            Err(err) => {
                failed_covers += 1;
                tracing::warn!(%err, %url, "cover image failed, using placeholder");
            }
        }
        on_progress(StartupProgress {
            processed: position + 1,
            total,
        });
    }

    tracing::info!(total, failed = failed_covers, "startup assets accounted for");
    Library {
        manifest,
        covers,
        failed_covers,
    }
}

async fn fetch_manifest<L: ResourceLoader>(
    loader: &L,
    url: &str,
    limit: Option<Duration>,
) -> Result<Manifest> {
    let bytes = within(limit, url, loader.fetch(url)).await?;
    Manifest::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::StaticLoader;

    const MANIFEST: &str = r#"{ "tracks": [
        { "id": 1, "title": "A", "artist": "X", "image": "a.webp", "audio": "a.mp3" },
        { "id": 2, "title": "B", "artist": "Y", "image": "b.webp", "audio": "b.mp3" },
        { "id": 3, "title": "C", "artist": "Z", "image": null, "audio": "c.mp3" },
        { "id": 4, "title": "D", "artist": "W", "image": "d.webp", "audio": null }
    ] }"#;

    #[tokio::test]
    async fn accounts_for_every_cover_in_order() {
        let loader = StaticLoader::new()
            .with("tracks.json", MANIFEST)
            .with("a.webp", vec![1u8])
            .with("d.webp", vec![4u8]);

        let mut seen = Vec::new();
        let library = load_library(&loader, "tracks.json", &AppConfig::default(), |p| {
            seen.push(p)
        })
        .await;

        assert_eq!(library.manifest.len(), 4);
        assert_eq!(library.failed_covers, 1);
        assert!(library.covers.contains("a.webp"));
        assert!(!library.covers.contains("b.webp"));
        assert!(library.covers.contains("d.webp"));

        let fractions: Vec<f64> = seen.iter().map(StartupProgress::fraction).collect();
        assert_eq!(seen.len(), 3);
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(fractions.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn broken_manifest_yields_empty_library() {
        let loader = StaticLoader::new().with("tracks.json", "{ not json");

        let mut seen = Vec::new();
        let library = load_library(&loader, "tracks.json", &AppConfig::default(), |p| {
            seen.push(p)
        })
        .await;

        assert!(library.manifest.is_empty());
        assert_eq!(seen, vec![StartupProgress { processed: 0, total: 0 }]);
        assert_eq!(seen[0].fraction(), 1.0);
    }

    #[tokio::test]
    async fn missing_manifest_yields_empty_library() {
        let library =
            load_library(&StaticLoader::new(), "tracks.json", &AppConfig::default(), |_| {}).await;
        assert!(library.manifest.is_empty());
        assert!(library.covers.is_empty());
    }
}
