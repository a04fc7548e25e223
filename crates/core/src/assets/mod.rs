use std::{
    collections::HashMap,
    future::Future,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{PlayerError, Result};

/// Primed audio resource. Cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub url: String,
    pub bytes: Arc<[u8]>,
}

/// Loaded cover image. Cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub url: String,
    pub bytes: Arc<[u8]>,
}

/// Source of raw bytes for manifests, covers and audio, addressed by the
/// relative references found in the manifest.
pub trait ResourceLoader: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Loads resources from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a manifest reference onto the root, refusing to leave it.
    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        let relative = Path::new(url.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes || url.trim().is_empty() {
            return Err(PlayerError::asset(url, "reference leaves the asset root"));
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceLoader for FsLoader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;
        tokio::fs::read(&path)
            .await
            .map_err(|err| PlayerError::asset(url, err))
    }
}

/// In-memory resources, keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    resources: HashMap<String, Arc<[u8]>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.resources.insert(url.into(), bytes.into());
    }
}

impl ResourceLoader for StaticLoader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.resources
            .get(url)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| PlayerError::asset(url, "not found"))
    }
}

pub async fn load_image<L: ResourceLoader>(loader: &L, url: &str) -> Result<ImageHandle> {
    let bytes = loader.fetch(url).await?;
    if bytes.is_empty() {
        return Err(PlayerError::asset(url, "empty image"));
    }
    Ok(ImageHandle {
        url: url.to_string(),
        bytes: bytes.into(),
    })
}

pub async fn prime_audio<L: ResourceLoader>(loader: &L, url: &str) -> Result<AudioHandle> {
    let bytes = loader.fetch(url).await?;
    if bytes.is_empty() {
        return Err(PlayerError::asset(url, "empty audio file"));
    }
    Ok(AudioHandle {
        url: url.to_string(),
        bytes: bytes.into(),
    })
}

/// Awaits `future`, bounded by `limit` when one is configured.
pub async fn within<T, F>(limit: Option<Duration>, url: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| PlayerError::Timeout {
                url: url.to_string(),
                millis: limit.as_millis() as u64,
            })?,
        None => future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("covers")).unwrap();
        std::fs::write(dir.path().join("covers/a.webp"), b"img").unwrap();

        let loader = FsLoader::new(dir.path());
        let image = load_image(&loader, "/covers/a.webp").await.unwrap();
        assert_eq!(&*image.bytes, b"img");
        assert_eq!(image.url, "/covers/a.webp");
    }

    #[tokio::test]
    async fn missing_files_are_asset_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsLoader::new(dir.path());

        let err = prime_audio(&loader, "gone.mp3").await.unwrap_err();
        assert!(matches!(err, PlayerError::AssetLoad { ref url, .. } if url == "gone.mp3"));
    }

    #[test]
    fn refuses_parent_traversal() {
        let loader = FsLoader::new("/srv/music");
        assert!(loader.resolve("../secret").is_err());
        assert_eq!(
            loader.resolve("audio/a.mp3").unwrap(),
            PathBuf::from("/srv/music/audio/a.mp3")
        );
    }

    #[tokio::test]
    async fn static_loader_serves_known_refs() {
        let loader = StaticLoader::new().with("a.mp3", vec![1, 2, 3]);
        let handle = prime_audio(&loader, "a.mp3").await.unwrap();
        assert_eq!(handle.bytes.len(), 3);
        assert!(loader.fetch("b.mp3").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_waits_time_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, PlayerError>(())
        };
        let err = within(Some(Duration::from_millis(100)), "slow.webp", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Timeout { millis: 100, .. }));
    }
}
