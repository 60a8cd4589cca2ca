use std::{
    collections::{BTreeMap, BTreeSet},
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("favorites file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("favorites file {} is not valid: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    #[serde(default)]
    pub log_groups: BTreeSet<String>,
    #[serde(default)]
    pub log_streams: BTreeMap<String, BTreeSet<String>>,
}

impl Favorites {
    pub fn is_group_favorite(&self, group: &str) -> bool {
        self.log_groups.contains(group)
    }

    pub fn is_stream_favorite(&self, group: &str, stream: &str) -> bool {
        self.log_streams
            .get(group)
            .is_some_and(|streams| streams.contains(stream))
    }

    pub fn toggle_group(&mut self, group: &str) -> bool {
        if self.log_groups.remove(group) {
            false
        } else {
            self.log_groups.insert(group.to_owned());
            true
        }
    }

    /// Flips the stream's favorite flag and returns the new state. A group
    /// left without favorite streams is dropped from the map.
    pub fn toggle_stream(&mut self, group: &str, stream: &str) -> bool {
        let streams = self.log_streams.entry(group.to_owned()).or_default();
        let now_favorite = if streams.remove(stream) {
            false
        } else {
            streams.insert(stream.to_owned());
            true
        };

        if streams.is_empty() {
            self.log_streams.remove(group);
        }
        now_favorite
    }
}

#[async_trait]
pub trait FavoritesRepository: Send + Sync {
    async fn load(&self) -> Result<Favorites, FavoritesError>;
    async fn save(&self, favorites: &Favorites) -> Result<(), FavoritesError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> FavoritesError {
        FavoritesError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl FavoritesRepository for JsonFileRepository {
    async fn load(&self) -> Result<Favorites, FavoritesError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no favorites file yet");
                return Ok(Favorites::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        serde_json::from_slice(&raw).map_err(|source| FavoritesError::Json {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, favorites: &Favorites) -> Result<(), FavoritesError> {
        let body = serde_json::to_vec_pretty(favorites).map_err(|source| FavoritesError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, body)
            .await
            .map_err(|err| self.io_error(err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| self.io_error(err))
    }
}

/// Serializes every read-modify-write cycle through one lock, so concurrent
/// toggles within this process never lose an update. Other processes writing
/// the same file are not coordinated with.
pub struct FavoritesStore {
    repository: Arc<dyn FavoritesRepository>,
    writer: Mutex<()>,
}

impl FavoritesStore {
    pub fn new(repository: Arc<dyn FavoritesRepository>) -> Self {
        Self {
            repository,
            writer: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> Result<Favorites, FavoritesError> {
        self.repository.load().await
    }

    pub async fn toggle_group(&self, group: &str) -> Result<bool, FavoritesError> {
        let _guard = self.writer.lock().await;
        let mut favorites = self.repository.load().await?;
        let favorite = favorites.toggle_group(group);
        self.repository.save(&favorites).await?;
        info!(group, favorite, "toggled favorite group");
        Ok(favorite)
    }

    pub async fn toggle_stream(&self, group: &str, stream: &str) -> Result<bool, FavoritesError> {
        let _guard = self.writer.lock().await;
        let mut favorites = self.repository.load().await?;
        let favorite = favorites.toggle_stream(group, stream);
        self.repository.save(&favorites).await?;
        info!(group, stream, favorite, "toggled favorite stream");
        Ok(favorite)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryRepository {
    document: std::sync::Mutex<Favorites>,
}

#[cfg(test)]
#[async_trait]
impl FavoritesRepository for MemoryRepository {
    async fn load(&self) -> Result<Favorites, FavoritesError> {
        Ok(self.document.lock().expect("favorites lock").clone())
    }

    async fn save(&self, favorites: &Favorites) -> Result<(), FavoritesError> {
        *self.document.lock().expect("favorites lock") = favorites.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_group_twice_restores_document() {
        let mut favorites = Favorites::default();
        favorites.toggle_group("/keep");
        let original = favorites.clone();

        assert!(favorites.toggle_group("/aws/lambda/api"));
        assert!(favorites.is_group_favorite("/aws/lambda/api"));
        assert!(!favorites.toggle_group("/aws/lambda/api"));

        assert_eq!(favorites, original);
    }

    #[test]
    fn toggling_stream_twice_drops_empty_group_entry() {
        let mut favorites = Favorites::default();

        assert!(favorites.toggle_stream("g", "s1"));
        assert!(favorites.is_stream_favorite("g", "s1"));
        assert!(!favorites.is_stream_favorite("g", "s2"));
        assert!(!favorites.toggle_stream("g", "s1"));

        assert_eq!(favorites, Favorites::default());
    }

    #[test]
    fn document_shape_matches_stored_format() {
        let mut favorites = Favorites::default();
        favorites.toggle_group("a");
        favorites.toggle_stream("a", "x");

        let value = serde_json::to_value(&favorites).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({ "log_groups": ["a"], "log_streams": { "a": ["x"] } })
        );

        let partial: Favorites = serde_json::from_str(r#"{"log_groups": ["b"]}"#).expect("parse");
        assert!(partial.is_group_favorite("b"));
        assert!(partial.log_streams.is_empty());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repository = JsonFileRepository::new(dir.path().join("favorites.json"));

        assert_eq!(repository.load().await.expect("load"), Favorites::default());
    }

    #[tokio::test]
    async fn file_repository_persists_whole_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("favorites.json");
        let store = FavoritesStore::new(Arc::new(JsonFileRepository::new(&path)));

        assert!(store.toggle_group("/aws/ecs/web").await.expect("toggle"));
        assert!(store.toggle_stream("/aws/ecs/web", "task/1").await.expect("toggle"));

        let reread = JsonFileRepository::new(&path).load().await.expect("load");
        assert!(reread.is_group_favorite("/aws/ecs/web"));
        assert!(reread.is_stream_favorite("/aws/ecs/web", "task/1"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "{not json").expect("write");

        let err = JsonFileRepository::new(&path).load().await.unwrap_err();
        assert!(matches!(err, FavoritesError::Json { .. }));
    }

    #[tokio::test]
    async fn concurrent_toggles_do_not_lose_updates() {
        let store = Arc::new(FavoritesStore::new(Arc::new(MemoryRepository::default())));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.toggle_group(&format!("group-{i}")).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.expect("join").expect("toggle"));
        }

        let snapshot = store.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.log_groups.len(), 16);
    }
}
