// Anchor persistence backed by a JSON file
use crate::application::anchor_store::{AnchorStore, AnchorStoreError};
use crate::domain::metric::MetricKind;
use crate::domain::sample::Anchor;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

type AnchorMap = BTreeMap<String, Anchor>;

/// Anchors keyed by metric identifier in a single JSON document.
#[derive(Debug)]
pub struct FileAnchorStore {
    path: PathBuf,
    // Serialises read-modify-write cycles from concurrent watchers
    write_lock: Mutex<()>,
}

impl FileAnchorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<AnchorMap, AnchorStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(AnchorMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AnchorMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, anchors: &AnchorMap) -> Result<(), AnchorStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(anchors)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AnchorStore for FileAnchorStore {
    async fn load(&self, metric: MetricKind) -> Result<Option<Anchor>, AnchorStoreError> {
        let anchors = self.read_all().await?;
        Ok(anchors.get(metric.identifier()).copied())
    }

    async fn save(&self, metric: MetricKind, anchor: Anchor) -> Result<(), AnchorStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut anchors = self.read_all().await?;
        anchors.insert(metric.identifier().to_string(), anchor);
        self.write_all(&anchors).await
    }
}

/// Anchors held for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryAnchorStore {
    anchors: Mutex<AnchorMap>,
}

impl MemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnchorStore for MemoryAnchorStore {
    async fn load(&self, metric: MetricKind) -> Result<Option<Anchor>, AnchorStoreError> {
        Ok(self.anchors.lock().await.get(metric.identifier()).copied())
    }

    async fn save(&self, metric: MetricKind, anchor: Anchor) -> Result<(), AnchorStoreError> {
        self.anchors
            .lock()
            .await
            .insert(metric.identifier().to_string(), anchor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("anchors.json");

        let store = FileAnchorStore::new(&path);
        assert_eq!(store.load(MetricKind::StepCount).await.unwrap(), None);
        store.save(MetricKind::StepCount, Anchor(4)).await.unwrap();
        store.save(MetricKind::WalkingSpeed, Anchor(9)).await.unwrap();
        store.save(MetricKind::StepCount, Anchor(12)).await.unwrap();

        let reopened = FileAnchorStore::new(&path);
        assert_eq!(reopened.load(MetricKind::StepCount).await.unwrap(), Some(Anchor(12)));
        assert_eq!(reopened.load(MetricKind::WalkingSpeed).await.unwrap(), Some(Anchor(9)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchors.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileAnchorStore::new(&path);
        let result = store.load(MetricKind::StepCount).await;
        assert!(matches!(result, Err(AnchorStoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_memory_store_keeps_latest() {
        let store = MemoryAnchorStore::new();
        store.save(MetricKind::StepCount, Anchor(1)).await.unwrap();
        store.save(MetricKind::StepCount, Anchor(2)).await.unwrap();
        assert_eq!(store.load(MetricKind::StepCount).await.unwrap(), Some(Anchor(2)));
    }
}
