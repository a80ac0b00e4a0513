//! One JSON document per thread on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Checkpoint, CheckpointStore};
use crate::error::PalaverError;

/// File-backed checkpoints that survive process restarts.
///
/// Each thread maps to `{dir}/{sha256(thread_id)}.json`. Writes go to a
/// temporary sibling file that is then renamed over the target, so a reader
/// sees either the old or the new checkpoint.
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    initialized: AtomicBool,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Store under `~/.palaver/checkpoints`.
    pub fn new_default() -> Self {
        Self::new(default_checkpoint_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn checkpoint_path(&self, thread_id: &str) -> PathBuf {
        let digest = Sha256::digest(thread_id.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    fn ensure_initialized(&self, operation: &str) -> Result<(), PalaverError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(PalaverError::persistence(
                operation,
                "store used before initialize()",
            ))
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn initialize(&self) -> Result<(), PalaverError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PalaverError::StoreUnavailable(format!("{}: {e}", self.dir.display()))
        })?;
        let metadata = tokio::fs::metadata(&self.dir).await.map_err(|e| {
            PalaverError::StoreUnavailable(format!("{}: {e}", self.dir.display()))
        })?;
        if metadata.permissions().readonly() {
            return Err(PalaverError::StoreUnavailable(format!(
                "{} is read-only",
                self.dir.display()
            )));
        }
        self.initialized.store(true, Ordering::Release);
        debug!(dir = %self.dir.display(), "checkpoint store initialized");
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, PalaverError> {
        self.ensure_initialized("get")?;
        let path = self.checkpoint_path(thread_id);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PalaverError::persistence("get", err.to_string())),
        };
        let checkpoint = serde_json::from_slice(&content).map_err(|e| {
            PalaverError::persistence("get", format!("corrupt checkpoint {}: {e}", path.display()))
        })?;
        Ok(Some(checkpoint))
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), PalaverError> {
        self.ensure_initialized("put")?;
        let path = self.checkpoint_path(thread_id);
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        let content = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| PalaverError::persistence("put", e.to_string()))?;

        if let Err(err) = tokio::fs::write(&tmp, &content).await {
            return Err(PalaverError::persistence("put", err.to_string()));
        }
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PalaverError::persistence("put", err.to_string()));
        }
        debug!(thread_id, messages = checkpoint.messages.len(), "checkpoint written");
        Ok(())
    }
}

fn default_checkpoint_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".palaver"))
        .unwrap_or_else(|| PathBuf::from(".palaver"))
        .join("checkpoints")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[tokio::test]
    async fn use_before_initialize_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let err = store.get("t1").await.unwrap_err();
        assert!(matches!(err, PalaverError::Persistence { .. }));
    }

    #[tokio::test]
    async fn thread_ids_map_to_distinct_safe_file_names() {
        let store = FileCheckpointStore::new("/tmp/x");
        let a = store.checkpoint_path("../../etc/passwd");
        let b = store.checkpoint_path("t2");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/tmp/x")));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("json"));
    }

    #[tokio::test]
    async fn put_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();

        let checkpoint = Checkpoint::new(vec![Message::human("hi")], Default::default());
        store.put("t1", &checkpoint).await.unwrap();
        store.put("t1", &checkpoint).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.initialize().await.unwrap();
        std::fs::write(store.checkpoint_path("t1"), b"not json").unwrap();
        let err = store.get("t1").await.unwrap_err();
        assert!(err.to_string().contains("corrupt checkpoint"));
    }
}
