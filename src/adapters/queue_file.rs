use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::client::offline_queue::OfflineQueue;

#[derive(Debug, Error)]
pub enum QueueFileError {
    #[error("queue file io failed: {0}")]
    Io(#[from] io::Error),
    #[error("queue file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the persisted offline queue; a missing file is an empty queue.
pub fn load_queue(path: &Path) -> Result<OfflineQueue, QueueFileError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(OfflineQueue::default());
        }
        Err(error) => return Err(error.into()),
    };

    if content.trim().is_empty() {
        return Ok(OfflineQueue::default());
    }

    Ok(serde_json::from_str(&content)?)
}

/// Writes to a sibling temp file, then renames it over `path`.
pub fn save_queue(path: &Path, queue: &OfflineQueue) -> Result<(), QueueFileError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(queue)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;

    tracing::debug!(path = %path.display(), pending = queue.len(), "offline queue saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{QueueFileError, load_queue, save_queue};
    use crate::client::offline_queue::{OfflineQueue, PendingRequest};

    #[test]
    fn missing_file_loads_as_empty_queue() {
        let dir = tempfile::tempdir().expect("tempdir should be created");

        let queue = load_queue(&dir.path().join("queue.json")).expect("load should succeed");

        assert!(queue.is_empty());
    }

    #[test]
    fn persists_pending_requests_across_restarts() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("client").join("queue.json");
        let mut queue = OfflineQueue::default();
        queue.enqueue(PendingRequest::LinkStation {
            place_id: "ChIJ-a".to_string(),
        });
        queue.enqueue(PendingRequest::AddFavorite {
            station_id: "ChIJ-a".to_string(),
            user_id: "user-1".to_string(),
        });

        save_queue(&path, &queue).expect("save should succeed");
        let restored = load_queue(&path).expect("load should succeed");

        assert_eq!(restored, queue);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("queue.json");
        std::fs::write(&path, "{not json").expect("write should succeed");

        let result = load_queue(&path);

        assert!(matches!(result, Err(QueueFileError::Json(_))));
    }
}
