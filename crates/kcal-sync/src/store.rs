// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable storage for the pending-operation queue.
//!
//! The queue is persisted as one JSON document: an ordered list of
//! [`QueuedOperation`] records. Every mutation re-persists the full list,
//! so the store only ever needs `load` and `save`.

use std::path::PathBuf;

use async_trait::async_trait;
use kcal_sync_core::QueuedOperation;
use tracing::debug;

use crate::error::Result;

/// Storage backend for the durable queue document.
#[async_trait]
pub trait QueueStore: Send + Sync {
	/// Loads the full ordered list of queued operations.
	///
	/// An absent document yields an empty list; an unreadable or
	/// unparseable document is an error (the queue treats it as
	/// corruption and resets to empty).
	async fn load(&self) -> Result<Vec<QueuedOperation>>;

	/// Replaces the durable document with the given list.
	async fn save(&self, operations: &[QueuedOperation]) -> Result<()>;
}

/// File-backed store holding the queue document at a single path.
///
/// Writes go through a temp file in the same directory followed by a
/// rename, so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
	path: PathBuf,
}

impl JsonFileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// The path of the durable document.
	pub fn path(&self) -> &std::path::Path {
		&self.path
	}

	fn tmp_path(&self) -> PathBuf {
		let mut name = self.path.file_name().unwrap_or_default().to_os_string();
		name.push(".tmp");
		self.path.with_file_name(name)
	}
}

#[async_trait]
impl QueueStore for JsonFileStore {
	async fn load(&self) -> Result<Vec<QueuedOperation>> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %self.path.display(), "No queue document, starting empty");
				return Ok(Vec::new());
			}
			Err(e) => return Err(e.into()),
		};
		let operations: Vec<QueuedOperation> = serde_json::from_slice(&bytes)?;
		debug!(
			path = %self.path.display(),
			count = operations.len(),
			"Loaded queue document"
		);
		Ok(operations)
	}

	async fn save(&self, operations: &[QueuedOperation]) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let bytes = serde_json::to_vec(operations)?;
		let tmp = self.tmp_path();
		tokio::fs::write(&tmp, &bytes).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		debug!(
			path = %self.path.display(),
			count = operations.len(),
			"Persisted queue document"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kcal_sync_core::OperationKind;

	#[tokio::test]
	async fn load_missing_file_yields_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("queue.json"));
		let loaded = store.load().await.unwrap();
		assert!(loaded.is_empty());
	}

	#[tokio::test]
	async fn save_then_load_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("queue.json"));

		let ops = vec![
			QueuedOperation::new(OperationKind::Diary, serde_json::json!({"calories": 310})),
			QueuedOperation::new(OperationKind::Analysis, serde_json::json!({"image_base64": "aGk="})),
		];
		store.save(&ops).await.unwrap();

		let loaded = store.load().await.unwrap();
		assert_eq!(loaded.len(), 2);
		assert_eq!(loaded[0].id, ops[0].id);
		assert_eq!(loaded[1].id, ops[1].id);
		assert_eq!(loaded[0].kind, OperationKind::Diary);
	}

	#[tokio::test]
	async fn load_corrupt_document_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queue.json");
		tokio::fs::write(&path, b"{not json").await.unwrap();

		let store = JsonFileStore::new(&path);
		assert!(store.load().await.is_err());
	}

	#[tokio::test]
	async fn save_creates_missing_parent_directories() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("nested/deeper/queue.json"));
		store.save(&[]).await.unwrap();
		assert!(store.path().exists());
	}

	#[tokio::test]
	async fn save_overwrites_previous_document() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("queue.json"));

		let op = QueuedOperation::new(OperationKind::Diary, serde_json::json!({}));
		store.save(std::slice::from_ref(&op)).await.unwrap();
		store.save(&[]).await.unwrap();

		let loaded = store.load().await.unwrap();
		assert!(loaded.is_empty());
	}
}
