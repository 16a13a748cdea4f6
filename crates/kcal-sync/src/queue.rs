// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable, strictly ordered queue of pending remote writes.
//!
//! The in-memory list and the durable document are kept in lock-step:
//! every mutation completes its full read-modify-persist sequence under
//! the queue lock before control returns, so a crash can never observe an
//! in-memory state not yet reflected in storage. Durability is
//! best-effort: a persist failure is logged and the in-memory state
//! stands, so callers are never failed by storage trouble.

use std::sync::Arc;

use kcal_sync_core::{OperationId, OperationKind, QueuedOperation};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::store::QueueStore;

/// Diagnostic event emitted when an operation exhausts its retry budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
	/// The discarded operation.
	pub operation: QueuedOperation,
	/// Total failed replay attempts, equal to the retry budget.
	pub attempts: u32,
}

/// Durable FIFO queue of [`QueuedOperation`] records.
pub struct PersistentQueue {
	store: Arc<dyn QueueStore>,
	entries: Mutex<Vec<QueuedOperation>>,
	max_retries: u32,
	dead_letter_tx: broadcast::Sender<DeadLetter>,
}

impl PersistentQueue {
	/// Loads the queue from its durable store.
	///
	/// An absent or unparseable document initializes the queue empty;
	/// corruption is swallowed and logged, never surfaced to the caller.
	pub async fn load(
		store: Arc<dyn QueueStore>,
		max_retries: u32,
		dead_letter_capacity: usize,
	) -> Self {
		let entries = match store.load().await {
			Ok(entries) => entries,
			Err(e) => {
				warn!(error = %e, "Queue document unreadable, resetting to empty");
				Vec::new()
			}
		};
		debug!(count = entries.len(), "Queue loaded");

		let (dead_letter_tx, _) = broadcast::channel(dead_letter_capacity.max(1));
		Self {
			store,
			entries: Mutex::new(entries),
			max_retries,
			dead_letter_tx,
		}
	}

	/// Appends a new operation and persists the full list.
	///
	/// Never fails the caller: if persistence fails the entry still
	/// exists in memory and the failure is logged.
	pub async fn enqueue(&self, kind: OperationKind, payload: serde_json::Value) -> OperationId {
		let operation = QueuedOperation::new(kind, payload);
		let id = operation.id;

		let mut entries = self.entries.lock().await;
		entries.push(operation);
		debug!(%id, %kind, pending = entries.len(), "Operation enqueued");
		self.persist(&entries).await;
		id
	}

	/// Returns an immutable copy of the current entries in enqueue order.
	///
	/// The sync engine iterates this copy, so the queue may keep
	/// accepting new enqueues while a drain is mid-flight.
	pub async fn snapshot(&self) -> Vec<QueuedOperation> {
		self.entries.lock().await.clone()
	}

	/// Deletes the entry if present and re-persists; silent no-op when
	/// the id is absent.
	pub async fn remove(&self, id: OperationId) {
		let mut entries = self.entries.lock().await;
		let before = entries.len();
		entries.retain(|op| op.id != id);
		if entries.len() == before {
			return;
		}
		debug!(%id, pending = entries.len(), "Operation removed");
		self.persist(&entries).await;
	}

	/// Increments the retry count of the entry, dead-lettering it if the
	/// result would reach the retry budget.
	pub async fn increment_retry(&self, id: OperationId) {
		let mut entries = self.entries.lock().await;
		let Some(index) = entries.iter().position(|op| op.id == id) else {
			return;
		};

		if entries[index].retry_count + 1 >= self.max_retries {
			let operation = entries.remove(index);
			warn!(
				%id,
				kind = %operation.kind,
				attempts = self.max_retries,
				"Operation exhausted retry budget, dead-lettered"
			);
			// Nobody listening is fine; diagnostics are opt-in.
			let _ = self.dead_letter_tx.send(DeadLetter {
				operation,
				attempts: self.max_retries,
			});
		} else {
			entries[index].retry_count += 1;
			debug!(%id, retry_count = entries[index].retry_count, "Retry recorded");
		}
		self.persist(&entries).await;
	}

	/// Number of pending operations.
	pub async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}

	/// Whether the queue has no pending operations.
	pub async fn is_empty(&self) -> bool {
		self.entries.lock().await.is_empty()
	}

	/// Removes every entry and persists the empty state.
	pub async fn clear(&self) {
		let mut entries = self.entries.lock().await;
		entries.clear();
		self.persist(&entries).await;
	}

	/// Subscribes to dead-letter diagnostics.
	pub fn subscribe_dead_letters(&self) -> broadcast::Receiver<DeadLetter> {
		self.dead_letter_tx.subscribe()
	}

	async fn persist(&self, entries: &[QueuedOperation]) {
		if let Err(e) = self.store.save(entries).await {
			warn!(error = %e, "Failed to persist queue document, continuing in memory");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{Result, SyncError};
	use crate::store::JsonFileStore;
	use async_trait::async_trait;

	/// In-memory store that records every persisted document.
	#[derive(Default)]
	struct RecordingStore {
		saved: std::sync::Mutex<Vec<Vec<QueuedOperation>>>,
	}

	#[async_trait]
	impl QueueStore for RecordingStore {
		async fn load(&self) -> Result<Vec<QueuedOperation>> {
			Ok(Vec::new())
		}

		async fn save(&self, operations: &[QueuedOperation]) -> Result<()> {
			self.saved.lock().unwrap().push(operations.to_vec());
			Ok(())
		}
	}

	/// Store whose every access fails.
	struct BrokenStore;

	#[async_trait]
	impl QueueStore for BrokenStore {
		async fn load(&self) -> Result<Vec<QueuedOperation>> {
			Err(SyncError::Storage(std::io::Error::other("disk on fire")))
		}

		async fn save(&self, _operations: &[QueuedOperation]) -> Result<()> {
			Err(SyncError::Storage(std::io::Error::other("disk on fire")))
		}
	}

	async fn queue_with(store: Arc<dyn QueueStore>) -> PersistentQueue {
		PersistentQueue::load(store, 3, 16).await
	}

	#[tokio::test]
	async fn enqueue_assigns_unique_ids_and_persists() {
		let store = Arc::new(RecordingStore::default());
		let queue = queue_with(store.clone()).await;

		let a = queue.enqueue(OperationKind::Diary, serde_json::json!({"n": 1})).await;
		let b = queue.enqueue(OperationKind::Diary, serde_json::json!({"n": 2})).await;

		assert_ne!(a, b);
		assert_eq!(queue.len().await, 2);

		// Each mutation re-persisted the full list.
		let saved = store.saved.lock().unwrap();
		assert_eq!(saved.len(), 2);
		assert_eq!(saved[0].len(), 1);
		assert_eq!(saved[1].len(), 2);
		assert_eq!(saved[1][0].id, a);
		assert_eq!(saved[1][1].id, b);
	}

	#[tokio::test]
	async fn enqueue_never_fails_when_persistence_fails() {
		let queue = queue_with(Arc::new(BrokenStore)).await;

		let id = queue.enqueue(OperationKind::Diary, serde_json::json!({})).await;

		assert_eq!(queue.len().await, 1);
		assert_eq!(queue.snapshot().await[0].id, id);
	}

	#[tokio::test]
	async fn corrupt_store_initializes_empty() {
		let queue = queue_with(Arc::new(BrokenStore)).await;
		assert!(queue.is_empty().await);
	}

	#[tokio::test]
	async fn remove_absent_id_is_a_silent_noop() {
		let store = Arc::new(RecordingStore::default());
		let queue = queue_with(store.clone()).await;

		queue.remove(OperationId::new()).await;

		assert!(queue.is_empty().await);
		// No mutation happened, so nothing was re-persisted.
		assert!(store.saved.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn remove_deletes_and_persists() {
		let store = Arc::new(RecordingStore::default());
		let queue = queue_with(store.clone()).await;

		let a = queue.enqueue(OperationKind::Diary, serde_json::json!({})).await;
		let b = queue.enqueue(OperationKind::Analysis, serde_json::json!({})).await;
		queue.remove(a).await;

		let snapshot = queue.snapshot().await;
		assert_eq!(snapshot.len(), 1);
		assert_eq!(snapshot[0].id, b);

		let saved = store.saved.lock().unwrap();
		assert_eq!(saved.last().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn retry_counts_are_monotonic_until_dead_letter() {
		let queue = queue_with(Arc::new(RecordingStore::default())).await;
		let mut dead_letters = queue.subscribe_dead_letters();

		let id = queue.enqueue(OperationKind::Diary, serde_json::json!({})).await;

		queue.increment_retry(id).await;
		assert_eq!(queue.snapshot().await[0].retry_count, 1);

		queue.increment_retry(id).await;
		assert_eq!(queue.snapshot().await[0].retry_count, 2);

		// Third failure would reach the budget of 3: dead-letter instead.
		queue.increment_retry(id).await;
		assert!(queue.is_empty().await);

		let event = dead_letters.try_recv().unwrap();
		assert_eq!(event.operation.id, id);
		assert_eq!(event.attempts, 3);
	}

	#[tokio::test]
	async fn increment_retry_on_absent_id_is_a_noop() {
		let store = Arc::new(RecordingStore::default());
		let queue = queue_with(store.clone()).await;

		queue.increment_retry(OperationId::new()).await;

		assert!(store.saved.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn clear_persists_empty_state() {
		let store = Arc::new(RecordingStore::default());
		let queue = queue_with(store.clone()).await;

		queue.enqueue(OperationKind::Diary, serde_json::json!({})).await;
		queue.clear().await;

		assert!(queue.is_empty().await);
		assert!(store.saved.lock().unwrap().last().unwrap().is_empty());
	}

	#[tokio::test]
	async fn persistence_roundtrip_across_restart() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queue.json");

		let first = queue_with(Arc::new(JsonFileStore::new(&path))).await;
		let a = first
			.enqueue(OperationKind::Diary, serde_json::json!({"meal": "breakfast"}))
			.await;
		let b = first
			.enqueue(OperationKind::Analysis, serde_json::json!({"image_base64": "aGk="}))
			.await;
		first.increment_retry(b).await;

		// Simulated restart: a fresh queue instance over the same path.
		let second = queue_with(Arc::new(JsonFileStore::new(&path))).await;
		let snapshot = second.snapshot().await;

		assert_eq!(snapshot.len(), 2);
		assert_eq!(snapshot[0].id, a);
		assert_eq!(snapshot[0].kind, OperationKind::Diary);
		assert_eq!(snapshot[0].payload, serde_json::json!({"meal": "breakfast"}));
		assert_eq!(snapshot[0].retry_count, 0);
		assert_eq!(snapshot[1].id, b);
		assert_eq!(snapshot[1].retry_count, 1);
	}

	#[tokio::test]
	async fn corrupt_file_recovers_to_empty_queue() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queue.json");
		tokio::fs::write(&path, b"\xff\xfenot a document").await.unwrap();

		let queue = queue_with(Arc::new(JsonFileStore::new(&path))).await;
		assert!(queue.is_empty().await);
	}
}
