// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing facade over the offline sync subsystem.
//!
//! One [`SyncService`] is constructed at application bootstrap and handed
//! around as a cheap clone. Construction is explicit so tests build
//! isolated instances instead of sharing process-wide state; `shutdown`
//! is the matching explicit dispose.
//!
//! Failures never cross this API: enqueues appear to succeed immediately
//! (optimistic durability), and all failure information surfaces as drain
//! counters or dead-letter diagnostics.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kcal_sync_core::{OperationId, OperationKind, QueuedOperation};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::coalesce::{InvalidationCoalescer, LoggingRefreshSink, RefreshSink};
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, SubscriptionId};
use crate::engine::{DrainReport, SyncEngine};
use crate::error::{Result, SyncError};
use crate::queue::{DeadLetter, PersistentQueue};
use crate::remote::{HttpRemoteWriter, RemoteWriter};
use crate::store::{JsonFileStore, QueueStore};

/// Builder for constructing a [`SyncService`].
pub struct SyncServiceBuilder {
	base_url: Option<String>,
	auth_token: Option<String>,
	queue_path: Option<PathBuf>,
	initially_reachable: bool,
	config: SyncConfig,
	store: Option<Arc<dyn QueueStore>>,
	remote: Option<Arc<dyn RemoteWriter>>,
	sink: Option<Arc<dyn RefreshSink>>,
}

impl SyncServiceBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			base_url: None,
			auth_token: None,
			queue_path: None,
			initially_reachable: true,
			config: SyncConfig::default(),
			store: None,
			remote: None,
			sink: None,
		}
	}

	/// Sets the base URL of the kcal backend.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Sets the bearer token used for remote writes.
	pub fn auth_token(mut self, token: impl Into<String>) -> Self {
		self.auth_token = Some(token.into());
		self
	}

	/// Sets the path of the durable queue document.
	pub fn queue_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.queue_path = Some(path.into());
		self
	}

	/// Seeds the connectivity monitor with the platform's current state.
	pub fn initially_reachable(mut self, reachable: bool) -> Self {
		self.initially_reachable = reachable;
		self
	}

	/// Overrides the tuning knobs.
	pub fn config(mut self, config: SyncConfig) -> Self {
		self.config = config;
		self
	}

	/// Injects a durable store, replacing the file-backed default.
	pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Injects a remote writer, replacing the HTTP default.
	pub fn remote_writer(mut self, remote: Arc<dyn RemoteWriter>) -> Self {
		self.remote = Some(remote);
		self
	}

	/// Injects the cache-refresh sink invoked by coalesced invalidations.
	pub fn refresh_sink(mut self, sink: Arc<dyn RefreshSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Builds the service: loads the durable queue and wires the
	/// connectivity-transition drain trigger.
	pub async fn build(self) -> Result<SyncService> {
		let store = match self.store {
			Some(store) => store,
			None => {
				let path = self.queue_path.ok_or(SyncError::MissingQueuePath)?;
				Arc::new(JsonFileStore::new(path)) as Arc<dyn QueueStore>
			}
		};

		let remote = match self.remote {
			Some(remote) => remote,
			None => {
				let base_url = self.base_url.ok_or(SyncError::InvalidBaseUrl)?;
				let auth_token = self.auth_token.ok_or(SyncError::MissingAuthToken)?;
				Arc::new(HttpRemoteWriter::new(
					base_url,
					auth_token,
					self.config.request_timeout,
				)?) as Arc<dyn RemoteWriter>
			}
		};

		let sink = self
			.sink
			.unwrap_or_else(|| Arc::new(LoggingRefreshSink) as Arc<dyn RefreshSink>);

		let queue = Arc::new(
			PersistentQueue::load(
				store,
				self.config.max_retries,
				self.config.dead_letter_capacity,
			)
			.await,
		);
		let monitor = Arc::new(ConnectivityMonitor::new(self.initially_reachable));
		let coalescer = InvalidationCoalescer::new(sink, self.config.debounce_delay);
		let engine = Arc::new(SyncEngine::new(
			Arc::clone(&queue),
			remote,
			Arc::clone(&monitor),
			coalescer.clone(),
		));

		// Fire-and-forget drain on every offline-to-online transition.
		// The immediate invocation at subscribe time is not a transition
		// and is skipped.
		let engine_for_trigger = Arc::clone(&engine);
		let first_call = AtomicBool::new(true);
		let drain_trigger = monitor.subscribe(move |reachable| {
			if first_call.swap(false, Ordering::SeqCst) {
				return;
			}
			if reachable {
				let engine = Arc::clone(&engine_for_trigger);
				tokio::spawn(async move {
					let report = engine.drain().await;
					debug!(
						succeeded = report.succeeded,
						failed = report.failed,
						"Connectivity-triggered drain finished"
					);
				});
			}
		});

		info!(
			pending = queue.len().await,
			reachable = monitor.is_reachable(),
			"Sync service initialized"
		);

		Ok(SyncService {
			inner: Arc::new(SyncServiceInner {
				queue,
				monitor,
				engine,
				coalescer,
				drain_trigger,
				closed: AtomicBool::new(false),
			}),
		})
	}
}

impl Default for SyncServiceBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct SyncServiceInner {
	queue: Arc<PersistentQueue>,
	monitor: Arc<ConnectivityMonitor>,
	engine: Arc<SyncEngine>,
	coalescer: InvalidationCoalescer,
	drain_trigger: SubscriptionId,
	closed: AtomicBool,
}

/// Handle to the offline sync subsystem.
///
/// # Example
///
/// ```ignore
/// let sync = SyncService::builder()
///     .base_url("https://api.kcal.app")
///     .auth_token(token)
///     .queue_path(data_dir.join("pending-writes.json"))
///     .initially_reachable(platform::is_online())
///     .build()
///     .await?;
///
/// // A diary write made while offline:
/// let id = sync.add_to_queue(OperationKind::Diary, entry_json).await;
///
/// // Later, from the manual-retry UI:
/// let report = sync.force_sync().await;
/// ```
#[derive(Clone)]
pub struct SyncService {
	inner: Arc<SyncServiceInner>,
}

impl SyncService {
	/// Creates a new builder for constructing a SyncService.
	pub fn builder() -> SyncServiceBuilder {
		SyncServiceBuilder::new()
	}

	/// Durably enqueues a pending remote write and returns immediately.
	///
	/// Never fails: after shutdown the record is created but neither
	/// persisted nor synced, and the situation is logged.
	pub async fn add_to_queue(
		&self,
		kind: OperationKind,
		payload: serde_json::Value,
	) -> OperationId {
		if self.inner.closed.load(Ordering::SeqCst) {
			let orphan = QueuedOperation::new(kind, payload);
			warn!(id = %orphan.id, %kind, "Enqueue after shutdown, operation dropped");
			return orphan.id;
		}
		self.inner.queue.enqueue(kind, payload).await
	}

	/// Number of pending operations.
	pub async fn queue_count(&self) -> usize {
		self.inner.queue.len().await
	}

	/// Read-only copy of the pending operations in enqueue order.
	pub async fn queue_snapshot(&self) -> Vec<QueuedOperation> {
		self.inner.queue.snapshot().await
	}

	/// Explicit drain trigger, for the manual-retry UI and tests.
	pub async fn force_sync(&self) -> DrainReport {
		if self.inner.closed.load(Ordering::SeqCst) {
			return DrainReport::default();
		}
		self.inner.engine.drain().await
	}

	/// Current reachability.
	pub fn is_reachable(&self) -> bool {
		self.inner.monitor.is_reachable()
	}

	/// Feeds a reachability reading from the platform layer.
	pub fn set_reachable(&self, reachable: bool) {
		self.inner.monitor.set_reachable(reachable);
	}

	/// Connectivity subscription: the callback runs once immediately with
	/// the current status, then on every transition.
	pub fn on_status_change(
		&self,
		callback: impl Fn(bool) + Send + Sync + 'static,
	) -> SubscriptionId {
		self.inner.monitor.subscribe(callback)
	}

	/// Deregisters a connectivity subscription; idempotent.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		self.inner.monitor.unsubscribe(id);
	}

	/// Records a cache-invalidation intent, debounced with all others.
	pub async fn invalidate(&self, resource_key: impl Into<String>, scope: impl Into<String>) {
		self.inner.coalescer.invalidate(resource_key, scope).await;
	}

	/// Immediate, non-batched cache refresh for latency-sensitive views.
	pub async fn invalidate_now(&self, resource_key: &str, scope: impl Into<String>) {
		self.inner.coalescer.invalidate_now(resource_key, scope).await;
	}

	/// Subscribes to dead-letter diagnostics.
	pub fn subscribe_dead_letters(&self) -> broadcast::Receiver<DeadLetter> {
		self.inner.queue.subscribe_dead_letters()
	}

	/// Disposes the service: unregisters the drain trigger and cancels
	/// any pending invalidation flush. Idempotent.
	pub fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.monitor.unsubscribe(self.inner.drain_trigger);
		self.inner.coalescer.shutdown();
		info!("Sync service shutdown");
	}

	/// Returns true if the service has been shut down.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}
