// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Debounced coalescing of cache-invalidation traffic.
//!
//! Local mutations and successful syncs report refresh intents here.
//! Intents accumulate into per-resource batches, but one timer is shared
//! across the whole coalescer: any request on any resource resets it, and
//! when a full debounce window passes with no new requests, every pending
//! batch flushes as exactly one refresh per resource.
//!
//! The shared reset-on-arrival timer means a sustained stream of requests
//! can defer flushing indefinitely; [`InvalidationCoalescer::invalidate_now`]
//! is the escape hatch for call sites that cannot tolerate staleness.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives the coalesced refresh signals.
#[async_trait::async_trait]
pub trait RefreshSink: Send + Sync {
	/// Issues one refresh scoped to the resource key, collapsing the
	/// accumulated scope hints.
	async fn refresh(&self, resource_key: &str, scopes: &[String]) -> crate::error::Result<()>;
}

/// Default sink that only logs refresh signals.
///
/// The app layer normally injects a sink that re-fetches its read caches;
/// this stands in until one is registered.
#[derive(Debug, Default)]
pub struct LoggingRefreshSink;

#[async_trait::async_trait]
impl RefreshSink for LoggingRefreshSink {
	async fn refresh(&self, resource_key: &str, scopes: &[String]) -> crate::error::Result<()> {
		tracing::info!(resource_key = %resource_key, scopes = ?scopes, "Cache refresh");
		Ok(())
	}
}

/// A pending refresh intent for one resource.
#[derive(Debug, Default)]
struct InvalidationBatch {
	scopes: BTreeSet<String>,
	last_touched_at: Option<DateTime<Utc>>,
}

struct CoalescerInner {
	sink: Arc<dyn RefreshSink>,
	delay: Duration,
	batches: Mutex<BTreeMap<String, InvalidationBatch>>,
	// At most one outstanding flush timer for the whole coalescer.
	timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Batches and debounces cache-refresh signals.
#[derive(Clone)]
pub struct InvalidationCoalescer {
	inner: Arc<CoalescerInner>,
}

impl InvalidationCoalescer {
	pub fn new(sink: Arc<dyn RefreshSink>, delay: Duration) -> Self {
		Self {
			inner: Arc::new(CoalescerInner {
				sink,
				delay,
				batches: Mutex::new(BTreeMap::new()),
				timer: std::sync::Mutex::new(None),
			}),
		}
	}

	/// Records a refresh intent and re-arms the shared timer a full
	/// debounce window from now.
	pub async fn invalidate(&self, resource_key: impl Into<String>, scope: impl Into<String>) {
		let resource_key = resource_key.into();
		{
			let mut batches = self.inner.batches.lock().await;
			let batch = batches.entry(resource_key.clone()).or_default();
			batch.scopes.insert(scope.into());
			batch.last_touched_at = Some(Utc::now());
		}
		debug!(resource_key = %resource_key, "Invalidation batched");
		self.arm_timer();
	}

	/// Bypasses batching entirely and refreshes right away, for resources
	/// where staleness is unacceptable. Pending batches are untouched.
	pub async fn invalidate_now(&self, resource_key: &str, scope: impl Into<String>) {
		let scopes = vec![scope.into()];
		debug!(resource_key = %resource_key, "Immediate invalidation");
		if let Err(e) = self.inner.sink.refresh(resource_key, &scopes).await {
			warn!(resource_key = %resource_key, error = %e, "Immediate refresh failed");
		}
	}

	/// Number of resources with a pending batch.
	pub async fn pending_len(&self) -> usize {
		self.inner.batches.lock().await.len()
	}

	/// When the resource's batch last received a request, if one is
	/// pending. Diagnostics only.
	pub async fn last_touched(&self, resource_key: &str) -> Option<DateTime<Utc>> {
		self
			.inner
			.batches
			.lock()
			.await
			.get(resource_key)
			.and_then(|batch| batch.last_touched_at)
	}

	/// Aborts any armed timer; pending batches are dropped unflushed.
	pub fn shutdown(&self) {
		let mut timer = self.inner.timer.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = timer.take() {
			handle.abort();
		}
	}

	fn arm_timer(&self) {
		let inner = Arc::clone(&self.inner);
		// Capture the deadline here, not inside the task: the window starts
		// at arm time, not whenever the scheduler first polls the task.
		let deadline = tokio::time::Instant::now() + inner.delay;
		let handle = tokio::spawn(async move {
			tokio::time::sleep_until(deadline).await;
			Self::flush_all(&inner).await;
		});

		let mut timer = self.inner.timer.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(previous) = timer.replace(handle) {
			previous.abort();
		}
	}

	async fn flush_all(inner: &Arc<CoalescerInner>) {
		{
			let mut timer = inner.timer.lock().unwrap_or_else(|e| e.into_inner());
			*timer = None;
		}
		let batches = {
			let mut batches = inner.batches.lock().await;
			std::mem::take(&mut *batches)
		};
		if batches.is_empty() {
			return;
		}

		debug!(resources = batches.len(), "Flushing invalidation batches");
		for (resource_key, batch) in batches {
			let scopes: Vec<String> = batch.scopes.into_iter().collect();
			if let Err(e) = inner.sink.refresh(&resource_key, &scopes).await {
				warn!(resource_key = %resource_key, error = %e, "Refresh failed");
			}
		}
	}
}
