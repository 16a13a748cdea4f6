// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Replays pending operations against the remote service.
//!
//! One drain runs at a time: the in-progress flag is checked and set
//! before any asynchronous work begins, and a drain request that arrives
//! while one is active is dropped rather than queued (the next trigger
//! picks up anything new). Within a pass, entries are attempted strictly
//! sequentially in enqueue order; a failing entry never blocks the rest.
//!
//! An entry is removed only after its remote write is confirmed, so a
//! crash between confirmation and removal replays it later: at-least-once
//! delivery, with deduplication left to the remote side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coalesce::InvalidationCoalescer;
use crate::connectivity::ConnectivityMonitor;
use crate::queue::PersistentQueue;
use crate::remote::RemoteWriter;

/// Scope hint attached to invalidations produced by replayed writes.
const SYNC_SCOPE: &str = "sync";

/// Aggregate outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
	/// Operations confirmed remotely and removed from the queue.
	pub succeeded: usize,
	/// Operations that failed this pass and stay queued (or were
	/// dead-lettered on exhausting their budget).
	pub failed: usize,
}

/// Drains the persistent queue against the remote service.
pub struct SyncEngine {
	queue: Arc<PersistentQueue>,
	remote: Arc<dyn RemoteWriter>,
	monitor: Arc<ConnectivityMonitor>,
	coalescer: InvalidationCoalescer,
	draining: AtomicBool,
}

impl SyncEngine {
	pub fn new(
		queue: Arc<PersistentQueue>,
		remote: Arc<dyn RemoteWriter>,
		monitor: Arc<ConnectivityMonitor>,
		coalescer: InvalidationCoalescer,
	) -> Self {
		Self {
			queue,
			remote,
			monitor,
			coalescer,
			draining: AtomicBool::new(false),
		}
	}

	/// Runs one drain pass and returns the aggregate counts.
	///
	/// A no-op (zero report) when a drain is already active, the network
	/// is unreachable, or the queue is empty.
	pub async fn drain(&self) -> DrainReport {
		// Claim the flag before any await so two drains can never overlap.
		if self
			.draining
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			debug!("Drain already in progress, dropping request");
			return DrainReport::default();
		}

		if !self.monitor.is_reachable() {
			debug!("Unreachable, skipping drain");
			self.draining.store(false, Ordering::SeqCst);
			return DrainReport::default();
		}

		let snapshot = self.queue.snapshot().await;
		if snapshot.is_empty() {
			self.draining.store(false, Ordering::SeqCst);
			return DrainReport::default();
		}

		info!(pending = snapshot.len(), "Drain started");
		let mut report = DrainReport::default();

		for operation in &snapshot {
			match self.remote.write(operation).await {
				Ok(()) => {
					self.queue.remove(operation.id).await;
					report.succeeded += 1;
					self
						.coalescer
						.invalidate(operation.kind.resource_key(), SYNC_SCOPE)
						.await;
				}
				Err(e) => {
					warn!(
						id = %operation.id,
						kind = %operation.kind,
						error = %e,
						"Replay failed, will retry"
					);
					self.queue.increment_retry(operation.id).await;
					report.failed += 1;
				}
			}
		}

		self.draining.store(false, Ordering::SeqCst);
		info!(
			succeeded = report.succeeded,
			failed = report.failed,
			"Drain finished"
		);
		report
	}

	/// Whether a drain pass is currently active.
	pub fn is_draining(&self) -> bool {
		self.draining.load(Ordering::SeqCst)
	}
}
