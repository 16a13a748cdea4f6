// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Offline durability and synchronization runtime for the kcal client.
//!
//! Writes made while the device is unreachable (or that the caller asks to
//! durably enqueue) become [`QueuedOperation`](kcal_sync_core::QueuedOperation)
//! records in a persistent, strictly ordered queue. When connectivity
//! returns, the sync engine drains the queue sequentially against the
//! remote service with a bounded retry budget and dead-letters operations
//! that exhaust it. Cache-refresh signals produced by successful syncs are
//! debounced through a single shared timer so a burst of replayed writes
//! does not storm the read layer.
//!
//! The subsystem targets at-least-once delivery: an operation is removed
//! from the queue only after its remote write is confirmed, so a crash
//! between confirmation and removal replays it on the next drain.

pub mod coalesce;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod queue;
pub mod remote;
pub mod service;
pub mod store;

pub use coalesce::{InvalidationCoalescer, LoggingRefreshSink, RefreshSink};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, SubscriptionId};
pub use engine::{DrainReport, SyncEngine};
pub use error::{Result, SyncError};
pub use queue::{DeadLetter, PersistentQueue};
pub use remote::{HttpRemoteWriter, RemoteWriter};
pub use service::{SyncService, SyncServiceBuilder};
pub use store::{JsonFileStore, QueueStore};
