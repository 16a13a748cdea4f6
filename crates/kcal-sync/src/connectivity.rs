// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single source of truth for network reachability.
//!
//! The platform layer feeds transitions in through [`ConnectivityMonitor::set_reachable`];
//! subscribers are notified synchronously, each isolated so one faulty
//! listener cannot break fan-out to the rest. The offline-to-online drain
//! trigger is an ordinary subscription wired up by the service facade.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

/// Token returned by [`ConnectivityMonitor::subscribe`], used to
/// deregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

/// Observes reachability transitions and fans them out to subscribers.
pub struct ConnectivityMonitor {
	reachable: AtomicBool,
	next_id: AtomicU64,
	listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ConnectivityMonitor {
	/// Creates a monitor seeded with the platform's current state.
	pub fn new(initially_reachable: bool) -> Self {
		Self {
			reachable: AtomicBool::new(initially_reachable),
			next_id: AtomicU64::new(0),
			listeners: Mutex::new(Vec::new()),
		}
	}

	/// Current reachability.
	pub fn is_reachable(&self) -> bool {
		self.reachable.load(Ordering::SeqCst)
	}

	/// Registers a listener, invoking it once immediately with the
	/// current status and then synchronously on every transition.
	pub fn subscribe(&self, listener: impl Fn(bool) + Send + Sync + 'static) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
		let listener: Listener = Arc::new(listener);
		{
			let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
			listeners.push((id, Arc::clone(&listener)));
		}
		Self::notify_one(id, &listener, self.is_reachable());
		id
	}

	/// Deregisters a listener; repeated calls with the same token are a
	/// no-op.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
		listeners.retain(|(listener_id, _)| *listener_id != id);
	}

	/// Feeds a reachability reading from the platform.
	///
	/// Only a genuine transition notifies subscribers; repeated readings
	/// of the same state are ignored.
	pub fn set_reachable(&self, reachable: bool) {
		let previous = self.reachable.swap(reachable, Ordering::SeqCst);
		if previous == reachable {
			return;
		}
		debug!(reachable, "Connectivity transition");

		// Invoke outside the lock so listeners may re-enter the registry.
		let snapshot: Vec<(SubscriptionId, Listener)> = {
			let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
			listeners.clone()
		};
		for (id, listener) in snapshot {
			Self::notify_one(id, &listener, reachable);
		}
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	fn notify_one(id: SubscriptionId, listener: &Listener, reachable: bool) {
		let result = catch_unwind(AssertUnwindSafe(|| listener(reachable)));
		if result.is_err() {
			error!(subscription = id.0, "Connectivity listener panicked, isolating");
		}
	}
}
