// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the sync runtime.

use std::time::Duration;

/// Retry budget before an operation is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay after the most recent invalidation before batches flush.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Tuning knobs for the sync runtime.
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Failed replay attempts allowed before dead-lettering.
	pub max_retries: u32,
	/// Debounce window for coalesced cache invalidation.
	pub debounce_delay: Duration,
	/// Timeout for remote write requests.
	pub request_timeout: Duration,
	/// Capacity of the dead-letter diagnostics channel.
	pub dead_letter_capacity: usize,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			debounce_delay: DEFAULT_DEBOUNCE_DELAY,
			request_timeout: Duration::from_secs(30),
			dead_letter_capacity: 16,
		}
	}
}
