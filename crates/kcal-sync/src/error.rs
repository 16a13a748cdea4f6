// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sync runtime.
//!
//! Failures inside the core never cross the public queue API; they are
//! logged and surfaced only as drain counters or dead-letter diagnostics.
//! These types exist for the internal seams (store, remote writer,
//! refresh sink) and for callers that inject their own implementations.

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in the sync runtime.
#[derive(Debug, Error)]
pub enum SyncError {
	/// Base URL is missing or invalid.
	#[error("invalid base URL")]
	InvalidBaseUrl,

	/// No durable queue path was configured.
	#[error("queue path is required")]
	MissingQueuePath,

	/// No auth token was configured for the remote writer.
	#[error("auth token is required")]
	MissingAuthToken,

	/// The durable store could not be read or written.
	#[error("queue storage error: {0}")]
	Storage(#[from] std::io::Error),

	/// HTTP request failed in transport.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned a non-success response.
	#[error("server error (status {status}): {message}")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Error message from the server.
		message: String,
	},

	/// A queued payload could not be interpreted for replay.
	#[error("invalid payload for {kind} operation: {message}")]
	InvalidPayload {
		/// Operation kind tag.
		kind: String,
		/// What was wrong with the payload.
		message: String,
	},

	/// Serialization of the durable document failed.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
