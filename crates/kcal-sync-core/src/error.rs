// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core sync types.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur when working with core sync types.
#[derive(Debug, Error)]
pub enum CoreError {
	/// An operation kind tag was not recognized.
	#[error("unknown operation kind: {0}")]
	UnknownKind(String),

	/// An analysis payload did not contain a decodable image.
	#[error("invalid image encoding: {0}")]
	InvalidImageEncoding(#[from] base64::DecodeError),

	/// A payload could not be serialized or deserialized.
	#[error("payload serialization error: {0}")]
	Payload(#[from] serde_json::Error),
}
