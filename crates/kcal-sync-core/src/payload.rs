// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed payloads for image-bearing analysis submissions.
//!
//! Diary payloads are replayed verbatim and stay opaque JSON. Analysis
//! payloads carry an encoded copy of the captured meal photo so the image
//! blob can be reconstructed for multipart upload after a restart.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Payload of a queued meal-photo analysis submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
	/// Base64-encoded image bytes.
	pub image_base64: String,
	/// Original file name, e.g. `meal.jpg`.
	pub file_name: String,
	/// MIME type of the image, e.g. `image/jpeg`.
	pub content_type: String,
}

impl AnalysisPayload {
	/// Builds a payload from raw image bytes, encoding them for durable
	/// storage.
	pub fn from_image_bytes(
		image: &[u8],
		file_name: impl Into<String>,
		content_type: impl Into<String>,
	) -> Self {
		Self {
			image_base64: BASE64.encode(image),
			file_name: file_name.into(),
			content_type: content_type.into(),
		}
	}

	/// Reconstructs the original image bytes from the stored encoding.
	pub fn image_bytes(&self) -> Result<Vec<u8>> {
		Ok(BASE64.decode(&self.image_base64)?)
	}

	/// Parses an analysis payload out of an opaque queued-operation value.
	pub fn from_value(value: &serde_json::Value) -> Result<Self> {
		Ok(serde_json::from_value(value.clone())?)
	}

	/// Converts the payload back into the opaque form stored in the queue.
	pub fn to_value(&self) -> Result<serde_json::Value> {
		Ok(serde_json::to_value(self)?)
	}
}
