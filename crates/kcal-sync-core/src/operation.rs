// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queued operation records and the durable document layout.
//!
//! The durable store holds a single JSON document: an ordered list of
//! [`QueuedOperation`] records in enqueue order. Field names are part of
//! the on-disk format and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for a queued operation.
///
/// Assigned at enqueue time and never reused, including across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for OperationId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for OperationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for OperationId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Family of a queued operation, selecting its replay logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
	/// A structured diary-entry create call, replayed verbatim.
	Diary,
	/// A meal-photo analysis submission, replayed as a multipart upload.
	Analysis,
}

impl OperationKind {
	/// The invalidation resource family refreshed after this kind of
	/// write succeeds remotely.
	pub fn resource_key(&self) -> &'static str {
		match self {
			Self::Diary => "diary",
			Self::Analysis => "analysis",
		}
	}
}

impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Diary => write!(f, "diary"),
			Self::Analysis => write!(f, "analysis"),
		}
	}
}

impl FromStr for OperationKind {
	type Err = CoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"diary" => Ok(Self::Diary),
			"analysis" => Ok(Self::Analysis),
			other => Err(CoreError::UnknownKind(other.to_string())),
		}
	}
}

/// A durable record of one pending remote write.
///
/// The serialized field names (`id`, `kind`, `data`, `enqueuedAt`,
/// `retryCount`) are the on-disk document format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
	pub id: OperationId,
	pub kind: OperationKind,
	/// Opaque payload needed to replay the write.
	#[serde(rename = "data")]
	pub payload: serde_json::Value,
	/// Used only for ordering and diagnostics.
	#[serde(rename = "enqueuedAt")]
	pub enqueued_at: DateTime<Utc>,
	/// Failed replay attempts so far.
	#[serde(rename = "retryCount")]
	pub retry_count: u32,
}

impl QueuedOperation {
	/// Creates a fresh record with a new id and zero retries.
	pub fn new(kind: OperationKind, payload: serde_json::Value) -> Self {
		Self {
			id: OperationId::new(),
			kind,
			payload,
			enqueued_at: Utc::now(),
			retry_count: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_serializes_to_lowercase_tag() {
		assert_eq!(
			serde_json::to_string(&OperationKind::Diary).unwrap(),
			"\"diary\""
		);
		assert_eq!(
			serde_json::to_string(&OperationKind::Analysis).unwrap(),
			"\"analysis\""
		);
	}

	#[test]
	fn kind_parses_from_tag() {
		assert_eq!("diary".parse::<OperationKind>().unwrap(), OperationKind::Diary);
		assert_eq!(
			"analysis".parse::<OperationKind>().unwrap(),
			OperationKind::Analysis
		);
		assert!("breakfast".parse::<OperationKind>().is_err());
	}

	#[test]
	fn resource_keys_are_stable() {
		assert_eq!(OperationKind::Diary.resource_key(), "diary");
		assert_eq!(OperationKind::Analysis.resource_key(), "analysis");
	}

	#[test]
	fn operation_uses_document_field_names() {
		let op = QueuedOperation::new(
			OperationKind::Diary,
			serde_json::json!({"calories": 420}),
		);
		let value = serde_json::to_value(&op).unwrap();
		let obj = value.as_object().unwrap();
		assert!(obj.contains_key("id"));
		assert!(obj.contains_key("kind"));
		assert!(obj.contains_key("data"));
		assert!(obj.contains_key("enqueuedAt"));
		assert!(obj.contains_key("retryCount"));
	}

	#[test]
	fn operation_roundtrips_through_document_format() {
		let op = QueuedOperation::new(
			OperationKind::Analysis,
			serde_json::json!({"image_base64": "aGk=", "file_name": "meal.jpg"}),
		);
		let json = serde_json::to_string(&op).unwrap();
		let back: QueuedOperation = serde_json::from_str(&json).unwrap();
		assert_eq!(back.id, op.id);
		assert_eq!(back.kind, op.kind);
		assert_eq!(back.payload, op.payload);
		assert_eq!(back.retry_count, 0);
	}

	#[test]
	fn fresh_operations_have_unique_ids() {
		let a = QueuedOperation::new(OperationKind::Diary, serde_json::json!({}));
		let b = QueuedOperation::new(OperationKind::Diary, serde_json::json!({}));
		assert_ne!(a.id, b.id);
	}
}
