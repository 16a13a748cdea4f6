// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the kcal offline sync subsystem.
//!
//! This crate provides the shared types for the offline durability layer:
//! queued operation records, operation kinds, the durable document layout,
//! and payload encoding for image-bearing analysis submissions. It is used
//! by the sync runtime (`kcal-sync`) and by any app layer that needs to
//! inspect queued writes.

pub mod error;
pub mod operation;
pub mod payload;

pub use error::{CoreError, Result};
pub use operation::{OperationId, OperationKind, QueuedOperation};
pub use payload::AnalysisPayload;
