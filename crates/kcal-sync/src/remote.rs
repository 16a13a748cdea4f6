// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote write dispatch for queued operations.
//!
//! Diary entries are replayed verbatim as structured create calls;
//! analysis submissions reconstruct the image blob from the stored
//! encoded payload and post it as multipart. Transport errors and
//! non-success responses are reported through the same error type: the
//! drain loop treats both as a retryable failure.

use std::time::Duration;

use async_trait::async_trait;
use kcal_sync_core::{AnalysisPayload, OperationKind, QueuedOperation};
use reqwest::Client;
use tracing::{debug, error};

use crate::error::{Result, SyncError};

/// User-Agent for identification.
const USER_AGENT: &str = concat!("kcal-sync/", env!("CARGO_PKG_VERSION"));

/// Dispatches one queued operation against the remote service.
#[async_trait]
pub trait RemoteWriter: Send + Sync {
	/// Replays the operation; `Ok(())` means the write is confirmed.
	async fn write(&self, operation: &QueuedOperation) -> Result<()>;
}

/// HTTP implementation of [`RemoteWriter`] against the kcal backend.
pub struct HttpRemoteWriter {
	http_client: Client,
	base_url: String,
	auth_token: String,
}

impl HttpRemoteWriter {
	/// Creates a writer for the given backend.
	pub fn new(
		base_url: impl Into<String>,
		auth_token: impl Into<String>,
		request_timeout: Duration,
	) -> Result<Self> {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		let http_client = Client::builder()
			.user_agent(USER_AGENT)
			.timeout(request_timeout)
			.build()
			.map_err(SyncError::RequestFailed)?;
		Ok(Self {
			http_client,
			base_url,
			auth_token: auth_token.into(),
		})
	}

	async fn write_diary(&self, operation: &QueuedOperation) -> Result<()> {
		let url = format!("{}/api/diary/entries", self.base_url);
		debug!(url = %url, id = %operation.id, "Replaying diary entry");

		let response = self
			.http_client
			.post(&url)
			.header("Authorization", format!("Bearer {}", self.auth_token))
			.json(&operation.payload)
			.send()
			.await?;
		Self::check_status(response).await
	}

	async fn write_analysis(&self, operation: &QueuedOperation) -> Result<()> {
		let payload =
			AnalysisPayload::from_value(&operation.payload).map_err(|e| SyncError::InvalidPayload {
				kind: operation.kind.to_string(),
				message: e.to_string(),
			})?;
		let image = payload.image_bytes().map_err(|e| SyncError::InvalidPayload {
			kind: operation.kind.to_string(),
			message: e.to_string(),
		})?;

		let part = reqwest::multipart::Part::bytes(image)
			.file_name(payload.file_name.clone())
			.mime_str(&payload.content_type)
			.map_err(|e| SyncError::InvalidPayload {
				kind: operation.kind.to_string(),
				message: e.to_string(),
			})?;
		let form = reqwest::multipart::Form::new().part("image", part);

		let url = format!("{}/api/analysis/submissions", self.base_url);
		debug!(url = %url, id = %operation.id, file_name = %payload.file_name, "Replaying analysis submission");

		let response = self
			.http_client
			.post(&url)
			.header("Authorization", format!("Bearer {}", self.auth_token))
			.multipart(form)
			.send()
			.await?;
		Self::check_status(response).await
	}

	async fn check_status(response: reqwest::Response) -> Result<()> {
		if response.status().is_success() {
			return Ok(());
		}
		let status = response.status().as_u16();
		let message = response.text().await.unwrap_or_default();
		error!(status, message = %message, "Remote write rejected");
		Err(SyncError::Server { status, message })
	}
}

#[async_trait]
impl RemoteWriter for HttpRemoteWriter {
	async fn write(&self, operation: &QueuedOperation) -> Result<()> {
		match operation.kind {
			OperationKind::Diary => self.write_diary(operation).await,
			OperationKind::Analysis => self.write_analysis(operation).await,
		}
	}
}
