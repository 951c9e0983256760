// SPDX-License-Identifier: GPL-3.0-only

//! reqwest-backed HTTP transport

use super::{HttpTransport, MultipartPayload, ServerResponse, parse_response};
use crate::constants::user_agent;
use crate::errors::UploadError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

/// [`HttpTransport`] over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| UploadError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<ServerResponse, UploadError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Received HTTP response");
        parse_response(status, &body)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_multipart(
        &self,
        url: &str,
        payload: MultipartPayload,
    ) -> Result<ServerResponse, UploadError> {
        let size = payload.bytes.len();
        let part = Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.content_type)
            .map_err(|e| UploadError::Payload(format!("invalid content type: {}", e)))?;
        let form = Form::new().part(payload.field_name, part);

        debug!(url, bytes = size, "Posting multipart form");
        let response = self.client.post(url).multipart(form).send().await?;
        Self::read(response).await
    }

    async fn get_json(&self, url: &str) -> Result<ServerResponse, UploadError> {
        debug!(url, "Fetching JSON");
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }
}
