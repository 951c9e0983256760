// SPDX-License-Identifier: GPL-3.0-only

//! Capture upload to the predict route

use super::{ApiBase, HttpTransport, MultipartPayload, ServerResponse};
use crate::constants::{api::PREDICT_ROUTE, upload};
use crate::errors::UploadError;
use crate::storage::{Artifact, Filesystem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Multipart layout of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadForm {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            field_name: upload::FIELD_NAME.to_string(),
            file_name: upload::FILE_NAME.to_string(),
            content_type: upload::CONTENT_TYPE.to_string(),
        }
    }
}

/// Submits artifacts to the classifier
///
/// Exactly one attempt per call. The next capture is the retry.
pub struct UploadClient {
    transport: Arc<dyn HttpTransport>,
    fs: Arc<dyn Filesystem>,
    endpoint: String,
    form: UploadForm,
}

impl UploadClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        fs: Arc<dyn Filesystem>,
        base: &ApiBase,
        form: UploadForm,
    ) -> Self {
        Self {
            transport,
            fs,
            endpoint: base.route(PREDICT_ROUTE),
            form,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Encode `artifact` as multipart form data and POST it
    pub async fn submit(&self, artifact: &Artifact) -> Result<ServerResponse, UploadError> {
        let bytes = self.fs.read(&artifact.path).await.map_err(|e| {
            UploadError::Payload(format!("cannot read {}: {}", artifact.path.display(), e))
        })?;
        if bytes.is_empty() {
            return Err(UploadError::Payload(format!(
                "{} is empty",
                artifact.path.display()
            )));
        }

        debug!(
            path = %artifact.path.display(),
            bytes = bytes.len(),
            endpoint = %self.endpoint,
            "Uploading capture"
        );

        let payload = MultipartPayload {
            field_name: self.form.field_name.clone(),
            file_name: self.form.file_name.clone(),
            content_type: self.form.content_type.clone(),
            bytes,
        };

        let response = self.transport.post_multipart(&self.endpoint, payload).await?;
        info!(
            status = response.status,
            intruder = ?response.is_intruder(),
            "Upload accepted"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadClient")
            .field("endpoint", &self.endpoint)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}
