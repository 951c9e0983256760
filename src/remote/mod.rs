// SPDX-License-Identifier: GPL-3.0-only

//! Remote classifier API
//!
//! - [`upload`]: multipart submission of captures to the predict route
//! - [`reports`]: listing of past classifications
//! - [`transport`]: the reqwest-backed [`HttpTransport`]

pub mod reports;
pub mod transport;
pub mod upload;

pub use reports::{Report, ReportsClient};
pub use transport::ReqwestTransport;
pub use upload::{UploadClient, UploadForm};

use crate::errors::{ConfigError, UploadError};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

/// Longest server body kept in an error
const MAX_ERROR_BODY: usize = 512;

/// Validated server base URL
///
/// Stored without a trailing slash so routes can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    base: String,
}

impl ApiBase {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("'{}': {}", trimmed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "'{}': scheme must be http or https",
                trimmed
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidBaseUrl(format!("'{}': missing host", trimmed)));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "'{}': must not carry a query or fragment",
                trimmed
            )));
        }

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Absolute URL of an API route such as `/api/predict/`
    pub fn route(&self, route: &str) -> String {
        format!("{}/{}", self.base, route.trim_start_matches('/'))
    }
}

impl std::fmt::Display for ApiBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}

/// Parsed reply of the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub status: u16,
    pub body: Value,
}

impl ServerResponse {
    /// The classifier's verdict, when the body carries one
    pub fn is_intruder(&self) -> Option<bool> {
        self.body.get("is_intruder").and_then(Value::as_bool)
    }
}

/// One file sent as multipart form data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPayload {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// HTTP seam used by the upload and reports clients
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a single-file multipart form and parse the JSON reply
    async fn post_multipart(
        &self,
        url: &str,
        payload: MultipartPayload,
    ) -> Result<ServerResponse, UploadError>;

    /// GET a URL and parse the JSON reply
    async fn get_json(&self, url: &str) -> Result<ServerResponse, UploadError>;
}

/// Map a raw HTTP reply onto the upload error taxonomy
pub fn parse_response(status: u16, body: &str) -> Result<ServerResponse, UploadError> {
    if !(200..300).contains(&status) {
        return Err(UploadError::Server {
            status,
            body: truncate(body),
        });
    }

    let body = serde_json::from_str(body)
        .map_err(|e| UploadError::InvalidResponse(format!("{} in '{}'", e, truncate(body))))?;
    Ok(ServerResponse { status, body })
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_normalizes_trailing_slash() {
        let base = ApiBase::parse("http://192.168.1.20:8000/").unwrap();
        assert_eq!(base.as_str(), "http://192.168.1.20:8000");
        assert_eq!(base.route("/api/predict/"), "http://192.168.1.20:8000/api/predict/");

        let prefixed = ApiBase::parse("https://example.org/intruder/").unwrap();
        assert_eq!(prefixed.route("/api/reports/"), "https://example.org/intruder/api/reports/");
    }

    #[test]
    fn test_api_base_rejects_malformed() {
        assert!(ApiBase::parse("not a url").is_err());
        assert!(ApiBase::parse("ftp://example.org").is_err());
        assert!(ApiBase::parse("http://example.org/?x=1").is_err());
        assert!(ApiBase::parse("").is_err());
    }

    #[test]
    fn test_parse_response_status_mapping() {
        let ok = parse_response(201, r#"{"is_intruder": true}"#).unwrap();
        assert_eq!(ok.is_intruder(), Some(true));

        assert_eq!(
            parse_response(500, "boom"),
            Err(UploadError::Server {
                status: 500,
                body: "boom".into()
            })
        );
        assert!(matches!(
            parse_response(200, "<html>"),
            Err(UploadError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let long = "x".repeat(MAX_ERROR_BODY * 2);
        let Err(UploadError::Server { body, .. }) = parse_response(502, &long) else {
            panic!("expected server error");
        };
        assert_eq!(body.len(), MAX_ERROR_BODY + 3);
    }
}
