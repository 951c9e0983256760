// SPDX-License-Identifier: GPL-3.0-only

//! Past classifications from the reports route
//!
//! The server builds image URLs from its own bind address, which is a loopback
//! host during development. Those URLs are moved onto the configured base URL
//! so they resolve from the capturing device.

use super::{ApiBase, HttpTransport};
use crate::constants::api::{LOOPBACK_HOSTS, REPORTS_ROUTE};
use crate::errors::UploadError;
use chrono::{DateTime, Local, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One classification stored by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    pub is_intruder: bool,
    pub created_at: DateTime<Utc>,
    /// Image URL, already rewritten onto the configured base
    pub image: String,
}

impl Report {
    pub fn created_local(&self) -> DateTime<Local> {
        self.created_at.with_timezone(&Local)
    }
}

/// Fetches the reports list
pub struct ReportsClient {
    transport: Arc<dyn HttpTransport>,
    base: ApiBase,
}

impl ReportsClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base: ApiBase) -> Self {
        Self { transport, base }
    }

    pub async fn fetch(&self) -> Result<Vec<Report>, UploadError> {
        let url = self.base.route(REPORTS_ROUTE);
        let response = self.transport.get_json(&url).await?;

        let mut reports: Vec<Report> = serde_json::from_value(response.body)
            .map_err(|e| UploadError::InvalidResponse(format!("unexpected reports layout: {}", e)))?;

        for report in &mut reports {
            report.image = rewrite_image_url(&report.image, &self.base);
        }

        info!(count = reports.len(), "Fetched reports");
        Ok(reports)
    }
}

/// Move a loopback or relative image URL onto `base`
///
/// `http://localhost:8000/media/x.jpg` becomes `{base}/media/x.jpg`. URLs on
/// any other host are returned unchanged.
pub fn rewrite_image_url(image: &str, base: &ApiBase) -> String {
    let rebase = |path_and_query: &str| {
        format!("{}/{}", base.as_str(), path_and_query.trim_start_matches('/'))
    };

    match Url::parse(image) {
        Ok(url) => {
            let loopback = url
                .host_str()
                .is_some_and(|host| LOOPBACK_HOSTS.contains(&host));
            if !loopback {
                return image.to_string();
            }

            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            let rewritten = rebase(&path);
            debug!(from = image, to = %rewritten, "Rewrote loopback image URL");
            rewritten
        }
        Err(_) if image.starts_with('/') => rebase(image),
        Err(_) => image.to_string(),
    }
}
