// SPDX-License-Identifier: GPL-3.0-only

//! Camera authorization
//!
//! [`PermissionGate`] owns the authorization state seen by the capture
//! pipeline. The state only changes through an explicit request: the
//! scheduler asks once when it starts, and the user can ask again with
//! [`PermissionGate::retry`]. A request that fails counts as a denial.

use crate::errors::PermissionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Camera authorization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Never asked
    #[default]
    Unknown,
    Denied,
    Granted,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Unknown => write!(f, "unknown"),
            PermissionState::Denied => write!(f, "denied"),
            PermissionState::Granted => write!(f, "granted"),
        }
    }
}

/// Host-specific way of asking for camera access
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current state without prompting
    fn status(&self) -> PermissionState;

    /// Ask for access; may suspend while the host shows a prompt
    async fn request(&self) -> Result<PermissionState, PermissionError>;
}

/// Tracks the authorization state for the pipeline
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    state: watch::Sender<PermissionState>,
    /// Serializes prompts so concurrent callers never show two
    request_lock: Mutex<()>,
}

impl PermissionGate {
    /// Create a gate seeded from the provider's non-prompting status
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        let initial = provider.status();
        debug!(state = %initial, "Seeded camera permission state");
        let (state, _) = watch::channel(initial);
        Self {
            provider,
            state,
            request_lock: Mutex::new(()),
        }
    }

    /// Non-blocking read of the current state
    pub fn current_state(&self) -> PermissionState {
        *self.state.borrow()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.state.subscribe()
    }

    /// Request access unless a decision was already made
    ///
    /// Returns immediately when the state is `Granted` or `Denied`.
    pub async fn request_if_needed(&self) -> PermissionState {
        if self.current_state() != PermissionState::Unknown {
            return self.current_state();
        }

        let _guard = self.request_lock.lock().await;
        // Another caller may have finished while we waited
        if self.current_state() != PermissionState::Unknown {
            return self.current_state();
        }

        self.ask().await
    }

    /// User-initiated re-request, the only way out of `Denied`
    pub async fn retry(&self) -> PermissionState {
        let _guard = self.request_lock.lock().await;
        if self.current_state().is_granted() {
            return PermissionState::Granted;
        }

        info!("Retrying camera permission request");
        self.ask().await
    }

    async fn ask(&self) -> PermissionState {
        let state = match self.provider.request().await {
            Ok(PermissionState::Unknown) => {
                warn!("Permission request returned no decision, treating as denied");
                PermissionState::Denied
            }
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Permission request failed, treating as denied");
                PermissionState::Denied
            }
        };

        info!(state = %state, "Camera permission decided");
        self.state.send_replace(state);
        state
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}

/// Fixed answers, for sources that need no authorization
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    status: PermissionState,
    answer: PermissionState,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self {
            status: PermissionState::Granted,
            answer: PermissionState::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            status: PermissionState::Denied,
            answer: PermissionState::Denied,
        }
    }

    /// Starts `Unknown` and answers the first request with `answer`
    pub fn prompting(answer: PermissionState) -> Self {
        Self {
            status: PermissionState::Unknown,
            answer,
        }
    }
}

#[async_trait]
impl PermissionProvider for StaticPermission {
    fn status(&self) -> PermissionState {
        self.status
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        Ok(self.answer)
    }
}

/// Linux access check on V4L2 device nodes
///
/// The camera counts as authorized when a node can be opened read/write.
/// Access on Linux is granted through the `video` group or a logind ACL, so
/// there is no prompt: a request checks the nodes again.
#[derive(Debug, Clone)]
pub struct DeviceNodePermission {
    dev_dir: PathBuf,
    nodes: Vec<PathBuf>,
}

impl Default for DeviceNodePermission {
    fn default() -> Self {
        Self::scanning(Path::new("/dev"))
    }
}

impl DeviceNodePermission {
    /// Check every `videoN` node found in `dev_dir`
    pub fn scanning(dev_dir: &Path) -> Self {
        Self {
            dev_dir: dev_dir.to_path_buf(),
            nodes: Vec::new(),
        }
    }

    /// Check only the given nodes
    pub fn for_nodes(nodes: Vec<PathBuf>) -> Self {
        Self {
            dev_dir: PathBuf::new(),
            nodes,
        }
    }

    fn candidate_nodes(&self) -> Vec<PathBuf> {
        if !self.nodes.is_empty() {
            return self.nodes.clone();
        }

        let Ok(entries) = std::fs::read_dir(&self.dev_dir) else {
            return Vec::new();
        };

        let mut nodes: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("video"))
                    .is_some_and(|index| {
                        !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())
                    })
            })
            .map(|entry| entry.path())
            .collect();
        nodes.sort();
        nodes
    }

    /// `None` when there is nothing to check
    fn check_nodes(&self) -> Option<PermissionState> {
        let nodes = self.candidate_nodes();
        if nodes.is_empty() {
            return None;
        }

        let mut denied = false;
        for node in &nodes {
            match std::fs::OpenOptions::new().read(true).write(true).open(node) {
                Ok(_) => {
                    debug!(path = %node.display(), "Camera node accessible");
                    return Some(PermissionState::Granted);
                }
                Err(e) if is_access_denied(&e) => {
                    debug!(path = %node.display(), "Camera node not accessible");
                    denied = true;
                }
                Err(e) => {
                    debug!(path = %node.display(), error = %e, "Camera node check failed");
                }
            }
        }

        Some(if denied {
            PermissionState::Denied
        } else {
            PermissionState::Unknown
        })
    }
}

#[async_trait]
impl PermissionProvider for DeviceNodePermission {
    fn status(&self) -> PermissionState {
        self.check_nodes().unwrap_or(PermissionState::Unknown)
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        let gate = self.clone();
        let state = tokio::task::spawn_blocking(move || gate.check_nodes())
            .await
            .map_err(|e| PermissionError::RequestFailed(e.to_string()))?;

        match state {
            // No node to protect; device lookup reports the absence instead
            None => Ok(PermissionState::Granted),
            Some(PermissionState::Denied) => Err(PermissionError::Denied),
            Some(PermissionState::Unknown) => Err(PermissionError::RequestFailed(
                "no camera node could be opened".to_string(),
            )),
            Some(PermissionState::Granted) => Ok(PermissionState::Granted),
        }
    }
}

fn is_access_denied(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::PermissionDenied
}
