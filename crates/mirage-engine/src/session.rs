//! File-backed store for opaque browser authentication state.
//!
//! The file is read once at process start and written once at shutdown.
//! Loss or staleness degrades every request to the unauthenticated path;
//! it never crashes the process unless the profile requires
//! pre-authentication.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<f64>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
}

/// Serialized browser authentication state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<Cookie>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// The domain this state is scoped to, taken from its first
    /// domain-carrying cookie.
    pub fn domain_scope(&self) -> Option<&str> {
        self.cookies.iter().find_map(|c| c.domain.as_deref())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse session file: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub async fn load(&self) -> Result<SessionState, SessionError> {
        if !self.path.exists() {
            return Err(SessionError::Missing(self.path.clone()));
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let state: SessionState = serde_json::from_str(&content)?;
        info!(
            "loaded {} cookies from {}",
            state.cookies.len(),
            self.path.display()
        );
        Ok(state)
    }

    pub async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, content).await?;
        info!(
            "saved {} cookies to {}",
            state.cookies.len(),
            self.path.display()
        );
        Ok(())
    }
}
