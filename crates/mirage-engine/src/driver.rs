use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::resolution::Locator;
use crate::session::SessionState;

/// Opaque handle to an element the driver has located.
///
/// Ids are scoped to one `PageDriver` and become stale when the page
/// re-renders; callers re-query rather than caching them across steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver is not ready")]
    NotReady,
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("page is closed")]
    Closed,
}

/// One browser process and one logical session (cookies, storage) for the
/// lifetime of the bot. Pages are opened per request and exclusively owned
/// by the request that opened them; the session itself is shared and must
/// be serialized by the caller.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn launch(&mut self) -> Result<(), DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;

    async fn is_ready(&self) -> bool;

    /// Apply previously captured authentication state to the session.
    async fn apply_session_state(&mut self, state: &SessionState) -> Result<(), DriverError>;

    /// Capture the session's current authentication state.
    async fn capture_session_state(&mut self) -> Result<SessionState, DriverError>;

    /// Open a new interaction surface against the shared session.
    async fn open_page(&mut self) -> Result<Box<dyn PageDriver>, DriverError>;
}

/// One page within a browser session. All methods are single operations
/// with no implicit waiting; retry and timeout policy live in the
/// resolution and polling layers above.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn page_url(&self) -> Result<String, DriverError>;

    /// Full page markup, used only for last-resort content sweeps.
    async fn content(&self) -> Result<String, DriverError>;

    /// Single-shot query for a locator. `Ok(None)` means no current match;
    /// waiting for an element to appear is the resolver's job.
    async fn query(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError>;

    async fn is_visible(&self, id: ElementId) -> Result<bool, DriverError>;

    async fn is_enabled(&self, id: ElementId) -> Result<bool, DriverError>;

    async fn scroll_into_view(&mut self, id: ElementId) -> Result<(), DriverError>;

    async fn click(&mut self, id: ElementId) -> Result<(), DriverError>;

    /// Clear an input's current content.
    async fn clear(&mut self, id: ElementId) -> Result<(), DriverError>;

    /// Type into an element one character at a time. The pacing matters:
    /// instantaneous paste trips the target site's anti-automation checks.
    async fn type_text(
        &mut self,
        id: ElementId,
        text: &str,
        per_char_delay: Duration,
    ) -> Result<(), DriverError>;

    async fn element_text(&self, id: ElementId) -> Result<String, DriverError>;

    async fn attribute(&self, id: ElementId, name: &str)
    -> Result<Option<String>, DriverError>;

    /// Press a single key (e.g. "Enter") at the page level.
    async fn press_key(&mut self, key: &str) -> Result<(), DriverError>;

    /// Type raw characters at the page level, wherever focus currently is.
    async fn type_chars(&mut self, text: &str) -> Result<(), DriverError>;

    /// Register interest in the next file download. Must be called before
    /// the click that triggers it.
    async fn arm_download_capture(&mut self) -> Result<(), DriverError>;

    /// Wait for a previously armed download to finish and return its local
    /// path.
    async fn await_download(&mut self, timeout: Duration) -> Result<PathBuf, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}
