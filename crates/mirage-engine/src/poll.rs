//! Completion detection for an externally triggered generation job.
//!
//! The target system offers no completion callback or push channel, so the
//! only synchronization mechanism is polling the page for a result marker:
//! an image-like element whose address does not look like a placeholder or
//! thumbnail. The attempt ceiling bounds worst-case request latency.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::PageDriver;
use crate::resolution::Locator;

/// Image URLs swept out of raw page content when no marker element appears.
const IMAGE_URL_PATTERN: &str = r#"https?://[^\s<>"']+\.(?:jpg|jpeg|png|gif|webp|bmp)"#;

/// Describes the element whose presence signals a finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMarker {
    pub locator: Locator,
    /// Attribute carrying the result address, usually `src` or `href`.
    pub attribute: String,
    /// Addresses matching this pattern are placeholders, not results.
    #[serde(default)]
    pub reject: Option<String>,
}

impl ResultMarker {
    fn reject_regex(&self) -> Option<Regex> {
        let pattern = self.reject.as_deref()?;
        match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("invalid reject pattern '{pattern}': {e}; accepting all addresses");
                None
            }
        }
    }
}

/// Poll for a finished-result marker, at most `max_attempts` times with a
/// fixed interval between attempts.
///
/// Returns the marker's address, or `None` after exhausting the budget.
/// `None` is a normal outcome (slow generation), not an error: callers
/// proceed without the marker. Per-iteration query errors are logged and
/// treated as "not yet found".
pub async fn await_completion(
    page: &mut dyn PageDriver,
    marker: &ResultMarker,
    max_attempts: u32,
    poll_interval: Duration,
) -> Option<String> {
    let reject = marker.reject_regex();

    for attempt in 1..=max_attempts {
        match page.query(&marker.locator).await {
            Ok(Some(id)) => match page.attribute(id, &marker.attribute).await {
                Ok(Some(address)) if accepted(&address, reject.as_ref()) => {
                    info!(attempt, %address, "result marker found");
                    return Some(address);
                }
                Ok(_) => {}
                Err(e) => debug!(attempt, "marker attribute read failed: {e}"),
            },
            Ok(None) => {}
            Err(e) => debug!(attempt, "marker query failed: {e}"),
        }

        if attempt < max_attempts {
            tokio::time::sleep(poll_interval).await;
        }
    }

    warn!(max_attempts, "result marker did not appear; proceeding without it");
    None
}

fn accepted(address: &str, reject: Option<&Regex>) -> bool {
    !address.is_empty() && !reject.is_some_and(|re| re.is_match(address))
}

/// Last-resort sweep: scan raw page content for an absolute image URL.
pub fn scan_content_for_image_url(content: &str) -> Option<String> {
    let re = Regex::new(IMAGE_URL_PATTERN).ok()?;
    re.find(content).map(|m| m.as_str().to_string())
}
