//! Optional watermark removal on a completed result.
//!
//! Opens the result's secondary menu, triggers the removal action while a
//! download capture is armed, and waits for the file. Every failure is
//! non-fatal: callers fall back to the direct image address, then to a
//! plain link.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::WatermarkConfig;
use crate::driver::PageDriver;
use crate::resolution::resolve;

pub async fn remove_watermark_and_download(
    page: &mut dyn PageDriver,
    config: &WatermarkConfig,
    download_timeout: Duration,
) -> Option<PathBuf> {
    let menu_budget = Duration::from_millis(config.menu.iter().map(|s| s.timeout_ms).sum());
    let menu = match resolve(page, "watermark menu", &config.menu, menu_budget, true).await {
        Ok(r) => r,
        Err(e) => {
            warn!("watermark menu not found: {e}");
            return None;
        }
    };

    if let Err(e) = page.click(menu.element).await {
        warn!("could not open watermark menu: {e}");
        return None;
    }
    tokio::time::sleep(Duration::from_millis(config.menu_settle_ms)).await;

    let action_budget = Duration::from_millis(config.action.iter().map(|s| s.timeout_ms).sum());
    let action = match resolve(page, "watermark action", &config.action, action_budget, true).await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("watermark action not found: {e}");
            return None;
        }
    };

    // The capture must be armed before the click that starts the transfer.
    if let Err(e) = page.arm_download_capture().await {
        warn!("could not arm download capture: {e}");
        return None;
    }
    if let Err(e) = page.click(action.element).await {
        warn!("watermark action click failed: {e}");
        return None;
    }

    match page.await_download(download_timeout).await {
        Ok(path) => {
            debug!("watermark-free file downloaded to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("download did not complete: {e}");
            None
        }
    }
}
