//! Ranked-strategy element resolution.
//!
//! The target markup is neither versioned nor contractual, so a single
//! selector is never trusted: each field is described by an ordered list of
//! strategies and the first one that produces a live (and, when required,
//! interactable) element wins. Lower-priority strategies are never tried
//! once one succeeds.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::result::ResolutionError;
use super::strategy::LocatorStrategy;
use crate::driver::{ElementId, PageDriver};

/// How often a strategy re-probes the page within its timeout slice.
const PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// A successful resolution: the element plus the name of the strategy that
/// found it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: ElementId,
    pub strategy: String,
}

/// Resolve `target` by trying `strategies` in priority order.
///
/// Each strategy probes repeatedly within its own timeout slice; a query
/// error or a non-interactable match (when `require_interactable` is set)
/// counts as that strategy's failure, not the caller's. The whole call is
/// bounded by `overall_deadline` regardless of how much slice time remains.
pub async fn resolve(
    page: &mut dyn PageDriver,
    target: &str,
    strategies: &[LocatorStrategy],
    overall_deadline: Duration,
    require_interactable: bool,
) -> Result<Resolved, ResolutionError> {
    let deadline = Instant::now() + overall_deadline;
    let mut attempted = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        if Instant::now() >= deadline {
            break;
        }
        attempted.push(strategy.name.clone());

        let slice_end = Instant::now()
            .checked_add(strategy.timeout())
            .map(|t| t.min(deadline))
            .unwrap_or(deadline);

        loop {
            // A probe that hangs (page mid-navigation, stuck renderer) is
            // bounded by the remaining slice, not trusted to return.
            let remaining = slice_end.saturating_duration_since(Instant::now());
            let probed = match tokio::time::timeout(
                remaining.max(PROBE_INTERVAL),
                probe(page, strategy, require_interactable),
            )
            .await
            {
                Ok(p) => p,
                Err(_) => {
                    debug!(target, strategy = %strategy.name, "strategy timed out");
                    break;
                }
            };

            match probed {
                Probe::Hit(id) => {
                    if let Err(e) = page.scroll_into_view(id).await {
                        debug!(target, strategy = %strategy.name, "scroll into view failed: {e}");
                    }
                    return Ok(Resolved {
                        element: id,
                        strategy: strategy.name.clone(),
                    });
                }
                Probe::Miss => {}
                Probe::Broken(reason) => {
                    // The page mutated mid-lookup or the locator itself is
                    // unusable; charge it to this strategy and move on.
                    debug!(target, strategy = %strategy.name, "strategy failed: {reason}");
                    break;
                }
            }

            if Instant::now() + PROBE_INTERVAL >= slice_end {
                break;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    Err(ResolutionError::new(
        target,
        "no locator strategy matched within budget",
        attempted,
    ))
}

enum Probe {
    Hit(ElementId),
    Miss,
    Broken(String),
}

async fn probe(
    page: &mut dyn PageDriver,
    strategy: &LocatorStrategy,
    require_interactable: bool,
) -> Probe {
    let id = match page.query(&strategy.locator).await {
        Ok(Some(id)) => id,
        Ok(None) => return Probe::Miss,
        Err(e) => return Probe::Broken(e.to_string()),
    };

    if !require_interactable {
        return Probe::Hit(id);
    }

    // A match that is hidden or disabled is not a success for this
    // strategy; keep probing in case it becomes interactable within the
    // slice.
    match interactable(page, id).await {
        Ok(true) => Probe::Hit(id),
        Ok(false) => Probe::Miss,
        Err(e) => Probe::Broken(e.to_string()),
    }
}

async fn interactable(
    page: &dyn PageDriver,
    id: ElementId,
) -> Result<bool, crate::driver::DriverError> {
    Ok(page.is_visible(id).await? && page.is_enabled(id).await?)
}
