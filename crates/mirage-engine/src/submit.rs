//! Prompt entry and generation submission.
//!
//! The prompt field and the submit control are mandatory: failing to
//! resolve either fails the whole request. The model-variant modifier is a
//! best-effort enhancement; every error inside its cascade is logged and
//! swallowed so generation still proceeds.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ModifierConfig, SiteProfile};
use crate::driver::{DriverError, PageDriver};
use crate::resolution::{Locator, ResolutionError, resolve};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("interaction failed: {0}")]
    Interaction(#[from] DriverError),
}

/// Fill the prompt field and activate the submit control.
pub async fn submit(
    page: &mut dyn PageDriver,
    profile: &SiteProfile,
    prompt: &str,
) -> Result<(), SubmissionError> {
    let field = resolve(
        page,
        "prompt field",
        &profile.prompt_field,
        profile.resolve_budget(),
        true,
    )
    .await?;
    debug!(strategy = %field.strategy, "prompt field resolved");

    page.clear(field.element).await?;
    page.type_text(field.element, prompt, profile.typing_delay())
        .await?;
    info!("prompt entered ({} chars)", prompt.chars().count());

    if let Some(modifier) = &profile.modifier {
        select_modifier(page, modifier).await;
    }

    let submit = resolve(
        page,
        "submit control",
        &profile.submit_control,
        profile.resolve_budget(),
        true,
    )
    .await?;
    debug!(strategy = %submit.strategy, "submit control resolved");

    page.click(submit.element).await?;
    info!("generation submitted");
    Ok(())
}

/// Best-effort selection of the desired model variant.
///
/// Returns whether a pick happened. Never fails: the modifier is not
/// mandatory for generation to proceed.
pub async fn select_modifier(page: &mut dyn PageDriver, modifier: &ModifierConfig) -> bool {
    let control = match resolve(
        page,
        "modifier control",
        &modifier.control,
        Duration::from_millis(modifier.control.iter().map(|s| s.timeout_ms).sum()),
        true,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            info!("modifier control not found, skipping: {e}");
            return false;
        }
    };

    let label = page
        .element_text(control.element)
        .await
        .unwrap_or_default();
    if label
        .to_lowercase()
        .contains(&modifier.desired_label.to_lowercase())
    {
        // Already on the desired variant; a confirming click keeps the
        // control's state in sync with what the label shows.
        if let Err(e) = page.click(control.element).await {
            debug!("confirming click on modifier control failed: {e}");
        }
        info!("modifier already set to '{}'", modifier.desired_label);
        return true;
    }

    // Open the options surface.
    if let Err(e) = page.click(control.element).await {
        warn!("could not open modifier menu: {e}");
        return false;
    }
    tokio::time::sleep(Duration::from_millis(modifier.menu_settle_ms)).await;

    if pick_by_role(page, modifier).await
        || pick_by_text(page, modifier).await
        || pick_by_attr(page, modifier).await
        || pick_by_keyboard(page, modifier).await
    {
        info!("modifier '{}' selected", modifier.option_name);
        true
    } else {
        warn!("modifier '{}' not selected by any strategy", modifier.option_name);
        false
    }
}

async fn pick_by_role(page: &mut dyn PageDriver, modifier: &ModifierConfig) -> bool {
    let locator = Locator::Role {
        role: "option".into(),
        name: modifier.option_name.clone(),
    };
    click_if_found(page, &locator, "role/option").await
}

async fn pick_by_text(page: &mut dyn PageDriver, modifier: &ModifierConfig) -> bool {
    let locator = Locator::text(&modifier.option_name);
    click_if_found(page, &locator, "visible text").await
}

async fn pick_by_attr(page: &mut dyn PageDriver, modifier: &ModifierConfig) -> bool {
    for selector in &modifier.attr_selectors {
        let locator = Locator::css(selector);
        if click_if_found(page, &locator, "attribute selector").await {
            return true;
        }
    }
    false
}

async fn pick_by_keyboard(page: &mut dyn PageDriver, modifier: &ModifierConfig) -> bool {
    if let Err(e) = page.type_chars(&modifier.first_letter).await {
        debug!("keyboard fallback failed: {e}");
        return false;
    }
    if let Err(e) = page.press_key("Enter").await {
        debug!("keyboard fallback confirm failed: {e}");
        return false;
    }
    debug!("modifier picked via keyboard fallback");
    true
}

async fn click_if_found(page: &mut dyn PageDriver, locator: &Locator, how: &str) -> bool {
    match page.query(locator).await {
        Ok(Some(id)) => {
            if let Err(e) = page.scroll_into_view(id).await {
                debug!("scroll into view failed: {e}");
            }
            match page.click(id).await {
                Ok(()) => {
                    debug!("modifier picked via {how}");
                    true
                }
                Err(e) => {
                    debug!("click via {how} failed: {e}");
                    false
                }
            }
        }
        Ok(None) => false,
        Err(e) => {
            debug!("query via {how} failed: {e}");
            false
        }
    }
}
