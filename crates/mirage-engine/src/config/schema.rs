//! Site profile: everything that varies with the target site lives here,
//! so the automation core stays a single parameterized code path.
//!
//! The defaults describe the image-generator workspace the bot was built
//! against. Each locator list is ordered deep structural selector first
//! (fast, brittle), generic structural next, semantic/text matches last.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::poll::ResultMarker;
use crate::resolution::{Locator, LocatorStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Site root, visited first so the authenticated-indicator check runs
    /// against the landing page.
    pub base_url: String,
    /// The generator workspace page where prompts are submitted.
    pub generator_url: String,
    /// When true, a missing or unreadable session file is fatal at startup.
    pub require_auth: bool,
    /// CSS selectors that only match for an authenticated user.
    pub auth_indicators: Vec<String>,
    /// Substrings of a URL that mean we were bounced to a login page.
    pub login_markers: Vec<String>,
    /// Links back into the workspace, tried after a login redirect.
    pub workspace_links: Vec<LocatorStrategy>,
    pub prompt_field: Vec<LocatorStrategy>,
    pub modifier: Option<ModifierConfig>,
    pub submit_control: Vec<LocatorStrategy>,
    pub result_marker: ResultMarker,
    pub watermark: Option<WatermarkConfig>,
    /// Per-character typing delay; instantaneous paste trips the site's
    /// anti-automation heuristics.
    pub typing_delay_ms: u64,
    /// Overall deadline for one mandatory resolution (prompt field, submit
    /// control).
    pub resolve_budget_ms: u64,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub download_timeout_ms: u64,
    /// Hard ceiling for one whole request; when it elapses the page is
    /// closed and the request reports TimedOut.
    pub request_deadline_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// The control showing the currently selected model variant.
    pub control: Vec<LocatorStrategy>,
    /// If the control's label already contains this, no menu dance needed.
    pub desired_label: String,
    /// Name of the option to pick inside the opened menu.
    pub option_name: String,
    /// Attribute/test-id selectors tried after semantic and text matches.
    pub attr_selectors: Vec<String>,
    /// Key typed as the last-resort keyboard fallback.
    pub first_letter: String,
    /// Settle time after opening the menu, before the options surface is
    /// queried.
    pub menu_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub menu: Vec<LocatorStrategy>,
    pub action: Vec<LocatorStrategy>,
    pub menu_settle_ms: u64,
}

impl SiteProfile {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn resolve_budget(&self) -> Duration {
        Duration::from_millis(self.resolve_budget_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Make a page-relative result address absolute against the site root.
    /// Handles rooted, path-relative, and protocol-relative forms; an
    /// address that cannot be joined is returned as-is.
    pub fn absolutize(&self, address: &str) -> String {
        match Url::parse(&self.base_url).and_then(|base| base.join(address)) {
            Ok(joined) => joined.into(),
            Err(_) => address.to_string(),
        }
    }

    /// Does this URL look like the site bounced us to authentication?
    pub fn looks_like_login(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.login_markers.iter().any(|m| lower.contains(m))
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://makefilm.ai".into(),
            generator_url: "https://makefilm.ai/workspace/image-generator".into(),
            require_auth: false,
            auth_indicators: vec![
                r#"a[href*="workspace"]"#.into(),
                r#"a[href*="profile"]"#.into(),
                ".user-menu".into(),
                r#"[data-testid="user-menu"]"#.into(),
                r#"a[href*="dashboard"]"#.into(),
                r#"a[href*="account"]"#.into(),
            ],
            login_markers: vec!["login".into(), "signin".into(), "auth".into()],
            workspace_links: vec![
                LocatorStrategy::new(
                    "workspace-href",
                    Locator::css(r#"a[href*="workspace"]"#),
                    2_000,
                ),
                LocatorStrategy::new(
                    "generator-href",
                    Locator::css(r#"a[href*="image-generator"]"#),
                    2_000,
                ),
                LocatorStrategy::new("workspace-text", Locator::text("workspace"), 2_000),
            ],
            prompt_field: vec![
                LocatorStrategy::new(
                    "structural-path",
                    Locator::css(
                        "body > div > div > div.flex-1.flex.flex-col > main > div > div > div \
                         > div.px-8.pt-1 > div > div > div.p-4.pb-12 > textarea",
                    ),
                    5_000,
                ),
                LocatorStrategy::new(
                    "short-structural",
                    Locator::css("div.p-4.pb-12 textarea"),
                    2_000,
                ),
                LocatorStrategy::new("any-textarea", Locator::css("textarea"), 2_000),
                LocatorStrategy::new(
                    "contenteditable",
                    Locator::css(r#"[contenteditable="true"]"#),
                    2_000,
                ),
                LocatorStrategy::new("prompt-class", Locator::css(".prompt-input"), 1_000),
                LocatorStrategy::new("prompt-id", Locator::css("#prompt"), 1_000),
            ],
            modifier: Some(ModifierConfig::default()),
            submit_control: vec![
                LocatorStrategy::new(
                    "structural-path",
                    Locator::css(
                        "div.absolute.bottom-3.right-4.flex.items-center.gap-3 \
                         > button.bg-gradient-to-r",
                    ),
                    5_000,
                ),
                LocatorStrategy::new(
                    "short-structural",
                    Locator::css("div.absolute.bottom-3.right-4 button"),
                    2_000,
                ),
                LocatorStrategy::new("generate-text", Locator::text("generate|create"), 2_000),
                LocatorStrategy::new(
                    "submit-type",
                    Locator::css(r#"button[type="submit"]"#),
                    2_000,
                ),
                LocatorStrategy::new("primary-class", Locator::css(".btn-primary"), 1_000),
                LocatorStrategy::new("submit-id", Locator::css("#submit-btn"), 1_000),
            ],
            result_marker: ResultMarker {
                locator: Locator::css(r#"img[src*="makefilm.ai"][src$=".jpg"]:not([src*="thumb"])"#),
                attribute: "src".into(),
                reject: Some("thumb".into()),
            },
            watermark: Some(WatermarkConfig::default()),
            typing_delay_ms: 100,
            resolve_budget_ms: 15_000,
            poll_max_attempts: 300,
            poll_interval_ms: 1_000,
            download_timeout_ms: 15_000,
            request_deadline_ms: 420_000,
        }
    }
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            control: vec![
                LocatorStrategy::new(
                    "structural-path",
                    Locator::css(
                        "div.absolute.bottom-3.right-4.flex.items-center.gap-3 \
                         > div > div > button",
                    ),
                    8_000,
                ),
                LocatorStrategy::new(
                    "short-structural",
                    Locator::css("div.absolute.bottom-3.right-4 div button"),
                    2_000,
                ),
            ],
            desired_label: "v1".into(),
            option_name: "v1".into(),
            attr_selectors: vec![
                r#"[data-testid="version-v1"]"#.into(),
                r#"[data-value="v1"]"#.into(),
                r#"[data-variant="v1"]"#.into(),
            ],
            first_letter: "v".into(),
            menu_settle_ms: 350,
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            menu: vec![
                LocatorStrategy::new("radix-menu", Locator::css("#radix-\\:ru\\:"), 8_000),
                LocatorStrategy::new(
                    "menu-role",
                    Locator::Role {
                        role: "button".into(),
                        name: "more|options".into(),
                    },
                    2_000,
                ),
            ],
            action: vec![
                LocatorStrategy::new("remove-text", Locator::text("remove watermark"), 5_000),
                LocatorStrategy::new(
                    "remove-role",
                    Locator::Role {
                        role: "menuitem".into(),
                        name: "remove watermark".into(),
                    },
                    2_000,
                ),
            ],
            menu_settle_ms: 350,
        }
    }
}
