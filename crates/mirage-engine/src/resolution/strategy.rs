use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named rule for finding one UI element.
///
/// `TextPattern` and the `name` of `Role` are regular expressions matched
/// case-insensitively by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    Css { selector: String },
    TextPattern { pattern: String },
    Role { role: String, name: String },
    TestAttr { attr: String, value: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Locator::TextPattern {
            pattern: pattern.into(),
        }
    }
}

/// One entry in a ranked locator list: cheap structural selectors first,
/// semantic/text matches last. Each strategy gets its own slice of the
/// resolution budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub name: String,
    pub locator: Locator,
    /// Per-attempt budget for this strategy, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    2_000
}

impl LocatorStrategy {
    pub fn new(name: impl Into<String>, locator: Locator, timeout_ms: u64) -> Self {
        Self {
            name: name.into(),
            locator,
            timeout_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
