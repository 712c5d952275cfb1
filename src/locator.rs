//! Capability-agnostic descriptions of how to find a control, and the wait
//! strategies applied to them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TaskId;

/// Placeholder substituted by [`Locator::for_task`]
pub const TASK_ID_PLACEHOLDER: &str = "{task_id}";

/// How to find an element on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Id(String),
    Name(String),
    #[serde(rename = "xpath")]
    XPath(String),
    LinkText(String),
    PartialLinkText(String),
}

/// The WebDriver strategy a [`Locator`] resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Css,
    Id,
    XPath,
    LinkText,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Locator::LinkText(value.into())
    }

    pub fn partial_link_text(value: impl Into<String>) -> Self {
        Locator::PartialLinkText(value.into())
    }

    /// Resolve to a query the driver understands natively.
    ///
    /// `name` lookups become attribute selectors and partial link text becomes
    /// an XPath `contains()` over anchors.
    pub fn query(&self) -> (QueryKind, String) {
        match self {
            Locator::Css(css) => (QueryKind::Css, css.clone()),
            Locator::Id(id) => (QueryKind::Id, id.clone()),
            Locator::Name(name) => (QueryKind::Css, format!("[name=\"{}\"]", name)),
            Locator::XPath(xpath) => (QueryKind::XPath, xpath.clone()),
            Locator::LinkText(text) => (QueryKind::LinkText, text.clone()),
            Locator::PartialLinkText(text) => (
                QueryKind::XPath,
                format!("//a[contains(normalize-space(.), {})]", xpath_literal(text)),
            ),
        }
    }

    /// Substitute `{task_id}` in the locator value
    pub fn for_task(&self, task_id: TaskId) -> Locator {
        let id = task_id.to_string();
        let sub = |value: &String| value.replace(TASK_ID_PLACEHOLDER, &id);
        match self {
            Locator::Css(v) => Locator::Css(sub(v)),
            Locator::Id(v) => Locator::Id(sub(v)),
            Locator::Name(v) => Locator::Name(sub(v)),
            Locator::XPath(v) => Locator::XPath(sub(v)),
            Locator::LinkText(v) => Locator::LinkText(sub(v)),
            Locator::PartialLinkText(v) => Locator::PartialLinkText(sub(v)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css={}", v),
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::LinkText(v) => write!(f, "link={}", v),
            Locator::PartialLinkText(v) => write!(f, "partial-link={}", v),
        }
    }
}

/// Quote a string for use inside an XPath expression
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Condition an element lookup waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// At least one match is attached to the DOM
    Presence,
    /// A match is displayed
    Visible,
    /// A match is displayed and enabled
    Clickable,
    /// No match is displayed (absent counts as invisible)
    Invisible,
}

impl WaitFor {
    /// Whether an element in the given state satisfies the condition
    pub fn accepts(self, displayed: bool, enabled: bool) -> bool {
        match self {
            WaitFor::Presence => true,
            WaitFor::Visible => displayed,
            WaitFor::Clickable => displayed && enabled,
            WaitFor::Invisible => !displayed,
        }
    }
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
