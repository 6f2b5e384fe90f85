//! Lazily-resolved element locators
//!
//! A [`Locator`] is a description of how to find elements, not a handle to
//! them. Building one never touches the page; drivers resolve the steps
//! against the live DOM every time an action runs, so a locator defined
//! before an element exists keeps working once the element is rendered.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ARIA roles the study group pages are queried by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AriaRole {
    Button,
    Combobox,
    Option,
}

impl AriaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AriaRole::Button => "button",
            AriaRole::Combobox => "combobox",
            AriaRole::Option => "option",
        }
    }
}

/// One resolution step. Steps are applied left to right: selector steps
/// search the descendants of the current matches, filter steps narrow them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LocatorStep {
    /// CSS selector (compound selectors joined by the descendant combinator)
    Css { selector: String },

    /// Element with an ARIA role and an exact accessible name
    Role { role: AriaRole, name: String },

    /// Keep matches that contain at least one element matching `inner`
    Has { inner: Locator },

    /// Keep matches whose text contains `text` (case-insensitive), or equals
    /// it after trimming when `exact` is set
    HasText { text: String, exact: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    steps: Vec<LocatorStep>,
}

impl Locator {
    /// Locate by CSS selector from the document root
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Css {
                selector: selector.into(),
            }],
        }
    }

    /// Locate by role and exact accessible name from the document root
    pub fn role(role: AriaRole, name: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Role {
                role,
                name: name.into(),
            }],
        }
    }

    /// Descendants of the current matches that match `selector`
    pub fn locator(mut self, selector: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::Css {
            selector: selector.into(),
        });
        self
    }

    /// Descendants of the current matches with the given role and name
    pub fn get_by_role(mut self, role: AriaRole, name: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::Role {
            role,
            name: name.into(),
        });
        self
    }

    pub fn filter_has(mut self, inner: Locator) -> Self {
        self.steps.push(LocatorStep::Has { inner });
        self
    }

    pub fn filter_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::HasText {
            text: text.into(),
            exact: false,
        });
        self
    }

    pub fn filter_exact_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::HasText {
            text: text.into(),
            exact: true,
        });
        self
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }
}

impl fmt::Display for LocatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorStep::Css { selector } => write!(f, "css({})", selector),
            LocatorStep::Role { role, name } => {
                write!(f, "role({}, name=\"{}\")", role.as_str(), name)
            }
            LocatorStep::Has { inner } => write!(f, "has({})", inner),
            LocatorStep::HasText { text, exact: true } => write!(f, "text=\"{}\"", text),
            LocatorStep::HasText { text, exact: false } => write!(f, "text~\"{}\"", text),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
