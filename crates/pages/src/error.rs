//! Error types for page interactions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("No element matches {locator}")]
    ElementNotFound { locator: String },

    #[error("{count} elements match {locator}, expected exactly one")]
    AmbiguousMatch { locator: String, count: usize },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timeout after {timeout_ms} ms waiting for: {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Element {locator} cannot be used this way: {reason}")]
    NotActionable { locator: String, reason: String },

    #[error("Unsupported selector: {0}")]
    InvalidSelector(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge error: {0}")]
    Bridge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PageError {
    pub(crate) fn not_found(locator: impl ToString) -> Self {
        PageError::ElementNotFound {
            locator: locator.to_string(),
        }
    }

    pub(crate) fn ambiguous(locator: impl ToString, count: usize) -> Self {
        PageError::AmbiguousMatch {
            locator: locator.to_string(),
            count,
        }
    }
}

pub type PageResult<T> = Result<T, PageError>;
