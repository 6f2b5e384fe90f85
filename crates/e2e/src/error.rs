//! Error types for E2E testing

use studygroup_pages::PageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("Assertion failed: {what}: expected {expected}, got {actual}")]
    Assertion {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Application at {url} not reachable after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    pub fn assertion(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        E2eError::Assertion {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
