//! Study Group E2E Suite
//!
//! Independent arrange/act/assert scenarios for the study groups screen,
//! driven through the page objects in `studygroup-pages`:
//! - Each scenario gets a fresh page and navigates to the app itself
//! - Fixtures are provisioned by the scenario that needs them
//! - Results are collected per scenario and written as JSON
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SuiteRunner<L: Launcher>                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  for each selected Scenario:                                │
//! │    ├── launcher.open_page() -> StudyGroupPage               │
//! │    ├── navigate_to(app_url)                                 │
//! │    ├── scenario.run(page, config)  (act + checks::*)        │
//! │    └── page.close()                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteConfig (YAML): app_url, name_rules, messages,         │
//! │                      fixture, subjects, output_dir          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod checks;
pub mod config;
pub mod error;
pub mod probe;
pub mod runner;
pub mod scenarios;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use runner::{ScenarioResult, SuiteResult, SuiteRunner};
pub use scenarios::Scenario;
