//! Study Group Page Objects
//!
//! This crate maps the logical elements of the study groups screen to
//! lazily-resolved locators and exposes intention-revealing operations on
//! top of a browser-automation driver:
//! - [`Locator`] describes how to find elements; drivers resolve it per call
//! - [`Driver`] / [`Launcher`] are the automation capability consumed here
//! - [`PlaywrightLauncher`] drives a real browser through a Node bridge
//! - [`FakeLauncher`] serves an in-process model of the application
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  StudyGroupPage<D: Driver>                                │
//! │    ├── set_group_name / select_subject / click_create     │
//! │    ├── click_join_button(key) / click_leave_button(key)   │
//! │    ├── get_notification_message()                        │
//! │    └── get_group_rows_count / select_sort / column data   │
//! ├───────────────────────────────────────────────────────────┤
//! │  Driver (goto, count, wait_for, click, fill, select, text)│
//! │    ├── PlaywrightPage ── node bridge ── browser           │
//! │    └── FakeDriver ── rendered element tree                │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod fake;
pub mod locator;
pub mod playwright;
pub mod study_group;

pub use driver::{Driver, Launcher};
pub use error::{PageError, PageResult};
pub use fake::{FakeConfig, FakeDriver, FakeFaults, FakeLauncher};
pub use locator::{AriaRole, Locator};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightLauncher, PlaywrightPage};
pub use study_group::{NameRules, RowKey, SortOrder, StudyGroupPage};
