//! In-process stand-in for a browser pointed at the study groups app
//!
//! [`FakeLauncher`] opens pages against a freshly seeded model of the
//! application, or, when built with [`FakeLauncher::shared`], against one
//! model that outlives its pages the way a real server does. The model is rendered into an element tree on every query
//! and resolves the same [`Locator`]s as the Playwright driver, so page
//! objects and scenarios can be exercised without a browser.

mod app;
mod dom;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use crate::driver::{Driver, Launcher};
use crate::error::{PageError, PageResult};
use crate::locator::Locator;
use crate::study_group::{NameRules, SortOrder};

pub use app::{FakeFaults, SeedGroup};
use app::FakeApp;
use dom::Document;

/// Configuration for the fake application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeConfig {
    /// The only URL the fake serves
    pub url: String,

    pub rules: NameRules,

    /// Options offered by the subject combobox
    pub subjects: Vec<String>,

    /// Groups present when a page is opened
    pub seed: Vec<SeedGroup>,

    /// Delay before a notification is rendered
    pub notification_latency: Duration,

    /// Delay after navigation before the group list is rendered
    pub list_latency: Duration,

    pub faults: FakeFaults,

    /// Bound on every waiting operation
    pub action_timeout: Duration,

    pub poll_interval: Duration,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            url: "http://studygroups.test/studygroups".to_string(),
            rules: NameRules::default(),
            subjects: ["Physics", "Math", "Chemistry", "Biology", "History"]
                .into_iter()
                .map(String::from)
                .collect(),
            seed: vec![
                SeedGroup::new("Physics Grupetto", "Physics", 40 * 86_400),
                SeedGroup::new("Chem Crew", "Chemistry", 30 * 86_400),
                SeedGroup::new("Chemistry Club", "Chemistry", 30 * 86_400),
                SeedGroup::new("Bio Buddies", "Biology", 12 * 86_400),
                SeedGroup::new("History Buffs", "History", 55 * 86_400),
            ],
            notification_latency: Duration::from_millis(20),
            list_latency: Duration::ZERO,
            faults: FakeFaults::default(),
            action_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Opens pages against the fake application
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    config: FakeConfig,
    shared: Option<Arc<Mutex<FakeApp>>>,
}

impl FakeLauncher {
    /// Every page gets its own freshly seeded application
    pub fn new(config: FakeConfig) -> Self {
        Self {
            config,
            shared: None,
        }
    }

    /// Every page talks to the same application, so groups created on one
    /// page are still there on the next
    pub fn shared(config: FakeConfig) -> Self {
        let app = FakeApp::new(&config);
        Self {
            config,
            shared: Some(Arc::new(Mutex::new(app))),
        }
    }

    pub fn config(&self) -> &FakeConfig {
        &self.config
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    type Page = FakeDriver;

    async fn open_page(&self) -> PageResult<FakeDriver> {
        Ok(match &self.shared {
            Some(app) => FakeDriver::with_app(Arc::clone(app), &self.config),
            None => FakeDriver::new(&self.config),
        })
    }
}

pub struct FakeDriver {
    app: Arc<Mutex<FakeApp>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl FakeDriver {
    pub fn new(config: &FakeConfig) -> Self {
        Self::with_app(Arc::new(Mutex::new(FakeApp::new(config))), config)
    }

    fn with_app(app: Arc<Mutex<FakeApp>>, config: &FakeConfig) -> Self {
        Self {
            app,
            timeout: config.action_timeout,
            poll_interval: config.poll_interval,
        }
    }

    fn render(&self) -> Document {
        self.app.lock().render()
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Poll until exactly one element matches and `ready` accepts it
    async fn wait_single(
        &self,
        locator: &Locator,
        ready: impl Fn(&Document, usize) -> bool,
    ) -> PageResult<(Document, usize)> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let doc = self.render();
            let found = doc.resolve(locator)?;
            match found.len() {
                0 => {}
                1 if ready(&doc, found[0]) => return Ok((doc, found[0])),
                1 => {
                    if Instant::now() >= deadline {
                        return Err(PageError::Timeout {
                            what: format!("{} to become ready", locator),
                            timeout_ms: self.timeout_ms(),
                        });
                    }
                }
                n => return Err(PageError::ambiguous(locator, n)),
            }
            if Instant::now() >= deadline {
                return Err(PageError::not_found(locator));
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> PageResult<()> {
        if self.app.lock().navigate(url) {
            Ok(())
        } else {
            Err(PageError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    async fn count(&self, locator: &Locator) -> PageResult<usize> {
        Ok(self.render().resolve(locator)?.len())
    }

    async fn wait_for(&self, locator: &Locator) -> PageResult<usize> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let found = self.render().resolve(locator)?.len();
            if found > 0 {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(PageError::not_found(locator));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&self, locator: &Locator) -> PageResult<()> {
        let (doc, index) = self.wait_single(locator, |_, _| true).await?;
        if let Some(action) = &doc.element(index).action {
            self.app.lock().perform(action);
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> PageResult<()> {
        let (doc, index) = self.wait_single(locator, |_, _| true).await?;
        let element = doc.element(index);
        match (element.tag, element.get_attr("name")) {
            ("input", Some("name")) => {
                self.app.lock().set_name(value);
                Ok(())
            }
            _ => Err(PageError::NotActionable {
                locator: locator.to_string(),
                reason: "not a fillable input".to_string(),
            }),
        }
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> PageResult<()> {
        let (doc, index) = self.wait_single(locator, |_, _| true).await?;
        if doc.element(index).tag != "select" {
            return Err(PageError::NotActionable {
                locator: locator.to_string(),
                reason: "not a <select> element".to_string(),
            });
        }

        let has_option = doc
            .children(index)
            .any(|i| doc.element(i).tag == "option" && doc.text_content(i) == label.trim());
        if !has_option {
            return Err(PageError::not_found(format!("{} >> option \"{}\"", locator, label)));
        }

        let order: SortOrder = label.parse().map_err(|reason| PageError::NotActionable {
            locator: locator.to_string(),
            reason,
        })?;
        self.app.lock().set_sort(order);
        Ok(())
    }

    async fn inner_text(&self, locator: &Locator) -> PageResult<String> {
        let (doc, index) = self.wait_single(locator, |_, _| true).await?;
        Ok(doc.text_content(index))
    }

    async fn all_inner_texts(&self, locator: &Locator) -> PageResult<Vec<String>> {
        let doc = self.render();
        Ok(doc
            .resolve(locator)?
            .into_iter()
            .map(|i| doc.text_content(i))
            .collect())
    }

    async fn wait_for_text(&self, locator: &Locator) -> PageResult<String> {
        let (doc, index) = self
            .wait_single(locator, |doc, i| !doc.text_content(i).is_empty())
            .await?;
        Ok(doc.text_content(index))
    }

    async fn close(&self) -> PageResult<()> {
        self.app.lock().unload();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::AriaRole;

    fn config() -> FakeConfig {
        FakeConfig {
            action_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    async fn loaded(config: &FakeConfig) -> FakeDriver {
        let driver = FakeLauncher::new(config.clone()).open_page().await.unwrap();
        driver.goto(&config.url).await.unwrap();
        driver
    }

    #[tokio::test]
    async fn test_goto_unknown_url_fails_with_navigation_error() {
        let driver = FakeDriver::new(&config());
        let err = driver.goto("http://nowhere.test/").await.unwrap_err();
        assert!(matches!(err, PageError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_click_before_navigation_times_out_as_not_found() {
        let driver = FakeDriver::new(&config());
        let err = driver
            .click(&Locator::role(AriaRole::Button, "Create"))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_click_on_many_matches_is_ambiguous() {
        let config = config();
        let driver = loaded(&config).await;
        let err = driver
            .click(&Locator::role(AriaRole::Button, "Join"))
            .await
            .unwrap_err();
        match err {
            PageError::AmbiguousMatch { count, .. } => assert_eq!(count, config.seed.len()),
            other => panic!("expected AmbiguousMatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_options_exist_only_while_combobox_is_open() {
        let config = config();
        let driver = loaded(&config).await;
        let option = Locator::role(AriaRole::Option, "Math");

        assert_eq!(driver.count(&option).await.unwrap(), 0);
        driver
            .click(&Locator::role(AriaRole::Combobox, "Subject"))
            .await
            .unwrap();
        assert_eq!(driver.count(&option).await.unwrap(), 1);
        driver.click(&option).await.unwrap();
        assert_eq!(driver.count(&option).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_select_option_rejects_unknown_label() {
        let config = config();
        let driver = loaded(&config).await;
        let err = driver
            .select_option(&Locator::css("select.sort-dropdown"), "Alphabetical")
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fill_rejects_non_input() {
        let config = config();
        let driver = loaded(&config).await;
        let err = driver
            .fill(&Locator::css("select.sort-dropdown"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::NotActionable { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_text_times_out_without_notification() {
        let config = config();
        let driver = loaded(&config).await;
        let err = driver
            .wait_for_text(&Locator::css(".notification"))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_outlasts_list_latency() {
        let config = FakeConfig {
            list_latency: Duration::from_millis(60),
            ..config()
        };
        let driver = loaded(&config).await;
        let rows = Locator::css(".study-group-row");

        assert_eq!(driver.count(&rows).await.unwrap(), 0);
        assert_eq!(driver.wait_for(&rows).await.unwrap(), config.seed.len());
    }

    #[tokio::test]
    async fn test_wait_for_is_bounded() {
        let config = config();
        let driver = loaded(&config).await;
        let err = driver
            .wait_for(&Locator::css(".study-group-row").filter_text("nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_shared_launcher_keeps_groups_across_pages() {
        let config = config();
        let launcher = FakeLauncher::shared(config.clone());
        let create = Locator::role(AriaRole::Button, "Create");

        let first = launcher.open_page().await.unwrap();
        first.goto(&config.url).await.unwrap();
        first.fill(&Locator::css("input[name='name']"), "Shared Group").await.unwrap();
        first.click(&Locator::role(AriaRole::Combobox, "Subject")).await.unwrap();
        first.click(&Locator::role(AriaRole::Option, "Math")).await.unwrap();
        first.click(&create).await.unwrap();
        first.close().await.unwrap();

        let second = launcher.open_page().await.unwrap();
        second.goto(&config.url).await.unwrap();
        let shared = Locator::css(".study-group-row .name").filter_exact_text("Shared Group");
        assert_eq!(second.count(&shared).await.unwrap(), 1);
    }
}
