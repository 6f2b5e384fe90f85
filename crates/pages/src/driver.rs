//! The browser-automation capability the page objects consume

use async_trait::async_trait;

use crate::error::PageResult;
use crate::locator::Locator;

/// One live page in an isolated browser session.
///
/// Every call re-resolves its locator against the current DOM. Waiting
/// operations are bounded by the driver's configured action timeout, and
/// operations that act on a single element fail with
/// [`PageError::AmbiguousMatch`](crate::PageError::AmbiguousMatch) when more
/// than one element matches.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Load `url` and wait for the page to settle
    async fn goto(&self, url: &str) -> PageResult<()>;

    /// Number of elements currently matching, without waiting
    async fn count(&self, locator: &Locator) -> PageResult<usize>;

    /// Wait until at least one element matches and return how many do.
    /// Fails with `ElementNotFound` when nothing matches within the timeout.
    async fn wait_for(&self, locator: &Locator) -> PageResult<usize>;

    async fn click(&self, locator: &Locator) -> PageResult<()>;

    /// Replace the value of an input
    async fn fill(&self, locator: &Locator, value: &str) -> PageResult<()>;

    /// Choose an option of a `<select>` by its visible label
    async fn select_option(&self, locator: &Locator, label: &str) -> PageResult<()>;

    async fn inner_text(&self, locator: &Locator) -> PageResult<String>;

    /// Text of every current match in document order, without waiting
    async fn all_inner_texts(&self, locator: &Locator) -> PageResult<Vec<String>>;

    /// Wait until exactly one element matches and its text is non-empty
    async fn wait_for_text(&self, locator: &Locator) -> PageResult<String>;

    /// Tear the session down
    async fn close(&self) -> PageResult<()>;
}

/// Opens isolated pages. The runner asks for one page per scenario.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Page: Driver;

    async fn open_page(&self) -> PageResult<Self::Page>;
}
