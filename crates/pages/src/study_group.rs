//! Page object for the study groups screen

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::Driver;
use crate::error::{PageError, PageResult};
use crate::locator::{AriaRole, Locator};

/// Display ordering of the study group list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    /// Visible label of the option in the sort dropdown
    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "Newest First",
            SortOrder::OldestFirst => "Oldest First",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Newest First" => Ok(SortOrder::NewestFirst),
            "Oldest First" => Ok(SortOrder::OldestFirst),
            other => Err(format!("unknown sort option: {}", other)),
        }
    }
}

/// Inclusive bounds on the number of characters in a group name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRules {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            min_len: 5,
            max_len: 30,
        }
    }
}

impl NameRules {
    /// Surrounding whitespace does not count toward the length
    pub fn accepts(&self, name: &str) -> bool {
        (self.min_len..=self.max_len).contains(&name.trim().chars().count())
    }
}

/// How a study group row is identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    /// Exact text of the name cell
    Name(String),
    /// Value of the row's `data-group-id` attribute
    Id(String),
}

impl From<&str> for RowKey {
    fn from(name: &str) -> Self {
        RowKey::Name(name.to_string())
    }
}

impl From<String> for RowKey {
    fn from(name: String) -> Self {
        RowKey::Name(name)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Name(name) => write!(f, "group \"{}\"", name),
            RowKey::Id(id) => write!(f, "group id {}", id),
        }
    }
}

/// The study groups screen: create form, notification area, sort control
/// and the list of groups.
pub struct StudyGroupPage<D> {
    driver: D,
}

impl<D: Driver> StudyGroupPage<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    fn name_input() -> Locator {
        Locator::css("input[name='name']")
    }

    fn subject_dropdown() -> Locator {
        Locator::role(AriaRole::Combobox, "Subject")
    }

    fn subject_option(subject: &str) -> Locator {
        Locator::role(AriaRole::Option, subject)
    }

    fn create_button() -> Locator {
        Locator::role(AriaRole::Button, "Create")
    }

    fn notification() -> Locator {
        Locator::css(".notification")
    }

    fn sort_dropdown() -> Locator {
        Locator::css("select.sort-dropdown")
    }

    fn rows() -> Locator {
        Locator::css(".study-group-row")
    }

    fn row(key: &RowKey) -> Locator {
        match key {
            RowKey::Name(name) => {
                Self::rows().filter_has(Locator::css(".name").filter_exact_text(name.as_str()))
            }
            RowKey::Id(id) => Locator::css(format!(".study-group-row[data-group-id='{}']", id)),
        }
    }

    /// Wait for `key` to resolve to exactly one rendered row
    async fn single_row(&self, key: &RowKey) -> PageResult<Locator> {
        let row = Self::row(key);
        match self.driver.wait_for(&row).await? {
            1 => Ok(row),
            n => Err(PageError::ambiguous(&row, n)),
        }
    }

    pub async fn navigate_to(&self, url: &str) -> PageResult<()> {
        debug!("Navigating to {}", url);
        self.driver.goto(url).await
    }

    pub async fn set_group_name(&self, name: &str) -> PageResult<()> {
        self.driver.fill(&Self::name_input(), name).await
    }

    pub async fn select_subject(&self, subject: &str) -> PageResult<()> {
        self.driver.click(&Self::subject_dropdown()).await?;
        self.driver.click(&Self::subject_option(subject)).await
    }

    pub async fn click_create_button(&self) -> PageResult<()> {
        self.driver.click(&Self::create_button()).await
    }

    /// Fill the form and submit it. The outcome is reported through the
    /// notification, not through the return value.
    pub async fn create_group(&self, name: &str, subject: &str) -> PageResult<()> {
        debug!("Creating group \"{}\" ({})", name, subject);
        self.set_group_name(name).await?;
        self.select_subject(subject).await?;
        self.click_create_button().await
    }

    /// Current notification text. Waits until the notification is rendered
    /// with non-empty text.
    pub async fn get_notification_message(&self) -> PageResult<String> {
        self.driver.wait_for_text(&Self::notification()).await
    }

    pub async fn click_join_button(&self, group: impl Into<RowKey>) -> PageResult<()> {
        let key = group.into();
        debug!("Joining {}", key);
        let row = self.single_row(&key).await?;
        self.driver
            .click(&row.get_by_role(AriaRole::Button, "Join"))
            .await
    }

    pub async fn click_leave_button(&self, group: impl Into<RowKey>) -> PageResult<()> {
        let key = group.into();
        debug!("Leaving {}", key);
        let row = self.single_row(&key).await?;
        self.driver
            .click(&row.get_by_role(AriaRole::Button, "Leave"))
            .await
    }

    pub async fn get_group_rows_count(&self) -> PageResult<usize> {
        self.driver.count(&Self::rows()).await
    }

    /// Wait until the list shows at least one row and return the row count
    pub async fn wait_for_groups(&self) -> PageResult<usize> {
        self.driver.wait_for(&Self::rows()).await
    }

    pub async fn select_sort_option(&self, label: &str) -> PageResult<()> {
        self.driver.select_option(&Self::sort_dropdown(), label).await
    }

    pub async fn select_sort(&self, order: SortOrder) -> PageResult<()> {
        self.select_sort_option(order.label()).await
    }

    /// Text of one column across all rendered rows, in document order.
    /// `column_class` may be given with or without the leading dot.
    pub async fn get_column_data(&self, column_class: &str) -> PageResult<Vec<String>> {
        let cells = Self::rows().locator(format!(".{}", column_class.trim_start_matches('.')));
        self.driver.all_inner_texts(&cells).await
    }

    /// Creation timestamp text of a single row
    pub async fn created_at_for(&self, group: impl Into<RowKey>) -> PageResult<String> {
        let row = self.single_row(&group.into()).await?;
        self.driver.inner_text(&row.locator(".created-at")).await
    }

    /// Whether a row for `group` shows up within the driver timeout
    pub async fn group_exists(&self, group: impl Into<RowKey>) -> PageResult<bool> {
        match self.driver.wait_for(&Self::row(&group.into())).await {
            Ok(_) => Ok(true),
            Err(PageError::ElementNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the row offers `Leave`, i.e. the current user is a member
    pub async fn is_member_of(&self, group: impl Into<RowKey>) -> PageResult<bool> {
        let row = self.single_row(&group.into()).await?;
        let leave = row.get_by_role(AriaRole::Button, "Leave");
        Ok(self.driver.count(&leave).await? > 0)
    }

    pub async fn close(&self) -> PageResult<()> {
        self.driver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_labels_round_trip_through_from_str() {
        for order in [SortOrder::NewestFirst, SortOrder::OldestFirst] {
            assert_eq!(order.label().parse::<SortOrder>().unwrap(), order);
        }
        assert!("Alphabetical".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_name_rules_count_trimmed_characters() {
        let rules = NameRules::default();
        assert!(!rules.accepts("Grp1"));
        assert!(rules.accepts("  Grp12  "));
        assert!(rules.accepts(&"é".repeat(30)));
        assert!(!rules.accepts("Advanced QuantumMechanicsLegend"));
    }

    #[test]
    fn test_row_by_id_uses_data_attribute() {
        let row = StudyGroupPage::<crate::fake::FakeDriver>::row(&RowKey::Id("42".into()));
        assert_eq!(row.to_string(), "css(.study-group-row[data-group-id='42'])");
    }
}
