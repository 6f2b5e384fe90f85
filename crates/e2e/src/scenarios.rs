//! Study group scenarios
//!
//! Every scenario assumes the page has just been navigated to the app URL
//! and provisions whatever else it needs itself, so scenarios can run in
//! any order and in isolation.
//!
//! The application allows one group per subject for each user, and all
//! scenarios act as the same user against the same server. Each scenario
//! that creates a group therefore uses a subject no other scenario creates
//! in.

use chrono::{SubsecRound, TimeDelta, Utc};
use tracing::{debug, info};

use studygroup_pages::{Driver, PageError, SortOrder, StudyGroupPage};

use crate::checks;
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    CreateWithValidData,
    RejectSecondGroupForSameSubject,
    RejectNameOutsideLengthBounds,
    AcceptNameAtLengthBounds,
    CreationRecordsTimestamp,
    JoinExistingGroup,
    LeaveJoinedGroup,
    ListDisplaysGroups,
    FilterBySubject,
    SortNewestFirst,
    SortOldestFirst,
    SortIsIdempotent,
}

impl Scenario {
    pub const ALL: [Scenario; 12] = [
        Scenario::CreateWithValidData,
        Scenario::RejectSecondGroupForSameSubject,
        Scenario::RejectNameOutsideLengthBounds,
        Scenario::AcceptNameAtLengthBounds,
        Scenario::CreationRecordsTimestamp,
        Scenario::JoinExistingGroup,
        Scenario::LeaveJoinedGroup,
        Scenario::ListDisplaysGroups,
        Scenario::FilterBySubject,
        Scenario::SortNewestFirst,
        Scenario::SortOldestFirst,
        Scenario::SortIsIdempotent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::CreateWithValidData => "create_with_valid_data",
            Scenario::RejectSecondGroupForSameSubject => "reject_second_group_for_same_subject",
            Scenario::RejectNameOutsideLengthBounds => "reject_name_outside_length_bounds",
            Scenario::AcceptNameAtLengthBounds => "accept_name_at_length_bounds",
            Scenario::CreationRecordsTimestamp => "creation_records_timestamp",
            Scenario::JoinExistingGroup => "join_existing_group",
            Scenario::LeaveJoinedGroup => "leave_joined_group",
            Scenario::ListDisplaysGroups => "list_displays_groups",
            Scenario::FilterBySubject => "filter_by_subject",
            Scenario::SortNewestFirst => "sort_newest_first",
            Scenario::SortOldestFirst => "sort_oldest_first",
            Scenario::SortIsIdempotent => "sort_is_idempotent",
        }
    }

    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Scenario::CreateWithValidData => &["create", "smoke"],
            Scenario::RejectSecondGroupForSameSubject
            | Scenario::RejectNameOutsideLengthBounds
            | Scenario::AcceptNameAtLengthBounds => &["create", "validation"],
            Scenario::CreationRecordsTimestamp => &["create"],
            Scenario::JoinExistingGroup | Scenario::LeaveJoinedGroup => &["membership"],
            Scenario::ListDisplaysGroups => &["list", "smoke"],
            Scenario::FilterBySubject => &["list"],
            Scenario::SortNewestFirst | Scenario::SortOldestFirst | Scenario::SortIsIdempotent => {
                &["list", "sort"]
            }
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| *t == tag)
    }

    pub fn find(name: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Act and assert against a page that shows the study groups screen
    pub async fn run<D: Driver>(
        &self,
        page: &StudyGroupPage<D>,
        config: &SuiteConfig,
    ) -> E2eResult<()> {
        debug!("Running scenario {}", self.name());
        match self {
            Scenario::CreateWithValidData => create_with_valid_data(page, config).await,
            Scenario::RejectSecondGroupForSameSubject => reject_second_group(page, config).await,
            Scenario::RejectNameOutsideLengthBounds => reject_name_out_of_bounds(page, config).await,
            Scenario::AcceptNameAtLengthBounds => accept_name_at_bounds(page, config).await,
            Scenario::CreationRecordsTimestamp => creation_records_timestamp(page, config).await,
            Scenario::JoinExistingGroup => join_existing_group(page, config).await,
            Scenario::LeaveJoinedGroup => leave_joined_group(page, config).await,
            Scenario::ListDisplaysGroups => list_displays_groups(page).await,
            Scenario::FilterBySubject => filter_by_subject(page, config).await,
            Scenario::SortNewestFirst => sorted_by(page, SortOrder::NewestFirst).await,
            Scenario::SortOldestFirst => sorted_by(page, SortOrder::OldestFirst).await,
            Scenario::SortIsIdempotent => sort_is_idempotent(page).await,
        }
    }
}

async fn create_with_valid_data<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    page.create_group("Physics Pioneers", &config.subjects.physics)
        .await?;
    let message = page.get_notification_message().await?;
    checks::contains_any("create notification", &message, &config.messages.success)
}

async fn reject_second_group<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    let subject = &config.subjects.math;

    page.create_group("Math Lords", subject).await?;
    let first = page.get_notification_message().await?;
    debug!("First {} group: {}", subject, first);

    page.create_group("Math Thinkers", subject).await?;
    let message = page.get_notification_message().await?;
    checks::contains_any(
        "second group for the same subject",
        &message,
        &config.messages.duplicate,
    )
}

async fn reject_name_out_of_bounds<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    let short = "Grp1";
    let long = "Advanced QuantumMechanicsLegend";

    for name in [short, long] {
        if config.name_rules.accepts(name) {
            return Err(E2eError::Config(format!(
                "\"{}\" ({} chars) is inside name_rules {}..={}",
                name,
                name.chars().count(),
                config.name_rules.min_len,
                config.name_rules.max_len
            )));
        }

        page.create_group(name, &config.subjects.chemistry).await?;
        let message = page.get_notification_message().await?;
        checks::contains_any(
            &format!("name of {} chars", name.chars().count()),
            &message,
            &config.messages.invalid_name,
        )?;
    }
    Ok(())
}

/// A name of exactly `len` characters with no leading or trailing space
fn name_of_length(len: usize) -> String {
    "Boundary".chars().cycle().take(len).collect()
}

async fn accept_name_at_bounds<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    // Distinct subjects keep the one-group-per-subject rule out of the way
    let cases = [
        (config.name_rules.min_len, &config.subjects.biology),
        (config.name_rules.max_len, &config.subjects.history),
    ];

    for (len, subject) in cases {
        let name = name_of_length(len);
        page.create_group(&name, subject).await?;
        let message = page.get_notification_message().await?;
        checks::contains_any(
            &format!("name of exactly {} chars", len),
            &message,
            &config.messages.success,
        )?;
        if !page.group_exists(name.as_str()).await? {
            return Err(E2eError::assertion(
                "created group is listed",
                format!("a row named {:?}", name),
                "no such row",
            ));
        }
    }
    Ok(())
}

async fn creation_records_timestamp<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    let group = "Test Group";
    let started = Utc::now().trunc_subsecs(0) - TimeDelta::seconds(config.clock_tolerance_secs);

    page.create_group(group, &config.subjects.literature).await?;
    let message = page.get_notification_message().await?;
    checks::contains_any("create notification", &message, &config.messages.success)?;

    let text = page.created_at_for(group).await?;
    let created_at = checks::expect_timestamp("created-at", &text)?;
    if created_at < started {
        return Err(E2eError::assertion(
            "created-at of the new group",
            format!("not before {}", started),
            created_at.to_string(),
        ));
    }
    Ok(())
}

/// Make sure the fixture group is listed, creating it when allowed
async fn ensure_fixture<D: Driver>(page: &StudyGroupPage<D>, config: &SuiteConfig) -> E2eResult<()> {
    let fixture = &config.fixture;
    if page.group_exists(fixture.group.as_str()).await? {
        return Ok(());
    }
    if !fixture.provision {
        return Err(E2eError::assertion(
            "fixture group",
            format!("a row named {:?}", fixture.group),
            "no such row and provisioning is disabled",
        ));
    }

    info!("Provisioning fixture group \"{}\"", fixture.group);
    page.create_group(&fixture.group, &fixture.subject).await?;
    let message = page.get_notification_message().await?;
    checks::contains_any("fixture creation", &message, &config.messages.success)
}

async fn join_existing_group<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    ensure_fixture(page, config).await?;
    let group = config.fixture.group.as_str();

    if page.is_member_of(group).await? {
        page.click_leave_button(group).await?;
        page.get_notification_message().await?;
    }

    page.click_join_button(group).await?;
    let message = page.get_notification_message().await?;
    checks::contains_any("join notification", &message, &config.messages.joined)
}

async fn leave_joined_group<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    ensure_fixture(page, config).await?;
    let group = config.fixture.group.as_str();

    if !page.is_member_of(group).await? {
        page.click_join_button(group).await?;
        page.get_notification_message().await?;
    }

    page.click_leave_button(group).await?;
    let message = page.get_notification_message().await?;
    checks::contains_any("leave notification", &message, &config.messages.left)
}

async fn list_displays_groups<D: Driver>(page: &StudyGroupPage<D>) -> E2eResult<()> {
    let count = match page.wait_for_groups().await {
        Ok(count) => count,
        Err(PageError::ElementNotFound { .. }) => 0,
        Err(e) => return Err(e.into()),
    };
    if count == 0 {
        return Err(E2eError::assertion("rendered rows", "at least one", "0"));
    }
    Ok(())
}

async fn filter_by_subject<D: Driver>(
    page: &StudyGroupPage<D>,
    config: &SuiteConfig,
) -> E2eResult<()> {
    let subject = &config.subjects.chemistry;
    page.wait_for_groups().await?;
    let unfiltered = page.get_column_data("name").await?;

    page.select_subject(subject).await?;
    let subjects = page.get_column_data("subject").await?;
    checks::expect_all_equal_ci("subject column", &subjects, subject)?;

    let names = page.get_column_data("name").await?;
    checks::expect_subset("filtered names", &names, &unfiltered)
}

async fn sorted_by<D: Driver>(page: &StudyGroupPage<D>, order: SortOrder) -> E2eResult<()> {
    page.wait_for_groups().await?;
    page.select_sort(order).await?;
    let created_at = page.get_column_data("created-at").await?;
    checks::expect_sorted("created-at column", &created_at, order)
}

async fn sort_is_idempotent<D: Driver>(page: &StudyGroupPage<D>) -> E2eResult<()> {
    let order = SortOrder::NewestFirst;

    page.wait_for_groups().await?;
    page.select_sort(order).await?;
    let once = page.get_column_data("name").await?;
    page.select_sort(order).await?;
    let twice = page.get_column_data("name").await?;

    checks::expect_eq("names after re-applying the sort", &once, &twice)?;
    let created_at = page.get_column_data("created-at").await?;
    checks::expect_sorted("created-at column", &created_at, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_findable() {
        let names: HashSet<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), Scenario::ALL.len());
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::find(scenario.name()), Some(scenario));
        }
        assert_eq!(Scenario::find("nope"), None);
    }

    #[test]
    fn test_boundary_names_have_exact_length() {
        for len in [1, 5, 8, 30] {
            let name = name_of_length(len);
            assert_eq!(name.chars().count(), len);
            assert_eq!(name.trim(), name);
        }
        assert_eq!(name_of_length(5), "Bound");
    }

    #[test]
    fn test_smoke_tag_selects_two_scenarios() {
        let smoke: Vec<_> = Scenario::ALL.into_iter().filter(|s| s.has_tag("smoke")).collect();
        assert_eq!(
            smoke,
            vec![Scenario::CreateWithValidData, Scenario::ListDisplaysGroups]
        );
    }
}
