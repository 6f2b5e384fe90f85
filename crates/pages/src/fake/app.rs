//! In-process model of the study groups application

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::dom::{Action, Document, DocumentBuilder, Element};
use super::FakeConfig;
use crate::study_group::{NameRules, SortOrder};

/// Ways the fake can deviate from the application's rules, so that the
/// scenarios can be shown to catch each deviation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeFaults {
    /// Sort the list the opposite way from the selected option
    pub sort_reversed: bool,
    /// Keep showing every subject after one is picked
    pub subject_filter_ignored: bool,
    /// Let the session user create several groups for one subject
    pub duplicate_subject_accepted: bool,
    /// Accept names of any length
    pub name_length_unchecked: bool,
}

/// A group that exists before the session starts, owned by another user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGroup {
    pub name: String,
    pub subject: String,
    /// How long before the page was opened the group was created
    pub age_secs: i64,
    /// Whether the session user is already a member
    #[serde(default)]
    pub member: bool,
}

impl SeedGroup {
    pub fn new(name: &str, subject: &str, age_secs: i64) -> Self {
        Self {
            name: name.to_string(),
            subject: subject.to_string(),
            age_secs,
            member: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Group {
    id: u64,
    name: String,
    subject: String,
    created_at: DateTime<Utc>,
    created_by_session: bool,
    member: bool,
}

#[derive(Debug, Clone)]
struct Notification {
    text: String,
    visible_at: Instant,
}

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Server-side groups plus the UI state of the page showing them
#[derive(Debug)]
pub(crate) struct FakeApp {
    url: String,
    rules: NameRules,
    subjects: Vec<String>,
    latency: Duration,
    list_latency: Duration,
    faults: FakeFaults,
    groups: Vec<Group>,
    next_id: u64,
    loaded: bool,
    loaded_at: Instant,
    draft_name: String,
    subject: Option<String>,
    subjects_open: bool,
    sort: SortOrder,
    notification: Option<Notification>,
}

impl FakeApp {
    pub fn new(config: &FakeConfig) -> Self {
        let now = Utc::now();
        let groups = config
            .seed
            .iter()
            .enumerate()
            .map(|(i, s)| Group {
                id: i as u64 + 1,
                name: s.name.clone(),
                subject: s.subject.clone(),
                created_at: now - TimeDelta::seconds(s.age_secs),
                created_by_session: false,
                member: s.member,
            })
            .collect::<Vec<_>>();

        Self {
            url: normalize_url(&config.url),
            rules: config.rules,
            subjects: config.subjects.clone(),
            latency: config.notification_latency,
            list_latency: config.list_latency,
            faults: config.faults,
            next_id: groups.len() as u64 + 1,
            groups,
            loaded: false,
            loaded_at: Instant::now(),
            draft_name: String::new(),
            subject: None,
            subjects_open: false,
            sort: SortOrder::default(),
            notification: None,
        }
    }

    /// Returns false when nothing is served at `url`
    pub fn navigate(&mut self, url: &str) -> bool {
        if normalize_url(url) != self.url {
            return false;
        }
        self.loaded = true;
        self.loaded_at = Instant::now();
        self.draft_name.clear();
        self.subject = None;
        self.subjects_open = false;
        self.sort = SortOrder::default();
        self.notification = None;
        true
    }

    pub fn unload(&mut self) {
        self.loaded = false;
    }

    pub fn set_name(&mut self, value: &str) {
        self.draft_name = value.to_string();
    }

    pub fn set_sort(&mut self, order: SortOrder) {
        self.sort = order;
    }

    pub fn perform(&mut self, action: &Action) {
        debug!("fake app action: {:?}", action);
        match action {
            Action::ToggleSubjects => self.subjects_open = !self.subjects_open,
            Action::PickSubject(subject) => {
                self.subject = Some(subject.clone());
                self.subjects_open = false;
            }
            Action::Create => self.create(),
            Action::Join(id) => self.set_membership(*id, true),
            Action::Leave(id) => self.set_membership(*id, false),
        }
    }

    fn notify(&mut self, text: String) {
        self.notification = Some(Notification {
            text,
            visible_at: Instant::now() + self.latency,
        });
    }

    fn create(&mut self) {
        self.notification = None;
        let name = self.draft_name.trim().to_string();

        let Some(subject) = self.subject.clone() else {
            self.notify("Please select a subject".to_string());
            return;
        };

        if !self.faults.name_length_unchecked && !self.rules.accepts(&name) {
            self.notify(format!(
                "Group name must be between {} and {} characters",
                self.rules.min_len, self.rules.max_len
            ));
            return;
        }

        if !self.faults.duplicate_subject_accepted
            && self
                .groups
                .iter()
                .any(|g| g.created_by_session && g.subject.eq_ignore_ascii_case(&subject))
        {
            self.notify(format!(
                "You may create only one study group per subject ({})",
                subject
            ));
            return;
        }

        if self.groups.iter().any(|g| g.name.eq_ignore_ascii_case(&name)) {
            self.notify(format!("A study group named '{}' already exists", name));
            return;
        }

        self.groups.push(Group {
            id: self.next_id,
            name: name.clone(),
            subject,
            created_at: Utc::now(),
            created_by_session: true,
            member: false,
        });
        self.next_id += 1;
        self.draft_name.clear();
        self.notify(format!("Study group '{}' created successfully", name));
    }

    fn set_membership(&mut self, id: u64, member: bool) {
        self.notification = None;
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            return;
        };
        group.member = member;
        let text = if member {
            format!("You have joined {}", group.name)
        } else {
            format!("You have left {}", group.name)
        };
        self.notify(text);
    }

    fn visible_groups(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| {
                self.faults.subject_filter_ignored
                    || self
                        .subject
                        .as_deref()
                        .map_or(true, |s| g.subject.eq_ignore_ascii_case(s))
            })
            .collect();

        let sort = match (self.sort, self.faults.sort_reversed) {
            (order, false) => order,
            (SortOrder::NewestFirst, true) => SortOrder::OldestFirst,
            (SortOrder::OldestFirst, true) => SortOrder::NewestFirst,
        };
        match sort {
            SortOrder::NewestFirst => groups.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => groups.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        groups
    }

    /// Render the current screen. A page that was never loaded is empty.
    pub fn render(&self) -> Document {
        let mut b = DocumentBuilder::new();
        if !self.loaded {
            return b.finish();
        }

        b.open(Element::new("main").class("study-groups"));

        b.open(Element::new("form").class("create-group"))
            .leaf(
                Element::new("input")
                    .attr("name", "name")
                    .attr("value", self.draft_name.clone()),
            )
            .leaf(
                Element::new("div")
                    .attr("role", "combobox")
                    .attr("aria-label", "Subject")
                    .text(self.subject.clone().unwrap_or_else(|| "Select subject".to_string()))
                    .action(Action::ToggleSubjects),
            );
        if self.subjects_open {
            b.open(Element::new("ul").attr("role", "listbox"));
            for subject in &self.subjects {
                b.leaf(
                    Element::new("li")
                        .attr("role", "option")
                        .text(subject.clone())
                        .action(Action::PickSubject(subject.clone())),
                );
            }
            b.close();
        }
        b.leaf(Element::new("button").text("Create").action(Action::Create))
            .close();

        if let Some(n) = &self.notification {
            if Instant::now() >= n.visible_at {
                b.leaf(Element::new("div").class("notification").text(n.text.clone()));
            }
        }

        b.open(Element::new("select").class("sort-dropdown"));
        for order in [SortOrder::NewestFirst, SortOrder::OldestFirst] {
            b.leaf(Element::new("option").text(order.label()));
        }
        b.close();

        b.open(Element::new("table")).open(Element::new("tbody"));
        let listed = Instant::now() >= self.loaded_at + self.list_latency;
        for group in self.visible_groups().into_iter().filter(|_| listed) {
            let (label, action) = if group.member {
                ("Leave", Action::Leave(group.id))
            } else {
                ("Join", Action::Join(group.id))
            };
            b.open(
                Element::new("tr")
                    .class("study-group-row")
                    .attr("data-group-id", group.id.to_string()),
            )
            .leaf(Element::new("td").class("name").text(group.name.clone()))
            .leaf(Element::new("td").class("subject").text(group.subject.clone()))
            .leaf(
                Element::new("td")
                    .class("created-at")
                    .text(group.created_at.format(TIMESTAMP_FORMAT).to_string()),
            )
            .open(Element::new("td").class("actions"))
            .leaf(Element::new("button").text(label).action(action))
            .close()
            .close();
        }

        b.finish()
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;

    const URL: &str = "http://studygroups.test/studygroups";

    fn config(seed: &[SeedGroup]) -> FakeConfig {
        FakeConfig {
            url: URL.to_string(),
            subjects: vec!["Physics".to_string(), "Math".to_string()],
            seed: seed.to_vec(),
            notification_latency: Duration::ZERO,
            ..Default::default()
        }
    }

    fn app(seed: &[SeedGroup]) -> FakeApp {
        let mut app = FakeApp::new(&config(seed));
        assert!(app.navigate(URL));
        app
    }

    fn names(app: &FakeApp) -> Vec<String> {
        let doc = app.render();
        doc.resolve(&Locator::css(".study-group-row .name"))
            .unwrap()
            .into_iter()
            .map(|i| doc.text_content(i))
            .collect()
    }

    fn notification(app: &FakeApp) -> String {
        let doc = app.render();
        let found = doc.resolve(&Locator::css(".notification")).unwrap();
        found.first().map(|&i| doc.text_content(i)).unwrap_or_default()
    }

    fn create(app: &mut FakeApp, name: &str, subject: &str) -> String {
        app.set_name(name);
        app.perform(&Action::PickSubject(subject.to_string()));
        app.perform(&Action::Create);
        notification(app)
    }

    #[test]
    fn test_unknown_url_is_not_served() {
        let mut app = app(&[]);
        assert!(!app.navigate("http://elsewhere.test/"));
        assert!(app.navigate("http://StudyGroups.test/studygroups/"));
    }

    #[test]
    fn test_unloaded_page_renders_nothing() {
        let app = FakeApp::new(&config(&[SeedGroup::new("Bio Buddies", "Biology", 60)]));
        let doc = app.render();
        assert!(doc.resolve(&Locator::css(".study-group-row")).unwrap().is_empty());
    }

    #[test]
    fn test_create_enforces_length_bounds() {
        let mut app = app(&[]);
        assert!(create(&mut app, "Grp1", "Physics").contains("must be between 5 and 30"));
        assert!(create(&mut app, "Advanced QuantumMechanicsLegend", "Physics")
            .contains("must be between"));
        assert!(create(&mut app, "Grp12", "Physics").contains("successfully"));
    }

    #[test]
    fn test_one_group_per_subject_per_session_user() {
        let mut app = app(&[SeedGroup::new("Physics Grupetto", "Physics", 60)]);
        assert!(create(&mut app, "Math Lords", "Math").contains("successfully"));
        assert!(create(&mut app, "Math Thinkers", "Math").contains("only one"));
        // Seeded groups belong to someone else
        assert!(create(&mut app, "Physics Pioneers", "Physics").contains("successfully"));
    }

    #[test]
    fn test_membership_swaps_row_button() {
        let mut app = app(&[SeedGroup::new("Physics Grupetto", "Physics", 60)]);
        let leave = Locator::css(".study-group-row button").filter_exact_text("Leave");

        app.perform(&Action::Join(1));
        assert_eq!(notification(&app), "You have joined Physics Grupetto");
        assert_eq!(app.render().resolve(&leave).unwrap().len(), 1);

        app.perform(&Action::Leave(1));
        assert_eq!(notification(&app), "You have left Physics Grupetto");
        assert!(app.render().resolve(&leave).unwrap().is_empty());
    }

    #[test]
    fn test_rows_follow_subject_filter_and_sort() {
        let mut app = app(&[
            SeedGroup::new("Old Physics", "Physics", 300),
            SeedGroup::new("Math Masters", "Math", 200),
            SeedGroup::new("New Physics", "Physics", 100),
        ]);
        assert_eq!(names(&app), vec!["New Physics", "Math Masters", "Old Physics"]);

        app.set_sort(SortOrder::OldestFirst);
        app.perform(&Action::PickSubject("Physics".to_string()));
        assert_eq!(names(&app), vec!["Old Physics", "New Physics"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_appears_after_latency() {
        let mut app = FakeApp::new(&FakeConfig {
            notification_latency: Duration::from_millis(300),
            ..config(&[])
        });
        app.navigate(URL);
        create(&mut app, "Physics Pioneers", "Physics");
        assert_eq!(notification(&app), "");

        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(notification(&app).contains("successfully"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_renders_after_load_delay() {
        let mut app = FakeApp::new(&FakeConfig {
            list_latency: Duration::from_millis(200),
            ..config(&[SeedGroup::new("Physics Grupetto", "Physics", 60)])
        });
        app.navigate(URL);
        assert!(names(&app).is_empty());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(names(&app), vec!["Physics Grupetto"]);
    }

    #[test]
    fn test_faults_break_the_matching_rule() {
        let seed = [
            SeedGroup::new("Old Physics", "Physics", 300),
            SeedGroup::new("Math Masters", "Math", 100),
        ];
        let mut app = FakeApp::new(&FakeConfig {
            faults: FakeFaults {
                sort_reversed: true,
                subject_filter_ignored: true,
                duplicate_subject_accepted: true,
                name_length_unchecked: true,
            },
            ..config(&seed)
        });
        app.navigate(URL);

        assert_eq!(names(&app), vec!["Old Physics", "Math Masters"]);
        assert!(create(&mut app, "Grp1", "Math").contains("successfully"));
        assert!(create(&mut app, "Math Thinkers", "Math").contains("successfully"));
        assert!(names(&app).contains(&"Old Physics".to_string()));
    }
}
