//! Suite configuration
//!
//! Everything the scenarios assume about the application under test lives
//! here: where it is served, the name-length contract, the notification
//! phrases that signal each outcome, and the fixture group membership
//! scenarios work against. All fields have defaults, so a YAML file only
//! needs to name what differs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use studygroup_pages::fake::SeedGroup;
use studygroup_pages::{Browser, FakeConfig, NameRules};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// URL of the study groups screen
    pub app_url: String,

    /// Inclusive name-length bounds the application enforces
    pub name_rules: NameRules,

    pub messages: MessageContract,

    pub fixture: FixtureConfig,

    pub subjects: Subjects,

    /// Allowed difference between the local clock and the app's clock when
    /// checking creation timestamps
    pub clock_tolerance_secs: i64,

    /// Directory for `test-results.json`
    pub output_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            app_url: "https://students-app-test.com/studygroups".to_string(),
            name_rules: NameRules::default(),
            messages: MessageContract::default(),
            fixture: FixtureConfig::default(),
            subjects: Subjects::default(),
            clock_tolerance_secs: 0,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Case-insensitive phrases; a notification matches when it contains any
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContract {
    pub success: Vec<String>,
    pub duplicate: Vec<String>,
    pub invalid_name: Vec<String>,
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

fn phrases(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for MessageContract {
    fn default() -> Self {
        Self {
            success: phrases(&["success"]),
            duplicate: phrases(&["only one", "already exists"]),
            invalid_name: phrases(&["name must be between", "invalid name"]),
            joined: phrases(&["joined"]),
            left: phrases(&["left", "success"]),
        }
    }
}

/// The group join/leave scenarios act on. When it has to be provisioned it
/// is created in `subject`, which must differ from every subject in
/// [`Subjects`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub group: String,
    pub subject: String,
    /// Create the group through the UI when it is missing
    pub provision: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            group: "Physics Grupetto".to_string(),
            subject: "Astronomy".to_string(),
            provision: true,
        }
    }
}

/// Subject option names as shown by the subject combobox. Each scenario
/// that creates groups owns one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Subjects {
    pub physics: String,
    pub math: String,
    pub chemistry: String,
    pub biology: String,
    pub history: String,
    pub literature: String,
}

impl Default for Subjects {
    fn default() -> Self {
        Self {
            physics: "Physics".to_string(),
            math: "Math".to_string(),
            chemistry: "Chemistry".to_string(),
            biology: "Biology".to_string(),
            history: "History".to_string(),
            literature: "Literature".to_string(),
        }
    }
}

impl Subjects {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.physics.clone(),
            self.math.clone(),
            self.chemistry.clone(),
            self.biology.clone(),
            self.history.clone(),
            self.literature.clone(),
        ]
    }
}

impl SuiteConfig {
    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.app_url.trim().is_empty() {
            return Err(E2eError::Config("app_url is empty".to_string()));
        }

        let rules = &self.name_rules;
        if rules.min_len == 0 || rules.min_len > rules.max_len {
            return Err(E2eError::Config(format!(
                "name_rules must satisfy 0 < min_len <= max_len, got {}..={}",
                rules.min_len, rules.max_len
            )));
        }

        let contract = [
            ("success", &self.messages.success),
            ("duplicate", &self.messages.duplicate),
            ("invalid_name", &self.messages.invalid_name),
            ("joined", &self.messages.joined),
            ("left", &self.messages.left),
        ];
        for (name, phrases) in contract {
            if phrases.iter().all(|p| p.trim().is_empty()) {
                return Err(E2eError::Config(format!("messages.{} has no phrases", name)));
            }
        }

        let mut owned = self.subjects.all();
        owned.push(self.fixture.subject.clone());
        for (i, subject) in owned.iter().enumerate() {
            if owned[..i].iter().any(|s| s.trim().eq_ignore_ascii_case(subject.trim())) {
                return Err(E2eError::Config(format!(
                    "subject \"{}\" is used twice; creating scenarios and the fixture need one subject each",
                    subject
                )));
            }
        }

        Ok(())
    }

    /// A fake application that honors this configuration's contract
    pub fn fake_config(&self) -> FakeConfig {
        let mut subjects = self.subjects.all();
        if !subjects.iter().any(|s| s.eq_ignore_ascii_case(&self.fixture.subject)) {
            subjects.push(self.fixture.subject.clone());
        }
        let mut config = FakeConfig {
            url: self.app_url.clone(),
            rules: self.name_rules,
            subjects,
            ..Default::default()
        };

        if !config.seed.iter().any(|g| g.name == self.fixture.group) {
            config.seed.push(SeedGroup::new(
                &self.fixture.group,
                &self.fixture.subject,
                45 * 86_400,
            ));
        }
        config
    }
}

/// Browser named on the command line
pub fn parse_browser(name: &str) -> E2eResult<Browser> {
    name.parse().map_err(E2eError::Config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
app_url: http://localhost:3000/studygroups
name_rules:
  min_len: 3
  max_len: 40
messages:
  joined: ["welcome to"]
"#;
        let config = SuiteConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.app_url, "http://localhost:3000/studygroups");
        assert_eq!(config.name_rules.max_len, 40);
        assert_eq!(config.messages.joined, vec!["welcome to"]);
        assert_eq!(config.messages.duplicate, vec!["only one", "already exists"]);
        assert_eq!(config.fixture.group, "Physics Grupetto");
    }

    #[test]
    fn test_rejects_inverted_name_bounds() {
        let yaml = "name_rules: { min_len: 10, max_len: 5 }";
        let err = SuiteConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_phrase_list() {
        let yaml = "messages: { success: [] }";
        assert!(matches!(
            SuiteConfig::from_yaml(yaml).unwrap_err(),
            E2eError::Config(_)
        ));
    }

    #[test]
    fn test_fake_config_serves_app_url_and_fixture() {
        let config = SuiteConfig {
            app_url: "http://local.test/groups".to_string(),
            fixture: FixtureConfig {
                group: "Night Owls".to_string(),
                subject: "History".to_string(),
                provision: false,
            },
            ..Default::default()
        };

        let fake = config.fake_config();
        assert_eq!(fake.url, "http://local.test/groups");
        assert!(fake.seed.iter().any(|g| g.name == "Night Owls"));
        assert_eq!(fake.subjects.len(), 6);
    }

    #[test]
    fn test_default_config_is_valid() {
        SuiteConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_fixture_in_a_creating_subject() {
        let yaml = "fixture: { subject: physics }";
        match SuiteConfig::from_yaml(yaml).unwrap_err() {
            E2eError::Config(message) => assert!(message.contains("used twice"), "{message}"),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_browser_is_a_config_error() {
        assert_eq!(parse_browser("webkit").unwrap(), Browser::Webkit);
        assert!(matches!(parse_browser("firefx"), Err(E2eError::Config(_))));
    }
}
