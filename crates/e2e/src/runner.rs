//! Runner that gives every scenario its own page and collects results

use std::path::PathBuf;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, error, debug};

use studygroup_pages::{Launcher, StudyGroupPage};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::scenarios::Scenario;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub tags: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a selection of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios left out by the tag or name selection
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Sequential scenario runner over any page launcher
pub struct SuiteRunner<L> {
    launcher: L,
    config: SuiteConfig,
}

impl<L: Launcher> SuiteRunner<L> {
    pub fn new(launcher: L, config: SuiteConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Run every scenario
    pub async fn run_all(&self) -> SuiteResult {
        self.run_scenarios(&Scenario::ALL).await
    }

    /// Run scenarios carrying a tag
    pub async fn run_tagged(&self, tag: &str) -> SuiteResult {
        let selected: Vec<Scenario> = Scenario::ALL
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect();
        self.run_scenarios(&selected).await
    }

    /// Run one scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<SuiteResult> {
        let scenario =
            Scenario::find(name).ok_or_else(|| E2eError::ScenarioNotFound(name.to_string()))?;
        Ok(self.run_scenarios(&[scenario]).await)
    }

    /// Run scenarios in order; a failure never stops the ones after it
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} scenario(s) against {}", scenarios.len(), self.config.app_url);

        for scenario in scenarios {
            let result = self.run_scenario(*scenario).await;
            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let skipped = Scenario::ALL.len().saturating_sub(scenarios.len());

        info!("");
        info!("Scenario Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms);

        SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Open a page, navigate to the app, run the scenario, close the page
    pub async fn run_scenario(&self, scenario: Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Opening page for {}", scenario.name());

        let outcome = match self.launcher.open_page().await {
            Ok(driver) => {
                let page = StudyGroupPage::new(driver);
                let outcome = self.arrange_and_run(scenario, &page).await;
                if let Err(e) = page.close().await {
                    warn!("Closing page after {} failed: {}", scenario.name(), e);
                }
                outcome
            }
            Err(e) => Err(e.into()),
        };

        ScenarioResult {
            name: scenario.name().to_string(),
            tags: scenario.tags().iter().map(|t| t.to_string()).collect(),
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    async fn arrange_and_run(
        &self,
        scenario: Scenario,
        page: &StudyGroupPage<L::Page>,
    ) -> E2eResult<()> {
        page.navigate_to(&self.config.app_url).await?;
        scenario.run(page, &self.config).await
    }

    /// Write results to `test-results.json` in the configured output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
