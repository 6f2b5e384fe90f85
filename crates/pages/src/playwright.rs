//! Playwright browser automation
//!
//! Each page is a `node` process running an embedded bridge script that owns
//! one browser, one context and one page. Requests and responses are single
//! JSON lines over stdin/stdout, matched by id.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Driver, Launcher};
use crate::error::{PageError, PageResult};
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser: {}", other)),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Bound on every element wait
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
    /// `node` executable used to run the bridge
    pub node_binary: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            node_binary: PathBuf::from("node"),
        }
    }
}

/// Launch settings handed to the bridge as its first argument
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeLaunch {
    browser: Browser,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    timeout: u64,
    navigation_timeout: u64,
}

impl From<&PlaywrightConfig> for BridgeLaunch {
    fn from(config: &PlaywrightConfig) -> Self {
        Self {
            browser: config.browser,
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            timeout: config.action_timeout.as_millis() as u64,
            navigation_timeout: config.navigation_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    Count { locator: &'a Locator },
    Click { locator: &'a Locator },
    Fill { locator: &'a Locator, value: &'a str },
    SelectOption { locator: &'a Locator, label: &'a str },
    InnerText { locator: &'a Locator },
    AllInnerTexts { locator: &'a Locator },
    WaitForText { locator: &'a Locator },
    WaitFor { locator: &'a Locator },
    Close,
}

impl BridgeCommand<'_> {
    /// What the command acts on, for error messages
    fn target(&self) -> String {
        match self {
            BridgeCommand::Goto { url } => url.to_string(),
            BridgeCommand::Count { locator }
            | BridgeCommand::Click { locator }
            | BridgeCommand::Fill { locator, .. }
            | BridgeCommand::SelectOption { locator, .. }
            | BridgeCommand::InnerText { locator }
            | BridgeCommand::AllInnerTexts { locator }
            | BridgeCommand::WaitForText { locator }
            | BridgeCommand::WaitFor { locator } => locator.to_string(),
            BridgeCommand::Close => "page".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand<'a>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum BridgeErrorKind {
    Timeout,
    Ambiguous,
    NotFound,
    Navigation,
    Other,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<BridgeErrorKind>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeResponse {
    fn into_result(self, target: String, timeout_ms: u64) -> PageResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }

        let message = self.message.unwrap_or_else(|| "unknown error".to_string());
        Err(match self.kind.unwrap_or(BridgeErrorKind::Other) {
            BridgeErrorKind::NotFound => PageError::ElementNotFound { locator: target },
            BridgeErrorKind::Ambiguous => PageError::AmbiguousMatch {
                locator: target,
                count: self.count.unwrap_or(2),
            },
            BridgeErrorKind::Timeout => PageError::Timeout {
                what: target,
                timeout_ms,
            },
            BridgeErrorKind::Navigation => PageError::Navigation {
                url: target,
                reason: message,
            },
            BridgeErrorKind::Other => PageError::Bridge(format!("{}: {}", target, message)),
        })
    }
}

/// Launches one bridge process per page
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher, failing early when Playwright cannot be loaded
    pub fn new(config: PlaywrightConfig) -> PageResult<Self> {
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    /// Check that `node` can load the `playwright` package
    fn check_playwright_installed(config: &PlaywrightConfig) -> PageResult<()> {
        let status = Command::new(&config.node_binary)
            .args(["-e", "require('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(PageError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl Launcher for PlaywrightLauncher {
    type Page = PlaywrightPage;

    async fn open_page(&self) -> PageResult<PlaywrightPage> {
        PlaywrightPage::launch(&self.config).await
    }
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A page driven through the bridge process
pub struct PlaywrightPage {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    action_timeout_ms: u64,
    _script_dir: TempDir,
}

impl PlaywrightPage {
    pub async fn launch(config: &PlaywrightConfig) -> PageResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let launch = serde_json::to_string(&BridgeLaunch::from(config))?;
        info!(
            "Launching {} (headless: {})",
            config.browser.as_str(),
            config.headless
        );

        // Resolve `playwright` from the caller's node_modules, not the temp dir
        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(launch)
            .current_dir(std::env::current_dir()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PageError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PageError::Bridge("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let page = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            action_timeout_ms: config.action_timeout.as_millis() as u64,
            _script_dir: script_dir,
        };

        // The bridge answers id 0 once the browser is up
        let ready = page.read_response(0).await?;
        ready.into_result("browser launch".to_string(), page.action_timeout_ms)?;
        Ok(page)
    }

    async fn read_response(&self, id: u64) -> PageResult<BridgeResponse> {
        let mut io = self.io.lock().await;
        Self::read_matching(&mut io, id).await
    }

    async fn read_matching(io: &mut BridgeIo, id: u64) -> PageResult<BridgeResponse> {
        loop {
            let line = io
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| PageError::Bridge("bridge process exited".to_string()))?;

            match serde_json::from_str::<BridgeResponse>(&line) {
                Ok(response) if response.id == id => return Ok(response),
                Ok(response) => warn!("Dropping stale bridge response {}", response.id),
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }

    async fn request(&self, command: BridgeCommand<'_>) -> PageResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&BridgeRequest {
            id,
            command: &command,
        })?;
        line.push('\n');
        debug!("bridge -> {}", line.trim_end());

        let response = {
            let mut io = self.io.lock().await;
            io.stdin.write_all(line.as_bytes()).await?;
            io.stdin.flush().await?;
            Self::read_matching(&mut io, id).await?
        };

        response.into_result(command.target(), self.action_timeout_ms)
    }
}

#[async_trait]
impl Driver for PlaywrightPage {
    async fn goto(&self, url: &str) -> PageResult<()> {
        self.request(BridgeCommand::Goto { url }).await.map(|_| ())
    }

    async fn count(&self, locator: &Locator) -> PageResult<usize> {
        let value = self.request(BridgeCommand::Count { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&self, locator: &Locator) -> PageResult<()> {
        self.request(BridgeCommand::Click { locator }).await.map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> PageResult<()> {
        self.request(BridgeCommand::Fill { locator, value })
            .await
            .map(|_| ())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> PageResult<()> {
        self.request(BridgeCommand::SelectOption { locator, label })
            .await
            .map(|_| ())
    }

    async fn inner_text(&self, locator: &Locator) -> PageResult<String> {
        let value = self.request(BridgeCommand::InnerText { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn all_inner_texts(&self, locator: &Locator) -> PageResult<Vec<String>> {
        let value = self.request(BridgeCommand::AllInnerTexts { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn wait_for_text(&self, locator: &Locator) -> PageResult<String> {
        let value = self.request(BridgeCommand::WaitForText { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn wait_for(&self, locator: &Locator) -> PageResult<usize> {
        let value = self.request(BridgeCommand::WaitFor { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&self) -> PageResult<()> {
        self.request(BridgeCommand::Close).await?;
        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("Bridge exited with {}", status);
            }
            Err(_) => {
                warn!("Bridge did not exit after close, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const config = JSON.parse(process.argv[2]);

function reply(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

class BridgeError extends Error {
  constructor(kind, message, extra) {
    super(message);
    this.kind = kind;
    Object.assign(this, extra || {});
  }
}

function escapeRegex(text) {
  return text.replace(/[.*+?^${}()|[\]\\]/g, '\\$&');
}

function build(page, steps) {
  let loc = page;
  for (const step of steps) {
    if ((step.op === 'has' || step.op === 'has_text') && loc === page) {
      loc = page.locator(':root');
    }
    switch (step.op) {
      case 'css':
        loc = loc.locator(step.selector);
        break;
      case 'role':
        loc = loc.getByRole(step.role, { name: step.name, exact: true });
        break;
      case 'has':
        loc = loc.filter({ has: build(page, step.inner) });
        break;
      case 'has_text':
        loc = loc.filter({
          hasText: step.exact ? new RegExp('^\\s*' + escapeRegex(step.text) + '\\s*$') : step.text,
        });
        break;
      default:
        throw new BridgeError('other', 'unknown locator step: ' + step.op);
    }
  }
  return loc;
}

async function waitForText(loc) {
  const deadline = Date.now() + config.timeout;
  await loc.waitFor({ state: 'visible', timeout: config.timeout });
  for (;;) {
    const remaining = Math.max(1, deadline - Date.now());
    const text = (await loc.innerText({ timeout: remaining })).trim();
    if (text) return text;
    if (Date.now() >= deadline) throw new BridgeError('timeout', 'text stayed empty');
    await new Promise((resolve) => setTimeout(resolve, 50));
  }
}

async function handle(page, req) {
  if (req.cmd === 'goto') {
    let response;
    try {
      response = await page.goto(req.url, { timeout: config.navigationTimeout, waitUntil: 'load' });
    } catch (err) {
      throw new BridgeError('navigation', err.message);
    }
    if (response && !response.ok()) {
      throw new BridgeError('navigation', 'HTTP ' + response.status());
    }
    return null;
  }
  if (req.cmd === 'close') return null;

  const loc = build(page, req.locator);
  switch (req.cmd) {
    case 'count':
      return await loc.count();
    case 'click':
      await loc.click({ timeout: config.timeout });
      return null;
    case 'fill':
      await loc.fill(req.value, { timeout: config.timeout });
      return null;
    case 'select_option':
      await loc.selectOption({ label: req.label }, { timeout: config.timeout });
      return null;
    case 'inner_text':
      return await loc.innerText({ timeout: config.timeout });
    case 'all_inner_texts':
      return await loc.allInnerTexts();
    case 'wait_for_text':
      return await waitForText(loc);
    case 'wait_for':
      await loc.first().waitFor({ state: 'attached', timeout: config.timeout });
      return await loc.count();
    default:
      throw new BridgeError('other', 'unknown command: ' + req.cmd);
  }
}

async function classify(err, page, req) {
  const message = String((err && err.message) || err);
  if (err instanceof BridgeError) {
    return { kind: err.kind, message };
  }
  const strict = /strict mode violation[\s\S]*?resolved to (\d+) elements/.exec(message);
  if (strict) {
    return { kind: 'ambiguous', count: Number(strict[1]), message };
  }
  if (err && err.name === 'TimeoutError') {
    if (req.locator) {
      try {
        if ((await build(page, req.locator).count()) === 0) {
          return { kind: 'not_found', message };
        }
      } catch (_) {}
    }
    return { kind: 'timeout', message };
  }
  return { kind: 'other', message };
}

(async () => {
  const browser = await playwright[config.browser].launch({ headless: config.headless });
  const context = await browser.newContext({
    viewport: { width: config.viewportWidth, height: config.viewportHeight },
  });
  context.setDefaultTimeout(config.timeout);
  context.setDefaultNavigationTimeout(config.navigationTimeout);
  const page = await context.newPage();
  reply({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      const value = await handle(page, req);
      reply({ id: req.id, ok: true, value: value === undefined ? null : value });
    } catch (err) {
      reply(Object.assign({ id: req.id, ok: false }, await classify(err, page, req)));
    }
    if (req.cmd === 'close') break;
  }
  await browser.close();
  process.exit(0);
})().catch((err) => {
  reply({ id: 0, ok: false, kind: 'other', message: String((err && err.message) || err) });
  process.exit(1);
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::AriaRole;

    #[test]
    fn test_request_is_flat_json_with_command_tag() {
        let locator = Locator::role(AriaRole::Button, "Create");
        let command = BridgeCommand::Fill {
            locator: &locator,
            value: "Physics Pioneers",
        };
        let json = serde_json::to_value(BridgeRequest { id: 7, command: &command }).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "cmd": "fill",
                "locator": [{ "op": "role", "role": "button", "name": "Create" }],
                "value": "Physics Pioneers"
            })
        );
    }

    #[test]
    fn test_wait_for_targets_its_locator() {
        let locator = Locator::css(".study-group-row");
        let command = BridgeCommand::WaitFor { locator: &locator };
        let json = serde_json::to_value(BridgeRequest { id: 3, command: &command }).unwrap();

        assert_eq!(json["cmd"], "wait_for");
        assert_eq!(command.target(), "css(.study-group-row)");
    }

    #[test]
    fn test_launch_settings_are_camel_case() {
        let json = serde_json::to_value(BridgeLaunch::from(&PlaywrightConfig::default())).unwrap();
        assert_eq!(json["browser"], "chromium");
        assert_eq!(json["viewportWidth"], 1280);
        assert_eq!(json["navigationTimeout"], 30_000);
    }

    #[test]
    fn test_error_kinds_map_to_page_errors() {
        let parse = |line: &str| serde_json::from_str::<BridgeResponse>(line).unwrap();

        let err = parse(r#"{"id":1,"ok":false,"kind":"ambiguous","count":3,"message":"strict"}"#)
            .into_result("row".into(), 5000)
            .unwrap_err();
        assert!(matches!(err, PageError::AmbiguousMatch { count: 3, .. }));

        let err = parse(r#"{"id":1,"ok":false,"kind":"not_found","message":"t"}"#)
            .into_result("row".into(), 5000)
            .unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { .. }));

        let err = parse(r#"{"id":1,"ok":false,"kind":"navigation","message":"HTTP 502"}"#)
            .into_result("http://app".into(), 5000)
            .unwrap_err();
        match err {
            PageError::Navigation { url, reason } => {
                assert_eq!(url, "http://app");
                assert_eq!(reason, "HTTP 502");
            }
            other => panic!("expected Navigation, got {other:?}"),
        }

        let value = parse(r#"{"id":1,"ok":true,"value":4}"#)
            .into_result("rows".into(), 5000)
            .unwrap();
        assert_eq!(value, serde_json::json!(4));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("lynx".parse::<Browser>().is_err());
    }
}
