use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::process::Command;

use super::kind::{parse_browser, Browser};
use super::scripts;
use crate::auth::TokenCandidate;
use crate::error::{CtlError, Result};

pub const SCRIPT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Pause,
    Toggle,
    Next,
    Prev,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Play => "play",
            Action::Pause => "pause",
            Action::Toggle => "toggle",
            Action::Next => "next",
            Action::Prev => "prev",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionResult {
    pub clicked: bool,
    pub clicked_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusResult {
    /// playing | paused | unknown
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueItem {
    pub title: String,
    pub href: String,
}

/// Keep queue items whose title contains `search` (case-insensitive).
pub fn filter_queue_items(items: Vec<QueueItem>, search: &str) -> Vec<QueueItem> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|it| it.title.to_lowercase().contains(&needle))
        .collect()
}

/// Runs an AppleScript with positional arguments and returns its trimmed output.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str, args: &[&str]) -> Result<String>;
}

/// `osascript -e <script> <args...>` with a per-call timeout.
#[derive(Debug, Clone)]
pub struct Osascript {
    timeout: Duration,
}

impl Default for Osascript {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(SCRIPT_TIMEOUT_SECS) }
    }
}

#[async_trait]
impl ScriptRunner for Osascript {
    async fn run(&self, script: &str, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(script).args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CtlError::Timeout(self.timeout.as_secs()))??;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let msg = [stderr, stdout]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| format!("osascript exited with {}", output.status));
        tracing::debug!(error = %msg, "osascript failed");
        Err(CtlError::Browser(msg))
    }
}

/// Drives the Pocket Casts tab of one browser.
pub struct Controller<R: ScriptRunner = Osascript> {
    browser: Browser,
    url_contains: String,
    runner: R,
}

impl Controller<Osascript> {
    pub fn new(browser: &str, browser_app: &str, url_contains: &str) -> Result<Self> {
        let browser = parse_browser(browser, browser_app)?;
        Self::with_runner(browser, url_contains, Osascript::default())
    }
}

impl<R: ScriptRunner> Controller<R> {
    pub fn with_runner(browser: Browser, url_contains: &str, runner: R) -> Result<Self> {
        let url_contains = url_contains.trim();
        if url_contains.is_empty() {
            return Err(CtlError::Usage("url-contains cannot be empty".into()));
        }
        Ok(Self { browser, url_contains: url_contains.to_string(), runner })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Click the control for `action`; finding no control is an error.
    pub async fn run_action(&self, action: Action) -> Result<ActionResult> {
        let res: ActionResult = self.eval(&scripts::js_for_action(action)).await?;
        if !res.clicked {
            return Err(CtlError::Browser(format!(
                "no matching control found in page (action={})",
                action
            )));
        }
        tracing::debug!(action = %action, label = %res.clicked_label, "clicked");
        Ok(res)
    }

    pub async fn status(&self) -> Result<StatusResult> {
        let mut st: StatusResult = self.eval(scripts::JS_STATUS).await?;
        if st.state.is_empty() {
            st.state = "unknown".into();
        }
        Ok(st)
    }

    pub async fn queue_list(&self) -> Result<Vec<QueueItem>> {
        self.eval(scripts::JS_QUEUE_LIST).await
    }

    pub async fn token_candidates(&self) -> Result<Vec<TokenCandidate>> {
        self.eval(scripts::JS_TOKEN_CANDIDATES).await
    }

    /// URLs of every open tab, matching or not.
    pub async fn tab_urls(&self) -> Result<Vec<String>> {
        let out = self
            .runner
            .run(scripts::list_urls(self.browser.kind), &[self.browser.app_name.as_str()])
            .await?;
        parse_output(&out)
    }

    pub async fn set_tab_url(&self, new_url: &str) -> Result<()> {
        let new_url = new_url.trim();
        if new_url.is_empty() {
            return Err(CtlError::Usage("new URL cannot be empty".into()));
        }
        self.runner
            .run(
                scripts::set_url(self.browser.kind),
                &[self.browser.app_name.as_str(), self.url_contains.as_str(), new_url],
            )
            .await?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T> {
        let out = self
            .runner
            .run(
                scripts::run_js(self.browser.kind),
                &[self.browser.app_name.as_str(), self.url_contains.as_str(), js],
            )
            .await?;
        parse_output(&out)
    }
}

fn parse_output<T: DeserializeOwned>(out: &str) -> Result<T> {
    serde_json::from_str(out).map_err(|_| CtlError::Browser(format!("unexpected JS result: {:?}", out)))
}

/// Failures that usually mean the tab is missing or automation permissions are off.
pub fn is_automation_hint_error(err: &CtlError) -> bool {
    const HINTS: &[&str] = &[
        "no tab found",
        "syntax error",
        "expected end of line",
        "not authorized to send apple events",
        "not allowed assistive access",
        "application isn’t running",
        "application isn't running",
    ];
    let msg = err.to_string().to_lowercase();
    HINTS.iter().any(|h| msg.contains(h))
}

/// `open [-a app] url`
pub async fn open_in_browser(app_name: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CtlError::Usage("url cannot be empty".into()));
    }
    let mut cmd = Command::new("open");
    if !app_name.trim().is_empty() {
        cmd.arg("-a").arg(app_name.trim());
    }
    let status = cmd.arg(url).status().await?;
    if !status.success() {
        return Err(CtlError::Browser(format!("open exited with {}", status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::kind::BrowserKind;
    use std::sync::Mutex;

    /// Replays canned outputs and records the argv of each call.
    #[derive(Default)]
    struct FakeRunner {
        outputs: Mutex<Vec<Result<String>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeRunner {
        fn replying(outputs: Vec<Result<String>>) -> Self {
            Self { outputs: Mutex::new(outputs), calls: Mutex::default() }
        }
    }

    #[async_trait]
    impl ScriptRunner for FakeRunner {
        async fn run(&self, _script: &str, args: &[&str]) -> Result<String> {
            self.calls.lock().unwrap().push(args.iter().map(|s| s.to_string()).collect());
            self.outputs.lock().unwrap().remove(0)
        }
    }

    fn controller(outputs: Vec<Result<String>>) -> Controller<FakeRunner> {
        let browser = Browser { kind: BrowserKind::Chromium, app_name: "Google Chrome".into() };
        Controller::with_runner(browser, " pocketcasts.com ", FakeRunner::replying(outputs)).unwrap()
    }

    #[test]
    fn test_empty_url_contains_rejected() {
        let browser = Browser { kind: BrowserKind::Safari, app_name: "Safari".into() };
        let res = Controller::with_runner(browser, "  ", FakeRunner::default());
        assert!(matches!(res, Err(CtlError::Usage(_))));
    }

    #[tokio::test]
    async fn test_run_action_clicked() {
        let c = controller(vec![Ok(r#"{"clicked":true,"clickedLabel":"Resume"}"#.into())]);
        let res = c.run_action(Action::Play).await.unwrap();
        assert_eq!(res.clicked_label, "Resume");

        let calls = c.runner.calls.lock().unwrap();
        assert_eq!(calls[0][0], "Google Chrome");
        assert_eq!(calls[0][1], "pocketcasts.com");
        assert!(calls[0][2].contains("Play episode"));
    }

    #[tokio::test]
    async fn test_run_action_nothing_clicked() {
        let c = controller(vec![Ok(r#"{"clicked":false,"clickedLabel":""}"#.into())]);
        let err = c.run_action(Action::Next).await.unwrap_err();
        assert!(err.to_string().contains("action=next"));
    }

    #[tokio::test]
    async fn test_status_and_garbage() {
        let c = controller(vec![Ok("{}".into()), Ok("missing value".into())]);
        assert_eq!(c.status().await.unwrap().state, "unknown");
        let err = c.status().await.unwrap_err();
        assert!(err.to_string().starts_with("unexpected JS result"));
    }

    #[tokio::test]
    async fn test_queue_and_tokens() {
        let c = controller(vec![
            Ok(r#"[{"title":"Ep 1","href":"https://play.pocketcasts.com/episode/x"}]"#.into()),
            Ok(r#"[{"sourceKey":"accessToken","token":"abc"}]"#.into()),
        ]);
        let items = c.queue_list().await.unwrap();
        assert_eq!(items[0].title, "Ep 1");
        let cands = c.token_candidates().await.unwrap();
        assert_eq!(cands[0].source_key, "accessToken");
    }

    #[tokio::test]
    async fn test_tab_urls_and_set_url() {
        let c = controller(vec![Ok(r#"["https://a","https://b"]"#.into()), Ok("ok".into())]);
        assert_eq!(c.tab_urls().await.unwrap(), vec!["https://a", "https://b"]);
        c.set_tab_url(" https://play.pocketcasts.com/episode/u ").await.unwrap();

        let calls = c.runner.calls.lock().unwrap();
        assert_eq!(calls[0], vec!["Google Chrome"]);
        assert_eq!(calls[1][2], "https://play.pocketcasts.com/episode/u");
    }

    #[tokio::test]
    async fn test_set_empty_url_is_usage() {
        let c = controller(vec![]);
        assert!(matches!(c.set_tab_url(" ").await, Err(CtlError::Usage(_))));
    }

    #[test]
    fn test_hint_errors() {
        assert!(is_automation_hint_error(&CtlError::Browser(
            "No tab found in Arc with URL containing: pocketcasts".into()
        )));
        assert!(is_automation_hint_error(&CtlError::Browser(
            "Not authorized to send Apple events to Google Chrome. (-1743)".into()
        )));
        assert!(!is_automation_hint_error(&CtlError::Timeout(10)));
    }

    #[test]
    fn test_filter_queue_items() {
        let items = vec![
            QueueItem { title: "Daily News".into(), href: "a".into() },
            QueueItem { title: "Weekly".into(), href: "b".into() },
        ];
        assert_eq!(filter_queue_items(items.clone(), " news ").len(), 1);
        assert_eq!(filter_queue_items(items, "").len(), 2);
    }
}
