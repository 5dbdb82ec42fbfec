use crate::error::{CtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    /// Chrome dictionary: `execute javascript`, `active tab index`.
    Chromium,
    Safari,
}

/// A scriptable browser resolved from a user-facing name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    pub kind: BrowserKind,
    pub app_name: String,
}

/// Lowercase and drop spaces, `-` and `_` so "Google Chrome" == "google-chrome".
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Default macOS application name for a known browser, `None` for custom ones.
pub fn default_app_for_browser(name: &str) -> Option<&'static str> {
    match normalize(name).as_str() {
        "" | "chrome" | "googlechrome" => Some("Google Chrome"),
        "brave" | "bravebrowser" => Some("Brave Browser"),
        "edge" | "microsoftedge" => Some("Microsoft Edge"),
        "arc" => Some("Arc"),
        "dia" => Some("Dia"),
        "safari" => Some("Safari"),
        _ => None,
    }
}

pub fn parse_browser(name: &str, app_override: &str) -> Result<Browser> {
    let app_override = app_override.trim();
    let norm = normalize(name);

    let kind = if norm == "safari" { BrowserKind::Safari } else { BrowserKind::Chromium };

    if let Some(default_app) = default_app_for_browser(name) {
        let app_name = if app_override.is_empty() { default_app } else { app_override };
        return Ok(Browser { kind, app_name: app_name.to_string() });
    }

    if norm == "chromium" && app_override.is_empty() {
        return Err(CtlError::Usage("browser=chromium requires --browser-app".into()));
    }

    // Anything else is taken as the application name of a Chromium-family browser.
    let app_name = if !app_override.is_empty() { app_override } else { name };
    if app_name.is_empty() {
        return Err(CtlError::Usage(format!("unsupported browser: {:?}", name)));
    }
    Ok(Browser { kind: BrowserKind::Chromium, app_name: app_name.to_string() })
}
