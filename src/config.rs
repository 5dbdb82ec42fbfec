use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const APP_DIR: &str = "pocketcastsctl";

/// Overrides the config directory (config.json and state.json live there).
pub const CONFIG_DIR_ENV: &str = "POCKETCASTSCTL_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: String,
    pub browser_app: String,
    pub url_contains: String,
    pub api_base_url: String,
    pub api_headers: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: "chrome".into(),
            browser_app: String::new(),
            url_contains: "pocketcasts.com".into(),
            api_base_url: "https://api.pocketcasts.com".into(),
            api_headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let mut cfg: Config = serde_json::from_slice(&data)?;
        cfg.fill_blanks();
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut out = serde_json::to_vec_pretty(self)?;
        out.push(b'\n');
        crate::utils::write_private(path, &out)?;
        Ok(())
    }

    fn fill_blanks(&mut self) {
        let defaults = Self::default();
        if self.browser.trim().is_empty() {
            self.browser = defaults.browser;
        }
        if self.url_contains.trim().is_empty() {
            self.url_contains = defaults.url_contains;
        }
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = defaults.api_base_url;
        }
    }
}

pub fn dir() -> PathBuf {
    if let Some(d) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(d);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

pub fn path() -> PathBuf {
    dir().join("config.json")
}

pub fn state_path() -> PathBuf {
    dir().join("state.json")
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_blank_fields_backfilled() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        std::fs::write(&p, r#"{"browser":"","browser_app":"Arc","api_headers":{"Authorization":"Bearer x"}}"#).unwrap();
        let cfg = Config::load_from(&p).unwrap();
        assert_eq!(cfg.browser, "chrome");
        assert_eq!(cfg.browser_app, "Arc");
        assert_eq!(cfg.url_contains, "pocketcasts.com");
        assert_eq!(cfg.api_headers["Authorization"], "Bearer x");
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.browser = "safari".into();
        cfg.save_to(&p).unwrap();
        assert_eq!(Config::load_from(&p).unwrap(), cfg);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&p).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_bad_json_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        std::fs::write(&p, "{").unwrap();
        assert!(Config::load_from(&p).is_err());
    }
}
