use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::utils::write_private;

/// The one local player process we manage, persisted between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub pid: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub episode_uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub paused: bool,
}

impl PlaybackState {
    /// `None` when nothing has been saved.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = serde_json::to_vec_pretty(self)?;
        out.push(b'\n');
        write_private(path, &out)?;
        Ok(())
    }

    /// Remove the state file; already gone is fine.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> PlaybackState {
        PlaybackState {
            pid: 4242,
            command: vec!["mpv".into(), "--no-video".into()],
            episode_uuid: "94c87775-4f63-42db-9684-e3b1b5fbac08".into(),
            title: "Foo".into(),
            started_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            paused: false,
        }
    }

    #[test]
    fn test_save_load_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("state.json");

        assert_eq!(PlaybackState::load(&p).unwrap(), None);

        let st = sample();
        st.save(&p).unwrap();
        assert_eq!(PlaybackState::load(&p).unwrap(), Some(st));

        PlaybackState::clear(&p).unwrap();
        PlaybackState::clear(&p).unwrap();
        assert!(!p.exists());
    }

    #[test]
    fn test_wire_format() {
        let mut st = sample();
        st.command.clear();
        let v = serde_json::to_value(&st).unwrap();
        assert_eq!(v["started_at"], "2025-03-01T12:00:00Z");
        assert_eq!(v["episode_uuid"], "94c87775-4f63-42db-9684-e3b1b5fbac08");
        assert!(v.get("command").is_none());

        let parsed: PlaybackState =
            serde_json::from_str(r#"{"pid":7,"started_at":"2025-03-01T12:00:00+01:00"}"#).unwrap();
        assert_eq!(parsed.pid, 7);
        assert!(!parsed.paused);
        assert!(parsed.title.is_empty());
    }

    #[test]
    fn test_corrupt_state_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("state.json");
        std::fs::write(&p, "not json").unwrap();
        assert!(PlaybackState::load(&p).is_err());
    }
}
