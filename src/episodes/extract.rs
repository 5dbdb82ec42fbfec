use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::{CtlError, Result};

static UUID_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern compiles")
});

const UUID_KEYS: &[&str] = &["uuid", "episodeUuid", "episode_uuid"];
const TITLE_KEYS: &[&str] = &["title", "episodeTitle", "episode_title"];
const PODCAST_KEYS: &[&str] = &["podcast", "podcastUuid", "podcast_uuid"];
const PUBLISHED_KEYS: &[&str] = &["published", "publishedAt", "published_at"];
const URL_KEYS: &[&str] = &["url", "audioUrl", "audio_url"];

/// One queued episode as seen in an Up Next response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    pub uuid: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Episode {
    /// Fill attributes this record is missing from a later sighting of the same episode.
    fn merge(&mut self, other: Episode) {
        if self.title.is_empty() {
            self.title = other.title;
        }
        if self.podcast.is_none() {
            self.podcast = other.podcast;
        }
        if self.published.is_none() {
            self.published = other.published;
        }
        if self.url.is_none() {
            self.url = other.url;
        }
    }
}

type Strategy = fn(&Value) -> Vec<Episode>;

/// Tried in order; the first strategy that yields anything wins.
const STRATEGIES: &[(&str, Strategy)] = &[("best-array", best_array), ("scatter-scan", scatter_scan)];

/// Find episode-like objects anywhere in an Up Next response.
///
/// The response shape is undocumented and drifts between API versions, so
/// only a UUID and a title are required and the field names are matched
/// against a few known aliases.
pub fn extract(root: &Value) -> Result<Vec<Episode>> {
    for (name, strategy) in STRATEGIES {
        let episodes = strategy(root);
        if !episodes.is_empty() {
            tracing::debug!(strategy = %name, count = episodes.len(), "extracted episodes");
            return Ok(episodes);
        }
    }
    Err(CtlError::NoEpisodesFound)
}

/// Parse raw bytes first; malformed JSON is reported as `InvalidJson`, not as an empty result.
pub fn extract_bytes(raw: &[u8]) -> Result<Vec<Episode>> {
    let root: Value = serde_json::from_slice(raw)?;
    extract(&root)
}

pub fn is_uuid(s: &str) -> bool {
    UUID_LIKE.is_match(s.trim())
}

fn best_array(root: &Value) -> Vec<Episode> {
    let mut best: Option<(usize, &Vec<Value>)> = None;
    find_best_array(root, &mut best);

    let Some((_, items)) = best else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(episode_from)
        .filter(|ep| seen.insert(ep.uuid.clone()))
        .collect()
}

// Pre-order: an array is scored before its own children. serde_json maps
// iterate in key order, which keeps the traversal deterministic.
fn find_best_array<'a>(v: &'a Value, best: &mut Option<(usize, &'a Vec<Value>)>) {
    match v {
        Value::Array(items) => {
            let score = items
                .iter()
                .filter_map(Value::as_object)
                .filter(|m| episode_from(m).is_some())
                .count();
            if score > best.map_or(0, |(s, _)| s) {
                *best = Some((score, items));
            }
            for item in items {
                find_best_array(item, best);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                find_best_array(child, best);
            }
        }
        _ => {}
    }
}

fn scatter_scan(root: &Value) -> Vec<Episode> {
    let mut out = Vec::new();
    let mut index = HashMap::new();
    collect_scattered(root, &mut out, &mut index);
    out
}

fn collect_scattered(v: &Value, out: &mut Vec<Episode>, index: &mut HashMap<String, usize>) {
    match v {
        Value::Array(items) => {
            for item in items {
                collect_scattered(item, out, index);
            }
        }
        Value::Object(map) => {
            if let Some(ep) = episode_from(map) {
                match index.get(&ep.uuid) {
                    Some(&i) => out[i].merge(ep),
                    None => {
                        index.insert(ep.uuid.clone(), out.len());
                        out.push(ep);
                    }
                }
            }
            for child in map.values() {
                collect_scattered(child, out, index);
            }
        }
        _ => {}
    }
}

fn episode_from(obj: &Map<String, Value>) -> Option<Episode> {
    let uuid = first_string(obj, UUID_KEYS, false)?.trim();
    if !is_uuid(uuid) {
        return None;
    }
    let title = first_string(obj, TITLE_KEYS, false)?.trim();

    Some(Episode {
        uuid: uuid.to_string(),
        title: title.to_string(),
        podcast: first_string(obj, PODCAST_KEYS, true).map(str::to_string),
        published: first_string(obj, PUBLISHED_KEYS, false).map(str::to_string),
        url: first_string(obj, URL_KEYS, true).map(str::to_string),
    })
}

/// First alias holding a non-blank string. With `nested`, an object value
/// carrying its own `uuid` string also counts.
fn first_string<'a>(obj: &'a Map<String, Value>, keys: &[&str], nested: bool) -> Option<&'a str> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s),
            Some(Value::Object(inner)) if nested => {
                if let Some(Value::String(s)) = inner.get("uuid") {
                    if !s.trim().is_empty() {
                        return Some(s);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "94c87775-4f63-42db-9684-e3b1b5fbac08";
    const B: &str = "826f30b0-adce-4f3b-b200-eacb1aa711eb";
    const C: &str = "1b96d010-ed82-013c-3086-0affccc8fded";

    #[test]
    fn test_extract_up_next_shape() {
        let raw = br#"{
  "up_next": {
    "episodes": [
      {"uuid":"94c87775-4f63-42db-9684-e3b1b5fbac08","title":"Ep 1","podcast":"1b96d010-ed82-013c-3086-0affccc8fded","published":"2025-12-17T09:15:00Z","url":"https://example.com/a.mp3"},
      {"uuid":"826f30b0-adce-4f3b-b200-eacb1aa711eb","title":"Ep 2"}
    ]
  }
}"#;
        let eps = extract_bytes(raw).unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].uuid, A);
        assert_eq!(eps[0].title, "Ep 1");
        assert_eq!(eps[0].podcast.as_deref(), Some(C));
        assert_eq!(eps[0].url.as_deref(), Some("https://example.com/a.mp3"));
        assert_eq!(eps[1].podcast, None);
    }

    #[test]
    fn test_uuid_pattern() {
        assert!(is_uuid(A));
        assert!(is_uuid(&A.to_uppercase()));
        assert!(is_uuid(&format!("  {A} ")));
        assert!(!is_uuid("94c87775-4f63-42db-9684-e3b1b5fbac0"));
        assert!(!is_uuid("94c87775f63-42db-9684-e3b1b5fbac08x"));
        assert!(!is_uuid(""));
    }

    #[test]
    fn test_best_array_beats_smaller_arrays() {
        let v = json!({
            "a_related": [{"uuid": C, "title": "Other show"}],
            "queue": [
                {"episodeUuid": A, "episodeTitle": "One"},
                {"episode_uuid": B, "episode_title": "Two"}
            ]
        });
        let eps = extract(&v).unwrap();
        let ids: Vec<_> = eps.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(ids, vec![A, B]);
    }

    #[test]
    fn test_best_array_tie_keeps_first_in_key_order() {
        let v = json!({
            "b": [{"uuid": B, "title": "B"}],
            "a": [{"uuid": A, "title": "A"}]
        });
        let eps = extract(&v).unwrap();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].uuid, A);
    }

    #[test]
    fn test_best_array_dedupes_by_uuid() {
        let v = json!([
            {"uuid": A, "title": "first"},
            {"uuid": A, "title": "second"},
            {"uuid": B, "title": "other"},
            "noise",
            {"uuid": "not-a-uuid", "title": "skip"}
        ]);
        let eps = extract(&v).unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].title, "first");
    }

    #[test]
    fn test_scatter_scan_merges_sightings() {
        let v = json!({
            "current": {"uuid": A, "title": "Now playing"},
            "detail": {"inner": {"uuid": A, "title": "Ignored", "audioUrl": "https://x/a.mp3", "podcast": {"uuid": C}}},
            "next": {"uuid": B, "title": "Later"}
        });
        let eps = extract(&v).unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].uuid, A);
        assert_eq!(eps[0].title, "Now playing");
        assert_eq!(eps[0].url.as_deref(), Some("https://x/a.mp3"));
        assert_eq!(eps[0].podcast.as_deref(), Some(C));
        assert_eq!(eps[1].uuid, B);
    }

    #[test]
    fn test_blank_title_does_not_qualify() {
        let v = json!({"episodes": [{"uuid": A, "title": "   "}]});
        assert!(matches!(extract(&v), Err(CtlError::NoEpisodesFound)));
    }

    #[test]
    fn test_no_episodes() {
        let v = json!({"episodes": [], "meta": {"total": 0}});
        assert!(matches!(extract(&v), Err(CtlError::NoEpisodesFound)));
    }

    #[test]
    fn test_invalid_json_is_distinct() {
        assert!(matches!(extract_bytes(b"{not json"), Err(CtlError::InvalidJson(_))));
    }

    #[test]
    fn test_extract_is_repeatable() {
        let v = json!({"x": [{"uuid": A, "title": "A"}], "y": {"uuid": B, "title": "B"}});
        assert_eq!(extract(&v).unwrap(), extract(&v).unwrap());
    }
}
