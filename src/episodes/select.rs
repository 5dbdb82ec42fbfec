use super::Episode;
use crate::error::{CtlError, Result};

/// Keep episodes whose title contains `search` (case-insensitive). Blank search keeps all.
pub fn filter_episodes(episodes: Vec<Episode>, search: &str) -> Vec<Episode> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return episodes;
    }
    episodes
        .into_iter()
        .filter(|ep| ep.title.to_lowercase().contains(&needle))
        .collect()
}

/// Resolve a selector: 1-based index, full UUID, or UUID prefix.
pub fn select_episode<'a>(episodes: &'a [Episode], selector: &str) -> Result<&'a Episode> {
    let sel = selector.trim();
    if sel.is_empty() {
        return Err(CtlError::Usage("empty selector".into()));
    }

    if let Ok(n) = sel.parse::<i64>() {
        if n <= 0 || n as usize > episodes.len() {
            return Err(CtlError::Usage(format!(
                "index out of range: {} (1..{})",
                n,
                episodes.len()
            )));
        }
        return Ok(&episodes[n as usize - 1]);
    }

    if let Some(ep) = episodes.iter().find(|ep| ep.uuid.trim().eq_ignore_ascii_case(sel)) {
        return Ok(ep);
    }

    let prefix = sel.to_lowercase();
    episodes
        .iter()
        .find(|ep| ep.uuid.to_lowercase().starts_with(&prefix))
        .ok_or_else(|| CtlError::Usage(format!("no episode matches {:?}", sel)))
}

pub fn short_uuid(uuid: &str) -> &str {
    uuid.get(..8).unwrap_or(uuid)
}

pub fn display_title(ep: &Episode) -> &str {
    let title = ep.title.trim();
    if title.is_empty() {
        "(untitled)"
    } else {
        title
    }
}

/// Date part of the published timestamp, when there is one.
pub fn published_date(ep: &Episode) -> Option<&str> {
    let published = ep.published.as_deref()?.trim();
    if published.is_empty() {
        return None;
    }
    Some(published.get(..10).unwrap_or(published))
}
