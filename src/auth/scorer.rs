use serde::{Deserialize, Serialize};

use super::jwt::jwt_exp;
use crate::error::{CtlError, Result};

pub const KEY_FILTER_MATCH: i64 = 1000;
pub const KEY_FILTER_MISS: i64 = -1000;
pub const KEY_ACCESS: i64 = 30;
pub const KEY_AUTH: i64 = 20;
pub const KEY_TOKEN: i64 = 10;
pub const KEY_SESSION: i64 = 5;
pub const JWT_LIVE: i64 = 50;
pub const JWT_EXPIRED: i64 = -200;
pub const LONG_TOKEN: i64 = 5;
pub const LONG_TOKEN_LEN: usize = 40;

/// A winner must score strictly above this.
pub const SCORE_FLOOR: i64 = -1;

/// A tokenish string found in page storage, with the key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCandidate {
    pub source_key: String,
    pub token: String,
}

pub fn strip_bearer(token: &str) -> &str {
    let t = token.trim();
    t.strip_prefix("Bearer ")
        .or_else(|| t.strip_prefix("bearer "))
        .unwrap_or(t)
        .trim()
}

/// Additive score for one candidate. `key_contains` must already be trimmed
/// and lowercased; empty disables the filter. `now` is Unix seconds.
pub fn score_candidate(c: &TokenCandidate, key_contains: &str, now: i64) -> i64 {
    let mut score = 0;
    let key = c.source_key.to_lowercase();

    if !key_contains.is_empty() {
        score += if key.contains(key_contains) { KEY_FILTER_MATCH } else { KEY_FILTER_MISS };
    }
    if key.contains("access") {
        score += KEY_ACCESS;
    }
    if key.contains("auth") {
        score += KEY_AUTH;
    }
    if key.contains("token") {
        score += KEY_TOKEN;
    }
    if key.contains("session") {
        score += KEY_SESSION;
    }

    let bare = strip_bearer(&c.token);
    if let Some(exp) = jwt_exp(bare) {
        if exp > now {
            // longer-lived tokens win ties between otherwise equal candidates
            score += JWT_LIVE + (exp - now) / 60;
        } else {
            score += JWT_EXPIRED;
        }
    }
    if bare.len() >= LONG_TOKEN_LEN {
        score += LONG_TOKEN;
    }
    score
}

/// Pick the most plausible bearer token, prefix-stripped and trimmed.
pub fn select_best_token_at(cands: &[TokenCandidate], key_contains: &str, now: i64) -> Result<String> {
    let key_contains = key_contains.trim().to_lowercase();
    let mut best_score = SCORE_FLOOR;
    let mut best: Option<&TokenCandidate> = None;

    for c in cands {
        let score = score_candidate(c, &key_contains, now);
        tracing::debug!(source_key = %c.source_key, score, "scored token candidate");
        if score > best_score {
            best_score = score;
            best = Some(c);
        }
    }

    match best.map(|c| strip_bearer(&c.token)) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(CtlError::NoSuitableToken),
    }
}

pub fn select_best_token(cands: &[TokenCandidate], key_contains: &str) -> Result<String> {
    select_best_token_at(cands, key_contains, chrono::Utc::now().timestamp())
}
