use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

use crate::error::Result;
use crate::utils::write_private;

pub const REDACTED: &str = "<redacted>";

/// What gets masked. Header and query names compare lowercased; JSON keys compare exactly.
#[derive(Debug, Clone)]
pub struct RedactOptions {
    pub headers: HashSet<String>,
    pub query_params: HashSet<String>,
    pub json_keys: HashSet<String>,
    pub replacement: String,
}

impl Default for RedactOptions {
    fn default() -> Self {
        let set = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<HashSet<_>>();
        Self {
            headers: set(&[
                "authorization",
                "cookie",
                "x-csrf-token",
                "x-xsrf-token",
                "x-api-key",
                "x-auth-token",
                "x-access-token",
            ]),
            query_params: set(&["token", "access_token", "auth"]),
            json_keys: set(&[
                "email",
                "password",
                "token",
                "accessToken",
                "refreshToken",
                "session",
                "cookie",
            ]),
            replacement: REDACTED.to_string(),
        }
    }
}

/// Mask secrets in a parsed HAR document in place. Shapes the walker does
/// not recognise are left untouched.
pub fn redact_value(root: &mut Value, opts: &RedactOptions) {
    let Some(entries) = root
        .pointer_mut("/log/entries")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for entry in entries {
        let Some(req) = entry.get_mut("request").and_then(Value::as_object_mut) else {
            continue;
        };
        if let Some(headers) = req.get_mut("headers") {
            redact_named(headers, &opts.headers, &opts.replacement);
        }
        if let Some(query) = req.get_mut("queryString") {
            redact_named(query, &opts.query_params, &opts.replacement);
        }
        if let Some(Value::String(raw)) = req.get_mut("url") {
            if let Some(masked) = redact_url_query(raw, &opts.query_params, &opts.replacement) {
                *raw = masked;
            }
        }
        if let Some(Value::Array(cookies)) = req.get_mut("cookies") {
            for cookie in cookies.iter_mut().filter_map(Value::as_object_mut) {
                if let Some(v) = cookie.get_mut("value") {
                    *v = Value::String(opts.replacement.clone());
                }
            }
        }
        if let Some(post_data) = req.get_mut("postData") {
            redact_post_data(post_data, opts);
        }
    }
}

pub fn redact_file(in_path: &Path, out_path: &Path, opts: &RedactOptions) -> Result<()> {
    let data = std::fs::read(in_path)?;
    let mut root: Value = serde_json::from_slice(&data)?;
    redact_value(&mut root, opts);

    let mut out = serde_json::to_vec_pretty(&root)?;
    out.push(b'\n');

    write_private(out_path, &out)?;
    tracing::info!(input = %in_path.display(), output = %out_path.display(), "wrote redacted HAR");
    Ok(())
}

fn redact_named(list: &mut Value, names: &HashSet<String>, replacement: &str) {
    let Value::Array(items) = list else {
        return;
    };
    for item in items.iter_mut().filter_map(Value::as_object_mut) {
        let name = match item.get("name").and_then(Value::as_str) {
            Some(n) if !n.is_empty() => n.trim().to_lowercase(),
            _ => continue,
        };
        if names.contains(&name) {
            item.insert("value".into(), Value::String(replacement.to_string()));
        }
    }
}

/// The URL with sensitive query values replaced, or `None` when it does not
/// parse or carries nothing to mask.
fn redact_url_query(raw: &str, names: &HashSet<String>, replacement: &str) -> Option<String> {
    let mut u = Url::parse(raw.trim()).ok()?;
    let is_sensitive = |k: &str| names.contains(&k.trim().to_lowercase());

    let pairs: Vec<(String, String)> = u.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    if !pairs.iter().any(|(k, _)| is_sensitive(k.as_str())) {
        return None;
    }
    u.query_pairs_mut().clear().extend_pairs(pairs.iter().map(|(k, v)| {
        let v = if is_sensitive(k.as_str()) { replacement } else { v.as_str() };
        (k.as_str(), v)
    }));
    Some(u.to_string())
}

fn redact_post_data(post_data: &mut Value, opts: &RedactOptions) {
    let Value::Object(pd) = post_data else {
        return;
    };
    let is_json = pd
        .get("mimeType")
        .and_then(Value::as_str)
        .map(|m| m.to_lowercase().contains("json"))
        .unwrap_or(false);
    let text = pd.get("text").and_then(Value::as_str).unwrap_or("");
    if !is_json || text.is_empty() {
        return;
    }

    let Ok(mut body) = serde_json::from_str::<Value>(text) else {
        return;
    };
    redact_json(&mut body, opts);
    if let Ok(s) = serde_json::to_string(&body) {
        pd.insert("text".into(), Value::String(s));
    }
}

fn redact_json(v: &mut Value, opts: &RedactOptions) {
    match v {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if opts.json_keys.contains(key) {
                    *child = Value::String(opts.replacement.clone());
                } else {
                    redact_json(child, opts);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_json(item, opts);
            }
        }
        _ => {}
    }
}
