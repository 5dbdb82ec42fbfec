use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::model::{HarFile, Request, Target};

pub const HINT_AUTHZ: &str = "authz";
pub const HINT_COOKIE: &str = "cookie";
pub const HINT_CSRF: &str = "csrf";
pub const HINT_JSON: &str = "json";
pub const HINT_GRAPHQL: &str = "graphql";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub host_filter: String,
    pub total: usize,
    pub matched: usize,
    pub endpoints: Vec<EndpointCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCount {
    pub method: String,
    pub host: String,
    pub path: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// Group captured requests by (method, host, path) and tag each group with
/// what its requests carried. Entries with unusable URLs are skipped.
pub fn summarize(file: &HarFile, host_filter: &str) -> Summary {
    let host_filter = host_filter.trim();
    let needle = host_filter.to_lowercase();

    // Keyed in output order: host, path, method.
    let mut groups: BTreeMap<(String, String, String), (usize, BTreeSet<&'static str>)> =
        BTreeMap::new();
    let mut matched = 0;

    for entry in &file.log.entries {
        let req = &entry.request;
        let Some(target) = Target::parse(&req.url) else {
            continue;
        };
        if !target.matches_host(&needle) {
            continue;
        }
        matched += 1;

        let method = req.method.trim().to_uppercase();
        let slot = groups.entry((target.host, target.path, method)).or_default();
        slot.0 += 1;
        slot.1.extend(hints_for(req));
    }

    tracing::debug!(total = file.log.entries.len(), matched, groups = groups.len(), "summarized HAR");

    let endpoints = groups
        .into_iter()
        .map(|((host, path, method), (count, hints))| EndpointCount {
            method,
            host,
            path,
            count,
            hints: hints.into_iter().map(str::to_string).collect(),
        })
        .collect();

    Summary {
        host_filter: host_filter.to_string(),
        total: file.log.entries.len(),
        matched,
        endpoints,
    }
}

fn hints_for(req: &Request) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if req.has_header("authorization") {
        hints.push(HINT_AUTHZ);
    }
    if req.has_header("cookie") || !req.cookies.is_empty() {
        hints.push(HINT_COOKIE);
    }
    if req.has_header("x-csrf-token") || req.has_header("x-xsrf-token") {
        hints.push(HINT_CSRF);
    }
    if let Some(pd) = req.json_post_data() {
        hints.push(HINT_JSON);
        if looks_like_graphql(&pd.text) {
            hints.push(HINT_GRAPHQL);
        }
    }
    hints
}

/// Only the body's shape is inspected; values are never read.
pub fn looks_like_graphql(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(m)) => {
            m.contains_key("query") || (m.contains_key("operationName") && m.contains_key("variables"))
        }
        _ => false,
    }
}

pub fn format_summary_text(s: &Summary) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "Total entries: {}", s.total);
    if s.host_filter.is_empty() {
        let _ = writeln!(b, "Matched: {}", s.matched);
    } else {
        let _ = writeln!(b, "Matched host {:?}: {}", s.host_filter, s.matched);
    }
    if s.endpoints.is_empty() {
        return b;
    }
    b.push_str("\nEndpoints:\n");
    for e in &s.endpoints {
        let hints = if e.hints.is_empty() {
            String::new()
        } else {
            format!(" [{}]", e.hints.join(","))
        };
        let _ = writeln!(b, "- {} {} {}{} ({})", e.host, e.method, e.path, hints, e.count);
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::model::{Entry, NameValue, PostData};

    fn req(method: &str, url: &str) -> Request {
        Request { method: method.into(), url: url.into(), ..Default::default() }
    }

    fn file(reqs: Vec<Request>) -> HarFile {
        let mut f = HarFile::default();
        f.log.entries = reqs.into_iter().map(|request| Entry { request }).collect();
        f
    }

    #[test]
    fn test_summarize_host_filter() {
        let f = file(vec![
            req("POST", "https://play.pocketcasts.com/graphql"),
            req("post", "https://play.pocketcasts.com/graphql"),
            req("GET", "https://example.com/other"),
        ]);
        let s = summarize(&f, "play.pocketcasts.com");
        assert_eq!(s.total, 3);
        assert_eq!(s.matched, 2);
        assert_eq!(s.endpoints.len(), 1);
        assert_eq!(s.endpoints[0].method, "POST");
        assert_eq!(s.endpoints[0].path, "/graphql");
        assert_eq!(s.endpoints[0].count, 2);
    }

    #[test]
    fn test_summarize_skips_bad_urls_and_sorts() {
        let f = file(vec![
            req("GET", ""),
            req("GET", "::not a url::"),
            req("POST", "https://b.example/x"),
            req("GET", "https://a.example/z"),
            req("GET", "https://a.example/y"),
            req("DELETE", "https://a.example/y"),
        ]);
        let s = summarize(&f, "");
        assert_eq!(s.total, 6);
        assert_eq!(s.matched, 4);
        let order: Vec<_> = s
            .endpoints
            .iter()
            .map(|e| format!("{} {} {}", e.host, e.path, e.method))
            .collect();
        assert_eq!(
            order,
            vec!["a.example /y DELETE", "a.example /y GET", "a.example /z GET", "b.example /x POST"]
        );
    }

    #[test]
    fn test_hints() {
        let mut r = req("POST", "https://api.pocketcasts.com/graphql");
        r.headers = vec![
            NameValue { name: "Authorization".into(), value: "Bearer x".into() },
            NameValue { name: "X-XSRF-Token".into(), value: "t".into() },
        ];
        r.cookies = vec![NameValue { name: "sid".into(), value: "1".into() }];
        r.post_data = Some(PostData {
            mime_type: "application/json".into(),
            text: r#"{"operationName":"Q","variables":{}}"#.into(),
        });
        let plain = req("POST", "https://api.pocketcasts.com/graphql");

        let s = summarize(&file(vec![r, plain]), "api.");
        assert_eq!(s.endpoints.len(), 1);
        assert_eq!(s.endpoints[0].hints, vec!["authz", "cookie", "csrf", "graphql", "json"]);
    }

    #[test]
    fn test_hints_from_cookie_header_and_csrf_token() {
        let mut r = req("GET", "https://api.pocketcasts.com/user");
        r.headers = vec![
            NameValue { name: " Cookie ".into(), value: "sid=1".into() },
            NameValue { name: "X-CSRF-Token".into(), value: "t".into() },
        ];
        assert!(r.cookies.is_empty());

        let s = summarize(&file(vec![r]), "");
        assert_eq!(s.endpoints.len(), 1);
        assert_eq!(s.endpoints[0].hints, vec!["cookie", "csrf"]);
    }

    #[test]
    fn test_data_uris_group_together() {
        let s = summarize(
            &file(vec![
                req("GET", "data:image/png;base64,AAAABBBB"),
                req("GET", "data:image/png;base64,CCCCDDDD"),
            ]),
            "",
        );
        assert_eq!(s.matched, 2);
        assert_eq!(s.endpoints.len(), 1);
        assert_eq!((s.endpoints[0].host.as_str(), s.endpoints[0].path.as_str()), ("", ""));
        assert_eq!(s.endpoints[0].count, 2);
    }

    #[test]
    fn test_looks_like_graphql() {
        assert!(looks_like_graphql(r#"{"query":"{ me { id } }"}"#));
        assert!(looks_like_graphql(r#"{"operationName":"X","variables":null}"#));
        assert!(!looks_like_graphql(r#"{"operationName":"X"}"#));
        assert!(!looks_like_graphql("[1,2]"));
        assert!(!looks_like_graphql("nope"));
    }

    #[test]
    fn test_format_summary_text() {
        let s = summarize(&file(vec![req("GET", "https://a.example/y")]), "a.example");
        let text = format_summary_text(&s);
        assert!(text.starts_with("Total entries: 1\nMatched host \"a.example\": 1\n"));
        assert!(text.contains("- a.example GET /y (1)\n"));
    }
}
