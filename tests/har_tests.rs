use pocketcastsctl::har::{graphql_ops, read_file, redact_file, summarize, HarFile, RedactOptions};
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn har(entries: Value) -> HarFile {
    serde_json::from_value(json!({"log": {"version": "1.2", "entries": entries}})).unwrap()
}

fn gql(op: &str, variables: Value) -> Value {
    json!({"request": {
        "method": "POST",
        "url": "https://play.pocketcasts.com/graphql",
        "headers": [{"name": "Content-Type", "value": "application/json"}],
        "postData": {
            "mimeType": "application/json",
            "text": json!({"operationName": op, "query": "mutation X { x }", "variables": variables}).to_string()
        }
    }})
}

#[test]
fn summarize_groups_by_endpoint() {
    let file = har(json!([
        {"request": {"method": "POST", "url": "https://play.pocketcasts.com/graphql"}},
        {"request": {"method": "POST", "url": "https://play.pocketcasts.com/graphql"}},
        {"request": {"method": "GET", "url": "https://example.com/other"}}
    ]));
    let s = summarize(&file, "play.pocketcasts.com");
    assert_eq!(s.total, 3);
    assert_eq!(s.matched, 2);
    assert_eq!(s.endpoints.len(), 1);
    let ep = &s.endpoints[0];
    assert_eq!((ep.method.as_str(), ep.host.as_str(), ep.path.as_str(), ep.count), ("POST", "play.pocketcasts.com", "/graphql", 2));

    assert_eq!(summarize(&file, "play.pocketcasts.com"), s);
}

#[test]
fn graphql_variable_keys_are_unioned() {
    let file = har(json!([
        gql("UpNextAdd", json!({"episodeId": "e", "position": 0})),
        gql("UpNextAdd", json!({"episodeId": "e"}))
    ]));
    let s = graphql_ops(&file, "");
    assert_eq!(s.ops.len(), 1);
    assert_eq!(s.ops[0].operation_name, "UpNextAdd");
    assert_eq!(s.ops[0].count, 2);
    assert_eq!(s.ops[0].variable_keys, vec!["episodeId", "position"]);
}

fn key_set(v: &Value) -> BTreeSet<String> {
    v.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default()
}

#[test]
fn redact_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in.har");
    let output = tmp.path().join("out").join("redacted.har");

    let original = json!({"log": {"version": "1.2", "entries": [
        {"request": {
            "method": "POST",
            "url": "https://api.pocketcasts.com/user/login?token=SECRET_QUERY",
            "headers": [
                {"name": "Authorization", "value": "Bearer SECRET_BEARER"},
                {"name": "Accept", "value": "application/json"}
            ],
            "cookies": [{"name": "sid", "value": "SECRET_COOKIE"}],
            "queryString": [{"name": "token", "value": "SECRET_QUERY"}],
            "postData": {"mimeType": "application/json", "text": "{\"email\":\"me@SECRET.example\",\"password\":\"SECRET_PW\",\"keep\":1}"}
        }, "response": {"status": 200}},
        {"request": {"method": "GET", "url": "https://api.pocketcasts.com/up_next/list", "headers": []}}
    ]}});
    std::fs::write(&input, serde_json::to_vec(&original).unwrap()).unwrap();

    redact_file(&input, &output, &RedactOptions::default()).unwrap();

    let bytes = std::fs::read(&output).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    for secret in ["SECRET_BEARER", "SECRET_COOKIE", "SECRET_QUERY", "SECRET_PW", "me@SECRET.example"] {
        assert!(!text.contains(secret), "{} leaked", secret);
    }

    let redacted: Value = serde_json::from_str(&text).unwrap();
    let before = original["log"]["entries"].as_array().unwrap();
    let after = redacted["log"]["entries"].as_array().unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after) {
        assert_eq!(key_set(b), key_set(a));
        assert_eq!(key_set(&b["request"]), key_set(&a["request"]));
    }
    assert_eq!(after[0]["request"]["headers"][1]["value"], "application/json");

    // the redacted file still loads as a capture
    assert_eq!(read_file(&output).unwrap().log.entries.len(), 2);
}
