use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::model::{HarFile, Target};
use super::summarize::summarize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlSummary {
    pub host_filter: String,
    pub total: usize,
    pub matched: usize,
    pub ops: Vec<GraphQlOp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<GraphQlHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlOp {
    pub operation_name: String,
    pub path: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variable_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphQlHit {
    pub path: String,
}

/// Count GraphQL operations by name and path, collecting which top-level
/// variables each one was sent with.
pub fn graphql_ops(file: &HarFile, host_filter: &str) -> GraphQlSummary {
    let endpoints = summarize(file, host_filter);
    let needle = endpoints.host_filter.to_lowercase();

    let mut ops: BTreeMap<(String, String), (usize, BTreeSet<String>)> = BTreeMap::new();
    let mut unknown: BTreeSet<String> = BTreeSet::new();

    for entry in &file.log.entries {
        let req = &entry.request;
        let Some(target) = Target::parse(&req.url) else {
            continue;
        };
        if !target.matches_host(&needle) {
            continue;
        }
        let Some(body) = req.json_body() else {
            continue;
        };

        let op_name = body.get("operationName").and_then(Value::as_str).unwrap_or("");
        if op_name.is_empty() {
            unknown.insert(target.path);
            continue;
        }

        let slot = ops.entry((target.path, op_name.to_string())).or_default();
        slot.0 += 1;
        if let Some(Value::Object(vars)) = body.get("variables") {
            slot.1.extend(vars.keys().cloned());
        }
    }

    GraphQlSummary {
        host_filter: endpoints.host_filter,
        total: endpoints.total,
        matched: endpoints.matched,
        ops: ops
            .into_iter()
            .map(|((path, operation_name), (count, keys))| GraphQlOp {
                operation_name,
                path,
                count,
                variable_keys: keys.into_iter().collect(),
            })
            .collect(),
        unknown: unknown.into_iter().map(|path| GraphQlHit { path }).collect(),
    }
}

pub fn format_graphql_text(s: &GraphQlSummary) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "Total entries: {}", s.total);
    if s.host_filter.is_empty() {
        let _ = writeln!(b, "Matched: {}", s.matched);
    } else {
        let _ = writeln!(b, "Matched host {:?}: {}", s.host_filter, s.matched);
    }
    if s.ops.is_empty() {
        b.push_str("\nNo GraphQL operations found (by operationName).\n");
        return b;
    }
    b.push_str("\nGraphQL operations:\n");
    for op in &s.ops {
        let vars = if op.variable_keys.is_empty() {
            String::new()
        } else {
            format!(" vars={}", op.variable_keys.join(","))
        };
        let _ = writeln!(b, "- {} {} ({}){}", op.path, op.operation_name, op.count, vars);
    }
    if !s.unknown.is_empty() {
        b.push_str("\nGraphQL-like JSON without operationName:\n");
        for hit in &s.unknown {
            let _ = writeln!(b, "- {}", hit.path);
        }
    }
    b
}
