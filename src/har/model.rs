use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use url::{Host, Url};

use crate::error::Result;

/// The subset of the HAR 1.2 schema the traffic tools read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarFile {
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub request: Request,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<NameValue>,
    pub cookies: Vec<NameValue>,
    pub query_string: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: String,
    pub text: String,
}

impl Request {
    pub fn has_header(&self, name_lower: &str) -> bool {
        self.headers
            .iter()
            .any(|h| h.name.trim().to_lowercase() == name_lower)
    }

    /// Post data declared as some flavour of JSON.
    pub fn json_post_data(&self) -> Option<&PostData> {
        self.post_data
            .as_ref()
            .filter(|pd| pd.mime_type.to_lowercase().contains("json"))
    }

    /// The JSON post body, when it is declared JSON and parses to an object.
    pub fn json_body(&self) -> Option<Map<String, Value>> {
        let pd = self.json_post_data()?;
        match serde_json::from_str::<Value>(&pd.text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Host and escaped path of a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub path: String,
}

impl Target {
    /// `None` for empty or unparseable URLs.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let u = Url::parse(raw).ok()?;
        let host = match u.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };
        // data:, mailto: and friends have no hierarchical path
        let path = if u.cannot_be_a_base() { String::new() } else { u.path().to_string() };
        Some(Self { host, path })
    }

    /// `needle_lower` must already be trimmed and lowercased; empty matches everything.
    pub fn matches_host(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.host.to_lowercase().contains(needle_lower)
    }
}

pub fn read_file(path: &Path) -> Result<HarFile> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
