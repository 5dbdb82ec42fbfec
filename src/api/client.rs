use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::episodes::Episode;
use crate::error::{CtlError, Result};

pub const DEFAULT_BASE_URL: &str = "https://play.pocketcasts.com";
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Close enough to the web player's own requests to avoid CORS/authorization surprises.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("content-type", "application/json"),
    ("origin", "https://pocketcasts.com"),
    ("referer", "https://pocketcasts.com/"),
    ("dnt", "1"),
    ("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36"),
    ("x-app-language", "en"),
    ("x-user-region", "us"),
];

/// Create the HTTP client used for Up Next calls
pub fn create_api_client(timeout_secs: u64) -> Result<Client> {
    let client = ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_nodelay(true)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .brotli(true)
        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Defaults first, then user headers on top. Blank or invalid user entries are skipped.
pub fn build_headers(user: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in DEFAULT_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    for (name, value) in user {
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => tracing::warn!(header = %name, "skipping invalid API header from config"),
        }
    }
    headers
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpNextListRequest {
    pub model: String,
    pub server_modified: String,
    pub show_play_status: bool,
    pub version: u32,
}

impl UpNextListRequest {
    pub fn webplayer(server_modified: impl Into<String>) -> Self {
        Self {
            model: "webplayer".into(),
            server_modified: server_modified.into(),
            show_play_status: true,
            version: 2,
        }
    }
}

/// Episode as `/up_next/play_next` expects it: every field present, strings only.
#[derive(Debug, Clone, Serialize)]
struct WireEpisode<'a> {
    podcast: &'a str,
    published: &'a str,
    title: &'a str,
    url: &'a str,
    uuid: &'a str,
}

impl<'a> From<&'a Episode> for WireEpisode<'a> {
    fn from(ep: &'a Episode) -> Self {
        Self {
            podcast: ep.podcast.as_deref().unwrap_or(""),
            published: ep.published.as_deref().unwrap_or(""),
            title: &ep.title,
            url: ep.url.as_deref().unwrap_or(""),
            uuid: &ep.uuid,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayNextRequest<'a> {
    episode: WireEpisode<'a>,
    version: u32,
    #[serde(skip_serializing_if = "is_blank")]
    server_modified: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveRequest<'a> {
    uuids: &'a [String],
    version: u32,
    #[serde(skip_serializing_if = "is_blank")]
    server_modified: &'a str,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

pub struct ApiClient {
    base_url: String,
    headers: HeaderMap,
    http: Client,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, user_headers: &BTreeMap<String, String>) -> Result<Self> {
        Self::with_timeout(base_url, user_headers, REQUEST_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, user_headers: &BTreeMap<String, String>, timeout_secs: u64) -> Result<Self> {
        let mut base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            base_url = DEFAULT_BASE_URL.to_string();
        }
        Ok(Self {
            base_url,
            headers: build_headers(user_headers),
            http: create_api_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw Up Next response; callers decide how to read it.
    pub async fn up_next_list(&self, req: &UpNextListRequest) -> Result<Vec<u8>> {
        self.post_json("/up_next/list", req).await
    }

    pub async fn up_next_play_next(&self, episode: &Episode, server_modified: &str) -> Result<Vec<u8>> {
        let body = PlayNextRequest { episode: episode.into(), version: 2, server_modified };
        self.post_json("/up_next/play_next", &body).await
    }

    pub async fn up_next_remove(&self, uuids: &[String], server_modified: &str) -> Result<Vec<u8>> {
        let body = RemoveRequest { uuids, version: 2, server_modified };
        self.post_json("/up_next/remove", &body).await
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<u8>> {
        let url = self.url_for(path);
        tracing::debug!(url = %url, "POST");

        let resp = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        tracing::debug!(url = %url, status = status.as_u16(), len = bytes.len(), "response");

        if status.as_u16() >= 400 {
            return Err(CtlError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }

    fn classify(&self, e: reqwest::Error) -> CtlError {
        if e.is_timeout() {
            CtlError::Timeout(self.timeout_secs)
        } else {
            CtlError::Request(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end]
                        .lines()
                        .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_build_headers() {
        let mut user = BTreeMap::new();
        user.insert("Authorization".to_string(), "Bearer abc".to_string());
        user.insert("Accept".to_string(), "application/json".to_string());
        user.insert("  ".to_string(), "ignored".to_string());
        user.insert("X-Empty".to_string(), " ".to_string());

        let h = build_headers(&user);
        assert_eq!(h["authorization"], "Bearer abc");
        assert_eq!(h["accept"], "application/json");
        assert_eq!(h["x-user-region"], "us");
        assert!(h.get("x-empty").is_none());
    }

    #[test]
    fn test_base_url_normalized() {
        let c = ApiClient::new(" https://api.pocketcasts.com/ ", &BTreeMap::new()).unwrap();
        assert_eq!(c.base_url(), "https://api.pocketcasts.com");
        assert_eq!(c.url_for("up_next/list"), "https://api.pocketcasts.com/up_next/list");

        let c = ApiClient::new("", &BTreeMap::new()).unwrap();
        assert_eq!(c.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_request_bodies() {
        let list = serde_json::to_value(UpNextListRequest::webplayer("0")).unwrap();
        assert_eq!(
            list,
            serde_json::json!({"model":"webplayer","serverModified":"0","showPlayStatus":true,"version":2})
        );

        let ep = Episode { uuid: "u".into(), title: "t".into(), ..Default::default() };
        let body = serde_json::to_value(PlayNextRequest { episode: (&ep).into(), version: 2, server_modified: "" }).unwrap();
        assert_eq!(body["episode"]["podcast"], "");
        assert!(body.get("serverModified").is_none());

        let uuids = vec!["a".to_string()];
        let body = serde_json::to_value(RemoveRequest { uuids: &uuids, version: 2, server_modified: "17" }).unwrap();
        assert_eq!(body, serde_json::json!({"uuids":["a"],"version":2,"serverModified":"17"}));
    }

    #[tokio::test]
    async fn test_up_next_list_posts_json() {
        let (base, server) = one_shot_server(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
        )
        .await;
        let mut user = BTreeMap::new();
        user.insert("Authorization".to_string(), "Bearer t0k".to_string());
        let client = ApiClient::new(&base, &user).unwrap();

        let body = client.up_next_list(&UpNextListRequest::webplayer("0")).await.unwrap();
        assert_eq!(body, br#"{"ok":true}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /up_next/list HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer t0k"));
        assert!(request.contains(r#""model":"webplayer""#));
    }

    #[tokio::test]
    async fn test_http_error_keeps_body() {
        let (base, _server) = one_shot_server(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nlogin needed",
        )
        .await;
        let client = ApiClient::new(&base, &BTreeMap::new()).unwrap();
        let err = client.up_next_remove(&["x".to_string()], "1").await.unwrap_err();
        match err {
            CtlError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "login needed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
