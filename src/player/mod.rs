pub mod state;

pub use state::PlaybackState;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_TYPE;
use reqwest::ClientBuilder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{CtlError, Result};

pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = "pocketcastsctl";
const ERROR_BODY_LIMIT: usize = 2048;

/// A detached player process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub pid: i32,
    pub command: Vec<String>,
}

/// Start playing `url`: stream it with mpv when installed, otherwise download
/// into `cache_dir` and hand the file to afplay.
pub async fn start(url: &str, cache_dir: &Path) -> Result<Started> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CtlError::Player("missing audio URL".into()));
    }

    if let Ok(mpv) = which::which("mpv") {
        let args = vec!["--no-video".to_string(), "--force-window=no".into(), "--quiet".into(), url.to_string()];
        return spawn_detached(&mpv, args);
    }

    let afplay = which::which("afplay")
        .map_err(|_| CtlError::Player("no supported player found (install mpv or ensure afplay exists)".into()))?;

    tokio::fs::create_dir_all(cache_dir).await?;
    let file = download_to_file(url, cache_dir).await?;
    spawn_detached(&afplay, vec![file.to_string_lossy().into_owned()])
}

fn spawn_detached(program: &Path, args: Vec<String>) -> Result<Started> {
    let child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()?;

    let pid = child
        .id()
        .ok_or_else(|| CtlError::Player("player exited immediately".into()))?;

    let mut command = vec![program.to_string_lossy().into_owned()];
    command.extend(args);
    tracing::info!(pid, command = ?command, "player started");
    // The child outlives this process; dropping the handle does not kill it.
    Ok(Started { pid: pid as i32, command })
}

/// `.m4a` when the server says so, `.mp3` otherwise.
pub fn extension_for(content_type: &str) -> &'static str {
    if content_type.to_lowercase().contains("m4a") {
        ".m4a"
    } else {
        ".mp3"
    }
}

async fn download_to_file(url: &str, dir: &Path) -> Result<PathBuf> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .use_rustls_tls()
        .build()?;

    let resp = client.get(url).send().await.map_err(classify)?;
    let status = resp.status().as_u16();
    if status >= 400 {
        let body = resp.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        return Err(CtlError::Http { status, body });
    }

    let ext = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(extension_for)
        .unwrap_or(".mp3");
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = dir.join(format!("pocketcastsctl-{}{}", nanos, ext));

    let pb = match resp.content_length() {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})") {
        pb.set_style(style.progress_chars("=> "));
    }

    let result = write_stream(resp, &path, &pb).await;
    pb.finish_and_clear();
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }
    tracing::debug!(path = %path.display(), "downloaded episode");
    Ok(path)
}

async fn write_stream(resp: reqwest::Response, path: &Path, pb: &ProgressBar) -> Result<()> {
    let mut opts = tokio::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    opts.mode(0o600);
    let mut file = opts.open(path).await?;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify)?;
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    Ok(())
}

fn classify(e: reqwest::Error) -> CtlError {
    if e.is_timeout() {
        CtlError::Timeout(DOWNLOAD_TIMEOUT_SECS)
    } else {
        CtlError::Request(e)
    }
}

pub fn pause(pid: i32) -> Result<()> {
    send_signal(pid, Sig::Stop)
}

pub fn resume(pid: i32) -> Result<()> {
    send_signal(pid, Sig::Cont)
}

pub fn stop(pid: i32) -> Result<()> {
    send_signal(pid, Sig::Term)
}

#[derive(Debug, Clone, Copy)]
enum Sig {
    Stop,
    Cont,
    Term,
}

#[cfg(unix)]
fn send_signal(pid: i32, sig: Sig) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if pid <= 0 {
        return Err(CtlError::Player("no active playback".into()));
    }
    let signal = match sig {
        Sig::Stop => Signal::SIGSTOP,
        Sig::Cont => Signal::SIGCONT,
        Sig::Term => Signal::SIGTERM,
    };
    kill(Pid::from_raw(pid), signal)
        .map_err(|e| CtlError::Player(format!("failed to send {:?} to PID {}: {}", signal, pid, e)))
}

#[cfg(not(unix))]
fn send_signal(pid: i32, _sig: Sig) -> Result<()> {
    if pid <= 0 {
        return Err(CtlError::Player("no active playback".into()));
    }
    Err(CtlError::Player("process signals are not supported on this platform".into()))
}

/// Whether `pid` names a live process (signal 0).
#[cfg(unix)]
pub fn alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    pid > 0 && kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
pub fn alive(_pid: i32) -> bool {
    false
}
