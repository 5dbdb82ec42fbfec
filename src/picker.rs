use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::episodes::select::{display_title, short_uuid};
use crate::episodes::Episode;
use crate::error::{CtlError, Result};

/// Interactive choice: fzf when it is installed and usable, a numbered prompt otherwise.
pub async fn pick_episode(episodes: &[Episode]) -> Result<&Episode> {
    if episodes.is_empty() {
        return Err(CtlError::NoEpisodesFound);
    }
    if which::which("fzf").is_ok() {
        match pick_with_fzf(episodes).await {
            Ok(Some(i)) => return Ok(&episodes[i]),
            Ok(None) => return Err(CtlError::Canceled),
            // no TTY and the like
            Err(e) => tracing::debug!(error = %e, "fzf unavailable, falling back to prompt"),
        }
    }
    pick_with_prompt(episodes).await
}

pub fn picker_line(index: usize, ep: &Episode) -> String {
    format!("{:2}  {}  ({})", index + 1, display_title(ep), short_uuid(&ep.uuid))
}

/// Leading 1-based index of a picked line, as a 0-based position in a list of `len`.
pub fn parse_pick_line(line: &str, len: usize) -> Option<usize> {
    let n: usize = line.split_whitespace().next()?.trim_end_matches('.').parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

async fn pick_with_fzf(episodes: &[Episode]) -> Result<Option<usize>> {
    let mut child = Command::new("fzf")
        .args(["--prompt=Play> ", "--no-multi", "--ansi"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let lines: String = episodes
        .iter()
        .enumerate()
        .map(|(i, ep)| picker_line(i, ep) + "\n")
        .collect();
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(lines.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    match output.status.code() {
        Some(0) => {}
        // 1: no match, 130: ESC / ctrl-c
        Some(1) | Some(130) => return Ok(None),
        _ => return Err(CtlError::Usage(format!("fzf exited with {}", output.status))),
    }

    let sel = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sel.is_empty() {
        return Ok(None);
    }
    parse_pick_line(&sel, episodes.len())
        .map(Some)
        .ok_or_else(|| CtlError::Usage(format!("could not parse selection: {:?}", sel)))
}

async fn pick_with_prompt(episodes: &[Episode]) -> Result<&Episode> {
    for (i, ep) in episodes.iter().enumerate() {
        println!("{:2}. {}  ({})", i + 1, display_title(ep), short_uuid(&ep.uuid));
    }
    eprint!("Pick number (or blank to cancel): ");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let line = line.trim();
    if line.is_empty() {
        return Err(CtlError::Canceled);
    }
    parse_pick_line(line, episodes.len())
        .map(|i| &episodes[i])
        .ok_or_else(|| CtlError::Usage(format!("invalid selection: {:?}", line)))
}
