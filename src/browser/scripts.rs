//! AppleScript drivers and the page-side JavaScript they inject.
//!
//! Every run-JS script takes `argv = [appName, urlNeedle, js]`, the set-URL
//! scripts take `[appName, urlNeedle, newURL]` and the list scripts take
//! `[appName]`. JavaScript snippets always evaluate to a JSON string.

use super::controller::Action;
use super::kind::BrowserKind;

pub const PLAY_LABELS: &[&str] = &["Play", "Resume", "Play episode"];
pub const PAUSE_LABELS: &[&str] = &["Pause", "Pause episode"];
pub const NEXT_LABELS: &[&str] = &["Next", "Next episode", "Skip", "Skip forward"];
pub const PREV_LABELS: &[&str] = &["Previous", "Previous episode", "Back", "Skip back"];

pub const QUEUE_LIST_MAX: usize = 100;

pub fn run_js(kind: BrowserKind) -> &'static str {
    match kind {
        BrowserKind::Chromium => CHROMIUM_RUN_JS,
        BrowserKind::Safari => SAFARI_RUN_JS,
    }
}

pub fn set_url(kind: BrowserKind) -> &'static str {
    match kind {
        BrowserKind::Chromium => CHROMIUM_SET_URL,
        BrowserKind::Safari => SAFARI_SET_URL,
    }
}

pub fn list_urls(kind: BrowserKind) -> &'static str {
    match kind {
        BrowserKind::Chromium => CHROMIUM_LIST_URLS,
        BrowserKind::Safari => SAFARI_LIST_URLS,
    }
}

pub fn js_for_action(action: Action) -> String {
    match action {
        Action::Play => js_click_by_aria_labels(PLAY_LABELS),
        Action::Pause => js_click_by_aria_labels(PAUSE_LABELS),
        Action::Toggle => JS_TOGGLE.to_string(),
        Action::Next => js_click_by_aria_labels(NEXT_LABELS),
        Action::Prev => js_click_by_aria_labels(PREV_LABELS),
    }
}

/// Clicks the first `button[aria-label=...]` present; labels differ between web player builds.
pub fn js_click_by_aria_labels(labels: &[&str]) -> String {
    let labels = serde_json::to_string(labels).unwrap_or_else(|_| "[]".into());
    format!(
        r#"(function(){{
  function clickByLabels(labels){{
    for (const label of labels){{
      const btn = document.querySelector('button[aria-label="'+label+'"]');
      if (btn){{
        btn.click();
        return {{clicked:true, clickedLabel: label}};
      }}
    }}
    return {{clicked:false, clickedLabel:""}};
  }}
  return JSON.stringify(clickByLabels({labels}));
}})()"#
    )
}

pub const JS_TOGGLE: &str = r#"(function(){
  const pause = document.querySelector('button[aria-label="Pause"], button[aria-label="Pause episode"]');
  if (pause){
    pause.click();
    return JSON.stringify({clicked:true, clickedLabel:"Pause"});
  }
  const play = document.querySelector('button[aria-label="Play"], button[aria-label="Resume"], button[aria-label="Play episode"]');
  if (play){
    play.click();
    return JSON.stringify({clicked:true, clickedLabel:"Play"});
  }
  return JSON.stringify({clicked:false, clickedLabel:""});
})()"#;

pub const JS_STATUS: &str = r#"(function(){
  const hasPause = !!document.querySelector('button[aria-label="Pause"], button[aria-label="Pause episode"]');
  const hasPlay = !!document.querySelector('button[aria-label="Play"], button[aria-label="Resume"], button[aria-label="Play episode"]');
  if (hasPause) return JSON.stringify({state:"playing"});
  if (hasPlay) return JSON.stringify({state:"paused"});
  return JSON.stringify({state:"unknown"});
})()"#;

/// Visible episode links, deduplicated by href+title. May include links outside Up Next.
pub const JS_QUEUE_LIST: &str = r#"(function(){
  const anchors = Array.from(document.querySelectorAll('a[href*="/episode/"]'));
  const seen = new Set();
  const items = [];
  for (const a of anchors){
    const href = (a.href || a.getAttribute('href') || '').trim();
    const title = (a.textContent || '').replace(/\s+/g,' ').trim();
    const key = href + '|' + title;
    if (!href || seen.has(key)) continue;
    seen.add(key);
    items.push({title, href});
    if (items.length >= 100) break;
  }
  return JSON.stringify(items);
})()"#;

/// Only tokenish values under token/auth/session keys leave the page.
pub const JS_TOKEN_CANDIDATES: &str = r#"(function(){
  function isJwtLike(s){
    return typeof s === 'string' && /^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$/.test(s);
  }
  function isTokenish(s){
    if (typeof s !== 'string') return false;
    const t = s.replace(/^Bearer\s+/i,'').trim();
    if (t.length < 20 || t.length > 4096) return false;
    if (isJwtLike(t)) return true;
    return /^[A-Za-z0-9._=-]{20,4096}$/.test(t);
  }
  function interesting(k){
    const l = k.toLowerCase();
    return l.includes('token') || l.includes('auth') || l.includes('session');
  }
  function findInObject(obj, out){
    if (!obj || typeof obj !== 'object') return;
    if (Array.isArray(obj)){
      for (const v of obj) findInObject(v, out);
      return;
    }
    for (const k of Object.keys(obj)){
      const v = obj[k];
      if (typeof v === 'string'){
        if (isTokenish(v) && interesting(k)) out.push({sourceKey: k, token: v});
      } else if (v && typeof v === 'object'){
        findInObject(v, out);
      }
    }
  }
  const out = [];
  for (let i=0; i<localStorage.length; i++){
    const key = localStorage.key(i);
    const val = localStorage.getItem(key);
    if (!val) continue;
    if (isTokenish(val) && interesting(key)) out.push({sourceKey: key, token: val});
    try { findInObject(JSON.parse(val), out); } catch (e) {}
  }
  return JSON.stringify(out);
})()"#;

const CHROMIUM_RUN_JS: &str = r#"
using terms from application "Google Chrome"
on run argv
  set appName to item 1 of argv
  set urlNeedle to item 2 of argv
  set js to item 3 of argv
  set matched to 0
  set lastErr to ""
  set lastURL to ""

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u contains urlNeedle then
            set matched to matched + 1
            set lastURL to u
            try
              try
                set active tab index of w to (index of t)
              end try
              try
                set index of w to 1
              end try
              return execute active tab of w javascript js
            on error errMsg number errNum
              set lastErr to errMsg & " (" & errNum & ")"
            end try
          end if
        end try
      end repeat
    end repeat
  end tell

  if matched > 0 then
    error "Found " & matched & " matching tab(s) but JavaScript execution failed (lastURL=" & lastURL & "): " & lastErr
  end if

  error "No tab found in " & appName & " with URL containing: " & urlNeedle
end run
end using terms from
"#;

const SAFARI_RUN_JS: &str = r#"
on run argv
  set appName to item 1 of argv
  set urlNeedle to item 2 of argv
  set js to item 3 of argv

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u contains urlNeedle then
            return do JavaScript js in t
          end if
        end try
      end repeat
    end repeat
  end tell

  error "No tab found in " & appName & " with URL containing: " & urlNeedle
end run
"#;

const CHROMIUM_SET_URL: &str = r#"
using terms from application "Google Chrome"
on run argv
  set appName to item 1 of argv
  set urlNeedle to item 2 of argv
  set newURL to item 3 of argv

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u contains urlNeedle then
            try
              set active tab index of w to (index of t)
            end try
            set URL of t to newURL
            return "ok"
          end if
        end try
      end repeat
    end repeat
  end tell

  error "No tab found in " & appName & " with URL containing: " & urlNeedle
end run
end using terms from
"#;

const SAFARI_SET_URL: &str = r#"
on run argv
  set appName to item 1 of argv
  set urlNeedle to item 2 of argv
  set newURL to item 3 of argv

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u contains urlNeedle then
            set URL of t to newURL
            return "ok"
          end if
        end try
      end repeat
    end repeat
  end tell

  error "No tab found in " & appName & " with URL containing: " & urlNeedle
end run
"#;

const CHROMIUM_LIST_URLS: &str = r#"
using terms from application "Google Chrome"
on run argv
  set appName to item 1 of argv
  set urls to {}

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u is not missing value then
            copy u to end of urls
          end if
        end try
      end repeat
    end repeat
  end tell

  if (count of urls) is 0 then
    return "[]"
  end if

  set AppleScript's text item delimiters to "\",\""
  set joined to urls as text
  set AppleScript's text item delimiters to ""
  return "[\"" & joined & "\"]"
end run
end using terms from
"#;

const SAFARI_LIST_URLS: &str = r#"
on run argv
  set appName to item 1 of argv
  set urls to {}

  tell application appName
    repeat with w in windows
      repeat with t in tabs of w
        try
          set u to URL of t
          if u is not missing value then
            copy u to end of urls
          end if
        end try
      end repeat
    end repeat
  end tell

  if (count of urls) is 0 then
    return "[]"
  end if

  set AppleScript's text item delimiters to "\",\""
  set joined to urls as text
  set AppleScript's text item delimiters to ""
  return "[\"" & joined & "\"]"
end run
"#;
