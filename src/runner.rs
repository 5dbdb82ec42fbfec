use anyhow::{anyhow, bail, Context};
use clap::CommandFactory;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

use crate::cli::{
    completion_script, format_version, ApiCommand, AuthCommand, BrowserArgs, Cli, Commands, ConfigCommand,
    HarCommand, LocalCommand, QueueCommand, SyncArgs, WebAction,
};
use pocketcastsctl::api::{ApiClient, UpNextListRequest};
use pocketcastsctl::auth::select_best_token;
use pocketcastsctl::browser::{self, Action, Controller};
use pocketcastsctl::config::{self, Config};
use pocketcastsctl::episodes::select::{display_title, published_date, short_uuid};
use pocketcastsctl::episodes::{self, filter_episodes, select_episode, Episode};
use pocketcastsctl::error::CtlError;
use pocketcastsctl::har::{self, RedactOptions};
use pocketcastsctl::picker::pick_episode;
use pocketcastsctl::player::{self, PlaybackState};
use pocketcastsctl::utils::pretty_json;

const API_TIMEOUT_SECS: u64 = 15;
/// Local playback may wait on a slow Up Next response before the download starts.
const LOCAL_API_TIMEOUT_SECS: u64 = 20;
const PLAY_RETRY_WINDOW: Duration = Duration::from_secs(10);
const PLAY_RETRY_INTERVAL: Duration = Duration::from_millis(300);
const TAB_HINT_LIMIT: usize = 8;

pub async fn run_from_cli(cli: Cli) -> ExitCode {
    init_tracing(cli.debug, cli.verbose);

    if cli.version {
        println!("{}", format_version());
        return ExitCode::SUCCESS;
    }
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    match dispatch(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

fn init_tracing(debug: bool, verbose: bool) {
    // Keep external crates (reqwest/hyper) at INFO; stdout stays reserved for command output.
    use tracing_subscriber::EnvFilter;
    let crate_level = if debug { "debug" } else if verbose { "info" } else { "warn" };
    let filter_str = format!(
        "pocketcastsctl={crate},reqwest=info,hyper=info,h2=info",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .init();
}

/// Usage mistakes exit 2, everything else 1.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CtlError>() {
        Some(CtlError::Usage(_)) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    let cfg = load_config();
    match command {
        Commands::Version => {
            println!("{}", format_version());
            Ok(())
        }
        Commands::Completion { shell } => {
            print!("{}", completion_script(shell));
            Ok(())
        }
        Commands::Config { command: ConfigCommand::Init } => {
            Config::default().save().context("failed to write config")?;
            println!("wrote config: {}", config::path().display());
            Ok(())
        }
        Commands::Auth { command } => handle_auth(cfg, command).await,
        Commands::Web { action, browser } => handle_web(&cfg, action, &browser).await,
        Commands::Queue { command: QueueCommand::Api { command } } => handle_queue_api(&cfg, command).await,
        Commands::Queue { command: QueueCommand::Ls { json, plain, search, limit, browser } } => {
            handle_queue_ls(&cfg, &browser, json, plain, &search, limit).await
        }
        Commands::Local { command } => handle_local(&cfg, command).await,
        Commands::Har { command } => handle_har(command),
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %config::path().display(), "ignoring unreadable config");
        Config::default()
    })
}

fn resolve_browser(cfg: &Config, args: &BrowserArgs) -> (String, String, String) {
    (
        args.browser.clone().unwrap_or_else(|| cfg.browser.clone()),
        args.browser_app.clone().unwrap_or_else(|| cfg.browser_app.clone()),
        args.url_contains.clone().unwrap_or_else(|| cfg.url_contains.clone()),
    )
}

fn controller_for(cfg: &Config, args: &BrowserArgs) -> anyhow::Result<Controller> {
    let (name, app, needle) = resolve_browser(cfg, args);
    Controller::new(&name, &app, &needle).context("invalid browser options")
}

// ---------------------------------------------------------------- auth

async fn handle_auth(mut cfg: Config, command: AuthCommand) -> anyhow::Result<()> {
    match command {
        AuthCommand::Login { browser, url } => handle_auth_login(cfg, &browser, url).await,
        AuthCommand::Sync(args) => handle_auth_sync(cfg, args).await,
        AuthCommand::Tabs { browser, browser_app } => {
            let name = browser.unwrap_or_else(|| cfg.browser.clone());
            let app = browser_app.unwrap_or_else(|| cfg.browser_app.clone());
            // the needle is irrelevant when listing tabs
            let controller = Controller::new(&name, &app, "pocketcasts").context("invalid browser options")?;
            let urls = controller.tab_urls().await.context("auth tabs failed")?;
            if urls.is_empty() {
                println!("(no tabs found)");
            }
            for u in urls {
                println!("{}", u);
            }
            Ok(())
        }
        AuthCommand::Clear => {
            cfg.api_headers.clear();
            cfg.save().context("failed to save config")?;
            println!("cleared API auth in: {}", config::path().display());
            Ok(())
        }
    }
}

async fn handle_auth_login(mut cfg: Config, target: &BrowserArgs, url: String) -> anyhow::Result<()> {
    let (name, app, needle) = resolve_browser(&cfg, target);
    let app = app.trim().to_string();
    let open_app = if app.is_empty() {
        browser::default_app_for_browser(&name)
            .map(str::to_string)
            .unwrap_or_else(|| name.clone())
    } else {
        app.clone()
    };

    // Remember the browser choice; sync writes the file.
    cfg.browser = name;
    cfg.browser_app = app;
    cfg.url_contains = needle;

    browser::open_in_browser(&open_app, &url)
        .await
        .context("failed to open browser")?;

    eprintln!("Complete login in the browser, then press Enter...");
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    let args = SyncArgs::for_browser(BrowserArgs {
        browser: Some(cfg.browser.clone()),
        browser_app: Some(cfg.browser_app.clone()),
        url_contains: Some(cfg.url_contains.clone()),
    });
    handle_auth_sync(cfg, args).await
}

async fn handle_auth_sync(mut cfg: Config, args: SyncArgs) -> anyhow::Result<()> {
    let controller = controller_for(&cfg, &args.browser)?;

    let cands = match controller.token_candidates().await {
        Ok(c) => c,
        Err(e) => {
            if browser::is_automation_hint_error(&e) {
                print_tab_hints(&controller).await;
                eprintln!("tip: run `pocketcastsctl auth login` (or `pocketcastsctl login`) then try again");
                eprintln!("tip: if your Pocket Casts URL is `pocketcasts.com/...`, use `--url-contains pocketcasts.com`");
                eprintln!("tip: if this browser isn't scriptable, try `--browser chrome` or `--browser safari`");
            }
            return Err(anyhow::Error::new(e).context("auth sync failed"));
        }
    };
    if cands.is_empty() {
        bail!("no token candidates found in localStorage (try reloading play.pocketcasts.com while logged in)");
    }

    if args.dry_run {
        for c in &cands {
            println!("{} (len={})", c.source_key, c.token.len());
        }
        return Ok(());
    }

    let token = select_best_token(&cands, &args.key_contains)
        .map_err(|e| anyhow!("{} (try --dry-run and --key-contains)", e))?;
    tracing::debug!(candidates = cands.len(), "selected token");

    let value = if !args.prefix.is_empty() && !token.to_lowercase().starts_with(&args.prefix.to_lowercase()) {
        format!("{}{}", args.prefix, token)
    } else {
        token
    };
    cfg.api_headers.insert(args.header.clone(), value);
    cfg.save().context("failed to save config")?;
    println!("stored {:?} header in: {}", args.header, config::path().display());
    Ok(())
}

async fn print_tab_hints(controller: &Controller) {
    let urls = match controller.tab_urls().await {
        Ok(urls) if !urls.is_empty() => urls,
        _ => return,
    };
    let mut shown: Vec<&String> = urls
        .iter()
        .filter(|u| u.to_lowercase().contains("pocketcasts"))
        .take(TAB_HINT_LIMIT)
        .collect();
    if shown.is_empty() {
        shown = urls.iter().take(TAB_HINT_LIMIT).collect();
    }
    eprintln!("open tabs:");
    for u in shown {
        eprintln!(" - {}", u);
    }
}

// ---------------------------------------------------------------- web

async fn handle_web(cfg: &Config, action: WebAction, args: &BrowserArgs) -> anyhow::Result<()> {
    let controller = controller_for(cfg, args)?;
    let action = match action {
        WebAction::Status => {
            let st = controller.status().await.context("status failed")?;
            println!("{}", st.state);
            return Ok(());
        }
        WebAction::Play => Action::Play,
        WebAction::Pause => Action::Pause,
        WebAction::Toggle => Action::Toggle,
        WebAction::Next => Action::Next,
        WebAction::Prev => Action::Prev,
    };

    let res = controller
        .run_action(action)
        .await
        .with_context(|| format!("{} failed", action))?;
    if res.clicked_label.is_empty() {
        println!("ok");
    } else {
        println!("{}", res.clicked_label);
    }
    Ok(())
}

async fn handle_queue_ls(
    cfg: &Config,
    args: &BrowserArgs,
    json: bool,
    plain: bool,
    search: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let controller = controller_for(cfg, args)?;
    let items = controller.queue_list().await.context("queue ls failed")?;
    let mut items = browser::filter_queue_items(items, search);
    if limit > 0 {
        items.truncate(limit);
    }
    if items.is_empty() {
        bail!("queue ls: no items matched");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for (i, it) in items.iter().enumerate() {
        let title = if it.title.trim().is_empty() { "(untitled)" } else { it.title.trim() };
        if plain {
            println!("{}\t{}\t{}", i + 1, title, it.href.trim());
        } else if it.href.is_empty() {
            println!("{:2}. {}", i + 1, title);
        } else {
            println!("{:2}. {}  {}", i + 1, title, it.href);
        }
    }
    Ok(())
}

async fn play_in_web_player(cfg: &Config, args: &BrowserArgs, web_base: &str, ep: &Episode) -> anyhow::Result<()> {
    let controller = controller_for(cfg, args)?;
    let url = format!("{}/episode/{}", web_base.trim().trim_end_matches('/'), ep.uuid);
    controller
        .set_tab_url(&url)
        .await
        .context("failed to navigate web player")?;

    // The page needs a moment before the play control exists.
    let deadline = tokio::time::Instant::now() + PLAY_RETRY_WINDOW;
    let mut last_err = None;
    while tokio::time::Instant::now() < deadline {
        match controller.run_action(Action::Play).await {
            Ok(_) => {
                println!("playing: {}", ep.title.trim());
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, "play control not ready");
                last_err = Some(e);
            }
        }
        tokio::time::sleep(PLAY_RETRY_INTERVAL).await;
    }
    match last_err {
        Some(e) => Err(anyhow::Error::new(e).context("failed to start playback")),
        None => bail!("failed to start playback"),
    }
}

// ---------------------------------------------------------------- queue api

fn api_client(cfg: &Config, timeout_secs: u64) -> anyhow::Result<ApiClient> {
    Ok(ApiClient::with_timeout(&cfg.api_base_url, &cfg.api_headers, timeout_secs)?)
}

async fn fetch_queue(client: &ApiClient, server_modified: &str) -> anyhow::Result<Vec<Episode>> {
    let body = client
        .up_next_list(&UpNextListRequest::webplayer(server_modified))
        .await
        .context("failed to fetch queue")?;
    episodes::extract_bytes(&body).context("failed to parse queue")
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn print_mutation_response(body: &[u8], raw: bool) {
    if raw {
        println!("{}", String::from_utf8_lossy(body));
    } else if body.is_empty() {
        println!("ok");
    } else {
        println!("{}", pretty_json(body));
    }
}

async fn handle_queue_api(cfg: &Config, command: ApiCommand) -> anyhow::Result<()> {
    let client = api_client(cfg, API_TIMEOUT_SECS)?;
    let server_modified = chrono::Utc::now().timestamp_millis().to_string();

    match command {
        ApiCommand::Ls { limit, search, json, raw, plain } => {
            let body = client
                .up_next_list(&UpNextListRequest::webplayer(server_modified))
                .await
                .context("queue api ls failed")?;
            if raw {
                println!("{}", String::from_utf8_lossy(&body));
                return Ok(());
            }
            let eps = match episodes::extract_bytes(&body) {
                Ok(eps) => eps,
                Err(e) => {
                    tracing::debug!(error = %e, "no episodes recognised, printing response");
                    println!("{}", pretty_json(&body));
                    return Ok(());
                }
            };
            let mut eps = filter_episodes(eps, &search);
            if limit > 0 {
                eps.truncate(limit);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&eps)?);
                return Ok(());
            }
            for (i, ep) in eps.iter().enumerate() {
                let (title, short) = (display_title(ep), short_uuid(&ep.uuid));
                match (plain, published_date(ep)) {
                    (true, published) => println!("{}\t{}\t{}\t{}", i + 1, title, short, published.unwrap_or("")),
                    (false, Some(published)) => println!("{:2}. {}  ({})  {}", i + 1, title, short, published),
                    (false, None) => println!("{:2}. {}  ({})", i + 1, title, short),
                }
            }
            Ok(())
        }

        ApiCommand::Add { uuid, podcast, title, published, url, episode_json, raw } => {
            let ep = match episode_json.filter(|s| !s.trim().is_empty()) {
                Some(raw_json) => serde_json::from_str::<Episode>(&raw_json)
                    .map_err(|e| CtlError::Usage(format!("invalid --episode-json: {}", e)))?,
                None => Episode {
                    uuid: uuid.trim().to_string(),
                    title: title.trim().to_string(),
                    podcast: non_blank(&podcast),
                    published: non_blank(&published),
                    url: non_blank(&url),
                },
            };
            if ep.uuid.trim().is_empty() {
                return Err(CtlError::Usage("missing episode uuid; provide --uuid or --episode-json".into()).into());
            }
            let body = client
                .up_next_play_next(&ep, &server_modified)
                .await
                .context("queue api add failed")?;
            print_mutation_response(&body, raw);
            Ok(())
        }

        ApiCommand::Rm { uuids, raw } => {
            let uuids: Vec<String> = uuids
                .iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
            if uuids.is_empty() {
                return Err(CtlError::Usage("no uuids provided".into()).into());
            }
            let body = client
                .up_next_remove(&uuids, &server_modified)
                .await
                .context("queue api rm failed")?;
            print_mutation_response(&body, raw);
            Ok(())
        }

        ApiCommand::Play { selector, search, web_base, browser } => {
            let eps = fetch_queue(&client, "0").await.context("queue api play")?;
            let eps = filter_episodes(eps, &search);
            if eps.is_empty() {
                bail!("queue api play: no episodes matched");
            }
            let target = select_episode(&eps, &selector).context("queue api play")?;
            play_in_web_player(cfg, &browser, &web_base, target).await
        }

        ApiCommand::Pick { search, limit, no_play, web_base, browser } => {
            let eps = fetch_queue(&client, "0").await.context("queue api pick")?;
            let mut eps = filter_episodes(eps, &search);
            if limit > 0 {
                eps.truncate(limit);
            }
            if eps.is_empty() {
                bail!("queue api pick: no episodes matched");
            }
            let chosen = pick_episode(&eps).await.context("queue api pick")?;
            if no_play {
                println!("{}", chosen.uuid);
                return Ok(());
            }
            play_in_web_player(cfg, &browser, &web_base, chosen).await
        }
    }
}

// ---------------------------------------------------------------- local

async fn handle_local(cfg: &Config, command: LocalCommand) -> anyhow::Result<()> {
    let state_path = config::state_path();
    match command {
        LocalCommand::Pick { search, limit } => {
            let client = api_client(cfg, LOCAL_API_TIMEOUT_SECS)?;
            let eps = fetch_queue(&client, "0").await.context("local pick")?;
            let mut eps = filter_episodes(eps, &search);
            if limit > 0 {
                eps.truncate(limit);
            }
            if eps.is_empty() {
                bail!("local pick: no episodes matched");
            }
            let chosen = pick_episode(&eps).await.context("local pick")?;
            start_local_playback(&state_path, chosen).await
        }
        LocalCommand::Play { selector } => {
            let client = api_client(cfg, LOCAL_API_TIMEOUT_SECS)?;
            let eps = fetch_queue(&client, "0").await.context("local play")?;
            let target = select_episode(&eps, &selector).context("local play")?;
            start_local_playback(&state_path, target).await
        }
        LocalCommand::Pause => {
            let mut st = live_state(&state_path, "local pause")?;
            player::pause(st.pid).context("local pause")?;
            st.paused = true;
            save_state(&st, &state_path);
            println!("paused (local)");
            Ok(())
        }
        LocalCommand::Resume => {
            let mut st = live_state(&state_path, "local resume")?;
            player::resume(st.pid).context("local resume")?;
            st.paused = false;
            save_state(&st, &state_path);
            println!("resumed (local)");
            Ok(())
        }
        LocalCommand::Stop => stop_local(&state_path),
        LocalCommand::Status => {
            let st = match PlaybackState::load(&state_path).context("local status")? {
                Some(st) if player::alive(st.pid) => st,
                Some(_) => {
                    let _ = PlaybackState::clear(&state_path);
                    println!("stopped");
                    return Ok(());
                }
                None => {
                    println!("stopped");
                    return Ok(());
                }
            };
            let label = if st.paused { "paused" } else { "playing" };
            println!("{}: {}", label, st.title.trim());
            Ok(())
        }
    }
}

/// Saved state whose process is still running; stale state is cleared.
fn live_state(path: &Path, what: &'static str) -> anyhow::Result<PlaybackState> {
    match PlaybackState::load(path).context(what)? {
        Some(st) if player::alive(st.pid) => Ok(st),
        _ => {
            let _ = PlaybackState::clear(path);
            bail!("{}: nothing playing", what)
        }
    }
}

fn save_state(st: &PlaybackState, path: &Path) {
    if let Err(e) = st.save(path) {
        tracing::warn!(error = %e, path = %path.display(), "failed to save playback state");
    }
}

fn stop_local(path: &Path) -> anyhow::Result<()> {
    if let Some(st) = PlaybackState::load(path).context("local stop")? {
        if player::alive(st.pid) {
            if let Err(e) = player::stop(st.pid) {
                tracing::warn!(error = %e, pid = st.pid, "failed to stop player");
            }
        }
    }
    PlaybackState::clear(path).context("local stop")?;
    Ok(())
}

async fn start_local_playback(state_path: &Path, ep: &Episode) -> anyhow::Result<()> {
    let audio_url = ep.url.as_deref().unwrap_or("").trim();
    if audio_url.is_empty() {
        eprintln!("tip: run `pocketcastsctl queue api ls --raw` to inspect the response; the audio URL may need another endpoint");
        bail!("local playback needs an audio URL but none was found in the Up Next response");
    }

    if let Err(e) = stop_local(state_path) {
        tracing::debug!(error = %e, "could not stop previous playback");
    }

    let started = player::start(audio_url, &config::cache_dir())
        .await
        .context("local play failed")?;

    save_state(
        &PlaybackState {
            pid: started.pid,
            command: started.command,
            episode_uuid: ep.uuid.clone(),
            title: ep.title.clone(),
            started_at: chrono::Utc::now(),
            paused: false,
        },
        state_path,
    );
    println!("playing (local): {}", ep.title.trim());
    Ok(())
}

// ---------------------------------------------------------------- har

fn handle_har(command: HarCommand) -> anyhow::Result<()> {
    match command {
        HarCommand::Summarize { host, json, file } => {
            let capture = har::read_file(Path::new(&file)).context("summarize failed")?;
            let summary = har::summarize(&capture, host.trim());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", har::format_summary_text(&summary));
            }
            Ok(())
        }
        HarCommand::Graphql { host, json, file } => {
            let capture = har::read_file(Path::new(&file)).context("graphql failed")?;
            let summary = har::graphql_ops(&capture, host.trim());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", har::format_graphql_text(&summary));
            }
            Ok(())
        }
        HarCommand::Redact { input, output } => {
            har::redact_file(Path::new(&input), Path::new(&output), &RedactOptions::default())
                .context("redact failed")?;
            println!("wrote: {}", output);
            Ok(())
        }
    }
}
