use clap::Parser;

pub const DEFAULT_WEB_BASE: &str = "https://play.pocketcasts.com";
pub const DEFAULT_HAR_HOST: &str = "api.pocketcasts.com";
pub const DEFAULT_LOGIN_URL: &str = "https://pocketcasts.com/podcasts";

#[derive(clap::Parser, Debug)]
#[command(
    name = "pocketcastsctl",
    about = "Control the Pocket Casts web player and Up Next queue (macOS)",
    disable_version_flag = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Print version information
    #[arg(short = 'V', long, default_value_t = false)]
    pub version: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Capture API credentials from a logged-in browser tab
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Click web player controls in the browser
    Web {
        #[arg(value_enum)]
        action: WebAction,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Inspect the Up Next queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Play queue episodes with a local player (mpv or afplay)
    Local {
        #[command(subcommand)]
        command: LocalCommand,
    },

    /// Inspect and sanitize HAR captures
    Har {
        #[command(subcommand)]
        command: HarCommand,
    },

    /// Print a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Which browser tab to drive. Unset fields fall back to the config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Browser name (chrome, safari, arc, dia, brave, edge, chromium or a custom app name)
    #[arg(long)]
    pub browser: Option<String>,

    /// macOS application name (optional)
    #[arg(long)]
    pub browser_app: Option<String>,

    /// Substring to match the Pocket Casts tab URL
    #[arg(long)]
    pub url_contains: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file
    Init,
}

#[derive(clap::Subcommand, Debug)]
pub enum AuthCommand {
    /// Open the login page, wait for Enter, then sync
    Login {
        #[command(flatten)]
        browser: BrowserArgs,

        /// URL to open for login
        #[arg(long, default_value = DEFAULT_LOGIN_URL)]
        url: String,
    },

    /// Copy the best localStorage token into the config headers
    Sync(SyncArgs),

    /// List open tab URLs
    Tabs {
        #[arg(long)]
        browser: Option<String>,

        #[arg(long)]
        browser_app: Option<String>,
    },

    /// Forget stored API headers
    Clear,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Header name to store in config
    #[arg(long, default_value = "Authorization")]
    pub header: String,

    /// Prefix to add to the token (set empty to store the raw token)
    #[arg(long, default_value = "Bearer ")]
    pub prefix: String,

    /// Prefer tokens whose storage key contains this substring
    #[arg(long, default_value = "")]
    pub key_contains: String,

    /// Print candidate keys only (no token values) and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn for_browser(browser: BrowserArgs) -> Self {
        Self {
            browser,
            header: "Authorization".into(),
            prefix: "Bearer ".into(),
            key_contains: String::new(),
            dry_run: false,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebAction {
    Play,
    Pause,
    Toggle,
    Next,
    Prev,
    Status,
}

#[derive(clap::Subcommand, Debug)]
pub enum QueueCommand {
    /// Episode links visible in the web player tab
    Ls {
        /// Output JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Tab-separated output (index, title, href)
        #[arg(long, default_value_t = false)]
        plain: bool,

        /// Filter by substring in title
        #[arg(long, default_value = "")]
        search: String,

        /// Limit output items (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Up Next through the Pocket Casts API
    Api {
        #[command(subcommand)]
        command: ApiCommand,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ApiCommand {
    /// List Up Next episodes
    Ls {
        /// Limit output items (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Filter by substring in title
        #[arg(long, default_value = "")]
        search: String,

        /// Simplified JSON (episodes only)
        #[arg(long, default_value_t = false, conflicts_with = "raw")]
        json: bool,

        /// Raw response body
        #[arg(long, default_value_t = false)]
        raw: bool,

        /// Tab-separated output (index, title, uuid, published)
        #[arg(long, default_value_t = false)]
        plain: bool,
    },

    /// Add an episode to the top of Up Next
    Add {
        /// Episode UUID
        #[arg(long, default_value = "")]
        uuid: String,

        /// Podcast UUID
        #[arg(long, default_value = "")]
        podcast: String,

        /// Episode title
        #[arg(long, default_value = "")]
        title: String,

        /// Published RFC3339 timestamp
        #[arg(long, default_value = "")]
        published: String,

        /// Audio URL
        #[arg(long, default_value = "")]
        url: String,

        /// Raw JSON object for the episode (overrides the other fields)
        #[arg(long)]
        episode_json: Option<String>,

        /// Raw response body
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    /// Remove episodes from Up Next
    #[command(alias = "remove")]
    Rm {
        #[arg(required = true, value_name = "EPISODE_UUID")]
        uuids: Vec<String>,

        /// Raw response body
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    /// Play a queued episode in the web player
    Play {
        /// 1-based index, UUID or UUID prefix
        selector: String,

        /// Filter by substring in title before choosing
        #[arg(long, default_value = "")]
        search: String,

        /// Web player base URL
        #[arg(long, default_value = DEFAULT_WEB_BASE)]
        web_base: String,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Choose a queued episode interactively and play it in the web player
    Pick {
        /// Filter by substring in title before showing the picker
        #[arg(long, default_value = "")]
        search: String,

        /// Limit items in the picker (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Only print the selected UUID
        #[arg(long, default_value_t = false)]
        no_play: bool,

        /// Web player base URL
        #[arg(long, default_value = DEFAULT_WEB_BASE)]
        web_base: String,

        #[command(flatten)]
        browser: BrowserArgs,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum LocalCommand {
    /// Choose a queued episode interactively and play it locally
    Pick {
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Play a queued episode locally
    Play {
        /// 1-based index, UUID or UUID prefix
        selector: String,
    },
    Pause,
    Resume,
    Stop,
    Status,
}

#[derive(clap::Subcommand, Debug)]
pub enum HarCommand {
    /// Count requests per endpoint
    Summarize {
        /// Filter requests by host (use --host= to disable)
        #[arg(long, default_value = DEFAULT_HAR_HOST)]
        host: String,

        /// Output JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        file: String,
    },

    /// Count GraphQL operations
    Graphql {
        /// Filter requests by host (use --host= to disable)
        #[arg(long, default_value = DEFAULT_HAR_HOST)]
        host: String,

        /// Output JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        file: String,
    },

    /// Mask credentials and personal data
    Redact { input: String, output: String },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

/// Top-level shortcuts, expanded before parsing. Leading global flags are skipped.
pub fn rewrite_aliases(mut args: Vec<String>) -> Vec<String> {
    let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')).map(|p| p + 1) else {
        return args;
    };
    let expansion: &[&str] = match args[pos].as_str() {
        "ls" => &["queue", "api", "ls"],
        "play" => &["queue", "api", "play"],
        "pick" => &["queue", "api", "pick"],
        "rm" => &["queue", "api", "rm"],
        "login" => &["auth", "login"],
        "toggle" => &["web", "toggle"],
        "next" => &["web", "next"],
        "prev" => &["web", "prev"],
        "pause" => &["web", "pause"],
        "status" => &["web", "status"],
        _ => return args,
    };
    args.splice(pos..=pos, expansion.iter().map(|s| s.to_string()));
    args
}

pub fn format_version() -> String {
    format!(
        "pocketcastsctl {} ({}) {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("POCKETCASTSCTL_COMMIT").unwrap_or("none"),
        option_env!("POCKETCASTSCTL_BUILD_DATE").unwrap_or("unknown"),
    )
}

const COMPLETION_COMMANDS: &[&str] = &[
    "help", "version", "completion",
    "config init",
    "auth login", "auth sync", "auth tabs", "auth clear",
    "web play", "web pause", "web toggle", "web next", "web prev", "web status",
    "queue ls",
    "queue api ls", "queue api add", "queue api rm", "queue api play", "queue api pick",
    "local pick", "local play", "local pause", "local resume", "local stop", "local status",
    "har summarize", "har graphql", "har redact",
];

pub fn completion_script(shell: Shell) -> String {
    let words = COMPLETION_COMMANDS.join(" ");
    match shell {
        Shell::Bash => format!(
            r#"#!/usr/bin/env bash
_pocketcastsctl_completions() {{
    local cur prev opts
    cur="${{COMP_WORDS[COMP_CWORD]}}"
    opts="{words}"
    COMPREPLY=( $(compgen -W "${{opts}}" -- "${{cur}}") )
}}
complete -F _pocketcastsctl_completions pocketcastsctl
"#
        ),
        Shell::Zsh => format!(
            r#"#compdef pocketcastsctl
_pocketcastsctl_completions() {{
  local -a commands
  commands=({words})
  compadd "$@" -- $commands
}}
_pocketcastsctl_completions "$@"
"#
        ),
        Shell::Fish => format!(
            r#"set -l commands {words}
complete -c pocketcastsctl -f -a "$commands"
"#
        ),
    }
}

pub fn parse_cli_from(args: Vec<String>) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(rewrite_aliases(args))
}
