//! Clap derive structures for the `machdesk` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// machdesk -- authenticated client for the machine-management API
#[derive(Debug, Parser)]
#[command(
    name = "machdesk",
    version,
    about = "Sign in and browse production machines from the command line",
    long_about = "A client for the machine-management backend.\n\n\
        Authenticates against an OpenID Connect realm, applies the route\n\
        guard used by the desk application, and lists machines from the\n\
        resource API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "MACHDESK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Identity provider root URL (overrides profile)
    #[arg(long, env = "MACHDESK_PROVIDER_URL", global = true)]
    pub provider_url: Option<String>,

    /// Resource API root URL (overrides profile)
    #[arg(long, short = 'a', env = "MACHDESK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Username for the password grant (overrides profile)
    #[arg(long, short = 'u', env = "MACHDESK_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MACHDESK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "MACHDESK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "MACHDESK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in, sign out, and inspect the session
    #[command(alias = "s")]
    Session(SessionArgs),

    /// List and watch machines
    #[command(alias = "m")]
    Machines(MachinesArgs),

    /// Inspect the route table and the navigation guard
    #[command(alias = "r")]
    Routes(RoutesArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Run the silent check and show the resulting session
    Status,

    /// Sign in with the password grant
    Login {
        /// Remember the refresh token in the system keyring
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and forget any remembered refresh token
    Logout,
}

// ── Machines ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MachinesArgs {
    #[command(subcommand)]
    pub command: MachinesCommand,
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Records per page (overrides profile)
    #[arg(long)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum MachinesCommand {
    /// Fetch one page of machines
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        page: PageArgs,

        /// Only machines in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show a single machine from the fetched page
    Get {
        /// Machine id
        id: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Re-fetch on an interval and print every change
    Watch {
        #[command(flatten)]
        page: PageArgs,

        /// Seconds between fetches (overrides profile)
        #[arg(long, short = 'i')]
        interval: Option<u64>,
    },
}

// ── Routes ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RoutesArgs {
    #[command(subcommand)]
    pub command: RoutesCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Principal {
    /// No session
    Anonymous,
    /// A signed-in session
    Authenticated,
}

#[derive(Debug, Subcommand)]
pub enum RoutesCommand {
    /// List the route table
    #[command(alias = "ls")]
    List,

    /// Navigate to a path and show where the guard lands
    Check {
        /// Requested path
        path: String,

        /// Evaluate for this principal instead of a live session
        #[arg(long = "as", value_name = "PRINCIPAL")]
        principal: Option<Principal>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the effective configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Set a profile key
    Set {
        /// Profile key (e.g. "api_url", "mode", "patch_miss")
        key: String,
        /// New value
        value: String,
    },

    /// List profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Store the profile password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
