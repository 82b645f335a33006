//! Clap derive structures for the `tvbridge` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tvbridge -- one remote for every TV protocol
#[derive(Debug, Parser)]
#[command(
    name = "tvbridge",
    version,
    about = "Control a networked TV from the command line",
    long_about = "Connects to a TV over its remote-control protocol (legacy WebSocket,\n\
        token-authenticated, PIN pairing or the TCP remote), keeps the session\n\
        alive, and turns power on/off into a request that waits until the TV\n\
        actually reaches the requested state.",
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
    /// TV profile to use
    #[arg(long, short = 'p', env = "TVBRIDGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// TV address (overrides profile)
    #[arg(long, short = 'a', env = "TVBRIDGE_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Remote protocol: legacy, token, pin or generic (overrides profile)
    #[arg(long, env = "TVBRIDGE_PROTOCOL", global = true)]
    pub protocol: Option<String>,

    /// Hardware address for Wake-on-LAN (overrides profile)
    #[arg(long, env = "TVBRIDGE_MAC", global = true)]
    pub mac: Option<String>,

    /// Remote token for token-authenticated TVs
    #[arg(long, env = "TVBRIDGE_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TVBRIDGE_OUTPUT",
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

    /// Seconds to wait for the TV to accept a session
    #[arg(long, short = 'w', env = "TVBRIDGE_WAIT", default_value = "30", global = true)]
    pub wait: u64,
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
    /// Keep a session open and read commands from stdin
    Run,

    /// Send one remote key and exit
    Send(SendArgs),

    /// Switch the TV on or off and wait until it gets there
    #[command(alias = "pwr")]
    Power(PowerArgs),

    /// Check whether the TV answers on the network
    #[command(alias = "st")]
    Status,

    /// List the known remote keys
    Keys(KeysArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEND / POWER / KEYS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Key name or code (e.g. VolumeUp, KEY_MUTE)
    pub key: String,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    pub state: PowerTarget,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerTarget {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct KeysArgs {
    /// Only show keys of this group (e.g. Volume, Navigation)
    #[arg(long, short = 'g')]
    pub group: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
