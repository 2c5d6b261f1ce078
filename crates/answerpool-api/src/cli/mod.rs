//! CLI command definitions for the `apool` binary.
//!
//! Uses clap derive macros. Every command except `completions` and
//! `config check` builds the pool from the config file first.

pub mod ask;
pub mod cache;
pub mod config;
pub mod provider;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use answerpool_infra::config::default_config_path;

/// Answer questions through a pool of OpenAI-compatible providers.
#[derive(Parser)]
#[command(name = "apool", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Pool configuration file.
    #[arg(
        long,
        global = true,
        env = "APOOL_CONFIG",
        default_value_os_t = default_config_path()
    )]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` in the config).
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in the config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Answer one question through the pool.
    Ask {
        /// Question text.
        question: String,

        /// Preferred model; omit to let each provider use its default.
        #[arg(long, short)]
        model: Option<String>,

        /// Question type: single, multiple, judge, completion.
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        question_type: Option<String>,

        /// Answer options, one per line (or `A. x|B. y`).
        #[arg(long, short)]
        options: Option<String>,
    },

    /// Inspect and probe providers.
    Provider {
        #[command(subcommand)]
        action: provider::ProviderCommand,
    },

    /// Inspect or clear the response cache.
    Cache {
        #[command(subcommand)]
        action: cache::CacheCommand,
    },

    /// Configuration utilities.
    Config {
        #[command(subcommand)]
        action: config::ConfigCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
