//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DOTD - outfit analysis client
#[derive(Parser)]
#[command(
    name = "dotd",
    about = "Submit outfit photos for analysis and follow them to completion",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log in and show the resolved user
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Submit a photo and follow the task to completion
    Generate {
        /// Photo to analyse
        #[arg(short, long, value_name = "PATH")]
        image: PathBuf,

        /// What you want to know about the outfit
        #[arg(short = 't', long, default_value = "")]
        prompt: String,

        #[arg(short, long, default_value = "")]
        gender: String,

        #[arg(short, long, default_value = "")]
        age_group: String,

        /// Log in first with this email
        #[arg(short, long, requires = "password")]
        email: Option<String>,

        /// Password for --email
        #[arg(short, long, requires = "email")]
        password: Option<String>,

        /// Stored access token, used instead of logging in
        #[arg(long, env = "DOTD_TOKEN", hide_env_values = true, conflicts_with = "email")]
        token: Option<String>,
    },

    /// Replay the lifecycle log for one task
    History {
        /// Task id to show
        task_id: String,

        /// Event log to read (defaults to events.log-file from config)
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}
