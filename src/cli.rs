use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::settings::SETTINGS_FILE;

#[derive(Parser)]
#[command(name = "chatcat")]
#[command(about = "Export Slack conversations from the command line")]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    pub config: PathBuf,

    /// Profile to use instead of the configured current profile
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only log errors
    #[arg(long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export data from a workspace
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Inspect channels
    Channel {
        #[command(subcommand)]
        command: ChannelCommands,
    },

    /// Inspect users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export a channel log, threads included
    Log(ExportLogArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExportLogArgs {
    /// Channel to export, by name or ID; defaults to the profile's channel
    #[arg(short, long)]
    pub channel: Option<String>,

    /// Start of the time range (RFC3339, or YYYY-MM-DDTHH:MM:SS as UTC)
    #[arg(long)]
    pub start_time: Option<String>,

    /// End of the time range (RFC3339, or YYYY-MM-DDTHH:MM:SS as UTC)
    #[arg(long)]
    pub end_time: Option<String>,

    /// Output file path, '-' for stdout
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Directory to save attachments in, or 'auto' for a generated one
    #[arg(long)]
    pub output_files: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output_format: OutputFormat,
}

#[derive(Subcommand)]
pub enum ChannelCommands {
    /// List the channels visible to the token
    List,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Print the user ID for a display name or handle
    Lookup {
        /// Name to look up, with or without '@'
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init,
}
