//! Exports Slack channel history, threads included, as one chronologically ordered log.

pub mod cli;
pub mod commands;
pub mod enrich;
pub mod error;
pub mod export;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod output;
pub mod pagination;
pub mod resolver;
pub mod settings;
pub mod timestamp;
pub mod types;

#[cfg(test)]
mod testing;

pub use cli::{ChannelCommands, Cli, Commands, ConfigCommands, ExportCommands, UserCommands};
pub use error::{AppError, Result};
pub use export::Exporter;
pub use gateway::{HttpGateway, SlackApi};
pub use types::{ExportOptions, ExportedFile, ExportedLog, ExportedMessage, PostType};
