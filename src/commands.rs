use std::fs::DirBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cli::ExportLogArgs;
use crate::error::{AppError, Result};
use crate::export::Exporter;
use crate::gateway::{HttpGateway, SlackApi};
use crate::output::{STDOUT, write_log};
use crate::resolver::NameResolver;
use crate::settings::{Profile, Settings};
use crate::timestamp::{parse_cli_time, to_slack_ts};
use crate::types::{ExportOptions, ExportedLog};

/// `--output-files` value asking for a generated directory name.
pub const AUTO_FILES_DIR: &str = "auto";

/// Load the active profile and open a gateway with its token.
fn connect(config: &Path, profile: Option<&str>) -> Result<(Profile, HttpGateway)> {
    let settings = Settings::load(config)?;
    let profile = settings.profile(profile)?;
    let token = profile.resolve_token()?;
    let gateway = HttpGateway::new(&profile.api_base_url, token)?;
    Ok((profile, gateway))
}

/// Directory for downloaded attachments, if any were requested.
pub fn files_dir(output_files: Option<&str>, channel: &str, now: DateTime<Utc>) -> Option<PathBuf> {
    match output_files.filter(|dir| !dir.is_empty())? {
        AUTO_FILES_DIR => Some(PathBuf::from(format!(
            "./chatcat-export-{}-{}",
            channel.trim_start_matches('#'),
            now.format("%Y%m%dT%H%M%SZ")
        ))),
        dir => Some(PathBuf::from(dir)),
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|e| AppError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

fn parse_bound(value: Option<&str>, which: &str) -> Result<Option<String>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            parse_cli_time(v)
                .map(to_slack_ts)
                .map_err(|e| e.context(format!("invalid {which} time")))
        })
        .transpose()
}

/// Turn command-line arguments into export options, creating the files directory.
pub fn prepare_export(
    args: &ExportLogArgs,
    default_channel: &str,
    now: DateTime<Utc>,
) -> Result<ExportOptions> {
    let channel_name = args
        .channel
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(default_channel);
    if channel_name.is_empty() {
        return Err(AppError::MissingChannel);
    }

    let start_time = parse_bound(args.start_time.as_deref(), "start")?;
    let end_time = parse_bound(args.end_time.as_deref(), "end")?;

    let download_dir = files_dir(args.output_files.as_deref(), channel_name, now);
    if let Some(dir) = &download_dir {
        create_private_dir(dir)?;
    }

    Ok(ExportOptions {
        channel_name: channel_name.to_string(),
        start_time,
        end_time,
        include_files: download_dir.is_some(),
        output_dir: download_dir.unwrap_or_default(),
    })
}

/// Run one export against `api` and write the result.
pub fn export_log_with<A: SlackApi>(
    api: Arc<A>,
    args: &ExportLogArgs,
    default_channel: &str,
) -> Result<ExportedLog> {
    let options = prepare_export(args, default_channel, Utc::now())?;

    tracing::info!(
        channel = %options.channel_name,
        start = options.start_time.as_deref().unwrap_or("beginning"),
        end = options.end_time.as_deref().unwrap_or("now"),
        "exporting messages"
    );

    let exporter = Exporter::new(api);
    let log = exporter
        .export_log(&options)
        .map_err(|e| e.context("failed to export log"))?;

    write_log(&log, &args.output, args.output_format)?;

    if args.output != STDOUT && !args.output.is_empty() {
        tracing::info!(path = %args.output, "log saved");
    }
    if options.include_files {
        tracing::info!(dir = %options.output_dir.display(), "files saved");
    }

    Ok(log)
}

pub fn run_export_log(config: &Path, profile: Option<&str>, args: &ExportLogArgs) -> Result<()> {
    let (profile, gateway) = connect(config, profile)?;
    let log = export_log_with(Arc::new(gateway), args, &profile.channel)?;

    tracing::info!(messages = log.messages.len(), "log export completed successfully");
    Ok(())
}

pub fn list_channels_with<A: SlackApi>(api: Arc<A>) -> Result<Vec<String>> {
    NameResolver::new(api).list_channels()
}

pub fn run_list_channels(config: &Path, profile: Option<&str>) -> Result<()> {
    let (_, gateway) = connect(config, profile)?;

    for name in list_channels_with(Arc::new(gateway))? {
        println!("{name}");
    }
    Ok(())
}

pub fn run_lookup_user(config: &Path, profile: Option<&str>, name: &str) -> Result<()> {
    let (_, gateway) = connect(config, profile)?;

    let id = NameResolver::new(Arc::new(gateway)).resolve_user_id(name)?;
    println!("{id}");
    Ok(())
}

/// Write a default configuration file. An existing file is left untouched.
pub fn run_config_init(config: &Path) -> Result<bool> {
    if config.exists() {
        tracing::warn!(path = %config.display(), "configuration file already exists");
        return Ok(false);
    }

    Settings::default().save(config)?;
    tracing::info!(path = %config.display(), "configuration file created");
    Ok(true)
}
