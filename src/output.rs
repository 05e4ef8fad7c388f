use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;

use crate::error::{AppError, Result};
use crate::types::ExportedLog;

/// Output path meaning "standard output".
pub const STDOUT: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Plain text, one block per message
    Text,
}

/// Plain-text rendering of a log, one block per message.
pub fn render_text(log: &ExportedLog) -> String {
    let mut out = format!(
        "# Log export for channel {} on {}\n",
        log.channel_name, log.export_timestamp
    );

    for message in &log.messages {
        out.push_str("---\n");
        out.push_str(&format!(
            "[{}] {}: {}\n",
            message.timestamp, message.user_name, message.text
        ));
        for file in &message.files {
            let line = match &file.local_path {
                Some(path) => format!("  - Attachment: {} (saved to: {})\n", file.name, path),
                None => format!("  - Attachment: {}\n", file.name),
            };
            out.push_str(&line);
        }
    }

    out
}

fn create_private(path: &Path) -> io::Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn render_to<W: Write>(mut writer: W, log: &ExportedLog, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, log)
                .map_err(|e| AppError::JsonSerialize(e.to_string()))?;
            writer.write_all(b"\n")?;
        }
        OutputFormat::Text => writer.write_all(render_text(log).as_bytes())?,
    }
    writer.flush()?;
    Ok(())
}

/// Write `log` to `output`, or to stdout when `output` is `-` or empty.
pub fn write_log(log: &ExportedLog, output: &str, format: OutputFormat) -> Result<()> {
    if output.is_empty() || output == STDOUT {
        return render_to(io::stdout().lock(), log, format);
    }

    let file = create_private(Path::new(output)).map_err(|e| AppError::WriteFile {
        path: output.to_string(),
        source: e,
    })?;
    render_to(BufWriter::new(file), log, format).map_err(|e| match e {
        AppError::Io(source) => AppError::WriteFile {
            path: output.to_string(),
            source,
        },
        other => other,
    })
}
