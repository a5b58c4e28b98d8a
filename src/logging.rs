// Logging setup: diagnostics plus the service status audit file

use crate::collector::STATUS_TARGET;
use crate::error::Result;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Where diagnostic (non-audit) output goes
#[derive(Debug, Clone)]
pub enum DiagnosticsSink {
    Stderr,
    /// Used under the service manager, where there is no console
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: String,
    pub status_log_path: PathBuf,
    pub diagnostics: DiagnosticsSink,
}

/// Audit line format: `YYYY-MM-DD HH:MM:SS | <pid> | <message>`
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLineFormat;

impl<S, N> FormatEvent<S, N> for StatusLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(
            writer,
            "{} | {} | ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::process::id()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. Status events only reach the audit file.
pub fn init(options: &LogOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.level))
        .add_directive(format!("{}=off", STATUS_TARGET).parse()?)
        .add_directive("hyper=warn".parse()?);

    let diagnostics = match &options.diagnostics {
        DiagnosticsSink::Stderr => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        DiagnosticsSink::File(path) => tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(open_append(path)?))
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
    };

    let status = tracing_subscriber::fmt::layer()
        .event_format(StatusLineFormat)
        .with_writer(Mutex::new(open_append(&options.status_log_path)?))
        .with_ansi(false)
        .with_filter(filter_fn(|meta| meta.target() == STATUS_TARGET));

    tracing_subscriber::registry()
        .with(diagnostics)
        .with(status)
        .try_init()?;

    Ok(())
}

/// Open `path` for appending, creating it and its directory if needed
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
