//! Per-run logging: one console sink and one file sink per processed paper.
//!
//! Each run gets its own `tracing` [`Dispatch`] rather than touching the
//! global subscriber, so several papers can be processed in one process and
//! every record lands in the log file of the paper that emitted it.
//!
//! File records look like `2026-10-19 14:03:22 - INFO - Split into 9 chunks`.

use crate::error::PaperError;
use chrono::Local;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Timestamp used in log and compile-log file names.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Log file pair for one run.
pub struct RunLog {
    path: PathBuf,
    dispatch: Dispatch,
}

impl RunLog {
    /// Create `<logs_dir>/<file_name>_<timestamp>_process.log` and a dispatcher
    /// writing to it (INFO and above) and to stderr (filtered by
    /// `console_filter`).
    pub fn open(logs_dir: &Path, file_name: &str, console_filter: &str) -> Result<Self, PaperError> {
        let console_filter = EnvFilter::try_new(console_filter)
            .map_err(|e| PaperError::InvalidConfig(format!("console log filter: {e}")))?;

        std::fs::create_dir_all(logs_dir).map_err(|source| PaperError::LogSetupFailed {
            path: logs_dir.to_path_buf(),
            source,
        })?;

        let path = logs_dir.join(format!("{}_{}_process.log", file_name, file_timestamp()));
        let file = File::create(&path).map_err(|source| PaperError::LogSetupFailed {
            path: path.clone(),
            source,
        })?;

        let console = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .event_format(ProcessLogFormat)
            .with_filter(LevelFilter::INFO);

        let subscriber = tracing_subscriber::registry().with(console).with(file_layer);

        Ok(Self {
            path,
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Path of the process log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

impl fmt::Debug for RunLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish()
    }
}

/// `time - LEVEL - message` records, one per line.
struct ProcessLogFormat;

impl<S, N> FormatEvent<S, N> for ProcessLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
