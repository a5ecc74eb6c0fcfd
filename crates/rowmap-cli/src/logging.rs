//! Log output for the `rowmap` binary.
//!
//! Library crates only emit `tracing` events; this module decides where
//! they go. Levels used across the workspace:
//!
//! - `warn`: recorded field errors, dropped columns
//! - `info`: command progress and counts
//! - `debug`: compiled mappers, cache hits and misses
//! - `trace`: row breaks and cell values (values need `--log-data`)

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::{self, MakeWriter, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder logged instead of cell contents.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Workspace crates whose events follow the chosen level.
const CRATES: [&str; 5] = [
    "rowmap_cli",
    "rowmap_convert",
    "rowmap_csv",
    "rowmap_map",
    "rowmap_model",
];

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// The value itself when `--log-data` is set, otherwise a redacted token.
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

/// Log output format, one per `--log-format` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event; the `map` span reports its duration on close.
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
    /// Let `RUST_LOG` replace the level directives.
    pub use_env_filter: bool,
    pub with_ansi: bool,
    pub format: LogFormat,
    /// Append to this file instead of writing to stderr.
    pub log_file: Option<PathBuf>,
    pub log_data: bool,
}

/// Installs the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Release);
    let layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            output_layer(config, Mutex::new(file))
        }
        None => output_layer(config, std::io::stderr),
    };
    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter(config.level_filter, config.use_env_filter)))
        .try_init()
        .context("install log subscriber")
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Formatting layer for `config.format`, writing to `writer`.
fn output_layer<W>(config: &LogConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(false);
    match config.format {
        LogFormat::Json => layer.json().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Compact => layer
            .compact()
            .without_time()
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Pretty => layer.without_time().with_ansi(config.with_ansi).boxed(),
    }
}

/// Our crates at `level`, everything else at warn.
fn env_filter(level: LevelFilter, use_env: bool) -> EnvFilter {
    let directives = || {
        let level = level.to_string().to_lowercase();
        let mut directives = String::from("warn");
        for name in CRATES {
            directives.push_str(&format!(",{name}={level}"));
        }
        EnvFilter::new(directives)
    };
    if use_env {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| directives())
    } else {
        directives()
    }
}
