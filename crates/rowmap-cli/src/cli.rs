//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "rowmap",
    version,
    about = "Map tabular rows into nested objects",
    long_about = "Map CSV rows into nested objects described by a JSON mapping file.\n\n\
                  Consecutive rows sharing key columns are grouped into one object\n\
                  whose collections collect the rows' child values."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow cell values in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map a CSV file and write the objects.
    Map(MapArgs),

    /// Show how each column of an input is mapped.
    Plan(PlanArgs),
}

#[derive(Args)]
pub struct MapArgs {
    /// JSON mapping file.
    #[arg(long = "mapping", short = 'm', value_name = "FILE")]
    pub mapping: PathBuf,

    /// CSV input.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (default: stdout).
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[arg(long = "format", value_enum, default_value = "jsonl")]
    pub format: OutputFormatArg,

    /// Map every row on its own instead of grouping by key columns.
    #[arg(long = "flat")]
    pub flat: bool,

    /// Column names for input without a header row.
    #[arg(long = "columns", value_delimiter = ',', value_name = "NAMES")]
    pub columns: Option<Vec<String>>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// JSON mapping file.
    #[arg(long = "mapping", short = 'm', value_name = "FILE")]
    pub mapping: PathBuf,

    /// CSV input whose header names the columns.
    #[arg(value_name = "INPUT", required_unless_present = "columns")]
    pub input: Option<PathBuf>,

    /// Column names, instead of reading a header.
    #[arg(long = "columns", value_delimiter = ',', value_name = "NAMES")]
    pub columns: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Jsonl,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
