//! Logging setup shared by every subcommand, in the style of the example
//! corpus's CLI logging helpers: a `clap::Args` struct carrying the common
//! verbosity/format knobs, consumed once by `main`.

use std::io::IsTerminal;

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// The log verbosity: trace|debug|info|warn|error|off.
    #[arg(long = "log-level", default_value_t = LogLevel::Info, global = true)]
    pub level: LogLevel,

    #[arg(long = "log-format", global = true)]
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

fn default_log_format() -> LogFormat {
    if std::io::stderr().is_terminal() {
        LogFormat::Text
    } else {
        LogFormat::Json
    }
}

/// Initializes the global `tracing` subscriber. Panics if called twice.
pub fn init_logging(args: &LogArgs) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(args.level.to_string())
        .with_target(false);

    match args.format.unwrap_or_else(default_log_format) {
        LogFormat::Json => builder.json().flatten_event(true).init(),
        LogFormat::Text => builder.compact().init(),
    }
}
