//! Structured logging setup.
//!
//! The filter comes from `YHCHAT_LOG`, then `RUST_LOG`, then a default that
//! keeps this workspace at `info` and everything else at `warn`. The output
//! format comes from `YHCHAT_LOG_FORMAT` (`pretty`, `compact`, `json`). The
//! `-v` and `--log-format` flags of [`CommonArgs`](crate::args::CommonArgs)
//! override both.
//!
//! ```bash
//! # Watch every heartbeat and ack
//! YHCHAT_LOG=yhchat_core=debug,warn yhchat run
//! ```

use clap::ValueEnum;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

const DEFAULT_FILTER: &str = "yhchat_core=info,yhchat=info,warn";
const VERBOSE_FILTER: &str = "yhchat_core=debug,yhchat=debug,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, coloured
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// JSON lines for a log collector
    Json,
}

impl LogFormat {
    /// Case-insensitive; unknown values fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive
    pub filter: String,
    pub format: LogFormat,
    /// Emit span open/close events
    pub with_spans: bool,
    /// Include file and line
    pub with_file: bool,
    pub with_thread_ids: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            with_spans: false,
            with_file: false,
            with_thread_ids: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let filter = std::env::var("YHCHAT_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        let format = std::env::var("YHCHAT_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            filter,
            format,
            ..Default::default()
        }
    }

    /// Debug level for the pipeline crates, with source locations.
    pub fn verbose(self) -> Self {
        Self {
            filter: VERBOSE_FILTER.to_string(),
            with_file: true,
            ..self
        }
    }

    /// Switch the output format. JSON also records span lifetimes, which a
    /// collector can turn into per-connection timings.
    pub fn with_format(self, format: LogFormat) -> Self {
        Self {
            format,
            with_spans: self.with_spans || format == LogFormat::Json,
            ..self
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init(config: LogConfig) {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    macro_rules! configured {
        ($layer:expr) => {
            $layer
                .with_span_events(config.span_events())
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_thread_ids(config.with_thread_ids)
                .with_target(config.with_target)
                .boxed()
        };
    }

    let output = match config.format {
        LogFormat::Json => configured!(fmt::layer().json()),
        LogFormat::Compact => configured!(fmt::layer().compact()),
        LogFormat::Pretty => configured!(fmt::layer().pretty()),
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(env_filter)
        .try_init();
}
