//! Process-wide `tracing` setup.
//!
//! Each generation runs inside a `generation` span carrying `run_id` and
//! `project_id`. The JSON output flattens event fields and attaches that span,
//! so every line of a run can be grepped by its id.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Library and CLI at `info`, dependencies (hyper, reqwest) at `warn`.
pub const DEFAULT_LOG_FILTER: &str = "warn,planner_stream=info,planner=info";

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Where log lines go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogOutput {
    /// Compact human-readable lines on stderr; stdout stays free for the plan.
    Console,
    /// One JSON object per line appended to this file.
    JsonFile(PathBuf),
}

/// Resolved logging settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub filter: String,
    pub output: LogOutput,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: DEFAULT_LOG_FILTER.to_string(),
            output: LogOutput::Console,
        }
    }
}

impl ObservabilityConfig {
    /// Reads the settings from the environment.
    ///
    /// - `PLANNER_OBSERVABILITY_ENABLED`: `0`/`false`/`off` disables logging.
    /// - `PLANNER_LOG_LEVEL`, then `RUST_LOG`: filter directives. Invalid
    ///   directives are skipped.
    /// - `PLANNER_JSON_LOG_PATH`: switch to JSONL output in that file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("PLANNER_OBSERVABILITY_ENABLED")
            .and_then(|value| parse_flag(&value))
            .unwrap_or(true);
        let filter = ["PLANNER_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty() && EnvFilter::try_new(value).is_ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let output = match lookup("PLANNER_JSON_LOG_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => LogOutput::JsonFile(PathBuf::from(path.trim())),
            None => LogOutput::Console,
        };
        Self {
            enabled,
            filter,
            output,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Installs the global subscriber from `PLANNER_*` variables.
///
/// Only the first call in a process has an effect. Returns whether a
/// subscriber from this crate is installed.
pub fn init_observability() -> bool {
    init_with(ObservabilityConfig::from_env())
}

/// Like [`init_observability`] with explicit settings.
pub fn init_with(config: ObservabilityConfig) -> bool {
    *INSTALLED.get_or_init(|| install(&config))
}

fn install(config: &ObservabilityConfig) -> bool {
    if !config.enabled {
        return false;
    }
    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match &config.output {
        LogOutput::Console => {
            let console = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .is_ok()
        }
        LogOutput::JsonFile(path) => match file_appender(path) {
            Ok(writer) => tracing_subscriber::registry()
                .with(filter)
                .with(json_layer(writer))
                .try_init()
                .is_ok(),
            Err(e) => {
                eprintln!("planner: cannot open log file {}: {e}", path.display());
                false
            }
        },
    }
}

fn file_appender(
    path: &Path,
) -> Result<tracing_appender::rolling::RollingFileAppender, Box<dyn std::error::Error>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("planner.jsonl");
    let appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(appender)
}

fn json_layer<S, W>(writer: W) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(writer)
}
