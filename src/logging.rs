//! Logging setup
//!
//! Log lines go to stdout alongside the text report. When the report is
//! JSON they move to stderr so stdout stays machine-readable.

use tracing_subscriber::{
    fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{LogFormat, OutputFormat};

/// Default filter: our crate at `level`, everything else at warn
pub fn default_filter(level: &str) -> String {
    format!("mongo_bootstrap={},warn", level)
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, format: LogFormat, output: OutputFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let writer = match output {
        OutputFormat::Text => BoxMakeWriter::new(std::io::stdout),
        OutputFormat::Json => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer).with_target(false))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
    }
}
