//! Logging and tracing initialization.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let writer = log_writer(config);

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Route output to the configured log file, appending across runs.
/// Falls back to stdout when no file is set or it cannot be opened.
fn log_writer(config: &LoggingConfig) -> BoxMakeWriter {
    let Some(path) = &config.file else {
        return BoxMakeWriter::new(std::io::stdout);
    };
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => BoxMakeWriter::new(Arc::new(file)),
        Err(error) => {
            eprintln!("cannot open log file {}: {error}", path.display());
            BoxMakeWriter::new(std::io::stdout)
        }
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_log_writer_appends_to_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipforge.log");
        let config = LoggingConfig {
            file: Some(path.clone()),
            ..LoggingConfig::default()
        };

        log_writer(&config)
            .make_writer()
            .write_all(b"first\n")
            .unwrap();
        log_writer(&config)
            .make_writer()
            .write_all(b"second\n")
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_missing_log_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file: Some(dir.path().join("no-such-dir").join("clipforge.log")),
            ..LoggingConfig::default()
        };

        // The file cannot be created; the writer falls back to stdout
        // instead of panicking.
        log_writer(&config).make_writer().write_all(b"").unwrap();
    }
}
