//! Process logging.
//!
//! Events at WARN and ERROR go to stderr, everything else to stdout. Each
//! line carries the level, a local timestamp with microsecond precision and
//! the source location of the event.

use chrono::Local;
use std::fmt;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::{MakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// Local wall-clock timer for log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Build the process subscriber writing to stdout and stderr.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn subscriber(level: &str) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    build(filter, writer)
}

fn build<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_timer(LocalTime)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false)
        .finish()
}

/// Install the process subscriber. Must be called once, before any task runs.
pub fn init(level: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, error, info, warn};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(level: &str) -> (Capture, Capture, impl Subscriber + Send + Sync) {
        let out = Capture::default();
        let err = Capture::default();
        let writer = err.clone().with_max_level(Level::WARN).or_else(out.clone());
        (out, err, build(EnvFilter::new(level), writer))
    }

    #[test]
    fn test_severity_routing() {
        let (out, err, subscriber) = capture("info");

        tracing::subscriber::with_default(subscriber, || {
            info!("accepted a connection");
            warn!("drain slow");
            error!("read failed");
        });

        let out = out.contents();
        let err = err.contents();
        assert!(out.contains("INFO"));
        assert!(out.contains("accepted a connection"));
        assert!(!out.contains("read failed"));
        assert!(err.contains("ERROR"));
        assert!(err.contains("read failed"));
        assert!(err.contains("drain slow"));
        assert!(!err.contains("accepted a connection"));
    }

    #[test]
    fn test_line_prefix() {
        let (out, _err, subscriber) = capture("info");

        tracing::subscriber::with_default(subscriber, || {
            info!("hello");
        });

        let line = out.contents();
        let stamp = &line[..26];
        assert!(
            chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok(),
            "bad timestamp in {line:?}"
        );
        assert!(line.contains("src/logging.rs:"), "no location in {line:?}");
    }

    #[test]
    fn test_level_filter() {
        let (out, _err, subscriber) = capture("info");

        tracing::subscriber::with_default(subscriber, || {
            debug!("peer closed");
        });

        assert!(out.contents().is_empty());
    }
}
