use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ERROR_LOG: &str = "error.log";

/// Log INFO and above to stdout, and append ERROR events to `<log_dir>/error.log`.
///
/// If the log directory can't be written, file logging is skipped with a
/// warning on stderr and `None` is returned. Otherwise keep the returned guard
/// alive for the life of the process so buffered file output is flushed on exit.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let (file_layer, guard) = match open_error_log(log_dir) {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer.with_max_level(tracing::Level::ERROR)),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// `tracing_appender::rolling` panics if it can't create its file, so check
/// that the file opens before handing the directory over.
fn open_error_log(log_dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "Warning: Could not create log directory {} ({}), file logging disabled",
            log_dir.display(),
            e
        );
        return None;
    }

    let path = log_dir.join(ERROR_LOG);
    if let Err(e) = OpenOptions::new().create(true).append(true).open(&path) {
        eprintln!(
            "Warning: Could not write to {} ({}), file logging disabled",
            path.display(),
            e
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::never(log_dir, ERROR_LOG);
    Some(tracing_appender::non_blocking(file_appender))
}
