use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use pmoconfig::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber.
///
/// Filter precedence: `--log-level`, then `RUST_LOG`, then the configured
/// minimum level. Events go to stderr and/or the configured file (append
/// mode); with neither enabled, stderr is used anyway.
pub fn init_tracing(config: &LoggingConfig, cli_level: Option<&str>) {
    let _ = tracing_log::LogTracer::init();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(cli_level, rust_log.as_deref(), &config.min_level);

    let file_writer = config.file.as_deref().and_then(|path| match open_log_file(path) {
        Ok(shared) => Some(BoxMakeWriter::new(move || shared.clone())),
        Err(err) => {
            eprintln!(
                "Impossible d'ouvrir {} pour les logs: {err}. Retour à stderr",
                path.display()
            );
            None
        }
    });
    let console = config.enable_console || file_writer.is_none();

    let console_layer = console.then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

pub fn build_filter(cli_level: Option<&str>, rust_log: Option<&str>, configured: &str) -> EnvFilter {
    [cli_level, rust_log, Some(configured)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Opens (or creates) the log file in append mode.
pub fn open_log_file(path: &Path) -> io::Result<SharedLogWriter> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(SharedLogWriter::new(file))
}

#[derive(Clone)]
pub struct SharedLogWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedLogWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.flush()
    }
}
