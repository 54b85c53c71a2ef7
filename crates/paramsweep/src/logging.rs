use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name of the log inside `--log-dir`
pub const LOG_FILENAME: &str = "paramsweep.log";

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

const ROTATION_HEADER: &[u8] = b"--- Log rotated (older entries removed) ---\n";

/// Rotate the log file once it exceeds `max_size`, keeping the last `keep` bytes.
///
/// The kept tail starts on a line boundary.
fn rotate_log_if_needed(log_path: &Path, max_size: u64, keep: u64) -> io::Result<bool> {
    if !log_path.exists() {
        return Ok(false);
    }

    let file_size = fs::metadata(log_path)?.len();
    if file_size <= max_size {
        return Ok(false);
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(file_size.saturating_sub(keep)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut file = File::create(log_path)?;
    file.write_all(ROTATION_HEADER)?;
    file.write_all(&buffer[skip..])?;
    Ok(true)
}

/// Hands out writers onto one shared log file
#[derive(Clone)]
struct LogWriterFactory {
    file: Arc<Mutex<File>>,
}

impl LogWriterFactory {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct LogWriter {
    file: Arc<Mutex<File>>,
}

impl LogWriter {
    fn lock(&self) -> io::Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    let default_filter = format!("paramsweep={level},paramsweep_core={level}");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter))
}

/// Open (and rotate if oversized) the log file inside `log_dir`.
fn open_log_file(log_dir: &Path) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILENAME);

    if let Err(e) = rotate_log_if_needed(&log_path, MAX_LOG_SIZE, KEEP_SIZE) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    Ok((log_path, file))
}

/// Initialize logging.
///
/// Without a `log_dir` events go to stderr. With one they are appended to
/// `{log_dir}/paramsweep.log`; when that file exceeds 5MB older entries are
/// removed keeping only the last 1MB. `RUST_LOG` overrides `level`.
pub fn init_logging(log_dir: Option<&Path>, level: &str) -> color_eyre::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    match log_dir {
        Some(dir) => {
            let (log_path, file) = open_log_file(dir)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(LogWriterFactory::new(file))
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .try_init()?;
            tracing::info!(
                "paramsweep logging initialized (log_path={})",
                log_path.display()
            );
        }
        None => {
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .try_init()?;
        }
    }
    Ok(())
}
