//! Append-only NDJSON log of handled requests.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::metrics::RequestMetrics;
use crate::worker_pool::{BlockingPool, JobTicket};

/// Writes one JSON line per request through a [`BlockingPool`].
#[derive(Debug, Clone)]
pub struct UsageJournal {
    path: PathBuf,
    pool: BlockingPool,
    // Serializes appends so lines never interleave.
    write_lock: Arc<Mutex<()>>,
}

impl UsageJournal {
    pub fn new(path: impl Into<PathBuf>, pool: BlockingPool) -> Self {
        Self {
            path: path.into(),
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queues `entry` for append. Callers may drop the ticket.
    pub fn record(&self, entry: &RequestMetrics) -> JobTicket<io::Result<()>> {
        let line = serde_json::to_string(entry).map_err(io::Error::from);
        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);

        self.pool.submit(move || {
            let result = line.and_then(|line| {
                let _guard = write_lock.lock().unwrap_or_else(PoisonError::into_inner);
                append_line(&path, &line)
            });
            if let Err(error) = &result {
                warn!(path = %path.display(), error = %error, "usage journal write failed");
            }
            result
        })
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
