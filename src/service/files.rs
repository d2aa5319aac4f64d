use std::{
    io,
    path::{Component, Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Mutex,
};

/// Largest file `/getfile` sends by default: 8 MiB.
pub const MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// What `/getfile` needs to know about a file before reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    /// Modification time truncated to whole seconds.
    pub modified: SystemTime,
    pub len: u64,
}

/// Files served by `/getfile` and written by `/putfile`, plus the
/// append-only checkout log.
///
/// File names come from clients and are resolved under `root`. A name may
/// only consist of plain path segments; `..`, absolute paths and drive
/// prefixes are refused.
///
/// Files are read whole, so reads are capped at `max_file_size` bytes.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    checkout_log: PathBuf,
    log_lock: Mutex<()>,
    max_file_size: u64,
}

impl FileStore {
    pub fn new<R: Into<PathBuf>, L: Into<PathBuf>>(root: R, checkout_log: L) -> Self {
        FileStore {
            root: root.into(),
            checkout_log: checkout_log.into(),
            log_lock: Mutex::new(()),
            max_file_size: MAX_FILE_SIZE,
        }
    }

    #[inline]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    #[inline(always)]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    #[inline(always)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a client supplied name to a path under the root.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut segments = 0;

        for component in Path::new(name).components() {
            match component {
                Component::Normal(segment) => {
                    path.push(segment);
                    segments += 1;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }

        (segments > 0).then_some(path)
    }

    /// Size and modification time of a regular file. The time is truncated
    /// to whole seconds so it compares cleanly with HTTP dates.
    pub async fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }

        Ok(FileMeta {
            modified: truncate_to_seconds(metadata.modified().unwrap_or(UNIX_EPOCH)),
            len: metadata.len(),
        })
    }

    /// Reads the whole file. A file longer than `max_file_size` fails with
    /// [`io::ErrorKind::InvalidData`], even if it grew after
    /// [`metadata`](Self::metadata) was taken.
    pub async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let file = fs::File::open(path).await?;
        let mut content = Vec::new();

        file.take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut content)
            .await?;

        if content.len() as u64 > self.max_file_size {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "file too large"));
        }
        Ok(content)
    }

    /// Creates or truncates the file at `path` and writes `content`.
    #[inline]
    pub async fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        fs::write(path, content).await
    }

    /// Appends one checkout listing to the log.
    ///
    /// Appends are serialized, so listings from concurrent checkouts never
    /// interleave.
    pub async fn append_checkout(&self, listing: &str) -> io::Result<()> {
        let _guard = self.log_lock.lock().await;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.checkout_log)
            .await?;

        file.write_all(listing.as_bytes()).await?;
        file.flush().await
    }
}

#[inline]
fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_secs())
        .unwrap_or(0);

    UNIX_EPOCH + Duration::from_secs(secs)
}
