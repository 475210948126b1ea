//! Async facade over a blocking [`Session`].
//!
//! Every call moves the session lock into `tokio::task::spawn_blocking`, so
//! remote I/O never runs on the async executor. Calls on one browser are
//! serialized by the lock, matching the single channel of the session.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::errors::{FsError, FsResult};
use crate::files::FileEntry;
use crate::session::Session;

#[async_trait::async_trait]
pub trait FileBrowser: Send {
    async fn list_dir(&self, path: &str) -> FsResult<Vec<FileEntry>>;

    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Create or overwrite a file.
    async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()>;

    async fn delete(&self, path: &str) -> FsResult<()>;

    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    async fn mkdir(&self, path: &str) -> FsResult<()>;

    async fn stat(&self, path: &str) -> FsResult<FileEntry>;
}

/// [`FileBrowser`] backed by a shared session.
#[derive(Debug, Clone)]
pub struct RemoteBrowser {
    session: Arc<Mutex<Session>>,
}

impl RemoteBrowser {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    async fn run<T, F>(&self, op: F) -> FsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> FsResult<T> + Send + 'static,
    {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|e| FsError::Io(std::io::Error::other(format!("Lock failed: {e}"))))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(format!("Task join failed: {e}"))))?
    }
}

#[async_trait::async_trait]
impl FileBrowser for RemoteBrowser {
    async fn list_dir(&self, path: &str) -> FsResult<Vec<FileEntry>> {
        let path = path.to_string();
        self.run(move |session| {
            session
                .list(&path, false)
                .map(|entry| entry.map(|info| FileEntry::from(&info)))
                .collect()
        })
        .await
    }

    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = path.to_string();
        self.run(move |session| {
            let scratch = tempfile::NamedTempFile::new()?;
            session.get_file(&path, scratch.path())?;
            Ok(std::fs::read(scratch.path())?)
        })
        .await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let path = path.to_string();
        let data = data.to_vec();
        self.run(move |session| {
            let mut scratch = tempfile::NamedTempFile::new()?;
            scratch.write_all(&data)?;
            scratch.flush()?;
            session.put_file(scratch.path(), &path, false)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        let path = path.to_string();
        self.run(move |session| session.remove(&path)).await
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = from.to_string();
        let to = to.to_string();
        self.run(move |session| session.move_path(&from, &to)).await
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let path = path.to_string();
        self.run(move |session| {
            let parent = crate::client::parent_path(&path, crate::client::leaf_name(&path))
                .unwrap_or_else(|| "/".to_string());
            session.create_directory(&parent, crate::client::leaf_name(&path))?;
            Ok(())
        })
        .await
    }

    async fn stat(&self, path: &str) -> FsResult<FileEntry> {
        let path = path.to_string();
        self.run(move |session| Ok(FileEntry::from(&session.stat(&path)?)))
            .await
    }
}
