//! Staged remote file stream.
//!
//! Opening downloads the remote file into a scratch file. Reads, writes and
//! seeks touch only the scratch copy; [`commit`](FileSystemStream::commit)
//! (also reachable through `Write::flush`) uploads it back. Closing does not
//! commit. The scratch file is deleted when the stream is closed or dropped,
//! whether or not an upload failed.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::client::RemoteFileInfo;
use crate::errors::FsResult;
use crate::session::Session;
use crate::vfs::FileSystemStream;

pub struct RemoteStream<'s> {
    session: &'s mut Session,
    handle: RemoteFileInfo,
    scratch: NamedTempFile,
}

impl<'s> RemoteStream<'s> {
    /// Download `handle` into a fresh scratch file.
    pub fn open(session: &'s mut Session, handle: &RemoteFileInfo) -> FsResult<Self> {
        let mut scratch = NamedTempFile::new()?;
        session.get_file(&handle.full_name, scratch.path())?;
        scratch.as_file_mut().seek(SeekFrom::Start(0))?;
        debug!(
            remote = handle.full_name.as_str(),
            scratch = %scratch.path().display(),
            "opened staged stream"
        );
        Ok(Self {
            session,
            handle: handle.clone(),
            scratch,
        })
    }

    /// Snapshot of the remote file as of the last successful commit, or of
    /// the open if nothing was committed.
    pub fn handle(&self) -> &RemoteFileInfo {
        &self.handle
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

impl Read for RemoteStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.scratch.as_file_mut().read(buf)
    }
}

impl Write for RemoteStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.as_file_mut().write(buf)
    }

    /// Flushes locally, then uploads.
    fn flush(&mut self) -> io::Result<()> {
        self.commit().map_err(io::Error::from)
    }
}

impl Seek for RemoteStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.scratch.as_file_mut().seek(pos)
    }
}

impl FileSystemStream for RemoteStream<'_> {
    fn len(&self) -> FsResult<u64> {
        Ok(self.scratch.as_file().metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> FsResult<()> {
        self.scratch.as_file().set_len(len)?;
        Ok(())
    }

    /// Upload the whole scratch copy over the remote file. On failure the
    /// scratch copy is left untouched so the commit can be retried.
    fn commit(&mut self) -> FsResult<()> {
        self.scratch.as_file_mut().flush()?;
        let remote = self.handle.full_name.clone();
        self.handle = self.session.put_file(self.scratch.path(), &remote, false)?;
        debug!(remote = remote.as_str(), bytes = self.handle.length, "committed stream");
        Ok(())
    }

    fn close(self) -> FsResult<()> {
        let path = self.scratch.path().to_path_buf();
        if let Err(e) = self.scratch.close() {
            warn!(scratch = %path.display(), "failed to delete scratch file: {e}");
            return Err(e.into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for RemoteStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("remote", &self.handle.full_name)
            .field("scratch", &self.scratch.path())
            .finish()
    }
}
