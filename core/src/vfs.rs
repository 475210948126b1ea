//! Generic virtual file system contract.
//!
//! A [`FileSystem`] turns paths into [`Entry`] values and performs
//! operations on them through a session it created itself. The concrete
//! session, handle and stream types are associated types, so an adapter
//! never has to recover its own state from an opaque handle.

use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::capabilities::Capabilities;
use crate::config::ConnectParams;
use crate::errors::FsResult;

/// A navigated entry: the adapter's handle plus the parent path.
///
/// `parent_path` is `None` for the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<H> {
    pub handle: H,
    pub parent_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory<H>(pub Item<H>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File<H>(pub Item<H>);

impl<H> Deref for Directory<H> {
    type Target = Item<H>;

    fn deref(&self) -> &Item<H> {
        &self.0
    }
}

impl<H> Deref for File<H> {
    type Target = Item<H>;

    fn deref(&self) -> &Item<H> {
        &self.0
    }
}

/// Result of navigating to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<H> {
    Directory(Directory<H>),
    File(File<H>),
}

impl<H> Entry<H> {
    pub fn item(&self) -> &Item<H> {
        match self {
            Entry::Directory(d) => d,
            Entry::File(f) => f,
        }
    }

    pub fn into_directory(self) -> Option<Directory<H>> {
        match self {
            Entry::Directory(d) => Some(d),
            Entry::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<File<H>> {
        match self {
            Entry::File(f) => Some(f),
            Entry::Directory(_) => None,
        }
    }
}

/// Lazily produced names.
pub type NameIter<'s> = Box<dyn Iterator<Item = FsResult<String>> + 's>;

/// Random-access stream over one file.
pub trait FileSystemStream: Read + Write + Seek {
    fn len(&self) -> FsResult<u64>;

    fn is_empty(&self) -> FsResult<bool> {
        Ok(self.len()? == 0)
    }

    fn set_len(&mut self, len: u64) -> FsResult<()>;

    fn position(&mut self) -> FsResult<u64> {
        Ok(self.stream_position()?)
    }

    fn set_position(&mut self, pos: u64) -> FsResult<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Persist everything written so far.
    fn commit(&mut self) -> FsResult<()>;

    /// Release the stream without committing.
    fn close(self) -> FsResult<()>
    where
        Self: Sized;
}

/// A pluggable file system.
pub trait FileSystem {
    type Session;
    type Handle;
    type Stream<'s>: FileSystemStream
    where
        Self: 's;

    fn name(&self) -> &str;

    fn capabilities(&self) -> &'static Capabilities;

    /// Open a session. `None` falls back to the configured defaults.
    fn start_session(&self, params: Option<ConnectParams>) -> FsResult<Self::Session>;

    fn navigate(&self, session: &mut Self::Session, path: &str) -> FsResult<Entry<Self::Handle>>;

    fn create_directory(
        &self,
        session: &mut Self::Session,
        parent: &Directory<Self::Handle>,
        name: &str,
    ) -> FsResult<Directory<Self::Handle>>;

    /// Create a zero-filled file of `size` bytes.
    fn create_file(
        &self,
        session: &mut Self::Session,
        parent: &Directory<Self::Handle>,
        name: &str,
        size: u64,
    ) -> FsResult<File<Self::Handle>>;

    /// Create a file from the content of a local file.
    fn create_file_from(
        &self,
        session: &mut Self::Session,
        parent: &Directory<Self::Handle>,
        name: &str,
        local: &Path,
        read_only: bool,
    ) -> FsResult<File<Self::Handle>>;

    fn delete_item(&self, session: &mut Self::Session, item: &Item<Self::Handle>) -> FsResult<()>;

    /// Leaf names of files under `dir`, descending into subdirectories
    /// when `recursive`.
    fn list_file_names<'s>(
        &self,
        session: &'s mut Self::Session,
        dir: &Directory<Self::Handle>,
        recursive: bool,
    ) -> FsResult<NameIter<'s>>;

    fn list_subdirectory_names<'s>(
        &self,
        session: &'s mut Self::Session,
        dir: &Directory<Self::Handle>,
        recursive: bool,
    ) -> FsResult<NameIter<'s>>;

    /// Rename in place. The item's handle is stale afterwards.
    fn rename_item(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        new_name: &str,
    ) -> FsResult<()>;

    fn item_size(&self, item: &Item<Self::Handle>) -> FsResult<u64>;

    fn modification_timestamp(&self, item: &Item<Self::Handle>) -> FsResult<Option<DateTime<Utc>>>;

    fn creation_timestamp(&self, item: &Item<Self::Handle>) -> FsResult<DateTime<Utc>>;

    fn last_access_timestamp(&self, item: &Item<Self::Handle>) -> FsResult<DateTime<Utc>>;

    fn set_creation_timestamp(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        at: DateTime<Utc>,
    ) -> FsResult<()>;

    fn set_last_access_timestamp(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        at: DateTime<Utc>,
    ) -> FsResult<()>;

    fn set_modification_timestamp(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        at: DateTime<Utc>,
    ) -> FsResult<()>;

    fn read_only(&self, item: &Item<Self::Handle>) -> FsResult<bool>;

    fn set_read_only(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        read_only: bool,
    ) -> FsResult<()>;

    fn metadata(&self, session: &mut Self::Session, item: &Item<Self::Handle>) -> FsResult<Vec<u8>>;

    fn set_metadata(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        data: &mut dyn Read,
    ) -> FsResult<()>;

    fn permissions(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
    ) -> FsResult<Vec<u8>>;

    fn set_permissions(
        &self,
        session: &mut Self::Session,
        item: &Item<Self::Handle>,
        data: &mut dyn Read,
    ) -> FsResult<()>;

    fn open_stream<'s>(
        &self,
        session: &'s mut Self::Session,
        file: &File<Self::Handle>,
    ) -> FsResult<Self::Stream<'s>>;

    /// Read the whole file.
    fn read_all(&self, session: &mut Self::Session, file: &File<Self::Handle>) -> FsResult<Vec<u8>> {
        let mut stream = self.open_stream(session, file)?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        stream.close()?;
        Ok(data)
    }

    /// Replace the whole file with `data` and commit.
    fn write_all(
        &self,
        session: &mut Self::Session,
        file: &File<Self::Handle>,
        data: &[u8],
    ) -> FsResult<()> {
        let mut stream = self.open_stream(session, file)?;
        stream.set_len(0)?;
        stream.set_position(0)?;
        Write::write_all(&mut stream, data)?;
        stream.commit()?;
        stream.close()
    }
}
