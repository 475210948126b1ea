//! Remote file system adapter.
//!
//! Implements [`FileSystem`] over a [`Session`]: every operation is a
//! translation of the generic call into session calls on the entry's
//! [`RemoteFileInfo`] handle.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::capabilities::{Capabilities, CAPABILITIES};
use crate::client::{parent_path, Connector, ProtocolConnector, RemoteFileInfo};
use crate::config::{ConnectParams, FileSystemSettings};
use crate::errors::{FsError, FsResult};
use crate::session::Session;
use crate::stream::RemoteStream;
use crate::vfs::{Directory, Entry, File, FileSystem, Item, NameIter};

/// A remote store exposed as a [`FileSystem`].
pub struct RemoteFileSystem<C = ProtocolConnector> {
    name: String,
    settings: FileSystemSettings,
    connector: C,
}

impl RemoteFileSystem<ProtocolConnector> {
    pub fn new(name: impl Into<String>, settings: FileSystemSettings) -> Self {
        Self::with_connector(name, settings, ProtocolConnector)
    }
}

impl<C: Connector> RemoteFileSystem<C> {
    pub fn with_connector(name: impl Into<String>, settings: FileSystemSettings, connector: C) -> Self {
        Self {
            name: name.into(),
            settings,
            connector,
        }
    }

    pub fn settings(&self) -> &FileSystemSettings {
        &self.settings
    }

    fn file_entry(info: RemoteFileInfo) -> File<RemoteFileInfo> {
        let parent_path = parent_path(&info.full_name, &info.name);
        File(Item {
            handle: info,
            parent_path,
        })
    }

    fn directory_entry(info: RemoteFileInfo) -> Directory<RemoteFileInfo> {
        let parent_path = parent_path(&info.full_name, &info.name);
        Directory(Item {
            handle: info,
            parent_path,
        })
    }
}

impl<C: Connector> FileSystem for RemoteFileSystem<C> {
    type Session = Session;
    type Handle = RemoteFileInfo;
    type Stream<'s> = RemoteStream<'s> where Self: 's;

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn start_session(&self, params: Option<ConnectParams>) -> FsResult<Session> {
        let params = match params {
            Some(params) => params,
            None => {
                let defaults = self.settings.session.clone().ok_or_else(|| {
                    FsError::Validation("no connect parameters supplied".into())
                })?;
                ConnectParams::from_settings(&defaults.expand())?
            }
        };
        Session::open(params, &self.connector)
    }

    fn navigate(&self, session: &mut Session, path: &str) -> FsResult<Entry<RemoteFileInfo>> {
        let info = session.stat(path)?;
        Ok(if info.is_directory {
            Entry::Directory(Self::directory_entry(info))
        } else {
            Entry::File(Self::file_entry(info))
        })
    }

    fn create_directory(
        &self,
        session: &mut Session,
        parent: &Directory<RemoteFileInfo>,
        name: &str,
    ) -> FsResult<Directory<RemoteFileInfo>> {
        let info = session.create_directory(&parent.handle.full_name, name)?;
        Ok(Self::directory_entry(info))
    }

    fn create_file(
        &self,
        session: &mut Session,
        parent: &Directory<RemoteFileInfo>,
        name: &str,
        size: u64,
    ) -> FsResult<File<RemoteFileInfo>> {
        let scratch = tempfile::NamedTempFile::new()?;
        scratch.as_file().set_len(size)?;
        let scratch = scratch.into_temp_path();

        let remote = session.combine_path(&parent.handle.full_name, name)?;
        let info = session.put_file(&scratch, &remote, true)?;
        debug!(remote = remote.as_str(), size, "created file");
        Ok(Self::file_entry(info))
    }

    fn create_file_from(
        &self,
        session: &mut Session,
        parent: &Directory<RemoteFileInfo>,
        name: &str,
        local: &Path,
        read_only: bool,
    ) -> FsResult<File<RemoteFileInfo>> {
        if read_only {
            warn!(name, "read-only flag is not applied to uploaded files");
        }
        let remote = session.combine_path(&parent.handle.full_name, name)?;
        let info = session.put_file(local, &remote, false)?;
        Ok(Self::file_entry(info))
    }

    fn delete_item(&self, session: &mut Session, item: &Item<RemoteFileInfo>) -> FsResult<()> {
        session.remove(&item.handle.full_name)
    }

    fn list_file_names<'s>(
        &self,
        session: &'s mut Session,
        dir: &Directory<RemoteFileInfo>,
        recursive: bool,
    ) -> FsResult<NameIter<'s>> {
        let names = session
            .list(&dir.handle.full_name, recursive)
            .filter_map(|entry| match entry {
                Ok(info) if !info.is_directory => Some(Ok(info.name)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            });
        Ok(Box::new(names))
    }

    fn list_subdirectory_names<'s>(
        &self,
        session: &'s mut Session,
        dir: &Directory<RemoteFileInfo>,
        recursive: bool,
    ) -> FsResult<NameIter<'s>> {
        let names = session
            .list(&dir.handle.full_name, recursive)
            .filter_map(|entry| match entry {
                Ok(info) if info.is_directory && !info.is_pseudo() => Some(Ok(info.name)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            });
        Ok(Box::new(names))
    }

    fn rename_item(
        &self,
        session: &mut Session,
        item: &Item<RemoteFileInfo>,
        new_name: &str,
    ) -> FsResult<()> {
        let parent = item
            .parent_path
            .as_deref()
            .ok_or(FsError::NotSupported("renaming the root directory"))?;
        let target = session.combine_path(parent, new_name)?;
        session.move_path(&item.handle.full_name, &target)
    }

    fn item_size(&self, item: &Item<RemoteFileInfo>) -> FsResult<u64> {
        Ok(item.handle.length)
    }

    fn modification_timestamp(&self, item: &Item<RemoteFileInfo>) -> FsResult<Option<DateTime<Utc>>> {
        Ok(item.handle.last_write_time)
    }

    fn creation_timestamp(&self, _item: &Item<RemoteFileInfo>) -> FsResult<DateTime<Utc>> {
        Err(FsError::NotSupported("creation timestamp"))
    }

    fn last_access_timestamp(&self, _item: &Item<RemoteFileInfo>) -> FsResult<DateTime<Utc>> {
        Err(FsError::NotSupported("last access timestamp"))
    }

    fn set_creation_timestamp(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _at: DateTime<Utc>,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set creation timestamp"))
    }

    fn set_last_access_timestamp(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _at: DateTime<Utc>,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set last access timestamp"))
    }

    fn set_modification_timestamp(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _at: DateTime<Utc>,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set modification timestamp"))
    }

    fn read_only(&self, item: &Item<RemoteFileInfo>) -> FsResult<bool> {
        if self.settings.bypass_readonly {
            return Ok(false);
        }
        Ok(!item.handle.user_write())
    }

    fn set_read_only(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _read_only: bool,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set read-only"))
    }

    fn metadata(&self, _session: &mut Session, _item: &Item<RemoteFileInfo>) -> FsResult<Vec<u8>> {
        Err(FsError::NotSupported("metadata stream"))
    }

    fn set_metadata(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _data: &mut dyn Read,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set metadata stream"))
    }

    fn permissions(&self, _session: &mut Session, _item: &Item<RemoteFileInfo>) -> FsResult<Vec<u8>> {
        Err(FsError::NotSupported("permissions stream"))
    }

    fn set_permissions(
        &self,
        _session: &mut Session,
        _item: &Item<RemoteFileInfo>,
        _data: &mut dyn Read,
    ) -> FsResult<()> {
        Err(FsError::NotSupported("set permissions stream"))
    }

    fn open_stream<'s>(
        &self,
        session: &'s mut Session,
        file: &File<RemoteFileInfo>,
    ) -> FsResult<RemoteStream<'s>> {
        RemoteStream::open(session, &file.handle)
    }
}

impl<C> std::fmt::Debug for RemoteFileSystem<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileSystem")
            .field("name", &self.name)
            .field("bypass_readonly", &self.settings.bypass_readonly)
            .finish()
    }
}
