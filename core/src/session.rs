//! Session lifecycle over one remote client connection.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::client::{Connector, RemoteClient, RemoteFileInfo};
use crate::config::ConnectParams;
use crate::errors::{FsError, FsResult};

/// Check connect parameters before any network I/O.
///
/// Host and username must be set, and the server identity must either be
/// pinned by fingerprint or explicitly accepted.
pub fn validate_connect_params(params: &ConnectParams) -> FsResult<()> {
    if params.host().trim().is_empty() {
        return Err(FsError::Validation("host must not be empty".into()));
    }
    if params.username().trim().is_empty() {
        return Err(FsError::Validation("username must not be empty".into()));
    }
    if params.fingerprint().trim().is_empty() && !params.accept_any() {
        return Err(FsError::Validation(
            "either a fingerprint or accept-any must be configured".into(),
        ));
    }
    Ok(())
}

/// One live connection to a remote store.
///
/// A session is serial: every operation blocks until the server answers.
/// Open several sessions for parallel access.
pub struct Session {
    params: ConnectParams,
    client: Option<Box<dyn RemoteClient>>,
}

impl Session {
    /// Validate `params`, then open exactly one connection.
    pub fn open(params: ConnectParams, connector: &dyn Connector) -> FsResult<Self> {
        validate_connect_params(&params)?;
        debug!(
            protocol = %params.protocol(),
            host = params.host(),
            port = params.effective_port(),
            "opening session"
        );
        let client = connector.connect(&params)?;
        info!(protocol = %params.protocol(), host = params.host(), "session opened");
        Ok(Self {
            params,
            client: Some(client),
        })
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn client(&mut self) -> FsResult<&mut (dyn RemoteClient + 'static)> {
        self.client.as_deref_mut().ok_or(FsError::Closed)
    }

    pub fn stat(&mut self, path: &str) -> FsResult<RemoteFileInfo> {
        Ok(self.client()?.stat(path)?)
    }

    /// Lazily list `path`. Pseudo-entries are skipped. With `recursive`,
    /// each subdirectory is listed when the walk reaches it.
    pub fn list(&mut self, path: &str, recursive: bool) -> ListWalk<'_> {
        ListWalk {
            client: self.client.as_deref_mut(),
            pending: VecDeque::from([path.to_string()]),
            buffered: VecDeque::new(),
            recursive,
            done: false,
        }
    }

    pub fn create_directory(&mut self, parent: &str, name: &str) -> FsResult<RemoteFileInfo> {
        let path = self.combine_path(parent, name)?;
        self.client()?.create_dir(&path)?;
        debug!(path = path.as_str(), "created directory");
        self.stat(&path)
    }

    /// Upload `local` to `remote` and return the fresh remote snapshot.
    ///
    /// With `remove_local_after`, the local file is deleted once the upload
    /// succeeds. Failing to delete it is logged; the upload still counts.
    pub fn put_file(
        &mut self,
        local: &Path,
        remote: &str,
        remove_local_after: bool,
    ) -> FsResult<RemoteFileInfo> {
        let bytes = self.client()?.put(local, remote)?;
        debug!(remote, bytes, "uploaded");
        if remove_local_after {
            if let Err(e) = fs::remove_file(local) {
                warn!(local = %local.display(), "failed to remove uploaded local file: {e}");
            }
        }
        self.stat(remote)
    }

    pub fn get_file(&mut self, remote: &str, local: &Path) -> FsResult<()> {
        let bytes = self.client()?.get(remote, local)?;
        debug!(remote, bytes, "downloaded");
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> FsResult<()> {
        self.client()?.remove(path)?;
        debug!(path, "removed");
        Ok(())
    }

    pub fn move_path(&mut self, from: &str, to: &str) -> FsResult<()> {
        self.client()?.rename(from, to)?;
        debug!(from, to, "moved");
        Ok(())
    }

    pub fn combine_path(&mut self, base: &str, name: &str) -> FsResult<String> {
        Ok(self.client()?.combine_paths(base, name))
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn close(&mut self) -> FsResult<()> {
        if let Some(mut client) = self.client.take() {
            client.close()?;
            info!(host = self.params.host(), "session closed");
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close session: {e}");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.params.protocol())
            .field("host", &self.params.host())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Breadth-first walk over a remote directory tree.
///
/// Each directory is listed only when the walk reaches it. The walk stops
/// after the first error. Restart by calling [`Session::list`] again.
pub struct ListWalk<'s> {
    client: Option<&'s mut (dyn RemoteClient + 'static)>,
    pending: VecDeque<String>,
    buffered: VecDeque<RemoteFileInfo>,
    recursive: bool,
    done: bool,
}

impl Iterator for ListWalk<'_> {
    type Item = FsResult<RemoteFileInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(info) = self.buffered.pop_front() {
                if info.is_pseudo() {
                    continue;
                }
                if self.recursive && info.is_directory {
                    self.pending.push_back(info.full_name.clone());
                }
                return Some(Ok(info));
            }

            let dir = self.pending.pop_front()?;
            let Some(client) = self.client.as_deref_mut() else {
                self.done = true;
                return Some(Err(FsError::Closed));
            };
            match client.list(&dir) {
                Ok(entries) => self.buffered.extend(entries),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::MemoryStore;
    use crate::config::Protocol;

    fn params() -> ConnectParams {
        let mut p = ConnectParams::new(Protocol::Sftp);
        p.set_host("files.example.com");
        p.set_username("tester");
        p.set_accept_any(true);
        p
    }

    #[test]
    fn validation_requires_host() {
        let mut p = params();
        p.set_host("");
        let err = validate_connect_params(&p).unwrap_err();
        assert!(matches!(err, FsError::Validation(_)));
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn validation_requires_username() {
        let mut p = params();
        p.set_username(" ");
        assert!(matches!(
            validate_connect_params(&p),
            Err(FsError::Validation(_))
        ));
    }

    #[test]
    fn validation_requires_identity() {
        let mut p = params();
        p.set_accept_any(false);
        assert!(matches!(
            validate_connect_params(&p),
            Err(FsError::Validation(_))
        ));
        p.set_fingerprint("SHA256:abc");
        assert!(validate_connect_params(&p).is_ok());
    }

    #[test]
    fn invalid_params_never_connect() {
        let store = MemoryStore::new();
        let mut p = params();
        p.set_host("");
        assert!(Session::open(p, &store.connector()).is_err());
        assert_eq!(store.connect_count(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let store = MemoryStore::new();
        let mut session = Session::open(params(), &store.connector()).unwrap();
        session.close().unwrap();
        session.close().unwrap();
        drop(session);
        assert_eq!(store.connect_count(), 1);
        assert_eq!(store.close_count(), 1);
    }

    #[test]
    fn drop_closes_connection() {
        let store = MemoryStore::new();
        drop(Session::open(params(), &store.connector()).unwrap());
        assert_eq!(store.close_count(), 1);
    }

    #[test]
    fn operations_after_close_fail() {
        let store = MemoryStore::new().with_file("/a.txt", "a");
        let mut session = Session::open(params(), &store.connector()).unwrap();
        session.close().unwrap();
        assert!(matches!(session.stat("/a.txt"), Err(FsError::Closed)));
        let mut walk = session.list("/", false);
        assert!(matches!(walk.next(), Some(Err(FsError::Closed))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn list_skips_pseudo_entries() {
        let store = MemoryStore::new()
            .with_file("/p/a.txt", "a")
            .with_file("/p/sub/c.txt", "c");
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let names: Vec<String> = session
            .list("/p", false)
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[test]
    fn recursive_list_descends() {
        let store = MemoryStore::new()
            .with_file("/p/a.txt", "a")
            .with_file("/p/sub/c.txt", "c")
            .with_dir("/p/sub/deeper");
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let paths: Vec<String> = session
            .list("/p", true)
            .map(|r| r.unwrap().full_name)
            .collect();
        assert_eq!(
            paths,
            vec!["/p/a.txt", "/p/sub", "/p/sub/c.txt", "/p/sub/deeper"]
        );
    }

    #[test]
    fn list_error_ends_walk() {
        let store = MemoryStore::new();
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let mut walk = session.list("/missing", true);
        let first = walk.next().unwrap();
        assert!(first.unwrap_err().is_not_found());
        assert!(walk.next().is_none());
    }

    #[test]
    fn put_file_can_remove_local_copy() {
        let store = MemoryStore::new();
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("up.txt");
        std::fs::write(&local, "payload").unwrap();

        let info = session.put_file(&local, "/up.txt", true).unwrap();
        assert_eq!(info.length, 7);
        assert!(!local.exists());
        assert_eq!(store.file_contents("/up.txt").unwrap(), b"payload");
    }

    /// Client whose uploads also consume the local file, so the session's
    /// own removal finds nothing to delete.
    struct ConsumingClient(Box<dyn RemoteClient>);

    impl RemoteClient for ConsumingClient {
        fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, crate::errors::TransferError> {
            self.0.stat(path)
        }
        fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, crate::errors::TransferError> {
            self.0.list(path)
        }
        fn get(&mut self, remote: &str, local: &Path) -> Result<u64, crate::errors::TransferError> {
            self.0.get(remote, local)
        }
        fn put(&mut self, local: &Path, remote: &str) -> Result<u64, crate::errors::TransferError> {
            let bytes = self.0.put(local, remote)?;
            fs::remove_file(local)?;
            Ok(bytes)
        }
        fn remove(&mut self, path: &str) -> Result<(), crate::errors::TransferError> {
            self.0.remove(path)
        }
        fn rename(&mut self, from: &str, to: &str) -> Result<(), crate::errors::TransferError> {
            self.0.rename(from, to)
        }
        fn create_dir(&mut self, path: &str) -> Result<(), crate::errors::TransferError> {
            self.0.create_dir(path)
        }
        fn close(&mut self) -> Result<(), crate::errors::TransferError> {
            self.0.close()
        }
    }

    struct ConsumingConnector(crate::client::memory::MemoryConnector);

    impl Connector for ConsumingConnector {
        fn connect(&self, params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
            Ok(Box::new(ConsumingClient(self.0.connect(params)?)))
        }
    }

    #[test]
    fn local_removal_failure_keeps_upload_result() {
        let store = MemoryStore::new();
        let connector = ConsumingConnector(store.connector());
        let mut session = Session::open(params(), &connector).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("up.txt");
        std::fs::write(&local, "payload").unwrap();

        let info = session.put_file(&local, "/up.txt", true).unwrap();
        assert_eq!(info.length, 7);
        assert_eq!(store.file_contents("/up.txt").unwrap(), b"payload");
    }

    #[test]
    fn failed_put_keeps_local_copy() {
        let store = MemoryStore::new();
        store.fail_uploads(true);
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("up.txt");
        std::fs::write(&local, "payload").unwrap();

        let err = session.put_file(&local, "/up.txt", true).unwrap_err();
        assert!(matches!(err, FsError::Transfer(_)));
        assert!(local.exists());
    }

    #[test]
    fn create_directory_returns_fresh_handle() {
        let store = MemoryStore::new().with_dir("/p");
        let mut session = Session::open(params(), &store.connector()).unwrap();
        let info = session.create_directory("/p", "new").unwrap();
        assert!(info.is_directory);
        assert_eq!(info.full_name, "/p/new");
        assert_eq!(info.name, "new");
    }
}
