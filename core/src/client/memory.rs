//! In-memory remote store.
//!
//! Behaves like a small POSIX-style server: a tree of directories and files
//! rooted at `/`, listings that include `.` and `..`, and permission bits on
//! every node. Clones of a [`MemoryStore`] share state, so a test can keep
//! one handle to inspect the store while sessions operate on it. Upload
//! failures can be injected to exercise error paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{Connector, RemoteClient, RemoteFileInfo};
use crate::config::ConnectParams;
use crate::errors::{FsResult, TransferError};

#[derive(Debug, Clone)]
enum NodeKind {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    modified: DateTime<Utc>,
    mode: u32,
}

impl Node {
    fn directory() -> Self {
        Self {
            kind: NodeKind::Directory,
            modified: Utc::now(),
            mode: 0o755,
        }
    }

    fn file(data: Vec<u8>) -> Self {
        Self {
            kind: NodeKind::File(data),
            modified: Utc::now(),
            mode: 0o644,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }
}

#[derive(Debug)]
struct StoreState {
    nodes: BTreeMap<String, Node>,
    fail_uploads: bool,
    connects: usize,
    closes: usize,
}

/// Shared in-memory file tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store containing only `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::directory());
        Self {
            state: Arc::new(Mutex::new(StoreState {
                nodes,
                fail_uploads: false,
                connects: 0,
                closes: 0,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, TransferError> {
        self.state
            .lock()
            .map_err(|e| TransferError::Failed(format!("memory store poisoned: {e}")))
    }

    /// Create a directory and any missing ancestors.
    pub fn with_dir(self, path: &str) -> Self {
        if let Ok(mut state) = self.lock() {
            let path = normalize(path);
            for ancestor in ancestors(&path) {
                state
                    .nodes
                    .entry(ancestor)
                    .or_insert_with(Node::directory);
            }
        }
        self
    }

    /// Create a file, and any missing ancestor directories.
    pub fn with_file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        let path = normalize(path);
        let store = self.with_dir(&parent_of(&path));
        if let Ok(mut state) = store.lock() {
            state.nodes.insert(path, Node::file(data.into()));
        }
        store
    }

    /// Set the permission bits of an existing node.
    pub fn set_mode(&self, path: &str, mode: u32) {
        if let Ok(mut state) = self.lock() {
            if let Some(node) = state.nodes.get_mut(&normalize(path)) {
                node.mode = mode;
            }
        }
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_uploads = fail;
        }
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock().ok()?;
        let node = state.nodes.get(&normalize(path))?;
        match &node.kind {
            NodeKind::File(data) => Some(data.clone()),
            NodeKind::Directory => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock()
            .map(|s| s.nodes.contains_key(&normalize(path)))
            .unwrap_or(false)
    }

    /// Number of clients opened against this store.
    pub fn connect_count(&self) -> usize {
        self.lock().map(|s| s.connects).unwrap_or(0)
    }

    /// Number of clients closed.
    pub fn close_count(&self) -> usize {
        self.lock().map(|s| s.closes).unwrap_or(0)
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
        }
    }
}

/// [`Connector`] handing out clients bound to one [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl Connector for MemoryConnector {
    fn connect(&self, params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
        self.store.lock()?.connects += 1;
        debug!(host = params.host(), "opened in-memory client");
        Ok(Box::new(MemoryClient {
            store: self.store.clone(),
        }))
    }
}

struct MemoryClient {
    store: MemoryStore,
}

impl MemoryClient {
    fn info(path: &str, node: &Node) -> RemoteFileInfo {
        let mut info = RemoteFileInfo::new(path, node.is_dir());
        if let NodeKind::File(data) = &node.kind {
            info.length = data.len() as u64;
        }
        info.last_write_time = Some(node.modified);
        info.permissions = Some(node.mode);
        info
    }
}

impl RemoteClient for MemoryClient {
    fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, TransferError> {
        let path = normalize(path);
        let state = self.store.lock()?;
        let node = state
            .nodes
            .get(&path)
            .ok_or_else(|| TransferError::NotFound(path.clone()))?;
        Ok(Self::info(&path, node))
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, TransferError> {
        let path = normalize(path);
        let state = self.store.lock()?;
        match state.nodes.get(&path) {
            Some(node) if node.is_dir() => {}
            Some(_) => return Err(TransferError::Failed(format!("{path} is not a directory"))),
            None => return Err(TransferError::NotFound(path)),
        }

        let mut entries = vec![
            RemoteFileInfo::this_directory(&path),
            RemoteFileInfo::parent_directory(&path),
        ];
        entries.extend(
            state
                .nodes
                .iter()
                .filter(|(p, _)| p.as_str() != "/" && parent_of(p) == path)
                .map(|(p, node)| Self::info(p, node)),
        );
        Ok(entries)
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let remote = normalize(remote);
        let data = {
            let state = self.store.lock()?;
            match state.nodes.get(&remote).map(|n| &n.kind) {
                Some(NodeKind::File(data)) => data.clone(),
                Some(NodeKind::Directory) => {
                    return Err(TransferError::Failed(format!("{remote} is a directory")))
                }
                None => return Err(TransferError::NotFound(remote)),
            }
        };
        fs::write(local, &data)?;
        Ok(data.len() as u64)
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let remote = normalize(remote);
        let data = fs::read(local)?;
        let mut state = self.store.lock()?;
        if state.fail_uploads {
            return Err(TransferError::Failed(format!(
                "upload of {remote} failed: connection reset"
            )));
        }
        let parent = parent_of(&remote);
        match state.nodes.get(&parent) {
            Some(node) if node.is_dir() => {}
            _ => return Err(TransferError::NotFound(parent)),
        }
        if let Some(node) = state.nodes.get(&remote) {
            if node.is_dir() {
                return Err(TransferError::Failed(format!("{remote} is a directory")));
            }
            if node.mode & 0o200 == 0 {
                return Err(TransferError::PermissionDenied(remote));
            }
        }
        let len = data.len() as u64;
        let mode = state.nodes.get(&remote).map_or(0o644, |n| n.mode);
        state.nodes.insert(
            remote,
            Node {
                mode,
                ..Node::file(data)
            },
        );
        Ok(len)
    }

    fn remove(&mut self, path: &str) -> Result<(), TransferError> {
        let path = normalize(path);
        if path == "/" {
            return Err(TransferError::PermissionDenied(path));
        }
        let mut state = self.store.lock()?;
        if !state.nodes.contains_key(&path) {
            return Err(TransferError::NotFound(path));
        }
        let prefix = format!("{path}/");
        if state.nodes.keys().any(|k| k.starts_with(&prefix)) {
            return Err(TransferError::Failed(format!("{path}: directory not empty")));
        }
        state.nodes.remove(&path);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        let from = normalize(from);
        let to = normalize(to);
        let mut state = self.store.lock()?;
        if !state.nodes.contains_key(&from) {
            return Err(TransferError::NotFound(from));
        }
        let target_parent = parent_of(&to);
        if !state.nodes.get(&target_parent).is_some_and(Node::is_dir) {
            return Err(TransferError::NotFound(target_parent));
        }
        if to.starts_with(&format!("{from}/")) {
            return Err(TransferError::Failed(format!(
                "cannot move {from} into itself"
            )));
        }

        let prefix = format!("{from}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| **k == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = state.nodes.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                state.nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<(), TransferError> {
        let path = normalize(path);
        let mut state = self.store.lock()?;
        if state.nodes.contains_key(&path) {
            return Err(TransferError::Failed(format!("{path} already exists")));
        }
        let parent = parent_of(&path);
        if !state.nodes.get(&parent).is_some_and(Node::is_dir) {
            return Err(TransferError::NotFound(parent));
        }
        state.nodes.insert(path, Node::directory());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        self.store.lock()?.closes += 1;
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// `/a/b/c` yields `/`, `/a`, `/a/b`, `/a/b/c`.
fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        out.push(current.clone());
    }
    out
}
