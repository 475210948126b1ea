//! The remote client seam.
//!
//! A [`RemoteClient`] is one live connection that speaks a wire protocol.
//! Sessions never talk to a server directly; they go through this trait,
//! and a [`Connector`] produces the client for a set of [`ConnectParams`].

pub mod memory;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ConnectParams, Protocol};
use crate::errors::{FsError, FsResult, TransferError};

/// Metadata snapshot of one remote entry.
///
/// This is the handle type carried by directories and files. It is never
/// updated in place; operations that change the remote entry return a new
/// snapshot obtained from a fresh `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileInfo {
    pub full_name: String,
    pub name: String,
    pub length: u64,
    pub last_write_time: Option<DateTime<Utc>>,
    pub is_directory: bool,
    pub is_parent_directory: bool,
    pub is_this_directory: bool,
    /// Unix permission bits, when the protocol reports them.
    pub permissions: Option<u32>,
}

impl RemoteFileInfo {
    /// A regular entry at `full_name`; the name is its last path component.
    pub fn new(full_name: impl Into<String>, is_directory: bool) -> Self {
        let full_name = full_name.into();
        let name = leaf_name(&full_name).to_string();
        Self {
            full_name,
            name,
            length: 0,
            last_write_time: None,
            is_directory,
            is_parent_directory: false,
            is_this_directory: false,
            permissions: None,
        }
    }

    /// The `.` entry of a listing of `dir`.
    pub fn this_directory(dir: &str) -> Self {
        Self {
            name: ".".to_string(),
            is_this_directory: true,
            ..Self::new(dir, true)
        }
    }

    /// The `..` entry of a listing of `dir`.
    pub fn parent_directory(dir: &str) -> Self {
        Self {
            full_name: combine_paths(dir, ".."),
            name: "..".to_string(),
            is_parent_directory: true,
            ..Self::new(dir, true)
        }
    }

    /// Owner write bit. Entries without permission data count as writable.
    pub fn user_write(&self) -> bool {
        self.permissions.map_or(true, |mode| mode & 0o200 != 0)
    }

    /// True for the `.` and `..` pseudo-entries.
    pub fn is_pseudo(&self) -> bool {
        self.is_this_directory || self.is_parent_directory || self.name == "." || self.name == ".."
    }
}

/// One connection to a remote store.
///
/// Implementations are blocking and serial: each call completes before the
/// next is issued.
pub trait RemoteClient: Send {
    fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, TransferError>;

    /// Direct children of `path`. May include `.` and `..`.
    fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, TransferError>;

    /// Download `remote` into `local`, replacing its content. Returns the
    /// number of bytes transferred.
    fn get(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError>;

    /// Upload `local` to `remote`, overwriting it.
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError>;

    /// Remove a file or an empty directory.
    fn remove(&mut self, path: &str) -> Result<(), TransferError>;

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError>;

    fn create_dir(&mut self, path: &str) -> Result<(), TransferError>;

    fn combine_paths(&self, base: &str, name: &str) -> String {
        combine_paths(base, name)
    }

    fn close(&mut self) -> Result<(), TransferError>;
}

/// Opens remote clients.
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>>;
}

/// Connector that picks the backend from the configured protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolConnector;

impl Connector for ProtocolConnector {
    fn connect(&self, params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
        match params.protocol() {
            Protocol::Sftp | Protocol::Scp => {
                #[cfg(feature = "ssh")]
                {
                    crate::backends::ssh::connect(params)
                }
                #[cfg(not(feature = "ssh"))]
                {
                    Err(missing_feature(params.protocol(), "ssh"))
                }
            }
            Protocol::Ftp => {
                #[cfg(feature = "ftp")]
                {
                    crate::backends::ftp::connect(params)
                }
                #[cfg(not(feature = "ftp"))]
                {
                    Err(missing_feature(params.protocol(), "ftp"))
                }
            }
            Protocol::WebDav => {
                #[cfg(feature = "webdav")]
                {
                    crate::backends::webdav::connect(params)
                }
                #[cfg(not(feature = "webdav"))]
                {
                    Err(missing_feature(params.protocol(), "webdav"))
                }
            }
        }
    }
}

#[allow(dead_code)]
fn missing_feature(protocol: Protocol, feature: &str) -> FsError {
    FsError::Config(format!(
        "{protocol} support is not compiled in (enable the '{feature}' feature)"
    ))
}

/// Join `name` onto `base` with a single `/`. Absolute names win.
pub fn combine_paths(base: &str, name: &str) -> String {
    if name.starts_with('/') || base.is_empty() {
        return name.to_string();
    }
    if name.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Last component of a path; empty for the root.
pub fn leaf_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Parent of `full_name` given its leaf `name`. `None` for the root.
pub fn parent_path(full_name: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let trimmed = full_name.trim_end_matches('/');
    let parent = trimmed
        .strip_suffix(name)
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if parent.is_empty() && full_name.starts_with('/') {
        Some("/".to_string())
    } else {
        Some(parent.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_paths_joins_with_single_slash() {
        assert_eq!(combine_paths("/p", "a.txt"), "/p/a.txt");
        assert_eq!(combine_paths("/p/", "a.txt"), "/p/a.txt");
        assert_eq!(combine_paths("/", "a.txt"), "/a.txt");
        assert_eq!(combine_paths("/p", "/abs"), "/abs");
        assert_eq!(combine_paths("", "rel"), "rel");
        assert_eq!(combine_paths("/p", ""), "/p");
    }

    #[test]
    fn leaf_name_of_paths() {
        assert_eq!(leaf_name("/p/a.txt"), "a.txt");
        assert_eq!(leaf_name("/p/sub/"), "sub");
        assert_eq!(leaf_name("/"), "");
        assert_eq!(leaf_name("plain"), "plain");
    }

    #[test]
    fn parent_path_derivation() {
        assert_eq!(parent_path("/p/a.txt", "a.txt").as_deref(), Some("/p"));
        assert_eq!(parent_path("/a.txt", "a.txt").as_deref(), Some("/"));
        assert_eq!(parent_path("/p/sub/", "sub").as_deref(), Some("/p"));
        assert_eq!(parent_path("/", ""), None);
    }

    #[test]
    fn user_write_from_mode() {
        let mut info = RemoteFileInfo::new("/f", false);
        assert!(info.user_write());
        info.permissions = Some(0o644);
        assert!(info.user_write());
        info.permissions = Some(0o444);
        assert!(!info.user_write());
    }

    #[test]
    fn pseudo_entries() {
        let this = RemoteFileInfo::this_directory("/p");
        let parent = RemoteFileInfo::parent_directory("/p");
        assert!(this.is_pseudo() && this.is_directory);
        assert!(parent.is_pseudo());
        assert_eq!(parent.full_name, "/p/..");
        assert!(!RemoteFileInfo::new("/p/sub", true).is_pseudo());
    }

    #[cfg(not(feature = "ssh"))]
    #[test]
    fn protocol_connector_reports_missing_feature() {
        let mut params = ConnectParams::new(Protocol::Sftp);
        params.set_host("h");
        match ProtocolConnector.connect(&params) {
            Err(FsError::Config(msg)) => assert!(msg.contains("ssh"), "got: {msg}"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("connect must fail without the ssh feature"),
        }
    }
}
