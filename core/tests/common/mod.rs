//! Shared helpers for ftpfs-core integration tests.
//!
//! Most tests run against the in-memory backend. Live protocol tests need
//! servers listening on the ports below and skip themselves otherwise.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module.
#![allow(dead_code)]

use std::net::TcpStream;
use std::time::Duration;

use ftpfs_core::client::memory::{MemoryConnector, MemoryStore};
use ftpfs_core::{FileSystemSettings, RemoteFileSystem};

/// Check if a TCP port is reachable on the given host within 2 seconds.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Skip the current test if no server is listening on the given port.
macro_rules! require_server {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!("SKIPPED: no server reachable on port {}", $port);
            return;
        }
    };
}
pub(crate) use require_server;

/// SFTP server with `testuser` / `testpass`.
pub const PORT_SFTP: u16 = 2201;
/// Plain FTP server with `testuser` / `testpass`.
pub const PORT_FTP: u16 = 2121;
/// WebDAV server with `testuser` / `testpass`.
pub const PORT_WEBDAV: u16 = 8088;

/// Store pre-populated with `/data/{a.txt, b.txt, sub/c.txt, sub/deep/}`.
pub fn sample_store() -> MemoryStore {
    MemoryStore::new()
        .with_file("/data/a.txt", "alpha")
        .with_file("/data/b.txt", "bravo")
        .with_file("/data/sub/c.txt", "charlie")
        .with_dir("/data/sub/deep")
}

pub fn settings_json(bypass_readonly: bool) -> serde_json::Value {
    serde_json::json!({
        "bypassReadonly": bypass_readonly,
        "session": {
            "protocol": "sftp",
            "host": "mem.example.com",
            "username": "testuser",
            "acceptAny": true
        }
    })
}

/// A file system over `store` whose default session needs no arguments.
pub fn memory_fs(store: &MemoryStore) -> RemoteFileSystem<MemoryConnector> {
    let settings: FileSystemSettings =
        serde_json::from_value(settings_json(false)).expect("settings should deserialize");
    RemoteFileSystem::with_connector("remote", settings, store.connector())
}

/// Random bytes for round-trip checks.
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// Live server settings for `protocol` on `port`.
pub fn live_settings(protocol: &str, port: u16) -> serde_json::Value {
    serde_json::json!({
        "protocol": protocol,
        "host": "127.0.0.1",
        "port": port,
        "username": "testuser",
        "password": "testpass",
        "acceptAny": true,
        "timeoutMs": 5000
    })
}
