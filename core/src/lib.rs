#[cfg(any(feature = "ssh", feature = "tls"))]
pub mod backends;
pub mod capabilities;
pub mod client;
pub mod config;
pub mod errors;
pub mod files;
pub mod fs;
pub mod session;
pub mod stream;
pub mod vfs;

pub use capabilities::{Capabilities, CAPABILITIES};
pub use client::{Connector, ProtocolConnector, RemoteClient, RemoteFileInfo};
pub use config::{ConnectParams, ConnectSettings, FileSystemSettings, Protocol, SecureMode};
pub use errors::{FsError, FsResult, TransferError};
pub use fs::RemoteFileSystem;
pub use session::Session;
pub use stream::RemoteStream;
pub use vfs::{Directory, Entry, File, FileSystem, FileSystemStream, Item};
