pub mod expand;
mod params;

pub use params::{ConnectParams, Security, SshSecurity, TlsSecurity};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FsError;

/// Wire protocol spoken by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Sftp,
    Scp,
    Ftp,
    #[serde(rename = "webdav")]
    WebDav,
}

impl Protocol {
    /// SFTP and SCP authenticate with SSH host keys and private keys;
    /// FTP and WebDAV with TLS certificates.
    pub fn is_ssh(self) -> bool {
        matches!(self, Protocol::Sftp | Protocol::Scp)
    }

    /// Port used when the configuration leaves it at 0.
    pub fn default_port(self, secure: SecureMode) -> u16 {
        match (self, secure) {
            (Protocol::Sftp | Protocol::Scp, _) => 22,
            (Protocol::Ftp, SecureMode::Implicit) => 990,
            (Protocol::Ftp, _) => 21,
            (Protocol::WebDav, SecureMode::None) => 80,
            (Protocol::WebDav, _) => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Sftp => "sftp",
            Protocol::Scp => "scp",
            Protocol::Ftp => "ftp",
            Protocol::WebDav => "webdav",
        };
        f.write_str(name)
    }
}

impl FromStr for Protocol {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sftp" => Ok(Protocol::Sftp),
            "scp" => Ok(Protocol::Scp),
            "ftp" => Ok(Protocol::Ftp),
            "webdav" | "dav" => Ok(Protocol::WebDav),
            other => Err(FsError::Config(format!("unknown protocol '{other}'"))),
        }
    }
}

/// Transport security mode.
///
/// Meaningful for FTP (all three) and WebDAV (`None` or secure). SSH based
/// protocols always report `Implicit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecureMode {
    #[default]
    None,
    Implicit,
    Explicit,
}

/// Raw connect settings as they arrive from a configuration file or the UI.
///
/// Every field is optional; [`ConnectParams::from_settings`] resolves them
/// in order: `serverUrl`, `protocol`, typed fields, then `rawSettings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_any: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
    /// Negative values are clamped to 0 (no timeout).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<SecureMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    /// Forwarded verbatim to the backend. Values must be scalars.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub raw_settings: BTreeMap<String, serde_json::Value>,
}

impl ConnectSettings {
    /// Return a copy with `${env:...}` placeholders expanded and `~`
    /// expanded in the private key path.
    pub fn expand(mut self) -> Self {
        let env = |v: Option<String>| v.map(|s| expand::expand_env_placeholders(&s));
        self.server_url = env(self.server_url);
        self.host = env(self.host);
        self.username = env(self.username);
        self.password = env(self.password);
        self.fingerprint = env(self.fingerprint);
        self.private_key_passphrase = env(self.private_key_passphrase);
        self.private_key_path = self
            .private_key_path
            .map(|s| expand::expand_local_path(&s));
        self
    }
}

/// File-system level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSystemSettings {
    /// Report every item as writable regardless of permission bits.
    pub bypass_readonly: bool,
    /// Used by `start_session` when the caller passes no parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ConnectSettings>,
}
