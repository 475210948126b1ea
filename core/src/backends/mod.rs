//! Wire protocol backends implementing [`RemoteClient`](crate::client::RemoteClient).
//!
//! Each backend pulls in its own protocol stack and is gated behind a cargo
//! feature, so consumers only compile the protocols they use.

#[cfg(feature = "ftp")]
pub mod ftp;
#[cfg(feature = "ssh")]
pub mod ssh;
#[cfg(feature = "tls")]
pub mod tls;
#[cfg(feature = "webdav")]
pub mod webdav;

use tracing::debug;

use crate::config::ConnectParams;

/// Log raw settings the backend does not act on.
#[allow(dead_code)]
pub(crate) fn report_unknown_raw_settings(params: &ConnectParams, known: &[&str]) {
    for name in params.raw_settings().keys() {
        if !known.contains(&name.as_str()) {
            debug!(protocol = %params.protocol(), setting = name.as_str(), "ignoring raw setting");
        }
    }
}

/// Parse a boolean raw setting the way configuration files spell them.
#[allow(dead_code)]
pub(crate) fn raw_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
