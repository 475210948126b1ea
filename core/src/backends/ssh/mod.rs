//! SFTP and SCP client over `ssh2`.
//!
//! Both protocols share one blocking SSH session. Directory operations go
//! through the SFTP subsystem; with SCP, file content is moved over
//! `scp_send`/`scp_recv` channels instead of SFTP file handles.

pub mod auth;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::DateTime;
use tracing::{debug, info};

use crate::client::{RemoteClient, RemoteFileInfo};
use crate::config::{ConnectParams, Protocol};
use crate::errors::{FsError, FsResult, TransferError};

use self::auth::connect_and_authenticate;

// libssh2 SFTP status codes.
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;

/// Open an SFTP or SCP client for `params`.
pub fn connect(params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
    crate::backends::report_unknown_raw_settings(params, &["Compression", "KeepaliveInterval"]);
    let session = connect_and_authenticate(params)?;
    session.set_blocking(true);
    let sftp = session
        .sftp()
        .map_err(|e| FsError::Transfer(TransferError::Failed(format!("SFTP init failed: {e}"))))?;
    info!(
        protocol = %params.protocol(),
        host = params.host(),
        "SSH session established"
    );
    Ok(Box::new(SshClient {
        session,
        sftp,
        scp: params.protocol() == Protocol::Scp,
    }))
}

pub struct SshClient {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
    scp: bool,
}

fn transfer_error(op: &str, path: &str, e: ssh2::Error) -> TransferError {
    match e.code() {
        ssh2::ErrorCode::SFTP(FX_NO_SUCH_FILE) => TransferError::NotFound(path.to_string()),
        ssh2::ErrorCode::SFTP(FX_PERMISSION_DENIED) => {
            TransferError::PermissionDenied(path.to_string())
        }
        _ => TransferError::Failed(format!("{op} {path} failed: {e}")),
    }
}

fn file_info(path: &str, stat: &ssh2::FileStat) -> RemoteFileInfo {
    let mut info = RemoteFileInfo::new(path, stat.is_dir());
    info.length = stat.size.unwrap_or(0);
    info.last_write_time = stat
        .mtime
        .and_then(|t| DateTime::from_timestamp(i64::try_from(t).ok()?, 0));
    info.permissions = stat.perm.map(|p| p & 0o7777);
    info
}

impl SshClient {
    fn scp_get(&self, remote: &str, local: &mut File) -> Result<u64, TransferError> {
        let (mut channel, stat) = self
            .session
            .scp_recv(Path::new(remote))
            .map_err(|e| transfer_error("scp get", remote, e))?;
        let bytes = io::copy(&mut (&mut channel).take(stat.size()), local)?;
        finish_channel(&mut channel, remote)?;
        Ok(bytes)
    }

    fn scp_put(&self, local: &mut File, remote: &str) -> Result<u64, TransferError> {
        let meta = local.metadata()?;
        let mode = mode_of(&meta);
        let mut channel = self
            .session
            .scp_send(Path::new(remote), mode, meta.len(), None)
            .map_err(|e| transfer_error("scp put", remote, e))?;
        let bytes = io::copy(local, &mut channel)?;
        channel
            .send_eof()
            .map_err(|e| transfer_error("scp put", remote, e))?;
        finish_channel(&mut channel, remote)?;
        Ok(bytes)
    }
}

fn finish_channel(channel: &mut ssh2::Channel, remote: &str) -> Result<(), TransferError> {
    let finish = |channel: &mut ssh2::Channel| -> Result<(), ssh2::Error> {
        channel.wait_eof()?;
        channel.close()?;
        channel.wait_close()
    };
    finish(channel).map_err(|e| transfer_error("scp", remote, e))
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    (meta.permissions().mode() & 0o777) as i32
}

#[cfg(not(unix))]
fn mode_of(meta: &std::fs::Metadata) -> i32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

impl RemoteClient for SshClient {
    fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, TransferError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| transfer_error("stat", path, e))?;
        Ok(file_info(path, &stat))
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, TransferError> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| transfer_error("readdir", path, e))?;
        Ok(entries
            .iter()
            .map(|(entry, stat)| file_info(&entry.to_string_lossy(), stat))
            .collect())
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let mut out = File::create(local)?;
        let bytes = if self.scp {
            self.scp_get(remote, &mut out)?
        } else {
            let mut src = self
                .sftp
                .open(Path::new(remote))
                .map_err(|e| transfer_error("open", remote, e))?;
            io::copy(&mut src, &mut out)?
        };
        debug!(remote, bytes, scp = self.scp, "download complete");
        Ok(bytes)
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let mut src = File::open(local)?;
        let bytes = if self.scp {
            self.scp_put(&mut src, remote)?
        } else {
            let mut dst = self
                .sftp
                .create(Path::new(remote))
                .map_err(|e| transfer_error("create", remote, e))?;
            io::copy(&mut src, &mut dst)?
        };
        debug!(remote, bytes, scp = self.scp, "upload complete");
        Ok(bytes)
    }

    fn remove(&mut self, path: &str) -> Result<(), TransferError> {
        let p = Path::new(path);
        let stat = self
            .sftp
            .lstat(p)
            .map_err(|e| transfer_error("stat", path, e))?;
        if stat.is_dir() {
            self.sftp.rmdir(p).map_err(|e| transfer_error("rmdir", path, e))
        } else {
            self.sftp.unlink(p).map_err(|e| transfer_error("unlink", path, e))
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        self.sftp
            .rename(Path::new(from), Path::new(to), None)
            .map_err(|e| transfer_error("rename", from, e))
    }

    fn create_dir(&mut self, path: &str) -> Result<(), TransferError> {
        self.sftp
            .mkdir(Path::new(path), 0o755)
            .map_err(|e| transfer_error("mkdir", path, e))
    }

    fn close(&mut self) -> Result<(), TransferError> {
        self.session
            .disconnect(None, "closing", None)
            .map_err(|e| TransferError::Failed(format!("disconnect failed: {e}")))
    }
}
