//! FTP and FTPS client over `suppaftp`.
//!
//! Plain FTP, explicit FTPS (`AUTH TLS` after connect) and implicit FTPS
//! (TLS from the first byte) all use the rustls stream type. Metadata comes
//! from parsing `LIST` output; a single entry is found by listing its parent.

use std::fs::File;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use suppaftp::list::{File as ListEntry, PosixPexQuery};
use suppaftp::types::FileType;
use suppaftp::{FtpError, Mode, RustlsConnector, RustlsFtpStream, Status};
use tracing::{debug, info, warn};

use crate::backends::tls::client_config;
use crate::client::{combine_paths, leaf_name, RemoteClient, RemoteFileInfo};
use crate::config::{ConnectParams, SecureMode};
use crate::errors::{FsError, FsResult, TransferError};

fn connect_failed(e: impl std::fmt::Display) -> FsError {
    FsError::Transfer(TransferError::Failed(format!("FTP connection failed: {e}")))
}

fn resolve(params: &ConnectParams) -> FsResult<SocketAddr> {
    (params.host(), params.effective_port())
        .to_socket_addrs()
        .map_err(connect_failed)?
        .next()
        .ok_or_else(|| connect_failed(format!("no address for {}", params.host())))
}

/// Open an FTP client for `params`.
pub fn connect(params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
    crate::backends::report_unknown_raw_settings(params, &["PassiveMode"]);
    let addr = resolve(params)?;
    let secure = params.secure();

    let mut stream = match secure {
        SecureMode::Implicit => {
            let tls = RustlsConnector::from(client_config(params)?);
            RustlsFtpStream::connect_secure_implicit(addr, tls, params.host())
                .map_err(connect_failed)?
        }
        SecureMode::None | SecureMode::Explicit => {
            let plain = match params.timeout() {
                Some(timeout) => RustlsFtpStream::connect_timeout(addr, timeout),
                None => RustlsFtpStream::connect(addr),
            }
            .map_err(connect_failed)?;
            if secure == SecureMode::Explicit {
                let tls = RustlsConnector::from(client_config(params)?);
                plain
                    .into_secure(tls, params.host())
                    .map_err(connect_failed)?
            } else {
                plain
            }
        }
    };

    if let Some(mode) = params.raw_setting("PassiveMode") {
        stream.set_mode(match crate::backends::raw_flag(mode) {
            Some(false) => Mode::Active,
            _ => Mode::Passive,
        });
    }

    stream
        .login(params.username(), params.password().unwrap_or(""))
        .map_err(|e| {
            FsError::Transfer(TransferError::PermissionDenied(format!("FTP login failed: {e}")))
        })?;
    stream
        .transfer_type(FileType::Binary)
        .map_err(connect_failed)?;

    info!(host = params.host(), ?secure, "FTP session established");
    Ok(Box::new(FtpClient { stream }))
}

pub struct FtpClient {
    stream: RustlsFtpStream,
}

fn transfer_error(op: &str, path: &str, e: FtpError) -> TransferError {
    match &e {
        FtpError::UnexpectedResponse(resp) => match resp.status {
            Status::FileUnavailable => TransferError::NotFound(path.to_string()),
            Status::NotLoggedIn | Status::BadFilename => {
                TransferError::PermissionDenied(path.to_string())
            }
            _ => TransferError::Failed(format!("{op} {path} failed: {e}")),
        },
        _ => TransferError::Failed(format!("{op} {path} failed: {e}")),
    }
}

/// Convert one parsed `LIST` line found under `dir`.
fn entry_info(dir: &str, entry: &ListEntry) -> RemoteFileInfo {
    let name = entry.name();
    let mut info = RemoteFileInfo::new(combine_paths(dir, name), entry.is_directory());
    info.name = name.to_string();
    info.is_this_directory = name == ".";
    info.is_parent_directory = name == "..";
    info.length = entry.size() as u64;
    info.last_write_time = Some(DateTime::<Utc>::from(entry.modified()));
    // LIST output only tells whether the owner may write.
    info.permissions = Some(if entry.can_write(PosixPexQuery::Owner) {
        0o644
    } else {
        0o444
    });
    info
}

fn parse_listing(dir: &str, lines: &[String]) -> Vec<RemoteFileInfo> {
    lines
        .iter()
        .filter_map(|line| match ListEntry::from_str(line) {
            Ok(entry) => Some(entry_info(dir, &entry)),
            Err(e) => {
                debug!(line = line.as_str(), "skipping unparsable LIST line: {e}");
                None
            }
        })
        .collect()
}

/// Both DELE and RMD failed. The DELE reply describes the failure for a
/// file, which is the common case.
fn removal_error(path: &str, dele: FtpError, rmd: FtpError) -> TransferError {
    debug!(path, "RMD failed as well: {rmd}");
    transfer_error("delete", path, dele)
}

fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => ".".to_string(),
    }
}

impl RemoteClient for FtpClient {
    fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, TransferError> {
        let name = leaf_name(path);
        if name.is_empty() {
            return Ok(RemoteFileInfo::new("/", true));
        }
        let parent = parent_dir(path);
        let lines = self
            .stream
            .list(Some(parent.as_str()))
            .map_err(|e| transfer_error("list", &parent, e))?;
        let mut info = parse_listing(&parent, &lines)
            .into_iter()
            .find(|info| info.name == name)
            .ok_or_else(|| TransferError::NotFound(path.to_string()))?;
        info.full_name = path.to_string();
        Ok(info)
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, TransferError> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| transfer_error("list", path, e))?;
        Ok(parse_listing(path, &lines))
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let mut data = self
            .stream
            .retr_as_buffer(remote)
            .map_err(|e| transfer_error("retr", remote, e))?;
        let mut out = File::create(local)?;
        Ok(io::copy(&mut data, &mut out)?)
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let mut src = File::open(local)?;
        self.stream
            .put_file(remote, &mut src)
            .map_err(|e| transfer_error("stor", remote, e))
    }

    fn remove(&mut self, path: &str) -> Result<(), TransferError> {
        match self.stream.rm(path) {
            Ok(()) => Ok(()),
            Err(dele) => {
                // DELE refuses directories; retry as RMD.
                debug!(path, "DELE failed ({dele}), trying RMD");
                self.stream
                    .rmdir(path)
                    .map_err(|rmd| removal_error(path, dele, rmd))
            }
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        self.stream
            .rename(from, to)
            .map_err(|e| transfer_error("rename", from, e))
    }

    fn create_dir(&mut self, path: &str) -> Result<(), TransferError> {
        self.stream
            .mkdir(path)
            .map_err(|e| transfer_error("mkdir", path, e))
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if let Err(e) = self.stream.quit() {
            warn!("FTP QUIT failed: {e}");
            return Err(TransferError::Failed(format!("quit failed: {e}")));
        }
        Ok(())
    }
}
