//! WebDAV client over blocking `reqwest`.
//!
//! Remote paths are relative to the configured root path on the server.
//! `PROPFIND` responses are parsed with `quick-xml`.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::backends::tls::client_config;
use crate::client::{RemoteClient, RemoteFileInfo};
use crate::config::{ConnectParams, SecureMode};
use crate::errors::{FsError, FsResult, TransferError};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// Open a WebDAV client for `params` and check that the root is reachable.
pub fn connect(params: &ConnectParams) -> FsResult<Box<dyn RemoteClient>> {
    crate::backends::report_unknown_raw_settings(params, &["UserAgent"]);
    let secure = params.secure() != SecureMode::None;
    let scheme = if secure { "https" } else { "http" };
    let base = Url::parse(&format!(
        "{scheme}://{}:{}/",
        params.host(),
        params.effective_port()
    ))
    .map_err(|e| FsError::Config(format!("invalid WebDAV address: {e}")))?;

    let mut builder = Client::builder();
    if secure {
        builder = builder.use_preconfigured_tls((*client_config(params)?).clone());
    }
    if let Some(timeout) = params.timeout() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(agent) = params.raw_setting("UserAgent") {
        builder = builder.user_agent(agent.to_string());
    }
    let http = builder
        .build()
        .map_err(|e| FsError::Config(format!("cannot build HTTP client: {e}")))?;

    let mut client = WebDavClient {
        http,
        base,
        root: params
            .root_path()
            .map(|r| r.trim_end_matches('/').to_string())
            .unwrap_or_default(),
        username: params.username().to_string(),
        password: params.password().map(str::to_string),
    };
    client.stat("/")?;
    info!(host = params.host(), secure, "WebDAV session established");
    Ok(Box::new(client))
}

pub struct WebDavClient {
    http: Client,
    base: Url,
    root: String,
    username: String,
    password: Option<String>,
}

fn failed(op: &str, path: &str, e: impl std::fmt::Display) -> TransferError {
    TransferError::Failed(format!("{op} {path} failed: {e}"))
}

fn status_error(op: &str, path: &str, status: StatusCode) -> TransferError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::CONFLICT => TransferError::NotFound(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransferError::PermissionDenied(path.to_string())
        }
        other => failed(op, path, other),
    }
}

impl WebDavClient {
    fn server_path(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(&self.server_path(path));
        url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, self.password.as_deref())
    }

    fn send(&self, op: &str, path: &str, request: RequestBuilder) -> Result<Response, TransferError> {
        let response = request.send().map_err(|e| failed(op, path, e))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(op, path, status))
        }
    }

    fn propfind(&self, path: &str, depth: &str) -> Result<Vec<RemoteFileInfo>, TransferError> {
        let method = Method::from_bytes(b"PROPFIND").map_err(|e| failed("PROPFIND", path, e))?;
        let request = self
            .request(method, path)
            .header("Depth", depth)
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY);
        let body = self
            .send("PROPFIND", path, request)?
            .text()
            .map_err(|e| failed("PROPFIND", path, e))?;
        let entries = parse_multistatus(&body).map_err(|e| failed("PROPFIND", path, e))?;
        Ok(entries
            .into_iter()
            .map(|entry| self.entry_info(path, entry))
            .collect())
    }

    /// Convert an href to a path below the root and flag the listed
    /// directory itself.
    fn entry_info(&self, requested: &str, entry: DavEntry) -> RemoteFileInfo {
        let href = match Url::parse(&entry.href) {
            Ok(url) => url.path().to_string(),
            Err(_) => entry.href.clone(),
        };
        let decoded = percent_decode_str(&href).decode_utf8_lossy().into_owned();
        let relative = decoded
            .strip_prefix(&self.root)
            .unwrap_or(&decoded)
            .trim_end_matches('/');
        let path = if relative.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", relative.trim_start_matches('/'))
        };

        let requested = format!("/{}", requested.trim_matches('/'));
        let mut info = RemoteFileInfo::new(path.clone(), entry.is_collection);
        info.is_this_directory = entry.is_collection && path == requested;
        info.length = entry.content_length.unwrap_or(0);
        info.last_write_time = entry.last_modified;
        info
    }
}

#[derive(Debug, Default)]
struct DavEntry {
    href: String,
    is_collection: bool,
    content_length: Option<u64>,
    last_modified: Option<DateTime<Utc>>,
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().rposition(|b| *b == b':') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    }
}

/// Parse a `207 Multi-Status` body.
fn parse_multistatus(xml: &str) -> Result<Vec<DavEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<DavEntry> = None;
    let mut text_tag: Option<Vec<u8>> = None;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.name().into_inner()).to_vec();
                match name.as_slice() {
                    b"response" => current = Some(DavEntry::default()),
                    b"resourcetype" => in_resourcetype = true,
                    b"collection" if in_resourcetype => {
                        if let Some(entry) = current.as_mut() {
                            entry.is_collection = true;
                        }
                    }
                    b"href" | b"getcontentlength" | b"getlastmodified" => text_tag = Some(name),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if in_resourcetype && local_name(e.name().into_inner()) == b"collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(tag), Some(entry)) = (text_tag.as_deref(), current.as_mut()) {
                    let text = t.unescape()?.into_owned();
                    match tag {
                        b"href" => entry.href = text,
                        b"getcontentlength" => entry.content_length = text.trim().parse().ok(),
                        b"getlastmodified" => {
                            entry.last_modified = DateTime::parse_from_rfc2822(text.trim())
                                .ok()
                                .map(|d| d.with_timezone(&Utc));
                        }
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                let name = local_name(e.name().into_inner());
                if name == b"response" {
                    entries.extend(current.take());
                } else if name == b"resourcetype" {
                    in_resourcetype = false;
                }
                text_tag = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

impl RemoteClient for WebDavClient {
    fn stat(&mut self, path: &str) -> Result<RemoteFileInfo, TransferError> {
        let mut info = self
            .propfind(path, "0")?
            .into_iter()
            .next()
            .ok_or_else(|| TransferError::NotFound(path.to_string()))?;
        info.is_this_directory = false;
        Ok(info)
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>, TransferError> {
        self.propfind(path, "1")
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let request = self.request(Method::GET, remote);
        let mut response = self.send("GET", remote, request)?;
        let mut out = File::create(local)?;
        let bytes = response
            .copy_to(&mut out)
            .map_err(|e| failed("GET", remote, e))?;
        debug!(remote, bytes, "download complete");
        Ok(bytes)
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let src = File::open(local)?;
        let bytes = src.metadata()?.len();
        let request = self.request(Method::PUT, remote).body(src);
        self.send("PUT", remote, request)?;
        debug!(remote, bytes, "upload complete");
        Ok(bytes)
    }

    fn remove(&mut self, path: &str) -> Result<(), TransferError> {
        let request = self.request(Method::DELETE, path);
        self.send("DELETE", path, request)?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError> {
        let method = Method::from_bytes(b"MOVE").map_err(|e| failed("MOVE", from, e))?;
        let request = self
            .request(method, from)
            .header("Destination", self.url(to).as_str())
            .header("Overwrite", "T");
        self.send("MOVE", from, request)?;
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<(), TransferError> {
        let method = Method::from_bytes(b"MKCOL").map_err(|e| failed("MKCOL", path, e))?;
        let request = self.request(method, path);
        self.send("MKCOL", path, request)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        Ok(())
    }
}
