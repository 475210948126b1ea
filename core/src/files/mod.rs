//! Async file browsing over a remote session.

mod browser;

pub use browser::{FileBrowser, RemoteBrowser};

use serde::{Deserialize, Serialize};

use crate::client::RemoteFileInfo;

/// A file or directory entry as shown to a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// ISO 8601 timestamp, empty when unknown.
    pub modified: String,
    /// Unix "rwxrwxrwx" format, `None` when not available.
    pub permissions: Option<String>,
}

impl From<&RemoteFileInfo> for FileEntry {
    fn from(info: &RemoteFileInfo) -> Self {
        Self {
            name: info.name.clone(),
            path: info.full_name.clone(),
            is_directory: info.is_directory,
            size: info.length,
            modified: info
                .last_write_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            permissions: info.permissions.map(format_permissions),
        }
    }
}

/// Render the low nine mode bits as `rwxr-xr-x`.
pub fn format_permissions(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn permissions_string() {
        assert_eq!(format_permissions(0o755), "rwxr-xr-x");
        assert_eq!(format_permissions(0o100644), "rw-r--r--");
        assert_eq!(format_permissions(0), "---------");
    }

    #[test]
    fn entry_from_remote_info() {
        let mut info = RemoteFileInfo::new("/srv/a.txt", false);
        info.length = 3;
        info.permissions = Some(0o640);
        info.last_write_time = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

        let entry = FileEntry::from(&info);
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.path, "/srv/a.txt");
        assert_eq!(entry.size, 3);
        assert_eq!(entry.modified, "2024-01-02T03:04:05+00:00");
        assert_eq!(entry.permissions.as_deref(), Some("rw-r-----"));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isDirectory"], false);
    }
}
