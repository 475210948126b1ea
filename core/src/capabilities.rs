//! Static capability descriptor shared by every remote file system instance.

use serde::Serialize;

/// Path separators understood by remote paths.
pub const PATH_SEPARATORS: &[char] = &['/'];

/// What this file system kind supports.
///
/// There is exactly one value, [`CAPABILITIES`], shared by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub supports_versioning: bool,
    pub supports_transactions: bool,
    pub max_file_path_length: usize,
    pub max_file_name_length: usize,
    pub max_directory_name_length: usize,
    /// Largest file size in bytes.
    pub max_file_size: u64,
    pub path_separators: &'static [char],
    pub is_readonly: bool,
    pub supports_security: bool,
    pub supports_custom_metadata: bool,
    pub supports_directory_renaming: bool,
    pub supports_file_renaming: bool,
    pub supports_stream_seek: bool,
    pub supports_file_modification: bool,
    pub supports_creation_timestamps: bool,
    pub supports_modification_timestamps: bool,
    pub supports_last_access_timestamps: bool,
    pub supports_readonly_directories: bool,
    pub supports_readonly_files: bool,
    pub supports_creation_user_names: bool,
    pub supports_modification_user_names: bool,
    pub supports_last_access_user_names: bool,
    pub supports_file_sizes: bool,
    pub supports_directory_sizes: bool,
    pub supports_asynchronous_api: bool,
}

pub static CAPABILITIES: Capabilities = Capabilities {
    supports_versioning: false,
    supports_transactions: false,
    max_file_path_length: 255,
    max_file_name_length: 255,
    max_directory_name_length: 255,
    max_file_size: 2 * (1 << 30),
    path_separators: PATH_SEPARATORS,
    is_readonly: false,
    supports_security: false,
    supports_custom_metadata: false,
    supports_directory_renaming: true,
    supports_file_renaming: true,
    supports_stream_seek: true,
    supports_file_modification: true,
    supports_creation_timestamps: false,
    supports_modification_timestamps: true,
    supports_last_access_timestamps: false,
    supports_readonly_directories: false,
    supports_readonly_files: false,
    supports_creation_user_names: false,
    supports_modification_user_names: false,
    supports_last_access_user_names: false,
    supports_file_sizes: true,
    supports_directory_sizes: false,
    supports_asynchronous_api: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_file_size_is_two_gibibytes() {
        assert_eq!(CAPABILITIES.max_file_size, 2_147_483_648);
    }

    #[test]
    fn timestamp_support_matches_adapter() {
        assert!(CAPABILITIES.supports_modification_timestamps);
        assert!(!CAPABILITIES.supports_creation_timestamps);
        assert!(!CAPABILITIES.supports_last_access_timestamps);
        assert!(!CAPABILITIES.supports_readonly_files);
    }

    #[test]
    fn capabilities_camel_case_keys() {
        let json = serde_json::to_value(&CAPABILITIES).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("maxFilePathLength"));
        assert!(obj.contains_key("supportsStreamSeek"));
        assert!(!obj.contains_key("supports_stream_seek"));
        assert_eq!(json["pathSeparators"], serde_json::json!(["/"]));
    }
}
