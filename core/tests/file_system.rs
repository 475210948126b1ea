//! File system adapter behavior against the in-memory backend.

mod common;

use std::io::{Read, Seek, SeekFrom, Write};

use chrono::Utc;
use common::{memory_fs, random_bytes, sample_store};
use ftpfs_core::{FileSystem, FileSystemStream, FsError, CAPABILITIES};

fn sorted(names: impl Iterator<Item = ftpfs_core::FsResult<String>>) -> Vec<String> {
    let mut names: Vec<String> = names.map(|n| n.unwrap()).collect();
    names.sort();
    names
}

#[test]
fn write_then_read_back() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();

    let data = fs.navigate(&mut session, "/data").unwrap().into_directory().unwrap();
    let file = fs.create_file(&mut session, &data, "t.txt", 0).unwrap();
    fs.write_all(&mut session, &file, b"TEST").unwrap();

    assert_eq!(fs.read_all(&mut session, &file).unwrap(), b"TEST");
    assert_eq!(store.file_contents("/data/t.txt").unwrap(), b"TEST");

    let fresh = fs.navigate(&mut session, "/data/t.txt").unwrap();
    assert_eq!(fs.item_size(fresh.item()).unwrap(), 4);
}

#[test]
fn binary_round_trip_through_stream() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let payload = random_bytes(64 * 1024);

    let file = fs.navigate(&mut session, "/data/a.txt").unwrap().into_file().unwrap();
    {
        let mut stream = fs.open_stream(&mut session, &file).unwrap();
        stream.set_len(0).unwrap();
        stream.write_all(&payload).unwrap();
        stream.commit().unwrap();
        stream.close().unwrap();
    }

    let mut stream = fs.open_stream(&mut session, &file).unwrap();
    assert_eq!(stream.len().unwrap(), payload.len() as u64);
    stream.seek(SeekFrom::End(-4)).unwrap();
    let mut tail = Vec::new();
    stream.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, payload[payload.len() - 4..]);
    stream.close().unwrap();
}

#[test]
fn lists_files_and_directories() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let data = fs.navigate(&mut session, "/data").unwrap().into_directory().unwrap();

    let files = sorted(fs.list_file_names(&mut session, &data, false).unwrap());
    assert_eq!(files, vec!["a.txt", "b.txt"]);

    let dirs = sorted(fs.list_subdirectory_names(&mut session, &data, false).unwrap());
    assert_eq!(dirs, vec!["sub"]);

    let all_files = sorted(fs.list_file_names(&mut session, &data, true).unwrap());
    assert_eq!(all_files, vec!["a.txt", "b.txt", "c.txt"]);

    let all_dirs = sorted(fs.list_subdirectory_names(&mut session, &data, true).unwrap());
    assert_eq!(all_dirs, vec!["deep", "sub"]);
}

#[test]
fn rename_keeps_content() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();

    let a = fs.navigate(&mut session, "/data/a.txt").unwrap();
    fs.rename_item(&mut session, a.item(), "c.txt").unwrap();

    assert!(!store.exists("/data/a.txt"));
    assert_eq!(store.file_contents("/data/c.txt").unwrap(), b"alpha");
    let err = fs.navigate(&mut session, "/data/a.txt").unwrap_err();
    assert!(err.is_not_found());

    let renamed = fs
        .navigate(&mut session, "/data/c.txt")
        .unwrap()
        .into_file()
        .unwrap();
    assert_eq!(renamed.handle.name, "c.txt");
    assert_eq!(fs.item_size(&renamed).unwrap(), 5);
}

#[test]
fn delete_and_create_directories() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();

    let data = fs.navigate(&mut session, "/data").unwrap().into_directory().unwrap();
    let made = fs.create_directory(&mut session, &data, "made").unwrap();
    assert_eq!(made.parent_path.as_deref(), Some("/data"));
    assert!(made.handle.is_directory);

    fs.delete_item(&mut session, &made).unwrap();
    assert!(!store.exists("/data/made"));

    let b = fs.navigate(&mut session, "/data/b.txt").unwrap();
    fs.delete_item(&mut session, b.item()).unwrap();
    assert!(!store.exists("/data/b.txt"));
}

#[test]
fn create_file_from_local_copy() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("src.bin");
    std::fs::write(&local, b"from disk").unwrap();

    let data = fs.navigate(&mut session, "/data").unwrap().into_directory().unwrap();
    let file = fs
        .create_file_from(&mut session, &data, "copy.bin", &local, true)
        .unwrap();

    assert_eq!(file.handle.length, 9);
    assert!(local.exists());
    assert_eq!(store.file_contents("/data/copy.bin").unwrap(), b"from disk");
}

#[test]
fn failed_commit_leaves_no_scratch_file_after_close() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let file = fs.navigate(&mut session, "/data/a.txt").unwrap().into_file().unwrap();

    let mut stream = fs.open_stream(&mut session, &file).unwrap();
    let scratch = stream.scratch_path().to_path_buf();
    stream.write_all(b"changed").unwrap();
    store.fail_uploads(true);
    assert!(stream.commit().is_err());
    stream.close().unwrap();

    assert!(!scratch.exists());
    assert_eq!(store.file_contents("/data/a.txt").unwrap(), b"alpha");
}

#[test]
fn unsupported_operations_report_not_supported() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let entry = fs.navigate(&mut session, "/data/a.txt").unwrap();
    let item = entry.item();
    let now = Utc::now();
    let not_supported = |r: Result<(), FsError>| matches!(r, Err(FsError::NotSupported(_)));

    assert!(matches!(fs.creation_timestamp(item), Err(FsError::NotSupported(_))));
    assert!(matches!(fs.last_access_timestamp(item), Err(FsError::NotSupported(_))));
    assert!(not_supported(fs.set_creation_timestamp(&mut session, item, now)));
    assert!(not_supported(fs.set_last_access_timestamp(&mut session, item, now)));
    assert!(not_supported(fs.set_modification_timestamp(&mut session, item, now)));
    assert!(not_supported(fs.set_read_only(&mut session, item, true)));
    assert!(matches!(fs.metadata(&mut session, item), Err(FsError::NotSupported(_))));
    assert!(not_supported(fs.set_metadata(&mut session, item, &mut &b"x"[..])));
    assert!(matches!(fs.permissions(&mut session, item), Err(FsError::NotSupported(_))));
    assert!(not_supported(fs.set_permissions(&mut session, item, &mut &b"x"[..])));
}

#[test]
fn capabilities_are_shared() {
    let store = sample_store();
    let one = memory_fs(&store);
    let two = memory_fs(&store);
    assert!(std::ptr::eq(one.capabilities(), two.capabilities()));
    assert!(std::ptr::eq(one.capabilities(), &CAPABILITIES));
    assert_eq!(CAPABILITIES.max_file_size, 2 * 1024 * 1024 * 1024);
    assert!(CAPABILITIES.supports_stream_seek);
    assert!(!CAPABILITIES.supports_creation_timestamps);
}

#[test]
fn modification_timestamp_is_reported() {
    let store = sample_store();
    let fs = memory_fs(&store);
    let mut session = fs.start_session(None).unwrap();
    let entry = fs.navigate(&mut session, "/data/a.txt").unwrap();
    assert!(fs.modification_timestamp(entry.item()).unwrap().is_some());
    assert!(!fs.read_only(entry.item()).unwrap());
}
