//! Upload value object over the local backend

use crate::integration::test_utils::Recorder;
use std::sync::Arc;
use tempfile::TempDir;
use upfile::storage::LocalStorageConfig;
use upfile::{Context, LocalStorage, UploadStatus, UploadedFile};

#[test]
fn test_upload_save_then_generate() {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(
        LocalStorage::new(LocalStorageConfig::with_root(temp.path().join("uploads"))).unwrap(),
    );
    let small = Recorder::new("-small");
    let context = Context::builder("avatar")
        .storage(storage)
        .formatter("small", small.clone())
        .build()
        .unwrap();

    let raw = temp.path().join("incoming.bin");
    std::fs::write(&raw, b"raw").unwrap();
    let mut upload = UploadedFile::uploaded(&raw, Some("avatar.jpg")).unwrap();
    assert_eq!(upload.mime_type(), Some("image/jpeg"));

    let data = upload.save(&context).unwrap();
    assert_eq!(upload.status(), UploadStatus::Initialized);
    assert!(data.as_str().ends_with(".jpg"), "{data}");
    assert!(upload.take_changed());

    // stored files are read in place
    let read = upload.read_path(&context).unwrap();
    assert!(!read.temporary);
    assert_eq!(std::fs::read(&read.path).unwrap(), b"raw");

    context.generate_formats(&data, None, false).unwrap();
    assert_eq!(small.inputs(), vec![b"raw".to_vec()]);
    assert!(read.path.exists());
}
