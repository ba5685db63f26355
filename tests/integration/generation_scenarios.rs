//! Format generation against the local filesystem backend

use crate::integration::test_utils::{assert_cleaned_up, Recorder};
use std::sync::Arc;
use tempfile::TempDir;
use upfile::formatter::DerivedFormatter;
use upfile::storage::{LocalStorageConfig, Storage};
use upfile::{Context, DataToken, FileSource, LocalStorage};

fn local_storage(temp: &TempDir) -> Arc<LocalStorage> {
    Arc::new(LocalStorage::new(LocalStorageConfig::with_root(temp.path().join("uploads"))).unwrap())
}

fn save(storage: &LocalStorage, bytes: &[u8]) -> DataToken {
    storage
        .save_file(
            FileSource::Content {
                bytes,
                extension: Some("png"),
            },
            Some("a.png"),
        )
        .unwrap()
}

fn stored(storage: &LocalStorage, data: &DataToken, format: &str) -> Vec<u8> {
    let read = storage.read_path(data, Some(format)).unwrap();
    assert!(!read.temporary);
    std::fs::read(read.path).unwrap()
}

#[test]
fn test_simple_thumbnail_is_generated_once() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let small = Recorder::new("-small");
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("small", small.clone())
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    assert_eq!(context.generate_format(&data, "small", false).unwrap(), data);
    assert_eq!(stored(&storage, &data, "small"), b"png-small");

    assert_eq!(context.generate_format(&data, "small", false).unwrap(), data);
    assert_eq!(small.calls(), 1);

    context.generate_format(&data, "small", true).unwrap();
    assert_eq!(small.calls(), 2);
    assert_cleaned_up(&[&small]);
}

#[test]
fn test_shared_dependency_runs_once_in_batch() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let gray = Recorder::new("-gray");
    let small = Recorder::new("-small");
    let large = Recorder::new("-large");
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("gray", gray.clone())
        .formatter(
            "gray_small",
            DerivedFormatter::new("gray", Box::new(small.clone())).unwrap(),
        )
        .formatter(
            "gray_large",
            DerivedFormatter::new("gray", Box::new(large.clone())).unwrap(),
        )
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    let report = context.generate_formats(&data, None, false).unwrap();

    assert_eq!(report.data, data);
    assert_eq!(report.generated.len(), 3);
    assert!(report.side_effects.is_empty());
    assert_eq!(gray.calls(), 1);
    assert_eq!(small.inputs(), vec![b"png-gray".to_vec()]);
    assert_eq!(large.inputs(), vec![b"png-gray".to_vec()]);
    assert_eq!(stored(&storage, &data, "gray_small"), b"png-gray-small");
    assert_eq!(stored(&storage, &data, "gray_large"), b"png-gray-large");
    assert_eq!(
        storage.format_list(&data),
        vec!["gray", "gray_large", "gray_small"]
    );
    assert_cleaned_up(&[&gray, &small, &large]);
}

#[test]
fn test_requested_dependent_materializes_its_dependency() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let gray = Recorder::new("-gray");
    let resize = Recorder::new("-small");
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("gray", gray.clone())
        .formatter(
            "gray_small",
            DerivedFormatter::new("gray", Box::new(resize.clone())).unwrap(),
        )
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    let report = context
        .generate_formats(&data, Some(&["gray_small"]), false)
        .unwrap();

    assert_eq!(report.side_effects, vec!["gray"]);
    assert!(storage.file_exists(&data, Some("gray")));
    assert!(storage.file_exists(&data, Some("gray_small")));
    assert_cleaned_up(&[&gray, &resize]);
}

#[test]
fn test_single_derived_format_reuses_stored_dependency() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let gray = Recorder::new("-gray");
    let resize = Recorder::new("-small");
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("gray", gray.clone())
        .formatter(
            "gray_small",
            DerivedFormatter::new("gray", Box::new(resize.clone())).unwrap(),
        )
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    context.generate_format(&data, "gray", false).unwrap();
    context.generate_format(&data, "gray_small", false).unwrap();

    assert_eq!(gray.calls(), 1);
    assert_eq!(resize.inputs(), vec![b"png-gray".to_vec()]);

    // the live stored dependency must survive generation
    assert_eq!(stored(&storage, &data, "gray"), b"png-gray");
}

#[test]
fn test_cycle_leaves_storage_untouched() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let p = Recorder::new("-p");
    let q = Recorder::new("-q");
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("p", DerivedFormatter::new("q", Box::new(p.clone())).unwrap())
        .formatter("q", DerivedFormatter::new("p", Box::new(q.clone())).unwrap())
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    let err = context
        .generate_formats(&data, Some(&["p", "q"]), false)
        .unwrap_err();
    assert!(err.is_configuration(), "{err}");

    let err = context.generate_format(&data, "p", false).unwrap_err();
    assert!(err.is_configuration(), "{err}");

    assert!(!storage.file_exists(&data, Some("p")));
    assert!(!storage.file_exists(&data, Some("q")));
    assert!(storage.format_list(&data).is_empty());
    assert_eq!(p.calls() + q.calls(), 0);
}

#[test]
fn test_deleting_source_removes_generated_formats() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let context = Context::builder("avatar")
        .storage(storage.clone())
        .formatter("small", Recorder::new("-small"))
        .build()
        .unwrap();

    let data = save(&storage, b"png");
    context.generate_formats(&data, None, false).unwrap();
    assert!(context.delete(&data, None));
    assert!(!storage.file_exists(&data, Some("small")));
    assert!(!storage.file_exists(&data, None));
    assert!(context.generate_format(&data, "small", false).unwrap_err().is_not_found());
}

#[test]
fn test_serialized_generation_from_many_threads() {
    let temp = TempDir::new().unwrap();
    let storage = local_storage(&temp);
    let small = Recorder::new("-small");
    let context = Arc::new(
        Context::builder("avatar")
            .storage(storage.clone())
            .formatter("small", small.clone())
            .build()
            .unwrap(),
    );
    let data = save(&storage, b"png");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let context = Arc::clone(&context);
            let data = data.clone();
            std::thread::spawn(move || context.generate_format_serialized(&data, "small", false))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), data);
    }

    assert_eq!(small.calls(), 1);
    assert_eq!(context.locks().active(), 0);
}
