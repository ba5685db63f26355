//! Property-based tests for batch generation over random dependency graphs

use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;
use std::sync::Arc;
use upfile::formatter::{temp_output, DerivedFormatter, FormatInput, FormatScope, Formatter, Produced};
use upfile::storage::Storage;
use upfile::{Context, ContextError, DataToken, FileSource, MemoryStorage};

/// Appends `-{name}` to its input
#[derive(Debug)]
struct Marker(String);

impl Formatter for Marker {
    fn format(
        &self,
        input: FormatInput<'_>,
        _scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        let mut bytes = std::fs::read(input.path)?;
        bytes.extend_from_slice(format!("-{}", self.0).as_bytes());
        let out = temp_output(None)?;
        std::fs::write(&out, bytes)?;
        Ok(Produced::temporary(out))
    }
}

fn format_name(i: usize) -> String {
    format!("f{}", i)
}

/// Format `i` derives from `deps[i]`, always an earlier format, so the graph is acyclic.
fn dependencies(picks: &[Option<Index>]) -> Vec<Option<usize>> {
    picks
        .iter()
        .enumerate()
        .map(|(i, pick)| match pick {
            Some(index) if i > 0 => Some(index.index(i)),
            _ => None,
        })
        .collect()
}

/// Expected stored content of format `i`: the source plus every marker on its chain.
fn expected(deps: &[Option<usize>], i: usize) -> Vec<u8> {
    let mut bytes = match deps[i] {
        Some(dep) => expected(deps, dep),
        None => b"src".to_vec(),
    };
    bytes.extend_from_slice(format!("-{}", format_name(i)).as_bytes());
    bytes
}

fn build(deps: &[Option<usize>], storage: Arc<MemoryStorage>) -> Context {
    let mut builder = Context::builder("prop").storage(storage);
    for (i, dep) in deps.iter().enumerate() {
        let marker = Marker(format_name(i));
        builder = match dep {
            Some(dep) => builder.formatter(
                format_name(i),
                DerivedFormatter::new(format_name(*dep), Box::new(marker)).unwrap(),
            ),
            None => builder.formatter(format_name(i), marker),
        };
    }
    builder.build().unwrap()
}

fn save_source(storage: &MemoryStorage) -> DataToken {
    storage
        .save_file(
            FileSource::Content {
                bytes: b"src",
                extension: None,
            },
            None,
        )
        .unwrap()
}

/// Every requested format ends up stored with the content of its full chain,
/// along with its direct dependency, and the source token never changes.
#[test]
fn test_batch_generation_respects_dependencies() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(proptest::option::of(any::<Index>()), 1..7),
                prop::collection::vec(any::<bool>(), 7),
            ),
            |(picks, wanted)| {
                let deps = dependencies(&picks);
                let storage = Arc::new(MemoryStorage::new());
                let context = build(&deps, storage.clone());
                let data = save_source(&storage);

                let names: Vec<String> = (0..deps.len()).map(format_name).collect();
                let requested: Vec<&str> = names
                    .iter()
                    .zip(&wanted)
                    .filter(|(_, wanted)| **wanted)
                    .map(|(name, _)| name.as_str())
                    .collect();

                let report = context
                    .generate_formats(&data, Some(&requested), false)
                    .unwrap();
                prop_assert_eq!(&report.data, &data);

                let unique: HashSet<&String> = report.generated.iter().collect();
                prop_assert_eq!(unique.len(), report.generated.len());

                for name in &requested {
                    let i: usize = name[1..].parse().unwrap();
                    prop_assert_eq!(storage.bytes(&data, Some(*name)), Some(expected(&deps, i)));
                    if let Some(dep) = deps[i] {
                        prop_assert!(storage.file_exists(&data, Some(&format_name(dep))));
                    }
                }
                for effect in &report.side_effects {
                    prop_assert!(!requested.contains(&effect.as_str()));
                }

                // nothing left to do on a second pass
                let again = context
                    .generate_formats(&data, Some(&requested), false)
                    .unwrap();
                prop_assert!(again.generated.is_empty());
                prop_assert_eq!(again.reused.len(), requested.len());

                Ok(())
            },
        )
        .unwrap();
}

/// A derived format never exists without its source.
#[test]
fn test_formats_never_outlive_source() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(proptest::option::of(any::<Index>()), 1..5),
            |picks| {
                let deps = dependencies(&picks);
                let storage = Arc::new(MemoryStorage::new());
                let context = build(&deps, storage.clone());
                let data = save_source(&storage);

                context.generate_formats(&data, None, false).unwrap();
                prop_assert!(context.delete(&data, None));
                for i in 0..deps.len() {
                    prop_assert!(!storage.file_exists(&data, Some(&format_name(i))));
                }
                prop_assert!(storage.format_list(&data).is_empty());
                Ok(())
            },
        )
        .unwrap();
}
