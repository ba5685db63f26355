//! Property-based tests for name validation and original-name sanitizing

use proptest::prelude::*;
use upfile::storage::naming;
use upfile::types::is_valid_name;

/// Sanitized original names are always storable and never carry a blacklisted extension.
#[test]
fn test_sanitized_names_are_safe() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<String>(), |name| {
            if let Some(clean) = naming::sanitize_original_name(&name) {
                prop_assert!(naming::is_valid_file_name(&clean), "{:?} -> {:?}", name, clean);
                if let Some((_, ext)) = clean.rsplit_once('.') {
                    prop_assert!(!naming::is_blacklisted(ext));
                }
            }
            Ok(())
        })
        .unwrap();
}

/// Names built only from the allowed alphabet are valid; anything else is not.
#[test]
fn test_name_pattern() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&"[A-Za-z0-9_-]{1,24}", |name| {
            prop_assert!(is_valid_name(&name));
            Ok(())
        })
        .unwrap();

    runner
        .run(&"[A-Za-z0-9_-]{0,8}[ ./!@]{1,3}[A-Za-z0-9_-]{0,8}", |name| {
            prop_assert!(!is_valid_name(&name));
            Ok(())
        })
        .unwrap();
}
