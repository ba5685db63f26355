//! Configuration loading through to built contexts

use crate::integration::test_utils::{with_xdg_env, write_workspace_config};
use std::path::Path;
use tempfile::TempDir;
use upfile::formatter::{temp_output, Produced};
use upfile::storage::Storage;
use upfile::types::UrlScheme;
use upfile::{ConfigLoader, ContextError, ContextManager, FileSource, FormatterRegistry};

const CONFIG: &str = r#"
[defaults]
storage = { kind = "local", root = "files/{context}", public_url = "/files/{context}" }

[defaults.formatters.original]
kind = "copy"

[contexts.avatar]
kind = "image"
storage = { host_info = "https://cdn.example.com" }

[contexts.avatar.formatters.upper]
kind = "inline"
function = "uppercase"

[contexts.avatar.formatters.upper_copy]
kind = "from"
from = "upper"
formatter = { kind = "copy", extension = "txt" }

[contexts.docs]
kind = "pdf"
storage = { kind = "memory" }
"#;

fn uppercase(input: &Path) -> Result<Produced, ContextError> {
    let bytes = std::fs::read(input)?.to_ascii_uppercase();
    let out = temp_output(Some("txt"))?;
    std::fs::write(&out, bytes)?;
    Ok(Produced::temporary(out))
}

#[test]
fn test_workspace_config_builds_working_contexts() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("ws");
    write_workspace_config(&workspace, CONFIG);

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(&workspace).unwrap());
    assert!(config.validate().is_ok());

    let registry = FormatterRegistry::default();
    registry
        .register_function("uppercase", |input, _| uppercase(input))
        .unwrap();
    let manager = ContextManager::from_config(&config, &registry, &workspace).unwrap();
    assert_eq!(manager.names(), vec!["avatar", "docs"]);

    let avatar = manager.get("avatar").unwrap();
    assert_eq!(
        avatar.formatter_names(),
        &["original", "upper", "upper_copy"]
    );

    let data = avatar
        .save_file(
            FileSource::Content {
                bytes: b"hello",
                extension: Some("txt"),
            },
            Some("hello.txt"),
        )
        .unwrap();
    let report = avatar
        .generate_formats(&data, Some(&["upper_copy"]), false)
        .unwrap();
    assert_eq!(report.generated, vec!["upper", "upper_copy"]);

    let read = avatar.storage().read_path(&data, Some("upper_copy")).unwrap();
    assert_eq!(std::fs::read(read.path).unwrap(), b"HELLO");
    assert!(workspace.join("files").join("avatar").is_dir());

    let url = avatar
        .url(&data, Some("upper"), &UrlScheme::Absolute)
        .unwrap();
    assert!(url.starts_with("https://cdn.example.com/files/avatar/"), "{url}");

    let docs = manager.get("docs").unwrap();
    assert!(!docs.storage().accepts_paths());
    assert_eq!(docs.formatter_names(), &["original"]);
    assert_eq!(docs.validators()[0].kind, "file");
}

#[test]
fn test_environment_file_layers_over_workspace_config() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("ws");
    write_workspace_config(&workspace, CONFIG);
    std::fs::write(
        workspace.join("config").join("production.toml"),
        "[contexts.avatar]\nstorage = { public_url = \"/static/avatar\" }\n",
    )
    .unwrap();

    let config = with_xdg_env(&test_dir, || {
        std::env::set_var("UPFILE_ENV", "production");
        ConfigLoader::load(&workspace).unwrap()
    });
    let avatar = config.context_config("avatar").unwrap();
    let storage = avatar.storage.unwrap();
    assert_eq!(storage["public_url"], "/static/avatar");
    assert_eq!(storage["root"], "files/avatar");
}

#[test]
fn test_missing_inline_function_fails_at_call_time() {
    let test_dir = TempDir::new().unwrap();
    let config = ConfigLoader::from_toml_str(CONFIG).unwrap();
    let manager =
        ContextManager::from_config(&config, &FormatterRegistry::default(), test_dir.path())
            .unwrap();
    let avatar = manager.get("avatar").unwrap();
    let data = avatar
        .save_file(
            FileSource::Content {
                bytes: b"hello",
                extension: Some("txt"),
            },
            None,
        )
        .unwrap();

    let err = avatar.generate_format(&data, "upper", false).unwrap_err();
    assert!(err.is_configuration(), "{err}");
    assert!(!avatar.storage().file_exists(&data, Some("upper")));
}

#[test]
fn test_invalid_configuration_reports_every_problem() {
    let config = ConfigLoader::from_toml_str(
        r#"
[contexts.avatar.formatters.thumb]
kind = "resize"

[contexts.avatar.formatters.preview]
kind = "from"
from = "missing"
formatter = "copy"
"#,
    )
    .unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
}
