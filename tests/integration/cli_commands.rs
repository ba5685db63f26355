//! CLI route table end to end

use crate::integration::test_utils::{with_xdg_env, write_workspace_config};
use clap::Parser;
use tempfile::TempDir;
use upfile::cli::{Cli, RunContext};

const CONFIG: &str = r#"
[contexts.avatar]
kind = "image"
storage = { naming = "content_hash" }

[contexts.avatar.formatters.original]
kind = "copy"

[contexts.avatar.formatters.copy_of_original]
kind = "from"
from = "original"
formatter = "copy"
"#;

fn run(ctx: &RunContext, args: &[&str]) -> Result<String, upfile::ContextError> {
    let mut argv = vec!["upfile"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command)
}

fn run_context(test_dir: &TempDir) -> RunContext {
    let workspace = test_dir.path().join("ws");
    write_workspace_config(&workspace, CONFIG);
    with_xdg_env(test_dir, || RunContext::new(workspace.clone(), None).unwrap())
}

#[test]
fn test_save_generate_and_inspect() {
    let test_dir = TempDir::new().unwrap();
    let ctx = run_context(&test_dir);

    let upload = test_dir.path().join("photo.png");
    std::fs::write(&upload, b"not really a png").unwrap();

    let data = run(&ctx, &["save", "avatar", upload.to_str().unwrap()]).unwrap();
    assert!(data.ends_with(".png"), "{data}");

    // identical bytes map to the same token under content hashing
    let again = run(&ctx, &["save", "avatar", upload.to_str().unwrap()]).unwrap();
    assert_eq!(again, data);

    let report = run(
        &ctx,
        &["generate", "avatar", &data, "--format", "copy_of_original", "--json"],
    )
    .unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["side_effects"], serde_json::json!(["original"]));

    let formats = run(&ctx, &["formats", "avatar", &data]).unwrap();
    assert_eq!(formats, "copy_of_original\noriginal");

    let url = run(&ctx, &["url", "avatar", &data, "--format", "original"]).unwrap();
    assert_eq!(url, format!("/uploads/avatar/{}", data.replacen('/', "/original/", 1)));

    let second = run(&ctx, &["generate", "avatar", &data]).unwrap();
    assert!(second.contains("generated: -"), "{second}");

    assert_eq!(
        run(&ctx, &["delete", "avatar", &data, "--format", "original"]).unwrap(),
        "Deleted"
    );
    assert_eq!(run(&ctx, &["delete", "avatar", &data]).unwrap(), "Deleted");
    assert_eq!(run(&ctx, &["delete", "avatar", &data]).unwrap(), "Nothing to delete");
}

#[test]
fn test_listing_commands() {
    let test_dir = TempDir::new().unwrap();
    let ctx = run_context(&test_dir);

    let contexts = run(&ctx, &["contexts"]).unwrap();
    assert!(contexts.contains("avatar"));
    assert!(contexts.contains("copy_of_original"));

    let validators = run(&ctx, &["validators", "avatar", "--json"]).unwrap();
    let validators: serde_json::Value = serde_json::from_str(&validators).unwrap();
    assert_eq!(validators[0]["kind"], "image");
}

#[test]
fn test_errors_name_the_problem() {
    let test_dir = TempDir::new().unwrap();
    let ctx = run_context(&test_dir);

    let err = run(&ctx, &["validators", "missing"]).unwrap_err();
    assert!(err.to_string().contains("missing"));

    let err = run(&ctx, &["generate", "avatar", "ab/none.png", "--format", "nope"]).unwrap_err();
    assert!(err.is_configuration());

    let err = run(&ctx, &["url", "avatar", "ab/none.png", "--scheme", "not a scheme"]).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_workspace_config_is_rejected() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("ws");
    write_workspace_config(&workspace, "[contexts.avatar.formatters.thumb]\nkind = \"resize\"\n");
    let result = with_xdg_env(&test_dir, || RunContext::new(workspace.clone(), None));
    let err = result.err().unwrap();
    assert!(err.to_string().contains("resize"));
}
