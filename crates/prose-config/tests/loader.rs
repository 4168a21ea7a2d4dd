use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use prose_config::{Config, ConfigError, ConfigSourceKind, LoadOptions, PluginName};
use tempfile::TempDir;

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let mut file = fs::File::create(path).expect("create config");
    file.write_all(contents.as_bytes()).expect("write config");
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).expect("canonicalize path")
}

fn validation_output(working_dir: &Path) -> String {
    match Config::load(LoadOptions::default().with_working_dir(working_dir)) {
        Err(ConfigError::Validation(errors)) => errors.to_string(),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected validation failure"),
    }
}

#[test]
fn loads_defaults_when_no_files_present() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let config = Config::load(LoadOptions::default().with_working_dir(working_dir.clone()))
        .expect("load defaults");

    assert_eq!(config.editor.autosave_debounce_ms, 2000);
    assert_eq!(config.editor.max_heading_level, 6);
    assert_eq!(config.plugins.enabled, PluginName::ALL.to_vec());
    assert_eq!(config.word_count.throttle_ms, 1000);
    assert!(config.word_count.show);
    assert_eq!(config.todo.date_format, "%m/%d/%y");
    assert!(!config.todo.hide_completed);
    assert!(config.variables.values.is_empty());

    assert_eq!(config.sources.working_directory, working_dir);
    assert_eq!(config.sources.layers.len(), 1);
    assert_eq!(config.sources.layers[0].kind, ConfigSourceKind::Default);
}

#[test]
fn applies_precedence_and_merges_fields() {
    let temp = TempDir::new().expect("tempdir");
    let git_root = canonical(temp.path());
    fs::create_dir(git_root.join(".git")).expect("create .git");

    write_file(
        git_root.join(".prose-md.toml"),
        r#"
        [editor]
        autosave_debounce_ms = 500
        max_heading_level = 4

        [plugins]
        enabled = ["todo", "word-count"]

        [variables.values]
        author = "root"
        project = "prose"
        "#,
    );

    let nested = git_root.join("notes");
    fs::create_dir(&nested).expect("create nested");
    write_file(
        nested.join(".prose-md.toml"),
        r#"
        [editor]
        max_heading_level = 3

        [todo]
        hide_completed = true

        [variables.values]
        author = "local"
        "#,
    );

    let override_path = git_root.join("override.toml");
    write_file(
        &override_path,
        r#"
        [word_count]
        show = false
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(&nested)
            .with_override_path(&override_path),
    )
    .expect("load layered config");

    assert_eq!(config.editor.autosave_debounce_ms, 500);
    assert_eq!(config.editor.max_heading_level, 3);
    assert_eq!(config.plugins.enabled, vec![PluginName::Todo, PluginName::WordCount]);
    assert!(config.plugins.is_enabled(PluginName::Todo));
    assert!(!config.plugins.is_enabled(PluginName::FoldingTags));
    assert!(config.todo.hide_completed);
    assert!(!config.word_count.show);
    assert_eq!(config.variables.get("author"), Some("local"));
    assert_eq!(config.variables.get("project"), Some("prose"));

    let kinds: Vec<_> = config.sources.layers.iter().map(|layer| layer.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConfigSourceKind::Default,
            ConfigSourceKind::GitRoot,
            ConfigSourceKind::Local,
            ConfigSourceKind::Override,
        ]
    );
}

#[test]
fn missing_override_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    let err = Config::load(
        LoadOptions::default()
            .with_working_dir(&working_dir)
            .with_override_path("absent.toml"),
    )
    .expect_err("override must exist");
    assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(working_dir.join(".prose-md.toml"), "[editor\nmax_heading_level = 2");
    let err = Config::load(LoadOptions::default().with_working_dir(&working_dir))
        .expect_err("parse failure");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn validation_errors_are_collected_as_a_list() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(".prose-md.toml"),
        r#"
        [editor]
        max_heading_level = 9

        [plugins]
        enabled = ["todo", "spellcheck"]

        [todo]
        date_format = "%Q"

        [variables.values]
        "bad name" = "x"
        date = "shadowed"
        "#,
    );

    let output = validation_output(&working_dir);
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 5, "unexpected error output: {output}");
    assert!(lines.iter().all(|line| line.starts_with("- ")));
    assert!(output.contains("editor.max_heading_level: must be between 1 and 6 (received 9)"));
    assert!(output.contains("plugins.enabled: unknown plugin 'spellcheck'"));
    assert!(output.contains("todo.date_format: invalid strftime format '%Q'"));
    assert!(output.contains("invalid variable name 'bad name'"));
    assert!(output.contains("variable 'date' shadows a built-in variable"));
    assert!(output.contains("local config at"));
}
