use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn setup_file(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(&path, contents).expect("write file");
}

fn prose_md(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("prose-md").expect("binary");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn fmt_check_reports_without_writing() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "notes/a.md", "# Title\nbody\n");
    setup_file(temp.path(), "notes/b.md", "# Clean\n\ntext\n");

    prose_md(temp.path())
        .args(["fmt", "--check", "notes"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("would reformat").and(predicate::str::contains("a.md")))
        .stdout(predicate::str::contains("b.md").not());

    let untouched = fs::read_to_string(temp.path().join("notes/a.md")).expect("read");
    assert_eq!(untouched, "# Title\nbody\n");
}

#[test]
fn fmt_rewrites_files_and_keeps_backups() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "a.md", "# Title\nbody\n");

    prose_md(temp.path())
        .args(["fmt", "a.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("formatted a.md"));

    let formatted = fs::read_to_string(temp.path().join("a.md")).expect("read");
    assert_eq!(formatted, "# Title\n\nbody\n");
    let backup = fs::read_to_string(temp.path().join("a.md.bak")).expect("backup");
    assert_eq!(backup, "# Title\nbody\n");

    prose_md(temp.path()).args(["fmt", "--check", "a.md"]).assert().success();
}

#[test]
fn fmt_diff_prints_unified_diff() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "a.md", "# Title\nbody\n");

    prose_md(temp.path())
        .args(["fmt", "--diff", "--no-backup", "a.md"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("--- a/a.md").and(predicate::str::contains("+++ b/a.md")));

    assert!(!temp.path().join("a.md.bak").exists());
}

#[test]
fn toc_prints_numbered_headings() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "doc.md", "# Title\n\none two three\n\n## Sub\n\nfour five\n");

    prose_md(temp.path())
        .args(["toc", "doc.md"])
        .assert()
        .success()
        .stdout("1: Title\n1.1: Sub\n");

    prose_md(temp.path())
        .args(["toc", "doc.md", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"sub\"").and(predicate::str::contains("\"level\": 2")));
}

#[test]
fn count_reports_document_and_sections() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "doc.md", "# Title\n\none two three\n\n## Sub\n\nfour five\n");

    prose_md(temp.path())
        .args(["count", "doc.md"])
        .assert()
        .success()
        .stdout("7 words\n# Title: 7\n## Sub: 3\n");
}

#[test]
fn todo_lists_and_toggles_items() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(
        temp.path(),
        "tasks.md",
        "- [ ] buy milk\n- [x] {01/02/24-01/05/24} ship\n",
    );

    prose_md(temp.path())
        .args(["todo", "tasks.md"])
        .assert()
        .success()
        .stdout("1. [ ] buy milk\n2. [x] ship (01/02/24 - 01/05/24)\n");

    prose_md(temp.path())
        .args(["todo", "tasks.md", "--toggle", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("1. [x] buy milk ("));

    let saved = fs::read_to_string(temp.path().join("tasks.md")).expect("read");
    assert!(saved.starts_with("- [x] {"));
    assert!(saved.ends_with("- [x] {01/02/24-01/05/24} ship\n"));

    prose_md(temp.path())
        .args(["todo", "tasks.md", "--toggle", "5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no todo #5"));
}

#[test]
fn fold_prints_blocks_mentioning_the_tag() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "notes.md", "plan #work\n\nother\n\nmore work\n\nmisc\n");

    prose_md(temp.path())
        .args(["fold", "notes.md", "--tag", "#work"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("plan #work")
                .and(predicate::str::contains("more work"))
                .and(predicate::str::contains("other").not())
                .and(predicate::str::contains("misc").not()),
        );

    prose_md(temp.path())
        .args(["fold", "notes.md", "--tag", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no #nope anchor"));
}

#[test]
fn invalid_configuration_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    setup_file(temp.path(), "doc.md", "# Title\n");
    setup_file(temp.path(), ".prose-md.toml", "[plugins]\nenabled = [\"spellcheck\"]\n");

    prose_md(temp.path())
        .args(["toc", "doc.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("spellcheck"));
}
