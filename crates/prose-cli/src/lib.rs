use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use prose_config::{Config, LoadOptions};
use prose_editor::{Editor, EditorOptions};
use prose_model::{Fragment, Node};
use prose_plugins::{focus_tag, toc_entries, todo_entries, word_tallies, TallyScope, TodoEntry};
use prose_utils::{atomic_write, collect_markdown_files, parallel_map};
use serde_json::json;
use similar::TextDiff;
use tracing::debug;

const EXIT_CHANGES: i32 = 1;
const EXIT_IO: i32 = 4;

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut load = LoadOptions::default();
    if let Some(path) = cli.config {
        load = load.with_override_path(path);
    }
    let config = Config::load(load)?;
    debug!(layers = config.sources.layers.len(), "configuration loaded");

    match cli.command {
        Command::Fmt(args) => handle_fmt(args),
        Command::Toc(args) => handle_toc(&config, args),
        Command::Count(args) => handle_count(&config, args),
        Command::Todo(args) => handle_todo(&config, args),
        Command::Fold(args) => handle_fold(&config, args),
    }
}

enum FormatStatus {
    Unchanged,
    Changed { diff: Option<String>, written: bool },
}

struct FormatRequest {
    write: bool,
    diff: bool,
    backup: bool,
}

fn handle_fmt(args: FmtArgs) -> Result<i32> {
    let FmtArgs {
        paths,
        check,
        diff,
        no_backup,
    } = args;

    let files = collect_markdown_files(&paths).context("failed to collect markdown files")?;
    let request = FormatRequest {
        write: !check && !diff,
        diff,
        backup: !no_backup,
    };
    let results = parallel_map(files, |path| {
        let status = format_file(&path, &request);
        (path, status)
    });

    let mut exit_code = 0;
    for (path, status) in results {
        match status {
            Ok(FormatStatus::Unchanged) => {}
            Ok(FormatStatus::Changed { diff, written }) => {
                if let Some(diff) = diff {
                    emit(&diff)?;
                }
                if written {
                    println!("formatted {}", path.display());
                } else {
                    if !request.diff {
                        println!("would reformat {}", path.display());
                    }
                    exit_code = exit_code.max(EXIT_CHANGES);
                }
            }
            Err(err) => {
                eprintln!("{}: {err:#}", path.display());
                exit_code = EXIT_IO;
            }
        }
    }
    Ok(exit_code)
}

fn format_file(path: &Path, request: &FormatRequest) -> Result<FormatStatus> {
    let original = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let formatted = format_markdown(&original)?;
    if formatted == original {
        return Ok(FormatStatus::Unchanged);
    }
    let diff = request
        .diff
        .then(|| unified_diff(&original, &formatted, &path.display().to_string()));
    if request.write {
        atomic_write(path, &formatted, request.backup)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(FormatStatus::Changed {
        diff,
        written: request.write,
    })
}

/// Parses and re-serializes `source`. Non-empty output ends with a newline.
pub fn format_markdown(source: &str) -> Result<String> {
    let doc = prose_markdown::parse(source)?;
    let mut formatted = prose_markdown::serialize(&doc);
    if !formatted.is_empty() {
        formatted.push('\n');
    }
    Ok(formatted)
}

fn unified_diff(original: &str, modified: &str, path: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

fn open_editor(config: &Config, path: &Path) -> Result<Editor> {
    let source = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Editor::create(&source, EditorOptions::new(config.clone()))?)
}

fn handle_toc(config: &Config, args: DocArgs) -> Result<i32> {
    let editor = open_editor(config, &args.path)?;
    let entries = toc_entries(editor.state()?.doc());

    if args.json {
        let payload = json!({
            "file": args.path,
            "headings": entries
                .iter()
                .map(|entry| {
                    json!({
                        "id": entry.id,
                        "level": entry.level,
                        "text": entry.text,
                        "pos": entry.pos,
                    })
                })
                .collect::<Vec<_>>()
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !entries.is_empty() {
        emit(&prose_plugins::render_numbered(&entries))?;
    }
    Ok(0)
}

fn handle_count(config: &Config, args: DocArgs) -> Result<i32> {
    let editor = open_editor(config, &args.path)?;
    let doc = editor.state()?.doc();
    let titles: BTreeMap<usize, String> = toc_entries(doc)
        .into_iter()
        .map(|entry| (entry.pos + 1, entry.text))
        .collect();
    let tallies = word_tallies(doc);
    let total = tallies.first().map_or(0, |tally| tally.words);
    let sections: Vec<(u8, &str, usize, usize)> = tallies
        .iter()
        .filter_map(|tally| match tally.scope {
            TallyScope::Heading(level) => {
                let title = titles.get(&tally.pos).map_or("", String::as_str);
                Some((level, title, tally.pos, tally.words))
            }
            _ => None,
        })
        .collect();

    if args.json {
        let payload = json!({
            "file": args.path,
            "total": total,
            "sections": sections
                .iter()
                .map(|(level, title, pos, words)| {
                    json!({ "level": level, "heading": title, "pos": pos, "words": words })
                })
                .collect::<Vec<_>>()
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{total} words");
        for (level, title, _, words) in sections {
            println!("{} {title}: {words}", "#".repeat(usize::from(level)));
        }
    }
    Ok(0)
}

fn handle_todo(config: &Config, args: TodoArgs) -> Result<i32> {
    let TodoArgs { path, toggle, json } = args;
    let mut editor = open_editor(config, &path)?;

    if let Some(index) = toggle {
        let entries = todo_entries(editor.state()?.doc());
        let Some(entry) = index.checked_sub(1).and_then(|i| entries.get(i)) else {
            eprintln!("no todo #{index} in {} ({} todos)", path.display(), entries.len());
            return Ok(EXIT_CHANGES);
        };
        editor.toggle_todo(entry.pos)?;
        let mut markdown = editor.markdown()?;
        markdown.push('\n');
        atomic_write(&path, &markdown, false).with_context(|| format!("failed to write {}", path.display()))?;
    }

    let entries = todo_entries(editor.state()?.doc());
    if json {
        let payload = json!({
            "file": path,
            "todos": entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    json!({
                        "index": i + 1,
                        "checked": entry.checked,
                        "created": entry.created,
                        "closed": entry.closed,
                        "text": entry.text,
                    })
                })
                .collect::<Vec<_>>()
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (i, entry) in entries.iter().enumerate() {
            println!("{}", todo_line(i + 1, entry));
        }
    }
    Ok(0)
}

fn todo_line(index: usize, entry: &TodoEntry) -> String {
    let mark = if entry.checked { 'x' } else { ' ' };
    let dates = match (&entry.created, &entry.closed) {
        (Some(created), Some(closed)) => format!(" ({created} - {closed})"),
        (Some(created), None) => format!(" ({created})"),
        (None, Some(closed)) => format!(" (- {closed})"),
        (None, None) => String::new(),
    };
    format!("{index}. [{mark}] {}{dates}", entry.text)
}

fn handle_fold(config: &Config, args: FoldArgs) -> Result<i32> {
    let FoldArgs { path, tag } = args;
    let mut editor = open_editor(config, &path)?;
    let Some(key) = editor.features().folding_tags else {
        bail!("the folding-tags plugin is disabled in the configuration");
    };
    let tag = tag.trim_start_matches('#').to_string();

    let known = key
        .get_state(editor.state()?)
        .is_some_and(|tags| tags.tags().iter().any(|known| known == &tag));
    if !known {
        eprintln!("no #{tag} anchor in {}", path.display());
        return Ok(EXIT_CHANGES);
    }

    let tr = focus_tag(editor.state()?, &key, &tag);
    editor.dispatch(tr)?;
    let state = editor.state()?;
    let hidden = key.get_state(state).map(|fold| fold.hidden_ranges()).unwrap_or_default();
    if let Some(visible) = visible_children(state.doc(), 0, &hidden) {
        emit(&prose_markdown::serialize(&state.doc().copy(visible)))?;
    }
    Ok(0)
}

/// Children of a node whose content starts at `start`, minus the hidden
/// ranges. `None` when nothing is left.
fn visible_children(node: &Node, start: usize, hidden: &[(usize, usize)]) -> Option<Fragment> {
    let mut pos = start;
    let mut kept = Vec::new();
    for child in node.children() {
        let end = pos + child.node_size();
        let covered = hidden.iter().any(|&(from, to)| from <= pos && end <= to);
        if !covered {
            if child.is_textblock() || child.is_leaf() {
                kept.push(child.clone());
            } else if let Some(content) = visible_children(child, pos + 1, hidden) {
                kept.push(child.copy(content));
            }
        }
        pos = end;
    }
    (!kept.is_empty()).then(|| Fragment::from_nodes(kept))
}

fn emit(content: &str) -> Result<()> {
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[derive(Parser)]
#[command(author, version, about = "Markdown notes toolkit", propagate_version = true)]
struct Cli {
    /// Use this configuration file on top of the discovered ones
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize Markdown files
    Fmt(FmtArgs),
    /// Print the table of contents
    Toc(DocArgs),
    /// Count words in the document and each heading section
    Count(DocArgs),
    /// List todo items and toggle one
    Todo(TodoArgs),
    /// Print only the blocks mentioning a tag
    Fold(FoldArgs),
}

#[derive(Args)]
struct FmtArgs {
    /// Files or directories to format
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
    /// Report files that would change without writing them
    #[arg(long, conflicts_with = "diff")]
    check: bool,
    /// Print unified diffs instead of writing
    #[arg(long, conflicts_with = "check")]
    diff: bool,
    /// Disable .bak backups for rewritten files
    #[arg(long = "no-backup")]
    no_backup: bool,
}

#[derive(Args)]
struct DocArgs {
    /// Markdown file
    #[arg(value_name = "FILE")]
    path: PathBuf,
    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TodoArgs {
    /// Markdown file
    #[arg(value_name = "FILE")]
    path: PathBuf,
    /// Check or uncheck the Nth todo (1-based) and save the file
    #[arg(long, value_name = "N")]
    toggle: Option<usize>,
    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FoldArgs {
    /// Markdown file
    #[arg(value_name = "FILE")]
    path: PathBuf,
    /// Tag to focus, with or without the leading `#`
    #[arg(long, value_name = "TAG")]
    tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_is_stable() {
        let once = format_markdown("# Title\n\n\n*   item\n").expect("formats");
        assert_eq!(format_markdown(&once).expect("formats"), once);
        assert!(once.ends_with('\n'));
    }

    #[test]
    fn todo_lines_show_known_dates() {
        let entry = TodoEntry {
            pos: 0,
            checked: true,
            created: Some("01/02/24".to_string()),
            closed: Some("01/05/24".to_string()),
            text: "ship".to_string(),
        };
        assert_eq!(todo_line(2, &entry), "2. [x] ship (01/02/24 - 01/05/24)");
    }

    #[test]
    fn diffs_name_both_sides() {
        let diff = unified_diff("a\n", "b\n", "notes.md");
        assert!(diff.contains("--- a/notes.md"));
        assert!(diff.contains("+b"));
    }
}
