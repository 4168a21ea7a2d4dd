//! Configuration primitives and loader for the prose-md editor.
//!
//! The loader resolves `.prose-md.toml` using a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Parsed settings are normalised into typed structures so the editor and the
//! CLI never touch raw TOML.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".prose-md.toml";

const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 2000;
const DEFAULT_MAX_HEADING_LEVEL: u8 = 6;
const DEFAULT_WORD_COUNT_THROTTLE_MS: u64 = 1000;
const DEFAULT_TODO_DATE_FORMAT: &str = "%m/%d/%y";

/// Variable names computed by the variables plugin itself.
pub const BUILTIN_VARIABLES: &[&str] = &["time", "date", "help", "toc", "words"];

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub editor: EditorSettings,
    pub plugins: PluginSettings,
    pub word_count: WordCountSettings,
    pub todo: TodoSettings,
    pub variables: VariableSettings,
    pub sources: ConfigSources,
}

/// Editor host settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorSettings {
    pub autosave_debounce_ms: u64,
    pub max_heading_level: u8,
}

impl EditorSettings {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// Which feature plugins the editor registers, in registration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginSettings {
    pub enabled: Vec<PluginName>,
}

impl PluginSettings {
    pub fn is_enabled(&self, name: PluginName) -> bool {
        self.enabled.contains(&name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordCountSettings {
    pub throttle_ms: u64,
    pub show: bool,
}

impl WordCountSettings {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TodoSettings {
    pub date_format: String,
    pub hide_completed: bool,
}

/// Static `{:name}` values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableSettings {
    pub values: BTreeMap<String, String>,
}

impl VariableSettings {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Feature plugins known to the editor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum PluginName {
    FoldingTags,
    FoldingHeadings,
    Todo,
    Variables,
    Toc,
    WordCount,
}

impl PluginName {
    pub const ALL: &'static [PluginName] = &[
        PluginName::FoldingTags,
        PluginName::FoldingHeadings,
        PluginName::Todo,
        PluginName::Variables,
        PluginName::Toc,
        PluginName::WordCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PluginName::FoldingTags => "folding-tags",
            PluginName::FoldingHeadings => "folding-headings",
            PluginName::Todo => "todo",
            PluginName::Variables => "variables",
            PluginName::Toc => "toc",
            PluginName::WordCount => "word-count",
        }
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PluginName {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PluginName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == value)
            .ok_or(())
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
}

impl ConfigSource {
    fn default_layer() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        ConfigSource {
            kind,
            path: Some(path),
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default_layer();
        let mut merged = defaults_layer(default_source.clone());
        let mut source_layers = vec![default_source];

        let git_config_path = find_git_root(&working_dir).map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(resolved.with_sources(ConfigSources {
            working_directory: working_dir,
            layers: source_layers,
        }))
    }

    /// Parses a single TOML document layered over the built-in defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let source = ConfigSource::default_layer();
        let mut merged = defaults_layer(source.clone());
        let layer = parse_layer(contents, source.clone()).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        merged.merge(layer);
        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(resolved.with_sources(ConfigSources {
            working_directory: PathBuf::from("."),
            layers: vec![source],
        }))
    }
}

impl Default for Config {
    /// Built-in defaults only; no files are read.
    fn default() -> Self {
        Config {
            editor: EditorSettings {
                autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
                max_heading_level: DEFAULT_MAX_HEADING_LEVEL,
            },
            plugins: PluginSettings {
                enabled: PluginName::ALL.to_vec(),
            },
            word_count: WordCountSettings {
                throttle_ms: DEFAULT_WORD_COUNT_THROTTLE_MS,
                show: true,
            },
            todo: TodoSettings {
                date_format: DEFAULT_TODO_DATE_FORMAT.to_owned(),
                hide_completed: false,
            },
            variables: VariableSettings::default(),
            sources: ConfigSources {
                working_directory: PathBuf::from("."),
                layers: vec![ConfigSource::default_layer()],
            },
        }
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    parse_layer(&contents, source).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })
}

fn parse_layer(contents: &str, source: ConfigSource) -> Result<PartialConfig, toml::de::Error> {
    let raw: RawConfig = toml::from_str(contents)?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    let defaults = Config::default();
    let located = |value| Some(Located::new(value, source.clone()));
    PartialConfig {
        editor: EditorPartial {
            autosave_debounce_ms: located(defaults.editor.autosave_debounce_ms),
            max_heading_level: located(u64::from(defaults.editor.max_heading_level)),
        },
        plugins: PluginsPartial {
            enabled: Some(Located::new(
                defaults.plugins.enabled.iter().map(|name| name.as_str().to_owned()).collect(),
                source.clone(),
            )),
        },
        word_count: WordCountPartial {
            throttle_ms: located(defaults.word_count.throttle_ms),
            show: Some(Located::new(defaults.word_count.show, source.clone())),
        },
        todo: TodoPartial {
            date_format: Some(Located::new(defaults.todo.date_format, source.clone())),
            hide_completed: Some(Located::new(defaults.todo.hide_completed, source.clone())),
        },
        variables: BTreeMap::new(),
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Variable names are `[A-Za-z0-9_-]+`.
pub fn is_valid_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

fn merge_field<T>(target: &mut Option<Located<T>>, other: Option<Located<T>>) {
    if other.is_some() {
        *target = other;
    }
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    editor: EditorPartial,
    plugins: PluginsPartial,
    word_count: WordCountPartial,
    todo: TodoPartial,
    variables: BTreeMap<String, Located<String>>,
}

#[derive(Clone, Debug, Default)]
struct EditorPartial {
    autosave_debounce_ms: Option<Located<u64>>,
    max_heading_level: Option<Located<u64>>,
}

#[derive(Clone, Debug, Default)]
struct PluginsPartial {
    enabled: Option<Located<Vec<String>>>,
}

#[derive(Clone, Debug, Default)]
struct WordCountPartial {
    throttle_ms: Option<Located<u64>>,
    show: Option<Located<bool>>,
}

#[derive(Clone, Debug, Default)]
struct TodoPartial {
    date_format: Option<Located<String>>,
    hide_completed: Option<Located<bool>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        merge_field(&mut self.editor.autosave_debounce_ms, other.editor.autosave_debounce_ms);
        merge_field(&mut self.editor.max_heading_level, other.editor.max_heading_level);
        merge_field(&mut self.plugins.enabled, other.plugins.enabled);
        merge_field(&mut self.word_count.throttle_ms, other.word_count.throttle_ms);
        merge_field(&mut self.word_count.show, other.word_count.show);
        merge_field(&mut self.todo.date_format, other.todo.date_format);
        merge_field(&mut self.todo.hide_completed, other.todo.hide_completed);
        self.variables.extend(other.variables);
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();
        let defaults = Config::default();

        let autosave_debounce_ms = self
            .editor
            .autosave_debounce_ms
            .map(|located| located.value)
            .unwrap_or(defaults.editor.autosave_debounce_ms);

        let max_heading_level = match self.editor.max_heading_level {
            Some(located) if (1..=6).contains(&located.value) => located.value as u8,
            Some(located) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(located.source),
                        format!("must be between 1 and 6 (received {})", located.value),
                    )
                    .with_context("editor.max_heading_level"),
                );
                defaults.editor.max_heading_level
            }
            None => defaults.editor.max_heading_level,
        };

        let enabled = match self.plugins.enabled {
            Some(located) => parse_plugin_names(located, &mut errors),
            None => defaults.plugins.enabled,
        };

        let word_count = WordCountSettings {
            throttle_ms: self
                .word_count
                .throttle_ms
                .map(|located| located.value)
                .unwrap_or(defaults.word_count.throttle_ms),
            show: self
                .word_count
                .show
                .map(|located| located.value)
                .unwrap_or(defaults.word_count.show),
        };

        let date_format = match self.todo.date_format {
            Some(located) => {
                if let Err(message) = check_date_format(&located.value) {
                    errors.push(
                        ConfigValidationError::new(Some(located.source.clone()), message)
                            .with_context("todo.date_format"),
                    );
                }
                located.value
            }
            None => defaults.todo.date_format,
        };
        let hide_completed = self
            .todo
            .hide_completed
            .map(|located| located.value)
            .unwrap_or(defaults.todo.hide_completed);

        let mut values = BTreeMap::new();
        for (name, located) in self.variables {
            if !is_valid_variable_name(&name) {
                errors.push(
                    ConfigValidationError::new(
                        Some(located.source),
                        format!("invalid variable name '{name}' (allowed: letters, digits, '_' and '-')"),
                    )
                    .with_context("variables.values"),
                );
                continue;
            }
            if BUILTIN_VARIABLES.contains(&name.as_str()) {
                errors.push(
                    ConfigValidationError::new(
                        Some(located.source),
                        format!("variable '{name}' shadows a built-in variable"),
                    )
                    .with_context("variables.values"),
                );
                continue;
            }
            values.insert(name, located.value);
        }

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            editor: EditorSettings {
                autosave_debounce_ms,
                max_heading_level,
            },
            plugins: PluginSettings { enabled },
            word_count,
            todo: TodoSettings {
                date_format,
                hide_completed,
            },
            variables: VariableSettings { values },
        })
    }
}

fn parse_plugin_names(
    located: Located<Vec<String>>,
    errors: &mut Vec<ConfigValidationError>,
) -> Vec<PluginName> {
    let mut result = Vec::new();
    for value in located.value {
        match value.parse::<PluginName>() {
            Ok(name) => {
                if !result.contains(&name) {
                    result.push(name);
                }
            }
            Err(()) => errors.push(
                ConfigValidationError::new(
                    Some(located.source.clone()),
                    format!("unknown plugin '{value}'"),
                )
                .with_context("plugins.enabled"),
            ),
        }
    }
    result
}

fn check_date_format(format: &str) -> Result<(), String> {
    if format.trim().is_empty() {
        return Err("date format must not be empty".into());
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid strftime format '{format}'"));
    }
    Ok(())
}

#[derive(Clone, Debug)]
struct ResolvedConfig {
    editor: EditorSettings,
    plugins: PluginSettings,
    word_count: WordCountSettings,
    todo: TodoSettings,
    variables: VariableSettings,
}

impl ResolvedConfig {
    fn with_sources(self, sources: ConfigSources) -> Config {
        Config {
            editor: self.editor,
            plugins: self.plugins,
            word_count: self.word_count,
            todo: self.todo,
            variables: self.variables,
            sources,
        }
    }
}

/// Container for validation failures, formatted as a bullet list.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
    pub context: Option<String>,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError {
            source,
            message,
            context: None,
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    editor: Option<RawEditor>,
    #[serde(default)]
    plugins: Option<RawPlugins>,
    #[serde(default)]
    word_count: Option<RawWordCount>,
    #[serde(default)]
    todo: Option<RawTodo>,
    #[serde(default)]
    variables: Option<RawVariables>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        let located = |value: Option<u64>| value.map(|value| Located::new(value, source.clone()));
        let mut partial = PartialConfig::default();
        if let Some(editor) = self.editor {
            partial.editor = EditorPartial {
                autosave_debounce_ms: located(editor.autosave_debounce_ms),
                max_heading_level: located(editor.max_heading_level),
            };
        }
        if let Some(plugins) = self.plugins {
            partial.plugins.enabled = plugins
                .enabled
                .map(|enabled| Located::new(enabled, source.clone()));
        }
        if let Some(word_count) = self.word_count {
            partial.word_count = WordCountPartial {
                throttle_ms: located(word_count.throttle_ms),
                show: word_count.show.map(|show| Located::new(show, source.clone())),
            };
        }
        if let Some(todo) = self.todo {
            partial.todo = TodoPartial {
                date_format: todo
                    .date_format
                    .map(|format| Located::new(format, source.clone())),
                hide_completed: todo
                    .hide_completed
                    .map(|hide| Located::new(hide, source.clone())),
            };
        }
        if let Some(variables) = self.variables {
            partial.variables = variables
                .values
                .into_iter()
                .map(|(name, value)| (name, Located::new(value, source.clone())))
                .collect();
        }
        partial
    }
}

#[derive(Debug, Deserialize)]
struct RawEditor {
    #[serde(default)]
    autosave_debounce_ms: Option<u64>,
    #[serde(default)]
    max_heading_level: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPlugins {
    #[serde(default)]
    enabled: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawWordCount {
    #[serde(default)]
    throttle_ms: Option<u64>,
    #[serde(default)]
    show: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawTodo {
    #[serde(default)]
    date_format: Option<String>,
    #[serde(default)]
    hide_completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawVariables {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_layer_finalizes_to_the_default_settings() {
        let resolved = defaults_layer(ConfigSource::default_layer())
            .finalize()
            .expect("defaults validate");
        let config = resolved.with_sources(Config::default().sources);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn plugin_names_parse_from_their_labels() {
        for name in PluginName::ALL {
            assert_eq!(name.as_str().parse::<PluginName>(), Ok(*name));
        }
        assert!("spellcheck".parse::<PluginName>().is_err());
    }

    #[test]
    fn strftime_formats_are_checked() {
        assert!(check_date_format("%m/%d/%y").is_ok());
        assert!(check_date_format("%Y-%m-%d").is_ok());
        assert!(check_date_format("%Q").is_err());
        assert!(check_date_format("  ").is_err());
    }

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
            [word_count]
            show = false

            [variables.values]
            author = "Ada"
            "#,
        )
        .expect("valid config");
        assert!(!config.word_count.show);
        assert_eq!(config.word_count.throttle_ms, 1000);
        assert_eq!(config.variables.get("author"), Some("Ada"));
    }
}
