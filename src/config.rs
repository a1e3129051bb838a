//! Engine configuration
//!
//! Values are resolved with priority: environment variables > config file >
//! defaults. The config file lives at `<data dir>/triseek/config.toml`
//! (`~/.local/share` on Linux, `~/Library/Application Support` on macOS,
//! `%LOCALAPPDATA%` on Windows).

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "triseek";
const CONFIG_FILE: &str = "config.toml";

/// Default upper bound for indexed files (16 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Extensions of files that never contain searchable text
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    "7z", "a", "avi", "bin", "bmp", "bz2", "class", "dat", "db", "dll", "dmg", "dylib", "ear",
    "eot", "exe", "flac", "gif", "gz", "ico", "iso", "jar", "jpeg", "jpg", "lib", "mov", "mp3",
    "mp4", "o", "obj", "ogg", "otf", "pdf", "png", "pyc", "rar", "so", "sqlite", "tar", "tgz",
    "tiff", "ttf", "war", "wasm", "wav", "webp", "woff", "woff2", "xz", "zip",
];

/// File names known to be stored in encodings other than UTF-8
pub const DEFAULT_SKIP_FILE_NAMES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    "*.reg",
    "*.p12",
    "*.pfx",
    "*.keystore",
];

/// Configuration file format (TOML)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfigFile,
}

/// `[engine]` section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfigFile {
    pub skip_extensions: Option<Vec<String>>,
    pub skip_file_names: Option<Vec<String>>,
    pub max_file_size: Option<u64>,
    pub respect_ignore_files: Option<bool>,
    pub include_hidden: Option<bool>,
    pub follow_links: Option<bool>,
    pub watch_filesystem: Option<bool>,
    pub search_threads: Option<usize>,
}

/// Configuration for a [`SearchEngine`](crate::engine::SearchEngine)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Extensions (without the dot) that are never indexed
    pub skip_extensions: Vec<String>,
    /// Glob patterns matched against file names that are never indexed
    pub skip_file_names: Vec<String>,
    /// Files larger than this are walked but contribute no triplets
    pub max_file_size: u64,
    /// Honour .gitignore / .ignore files while walking
    pub respect_ignore_files: bool,
    /// Walk hidden files and directories
    pub include_hidden: bool,
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// Install a filesystem watcher when incremental indexing starts
    pub watch_filesystem: bool,
    /// Threads used to scan candidate files (0 = number of CPUs)
    pub search_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_extensions: DEFAULT_SKIP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            skip_file_names: DEFAULT_SKIP_FILE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            respect_ignore_files: false,
            include_hidden: true,
            follow_links: false,
            watch_filesystem: true,
            search_threads: 0,
        }
    }
}

impl EngineConfig {
    /// Path of the config file in the app data directory
    pub fn config_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load config from file in the app data directory
    /// Returns None if file doesn't exist or can't be parsed
    fn load_from_file() -> Option<ConfigFile> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&config_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", config_path.display(), e);
                return None;
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                None
            }
        }
    }

    /// Load config with priority: environment variables > config file > defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(file_config) = Self::load_from_file() {
            config.apply_file(file_config.engine);
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_file(&mut self, file: EngineConfigFile) {
        if let Some(v) = file.skip_extensions {
            self.skip_extensions = v;
        }
        if let Some(v) = file.skip_file_names {
            self.skip_file_names = v;
        }
        if let Some(v) = file.max_file_size {
            self.max_file_size = v;
        }
        if let Some(v) = file.respect_ignore_files {
            self.respect_ignore_files = v;
        }
        if let Some(v) = file.include_hidden {
            self.include_hidden = v;
        }
        if let Some(v) = file.follow_links {
            self.follow_links = v;
        }
        if let Some(v) = file.watch_filesystem {
            self.watch_filesystem = v;
        }
        if let Some(v) = file.search_threads {
            self.search_threads = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(size) = var("TRISEEK_MAX_FILE_SIZE").and_then(|v| v.parse().ok()) {
            self.max_file_size = size;
        }
        if let Some(flag) = var("TRISEEK_RESPECT_IGNORE").and_then(|v| parse_flag(&v)) {
            self.respect_ignore_files = flag;
        }
        if let Some(flag) = var("TRISEEK_WATCH").and_then(|v| parse_flag(&v)) {
            self.watch_filesystem = flag;
        }
        if let Some(threads) = var("TRISEEK_SEARCH_THREADS").and_then(|v| v.parse().ok()) {
            self.search_threads = threads;
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Options for a single search
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Stop scanning once this many matches were found
    pub max_matches: Option<usize>,
    /// Order results by path, line and column
    pub sort_results: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_matches: None,
            sort_results: true,
        }
    }
}
