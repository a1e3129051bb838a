//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use triseek::{EngineConfig, SearchEngine, TokenMatch};

/// Temporary folder populated with text files
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Fixture with a small mixed source tree
    pub fn sample() -> Self {
        let fixture = Self::new();
        fixture.write(
            "main.rs",
            "fn main() {\n    println!(\"Hello, world!\");\n    helper();\n}\n\nfn helper() {\n    let x = 42;\n}\n",
        );
        fixture.write(
            "src/lib.rs",
            "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\npub fn multiply(a: i32, b: i32) -> i32 {\n    a * b\n}\n",
        );
        fixture.write(
            "src/utils.rs",
            "pub fn format_error(msg: &str) -> String {\n    format!(\"ERROR: {}\", msg)\n}\r\npub fn format_warning(msg: &str) -> String {\r\n    format!(\"WARNING: {}\", msg)\r\n}\n",
        );
        fixture.write("docs/notes.txt", "aaaaaa\nbanana bandana\nünïcödé text ünï\n");
        fixture.write("config.json", "{\n  \"name\": \"test-project\",\n  \"debug\": true\n}\n");
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, relative: &str) -> PathBuf {
        self.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.file(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    pub fn canonical(&self) -> PathBuf {
        fs::canonicalize(self.path()).expect("Failed to canonicalize fixture")
    }
}

/// Engine that never installs a filesystem watcher
pub fn engine() -> SearchEngine {
    SearchEngine::new(EngineConfig {
        watch_filesystem: false,
        ..EngineConfig::default()
    })
    .expect("Failed to create engine")
}

/// Every occurrence of `token` in every readable text file under `root`,
/// found by scanning all lines without any index.
pub fn brute_force(root: &Path, token: &str) -> Vec<TokenMatch> {
    let mut matches = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("Failed to read dir") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            for (line_index, line) in text.lines().enumerate() {
                let chars: Vec<char> = line.chars().collect();
                let needle: Vec<char> = token.chars().collect();
                if chars.len() < needle.len() {
                    continue;
                }
                for start in 0..=chars.len() - needle.len() {
                    if chars[start..start + needle.len()] == needle[..] {
                        matches.push(TokenMatch::new(path.clone(), line_index + 1, start + 1));
                    }
                }
            }
        }
    }
    matches.sort();
    matches
}

/// Poll `condition` for up to five seconds.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
