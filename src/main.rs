use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use triseek::output;
use triseek::utils::progress::{ProgressBar, ProgressStyle};
use triseek::{EngineConfig, SearchEngine, SearchSettings, TokenMatch};

/// How often progress bars are refreshed
const REFRESH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "triseek")]
#[command(about = "Literal text search over a folder, backed by a trigram index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a folder and report what was indexed
    Index {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Index a folder and search it for a token
    Search {
        /// Literal token, at least 3 characters
        token: String,

        /// Folder to search in
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Print one JSON object per match
        #[arg(long)]
        json: bool,

        /// Print the number of matches per file
        #[arg(short, long)]
        count: bool,

        /// Print only the names of matching files
        #[arg(short = 'l', long)]
        files_with_matches: bool,

        /// Group matches under a file name heading
        #[arg(long)]
        heading: bool,

        /// Stop after this many matches
        #[arg(short = 'm', long)]
        max_count: Option<usize>,
    },
    /// Index a folder, keep it up to date, and answer tokens read from stdin
    Watch {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show index statistics for a folder
    Stats {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let color = !cli.no_color;

    let engine = SearchEngine::new(EngineConfig::load()).context("Invalid configuration")?;

    match cli.command {
        Commands::Index { path } => {
            index_folder(&engine, &path)?;
            print_stats(&engine, &path, color)?;
        }
        Commands::Search {
            token,
            path,
            json,
            count,
            files_with_matches,
            heading,
            max_count,
        } => {
            let settings = SearchSettings {
                max_matches: max_count,
                ..SearchSettings::default()
            };
            let matches = index_and_search(&engine, &path, &token, settings)?;
            let mut out = output::stdout(color);
            if json {
                output::print_json(&mut out, &matches)?;
            } else if count {
                output::print_match_counts(&mut out, &matches)?;
            } else if files_with_matches {
                output::print_files_only(&mut out, &matches)?;
            } else {
                output::print_matches(&mut out, &matches, &token, heading)?;
            }
        }
        Commands::Watch { path } => {
            watch(&engine, &path, color)?;
        }
        Commands::Stats { path } => {
            index_folder(&engine, &path)?;
            print_stats(&engine, &path, color)?;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TRISEEK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn progress_bar(message: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(1000);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")?
            .progress_chars("█▓▒░  "),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    Ok(bar)
}

/// Poll `progress` until `done`, mirroring it on a progress bar.
fn show_progress(
    bar: &ProgressBar,
    progress: impl Fn() -> f64,
    message: impl Fn() -> String,
    done: impl Fn() -> bool,
) {
    while !done() {
        bar.set_position((progress() * 1000.0) as u64);
        bar.set_message(message());
        thread::sleep(REFRESH_INTERVAL);
    }
    bar.finish_and_clear();
}

fn index_folder(engine: &SearchEngine, path: &Path) -> Result<Vec<PathBuf>> {
    let state = engine
        .create_index_at_folder(path)
        .with_context(|| format!("Cannot index {}", path.display()))?;

    let bar = progress_bar("Indexing")?;
    show_progress(
        &bar,
        || state.progress(),
        || {
            format!(
                "{}/{} files",
                state.indexed_files_number(),
                state.visited_files_number()
            )
        },
        || state.result().is_resolved(),
    );

    state
        .result()
        .wait()
        .with_context(|| format!("Indexing {} failed", path.display()))
}

fn index_and_search(
    engine: &SearchEngine,
    path: &Path,
    token: &str,
    settings: SearchSettings,
) -> Result<Vec<TokenMatch>> {
    let state = engine
        .index_and_search_string_with_settings(path, token, settings)
        .with_context(|| format!("Cannot search {}", path.display()))?;

    let bar = progress_bar("Searching")?;
    show_progress(
        &bar,
        || state.progress(),
        || match state.searching() {
            Some(searching) => format!("{} matches", searching.found_matches_number()),
            None => format!("{} files indexed", state.indexing().indexed_files_number()),
        },
        || state.result().is_resolved(),
    );

    state
        .result()
        .wait()
        .with_context(|| format!("Searching {} failed", path.display()))
}

fn print_stats(engine: &SearchEngine, path: &Path, color: bool) -> Result<()> {
    let folder = std::fs::canonicalize(path)?;
    if let Some(stats) = engine.index_stats(&folder) {
        output::print_stats(&mut output::stdout(color), &folder, &stats)?;
    }
    Ok(())
}

fn watch(engine: &SearchEngine, path: &Path, color: bool) -> Result<()> {
    index_folder(engine, path)?;
    engine.start_incremental_indexing();
    eprintln!("Watching {}; enter a token per line (Ctrl+D to quit)", path.display());

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let token = line.trim_end_matches(['\r', '\n']);
        if token.is_empty() {
            continue;
        }

        let matches = engine
            .search_string(path, token, SearchSettings::default())
            .and_then(|state| state.result().wait());
        match matches {
            Ok(matches) => {
                let mut out = output::stdout(color);
                output::print_matches(&mut out, &matches, token, false)?;
                out.flush()?;
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    engine.stop_incremental_indexing();
    Ok(())
}
