//! Printing search results for the command line.
//!
//! Every printer writes to any [`WriteColor`], so the same code drives a
//! colored terminal, a pipe, or a buffer in tests.

use crate::index::IndexStats;
use crate::search::TokenMatch;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Standard output, colored only when asked and attached to a terminal.
pub fn stdout(color: bool) -> StandardStream {
    let choice = if color && io::IsTerminal::is_terminal(&io::stdout()) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print matches as `path:line:column:text`, the token highlighted.
///
/// With `heading`, the path is printed once above each file's matches.
pub fn print_matches<W: WriteColor>(
    out: &mut W,
    matches: &[TokenMatch],
    token: &str,
    heading: bool,
) -> io::Result<()> {
    let token_chars = token.chars().count();
    let mut current_file: Option<&Path> = None;
    let mut lines: Vec<String> = Vec::new();

    for m in matches {
        if current_file != Some(m.path.as_path()) {
            if heading {
                if current_file.is_some() {
                    writeln!(out)?;
                }
                out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
                writeln!(out, "{}", m.path.display())?;
                out.reset()?;
            }
            current_file = Some(m.path.as_path());
            // The file may have changed since it was scanned; print what is there now
            lines = fs::read_to_string(&m.path)
                .map(|text| text.lines().map(str::to_string).collect())
                .unwrap_or_default();
        }

        if !heading {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(out, "{}", m.path.display())?;
            out.reset()?;
            write!(out, ":")?;
        }

        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", m.line)?;
        out.reset()?;
        write!(out, ":{}:", m.column)?;

        match m.line.checked_sub(1).and_then(|i| lines.get(i)) {
            Some(line) => print_highlighted(out, line, m.column, token_chars)?,
            None => writeln!(out)?,
        }
    }

    Ok(())
}

/// Write `line`, highlighting `len` characters from 1-based `column`.
fn print_highlighted<W: WriteColor>(
    out: &mut W,
    line: &str,
    column: usize,
    len: usize,
) -> io::Result<()> {
    let byte_at = |chars: usize| {
        line.char_indices()
            .nth(chars)
            .map_or(line.len(), |(i, _)| i)
    };
    let start = byte_at(column.saturating_sub(1));
    let end = byte_at(column.saturating_sub(1) + len);

    write!(out, "{}", &line[..start])?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(out, "{}", &line[start..end])?;
    out.reset()?;
    writeln!(out, "{}", &line[end..])
}

/// Print each matching file once (for `--files-with-matches`)
pub fn print_files_only<W: WriteColor>(out: &mut W, matches: &[TokenMatch]) -> io::Result<()> {
    let mut previous: Option<&Path> = None;
    for m in matches {
        if previous == Some(m.path.as_path()) {
            continue;
        }
        previous = Some(m.path.as_path());
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        writeln!(out, "{}", m.path.display())?;
        out.reset()?;
    }
    Ok(())
}

/// Print match count per file (for `--count`)
pub fn print_match_counts<W: WriteColor>(out: &mut W, matches: &[TokenMatch]) -> io::Result<()> {
    let mut counts: BTreeMap<&Path, usize> = BTreeMap::new();
    for m in matches {
        *counts.entry(m.path.as_path()).or_default() += 1;
    }

    for (path, count) in counts {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "{}", path.display())?;
        out.reset()?;
        writeln!(out, ":{}", count)?;
    }
    Ok(())
}

/// Print one JSON object per match
pub fn print_json<W: Write>(out: &mut W, matches: &[TokenMatch]) -> io::Result<()> {
    for m in matches {
        serde_json::to_writer(&mut *out, m)?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn print_stats<W: WriteColor>(out: &mut W, folder: &Path, stats: &IndexStats) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "{}", folder.display())?;
    out.reset()?;
    writeln!(out, "  files:    {}", stats.files)?;
    writeln!(out, "  triplets: {}", stats.triplets)
}
