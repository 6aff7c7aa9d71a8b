// The "iteratively read file" and "read file or summary" supporting
// surfaces, grounded on the original Python
// `app/services/codebase_read/iterative_file_reader`. Both share one
// line-reading primitive but remain two call sites, matching the original.

use std::path::Path;

use crate::chunking::languages::TSLanguageParsing;
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::scanner::language_for_extension;

#[derive(Debug, Clone, serde::Serialize)]
pub struct LineRangeResult {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub total_lines: usize,
    pub eof_reached: bool,
}

/// Reads an exact, 1-based inclusive line range. `eof_reached` is true iff
/// the requested end is at or past the last line.
pub fn read_lines(disk_path: &Path, start_line: usize, end_line: usize) -> Result<LineRangeResult> {
    let content = std::fs::read_to_string(disk_path)
        .map_err(|err| Error::NotFound(format!("{}: {err}", disk_path.display())))?;
    // preserve newlines exactly: split_inclusive keeps the trailing `\n` on
    // every line but the last.
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total_lines = lines.len().max(1);

    let start = start_line.max(1);
    let end = end_line.max(start).min(total_lines);
    let slice = lines.get(start - 1..end).unwrap_or_default();

    Ok(LineRangeResult {
        content: slice.concat(),
        start_line: start,
        end_line: end,
        total_lines,
        eof_reached: end >= total_lines,
    })
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileOrSummary {
    Full { content: String, total_lines: usize },
    Summary { outline: Vec<String>, total_lines: usize },
}

/// If no range is given and the file is below `full_file_line_threshold`,
/// returns the whole file; otherwise returns a symbol-outline summary.
pub fn read_file_or_summary(parsing: &TSLanguageParsing, config: &Configuration, disk_path: &Path, relative_path: &str) -> Result<FileOrSummary> {
    let content = std::fs::read_to_string(disk_path)
        .map_err(|err| Error::NotFound(format!("{}: {err}", disk_path.display())))?;
    let total_lines = content.lines().count().max(1);

    if total_lines <= config.full_file_line_threshold {
        return Ok(FileOrSummary::Full { content, total_lines });
    }

    let language = language_for_extension(Path::new(relative_path));
    let outline = language
        .as_deref()
        .map(|lang| parsing.parse_symbol_metadata(&content, lang))
        .map(|metadata| {
            let mut outline: Vec<String> = metadata
                .class_names
                .into_iter()
                .map(|name| format!("class {name}"))
                .chain(metadata.function_names.into_iter().map(|name| format!("fn {name}")))
                .collect();
            outline.sort();
            outline
        })
        .unwrap_or_default();

    Ok(FileOrSummary::Summary { outline, total_lines })
}

/// Advances a cursor across repeated calls, reading the file in
/// `iterative_read_page_lines`-sized windows. Distinct from, and composable
/// with, `read_file_or_summary` — the two share `read_lines` but are
/// separate call sites, matching the original service.
pub fn iteratively_read_file(config: &Configuration, disk_path: &Path, cursor_line: usize) -> Result<LineRangeResult> {
    let start = cursor_line.max(1);
    let end = start + config.iterative_read_page_lines - 1;
    read_lines(disk_path, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_file_reports_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello\n").unwrap();

        let result = read_lines(&path, 1, 1).unwrap();
        assert_eq!(result.content, "hello\n");
        assert!(result.eof_reached);
    }

    #[test]
    fn read_file_or_summary_returns_full_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "x = 1\n".repeat(5)).unwrap();
        let parsing = TSLanguageParsing::init();
        let mut config = test_config();
        config.full_file_line_threshold = 100;

        match read_file_or_summary(&parsing, &config, &path, "a.py").unwrap() {
            FileOrSummary::Full { total_lines, .. } => assert_eq!(total_lines, 5),
            FileOrSummary::Summary { .. } => panic!("expected full file"),
        }
    }

    #[test]
    fn read_file_or_summary_returns_summary_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "def f():\n    pass\n".repeat(20)).unwrap();
        let parsing = TSLanguageParsing::init();
        let mut config = test_config();
        config.full_file_line_threshold = 10;

        match read_file_or_summary(&parsing, &config, &path, "a.py").unwrap() {
            FileOrSummary::Summary { .. } => {}
            FileOrSummary::Full { .. } => panic!("expected summary"),
        }
    }

    fn test_config() -> Configuration {
        use clap::Parser;
        Configuration::parse_from(["test"])
    }
}
