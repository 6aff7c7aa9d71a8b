// Regex content search scoped to a repo tree, honoring the same ignore
// rules as the scanner. Grounded on the original Python
// `app/services/codebase_read/grep_search/grep_search.py`, backed by the
// `regex`/`ignore` crates already in the teacher's dependency graph.

use std::path::Path;

use ignore::WalkBuilder;
use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone, serde::Serialize)]
pub struct GrepMatch {
    pub relative_path: String,
    pub line_number: usize,
    pub line: String,
}

pub fn grep_search(repo_root: &Path, pattern: &str, max_results: usize) -> Result<Vec<GrepMatch>> {
    let regex = Regex::new(pattern).map_err(|err| Error::ClientError(format!("invalid regex: {err}")))?;

    let mut matches = Vec::new();
    let walker = WalkBuilder::new(repo_root).standard_filters(true).hidden(false).build();

    'files: for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let relative_path = entry
            .path()
            .strip_prefix(repo_root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(GrepMatch {
                    relative_path: relative_path.clone(),
                    line_number: idx + 1,
                    line: line.to_owned(),
                });
                if matches.len() >= max_results {
                    break 'files;
                }
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_lines_and_skips_ignored_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn login() {}\nfn logout() {}\n").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "b.rs\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn login_ignored() {}\n").unwrap();

        let hits = grep_search(dir.path(), "login", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relative_path, "a.rs");
        assert_eq!(hits[0].line_number, 1);
    }
}
