// Bounded-depth directory listing for `/v1/get-directory-structure` and
// `/v1/get-files-in-dir`, grounded on the same `ignore::WalkBuilder` the
// scanner uses. Directory search is capped to 5 levels / 7 entries per the
// symbol/keyword search supporting surface (§4.4).

use std::path::Path;

use ignore::WalkBuilder;
use serde::Serialize;

use crate::config::Configuration;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryNode {
    pub name: String,
    pub relative_path: String,
    pub is_directory: bool,
    pub children: Vec<DirectoryNode>,
}

/// A tree of the repo below `subdirectory` (repo root if empty), bounded by
/// `config.directory_search_max_depth`.
pub fn directory_structure(repo_root: &Path, subdirectory: &str, config: &Configuration) -> Result<DirectoryNode> {
    let start = if subdirectory.is_empty() { repo_root.to_path_buf() } else { repo_root.join(subdirectory) };
    if !start.exists() {
        return Err(Error::NotFound(format!("directory not found: {subdirectory}")));
    }

    build_tree(repo_root, &start, config.directory_search_max_depth)
}

fn build_tree(repo_root: &Path, dir: &Path, remaining_depth: usize) -> Result<DirectoryNode> {
    let relative_path = dir.strip_prefix(repo_root).unwrap_or(dir).to_string_lossy().replace('\\', "/");
    let name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| relative_path.clone());

    let mut children = Vec::new();
    if remaining_depth > 0 {
        let walker = WalkBuilder::new(dir).standard_filters(true).max_depth(Some(1)).build();
        for entry in walker.filter_map(|e| e.ok()) {
            if entry.path() == dir {
                continue;
            }
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if is_dir {
                children.push(build_tree(repo_root, entry.path(), remaining_depth - 1)?);
            } else {
                let child_relative = entry.path().strip_prefix(repo_root).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
                children.push(DirectoryNode {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    relative_path: child_relative,
                    is_directory: false,
                    children: Vec::new(),
                });
            }
        }
    }
    children.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(DirectoryNode { name, relative_path, is_directory: true, children })
}

/// Flat listing of immediate entries in one directory, capped at
/// `directory_search_max_entries`, used both by `/v1/get-files-in-dir` and
/// by the focus-search directory-type autocomplete.
pub fn files_in_dir(repo_root: &Path, subdirectory: &str, config: &Configuration) -> Result<Vec<String>> {
    let start = if subdirectory.is_empty() { repo_root.to_path_buf() } else { repo_root.join(subdirectory) };
    if !start.exists() {
        return Err(Error::NotFound(format!("directory not found: {subdirectory}")));
    }

    let walker = WalkBuilder::new(&start).standard_filters(true).max_depth(Some(1)).build();
    let mut entries: Vec<String> = walker
        .filter_map(|e| e.ok())
        .filter(|entry| entry.path() != start)
        .map(|entry| entry.path().strip_prefix(repo_root).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/"))
        .collect();
    entries.sort();
    entries.truncate(config.directory_search_max_entries);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Configuration {
        use clap::Parser;
        Configuration::parse_from(["test"])
    }

    #[test]
    fn lists_files_capped_at_configured_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("f{i}.rs")), "").unwrap();
        }
        let mut config = test_config();
        config.directory_search_max_entries = 7;

        let entries = files_in_dir(dir.path(), "", &config).unwrap();
        assert_eq!(entries.len(), 7);
    }

    #[test]
    fn directory_structure_builds_a_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("a.rs"), "").unwrap();

        let config = test_config();
        let tree = directory_structure(dir.path(), "", &config).unwrap();
        assert!(tree.is_directory);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "sub");
    }
}
