//! Input file discovery

use glob::Pattern;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions picked up when walking a directory.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

const SKIPPED_DIRECTORIES: &[&str] = &["node_modules"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no files match '{0}'")]
    NoMatches(String),
}

/// Expand `input` into a sorted, deduplicated list of canonical file paths.
///
/// `input` is an existing file, an existing directory (walked recursively
/// for scripts) or a glob pattern. Relative inputs are anchored at `cwd`.
/// Paths matching any `exclude` pattern, either absolutely or relative to
/// `cwd`, are dropped.
pub fn discover(
    input: &str,
    exclude: &[String],
    cwd: &Path,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let excluded = exclude
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| DiscoveryError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cwd = canonical(cwd);
    let anchored: PathBuf = cwd.join(input).components().collect();
    let found = if anchored.is_file() {
        vec![anchored]
    } else if anchored.is_dir() {
        walk(&anchored)
    } else {
        expand_glob(&anchored.to_string_lossy())?
    };

    // `..` segments and symlinks must not yield two spellings of one file
    let mut files: Vec<PathBuf> = found.iter().map(|path| canonical(path)).collect();
    files.retain(|path| {
        let relative = path.strip_prefix(&cwd).unwrap_or(path);
        let keep = !excluded
            .iter()
            .any(|p| p.matches_path(path) || p.matches_path(relative));
        if !keep {
            debug!(path = %path.display(), "excluded");
        }
        keep
    });
    files.sort();
    files.dedup();

    if files.is_empty() {
        return Err(DiscoveryError::NoMatches(input.to_string()));
    }
    debug!(count = files.len(), input, "discovered input files");
    Ok(files)
}

/// `path` with `.`, `..` and symlinks resolved, or unchanged when it cannot
/// be resolved.
pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn walk(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped_directory(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_script(entry.path()))
        .map(DirEntry::into_path)
        .collect()
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let paths = glob::glob(pattern).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("skipping unreadable path: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect())
}

fn is_skipped_directory(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| SKIPPED_DIRECTORIES.contains(&name))
}

/// A script we did not write ourselves on an earlier run.
fn is_script(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| SCRIPT_EXTENSIONS.contains(&e));
    let generated = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map_or(false, |s| s.ends_with(".obfuscated"));
    has_extension && !generated
}
