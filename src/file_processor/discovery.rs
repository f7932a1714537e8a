//! Target validation and notebook discovery

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Jupyter's autosave directory, never formatted.
const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

/// A problem with the supplied targets. Always fatal, raised before any file is touched.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("path '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("'{}' is not a notebook (expected a .ipynb file)", .0.display())]
    WrongExtension(PathBuf),

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: globset::Error },
}

/// Expands directory-style patterns to also match files within them.
/// Pattern "dir/path" becomes ["dir/path", "dir/path/**"].
///
/// Patterns containing glob characters (*, ?, [) are returned unchanged.
fn expand_directory_pattern(pattern: &str) -> Vec<String> {
    if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
        return vec![pattern.to_string()];
    }

    let base = pattern.trim_end_matches('/');
    vec![base.to_string(), format!("{base}/**")]
}

/// Compile exclude patterns into one matcher.
pub fn build_exclude_set(patterns: &[String]) -> Result<GlobSet, TargetError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_directory_pattern(pattern.trim_start_matches("./")) {
            let glob = Glob::new(&expanded).map_err(|source| TargetError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
    }
    builder.build().map_err(|source| TargetError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

fn clean_path(path: &Path) -> PathBuf {
    path.strip_prefix(".").map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

fn has_notebook_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
}

fn is_checkpoint(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == CHECKPOINT_DIR)
}

/// Every target must exist, and every file target must be a notebook.
pub fn check_targets(targets: &[PathBuf]) -> Result<(), TargetError> {
    for target in targets {
        if !target.exists() {
            return Err(TargetError::NotFound(target.clone()));
        }
        if !target.is_dir() && !has_notebook_extension(target) {
            return Err(TargetError::WrongExtension(target.clone()));
        }
    }
    Ok(())
}

/// Options for expanding targets into notebook paths.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions<'a> {
    pub exclude: &'a [String],
    pub respect_gitignore: bool,
}

/// Expand validated targets into the list of notebooks to process.
///
/// Explicit files keep the order they were given in; each directory
/// contributes its notebooks sorted by path. A path reached twice is only
/// processed once.
pub fn collect_notebooks(targets: &[PathBuf], options: &DiscoveryOptions<'_>) -> Result<Vec<PathBuf>, TargetError> {
    check_targets(targets)?;
    let excludes = build_exclude_set(options.exclude)?;
    let mut notebooks: IndexSet<PathBuf> = IndexSet::new();

    for target in targets {
        let cleaned = clean_path(target);
        if !target.is_dir() {
            if excludes.is_match(&cleaned) {
                log::warn!("{} ignored because of an exclude pattern", target.display());
            } else {
                notebooks.insert(cleaned);
            }
            continue;
        }

        let mut found = walk_directory(target, options.respect_gitignore);
        found.retain(|path| !excludes.is_match(path));
        found.sort();
        log::debug!("Found {} notebook(s) under {}", found.len(), target.display());
        notebooks.extend(found);
    }

    Ok(notebooks.into_iter().collect())
}

fn walk_directory(dir: &Path, respect_gitignore: bool) -> Vec<PathBuf> {
    let mut walk_builder = WalkBuilder::new(dir);
    walk_builder.ignore(respect_gitignore); // .ignore
    walk_builder.git_ignore(respect_gitignore); // .gitignore
    walk_builder.git_global(respect_gitignore);
    walk_builder.git_exclude(respect_gitignore); // .git/info/exclude
    walk_builder.parents(respect_gitignore);
    walk_builder.require_git(false); // Process git ignores even if no repo detected
    walk_builder.filter_entry(|entry| entry.file_name() != CHECKPOINT_DIR);

    let mut paths = Vec::new();
    for result in walk_builder.build() {
        match result {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_some_and(|ft| ft.is_file())
                    && has_notebook_extension(path)
                    && !is_checkpoint(path)
                {
                    paths.push(clean_path(path));
                }
            }
            Err(err) => log::warn!("Error walking {}: {err}", dir.display()),
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "{}").unwrap();
    }

    fn options(exclude: &[String]) -> DiscoveryOptions<'_> {
        DiscoveryOptions {
            exclude,
            respect_gitignore: true,
        }
    }

    #[test]
    fn test_expand_directory_pattern() {
        assert_eq!(expand_directory_pattern("build/"), vec!["build", "build/**"]);
        assert_eq!(expand_directory_pattern("*.ipynb"), vec!["*.ipynb"]);
    }

    #[test]
    fn test_missing_target() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.ipynb");
        let err = check_targets(&[missing.clone()]).unwrap_err();
        assert!(matches!(err, TargetError::NotFound(path) if path == missing));
    }

    #[test]
    fn test_wrong_extension() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("script.py");
        touch(&script);
        let err = check_targets(&[script]).unwrap_err();
        assert!(matches!(err, TargetError::WrongExtension(_)));
        assert!(err.to_string().contains("expected a .ipynb file"));
    }

    #[test]
    fn test_directory_walk_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("b.ipynb"));
        touch(&dir.path().join("a.ipynb"));
        touch(&dir.path().join("sub/c.ipynb"));
        touch(&dir.path().join("notes.md"));
        touch(&dir.path().join(".ipynb_checkpoints/a-checkpoint.ipynb"));

        let found = collect_notebooks(&[dir.path().to_path_buf()], &options(&[])).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.ipynb", "b.ipynb", "sub/c.ipynb"]);
    }

    #[test]
    fn test_explicit_order_and_dedup() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.ipynb");
        let b = dir.path().join("b.ipynb");
        touch(&a);
        touch(&b);

        let found = collect_notebooks(&[b.clone(), a.clone(), b.clone()], &options(&[])).unwrap();
        assert_eq!(found, vec![b, a]);
    }

    #[test]
    fn test_gitignore_respected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored/\n").unwrap();
        touch(&dir.path().join("ignored/x.ipynb"));
        touch(&dir.path().join("kept.ipynb"));

        let found = collect_notebooks(&[dir.path().to_path_buf()], &options(&[])).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("kept.ipynb"));

        let all = collect_notebooks(
            &[dir.path().to_path_buf()],
            &DiscoveryOptions {
                exclude: &[],
                respect_gitignore: false,
            },
        )
        .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_exclude_patterns() {
        let excludes = build_exclude_set(&["drafts".to_string(), "**/*_scratch.ipynb".to_string()]).unwrap();
        assert!(excludes.is_match("drafts/a.ipynb"));
        assert!(excludes.is_match("work/x_scratch.ipynb"));
        assert!(!excludes.is_match("work/final.ipynb"));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = build_exclude_set(&["a[".to_string()]);
        assert!(matches!(result, Err(TargetError::InvalidPattern { .. })));
    }
}
