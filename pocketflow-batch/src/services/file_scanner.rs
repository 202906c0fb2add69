//! Structure file discovery
//!
//! Recursive scan of an input root for files with recognized extensions.
//! Results are deduplicated by resolved path and sorted so repeated runs
//! over an unchanged tree see the same order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Structure file scanner
pub struct FileScanner {
    extensions: Vec<String>,
    ignore_dirs: Vec<String>,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Scanner for the default `pdb` and `cif` extensions
    pub fn new() -> Self {
        Self::with_extensions(["pdb", "cif"])
    }

    /// Scanner for the given extensions (case-insensitive, leading dot optional)
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            ignore_dirs: vec![
                ".git".to_string(),
                ".svn".to_string(),
                "__pycache__".to_string(),
                "node_modules".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Limit recursion depth (1 = files directly in the root)
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Scan `root_path` for structure files
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .sort_by_file_name()
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_descend(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !path.is_file() || !self.has_recognized_extension(path) {
                        continue;
                    }
                    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                    if seen.insert(resolved) {
                        files.push(path.to_path_buf());
                    } else {
                        tracing::debug!(path = %path.display(), "Skipping duplicate structure file");
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        files.sort();

        tracing::debug!(
            root = %root_path.display(),
            count = files.len(),
            "Structure file scan complete"
        );

        Ok(files)
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return false;
        }
        !self.ignore_dirs.iter().any(|d| name == d.as_str())
    }

    fn has_recognized_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| self.extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "ATOM\n").unwrap();
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let scanner = FileScanner::new();
        match scanner.scan(Path::new("/nonexistent/pocketflow/input")) {
            Err(ScanError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("1abc.pdb");
        touch(&file);

        match FileScanner::new().scan(&file) {
            Err(ScanError::NotADirectory(_)) => {}
            other => panic!("Expected NotADirectory error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(FileScanner::new().scan(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_recursive_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b/2xyz.cif"));
        touch(&root.join("a/deep/3def.PDB"));
        touch(&root.join("1abc.pdb"));
        touch(&root.join("notes.txt"));
        touch(&root.join(".git/objects/4ghi.pdb"));
        touch(&root.join(".hidden/5jkl.pdb"));

        let files = FileScanner::new().scan(root).unwrap();
        assert_eq!(
            files,
            vec![
                root.join("1abc.pdb"),
                root.join("a/deep/3def.PDB"),
                root.join("b/2xyz.cif"),
            ]
        );
    }

    #[test]
    fn test_extension_normalization() {
        let scanner = FileScanner::with_extensions([".PDB", " cif ", ""]);
        assert_eq!(scanner.extensions(), &["pdb".to_string(), "cif".to_string()]);

        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("x.pdb"));
        touch(&temp_dir.path().join("y.cif"));
        let only_cif = FileScanner::with_extensions(["cif"]).scan(temp_dir.path()).unwrap();
        assert_eq!(only_cif, vec![temp_dir.path().join("y.cif")]);
    }

    #[test]
    fn test_max_depth_limits_recursion() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("top.pdb"));
        touch(&temp_dir.path().join("sub/nested.pdb"));

        let files = FileScanner::new().max_depth(1).scan(temp_dir.path()).unwrap();
        assert_eq!(files, vec![temp_dir.path().join("top.pdb")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("a.pdb");
        touch(&original);
        std::os::unix::fs::symlink(&original, temp_dir.path().join("b.pdb")).unwrap();

        let files = FileScanner::new().scan(temp_dir.path()).unwrap();
        assert_eq!(files, vec![original]);
    }
}
