use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::upload::UploadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: Utf8PathBuf,
    pub size: u64,
}

#[async_trait::async_trait]
pub trait LocalFileProvider: Send + Sync {
    /// Candidate files under `root` whose root-relative path matches
    /// `pattern`, in traversal order. Directories are never candidates.
    async fn enumerate(
        &self,
        root: &Utf8Path,
        pattern: &str,
    ) -> Result<Vec<LocalFile>, UploadError>;
}

/// Filesystem enumerator: walks the source root depth-first with sorted
/// directory entries, so repeated runs see the same order.
pub struct GlobFileProvider;

#[async_trait::async_trait]
impl LocalFileProvider for GlobFileProvider {
    async fn enumerate(
        &self,
        root: &Utf8Path,
        pattern: &str,
    ) -> Result<Vec<LocalFile>, UploadError> {
        let compiled = Pattern::new(pattern)
            .map_err(|e| UploadError::InvalidInput(format!("bad pattern '{pattern}': {e}")))?;
        let root = root.to_owned();

        tokio::task::spawn_blocking(move || {
            let match_options = MatchOptions {
                case_sensitive: true,
                // `*` stays inside one path segment; only `**` crosses.
                require_literal_separator: true,
                // Dotfiles match only when the pattern names the dot.
                require_literal_leading_dot: true,
            };

            let mut files = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry
                    .map_err(|e| UploadError::Local(format!("walk under {root} failed: {e}")))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = Utf8PathBuf::from_path_buf(entry.into_path())
                    .map_err(|p| UploadError::Local(format!("non-utf8 path: {}", p.display())))?;
                let rel = path
                    .strip_prefix(&root)
                    .map_err(|e| UploadError::Local(format!("relativize {path} failed: {e}")))?;
                if !compiled.matches_with(rel.as_str(), match_options) {
                    continue;
                }

                let size = std::fs::metadata(path.as_std_path())
                    .map_err(|e| UploadError::Local(format!("stat {path} failed: {e}")))?
                    .len();
                files.push(LocalFile { path, size });
            }
            Ok(files)
        })
        .await
        .map_err(|e| UploadError::Local(format!("enumeration join failed: {e}")))?
    }
}
