use crate::error::{ChartBumpError, Result};
use std::path::{Component, Path, PathBuf};

/// Path checks for the workspace and the files patched inside it.
pub struct PathValidator;

impl PathValidator {
    /// Canonical form of the workspace root, which must be an existing directory.
    pub fn validate_workspace_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            ChartBumpError::InputValidation(format!("Invalid workspace '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(ChartBumpError::InputValidation(format!(
                "Workspace '{}' is not a directory",
                canonical.display()
            )));
        }

        Ok(canonical)
    }

    /// Ensures the file path resides inside the provided base directory.
    pub fn validate_file_path(
        file_path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_file = file_path.canonicalize().map_err(|e| {
            ChartBumpError::InputValidation(format!(
                "Invalid file path '{}': {e}",
                file_path.display()
            ))
        })?;

        let canonical_base = base_dir.canonicalize().map_err(|e| {
            ChartBumpError::InputValidation(format!(
                "Invalid base directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        if !canonical_file.starts_with(&canonical_base) {
            return Err(ChartBumpError::InputValidation(format!(
                "File '{}' is outside the workspace",
                file_path.display()
            )));
        }

        Ok(canonical_file)
    }

    /// Joins the normal components of `relative` with `/`, the separator remote paths use.
    pub fn to_remote_path(relative: impl AsRef<Path>) -> String {
        relative
            .as_ref()
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}
