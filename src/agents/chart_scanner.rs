use crate::config::{CHART_FILE_NAMES, HELMFILE_FILE_NAMES, UpdateRequest};
use crate::error::{ChartBumpError, Result};
use crate::utils::path_validator::PathValidator;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One descriptor file found under a candidate directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDirectoryEntry {
    /// Directory holding the file, relative to the workspace, `/`-separated.
    pub directory_name: String,
    pub absolute_file_path: PathBuf,
}

impl ChartDirectoryEntry {
    pub fn file_name(&self) -> &str {
        self.absolute_file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Workspace-relative path of the file, as the remote host names it.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.directory_name, self.file_name())
    }
}

/// Which top-level directories to visit and how deep to go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub prefix: String,
    pub directory: Option<String>,
    pub recursive: bool,
}

impl ScanOptions {
    /// Top-level selection. The prefix is never applied below the top level.
    fn selects(&self, name: &str) -> bool {
        if let Some(directory) = &self.directory {
            return name == directory;
        }
        name.starts_with(&self.prefix)
    }
}

impl From<&UpdateRequest> for ScanOptions {
    fn from(request: &UpdateRequest) -> Self {
        Self {
            prefix: request.prefix.clone(),
            directory: request.directory.clone(),
            recursive: request.recursive,
        }
    }
}

/// ChartScannerAgent discovers chart and helmfile descriptors in the workspace
pub struct ChartScannerAgent {
    workspace_root: PathBuf,
}

impl ChartScannerAgent {
    pub fn new<P: AsRef<Path>>(workspace_root: P) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    /// Lists every descriptor under the selected top-level directories, in name order.
    pub fn scan(&self, options: &ScanOptions) -> Result<Vec<ChartDirectoryEntry>> {
        let mut entries = Vec::new();

        for name in self.top_level_directories()? {
            if !options.selects(&name) {
                continue;
            }

            let dir = self.workspace_root.join(&name);
            if options.recursive {
                self.collect_recursive(&dir, &mut entries);
            } else {
                Self::collect_descriptors(&dir, &name, &mut entries);
            }
        }

        debug!(count = entries.len(), "descriptor scan finished");
        Ok(entries)
    }

    fn top_level_directories(&self) -> Result<Vec<String>> {
        let read_dir = fs::read_dir(&self.workspace_root).map_err(|e| {
            ChartBumpError::Scan(format!(
                "cannot list '{}': {e}",
                self.workspace_root.display()
            ))
        })?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| ChartBumpError::Scan(e.to_string()))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with('.') {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    fn collect_recursive(&self, dir: &Path, entries: &mut Vec<ChartDirectoryEntry>) {
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.workspace_root)
                .unwrap_or(entry.path());
            let directory_name = PathValidator::to_remote_path(relative);
            Self::collect_descriptors(entry.path(), &directory_name, entries);
        }
    }

    /// Adds the descriptors sitting directly in `dir`, matching basenames exactly.
    fn collect_descriptors(dir: &Path, directory_name: &str, entries: &mut Vec<ChartDirectoryEntry>) {
        let present: HashSet<String> = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                .collect(),
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        for file_name in CHART_FILE_NAMES.iter().chain(HELMFILE_FILE_NAMES) {
            if present.contains(*file_name) {
                entries.push(ChartDirectoryEntry {
                    directory_name: directory_name.to_string(),
                    absolute_file_path: dir.join(file_name),
                });
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
