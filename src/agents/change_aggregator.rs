use crate::agents::chart_scanner::ChartDirectoryEntry;
use crate::agents::yaml_patcher::{DescriptorKind, YamlPatcher};
use crate::error::{ChartBumpError, Result};
use crate::utils::path_validator::PathValidator;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A descriptor staged for a remote commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Workspace-relative, `/`-separated.
    pub relative_path: String,
    pub directory_name: String,
    pub new_content: String,
    pub old_version: Option<String>,
}

/// A descriptor that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: String,
}

/// Everything the aggregation pass found.
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub file_changes: Vec<FileChange>,
    pub changed_directories: BTreeSet<String>,
    pub skipped: Vec<SkippedFile>,
}

impl AggregateOutcome {
    /// No directory changed: nothing to publish.
    pub fn is_empty(&self) -> bool {
        self.changed_directories.is_empty()
    }

    /// The last recorded previous version among the directory's changed files.
    pub fn old_version_for(&self, directory: &str) -> Option<&str> {
        self.file_changes
            .iter()
            .filter(|change| change.directory_name == directory)
            .filter_map(|change| change.old_version.as_deref())
            .last()
    }
}

/// ChangeAggregator applies the patcher to every scanned descriptor.
pub struct ChangeAggregator {
    workspace_root: PathBuf,
    write_back: bool,
}

impl ChangeAggregator {
    pub fn new<P: AsRef<Path>>(workspace_root: P) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            write_back: false,
        }
    }

    /// Also rewrite patched descriptors on local disk.
    pub fn with_write_back(mut self, write_back: bool) -> Self {
        self.write_back = write_back;
        self
    }

    /// Patches each entry in order. A failing file is recorded in `skipped` and the pass goes on.
    pub fn aggregate(
        &self,
        entries: &[ChartDirectoryEntry],
        dependency_name: &str,
        target_version: &str,
    ) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();

        let pb = ProgressBar::new(entries.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        for entry in entries {
            pb.set_message(format!("Checking {}", entry.relative_path()));

            match self.process_entry(entry, dependency_name, target_version) {
                Ok(Some(change)) => {
                    outcome
                        .changed_directories
                        .insert(change.directory_name.clone());
                    outcome.file_changes.push(change);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(file = %entry.relative_path(), error = %e, "skipping descriptor");
                    outcome.skipped.push(SkippedFile {
                        relative_path: entry.relative_path(),
                        reason: e.to_string(),
                    });
                }
            }

            pb.inc(1);
        }
        pb.finish_and_clear();

        debug!(
            changed = outcome.file_changes.len(),
            skipped = outcome.skipped.len(),
            "aggregation finished"
        );
        outcome
    }

    fn process_entry(
        &self,
        entry: &ChartDirectoryEntry,
        dependency_name: &str,
        target_version: &str,
    ) -> Result<Option<FileChange>> {
        let Some(kind) = YamlPatcher::kind_for_file(entry.file_name()) else {
            return Ok(None);
        };

        let content = fs::read_to_string(&entry.absolute_file_path)?;
        let result = match kind {
            DescriptorKind::Chart => {
                YamlPatcher::patch_chart(&content, dependency_name, target_version)
            }
            DescriptorKind::Helmfile => {
                YamlPatcher::patch_helmfile(&content, dependency_name, target_version)
            }
        };
        if let Some(reason) = result.failure {
            return Err(ChartBumpError::Descriptor(reason));
        }

        let Some(new_content) = result.new_content.filter(|_| result.updated) else {
            return Ok(None);
        };

        if self.write_back {
            let path =
                PathValidator::validate_file_path(&entry.absolute_file_path, &self.workspace_root)?;
            fs::write(path, &new_content)?;
        }

        Ok(Some(FileChange {
            relative_path: entry.relative_path(),
            directory_name: entry.directory_name.clone(),
            new_content,
            old_version: result.old_version,
        }))
    }
}
