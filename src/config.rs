use crate::error::{ChartBumpError, Result};

/// Chart descriptor basenames, matched case-sensitively.
pub const CHART_FILE_NAMES: &[&str] = &["Chart.yaml", "Chart.yml"];

/// Helmfile descriptor basenames, matched case-sensitively.
pub const HELMFILE_FILE_NAMES: &[&str] = &["helmfile.yaml", "helmfile.yml"];

pub const DEFAULT_BASE_BRANCH: &str = "master";
pub const DEFAULT_TITLE_MARKER: &str = "[chartbump]";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const BOT_NAME: &str = "github-actions[bot]";
const BOT_EMAIL: &str = "41898282+github-actions[bot]@users.noreply.github.com";

/// Author and committer recorded on every remote commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub name: String,
    pub email: String,
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            name: BOT_NAME.to_string(),
            email: BOT_EMAIL.to_string(),
        }
    }
}

/// Fixed values the publish driver needs; built once per run.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub base_branch: String,
    pub title_marker: String,
    pub identity: BotIdentity,
    /// Force-move an already existing update branch to the base tip instead of failing.
    pub reset_existing_branch: bool,
}

impl PublishConfig {
    pub fn new(base_branch: impl Into<String>) -> Self {
        Self {
            base_branch: base_branch.into(),
            title_marker: DEFAULT_TITLE_MARKER.to_string(),
            identity: BotIdentity::default(),
            reset_existing_branch: false,
        }
    }

    pub fn with_reset_existing_branch(mut self, reset: bool) -> Self {
        self.reset_existing_branch = reset;
        self
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_BRANCH)
    }
}

/// What to bump and where to look for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub dependency: String,
    pub version: String,
    /// Keeps only top-level directories whose name starts with this value; empty keeps all.
    pub prefix: String,
    /// Restricts the run to one exact top-level directory.
    pub directory: Option<String>,
    pub recursive: bool,
}

impl UpdateRequest {
    pub fn new(dependency: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            version: version.into(),
            prefix: String::new(),
            directory: None,
            recursive: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_directory(mut self, directory: Option<String>) -> Self {
        self.directory = directory.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Rejects blank names and versions before any filesystem or remote work.
    pub fn validate(&self) -> Result<()> {
        if self.dependency.trim().is_empty() {
            return Err(ChartBumpError::InputValidation(
                "dependency name is required".to_string(),
            ));
        }

        if self.version.trim().is_empty() {
            return Err(ChartBumpError::InputValidation(
                "target version is required".to_string(),
            ));
        }

        if let Some(directory) = &self.directory {
            if directory.contains('/') || directory.contains('\\') || directory == ".." {
                return Err(ChartBumpError::InputValidation(format!(
                    "directory '{directory}' must be a single top-level directory name"
                )));
            }
        }

        Ok(())
    }

    /// The scope embedded in branch names: the explicit directory, else a non-empty prefix.
    pub fn scope(&self) -> Option<&str> {
        self.directory
            .as_deref()
            .or_else(|| (!self.prefix.is_empty()).then_some(self.prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_dependency() {
        let err = UpdateRequest::new("  ", "1.0.0").validate().unwrap_err();
        assert!(matches!(err, ChartBumpError::InputValidation(_)));
    }

    #[test]
    fn rejects_blank_version() {
        assert!(UpdateRequest::new("db", "").validate().is_err());
    }

    #[test]
    fn rejects_nested_directory() {
        let request = UpdateRequest::new("db", "1.0.0").with_directory(Some("a/b".to_string()));
        assert!(request.validate().is_err());
    }

    #[test]
    fn scope_prefers_directory_over_prefix() {
        let request = UpdateRequest::new("db", "1.0.0")
            .with_prefix("svc")
            .with_directory(Some("svc-api".to_string()));
        assert_eq!(request.scope(), Some("svc-api"));

        let request = UpdateRequest::new("db", "1.0.0").with_prefix("svc");
        assert_eq!(request.scope(), Some("svc"));

        assert_eq!(UpdateRequest::new("db", "1.0.0").scope(), None);
    }

    #[test]
    fn blank_directory_is_ignored() {
        let request = UpdateRequest::new("db", "1.0.0").with_directory(Some(" ".to_string()));
        assert!(request.directory.is_none());
    }

    #[test]
    fn default_publish_config_uses_bot_identity() {
        let config = PublishConfig::default();
        assert_eq!(config.base_branch, "master");
        assert_eq!(config.identity.name, "github-actions[bot]");
        assert!(!config.reset_existing_branch);
    }
}
