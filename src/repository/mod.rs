use crate::config::BotIdentity;
use crate::error::{ChartBumpError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub mod factory;
pub mod github;
#[cfg(test)]
pub mod testing;

pub use factory::RepositoryFactory;
pub use github::GitHubClient;

/// `owner/name` of the repository every remote call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

fn coordinate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("static pattern is valid")
    })
}

impl FromStr for RepoCoordinates {
    type Err = ChartBumpError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let captures = coordinate_pattern().captures(value).ok_or_else(|| {
            ChartBumpError::InputValidation(format!(
                "repository '{value}' must be in 'owner/name' form"
            ))
        })?;

        let owner = &captures[1];
        let name = &captures[2];
        if [owner, name].iter().any(|part| *part == "." || *part == "..") {
            return Err(ChartBumpError::InputValidation(format!(
                "repository '{value}' contains a relative path segment"
            )));
        }

        Ok(Self::new(owner, name))
    }
}

impl fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A create-or-update call for one file on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    pub content: &'a str,
    pub message: &'a str,
    pub branch: &'a str,
    /// Blob hash the file currently has on `branch`; `None` creates the file.
    pub sha: Option<&'a str>,
    pub identity: &'a BotIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// The version-control host operations the publish driver relies on.
///
/// `reference` arguments are given without the `refs/` prefix (`heads/main`).
pub trait RemoteRepository: Send + Sync {
    /// Commit hash the reference points at.
    fn get_ref(&self, reference: &str) -> Result<String>;

    fn create_ref(&self, reference: &str, sha: &str) -> Result<()>;

    fn update_ref(&self, reference: &str, sha: &str, force: bool) -> Result<()>;

    /// Blob hash of `path` on `branch`, or `None` when the file does not exist there.
    fn get_file_sha(&self, path: &str, branch: &str) -> Result<Option<String>>;

    /// Creates or updates a file, returning the new commit hash.
    fn put_file(&self, write: &FileWrite<'_>) -> Result<String>;

    fn create_pull_request(&self, draft: &PullRequestDraft<'_>) -> Result<PullRequest>;
}
