use crate::agents::change_aggregator::{AggregateOutcome, FileChange};
use crate::config::{PublishConfig, UpdateRequest};
use crate::error::{ChartBumpError, Result};
use crate::repository::{FileWrite, PullRequest, PullRequestDraft, RemoteRepository};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_BRANCH_LEN: usize = 100;

/// A staged file whose remote commit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub relative_path: String,
    pub reason: String,
}

/// What a publish run left on the remote host.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub branch: String,
    pub committed: Vec<String>,
    pub failed: Vec<CommitFailure>,
    pub pull_request: PullRequest,
}

impl PublishReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// PublishDriver pushes staged descriptor changes to a new branch and opens a pull request.
///
/// The three steps run in order with no rollback. A branch whose commits
/// only partly succeeded is left in place and the failures are reported.
pub struct PublishDriver {
    remote: Arc<dyn RemoteRepository>,
    config: PublishConfig,
}

impl PublishDriver {
    pub fn new(remote: Arc<dyn RemoteRepository>, config: PublishConfig) -> Self {
        Self { remote, config }
    }

    /// Full workflow: create branch, commit every change, open the pull request.
    pub fn publish(
        &self,
        outcome: &AggregateOutcome,
        request: &UpdateRequest,
    ) -> Result<PublishReport> {
        let branch = branch_name_for(request);

        self.create_branch(&branch)?;
        let (committed, failed) = self.commit_changes(&outcome.file_changes, request, &branch);

        if committed.is_empty() {
            return Err(ChartBumpError::NothingCommitted(outcome.file_changes.len()));
        }

        let pull_request = self.open_pull_request(outcome, request, &branch, &failed)?;

        Ok(PublishReport {
            branch,
            committed,
            failed,
            pull_request,
        })
    }

    /// Points a new branch at the tip of the base branch.
    fn create_branch(&self, branch: &str) -> Result<()> {
        let base_sha = self
            .remote
            .get_ref(&format!("heads/{}", self.config.base_branch))?;
        let reference = format!("heads/{branch}");

        match self.remote.create_ref(&reference, &base_sha) {
            Ok(()) => {
                info!(branch, base = %self.config.base_branch, sha = %base_sha, "created branch");
                Ok(())
            }
            Err(e) if e.is_conflict() && self.config.reset_existing_branch => {
                warn!(branch, "branch already exists, resetting it to the base tip");
                self.remote.update_ref(&reference, &base_sha, true)
            }
            Err(e) => Err(e),
        }
    }

    /// Commits changes one at a time; a failing file is logged and the rest still go out.
    fn commit_changes(
        &self,
        changes: &[FileChange],
        request: &UpdateRequest,
        branch: &str,
    ) -> (Vec<String>, Vec<CommitFailure>) {
        let mut committed = Vec::new();
        let mut failed = Vec::new();

        for change in changes {
            match self.commit_file(change, request, branch) {
                Ok(commit_sha) => {
                    info!(file = %change.relative_path, commit = %commit_sha, "committed file");
                    committed.push(change.relative_path.clone());
                }
                Err(e) => {
                    warn!(file = %change.relative_path, error = %e, "failed to commit file");
                    failed.push(CommitFailure {
                        relative_path: change.relative_path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (committed, failed)
    }

    fn commit_file(
        &self,
        change: &FileChange,
        request: &UpdateRequest,
        branch: &str,
    ) -> Result<String> {
        let current_sha = self.remote.get_file_sha(&change.relative_path, branch)?;
        let message = commit_message(request, change);

        self.remote.put_file(&FileWrite {
            path: &change.relative_path,
            content: &change.new_content,
            message: &message,
            branch,
            sha: current_sha.as_deref(),
            identity: &self.config.identity,
        })
    }

    fn open_pull_request(
        &self,
        outcome: &AggregateOutcome,
        request: &UpdateRequest,
        branch: &str,
        failed: &[CommitFailure],
    ) -> Result<PullRequest> {
        let title = format!(
            "{} Update {} to {}",
            self.config.title_marker, request.dependency, request.version
        );
        let body = pull_request_body(outcome, request, failed);

        let pull_request = self.remote.create_pull_request(&PullRequestDraft {
            title: &title,
            body: &body,
            head: branch,
            base: &self.config.base_branch,
        })?;
        info!(number = pull_request.number, url = %pull_request.html_url, "opened pull request");
        Ok(pull_request)
    }
}

/// Deterministic branch for a request: same inputs, same branch.
pub fn branch_name_for(request: &UpdateRequest) -> String {
    let raw = match request.scope() {
        Some(scope) => format!("update/{}-{}-{}", request.dependency, request.version, scope),
        None => format!("update/{}-{}", request.dependency, request.version),
    };

    let mut branch: String = raw
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '/' | '.' => c,
            _ => '-',
        })
        .collect();

    while branch.contains("..") {
        branch = branch.replace("..", ".");
    }
    while branch.contains("//") {
        branch = branch.replace("//", "/");
    }

    if branch.len() > MAX_BRANCH_LEN {
        branch.truncate(MAX_BRANCH_LEN);
    }

    let trimmed = branch.trim_end_matches(['.', '/']);
    let trimmed = trimmed.strip_suffix(".lock").unwrap_or(trimmed);

    // Ref components must not start with a dot.
    trimmed
        .split('/')
        .map(|component| match component.strip_prefix('.') {
            Some(rest) => format!("-{rest}"),
            None => component.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn commit_message(request: &UpdateRequest, change: &FileChange) -> String {
    match &change.old_version {
        Some(old) => format!(
            "chore(deps): update {} from {} to {} in {}",
            request.dependency, old, request.version, change.relative_path
        ),
        None => format!(
            "chore(deps): update {} to {} in {}",
            request.dependency, request.version, change.relative_path
        ),
    }
}

pub fn pull_request_body(
    outcome: &AggregateOutcome,
    request: &UpdateRequest,
    failed: &[CommitFailure],
) -> String {
    let mut body = format!(
        "Updates `{}` to version `{}` in the following directories:\n\n",
        request.dependency, request.version
    );

    for directory in &outcome.changed_directories {
        match outcome.old_version_for(directory) {
            Some(old) => {
                let _ = writeln!(body, "- {directory} (old version: {old})");
            }
            None => {
                let _ = writeln!(body, "- {directory}");
            }
        }
    }

    if !failed.is_empty() {
        body.push_str(
            "\n**Not committed:** these files could not be written \
             and are not part of this pull request.\n\n",
        );
        for failure in failed {
            let _ = writeln!(body, "- `{}`: {}", failure.relative_path, failure.reason);
        }
    }

    body
}
