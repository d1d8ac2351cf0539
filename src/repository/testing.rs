//! In-memory remote used by driver and workflow tests.

use crate::error::{ChartBumpError, Result};
use crate::repository::{FileWrite, PullRequest, PullRequestDraft, RemoteRepository};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetRef(String),
    CreateRef(String, String),
    UpdateRef(String, String, bool),
    GetFileSha(String, String),
    PutFile {
        path: String,
        content: String,
        message: String,
        branch: String,
        sha: Option<String>,
        author: String,
    },
    CreatePullRequest {
        title: String,
        body: String,
        head: String,
        base: String,
    },
}

#[derive(Default)]
pub struct FakeRemote {
    pub calls: Mutex<Vec<Call>>,
    pub refs: HashMap<String, String>,
    pub existing_branches: HashSet<String>,
    pub existing_files: HashMap<String, String>,
    pub failing_writes: HashSet<String>,
    pub fail_pull_request: bool,
}

impl FakeRemote {
    pub fn with_base(base: &str, sha: &str) -> Self {
        let mut remote = Self::default();
        remote.refs.insert(format!("heads/{base}"), sha.to_string());
        remote
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::CreatePullRequest { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RemoteRepository for FakeRemote {
    fn get_ref(&self, reference: &str) -> Result<String> {
        self.record(Call::GetRef(reference.to_string()));
        self.refs
            .get(reference)
            .cloned()
            .ok_or_else(|| ChartBumpError::remote("get-ref", Some(404), "Not Found"))
    }

    fn create_ref(&self, reference: &str, sha: &str) -> Result<()> {
        self.record(Call::CreateRef(reference.to_string(), sha.to_string()));
        if self.existing_branches.contains(reference) {
            return Err(ChartBumpError::remote(
                "create-ref",
                Some(422),
                "Reference already exists",
            ));
        }
        Ok(())
    }

    fn update_ref(&self, reference: &str, sha: &str, force: bool) -> Result<()> {
        self.record(Call::UpdateRef(reference.to_string(), sha.to_string(), force));
        Ok(())
    }

    fn get_file_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        self.record(Call::GetFileSha(path.to_string(), branch.to_string()));
        Ok(self.existing_files.get(path).cloned())
    }

    fn put_file(&self, write: &FileWrite<'_>) -> Result<String> {
        self.record(Call::PutFile {
            path: write.path.to_string(),
            content: write.content.to_string(),
            message: write.message.to_string(),
            branch: write.branch.to_string(),
            sha: write.sha.map(str::to_string),
            author: write.identity.name.clone(),
        });
        if self.failing_writes.contains(write.path) {
            return Err(ChartBumpError::remote(
                "put-content",
                Some(409),
                "sha does not match",
            ));
        }
        Ok(format!("commit-{}", write.path))
    }

    fn create_pull_request(&self, draft: &PullRequestDraft<'_>) -> Result<PullRequest> {
        self.record(Call::CreatePullRequest {
            title: draft.title.to_string(),
            body: draft.body.to_string(),
            head: draft.head.to_string(),
            base: draft.base.to_string(),
        });
        if self.fail_pull_request {
            return Err(ChartBumpError::remote(
                "create-pull-request",
                Some(422),
                "Validation Failed",
            ));
        }
        Ok(PullRequest {
            number: 1,
            html_url: "https://github.com/acme/charts/pull/1".to_string(),
        })
    }
}
