use crate::error::{ChartBumpError, Result};
use crate::repository::{
    FileWrite, PullRequest, PullRequestDraft, RemoteRepository, RepoCoordinates,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("chartbump/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client scoped to a single repository.
pub struct GitHubClient {
    client: Client,
    base_url: Url,
    coordinates: RepoCoordinates,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, coordinates: RepoCoordinates) -> Result<Self> {
        let base_url = Self::validate_api_url(api_url)?;
        let client = Self::build_client(token)?;

        Ok(Self {
            client,
            base_url,
            coordinates,
        })
    }

    fn build_client(token: &str) -> Result<Client> {
        if token.trim().is_empty() {
            return Err(ChartBumpError::InputValidation(
                "an API token is required".to_string(),
            ));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            ChartBumpError::InputValidation("token contains invalid characters".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        Ok(Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?)
    }

    fn validate_api_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|_| ChartBumpError::InputValidation(format!("Invalid API URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(ChartBumpError::InputValidation(format!(
                    "Unsupported API URL scheme: {scheme}"
                )));
            }
        }

        if parsed.cannot_be_a_base() {
            return Err(ChartBumpError::InputValidation(format!(
                "API URL cannot be used as a base: {url}"
            )));
        }

        Ok(parsed)
    }

    /// `{base}/repos/{owner}/{name}/{segments...}`; each `/`-separated piece is escaped on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ChartBumpError::InputValidation(format!("Invalid API URL: {}", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend([
                "repos",
                self.coordinates.owner.as_str(),
                self.coordinates.name.as_str(),
            ]);
            path.extend(
                segments
                    .iter()
                    .copied()
                    .flat_map(|segment| segment.split('/'))
                    .filter(|piece| !piece.is_empty()),
            );
        }
        Ok(url)
    }

    fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .map_err(|e| ChartBumpError::remote(operation, None, e.to_string()))?;
        debug!(operation, status = %response.status(), "remote call finished");
        Ok(response)
    }

    fn expect_json<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
        let response = Self::expect_success(operation, response)?;
        response
            .json::<T>()
            .map_err(|e| ChartBumpError::remote(operation, None, format!("unexpected response: {e}")))
    }

    fn expect_success(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|err| err.message)
            .unwrap_or(body);

        Err(ChartBumpError::remote(
            operation,
            Some(status.as_u16()),
            message,
        ))
    }
}

impl RemoteRepository for GitHubClient {
    fn get_ref(&self, reference: &str) -> Result<String> {
        let url = self.endpoint(&["git", "ref", reference])?;
        let response = self.send("get-ref", self.client.get(url))?;
        let git_ref: GitRef = Self::expect_json("get-ref", response)?;
        Ok(git_ref.object.sha)
    }

    fn create_ref(&self, reference: &str, sha: &str) -> Result<()> {
        let url = self.endpoint(&["git", "refs"])?;
        let body = CreateRefBody {
            git_ref: format!("refs/{reference}"),
            sha,
        };
        let response = self.send("create-ref", self.client.post(url).json(&body))?;
        Self::expect_success("create-ref", response)?;
        Ok(())
    }

    fn update_ref(&self, reference: &str, sha: &str, force: bool) -> Result<()> {
        let url = self.endpoint(&["git", "refs", reference])?;
        let body = UpdateRefBody { sha, force };
        let response = self.send("update-ref", self.client.patch(url).json(&body))?;
        Self::expect_success("update-ref", response)?;
        Ok(())
    }

    fn get_file_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        let mut url = self.endpoint(&["contents", path])?;
        url.query_pairs_mut().append_pair("ref", branch);

        let response = self.send("get-content", self.client.get(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let content: ContentEntry = Self::expect_json("get-content", response)?;
        Ok(Some(content.sha))
    }

    fn put_file(&self, write: &FileWrite<'_>) -> Result<String> {
        let url = self.endpoint(&["contents", write.path])?;
        let identity = Signature {
            name: &write.identity.name,
            email: &write.identity.email,
        };
        let body = PutContentBody {
            message: write.message,
            content: STANDARD.encode(write.content),
            branch: write.branch,
            sha: write.sha,
            committer: identity.clone(),
            author: identity,
        };

        let response = self.send("put-content", self.client.put(url).json(&body))?;
        let written: PutContentResponse = Self::expect_json("put-content", response)?;
        Ok(written.commit.sha)
    }

    fn create_pull_request(&self, draft: &PullRequestDraft<'_>) -> Result<PullRequest> {
        let url = self.endpoint(&["pulls"])?;
        let body = CreatePullBody {
            title: draft.title,
            body: draft.body,
            head: draft.head,
            base: draft.base,
        };
        let response = self.send("create-pull-request", self.client.post(url).json(&body))?;
        let pull: PullResponse = Self::expect_json("create-pull-request", response)?;
        Ok(PullRequest {
            number: pull.number,
            html_url: pull.html_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    commit: GitObject,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Signature<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PutContentBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    committer: Signature<'a>,
    author: Signature<'a>,
}

#[derive(Debug, Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotIdentity;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(server: &Server) -> GitHubClient {
        GitHubClient::new(&server.url(), "secret", RepoCoordinates::new("acme", "charts")).unwrap()
    }

    #[test]
    fn rejects_invalid_scheme() {
        let err = GitHubClient::validate_api_url("ftp://example.com").unwrap_err();
        assert!(matches!(err, ChartBumpError::InputValidation(_)));
    }

    #[test]
    fn rejects_empty_token() {
        let result = GitHubClient::new(
            "https://api.github.com",
            " ",
            RepoCoordinates::new("acme", "charts"),
        );
        assert!(matches!(result, Err(ChartBumpError::InputValidation(_))));
    }

    #[test]
    fn endpoint_keeps_enterprise_prefix_and_escapes_segments() {
        let client = GitHubClient::new(
            "https://ghe.example.com/api/v3/",
            "secret",
            RepoCoordinates::new("acme", "charts"),
        )
        .unwrap();
        let url = client.endpoint(&["contents", "svc a/Chart.yaml"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/acme/charts/contents/svc%20a/Chart.yaml"
        );
    }

    #[test]
    fn get_ref_returns_commit_sha() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/repos/acme/charts/git/ref/heads/master")
            .match_header("authorization", "Bearer secret")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(json!({"ref": "refs/heads/master", "object": {"sha": "abc123"}}).to_string())
            .create();

        assert_eq!(client(&server).get_ref("heads/master").unwrap(), "abc123");
        mock.assert();
    }

    #[test]
    fn get_ref_maps_not_found_to_remote_error() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/charts/git/ref/heads/missing")
            .with_status(404)
            .with_body(json!({"message": "Not Found"}).to_string())
            .create();

        let err = client(&server).get_ref("heads/missing").unwrap_err();
        match err {
            ChartBumpError::RemoteApi {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, "get-ref");
                assert_eq!(status, Some(404));
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn create_ref_posts_full_reference() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/repos/acme/charts/git/refs")
            .match_body(Matcher::Json(json!({"ref": "refs/heads/update/db-1.1.0", "sha": "abc123"})))
            .with_status(201)
            .with_body("{}")
            .create();

        client(&server)
            .create_ref("heads/update/db-1.1.0", "abc123")
            .unwrap();
        mock.assert();
    }

    #[test]
    fn create_ref_conflict_is_detectable() {
        let mut server = Server::new();
        server
            .mock("POST", "/repos/acme/charts/git/refs")
            .with_status(422)
            .with_body(json!({"message": "Reference already exists"}).to_string())
            .create();

        let err = client(&server).create_ref("heads/x", "abc").unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn update_ref_patches_with_force() {
        let mut server = Server::new();
        let mock = server
            .mock("PATCH", "/repos/acme/charts/git/refs/heads/update/db-1.1.0")
            .match_body(Matcher::Json(json!({"sha": "abc123", "force": true})))
            .with_status(200)
            .with_body("{}")
            .create();

        client(&server)
            .update_ref("heads/update/db-1.1.0", "abc123", true)
            .unwrap();
        mock.assert();
    }

    #[test]
    fn get_file_sha_returns_none_when_missing() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/charts/contents/svc/Chart.yaml")
            .match_query(Matcher::UrlEncoded("ref".into(), "update/db".into()))
            .with_status(404)
            .with_body(json!({"message": "Not Found"}).to_string())
            .create();

        assert_eq!(
            client(&server)
                .get_file_sha("svc/Chart.yaml", "update/db")
                .unwrap(),
            None
        );
    }

    #[test]
    fn get_file_sha_reads_blob_sha() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/charts/contents/svc/Chart.yaml")
            .match_query(Matcher::UrlEncoded("ref".into(), "update/db".into()))
            .with_status(200)
            .with_body(json!({"type": "file", "sha": "blob1"}).to_string())
            .create();

        assert_eq!(
            client(&server)
                .get_file_sha("svc/Chart.yaml", "update/db")
                .unwrap()
                .as_deref(),
            Some("blob1")
        );
    }

    #[test]
    fn put_file_sends_base64_content_and_identity() {
        let mut server = Server::new();
        let identity = BotIdentity::default();
        let mock = server
            .mock("PUT", "/repos/acme/charts/contents/svc/Chart.yaml")
            .match_body(Matcher::PartialJson(json!({
                "message": "bump",
                "content": STANDARD.encode("version: 1.1.0\n"),
                "branch": "update/db",
                "sha": "blob1",
                "committer": {"name": identity.name, "email": identity.email},
                "author": {"name": identity.name, "email": identity.email},
            })))
            .with_status(200)
            .with_body(json!({"content": {}, "commit": {"sha": "commit1"}}).to_string())
            .create();

        let write = FileWrite {
            path: "svc/Chart.yaml",
            content: "version: 1.1.0\n",
            message: "bump",
            branch: "update/db",
            sha: Some("blob1"),
            identity: &identity,
        };
        assert_eq!(client(&server).put_file(&write).unwrap(), "commit1");
        mock.assert();
    }

    #[test]
    fn create_pull_request_returns_number_and_url() {
        let mut server = Server::new();
        server
            .mock("POST", "/repos/acme/charts/pulls")
            .match_body(Matcher::Json(json!({
                "title": "[chartbump] Update db to 1.1.0",
                "body": "body",
                "head": "update/db-1.1.0",
                "base": "master",
            })))
            .with_status(201)
            .with_body(json!({"number": 7, "html_url": "https://github.com/acme/charts/pull/7"}).to_string())
            .create();

        let pull = client(&server)
            .create_pull_request(&PullRequestDraft {
                title: "[chartbump] Update db to 1.1.0",
                body: "body",
                head: "update/db-1.1.0",
                base: "master",
            })
            .unwrap();
        assert_eq!(pull.number, 7);
        assert_eq!(pull.html_url, "https://github.com/acme/charts/pull/7");
    }
}
