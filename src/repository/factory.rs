use crate::error::Result;
use crate::repository::{GitHubClient, RemoteRepository, RepoCoordinates};
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_github(
        api_url: &str,
        token: &str,
        coordinates: RepoCoordinates,
    ) -> Result<Arc<dyn RemoteRepository>> {
        let client = GitHubClient::new(api_url, token, coordinates)?;
        Ok(Arc::new(client))
    }
}
