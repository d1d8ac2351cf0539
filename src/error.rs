use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartBumpError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Workspace scan failed: {0}")]
    Scan(String),

    #[error("Cannot patch descriptor: {0}")]
    Descriptor(String),

    #[error("{operation} failed{}: {message}", status_suffix(.status))]
    RemoteApi {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("None of the {0} changed file(s) could be committed")]
    NothingCommitted(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] yaml_rust2::ScanError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChartBumpError {
    pub fn remote(
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        ChartBumpError::RemoteApi {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// True when the remote host rejected a write because the target already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ChartBumpError::RemoteApi {
                status: Some(409 | 422),
                ..
            }
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ChartBumpError>;
