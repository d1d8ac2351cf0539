use crate::config::{DEFAULT_API_URL, DEFAULT_BASE_BRANCH, UpdateRequest};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "chartbump",
    about = "Bump a dependency version across Helm charts and helmfiles, then open a pull request",
    version,
    author
)]
pub struct Cli {
    /// Workspace root holding the chart directories
    #[arg(short, long, env = "GITHUB_WORKSPACE", default_value = ".", global = true)]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log filter directives (tracing-subscriber EnvFilter syntax)
    #[arg(long, env = "CHARTBUMP_LOG", default_value = "chartbump=info", global = true)]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Patch descriptors, commit them to a new branch and open a pull request
    Update {
        #[command(flatten)]
        target: TargetArgs,

        /// Token used to authenticate against the hosting API
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Target repository as owner/name (defaults to GITHUB_REPOSITORY)
        #[arg(long, env = "INPUT_REPOSITORY")]
        repository: Option<String>,

        /// Branch the update branch starts from and the pull request targets
        #[arg(long, env = "INPUT_BASE_BRANCH", default_value = DEFAULT_BASE_BRANCH)]
        base_branch: String,

        /// Base URL of the hosting REST API
        #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Force-move the update branch to the base tip when it already exists
        #[arg(long, env = "INPUT_RESET_EXISTING_BRANCH")]
        reset_existing_branch: bool,
    },

    /// Report which descriptors would change without writing anything
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Name of the chart dependency or helmfile release to bump
    #[arg(short, long, env = "INPUT_DEPENDENCY")]
    pub dependency: String,

    /// Version to set on every matching entry
    #[arg(short = 't', long, env = "INPUT_VERSION")]
    pub target_version: String,

    /// Only scan top-level directories whose name starts with this prefix
    #[arg(long, env = "INPUT_PREFIX", default_value = "")]
    pub prefix: String,

    /// Only scan this exact top-level directory (takes precedence over --prefix)
    #[arg(long, env = "INPUT_DIRECTORY")]
    pub directory: Option<String>,

    /// Also scan nested directories below each selected directory
    #[arg(short, long, env = "INPUT_RECURSIVE")]
    pub recursive: bool,
}

impl From<TargetArgs> for UpdateRequest {
    fn from(args: TargetArgs) -> Self {
        UpdateRequest::new(args.dependency.trim(), args.target_version.trim())
            .with_prefix(args.prefix)
            .with_directory(args.directory)
            .with_recursive(args.recursive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_command() {
        let cli = Cli::try_parse_from([
            "chartbump",
            "update",
            "--dependency",
            "db",
            "--target-version",
            "1.1.0",
            "--token",
            "t",
            "--repository",
            "acme/charts",
            "--prefix",
            "svc",
            "--recursive",
        ])
        .unwrap();

        match cli.command {
            Commands::Update {
                target,
                repository,
                base_branch,
                ..
            } => {
                assert_eq!(repository.as_deref(), Some("acme/charts"));
                assert_eq!(base_branch, "master");
                let request = UpdateRequest::from(target);
                assert_eq!(request.dependency, "db");
                assert_eq!(request.version, "1.1.0");
                assert_eq!(request.prefix, "svc");
                assert!(request.recursive);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_check_command_with_directory() {
        let cli = Cli::try_parse_from([
            "chartbump",
            "--path",
            "/work",
            "check",
            "-d",
            "db",
            "-t",
            "1.0.0",
            "--directory",
            "api",
        ])
        .unwrap();

        assert_eq!(cli.path, "/work");
        match cli.command {
            Commands::Check { target } => {
                let request = UpdateRequest::from(target);
                assert_eq!(request.directory.as_deref(), Some("api"));
                assert_eq!(request.scope(), Some("api"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
