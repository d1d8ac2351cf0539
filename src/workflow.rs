use crate::agents::{
    AggregateOutcome, ChangeAggregator, ChartScannerAgent, PublishDriver, PublishReport,
    ScanOptions,
};
use crate::config::{PublishConfig, UpdateRequest};
use crate::error::{ChartBumpError, Result};
use crate::repository::{RemoteRepository, RepoCoordinates, RepositoryFactory};
use crate::utils::actions::ActionsHost;
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Remote-side inputs of the `update` command.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub token: Option<String>,
    pub repository: Option<String>,
    pub base_branch: String,
    pub api_url: String,
    pub reset_existing_branch: bool,
}

/// How an update run ended.
#[derive(Debug)]
pub enum UpdateOutcome {
    NoUpdateNeeded,
    Published(PublishReport),
}

/// Execute the update workflow - patch, commit to a new branch, open a pull request
pub fn execute_update<P: AsRef<Path>>(
    workspace: P,
    request: UpdateRequest,
    remote_options: RemoteOptions,
    host: &ActionsHost,
) -> Result<()> {
    println!(
        "{}",
        format!(
            "Updating {} to {} in chart descriptors...",
            request.dependency, request.version
        )
        .cyan()
        .bold()
    );

    // All inputs are checked before the first remote call.
    request.validate()?;
    let workspace = PathValidator::validate_workspace_path(workspace)?;
    let token = remote_options
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            ChartBumpError::InputValidation(
                "an API token is required (--token or GITHUB_TOKEN)".to_string(),
            )
        })?;
    let coordinates = resolve_repository(
        remote_options.repository,
        std::env::var("GITHUB_REPOSITORY").ok(),
    )?;
    if remote_options.base_branch.trim().is_empty() {
        return Err(ChartBumpError::InputValidation(
            "base branch must not be empty".to_string(),
        ));
    }

    println!("   Target repository: {}", coordinates.to_string().bright_cyan());
    let remote = RepositoryFactory::create_github(&remote_options.api_url, &token, coordinates)?;
    let config = PublishConfig::new(remote_options.base_branch.trim())
        .with_reset_existing_branch(remote_options.reset_existing_branch);

    match run_update(&workspace, &request, remote, config, host)? {
        UpdateOutcome::NoUpdateNeeded => Ok(()),
        UpdateOutcome::Published(report) => {
            report_outputs(&request, &report, host)?;
            Ok(())
        }
    }
}

/// Scan, aggregate and publish against an already constructed remote.
pub fn run_update(
    workspace: &Path,
    request: &UpdateRequest,
    remote: Arc<dyn RemoteRepository>,
    config: PublishConfig,
    host: &ActionsHost,
) -> Result<UpdateOutcome> {
    let outcome = scan_and_aggregate(workspace, request, true, host)?;

    if outcome.is_empty() {
        let message = format!(
            "No update needed: no descriptor pins {} to a version other than {}",
            request.dependency, request.version
        );
        println!("\n{}", message.yellow());
        host.notice(&message);
        return Ok(UpdateOutcome::NoUpdateNeeded);
    }

    println!(
        "\n{}",
        format!(
            "3. Publishing {} file(s) against base branch '{}'...",
            outcome.file_changes.len(),
            config.base_branch
        )
        .yellow()
    );
    let driver = PublishDriver::new(remote, config);
    let report = driver.publish(&outcome, request)?;

    println!("{}", format!("✓ Branch {} created", report.branch).green());
    for failure in &report.failed {
        let message = format!(
            "{} was not committed: {}",
            failure.relative_path, failure.reason
        );
        println!("   {} {}", "!".red().bold(), message);
        host.warning(&message);
    }
    println!(
        "{}",
        format!(
            "✓ Opened pull request #{}: {}",
            report.pull_request.number, report.pull_request.html_url
        )
        .green()
    );

    print_update_summary(request, &outcome, &report);
    Ok(UpdateOutcome::Published(report))
}

/// Execute the check workflow - report would-be changes without writing anything
pub fn execute_check<P: AsRef<Path>>(
    workspace: P,
    request: UpdateRequest,
    host: &ActionsHost,
) -> Result<()> {
    println!(
        "{}",
        format!(
            "Checking {} against {} in chart descriptors...",
            request.dependency, request.version
        )
        .cyan()
        .bold()
    );

    request.validate()?;
    let workspace = PathValidator::validate_workspace_path(workspace)?;
    let outcome = scan_and_aggregate(&workspace, &request, false, host)?;

    if outcome.is_empty() {
        println!("\n{}", "No update needed".yellow());
        return Ok(());
    }

    println!("\n{}", "Pending changes:".cyan().bold());
    for change in &outcome.file_changes {
        println!(
            "  • {} {} → {}",
            change.relative_path.white().bold(),
            change.old_version.as_deref().unwrap_or("(unset)").red(),
            request.version.green()
        );
    }
    Ok(())
}

fn scan_and_aggregate(
    workspace: &Path,
    request: &UpdateRequest,
    write_back: bool,
    host: &ActionsHost,
) -> Result<AggregateOutcome> {
    println!("\n{}", "1. Scanning chart directories...".yellow());
    let scanner = ChartScannerAgent::new(workspace);
    let entries = scanner.scan(&ScanOptions::from(request))?;
    println!("   Found {} descriptor file(s)", entries.len());

    println!("\n{}", "2. Checking descriptors...".yellow());
    let outcome = ChangeAggregator::new(workspace)
        .with_write_back(write_back)
        .aggregate(&entries, &request.dependency, &request.version);

    for skipped in &outcome.skipped {
        let message = format!("Skipped {}: {}", skipped.relative_path, skipped.reason);
        println!("   {} {}", "!".yellow().bold(), message);
        host.warning(&message);
    }
    println!(
        "{}",
        format!(
            "✓ {} file(s) in {} director(ies) need an update",
            outcome.file_changes.len(),
            outcome.changed_directories.len()
        )
        .green()
    );
    info!(
        changed = outcome.file_changes.len(),
        skipped = outcome.skipped.len(),
        "descriptors checked"
    );

    Ok(outcome)
}

/// Picks the explicit `owner/name`, else the host-provided current repository.
pub fn resolve_repository(
    explicit: Option<String>,
    current: Option<String>,
) -> Result<RepoCoordinates> {
    let value = explicit
        .filter(|value| !value.trim().is_empty())
        .or(current.filter(|value| !value.trim().is_empty()))
        .ok_or_else(|| {
            ChartBumpError::InputValidation(
                "target repository is required (--repository or GITHUB_REPOSITORY)".to_string(),
            )
        })?;
    value.parse()
}

fn print_update_summary(
    request: &UpdateRequest,
    outcome: &AggregateOutcome,
    report: &PublishReport,
) {
    println!("\n{}", "Update Summary:".cyan().bold());
    let directories: Vec<&str> = outcome
        .changed_directories
        .iter()
        .map(String::as_str)
        .collect();
    println!(
        "{}",
        format!(
            "Updated {} to {} in: {}",
            request.dependency,
            request.version,
            directories.join(", ")
        )
        .green()
    );

    if report.is_partial() {
        println!(
            "{}",
            format!(
                "{} of {} file(s) could not be committed; the pull request is incomplete",
                report.failed.len(),
                report.failed.len() + report.committed.len()
            )
            .red()
            .bold()
        );
    }
}

fn report_outputs(
    request: &UpdateRequest,
    report: &PublishReport,
    host: &ActionsHost,
) -> Result<()> {
    host.set_output("branch", &report.branch)?;
    host.set_output("pull-request-url", &report.pull_request.html_url)?;
    host.set_output(
        "pull-request-number",
        &report.pull_request.number.to_string(),
    )?;

    let directories: Vec<String> = report
        .committed
        .iter()
        .filter_map(|path| path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    host.set_output("updated-directories", &directories.join("\n"))?;

    let mut summary = format!(
        "### {} → {}\n\nPull request: [#{}]({})\n\n",
        request.dependency,
        request.version,
        report.pull_request.number,
        report.pull_request.html_url
    );
    for path in &report.committed {
        let _ = writeln!(summary, "- `{path}`");
    }
    for failure in &report.failed {
        let _ = writeln!(
            summary,
            "- `{}` (not committed: {})",
            failure.relative_path, failure.reason
        );
    }
    host.append_summary(&summary)
}
