use crate::error::{ChartBumpError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const OUTPUT_DELIMITER: &str = "CHARTBUMP_EOF";

/// Workflow-command channel to the CI host (annotations, step outputs, job summary).
///
/// Outside a GitHub Actions runner every method is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ActionsHost {
    enabled: bool,
    output_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
}

impl ActionsHost {
    pub fn from_env() -> Self {
        let file_var = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        Self {
            enabled: std::env::var("GITHUB_ACTIONS").is_ok_and(|value| value == "true"),
            output_file: file_var("GITHUB_OUTPUT"),
            summary_file: file_var("GITHUB_STEP_SUMMARY"),
        }
    }

    #[cfg(test)]
    pub fn with_files(output_file: Option<PathBuf>, summary_file: Option<PathBuf>) -> Self {
        Self {
            enabled: true,
            output_file,
            summary_file,
        }
    }

    pub fn notice(&self, message: &str) {
        self.command("notice", message);
    }

    pub fn warning(&self, message: &str) {
        self.command("warning", message);
    }

    pub fn error(&self, message: &str) {
        self.command("error", message);
    }

    fn command(&self, level: &str, message: &str) {
        if self.enabled {
            println!("{}", format_command(level, message));
        }
    }

    /// Appends `name` to the step outputs file, using the heredoc form so values may span lines.
    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        let Some(path) = &self.output_file else {
            return Ok(());
        };

        if value.lines().any(|line| line == OUTPUT_DELIMITER) {
            return Err(ChartBumpError::InputValidation(format!(
                "output '{name}' contains the reserved delimiter"
            )));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{name}<<{OUTPUT_DELIMITER}")?;
        writeln!(file, "{value}")?;
        writeln!(file, "{OUTPUT_DELIMITER}")?;
        Ok(())
    }

    pub fn append_summary(&self, markdown: &str) -> Result<()> {
        let Some(path) = &self.summary_file else {
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{markdown}")?;
        Ok(())
    }
}

fn format_command(level: &str, message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::{level}::{escaped}")
}
