//! Write a sample configuration file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use waf_live::LiveConfig;

use crate::error::CliError;

/// Init-config command executor.
pub struct InitConfigCommand {
    output: PathBuf,
    force: bool,
}

impl InitConfigCommand {
    /// Create a new init-config command.
    #[must_use]
    pub fn new(output: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            output: output.into(),
            force,
        }
    }

    /// Write the default configuration to the output path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists and `force` is unset, or the
    /// write fails.
    pub fn execute<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if !self.force && self.output.exists() {
            return Err(CliError::Config(format!(
                "{} already exists (use --force to overwrite)",
                self.output.display()
            )));
        }
        write_sample(&self.output)?;
        info!(path = %self.output.display(), "wrote sample config");
        writeln!(writer, "Wrote {}", self.output.display())?;
        Ok(())
    }
}

fn write_sample(path: &Path) -> Result<(), CliError> {
    let body = LiveConfig::default().to_toml()?;
    let header = "# waf-live configuration\n\
                  # Environment overrides: WAF_LIVE_ENDPOINT, WAF_LIVE_API_URL, WAF_LIVE_TRANSPORT\n\n";
    std::fs::write(path, format!("{header}{body}"))?;
    Ok(())
}
