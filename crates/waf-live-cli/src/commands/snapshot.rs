//! Print the dashboard view after a short look at the feed.

use std::io::Write;
use std::time::Duration;

use tracing::{info, warn};
use waf_live::{DashboardApi, DashboardView, LiveClient, LiveConfig, LiveStore};

use crate::cli::SnapshotArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Snapshot command executor.
pub struct SnapshotCommand {
    config: LiveConfig,
}

impl SnapshotCommand {
    /// Create a new snapshot command.
    #[must_use]
    pub const fn new(config: LiveConfig) -> Self {
        Self { config }
    }

    /// Collect and print the view.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be opened or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &SnapshotArgs,
    ) -> Result<(), CliError> {
        let view = self.collect(args).await?;
        format.write(writer, &view)?;
        Ok(())
    }

    /// Seed, follow the feed for `args.seconds`, and return the view.
    ///
    /// A failed seed is logged and the feed is still followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be opened.
    pub async fn collect(&self, args: &SnapshotArgs) -> Result<DashboardView, CliError> {
        let store = LiveStore::new(self.config.buffers);

        if !args.no_seed {
            let api = DashboardApi::new(self.config.api_base()?, args.token.clone());
            if let Err(e) = api.seed(&store, args.hours).await {
                warn!(error = %e, "snapshot seed failed, continuing with the live feed");
            }
        }

        if args.seconds > 0 {
            let client = LiveClient::from_config(&self.config)?;
            let binding = store.bind(client.dispatcher());
            let connected = client.connect(&args.token).await;
            if connected.is_ok() {
                info!(seconds = args.seconds, "following live feed");
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
                    _ = tokio::signal::ctrl_c() => info!("interrupted"),
                }
            }
            binding.unbind();
            client.disconnect();
            connected?;
        }

        Ok(store.snapshot())
    }
}
