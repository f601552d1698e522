//! Stream live feed events to the terminal.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use waf_live::{EventKind, HandlerError, LiveClient, LiveConfig, LiveEvent, LiveStore, handler};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Watch command executor.
pub struct WatchCommand {
    config: LiveConfig,
}

impl WatchCommand {
    /// Create a new watch command.
    #[must_use]
    pub const fn new(config: LiveConfig) -> Self {
        Self { config }
    }

    /// Print events until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connect fails, reconnection gives
    /// up, or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        token: &str,
    ) -> Result<(), CliError> {
        self.execute_until(writer, format, token, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Print events until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_until<W, S>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        token: &str,
        shutdown: S,
    ) -> Result<(), CliError>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        let client = LiveClient::from_config(&self.config)?;
        let store = LiveStore::new(self.config.buffers);
        let _binding = store.bind(client.dispatcher());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let forward = handler(move |event: &LiveEvent| {
            tx.send(event.clone())
                .map_err(|_| HandlerError::from("output closed"))
        });
        for kind in EventKind::ALL {
            client.on(kind, Arc::clone(&forward));
        }

        tokio::pin!(shutdown);
        let result: Result<(), CliError> = async {
            tokio::select! {
                biased;
                () = &mut shutdown => return Ok(()),
                connected = client.connect(token) => connected?,
            }
            info!(endpoint = %self.config.endpoint, "watching live feed");

            loop {
                tokio::select! {
                    biased;
                    () = &mut shutdown => return Ok(()),
                    event = rx.recv() => {
                        let Some(event) = event else { return Ok(()) };
                        format.write_event(writer, &event)?;
                        writer.flush()?;
                        if let LiveEvent::Failed { attempts, last_error } = event {
                            return Err(CliError::Feed(format!(
                                "gave up after {attempts} attempts: {last_error}"
                            )));
                        }
                    }
                }
            }
        }
        .await;

        for kind in EventKind::ALL {
            client.off(kind, &forward);
        }
        client.disconnect();
        info!(state = %client.state(), "live feed closed");
        result
    }
}
