//! REST snapshot client used to seed the store before the feed catches up.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;
use waf_proto::{ApiResponse, AttackEvent, StatsSnapshot, StatusSnapshot, TrafficSample};

use crate::error::LiveError;
use crate::store::LiveStore;

/// Client for the dashboard REST endpoints.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    http: Client,
    base: Url,
    credential: String,
}

impl DashboardApi {
    /// Create a client for `base` (e.g. `http://localhost:8080/api`).
    #[must_use]
    pub fn new(base: Url, credential: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base, credential)
    }

    /// Create a client sharing `http`.
    #[must_use]
    pub fn with_client(http: Client, base: Url, credential: impl Into<String>) -> Self {
        Self {
            http,
            base,
            credential: credential.into(),
        }
    }

    /// `GET /dashboard/status`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or an
    /// unsuccessful envelope.
    pub async fn status(&self) -> Result<StatusSnapshot, LiveError> {
        self.get("dashboard/status", &[]).await
    }

    /// `GET /dashboard/stats`.
    ///
    /// # Errors
    ///
    /// See [`status`](Self::status).
    pub async fn stats(&self) -> Result<StatsSnapshot, LiveError> {
        self.get("dashboard/stats", &[]).await
    }

    /// `GET /dashboard/attacks?limit=N`, newest first.
    ///
    /// # Errors
    ///
    /// See [`status`](Self::status).
    pub async fn recent_attacks(&self, limit: usize) -> Result<Vec<AttackEvent>, LiveError> {
        self.get("dashboard/attacks", &[("limit", limit.to_string())])
            .await
    }

    /// `GET /dashboard/traffic?hours=N`, oldest first.
    ///
    /// # Errors
    ///
    /// See [`status`](Self::status).
    pub async fn traffic(&self, hours: u32) -> Result<Vec<TrafficSample>, LiveError> {
        self.get("dashboard/traffic", &[("hours", hours.to_string())])
            .await
    }

    /// Fetch every snapshot and seed `store`.
    ///
    /// # Errors
    ///
    /// Returns the first failed request; the store is left untouched.
    pub async fn seed(&self, store: &LiveStore, hours: u32) -> Result<(), LiveError> {
        let view = store.snapshot();
        let (status, stats, attacks, traffic) = tokio::try_join!(
            self.status(),
            self.stats(),
            self.recent_attacks(view.attacks.capacity()),
            self.traffic(hours),
        )?;
        info!(
            attacks = attacks.len(),
            samples = traffic.len(),
            "seeding dashboard from snapshot"
        );
        store.seed_status(status);
        store.seed_stats(stats);
        store.seed_attacks(attacks);
        store.seed_traffic(traffic);
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, LiveError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| LiveError::Config(format!("api_url cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, LiveError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "fetching snapshot");
        let envelope: ApiResponse<T> = self
            .http
            .get(url)
            .bearer_auth(&self.credential)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.into_data()?)
    }
}
