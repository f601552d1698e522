//! Reactive dashboard state fed by the live feed.
//!
//! [`LiveStore`] owns a [`DashboardView`] inside a `watch` channel. Bind it
//! to a dispatcher to fold live events in; subscribers are notified on
//! every change.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use waf_proto::{AttackEvent, StatsSnapshot, StatusSnapshot, TrafficSample};

use crate::config::BufferSettings;
use crate::dispatcher::{EventDispatcher, Handler, handler};
use crate::events::{EventKind, LiveEvent};
use crate::projection::{AttackFeed, StatsView, StatusView, TrafficWindow};
use crate::state::LinkIndicator;

/// Everything the dashboard renders from the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// Recent attacks, newest first.
    pub attacks: AttackFeed,
    /// Traffic samples, oldest first.
    pub traffic: TrafficWindow,
    /// Latest aggregate stats.
    pub stats: StatsView,
    /// Current WAF status.
    pub status: StatusView,
    /// Feed health.
    pub link: LinkIndicator,
}

impl DashboardView {
    /// Empty view with the given buffer sizes.
    #[must_use]
    pub fn with_buffers(buffers: BufferSettings) -> Self {
        Self {
            attacks: AttackFeed::with_capacity(buffers.attacks),
            traffic: TrafficWindow::with_capacity(buffers.traffic),
            ..Self::default()
        }
    }

    /// Fold one event into the view. Returns whether anything changed.
    pub fn apply(&mut self, event: &LiveEvent) -> bool {
        match event {
            LiveEvent::AttackBlocked(attack) => self.attacks.push(Arc::clone(attack)),
            LiveEvent::TrafficUpdate(sample) => self.traffic.push(Arc::clone(sample)),
            LiveEvent::StatsUpdate(stats) => self.stats.adopt(Arc::clone(stats)),
            LiveEvent::StatusChange(patch) => self.status.apply(patch),
            LiveEvent::Connected => return self.set_link(LinkIndicator::Live),
            LiveEvent::Reconnecting { .. } => return self.set_link(LinkIndicator::Reconnecting),
            LiveEvent::Disconnected { .. } | LiveEvent::Failed { .. } => {
                return self.set_link(LinkIndicator::Offline);
            }
            LiveEvent::Error { .. } => return false,
        }
        true
    }

    fn set_link(&mut self, link: LinkIndicator) -> bool {
        let changed = self.link != link;
        self.link = link;
        changed
    }
}

/// Shared, observable dashboard state.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct LiveStore {
    tx: Arc<watch::Sender<DashboardView>>,
}

impl Default for LiveStore {
    fn default() -> Self {
        Self::new(BufferSettings::default())
    }
}

impl LiveStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(buffers: BufferSettings) -> Self {
        let (tx, _rx) = watch::channel(DashboardView::with_buffers(buffers));
        Self { tx: Arc::new(tx) }
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.tx.subscribe()
    }

    /// Copy of the current view.
    #[must_use]
    pub fn snapshot(&self) -> DashboardView {
        self.tx.borrow().clone()
    }

    /// Fold one event into the view.
    pub fn apply(&self, event: &LiveEvent) {
        self.tx.send_if_modified(|view| view.apply(event));
    }

    /// Replace the attack feed with a newest-first snapshot.
    pub fn seed_attacks(&self, attacks: Vec<AttackEvent>) {
        debug!(count = attacks.len(), "seeding attack feed");
        self.tx.send_modify(|view| view.attacks.replace(attacks));
    }

    /// Replace the traffic window with an oldest-first history.
    pub fn seed_traffic(&self, samples: Vec<TrafficSample>) {
        debug!(count = samples.len(), "seeding traffic window");
        self.tx.send_modify(|view| view.traffic.replace(samples));
    }

    /// Adopt a stats snapshot.
    pub fn seed_stats(&self, stats: StatsSnapshot) {
        self.tx.send_modify(|view| view.stats.adopt(Arc::new(stats)));
    }

    /// Adopt a full status snapshot.
    pub fn seed_status(&self, status: StatusSnapshot) {
        self.tx.send_modify(|view| view.status.adopt(status));
    }

    /// Register folding handlers for every event kind on `dispatcher`.
    ///
    /// The handlers stay registered until the binding is unbound or dropped.
    #[must_use = "dropping the binding unregisters the store"]
    pub fn bind(&self, dispatcher: &EventDispatcher) -> StoreBinding {
        let store = self.clone();
        let fold = handler(move |event| {
            store.apply(event);
            Ok(())
        });
        let kinds: Vec<EventKind> = EventKind::ALL.to_vec();
        for kind in &kinds {
            dispatcher.on(*kind, Arc::clone(&fold));
        }
        StoreBinding {
            dispatcher: dispatcher.clone(),
            handler: fold,
            kinds,
        }
    }
}

/// Registration of a [`LiveStore`] on a dispatcher.
pub struct StoreBinding {
    dispatcher: EventDispatcher,
    handler: Handler,
    kinds: Vec<EventKind>,
}

impl StoreBinding {
    /// Unregister the store's handlers.
    pub fn unbind(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for kind in self.kinds.drain(..) {
            self.dispatcher.off(kind, &self.handler);
        }
    }
}

impl std::fmt::Debug for StoreBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBinding")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl Drop for StoreBinding {
    fn drop(&mut self) {
        self.release();
    }
}
