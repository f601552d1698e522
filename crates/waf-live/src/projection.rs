//! Bounded views folded from the live feed.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use waf_proto::{AttackEvent, StatsSnapshot, StatusPatch, StatusSnapshot, TrafficSample};

/// Attacks kept in the recent-attacks feed.
pub const ATTACK_FEED_CAPACITY: usize = 50;

/// Samples kept in the traffic chart window.
pub const TRAFFIC_WINDOW_CAPACITY: usize = 100;

/// Fixed-capacity deque. Pushing past capacity evicts from the far end.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Insert at the front, evicting from the back.
    pub fn push_front(&mut self, item: T) {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back();
        }
    }

    /// Insert at the back, evicting from the front.
    pub fn push_back(&mut self, item: T) {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Maximum number of items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Front item.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Back item.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Serialize> Serialize for BoundedBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

/// Recent attacks, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttackFeed(BoundedBuffer<Arc<AttackEvent>>);

impl Default for AttackFeed {
    fn default() -> Self {
        Self::with_capacity(ATTACK_FEED_CAPACITY)
    }
}

impl AttackFeed {
    /// Feed holding at most `capacity` attacks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(BoundedBuffer::with_capacity(capacity))
    }

    /// Prepend a live attack.
    pub fn push(&mut self, attack: Arc<AttackEvent>) {
        self.0.push_front(attack);
    }

    /// Replace the contents with a newest-first snapshot.
    pub fn replace(&mut self, attacks: impl IntoIterator<Item = AttackEvent>) {
        self.0.clear();
        for attack in attacks.into_iter().take(self.0.capacity()) {
            self.0.push_back(Arc::new(attack));
        }
    }

    /// Most recent attack.
    #[must_use]
    pub fn latest(&self) -> Option<&AttackEvent> {
        self.0.front().map(AsRef::as_ref)
    }

    /// Attacks, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &AttackEvent> {
        self.0.iter().map(AsRef::as_ref)
    }

    /// Number of attacks held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the feed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Maximum number of attacks held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

/// Traffic samples, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrafficWindow(BoundedBuffer<Arc<TrafficSample>>);

impl Default for TrafficWindow {
    fn default() -> Self {
        Self::with_capacity(TRAFFIC_WINDOW_CAPACITY)
    }
}

impl TrafficWindow {
    /// Window holding at most `capacity` samples.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(BoundedBuffer::with_capacity(capacity))
    }

    /// Append a live sample.
    pub fn push(&mut self, sample: Arc<TrafficSample>) {
        self.0.push_back(sample);
    }

    /// Replace the contents with an oldest-first history.
    pub fn replace(&mut self, samples: impl IntoIterator<Item = TrafficSample>) {
        self.0.clear();
        for sample in samples {
            self.0.push_back(Arc::new(sample));
        }
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<&TrafficSample> {
        self.0.back().map(AsRef::as_ref)
    }

    /// Samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TrafficSample> {
        self.0.iter().map(AsRef::as_ref)
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Maximum number of samples held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

/// Latest stats snapshot. Each update replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatsView(Option<Arc<StatsSnapshot>>);

impl StatsView {
    /// Adopt `stats` as the current snapshot.
    pub fn adopt(&mut self, stats: Arc<StatsSnapshot>) {
        self.0 = Some(stats);
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Option<&StatsSnapshot> {
        self.0.as_deref()
    }
}

/// Current WAF status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusView(Option<StatusSnapshot>);

impl StatusView {
    /// Shallow-merge `patch` into the known status.
    ///
    /// With no known status yet the patch is adopted as the initial value.
    pub fn apply(&mut self, patch: &StatusPatch) {
        match &mut self.0 {
            Some(current) => current.merge(patch),
            None => self.0 = Some(StatusSnapshot::from(patch)),
        }
    }

    /// Replace the status with a full snapshot.
    pub fn adopt(&mut self, snapshot: StatusSnapshot) {
        self.0 = Some(snapshot);
    }

    /// Current status.
    #[must_use]
    pub fn current(&self) -> Option<&StatusSnapshot> {
        self.0.as_ref()
    }
}
