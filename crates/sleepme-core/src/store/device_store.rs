// ── Reactive device cache ──
//
// Concurrent storage keyed by device id with push-based change
// notification via `watch` channels. Readers never block; writers are
// serialized so every published snapshot contains every prior write.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sleepme_api::{DeviceControl, DeviceState};
use tokio::sync::watch;

use crate::model::CacheEntry;
use crate::stream::StateStream;

/// Ordered view of every cached device.
pub type Snapshot = Arc<Vec<Arc<CacheEntry>>>;

/// Cache of the latest known state for each eligible device.
///
/// The key set is fixed by [`install`](Self::install) during setup and
/// never changes afterwards. Each write replaces a whole `Arc<CacheEntry>`,
/// so readers see either the old entry or the new one, never a mix.
pub struct DeviceStore {
    entries: DashMap<String, Arc<CacheEntry>>,
    /// Device ids in listing order. Set once.
    order: OnceLock<Vec<String>>,
    write_lock: Mutex<()>,
    /// Bumped once per published change.
    version: watch::Sender<u64>,
    snapshot: watch::Sender<Snapshot>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_refresh, _) = watch::channel(None);

        Self {
            entries: DashMap::new(),
            order: OnceLock::new(),
            write_lock: Mutex::new(()),
            version,
            snapshot,
            last_refresh,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Populate the cache from the initial fetch and fix its key set.
    ///
    /// Returns `false` (and changes nothing) if the store was already
    /// installed.
    pub(crate) fn install(&self, entries: Vec<CacheEntry>) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.order.get().is_some() {
            return false;
        }

        let order: Vec<String> = entries.iter().map(|e| e.id().to_owned()).collect();
        for entry in entries {
            self.entries.insert(entry.id().to_owned(), Arc::new(entry));
        }
        // Cannot fail: checked above while holding the write lock.
        let _ = self.order.set(order);

        self.mark_refreshed();
        self.publish();
        true
    }

    /// Replace the state of every listed device and notify once.
    ///
    /// Ids that are not in the cache are ignored. Returns how many
    /// entries were updated.
    pub(crate) fn apply_states(&self, states: Vec<(String, DeviceState)>) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut updated = 0;
        for (id, state) in states {
            if let Some(mut slot) = self.entries.get_mut(&id) {
                let next = slot.with_state(state);
                *slot = Arc::new(next);
                updated += 1;
            }
        }

        if updated > 0 {
            self.mark_refreshed();
            self.publish();
        }
        updated
    }

    /// Replace one device's control record and notify once.
    ///
    /// Returns the new entry, or `None` if the id is unknown.
    pub(crate) fn apply_control(
        &self,
        device_id: &str,
        control: DeviceControl,
    ) -> Option<Arc<CacheEntry>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = {
            let mut slot = self.entries.get_mut(device_id)?;
            let next = Arc::new(slot.with_control(control));
            *slot = Arc::clone(&next);
            next
        };

        self.publish();
        Some(entry)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Whether setup has populated the cache.
    pub fn is_ready(&self) -> bool {
        self.order.get().is_some()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.entries.contains_key(device_id)
    }

    /// Device ids in the order the API listed them.
    pub fn device_ids(&self) -> Vec<String> {
        self.order.get().cloned().unwrap_or_default()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to changes. Dropping the stream unsubscribes.
    pub fn subscribe(&self) -> StateStream {
        StateStream::new(self.snapshot.subscribe())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.snapshot.receiver_count()
    }

    /// Monotonic change counter, one step per published change.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// When device state was last written by a fetch.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the ordered snapshot and notify subscribers.
    fn publish(&self) {
        let values: Vec<Arc<CacheEntry>> = self
            .order
            .get()
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }

    fn mark_refreshed(&self) {
        self.last_refresh.send_modify(|t| *t = Some(Utc::now()));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
