// ── Reactive state streams ──
//
// Subscription type for consuming cache changes from the DeviceStore.

use tokio::sync::watch;

use crate::store::Snapshot;

/// A subscription to the device cache.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed). Dropping it unsubscribes.
pub struct StateStream {
    receiver: watch::Receiver<Snapshot>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        Self { receiver }
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Whether a change was published since the last `changed()`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
