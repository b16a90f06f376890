//! Notification hub — bounded fan-out of session lifecycle events.
//!
//! Built on a single bounded `tokio::sync::broadcast` channel: publishing
//! never awaits, so a slow or absent subscriber can never stall an
//! execution unit. Each subscriber owns an independent cursor into the
//! ring buffer; a subscriber that falls behind past the buffer capacity
//! receives one [`SessionEvent::Overflow`] marker per lag episode and must
//! re-query status to resynchronize. Dropping an [`EventStream`] releases
//! its cursor immediately.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use delve_core::{SessionEvent, SessionId};

/// Default event buffer capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-based notification hub.
pub struct NotificationHub {
    tx: broadcast::Sender<SessionEvent>,
    publish_count: AtomicU64,
}

impl NotificationHub {
    /// Create a hub with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a hub with a custom buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            publish_count: AtomicU64::new(0),
        }
    }

    /// Publish an event to all subscribers. Non-blocking.
    ///
    /// Returns the number of subscribers the event reached (0 when nobody
    /// is listening, which is not an error).
    pub fn publish(&self, event: SessionEvent) -> usize {
        let _ = self.publish_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events published after this call.
    ///
    /// With `filter = Some(id)` the stream yields only that session's
    /// events (plus overflow markers); `None` subscribes to everything.
    #[must_use]
    pub fn subscribe(&self, filter: Option<SessionId>) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events published.
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A lazy, cancellable sequence of session lifecycle events.
///
/// Obtained from [`NotificationHub::subscribe`]. Dropping the stream
/// unsubscribes and releases its buffer cursor.
pub struct EventStream {
    rx: broadcast::Receiver<SessionEvent>,
    filter: Option<SessionId>,
}

impl EventStream {
    /// Wait for the next event.
    ///
    /// Returns `None` once the hub is dropped and all buffered events have
    /// been consumed. A lagged cursor yields a single
    /// [`SessionEvent::Overflow`] marker and then continues with current
    /// events.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(SessionEvent::Overflow { missed });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`next`](Self::next): returns `None` when no
    /// matching event is currently buffered.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    return Some(SessionEvent::Overflow { missed });
                }
                Err(
                    broadcast::error::TryRecvError::Empty
                    | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    /// Overflow markers always pass the filter: a filtered subscriber that
    /// lagged may have missed events for its session.
    fn matches(&self, event: &SessionEvent) -> bool {
        match (&self.filter, event.session_id()) {
            (Some(filter), Some(session_id)) => filter == session_id,
            (Some(_), None) | (None, _) => true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
