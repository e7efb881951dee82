//! In-process event bus
//!
//! Handlers publish domain events here; the notification SSE stream and
//! background jobs subscribe.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A stored user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub category: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

/// HRMS event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HrmsEvent {
    /// A notification was stored for a user
    NotificationCreated {
        notification: Notification,
        timestamp: DateTime<Utc>,
    },

    /// A user's notifications were marked read
    NotificationsRead {
        user_id: String,
        count: u64,
        timestamp: DateTime<Utc>,
    },

    /// The daily absence sweep finished
    AttendanceAutoMarked {
        date: NaiveDate,
        absent: u64,
        on_leave: u64,
        timestamp: DateTime<Utc>,
    },
}

impl HrmsEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            HrmsEvent::NotificationCreated { .. } => "NotificationCreated",
            HrmsEvent::NotificationsRead { .. } => "NotificationsRead",
            HrmsEvent::AttendanceAutoMarked { .. } => "AttendanceAutoMarked",
        }
    }

    /// User the event is addressed to, if it is user-specific
    pub fn user_id(&self) -> Option<&str> {
        match self {
            HrmsEvent::NotificationCreated { notification, .. } => Some(&notification.user_id),
            HrmsEvent::NotificationsRead { user_id, .. } => Some(user_id),
            HrmsEvent::AttendanceAutoMarked { .. } => None,
        }
    }
}

/// Broadcast bus shared through application state
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HrmsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per slow subscriber
    ///
    /// # Examples
    ///
    /// ```
    /// use hrms_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HrmsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: HrmsEvent) -> Result<usize, broadcast::error::SendError<HrmsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HrmsEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
