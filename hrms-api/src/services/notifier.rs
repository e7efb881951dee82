//! In-app notifications
//!
//! Every stored notification is also published on the event bus so open
//! SSE streams see it immediately.

use hrms_common::events::{EventBus, HrmsEvent, Notification};
use hrms_common::roles::Role;
use hrms_common::time::{now, now_rfc3339};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

pub const NOTIFICATION_TYPES: [&str; 4] = ["info", "success", "warning", "error"];

pub const NOTIFICATION_CATEGORIES: [&str; 8] = [
    "payroll",
    "leave",
    "attendance",
    "performance",
    "application",
    "interview",
    "user",
    "system",
];

/// Notification content before it is addressed to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: &'static str,
    pub category: &'static str,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(category: &'static str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: "info",
            category,
            link: None,
        }
    }

    pub fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Clone)]
pub struct Notifier {
    db: SqlitePool,
    bus: EventBus,
}

impl Notifier {
    pub fn new(db: SqlitePool, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Store a notification for one user and publish it
    pub async fn notify(
        &self,
        user_id: &str,
        content: &NewNotification,
    ) -> hrms_common::Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: content.title.clone(),
            message: content.message.clone(),
            kind: content.kind.to_string(),
            category: content.category.to_string(),
            link: content.link.clone(),
            is_read: false,
            created_at: now_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, type, category, link, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(&notification.category)
        .bind(&notification.link)
        .bind(&notification.created_at)
        .execute(&self.db)
        .await?;

        debug!("Notification '{}' -> {}", notification.title, user_id);
        self.bus.emit_lossy(HrmsEvent::NotificationCreated {
            notification: notification.clone(),
            timestamp: now(),
        });
        Ok(notification)
    }

    /// Notify a user, logging instead of failing
    pub async fn notify_quietly(&self, user_id: &str, content: &NewNotification) {
        if let Err(e) = self.notify(user_id, content).await {
            warn!("Failed to notify {}: {}", user_id, e);
        }
    }

    /// Notify every active user holding one of `roles`, except `exclude`
    pub async fn notify_roles(
        &self,
        roles: &[Role],
        exclude: Option<&str>,
        content: &NewNotification,
    ) -> usize {
        let mut sent = 0;
        for user_id in self.active_users_with_roles(roles).await {
            if Some(user_id.as_str()) == exclude {
                continue;
            }
            if self.notify(&user_id, content).await.is_ok() {
                sent += 1;
            }
        }
        sent
    }

    async fn active_users_with_roles(&self, roles: &[Role]) -> Vec<String> {
        let mut ids = Vec::new();
        for role in roles {
            match sqlx::query_scalar::<_, String>(
                "SELECT id FROM users WHERE role = ? AND is_active = 1",
            )
            .bind(role.as_str())
            .fetch_all(&self.db)
            .await
            {
                Ok(found) => ids.extend(found),
                Err(e) => warn!("Failed to look up {} users for notification: {}", role, e),
            }
        }
        ids
    }
}
