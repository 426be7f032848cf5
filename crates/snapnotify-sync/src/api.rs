use async_trait::async_trait;
use snapnotify_core::Notification;

use crate::SyncError;

/// The server-side notification operations the synchronizer depends on.
///
/// [`crate::NotificationClient`] is the HTTP implementation.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET /notifications/`, parsed strictly.
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, SyncError>;

    /// `POST /notifications/{id}/read/`. Idempotent on the server.
    async fn mark_read(&self, id: &str) -> Result<(), SyncError>;

    /// `POST /notifications/mark-all-read/`. Idempotent on the server.
    async fn mark_all_read(&self) -> Result<(), SyncError>;

    /// `DELETE /notifications/{id}/`.
    async fn delete(&self, id: &str) -> Result<(), SyncError>;
}
