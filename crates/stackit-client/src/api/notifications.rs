//! Notifications API.

use crate::client::StackitClient;
use crate::error::Result;
use crate::types::{ListNotificationsQuery, Notification, StatusResponse};

/// Notifications API client.
pub struct NotificationsApi {
    client: StackitClient,
}

impl NotificationsApi {
    pub(crate) fn new(client: StackitClient) -> Self {
        Self { client }
    }

    /// List the current user's notifications, newest first.
    pub async fn list(&self) -> Result<Vec<Notification>> {
        self.list_with_query(&ListNotificationsQuery::default()).await
    }

    /// List notifications with paging.
    pub async fn list_with_query(&self, query: &ListNotificationsQuery) -> Result<Vec<Notification>> {
        self.client.get_with_query("notifications", query).await
    }

    /// Mark every notification of the current user as read.
    pub async fn mark_all_read(&self) -> Result<StatusResponse> {
        self.client.post_empty("notifications/read_all").await
    }
}
