//! HTTP client for the SafetySnap notification endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use snapnotify_core::{Notification, parse_feed};
use tracing::{debug, info};

use crate::{NotificationApi, SyncError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Connection settings for [`NotificationClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api`. A trailing slash is ignored.
    pub base_url: String,
    /// Sent as `Authorization: Token <token>` when set.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for `/notifications/`.
pub struct NotificationClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl NotificationClient {
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        let trimmed = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(trimmed).map_err(|e| SyncError::BaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::BaseUrl {
                url: config.base_url,
                reason: "not a hierarchical URL".into(),
            });
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    /// Build `<base>/<segments...>/`. Each segment is percent-encoded, so an
    /// id can never escape its path position.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments).push("");
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.token {
            Some(token) => req.header(AUTHORIZATION, format!("Token {token}")),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Fetch the current notification list.
    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, SyncError> {
        let url = self.endpoint(&["notifications"]);
        debug!(url = %url, "pulling notifications");
        let resp = self.send(self.request(Method::GET, url)).await?;
        let body = resp.text().await?;
        let feed = parse_feed(&body)?;
        debug!(count = feed.len(), "pulled notifications");
        Ok(feed)
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", id, "read"]);
        info!(url = %url, id, "marking notification read");
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", "mark-all-read"]);
        info!(url = %url, "marking all notifications read");
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", id]);
        info!(url = %url, id, "deleting notification");
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for NotificationClient {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, SyncError> {
        NotificationClient::fetch_notifications(self).await
    }

    async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        NotificationClient::mark_read(self, id).await
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        NotificationClient::mark_all_read(self).await
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        NotificationClient::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use snapnotify_core::NotificationKind;

    fn client_for(server: &ServerGuard, token: Option<&str>) -> NotificationClient {
        NotificationClient::new(ClientConfig {
            base_url: format!("{}/api/", server.url()),
            token: token.map(str::to_string),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn feed_body() -> String {
        serde_json::json!([
            {
                "id": "violation_3",
                "type": "warning",
                "title": "MEDIUM - no_vest",
                "message": "Missing hi-vis vest",
                "timestamp": "2026-02-21T10:00:00+00:00",
                "read": false,
                "detection_id": "0b6f0c55-5f0e-4c0e-8d8e-3a3b2d7d9f10",
                "violation_id": 3
            },
            {
                "id": "detection_0b6f0c55",
                "type": "danger",
                "title": "Non-Compliant",
                "message": "2 out of 5 persons have violations",
                "timestamp": "2026-02-21T09:58:00+00:00",
                "read": false,
                "detection_id": "0b6f0c55-5f0e-4c0e-8d8e-3a3b2d7d9f10",
                "violation_id": null
            }
        ])
        .to_string()
    }

    #[test]
    fn endpoint_paths_keep_trailing_slash() {
        let client = NotificationClient::new(ClientConfig::default()).unwrap();
        assert_eq!(
            client.endpoint(&["notifications"]).as_str(),
            "http://localhost:8000/api/notifications/"
        );
        assert_eq!(
            client.endpoint(&["notifications", "violation_1", "read"]).as_str(),
            "http://localhost:8000/api/notifications/violation_1/read/"
        );
    }

    #[test]
    fn endpoint_on_bare_host() {
        let client = NotificationClient::new(ClientConfig {
            base_url: "http://example.test/".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint(&["notifications", "mark-all-read"]).as_str(),
            "http://example.test/notifications/mark-all-read/"
        );
    }

    #[test]
    fn ids_are_percent_encoded() {
        let client = NotificationClient::new(ClientConfig::default()).unwrap();
        let url = client.endpoint(&["notifications", "../admin", "read"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/notifications/..%2Fadmin/read/"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        for bad in ["not a url", "mailto:ops@example.test"] {
            let err = NotificationClient::new(ClientConfig {
                base_url: bad.into(),
                ..ClientConfig::default()
            })
            .err()
            .unwrap();
            assert!(matches!(err, SyncError::BaseUrl { .. }), "{bad}: {err}");
        }
    }

    #[tokio::test]
    async fn fetch_parses_feed_and_sends_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/notifications/")
            .match_header("authorization", "Token s3cret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(feed_body())
            .create_async()
            .await;

        let client = client_for(&server, Some("s3cret"));
        let feed = client.fetch_notifications().await.unwrap();

        mock.assert_async().await;
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].kind, NotificationKind::Warning);
        assert_eq!(feed[1].id, "detection_0b6f0c55");
    }

    #[tokio::test]
    async fn fetch_without_token_sends_no_auth_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/notifications/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&server, None);
        assert!(client.fetch_notifications().await.unwrap().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_feed_fails_closed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/notifications/")
            .with_status(200)
            .with_body(r#"[{"id": "a", "type": "info"}]"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.fetch_notifications().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidFeed(_)), "{err}");
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/notifications/")
            .with_status(500)
            .with_body(r#"{"error": "database unavailable"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        match client.fetch_notifications().await {
            Err(SyncError::Server { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("database unavailable"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_distinct() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/notifications/violation_3/read/")
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server, Some("expired"));
        let err = client.mark_read("violation_3").await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthorized));
    }

    #[tokio::test]
    async fn mark_read_posts_to_id_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/notifications/violation_3/read/")
            .with_status(200)
            .with_body(r#"{"status": "success", "message": "Notification marked as read"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        client.mark_read("violation_3").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn mark_read_not_found_is_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/notifications/violation_99/read/")
            .with_status(404)
            .with_body(r#"{"error": "Violation not found"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.mark_read("violation_99").await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn mark_all_read_and_delete() {
        let mut server = Server::new_async().await;
        let all = server
            .mock("POST", "/api/notifications/mark-all-read/")
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/notifications/detection_0b6f0c55/")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server, None);
        client.mark_all_read().await.unwrap();
        client.delete("detection_0b6f0c55").await.unwrap();
        all.assert_async().await;
        delete.assert_async().await;
    }
}
