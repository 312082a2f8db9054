//! REST client for the StudyPad sync backend
//!
//! Provides a typed HTTP client implementing the `RemoteApi` port. Handles
//! authentication headers, JSON deserialization, endpoint construction, and
//! transient/permanent error classification.
//!
//! ## Endpoints
//!
//! | Operation       | Request                                      |
//! |-----------------|----------------------------------------------|
//! | `list_entities` | `GET /v1/{notes,chats,messages}?owner_id=…&cursor=…` |
//! | `create_entity` | `POST /v1/{collection}`                      |
//! | `update_entity` | `PUT /v1/{collection}/{id}`                  |
//! | `delete_entity` | `DELETE /v1/{collection}/{id}`               |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use studypad_remote::RestRemoteApi;
//!
//! let client = RestRemoteApi::new("https://sync.studypad.app", "access-token-here");
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use studypad_core::domain::{EntityId, EntityKind, OwnerId, SyncCursor};
use studypad_core::ports::{RemoteApi, RemoteEntity, RemoteError, RemotePage};

/// Default per-request timeout; a timed-out call is a transient failure
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Wire types
// ============================================================================

/// An entity as encoded on the wire
#[derive(Debug, Deserialize)]
struct WireEntity {
    id: String,
    owner_id: String,
    payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
    #[serde(default)]
    deleted: bool,
}

/// Response body of a list request
#[derive(Debug, Deserialize)]
struct ListResponse {
    entities: Vec<WireEntity>,
    next_cursor: Option<String>,
}

impl WireEntity {
    fn into_remote(self, kind: EntityKind) -> Result<RemoteEntity, RemoteError> {
        let id: EntityId = self
            .id
            .parse()
            .map_err(|e| RemoteError::Permanent(format!("malformed entity id: {e}")))?;
        let owner_id = OwnerId::new(self.owner_id)
            .map_err(|e| RemoteError::Permanent(format!("malformed owner id: {e}")))?;
        Ok(RemoteEntity {
            id,
            owner_id,
            kind,
            payload: self.payload.unwrap_or(serde_json::Value::Null),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
            deleted: self.deleted,
        })
    }
}

// ============================================================================
// RestRemoteApi
// ============================================================================

/// HTTP client for the StudyPad sync backend
///
/// Wraps `reqwest::Client` with authentication headers, base URL
/// construction, and the transient/permanent error classification the sync
/// engine's retry policy depends on.
pub struct RestRemoteApi {
    /// The underlying HTTP client (carries the per-request timeout)
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Bearer token for the acting user's session
    access_token: String,
}

impl RestRemoteApi {
    /// Creates a new client with the default request timeout
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the sync backend (no trailing slash needed)
    /// * `access_token` - A valid session token for the acting user
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, access_token, DEFAULT_TIMEOUT)
    }

    /// Creates a new client with a custom request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a session refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated remote API access token");
    }

    /// Creates an authenticated request builder for the given method and path
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Maps a transport-level failure to the retry classification
    ///
    /// Connection failures and timeouts are transient; request-construction
    /// failures are permanent (retrying an unbuildable request cannot help).
    fn transport_error(e: reqwest::Error) -> RemoteError {
        if e.is_timeout() || e.is_connect() {
            RemoteError::Transient(e.to_string())
        } else if e.is_builder() {
            RemoteError::Permanent(e.to_string())
        } else {
            // Remaining cases (dropped connections, body errors) are
            // network-shaped and worth retrying.
            RemoteError::Transient(e.to_string())
        }
    }

    /// Checks a response status, classifying failures for the retry policy
    ///
    /// 408 (request timeout), 429 (throttled), and 5xx are transient; any
    /// other non-success status is permanent.
    async fn check_status(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), body.trim())
        };

        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            warn!(status = status.as_u16(), "transient remote failure");
            Err(RemoteError::Transient(detail))
        } else {
            warn!(status = status.as_u16(), "permanent remote failure");
            Err(RemoteError::Permanent(detail))
        }
    }

    /// Parses a JSON body, treating malformed payloads as permanent
    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, RemoteError> {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Permanent(format!("malformed response body: {e}")))
    }

    /// URL path segment for an entity kind's collection
    fn collection(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Note => "notes",
            EntityKind::Chat => "chats",
            EntityKind::Message => "messages",
        }
    }
}

#[async_trait::async_trait]
impl RemoteApi for RestRemoteApi {
    async fn list_entities(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        since: Option<&SyncCursor>,
    ) -> Result<RemotePage, RemoteError> {
        let path = format!("/v1/{}", Self::collection(kind));
        debug!(kind = %kind, owner = %owner, cursor = ?since.map(SyncCursor::as_str), "listing remote entities");

        let mut request = self
            .request(Method::GET, &path)
            .query(&[("owner_id", owner.as_str())]);
        if let Some(cursor) = since {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        let response = request.send().await.map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        let body: ListResponse = Self::parse_json(response).await?;

        let entities = body
            .entities
            .into_iter()
            .map(|wire| wire.into_remote(kind))
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = match body.next_cursor {
            Some(raw) => Some(
                SyncCursor::new(raw)
                    .map_err(|e| RemoteError::Permanent(format!("malformed cursor: {e}")))?,
            ),
            None => None,
        };

        Ok(RemotePage {
            entities,
            next_cursor,
        })
    }

    async fn create_entity(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError> {
        let path = format!("/v1/{}", Self::collection(kind));
        debug!(kind = %kind, "creating remote entity");

        let response = self
            .request(Method::POST, &path)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        let wire: WireEntity = Self::parse_json(response).await?;
        wire.into_remote(kind)
    }

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &EntityId,
        payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError> {
        let path = format!("/v1/{}/{}", Self::collection(kind), id);
        debug!(kind = %kind, id = %id, "updating remote entity");

        let response = self
            .request(Method::PUT, &path)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        let wire: WireEntity = Self::parse_json(response).await?;
        wire.into_remote(kind)
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<(), RemoteError> {
        let path = format!("/v1/{}/{}", Self::collection(kind), id);
        debug!(kind = %kind, id = %id, "deleting remote entity");

        let response = self
            .request(Method::DELETE, &path)
            .send()
            .await
            .map_err(Self::transport_error)?;

        // Deleting an already-absent entity is a success: the intent of the
        // queued delete has been met either way.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %id, "remote entity already gone");
            return Ok(());
        }

        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_paths() {
        assert_eq!(RestRemoteApi::collection(EntityKind::Note), "notes");
        assert_eq!(RestRemoteApi::collection(EntityKind::Chat), "chats");
        assert_eq!(RestRemoteApi::collection(EntityKind::Message), "messages");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = RestRemoteApi::new("http://localhost:8080/", "token");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
