//! User directory client.
//!
//! Resolves user ids to principals (display name + group memberships) and
//! validates group ids. The notification routes use this to scope listings
//! and to reject notifications addressed to nobody.

use async_trait::async_trait;
use flowdesk_core::error::DirectoryError;
use flowdesk_core::{Directory, Principal};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the user directory.
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    /// Create a client for the directory at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(
            base_url,
            std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Directory for DirectoryClient {
    async fn principal(&self, user_id: &str) -> Result<Option<Principal>, DirectoryError> {
        let url = format!("{}/v1/users/{user_id}", self.base_url);
        debug!(user_id = %user_id, "Resolving principal");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api {
                status_code: status,
                message: body,
            });
        }

        let doc: UserDoc = response
            .json()
            .await
            .map_err(|e| DirectoryError::Network(format!("unparseable user document: {e}")))?;
        Ok(Some(doc.into()))
    }

    async fn group_exists(&self, group_id: &str) -> Result<bool, DirectoryError> {
        let url = format!("{}/v1/groups/{group_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api {
                status_code: status,
                message: body,
            });
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool, DirectoryError> {
        // Any response at all means the directory is reachable; an unknown
        // probe user is expected.
        let url = format!("{}/v1/users/health-probe", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        Ok(status == 404 || response.status().is_success())
    }
}

// --- Directory API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDoc {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

impl From<UserDoc> for Principal {
    fn from(doc: UserDoc) -> Self {
        Principal {
            id: doc.id,
            display_name: doc.display_name,
            groups: doc.groups,
        }
    }
}
