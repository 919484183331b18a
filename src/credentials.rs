//! Credential acquisition
//!
//! Fetches the feed token and client id from the external config endpoint.
//! Credentials are requested once per connection attempt and never cached.

use serde::Deserialize;
use tracing::debug;

use crate::error::{FeedError, Result};

/// Feed credentials handed out by the config endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub token: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Client for the external credential endpoint.
pub struct CredentialsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CredentialsClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Fetch a fresh credential pair.
    pub async fn fetch(&self) -> Result<Credentials> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FeedError::CredentialFetch(format!("config endpoint unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| FeedError::CredentialFetch(e.to_string()))?;

        let credentials: Credentials = response
            .json()
            .await
            .map_err(|e| FeedError::CredentialFetch(format!("malformed config payload: {e}")))?;

        if credentials.token.is_empty() || credentials.client_id.is_empty() {
            return Err(FeedError::CredentialFetch(
                "config returned an empty token or client id".to_string(),
            ));
        }

        debug!(client_id = %credentials.client_id, "credentials fetched");
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_deserialize() {
        let credentials: Credentials =
            serde_json::from_str(r#"{"token":"tok-1","clientId":"client-1"}"#).unwrap();
        assert_eq!(credentials.token, "tok-1");
        assert_eq!(credentials.client_id, "client-1");
    }
}
