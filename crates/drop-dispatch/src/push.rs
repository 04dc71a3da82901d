use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drop_types::WatchError;

/// Push token registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushToken {
    /// Device token issued by the push provider
    pub token: String,
    /// Originating platform ("ios", "android", "web")
    pub platform: String,
}

/// Client for push token registration against the drops API.
pub struct PushClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PushClient {
    /// Create a push client with a per-request timeout.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, WatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Register a device token in the background.
    ///
    /// Fire and forget: the POST runs on a spawned task and its outcome is
    /// only logged, never surfaced to the caller.
    pub fn register_token(&self, token: PushToken) {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/v1/push/tokens", self.base_url);

        tokio::spawn(async move {
            let mut request = client.post(&url).json(&token);
            if let Some(ref api_key) = api_key {
                request = request.bearer_auth(api_key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Registered push token for platform {}", token.platform);
                }
                Ok(response) => {
                    warn!(
                        "Push token registration returned HTTP {}",
                        response.status()
                    );
                }
                Err(e) => {
                    warn!("Push token registration failed: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_token_wire_shape() {
        let token = PushToken {
            token: "abc123".to_string(),
            platform: "ios".to_string(),
        };

        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"token": "abc123", "platform": "ios"})
        );
    }

    #[tokio::test]
    async fn test_register_token_does_not_block() {
        let push = PushClient::new(
            "http://127.0.0.1:9",
            None,
            std::time::Duration::from_millis(100),
        )
        .unwrap();

        // Unroutable target, the call still returns right away
        push.register_token(PushToken {
            token: "abc123".to_string(),
            platform: "web".to_string(),
        });
    }
}
