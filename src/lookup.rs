//! Channel name → chatroom id lookup.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::error::RouletteError;

/// Resolves a channel name to the opaque room id used for subscription.
pub trait RoomLookup: Send + Sync + 'static {
    fn lookup(&self, channel: &str) -> BoxFuture<'static, Result<String, RouletteError>>;
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    #[serde(default)]
    chatroom: Option<Chatroom>,
}

#[derive(Debug, Deserialize)]
struct Chatroom {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Extract `chatroom.id` from a channel API response body.
pub fn parse_chatroom_id(body: &[u8]) -> Option<String> {
    chatroom_id(serde_json::from_slice(body).ok()?)
}

fn chatroom_id(info: ChannelInfo) -> Option<String> {
    match info.chatroom?.id? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Looks channels up via `GET {base_url}/{channel}`.
#[derive(Debug, Clone)]
pub struct KickRoomLookup {
    base_url: String,
    client: reqwest::Client,
}

impl KickRoomLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        // Builder failure is not fatal; fall back to a default client.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

impl RoomLookup for KickRoomLookup {
    fn lookup(&self, channel: &str) -> BoxFuture<'static, Result<String, RouletteError>> {
        let url = format!("{}/{}", self.base_url, channel);
        let client = self.client.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            let fail = |detail: String| RouletteError::Lookup {
                channel: channel.clone(),
                detail,
            };
            let resp = client
                .get(&url)
                .send()
                .await
                .map_err(|e| fail(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(fail(format!(
                    "HTTP {}: Channel not found",
                    resp.status().as_u16()
                )));
            }
            let info: ChannelInfo = resp.json().await.map_err(|e| fail(e.to_string()))?;
            chatroom_id(info).ok_or_else(|| fail("No chatroom ID found".to_string()))
        })
    }
}
