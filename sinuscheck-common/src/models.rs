use serde::{Deserialize, Serialize};
use std::fmt;

/// The control plane's currently configured default bot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub String);

impl BotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived bearer credential. Only valid for the `BotId` it was obtained with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// JSON shape for `GET /api/v1/botId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotIdDocument {
    pub default_bot_id: BotId,
}

/// JSON shape for `POST /api/v1/bot/login`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub bot_id: &'a BotId,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: SessionToken,
}

/// One entry of `GET /api/v1/bot/instances`. Only `uuid` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub uuid: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
}

impl Instance {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: InstanceId(uuid.into()),
            nick: None,
            backend: None,
            running: None,
        }
    }
}

/// Body of `POST /api/v1/bot/i/{uuid}/settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    pub instance_id: InstanceId,
    pub nick: String,
    pub server_host: String,
}

/// A client connected to the voice server, as seen by the presence query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub nickname: String,
    pub client_id: Option<u32>,
    pub channel_id: Option<u32>,
    pub client_type: Option<u8>,
}

impl PresenceEntry {
    pub fn named(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            client_id: None,
            channel_id: None,
            client_type: None,
        }
    }
}

impl From<sinuscheck_ts3::Ts3Client> for PresenceEntry {
    fn from(client: sinuscheck_ts3::Ts3Client) -> Self {
        Self {
            nickname: client.nickname,
            client_id: client.clid,
            channel_id: client.cid,
            client_type: client.client_type,
        }
    }
}
