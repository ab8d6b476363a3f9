//! Explicit configuration handed to both clients and the verifier.
//!
//! Defaults reproduce the CI deployment the verifier was written for: a local
//! control plane on port 8087 and a public TeamSpeak 3 server.

use serde::{Deserialize, Serialize};
use sinuscheck_ts3::{Ts3Endpoint, VirtualServerSelector};
use std::time::Duration;
use url::Url;

use crate::Error;

pub const DEFAULT_CONTROL_PLANE_URL: &str = "http://127.0.0.1:8087/";
pub const DEFAULT_NICKNAME: &str = "SinusBot via Travis CI";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    pub base_url: Url,
    pub username: String,
    /// Reject non-2xx login responses before decoding the token.
    pub strict_login_status: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_CONTROL_PLANE_URL).expect("default control plane URL is valid"),
            username: "admin".to_string(),
            strict_login_status: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceServerConfig {
    pub host: String,
    pub query_port: u16,
    pub selector: VirtualServerSelector,
    pub command_timeout: Duration,
}

impl VoiceServerConfig {
    pub fn endpoint(&self) -> Ts3Endpoint {
        Ts3Endpoint {
            host: self.host.clone(),
            query_port: self.query_port,
            command_timeout: self.command_timeout,
        }
    }
}

impl Default for VoiceServerConfig {
    fn default() -> Self {
        Self {
            host: "julia.ts3index.com".to_string(),
            query_port: 10011,
            selector: VirtualServerSelector::Port(1489),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// What the spawned instance is told to be, and what we look for afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceTarget {
    /// Written as the instance nickname and searched as a substring.
    pub nickname: String,
    /// Voice server the instance is told to connect to.
    pub server_host: String,
}

impl Default for InstanceTarget {
    fn default() -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            server_host: "sinusbot.com".to_string(),
        }
    }
}

/// How long to give the spawned instance before presence must be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleStrategy {
    /// Sleep once, then query presence exactly once.
    Fixed { delay: Duration },
    /// Query presence every `interval` until found or `timeout` runs out.
    Poll { interval: Duration, timeout: Duration },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Poll {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SettleStrategy {
    pub fn legacy() -> Self {
        SettleStrategy::Fixed { delay: Duration::from_secs(5) }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub control_plane: ControlPlaneConfig,
    pub voice_server: VoiceServerConfig,
    pub instance: InstanceTarget,
    pub settle: SettleStrategy,
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let scheme = self.control_plane.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Error::Config(format!(
                "control plane URL must be http(s), got scheme '{}'",
                scheme
            )));
        }
        if self.control_plane.username.is_empty() {
            return Err(Error::Config("username must not be empty".into()));
        }
        if self.instance.nickname.is_empty() {
            return Err(Error::Config("expected nickname marker must not be empty".into()));
        }
        if self.voice_server.host.is_empty() {
            return Err(Error::Config("voice server host must not be empty".into()));
        }
        if self.voice_server.query_port == 0 {
            return Err(Error::Config("voice server query port must not be 0".into()));
        }
        if self.voice_server.command_timeout.is_zero() {
            return Err(Error::Config("query command timeout must be greater than zero".into()));
        }
        if let SettleStrategy::Poll { interval, timeout } = self.settle {
            if interval.is_zero() {
                return Err(Error::Config("poll interval must be greater than zero".into()));
            }
            if timeout < interval {
                return Err(Error::Config(format!(
                    "poll timeout {:?} is shorter than the poll interval {:?}",
                    timeout, interval
                )));
            }
        }
        Ok(())
    }
}
