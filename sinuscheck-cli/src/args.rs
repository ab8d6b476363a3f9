use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use sinuscheck_common::config::{
    ControlPlaneConfig, InstanceTarget, SettleStrategy, VerifierConfig, VoiceServerConfig,
    DEFAULT_CONTROL_PLANE_URL, DEFAULT_NICKNAME,
};
use sinuscheck_common::models::Credentials;
use sinuscheck_common::{Context, Error};
use sinuscheck_ts3::VirtualServerSelector;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// Sleep once, then check presence once
    Fixed,
    /// Check presence repeatedly until found or timed out
    Poll,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "sinuscheck")]
#[command(author, version, about = "sinuscheck - verifies a bot deployment end to end: control plane, spawn, voice presence")]
pub struct Args {
    /// Base URL of the bot-management API.
    #[arg(long, env = "SINUSCHECK_CONTROL_PLANE_URL", default_value = DEFAULT_CONTROL_PLANE_URL)]
    pub control_plane_url: Url,

    #[arg(long, env = "SINUSCHECK_USERNAME", default_value = "admin")]
    pub username: String,

    /// File holding the control plane password.
    #[arg(long, env = "SINUSCHECK_PASSWORD_FILE", default_value = ".password")]
    pub password_file: PathBuf,

    /// Password given directly; takes precedence over --password-file.
    #[arg(long, env = "SINUSCHECK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Treat a non-2xx login response as a failure instead of decoding it.
    #[arg(long, default_value = "false")]
    pub strict_login: bool,

    #[arg(long, env = "SINUSCHECK_VOICE_HOST", default_value = "julia.ts3index.com")]
    pub voice_host: String,

    /// ServerQuery port of the voice server.
    #[arg(long, env = "SINUSCHECK_QUERY_PORT", default_value_t = 10011)]
    pub query_port: u16,

    /// Select the virtual server by its voice port (default 1489).
    #[arg(long, conflicts_with = "virtual_server_id")]
    pub virtual_server_port: Option<u16>,

    /// Select the virtual server by its numeric id.
    #[arg(long)]
    pub virtual_server_id: Option<u32>,

    #[arg(long, default_value_t = 10)]
    pub query_timeout_secs: u64,

    /// Nickname given to the instance and searched for on the voice server.
    #[arg(long, env = "SINUSCHECK_NICKNAME", default_value = DEFAULT_NICKNAME)]
    pub nickname: String,

    /// Server host written into the instance settings.
    #[arg(long, default_value = "sinusbot.com")]
    pub instance_server_host: String,

    #[arg(long, value_enum, default_value_t = SettleMode::Poll)]
    pub settle: SettleMode,

    /// Delay for --settle=fixed.
    #[arg(long, default_value_t = 5)]
    pub settle_secs: u64,

    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    #[arg(long, default_value_t = 30)]
    pub poll_timeout_secs: u64,
}

impl Args {
    pub fn verifier_config(&self) -> VerifierConfig {
        let selector = match (self.virtual_server_id, self.virtual_server_port) {
            (Some(sid), _) => VirtualServerSelector::Id(sid),
            (None, port) => VirtualServerSelector::Port(port.unwrap_or(1489)),
        };
        let settle = match self.settle {
            SettleMode::Fixed => SettleStrategy::Fixed {
                delay: Duration::from_secs(self.settle_secs),
            },
            SettleMode::Poll => SettleStrategy::Poll {
                interval: Duration::from_millis(self.poll_interval_ms),
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
        };

        VerifierConfig {
            control_plane: ControlPlaneConfig {
                base_url: self.control_plane_url.clone(),
                username: self.username.clone(),
                strict_login_status: self.strict_login,
            },
            voice_server: VoiceServerConfig {
                host: self.voice_host.clone(),
                query_port: self.query_port,
                selector,
                command_timeout: Duration::from_secs(self.query_timeout_secs),
            },
            instance: InstanceTarget {
                nickname: self.nickname.clone(),
                server_host: self.instance_server_host.clone(),
            },
            settle,
        }
    }

    pub fn credentials(&self) -> Result<Credentials, Error> {
        let password = match &self.password {
            Some(password) => password.clone(),
            None => read_password_file(&self.password_file)?,
        };
        Ok(Credentials {
            username: self.username.clone(),
            password,
        })
    }
}

/// Whole file content minus trailing line breaks.
pub fn read_password_file(path: &Path) -> Result<String, Error> {
    let raw = fs::read_to_string(path)
        .context(format!("could not read password file {}", path.display()))?;
    Ok(raw.trim_end_matches(['\r', '\n']).to_string())
}
