//! Client for the bot-management HTTP API (the control plane).
//!
//! All calls go to a single base URL, every call is attempted exactly once.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use sinuscheck_common::config::ControlPlaneConfig;
use sinuscheck_common::models::{
    BotId, BotIdDocument, Credentials, Instance, InstanceId, InstanceSettings, LoginRequest,
    LoginResponse, SessionToken,
};
use sinuscheck_common::{Context, Error};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Liveness probe and source of the default bot id.
    async fn get_bot_id(&self) -> Result<BotId, Error>;
    async fn login(&self, credentials: &Credentials, bot_id: &BotId) -> Result<SessionToken, Error>;
    async fn list_instances(&self, token: &SessionToken) -> Result<Vec<Instance>, Error>;
    /// Apply the settings to the instance, then ask it to spawn.
    async fn configure_and_spawn(&self, settings: &InstanceSettings, token: &SessionToken) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct ControlPlaneClient {
    base_url: Url,
    http: reqwest::Client,
    strict_login_status: bool,
}

impl ControlPlaneClient {
    pub fn new(config: &ControlPlaneConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: &ControlPlaneConfig, http: reqwest::Client) -> Self {
        // join() drops the last segment unless the path ends in '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            http,
            strict_login_status: config.strict_login_status,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn fetch_bot_id(&self) -> Result<BotId, Error> {
        let url = self.endpoint("api/v1/botId")?;
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                expected: StatusCode::OK.as_u16(),
                got: status.as_u16(),
            });
        }
        let document: BotIdDocument = decode(response).await?;
        Ok(document.default_bot_id)
    }

    /// `POST /api/v1/bot/i/{uuid}/settings`
    pub async fn update_settings(&self, settings: &InstanceSettings, token: &SessionToken) -> Result<(), Error> {
        let url = self.endpoint(&format!("api/v1/bot/i/{}/settings", settings.instance_id))?;
        debug!("POST {} nick={:?} serverHost={:?}", url, settings.nick, settings.server_host);
        let response = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .json(settings)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(Error::SettingsRejected(other.as_u16())),
        }
    }

    /// `POST /api/v1/bot/i/{uuid}/spawn`
    pub async fn spawn(&self, instance: &InstanceId, token: &SessionToken) -> Result<(), Error> {
        let url = self.endpoint(&format!("api/v1/bot/i/{}/spawn", instance))?;
        debug!("POST {}", url);
        let response = self.http.post(url).bearer_auth(token.as_str()).send().await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(Error::SpawnRejected(other.as_u16())),
        }
    }
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn get_bot_id(&self) -> Result<BotId, Error> {
        self.fetch_bot_id()
            .await
            .map_err(|e| Error::NotRunning(Box::new(e)))
    }

    async fn login(&self, credentials: &Credentials, bot_id: &BotId) -> Result<SessionToken, Error> {
        let url = self.endpoint("api/v1/bot/login")?;
        debug!("POST {} as {}", url, credentials.username);
        let body = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            bot_id,
        };
        let response = self.http.post(url).json(&body).send().await?;

        // Without the strict flag the status is not looked at; a decodable
        // token is taken as success.
        let status = response.status();
        if self.strict_login_status && !status.is_success() {
            return Err(Error::LoginRejected(status.as_u16()));
        }
        let login: LoginResponse = decode(response).await?;
        info!("Logged in to the control plane as {}", credentials.username);
        Ok(login.token)
    }

    async fn list_instances(&self, token: &SessionToken) -> Result<Vec<Instance>, Error> {
        let url = self.endpoint("api/v1/bot/instances")?;
        debug!("GET {}", url);
        let response = self.http.get(url).bearer_auth(token.as_str()).send().await?;
        let instances: Vec<Instance> = decode(response).await?;
        debug!("Control plane reports {} instance(s)", instances.len());
        Ok(instances)
    }

    async fn configure_and_spawn(&self, settings: &InstanceSettings, token: &SessionToken) -> Result<(), Error> {
        self.update_settings(settings, token)
            .await
            .context("could not change instance settings")?;
        self.spawn(&settings.instance_id, token)
            .await
            .context("could not spawn instance")?;
        info!("Instance {} configured and spawned", settings.instance_id);
        Ok(())
    }
}

/// Read the whole body and decode it, keeping the JSON path of any mismatch.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let body = response.bytes().await?;
    let mut deserializer = serde_json::Deserializer::from_slice(&body);
    Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}
