//! sinuscheck-core/src/verifier.rs
//!
//! The one-shot verification run: liveness, provisioning, settle, presence.
//! Stages run strictly in order and the first failing stage ends the run.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sinuscheck_common::config::{InstanceTarget, SettleStrategy, VerifierConfig};
use sinuscheck_common::models::{BotId, Credentials, InstanceId, InstanceSettings, PresenceEntry};
use sinuscheck_common::{Context, Error};

use crate::control_plane::ControlPlane;
use crate::presence::{first_match, PresenceProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckRunning,
    CheckCanConnect,
    Settle,
    CheckPresence,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::CheckRunning => 1,
            Stage::CheckCanConnect => 2,
            Stage::Settle => 3,
            Stage::CheckPresence => 4,
        }
    }

    /// Progress line logged when the stage starts. Only the settle stage
    /// depends on the strategy.
    pub fn announcement(&self, settle: &SettleStrategy) -> &'static str {
        match (self, settle) {
            (Stage::CheckRunning, _) => "Checking if the bot is running...",
            (Stage::CheckCanConnect, _) => "Checking if the bot can connect to the voice server...",
            (Stage::Settle, SettleStrategy::Fixed { .. }) => {
                "Giving the bot time to connect to the voice server..."
            }
            (Stage::Settle, SettleStrategy::Poll { .. }) => {
                "No fixed wait; polling the voice server for the bot instead..."
            }
            (Stage::CheckPresence, _) => "Checking if the bot is on the voice server...",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::CheckRunning => "bot is not running",
            Stage::CheckCanConnect => "cannot connect bot to voice server",
            Stage::Settle => "interrupted while waiting for the bot to connect",
            Stage::CheckPresence => "bot is not visibly connected to the voice server",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckRunning => "check-running",
            Stage::CheckCanConnect => "check-can-connect",
            Stage::Settle => "settle",
            Stage::CheckPresence => "check-presence",
        };
        write!(f, "stage {} ({})", self.number(), name)
    }
}

/// The first failing stage of a run and why it failed.
#[derive(Debug, Error)]
#[error("{}: {}", .stage.failure_message(), .source)]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl StageFailure {
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub bot_id: BotId,
    pub instance: InstanceId,
    pub matched_nickname: String,
    pub presence_attempts: u32,
    pub elapsed: Duration,
}

pub struct Verifier<C, P> {
    control_plane: C,
    presence: P,
    credentials: Credentials,
    target: InstanceTarget,
    settle: SettleStrategy,
}

impl<C: ControlPlane, P: PresenceProbe> Verifier<C, P> {
    pub fn new(control_plane: C, presence: P, credentials: Credentials, config: &VerifierConfig) -> Self {
        Self {
            control_plane,
            presence,
            credentials,
            target: config.instance.clone(),
            settle: config.settle,
        }
    }

    /// Run all stages once. Cancelling `shutdown` aborts the stage in progress.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<VerificationReport, StageFailure> {
        let started = Instant::now();

        self.guarded(Stage::CheckRunning, shutdown, self.check_running()).await?;
        let (bot_id, instance) = self
            .guarded(Stage::CheckCanConnect, shutdown, self.check_can_connect())
            .await?;
        self.guarded(Stage::Settle, shutdown, self.settle()).await?;
        let (entry, attempts) = self
            .guarded(Stage::CheckPresence, shutdown, self.check_presence())
            .await?;

        let report = VerificationReport {
            bot_id,
            instance,
            matched_nickname: entry.nickname,
            presence_attempts: attempts,
            elapsed: started.elapsed(),
        };
        info!(
            "Verification passed: {:?} is connected after {:?} ({} presence attempt(s))",
            report.matched_nickname, report.elapsed, report.presence_attempts
        );
        Ok(report)
    }

    async fn guarded<T>(
        &self,
        stage: Stage,
        shutdown: &CancellationToken,
        work: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, StageFailure> {
        info!("{}", stage.announcement(&self.settle));
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(Error::Cancelled),
            result = work => result,
        };
        result.map_err(|source| StageFailure { stage, source })
    }

    async fn check_running(&self) -> Result<(), Error> {
        let bot_id = self.control_plane.get_bot_id().await.context("could not get botId")?;
        debug!("Control plane is up, default bot id {}", bot_id);
        Ok(())
    }

    /// The bot id is fetched again on purpose; a token is only valid for the
    /// bot id it was issued for.
    async fn check_can_connect(&self) -> Result<(BotId, InstanceId), Error> {
        let bot_id = self.control_plane.get_bot_id().await.context("could not get botId")?;
        let token = self
            .control_plane
            .login(&self.credentials, &bot_id)
            .await
            .context("could not get token")?;
        let instances = self
            .control_plane
            .list_instances(&token)
            .await
            .context("could not get instances")?;
        let instance = instances
            .into_iter()
            .next()
            .ok_or(Error::NoInstance)
            .context("could not select instance")?;

        let settings = InstanceSettings {
            instance_id: instance.uuid.clone(),
            nick: self.target.nickname.clone(),
            server_host: self.target.server_host.clone(),
        };
        info!(
            "Configuring instance {} as {:?} on {}",
            instance.uuid, settings.nick, settings.server_host
        );
        self.control_plane.configure_and_spawn(&settings, &token).await?;
        Ok((bot_id, instance.uuid))
    }

    async fn settle(&self) -> Result<(), Error> {
        match self.settle {
            SettleStrategy::Fixed { delay } => {
                info!("Sleeping {:?} so that the bot can connect to the server", delay);
                sleep(delay).await;
            }
            SettleStrategy::Poll { interval, timeout } => {
                debug!("Polling presence every {:?} for up to {:?}", interval, timeout);
            }
        }
        Ok(())
    }

    /// Returns the matching entry and how many listings it took.
    async fn check_presence(&self) -> Result<(PresenceEntry, u32), Error> {
        let needle = &self.target.nickname;
        let poll = match self.settle {
            SettleStrategy::Fixed { .. } => None,
            SettleStrategy::Poll { interval, timeout } => Some((interval, Instant::now() + timeout)),
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let failure = match self.presence.list_clients().await {
                Ok(entries) => match first_match(&entries, needle) {
                    Some(entry) => return Ok((entry.clone(), attempts)),
                    None => Error::BotNotFound { needle: needle.clone() },
                },
                Err(e) => e,
            };

            let interval = match poll {
                Some((interval, deadline)) if Instant::now() + interval <= deadline => interval,
                _ => return Err(failure),
            };
            warn!("Presence attempt {} failed, retrying in {:?}: {}", attempts, interval, failure);
            sleep(interval).await;
        }
    }
}
