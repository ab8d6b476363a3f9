use async_trait::async_trait;
use tracing::debug;

use sinuscheck_common::config::VoiceServerConfig;
use sinuscheck_common::models::PresenceEntry;
use sinuscheck_common::{Context, Error};
use sinuscheck_ts3::Ts3QueryClient;

/// Read-only view of who is connected to the voice server right now.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn list_clients(&self) -> Result<Vec<PresenceEntry>, Error>;
}

/// Presence through the TeamSpeak 3 ServerQuery interface.
///
/// Every call opens a fresh session and always closes it again.
pub struct Ts3PresenceProbe {
    config: VoiceServerConfig,
}

impl Ts3PresenceProbe {
    pub fn new(config: VoiceServerConfig) -> Self {
        Self { config }
    }

    async fn open(&self, client: &Ts3QueryClient) -> Result<(), Error> {
        let opened: Result<(), Error> = async {
            client.connect().await.context("could not create new ts3 client")?;
            client
                .use_server(self.config.selector)
                .await
                .context("could not use virtual server")
        }
        .await;

        if let Err(e) = opened {
            client.disconnect().await;
            return Err(Error::VoiceServerUnreachable(Box::new(e)));
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceProbe for Ts3PresenceProbe {
    async fn list_clients(&self) -> Result<Vec<PresenceEntry>, Error> {
        let client = Ts3QueryClient::new(self.config.endpoint());
        self.open(&client).await?;

        let listed = client.client_list().await;
        client.disconnect().await;

        let entries: Vec<PresenceEntry> = listed
            .context("could not get clientlist")?
            .into_iter()
            .map(PresenceEntry::from)
            .collect();
        debug!("{} client(s) connected to {}", entries.len(), self.config.host);
        Ok(entries)
    }
}

/// Case-sensitive substring test over all nicknames.
pub fn find_by_nickname_substring(entries: &[PresenceEntry], needle: &str) -> bool {
    first_match(entries, needle).is_some()
}

pub fn first_match<'a>(entries: &'a [PresenceEntry], needle: &str) -> Option<&'a PresenceEntry> {
    entries.iter().find(|entry| entry.nickname.contains(needle))
}
