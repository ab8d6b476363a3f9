use crate::{models::*, reply, Ts3Error};
use crate::error::Result;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Large servers answer `clientlist` with a single long line.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

type Connection = Framed<TcpStream, LinesCodec>;

/// Read-only client for the TeamSpeak 3 ServerQuery interface.
pub struct Ts3QueryClient {
    endpoint: Ts3Endpoint,
    conn: Mutex<Option<Connection>>,
}

impl Ts3QueryClient {
    pub fn new(endpoint: Ts3Endpoint) -> Self {
        Self {
            endpoint,
            conn: Mutex::new(None),
        }
    }

    /// Open the TCP session and consume the server greeting.
    pub async fn connect(&self) -> Result<()> {
        let addr = self.endpoint.addr();
        let limit = self.endpoint.command_timeout;
        info!("Connecting to ServerQuery at {}", addr);

        let stream = bounded(limit, TcpStream::connect(&addr)).await??;
        let mut conn = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        let banner = next_line(&mut conn, limit).await?;
        if banner != "TS3" {
            return Err(Ts3Error::NotServerQuery { addr, line: banner });
        }
        let welcome = next_line(&mut conn, limit).await?;
        debug!("ServerQuery greeting: {}", welcome);

        *self.conn.lock().await = Some(conn);
        info!("Connected to ServerQuery at {}", addr);
        Ok(())
    }

    /// Send `quit` and drop the socket. Safe to call more than once.
    pub async fn disconnect(&self) {
        if let Some(mut conn) = self.conn.lock().await.take() {
            let limit = self.endpoint.command_timeout;
            match bounded(limit, conn.send("quit")).await {
                Ok(Ok(())) => debug!("Sent quit to {}", self.endpoint.addr()),
                Ok(Err(e)) => warn!("Failed to send quit to {}: {}", self.endpoint.addr(), e),
                Err(e) => warn!("Failed to send quit to {}: {}", self.endpoint.addr(), e),
            }
            info!("Disconnected from ServerQuery at {}", self.endpoint.addr());
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Select the virtual server later commands apply to.
    pub async fn use_server(&self, selector: VirtualServerSelector) -> Result<()> {
        self.exec(&selector.to_command()).await?;
        Ok(())
    }

    pub async fn client_list(&self) -> Result<Vec<Ts3Client>> {
        self.exec("clientlist")
            .await?
            .iter()
            .map(|record| {
                Ts3Client::from_record(record).ok_or_else(|| {
                    Ts3Error::MalformedReply(format!("clientlist entry without nickname: {:?}", record))
                })
            })
            .collect()
    }

    /// Run one command and collect its data records up to the status line.
    pub async fn exec(&self, command: &str) -> Result<Vec<Record>> {
        let limit = self.endpoint.command_timeout;
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Ts3Error::NotConnected(self.endpoint.addr()))?;

        debug!("ServerQuery -> {}", command);
        bounded(limit, conn.send(command)).await??;

        let mut records = Vec::new();
        loop {
            let line = next_line(conn, limit).await?;
            if reply::is_notification(&line) {
                debug!("Skipping notification: {}", line);
                continue;
            }
            if let Some(status) = reply::parse_status(&line) {
                status?;
                debug!("ServerQuery <- {} record(s)", records.len());
                return Ok(records);
            }
            records.extend(reply::parse_records(&line));
        }
    }
}

async fn bounded<F: Future>(limit: Duration, fut: F) -> Result<F::Output> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Ts3Error::Timeout(limit))
}

/// Next non-empty line. Replies end in `\n\r`, so the `\r` lands at the
/// start of the following line.
async fn next_line(conn: &mut Connection, limit: Duration) -> Result<String> {
    loop {
        let line = match bounded(limit, conn.next()).await? {
            Some(line) => line?,
            None => return Err(Ts3Error::ConnectionClosed),
        };
        let line = line.trim_matches(|c| c == '\r' || c == '\n');
        if !line.is_empty() {
            return Ok(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const CLIENTLIST: &str = "clid=1 cid=1 client_database_id=1 client_nickname=serveradmin\\sfrom\\s127.0.0.1:51234 client_type=1|clid=5 cid=2 client_database_id=12 client_nickname=SinusBot\\svia\\sTravis\\sCI1 client_type=0";

    /// Minimal ServerQuery lookalike. Every received command is forwarded on
    /// the returned channel.
    async fn fake_server(banner: &'static str) -> (Ts3Endpoint, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            write.write_all(banner.as_bytes()).await.unwrap();
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx.send(line.clone());
                let reply = match line.as_str() {
                    "use port=1489" | "use sid=1" => "error id=0 msg=ok\n\r".to_string(),
                    "use port=9999" => "error id=1024 msg=invalid\\sserverID\n\r".to_string(),
                    "clientlist" => format!(
                        "notifycliententerview cfid=0 ctid=1 clid=9\n\r{}\n\rerror id=0 msg=ok\n\r",
                        CLIENTLIST
                    ),
                    "quit" => {
                        let _ = write.write_all(b"error id=0 msg=ok\n\r").await;
                        break;
                    }
                    _ => "error id=256 msg=command\\snot\\sfound\n\r".to_string(),
                };
                if write.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let endpoint = Ts3Endpoint {
            host: "127.0.0.1".to_string(),
            query_port: port,
            command_timeout: Duration::from_secs(2),
        };
        (endpoint, rx)
    }

    const GREETING: &str = "TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands.\n\r";

    #[tokio::test]
    async fn lists_clients_after_selecting_server() -> anyhow::Result<()> {
        let (endpoint, mut commands) = fake_server(GREETING).await;
        let client = Ts3QueryClient::new(endpoint);

        client.connect().await?;
        assert!(client.is_connected().await);
        client.use_server(VirtualServerSelector::Port(1489)).await?;
        let clients = client.client_list().await?;
        client.disconnect().await;

        assert_eq!(clients.len(), 2);
        assert!(clients[0].is_query_client());
        assert_eq!(clients[1].nickname, "SinusBot via Travis CI1");
        assert_eq!(clients[1].clid, Some(5));
        assert!(!client.is_connected().await);

        assert_eq!(commands.recv().await.as_deref(), Some("use port=1489"));
        assert_eq!(commands.recv().await.as_deref(), Some("clientlist"));
        assert_eq!(commands.recv().await.as_deref(), Some("quit"));
        Ok(())
    }

    #[tokio::test]
    async fn server_error_is_reported_with_id() {
        let (endpoint, _commands) = fake_server(GREETING).await;
        let client = Ts3QueryClient::new(endpoint);
        client.connect().await.unwrap();

        let err = client.use_server(VirtualServerSelector::Port(9999)).await.unwrap_err();
        match err {
            Ts3Error::Command { id, message } => {
                assert_eq!(id, 1024);
                assert_eq!(message, "invalid serverID");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        client.disconnect().await;
    }

    #[tokio::test]
    async fn rejects_non_query_greeting() {
        let (endpoint, _commands) = fake_server("SSH-2.0-OpenSSH_9.6\r\n").await;
        let client = Ts3QueryClient::new(endpoint);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Ts3Error::NotServerQuery { .. }));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn exec_without_connect_fails() {
        let client = Ts3QueryClient::new(Ts3Endpoint::default());
        let err = client.client_list().await.unwrap_err();
        assert!(matches!(err, Ts3Error::NotConnected(_)));
        // no-op without a session
        client.disconnect().await;
    }

    #[tokio::test]
    async fn unreachable_port_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = Ts3QueryClient::new(Ts3Endpoint {
            host: "127.0.0.1".to_string(),
            query_port: port,
            command_timeout: Duration::from_secs(2),
        });
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Ts3Error::ConnectionError(_)));
    }
}
