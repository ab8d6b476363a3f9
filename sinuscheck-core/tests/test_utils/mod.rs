// tests/test_utils/mod.rs

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sinuscheck_common::config::{
    ControlPlaneConfig, InstanceTarget, SettleStrategy, VerifierConfig, VoiceServerConfig,
};
use sinuscheck_common::models::Credentials;
use sinuscheck_ts3::VirtualServerSelector;

pub const MARKER: &str = "SinusBot via Travis CI";

/// Status codes the fake control plane answers with, per endpoint.
pub struct ControlPlaneScript {
    pub bot_id: u16,
    pub settings: u16,
    pub spawn: u16,
    pub instances: serde_json::Value,
}

impl Default for ControlPlaneScript {
    fn default() -> Self {
        Self {
            bot_id: 200,
            settings: 200,
            spawn: 200,
            instances: json!([{"uuid": "abc"}]),
        }
    }
}

pub async fn fake_control_plane(script: ControlPlaneScript) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/botId"))
        .respond_with(ResponseTemplate::new(script.bot_id).set_body_json(json!({"defaultBotId": "bot-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bot/instances"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(script.instances))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bot/i/abc/settings"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(script.settings))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bot/i/abc/spawn"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(script.spawn))
        .mount(&server)
        .await;

    server
}

/// A ServerQuery lookalike that serves `clientlist` with the given nicknames
/// (already escaped) and reports every command it receives.
pub async fn fake_query_server(nicknames: &[&str]) -> (u16, mpsc::UnboundedReceiver<String>) {
    let clientlist = nicknames
        .iter()
        .enumerate()
        .map(|(i, nick)| format!("clid={} cid=1 client_database_id={} client_nickname={} client_type=0", i + 1, i + 10, nick))
        .collect::<Vec<_>>()
        .join("|");
    let reply = if clientlist.is_empty() {
        "error id=0 msg=ok\n\r".to_string()
    } else {
        format!("{}\n\rerror id=0 msg=ok\n\r", clientlist)
    };
    serve_query(reply).await
}

/// Like [`fake_query_server`], but `clientlist` answers with a server error.
pub async fn failing_clientlist_server() -> (u16, mpsc::UnboundedReceiver<String>) {
    serve_query("error id=2568 msg=insufficient\\sclient\\spermissions\n\r".to_string()).await
}

async fn serve_query(clientlist_reply: String) -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let clientlist_reply = clientlist_reply.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                if write
                    .write_all(b"TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface.\n\r")
                    .await
                    .is_err()
                {
                    return;
                }
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(line.clone());
                    let reply = match line.as_str() {
                        "use port=1489" => "error id=0 msg=ok\n\r".to_string(),
                        "clientlist" => clientlist_reply.clone(),
                        "quit" => {
                            let _ = write.write_all(b"error id=0 msg=ok\n\r").await;
                            return;
                        }
                        _ => "error id=1024 msg=invalid\\sserverID\n\r".to_string(),
                    };
                    if write.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (port, rx)
}

pub fn verifier_config(control_plane: &MockServer, query_port: u16) -> VerifierConfig {
    VerifierConfig {
        control_plane: ControlPlaneConfig {
            base_url: Url::parse(&control_plane.uri()).unwrap(),
            username: "admin".into(),
            strict_login_status: false,
        },
        voice_server: VoiceServerConfig {
            host: "127.0.0.1".into(),
            query_port,
            selector: VirtualServerSelector::Port(1489),
            command_timeout: Duration::from_secs(2),
        },
        instance: InstanceTarget {
            nickname: MARKER.into(),
            server_host: "sinusbot.com".into(),
        },
        settle: SettleStrategy::Fixed {
            delay: Duration::from_millis(20),
        },
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "admin".into(),
        password: "secret".into(),
    }
}

pub async fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(Some(line)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        seen.push(line);
    }
    seen
}
