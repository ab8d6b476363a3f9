use crate::reply;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ts3Endpoint {
    pub host: String,
    pub query_port: u16,
    pub command_timeout: Duration,
}

impl Ts3Endpoint {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.query_port)
    }
}

impl Default for Ts3Endpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            query_port: 10011,
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// How a virtual server is picked with the `use` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualServerSelector {
    /// `use port=<voice port>`
    Port(u16),
    /// `use sid=<server id>`
    Id(u32),
}

impl VirtualServerSelector {
    pub fn to_command(&self) -> String {
        match self {
            VirtualServerSelector::Port(port) => reply::command("use", &[("port", port.to_string())]),
            VirtualServerSelector::Id(sid) => reply::command("use", &[("sid", sid.to_string())]),
        }
    }
}

/// One `key=value` record of a query reply, values already unescaped.
pub type Record = HashMap<String, String>;

/// A connected client as reported by `clientlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ts3Client {
    pub clid: Option<u32>,
    pub cid: Option<u32>,
    pub database_id: Option<u32>,
    pub nickname: String,
    /// 0 = voice client, 1 = query client
    pub client_type: Option<u8>,
}

impl Ts3Client {
    pub fn from_record(record: &Record) -> Option<Self> {
        let nickname = record.get("client_nickname")?.clone();
        Some(Self {
            clid: record.get("clid").and_then(|v| v.parse().ok()),
            cid: record.get("cid").and_then(|v| v.parse().ok()),
            database_id: record.get("client_database_id").and_then(|v| v.parse().ok()),
            nickname,
            client_type: record.get("client_type").and_then(|v| v.parse().ok()),
        })
    }

    pub fn is_query_client(&self) -> bool {
        self.client_type == Some(1)
    }
}
