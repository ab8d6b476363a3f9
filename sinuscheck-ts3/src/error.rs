use thiserror::Error;

#[derive(Error, Debug)]
pub enum Ts3Error {
    #[error("Connection error: {0}")]
    ConnectionError(#[from] std::io::Error),

    #[error("Unexpected greeting from {addr}: {line:?}")]
    NotServerQuery { addr: String, line: String },

    #[error("Timed out after {0:?} waiting for the query server")]
    Timeout(std::time::Duration),

    #[error("Connection closed by the query server")]
    ConnectionClosed,

    #[error("Query error {id}: {message}")]
    Command { id: u32, message: String },

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("Line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("Query client not connected to {0}")]
    NotConnected(String),
}

pub type Result<T> = std::result::Result<T, Ts3Error>;
