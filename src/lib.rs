use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Error types for the wsgat library
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Socket and terminal I/O errors (bind, accept, stdin, stdout)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake and framing errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Malformed URL or origin
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `--header` entry that is not `Name:Value`
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// Result type for the wsgat library
pub type Result<T> = std::result::Result<T, GatewayError>;

pub mod cli;
pub mod common;
pub mod console;
pub mod security;
pub mod websocket;

// Re-export main types for convenience
pub use common::{LineSource, MessageSink, MessageSource, Received};
pub use console::{
    AnsiConsole, Console, Mode, Presenter, SessionEnd, StdinLines, Style, run_session,
};
pub use security::{ConnectionSlot, SlotGuard};
pub use websocket::{ConnectConfig, ListenConfig, ListenServer};
