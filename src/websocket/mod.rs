pub mod client;
pub mod config;
pub mod server;
pub mod transport;

pub use config::{
    ConnectConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_ORIGIN, DEFAULT_PROTOCOL_VERSION,
    ListenConfig, basic_auth, parse_header,
};
pub use server::ListenServer;
pub use transport::{WsSink, WsSource, split};
