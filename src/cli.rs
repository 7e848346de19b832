use crate::Result;
use crate::websocket::{
    ConnectConfig, DEFAULT_ORIGIN, DEFAULT_PROTOCOL_VERSION, ListenConfig, parse_header,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wsgat", author, version, about = "Interactive WebSocket console", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen on a port and talk to the first client that connects.
    Listen(ListenArgs),
    /// Connect to a WebSocket server.
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// TCP port to accept connections on.
    pub port: u16,
}

impl ListenArgs {
    pub fn into_config(self) -> ListenConfig {
        ListenConfig::for_port(self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Server URL, e.g. ws://localhost:8080/
    pub url: String,

    /// Protocol version.
    #[arg(short, long, default_value_t = DEFAULT_PROTOCOL_VERSION)]
    pub protocol: u16,

    /// Origin.
    #[arg(short, long, default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Subprotocol.
    #[arg(short, long)]
    pub subprotocol: Option<String>,

    /// Add basic HTTP authentication header.
    #[arg(long, value_name = "USER:PASS")]
    pub auth: Option<String>,

    /// Set an HTTP header. Repeat to set multiple.
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

impl ConnectArgs {
    /// Validates every option; nothing is dialed if this fails
    pub fn into_config(self) -> Result<ConnectConfig> {
        let mut config = ConnectConfig::new(&self.url)?.with_origin(&self.origin)?;
        config.protocol_version = self.protocol;
        config.subprotocol = self.subprotocol.filter(|s| !s.is_empty());
        config.auth = self.auth.filter(|s| !s.is_empty());
        config.headers = self
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<_>>()?;
        Ok(config)
    }
}
