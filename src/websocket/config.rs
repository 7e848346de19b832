use crate::{GatewayError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, ORIGIN, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION};
use http::{HeaderName, HeaderValue};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use url::Url;

/// WebSocket protocol version sent when none is given
pub const DEFAULT_PROTOCOL_VERSION: u16 = 13;

/// Origin sent when none is given
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// Largest inbound message accepted before the session ends
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Listening-mode configuration
///
/// # Examples
///
/// ```
/// use wsgat::websocket::ListenConfig;
///
/// let config = ListenConfig::for_port(8080);
/// assert_eq!(config.bind_addr.port(), 8080);
/// assert_eq!(config.path, "/");
/// ```
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Address to bind the listener to
    pub bind_addr: SocketAddr,
    /// Only upgrade requests for this path; others get a 404
    pub path: String,
    /// Inbound messages larger than this end the session
    pub max_message_size: usize,
    /// Time a peer gets to complete the upgrade
    pub handshake_timeout: Duration,
}

impl ListenConfig {
    /// Listens on every interface at `port`
    pub fn for_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            ..Self::default()
        }
    }

    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default().max_message_size(Some(self.max_message_size))
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            path: "/".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            handshake_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Dialing-mode configuration
///
/// Everything here is validated before any connection attempt.
///
/// # Examples
///
/// ```
/// use wsgat::websocket::ConnectConfig;
///
/// let config = ConnectConfig::new("ws://127.0.0.1:9000/chat")
///     .unwrap()
///     .with_header("X-Test:1")
///     .unwrap();
/// let request = config.client_request().unwrap();
/// assert_eq!(request.headers()["x-test"], "1");
/// assert_eq!(request.headers()["origin"], "http://localhost/");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server to dial (`ws://` or `wss://`)
    pub url: Url,
    /// Value of `Sec-WebSocket-Version`
    pub protocol_version: u16,
    /// Value of `Origin`
    pub origin: Url,
    /// Requested subprotocol, if any
    pub subprotocol: Option<String>,
    /// `USER:PASS` for HTTP Basic authentication
    pub auth: Option<String>,
    /// Extra request headers, sent in order
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Inbound messages larger than this end the session
    pub max_message_size: usize,
    /// Time allowed for TCP connect plus upgrade
    pub connect_timeout: Duration,
}

impl ConnectConfig {
    /// Validates `url` and fills in every other field with its default
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(GatewayError::Config(format!(
                "unsupported scheme {:?}, expected ws or wss",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            origin: Url::parse(DEFAULT_ORIGIN)?,
            subprotocol: None,
            auth: None,
            headers: Vec::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connect_timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = Url::parse(origin)?;
        Ok(self)
    }

    /// Adds a raw `Name:Value` header
    pub fn with_header(mut self, raw: &str) -> Result<Self> {
        self.headers.push(parse_header(raw)?);
        Ok(self)
    }

    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default().max_message_size(Some(self.max_message_size))
    }

    /// Builds the upgrade request sent to the server
    pub fn client_request(&self) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();

        headers.insert(ORIGIN, header_value(self.origin.as_str())?);
        headers.insert(
            SEC_WEBSOCKET_VERSION,
            HeaderValue::from(self.protocol_version),
        );
        if let Some(subprotocol) = &self.subprotocol {
            headers.insert(SEC_WEBSOCKET_PROTOCOL, header_value(subprotocol)?);
        }
        if let Some(auth) = &self.auth {
            headers.append(AUTHORIZATION, header_value(&basic_auth(auth))?);
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        Ok(request)
    }
}

/// Parses a `Name:Value` header given on the command line
///
/// Splits at the first colon, so values may contain colons themselves.
/// Whitespace after the colon is dropped.
///
/// ```
/// use wsgat::websocket::parse_header;
///
/// let (name, value) = parse_header("X-Test:1").unwrap();
/// assert_eq!(name, "X-Test");
/// assert_eq!(value, "1");
/// assert!(parse_header("malformed").is_err());
/// ```
pub fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let invalid = || GatewayError::InvalidHeader(raw.to_string());
    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim_start()).map_err(|_| invalid())?;
    Ok((name, value))
}

/// `Authorization` value for HTTP Basic credentials given as `USER:PASS`
pub fn basic_auth(credentials: &str) -> String {
    format!("Basic {}", STANDARD.encode(credentials))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Config(format!("invalid header value: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_config_default() {
        let config = ListenConfig::default();
        assert_eq!(config.bind_addr.port(), 0);
        assert_eq!(config.path, "/");
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_listen_on_all_interfaces() {
        let config = ListenConfig::for_port(4040);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.bind_addr.port(), 4040);
    }

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("X-Test:1").unwrap();
        assert_eq!(name, "X-Test");
        assert_eq!(value, "1");

        let (name, value) = parse_header("Host: example.com:8080").unwrap();
        assert_eq!(name, "host");
        assert_eq!(value, "example.com:8080");

        let (_, value) = parse_header("X-Empty:").unwrap();
        assert_eq!(value, "");
    }

    #[test]
    fn test_parse_header_rejects_malformed_entries() {
        for raw in ["malformed", "", ":value", "bad name:1", "X-Line:a\nb"] {
            match parse_header(raw) {
                Err(GatewayError::InvalidHeader(entry)) => assert_eq!(entry, raw),
                other => panic!("expected invalid header for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_basic_auth() {
        assert_eq!(basic_auth("user:pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_connect_config_defaults() {
        let config = ConnectConfig::new("ws://localhost:9000/").unwrap();
        assert_eq!(config.protocol_version, 13);
        assert_eq!(config.origin.as_str(), "http://localhost/");
        assert!(config.subprotocol.is_none());
        assert!(config.auth.is_none());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_connect_config_rejects_bad_urls() {
        assert!(matches!(
            ConnectConfig::new("not a url"),
            Err(GatewayError::Url(_))
        ));
        assert!(matches!(
            ConnectConfig::new("http://localhost/"),
            Err(GatewayError::Config(_))
        ));
        assert!(
            ConnectConfig::new("ws://localhost/")
                .unwrap()
                .with_origin("nope")
                .is_err()
        );
    }

    #[test]
    fn test_client_request_headers() {
        let mut config = ConnectConfig::new("ws://localhost:9000/feed")
            .unwrap()
            .with_origin("http://example.com")
            .unwrap()
            .with_header("X-One:1")
            .unwrap()
            .with_header("X-One:2")
            .unwrap();
        config.protocol_version = 8;
        config.subprotocol = Some("chat".into());
        config.auth = Some("user:pass".into());

        let request = config.client_request().unwrap();
        let headers = request.headers();
        assert_eq!(request.uri().path(), "/feed");
        assert_eq!(headers[ORIGIN], "http://example.com/");
        assert_eq!(headers[SEC_WEBSOCKET_VERSION], "8");
        assert_eq!(headers[SEC_WEBSOCKET_PROTOCOL], "chat");
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
        let values: Vec<_> = headers.get_all("x-one").iter().collect();
        assert_eq!(values, ["1", "2"]);
    }

    #[test]
    fn test_client_request_without_optional_headers() {
        let config = ConnectConfig::new("ws://localhost:9000/").unwrap();
        let request = config.client_request().unwrap();
        assert_eq!(request.headers()[SEC_WEBSOCKET_VERSION], "13");
        assert!(request.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
