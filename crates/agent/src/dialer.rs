//! Establishes the WebSocket connection to the gateway.

use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};
use mission_protocol::constants::BEARER_PREFIX;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// A boxed future returned by [`Dialer::dial`].
pub type DialFuture<'a, S> = Pin<Box<dyn Future<Output = Result<S, tungstenite::Error>> + Send + 'a>>;

/// Opens connections for the reconnect supervisor.
pub trait Dialer: Send + Sync {
    type Socket: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
        + Send
        + 'static;

    fn dial(&self) -> DialFuture<'_, Self::Socket>;

    /// Where this dialer connects to, for logs.
    fn endpoint(&self) -> &str;
}

/// Dials the gateway's agent endpoint, presenting the shared secret as a
/// bearer token when one is configured.
#[derive(Debug, Clone)]
pub struct WsDialer {
    url: String,
    secret: String,
}

impl WsDialer {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
        }
    }
}

impl Dialer for WsDialer {
    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn dial(&self) -> DialFuture<'_, Self::Socket> {
        Box::pin(async move {
            let mut request = self.url.as_str().into_client_request()?;
            if !self.secret.is_empty() {
                let value = HeaderValue::from_str(&format!("{BEARER_PREFIX}{}", self.secret))
                    .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            let (socket, _) = tokio_tungstenite::connect_async(request).await?;
            Ok(socket)
        })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
