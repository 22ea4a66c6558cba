//! Socket transport behind the channel client
//!
//! The client never touches a socket directly. A [`Transport`] opens a
//! [`Connection`]: an outbound text sender plus a stream of [`SocketEvent`]s,
//! mirroring the open/message/error/close callbacks of a browser WebSocket.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ChannelError, ChannelResult};

/// Lifecycle and traffic reported by an open connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// Handle to one connection attempt.
///
/// Dropping `outbound` asks the transport to close the socket.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Opens connections to the realtime endpoint
pub trait Transport: Send + Sync {
    /// Start connecting. Returns immediately; the handshake result arrives as
    /// `Opened` or `Error` + `Closed`. An `Err` means the attempt could not
    /// even be started.
    fn open(&self, endpoint: &Url) -> ChannelResult<Connection>;
}

/// WebSocket transport built on tokio-tungstenite
#[derive(Clone, Debug, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, endpoint: &Url) -> ChannelResult<Connection> {
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ChannelError::InvalidEndpoint(endpoint.to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(endpoint.to_string(), outbound_rx, events_tx));

        Ok(Connection {
            outbound: outbound_tx,
            events: events_rx,
        })
    }
}

async fn run_socket(
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let stream = match connect_async(endpoint.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            let _ = events.send(SocketEvent::Error(err.to_string()));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };

    debug!(endpoint = %endpoint, "websocket handshake complete");
    if events.send(SocketEvent::Opened).is_err() {
        return;
    }

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(err) = sink.send(Message::Text(text.into())).await {
                            let _ = events.send(SocketEvent::Error(err.to_string()));
                            break;
                        }
                    }
                    None => {
                        // Owner dropped the connection
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                }
            }

            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(SocketEvent::Message(text.as_str().to_owned())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        debug!(len = bytes.len(), "ignoring binary websocket frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong frames are answered by tungstenite
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket read failed");
                        let _ = events.send(SocketEvent::Error(err.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events.send(SocketEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_http_endpoint() {
        let endpoint = Url::parse("http://127.0.0.1:1/ws").unwrap();
        assert!(matches!(
            WebSocketTransport.open(&endpoint),
            Err(ChannelError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_close() {
        // Port 1 is never listening in the test environment
        let endpoint = Url::parse("ws://127.0.0.1:1/ws").unwrap();
        let mut connection = WebSocketTransport.open(&endpoint).unwrap();

        assert!(matches!(
            connection.events.recv().await,
            Some(SocketEvent::Error(_))
        ));
        assert_eq!(connection.events.recv().await, Some(SocketEvent::Closed));
    }
}
