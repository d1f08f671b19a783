//! WebSocket transport over tokio-tungstenite.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use crate::connector::{AttemptSink, CloseRequest, ConnectionHandle, Connector};
use crate::protocol::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Real WebSocket connector. Each attempt runs on its own task.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    connect_timeout: Option<Duration>,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the handshake if it takes longer than `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: Url, sink: AttemptSink) -> ConnectionHandle {
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_attempt(url, sink, close_rx, self.connect_timeout));
        ConnectionHandle::new(close_tx, task)
    }
}

async fn run_attempt(
    url: Url,
    sink: AttemptSink,
    mut close_rx: oneshot::Receiver<CloseRequest>,
    timeout: Option<Duration>,
) {
    let attempt = sink.attempt();
    debug!(%attempt, "websocket handshake");

    let ws = tokio::select! {
        result = handshake(&url, timeout) => match result {
            Ok(ws) => ws,
            Err(e) => {
                sink.errored(e);
                return;
            }
        },
        request = &mut close_rx => {
            // Dropping the handshake future abandons the socket.
            let request = request.unwrap_or(CloseRequest::normal("handle dropped"));
            sink.closed(request.code, request.reason);
            return;
        }
    };

    sink.opened();
    pump(ws, &sink, close_rx).await;
}

async fn handshake(url: &Url, timeout: Option<Duration>) -> Result<WsStream, String> {
    let connect = connect_async(url.as_str());
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| format!("handshake timed out after {:?}", limit))?,
        None => connect.await,
    };
    result.map(|(ws, _response)| ws).map_err(|e| e.to_string())
}

/// Forward frames until the connection ends or a close is requested.
async fn pump(ws: WsStream, sink: &AttemptSink, mut close_rx: oneshot::Receiver<CloseRequest>) {
    let (mut ws_sink, mut ws_stream) = ws.split();

    loop {
        tokio::select! {
            request = &mut close_rx => {
                let request = request.unwrap_or(CloseRequest::normal("handle dropped"));
                let frame = CloseFrame {
                    code: CloseCode::from(request.code),
                    reason: request.reason.to_string().into(),
                };
                if let Err(e) = ws_sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not sent");
                }
                sink.closed(request.code, request.reason);
                return;
            }

            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => sink.frame(text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Binary(_))) => {
                        warn!("unexpected binary push frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                        sink.closed(code, reason);
                        return;
                    }
                    Some(Err(e)) => {
                        sink.errored(e.to_string());
                        return;
                    }
                    None => {
                        sink.closed(CLOSE_ABNORMAL, "stream ended");
                        return;
                    }
                }
            }
        }
    }
}
