//! WebSocket transport for stream sessions.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS (admission is checked before the upgrade)
//! - Own the write half behind a lock
//! - Watch the read half and fire `closed()` on peer close or read error
//!
//! Inbound data frames are ignored: stream sessions are push-only.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use relaykit_core::{Failure, Result};

use crate::stream::{CloseTransport, SessionHandle, StreamSessionManager, StreamTransport};

pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    peer_closed: CancellationToken,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Arc<Self> {
        let (sink, stream) = socket.split();
        let peer_closed = CancellationToken::new();
        tokio::spawn(watch_peer(stream, peer_closed.clone()));

        Arc::new(Self {
            sink: Mutex::new(sink),
            peer_closed,
        })
    }
}

async fn watch_peer(mut stream: SplitStream<WebSocket>, peer_closed: CancellationToken) {
    loop {
        tokio::select! {
            _ = peer_closed.cancelled() => return,
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "websocket read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
    peer_closed.cancel();
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn write(&self, frame: String) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(Failure::internal)
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        let sent = sink
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "".into(),
            })))
            .await;
        // stop the reader whether or not the close frame went out
        self.peer_closed.cancel();
        sent.map_err(Failure::internal)?;
        sink.close().await.map_err(Failure::internal)
    }

    async fn closed(&self) {
        self.peer_closed.cancelled().await;
    }
}

/// Upgrade to a WebSocket and hand the transport to `open`.
///
/// Over capacity, the request is answered with a `SERVICE_UNAVAILABLE`
/// envelope instead of upgrading. If `open` fails after the upgrade, the
/// failure is routed and the socket closed.
pub fn accept_stream<F>(ws: WebSocketUpgrade, streams: &StreamSessionManager, open: F) -> Response
where
    F: FnOnce(Arc<dyn StreamTransport>) -> Result<SessionHandle> + Send + 'static,
{
    if let Err(failure) = streams.admit() {
        return streams.router().respond(failure);
    }

    let router = streams.router().clone();
    ws.on_upgrade(move |socket| async move {
        let transport: Arc<dyn StreamTransport> = WsTransport::new(socket);
        if let Err(failure) = open(Arc::clone(&transport)) {
            router.handle(failure, CloseTransport(transport)).await;
        }
    })
}
