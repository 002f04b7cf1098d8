//! WebSocket streaming server.
//!
//! One connection handler per client. In simulate/replay mode each handler
//! pulls from the shared source at its natural cadence and pushes every
//! record to its own client. In interactive mode the handler instead joins
//! the broadcast registry with its send half and forwards well-formed
//! control inputs through the bridge; the bridge broadcasts each response so
//! the submitting client and every other client see the same update.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::broadcast::{RecordSink, SinkClosed};
use crate::error::{Error, Result};
use crate::record::{ControlInput, TelemetryRecord};
use crate::source::{InteractiveBridge, SampleSource, Source};

/// The push channel for telemetry records.
#[derive(Debug)]
pub struct StreamServer {
    port: u16,
    source: Arc<Source>,
}

#[derive(Clone)]
struct StreamState {
    source: Arc<Source>,
}

impl StreamServer {
    /// Create a streaming server bound to the given source.
    #[must_use]
    pub fn new(port: u16, source: Arc<Source>) -> Self {
        Self { port, source }
    }

    /// Bind the streaming port and serve connections until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the port is unavailable, or an I/O error
    /// from the accept loop.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        info!("streaming server on ws://localhost:{}", self.port);

        let app = Router::new()
            .route("/", get(upgrade_handler))
            .with_state(StreamState {
                source: self.source,
            });
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn upgrade_handler(State(state): State<StreamState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, state.source))
}

async fn handle_client(socket: WebSocket, source: Arc<Source>) {
    debug!(source = source.name(), "streaming client connected");
    if let Some(bridge) = source.as_interactive() {
        handle_interactive(socket, bridge).await;
    } else if let Some(pull) = source.as_pull() {
        handle_pull(socket, pull).await;
    }
    debug!("streaming client disconnected");
}

/// Pull loop: push each produced record to this one client.
///
/// Exits when the source has no more data (finished or stopped) or when the
/// connection closes, whichever comes first.
async fn handle_pull(mut socket: WebSocket, source: &dyn SampleSource) {
    while let Some(record) = source.next_record().await {
        if socket
            .send(Message::Text(record.to_line().into()))
            .await
            .is_err()
        {
            break;
        }
    }
}

/// Interactive loop: receive control inputs, let the bridge respond to all.
async fn handle_interactive(socket: WebSocket, bridge: &InteractiveBridge) {
    let (sink, mut incoming) = socket.split();
    let id = bridge.registry().join(Box::new(WsSink(sink))).await;

    while let Some(Ok(message)) = incoming.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match ControlInput::parse_line(text.as_str()) {
            Some(input) => {
                bridge.exchange_and_broadcast(&input).await;
            }
            None => debug!("ignoring malformed control message"),
        }
    }

    bridge.registry().leave(id).await;
}

/// Send half of one streaming connection, registered for broadcast.
struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl RecordSink for WsSink {
    async fn deliver(&mut self, record: &TelemetryRecord) -> std::result::Result<(), SinkClosed> {
        self.0
            .send(Message::Text(record.to_line().into()))
            .await
            .map_err(|_| SinkClosed)
    }
}
