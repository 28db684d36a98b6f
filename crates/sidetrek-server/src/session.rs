//! One UI connection
//!
//! Opened: run every model once. Active: the first non-empty message from
//! the UI starts the session's models watcher. Closed: the watcher is dropped
//! with the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::http::AppState;
use crate::protocol::Envelope;
use crate::watcher::ModelWatcher;

/// Rebuilt graphs waiting to be written to the socket
const PUSH_BUFFER: usize = 16;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) async fn run(socket: WebSocket, state: Arc<AppState>) {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    handle(socket, state)
        .instrument(tracing::info_span!("session", id))
        .await
}

struct Session {
    state: Arc<AppState>,
    watcher: Option<ModelWatcher>,
}

impl Session {
    fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            watcher: None,
        }
    }

    /// Start the watcher unless this session already has one
    fn activate(&mut self, push_tx: &mpsc::Sender<Envelope>) {
        if self.watcher.is_some() {
            return;
        }

        match ModelWatcher::start(
            &self.state.models_dir,
            &self.state.watch,
            Arc::clone(&self.state.builder),
            push_tx.clone(),
        ) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => tracing::error!(error = %e, "could not start models watcher"),
        }
    }
}

/// Build every model before the UI starts talking; failures are only logged
async fn open(state: &AppState) {
    if !state.run_on_connect {
        return;
    }
    match state.builder.runner().run_all().await {
        Ok(()) => tracing::info!("dbt run complete"),
        Err(e) => tracing::error!(error = %e, "dbt run failed"),
    }
}

/// Any non-empty data frame counts as the UI being ready
fn is_activation(message: &Message) -> bool {
    match message {
        Message::Text(text) => !text.as_str().is_empty(),
        Message::Binary(bytes) => !bytes.is_empty(),
        _ => false,
    }
}

async fn handle(socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("client connected");

    open(&state).await;
    let mut session = Session::new(state);

    let (mut sink, mut stream) = socket.split();
    let (push_tx, mut push_rx) = mpsc::channel::<Envelope>(PUSH_BUFFER);

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(message)) => {
                    if is_activation(&message) {
                        session.activate(&push_tx);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket receive failed");
                    break;
                }
            },
            Some(envelope) = push_rx.recv() => {
                let text = match envelope.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "websocket send failed");
                    break;
                }
                tracing::debug!("pushed dag");
            }
        }
    }

    drop(session);
    tracing::info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::ws::Utf8Bytes;

    #[test]
    fn data_frames_activate() {
        assert!(is_activation(&Message::Text(Utf8Bytes::from_static("ready"))));
        assert!(is_activation(&Message::Binary(Bytes::from_static(b"\x01"))));
    }

    #[test]
    fn empty_and_control_frames_do_not_activate() {
        assert!(!is_activation(&Message::Text(Utf8Bytes::from_static(""))));
        assert!(!is_activation(&Message::Binary(Bytes::new())));
        assert!(!is_activation(&Message::Ping(Bytes::new())));
        assert!(!is_activation(&Message::Close(None)));
    }
}
