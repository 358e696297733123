use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::{error::StreamError, models::Job, urls::UrlResolver};

use super::protocol::{decode_frame, StreamEvent};

// Set to false to silence per-frame diagnostics
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Lifecycle of one connection object. `Closed` and `Errored` are final;
/// reconnecting always means building a new [`StreamConnection`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }
}

pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

/// Opens the per-job result stream.
#[derive(Clone)]
pub struct StreamClient {
    resolver: UrlResolver,
}

impl StreamClient {
    pub fn new(resolver: UrlResolver) -> Self {
        Self { resolver }
    }

    /// Starts connecting in the background and returns the owning handle
    /// immediately. Decoded events arrive on `events` in transport order.
    pub fn subscribe(&self, job: &Job, events: EventSender) -> StreamConnection {
        let url = self.resolver.stream_url(&job.id);
        let state = Arc::new(watch::channel(ConnectionState::Connecting).0);
        let cancel_token = CancellationToken::new();

        log_info!("opening stream for job {} at {}", job.id, url);

        let handle = tokio::spawn(connection_loop(
            url,
            self.resolver.clone(),
            events,
            state.clone(),
            cancel_token.clone(),
        ));

        StreamConnection {
            job_id: job.id.clone(),
            state,
            cancel_token,
            handle: Some(handle),
        }
    }
}

/// Exclusive owner of one job's connection. Dropping it closes the socket.
pub struct StreamConnection {
    job_id: String,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StreamConnection {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Idempotent; valid in any state. A connection that is not open simply
    /// stops where it is.
    pub fn close(&self) {
        if !self.cancel_token.is_cancelled() {
            log_debug!("closing stream for job {}", self.job_id);
            self.cancel_token.cancel();
        }
        transition(&self.state, ConnectionState::Closed);
    }

    /// Closes and waits for the reader task to finish its close handshake.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.close();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("stream reader task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Moves to `next` unless the connection already reached a final state.
/// Returns whether the transition happened.
fn transition(state: &watch::Sender<ConnectionState>, next: ConnectionState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() || *current == next {
            false
        } else {
            *current = next;
            true
        }
    })
}

async fn connection_loop(
    url: String,
    resolver: UrlResolver,
    events: EventSender,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel_token: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel_token.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let mut socket = match connected {
        Ok((socket, _response)) => socket,
        Err(err) => {
            log_error!("stream connection to {} failed: {}", url, err);
            if transition(&state, ConnectionState::Errored) {
                let _ = events.send(StreamEvent::Failed {
                    error: StreamError::Connection(err.to_string()),
                });
            }
            return;
        }
    };

    if !transition(&state, ConnectionState::Open) {
        // Closed by the owner while the handshake was in flight.
        let _ = socket.close(None).await;
        return;
    }
    log_debug!("stream open at {}", url);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                let _ = socket.close(None).await;
                break;
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if deliver(&text, &resolver, &events, &state) {
                        let _ = socket.close(None).await;
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        if deliver(&text, &resolver, &events, &state) {
                            let _ = socket.close(None).await;
                            break;
                        }
                    }
                    Err(_) => log_warn!("dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    if transition(&state, ConnectionState::Closed) {
                        log_warn!("backend closed stream before completion");
                        let _ = events.send(StreamEvent::Failed {
                            error: StreamError::ClosedEarly,
                        });
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log_error!("stream transport error: {}", err);
                    if transition(&state, ConnectionState::Errored) {
                        let _ = events.send(StreamEvent::Failed {
                            error: StreamError::Connection(err.to_string()),
                        });
                    }
                    break;
                }
            }
        }
    }
}

/// Decodes and forwards one frame. Returns true when the connection should
/// be closed: a terminal frame arrived or nobody is listening any more.
fn deliver(
    raw: &str,
    resolver: &UrlResolver,
    events: &EventSender,
    state: &watch::Sender<ConnectionState>,
) -> bool {
    let event = match decode_frame(raw) {
        Ok(event) => event.resolve_urls(resolver),
        Err(err) => {
            log_warn!("dropping stream frame: {}", err);
            return false;
        }
    };

    let terminal = event.is_terminal();
    if terminal {
        transition(state, ConnectionState::Closed);
    }
    if events.send(event).is_err() {
        log_debug!("stream consumer gone; closing");
        transition(state, ConnectionState::Closed);
        return true;
    }
    terminal
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::test_support::{BackendScript, Step, TestBackend};

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            created_at: Utc::now(),
            original_asset_ref: format!("/media/videos/{id}.mp4"),
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for stream event")
            .expect("stream channel closed")
    }

    #[tokio::test]
    async fn delivers_frames_in_order_and_closes_on_complete() {
        let backend = TestBackend::start(BackendScript::new(vec![
            Step::send(r#"{"type":"frame","jpg":null,"progress":0.5}"#),
            Step::send("garbage that is not json"),
            Step::send(r#"{"type":"metric","spm":40,"strokes":1}"#),
            Step::send(r#"{"type":"unknown"}"#),
            Step::send(r#"{"type":"charts","urls":["/charts/spm.png"]}"#),
            Step::send(r#"{"type":"complete","processed_video_url":"/media/videos/j1.mp4"}"#),
            Step::send(r#"{"type":"text","text":"late"}"#),
            Step::Hold,
        ]))
        .await;
        let client = StreamClient::new(backend.resolver());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connection = client.subscribe(&job("j1"), tx);

        assert!(matches!(
            next_event(&mut rx).await,
            StreamEvent::Frame { progress: Some(p), .. } if p == 0.5
        ));
        assert!(matches!(next_event(&mut rx).await, StreamEvent::Metric { .. }));
        assert_eq!(
            next_event(&mut rx).await,
            StreamEvent::Charts {
                urls: vec![format!("{}/charts/spm.png", backend.base_url())]
            }
        );
        assert_eq!(
            next_event(&mut rx).await,
            StreamEvent::Complete {
                processed_video_url: Some(format!("{}/media/videos/j1.mp4", backend.base_url()))
            }
        );

        connection.shutdown().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        // Nothing after the terminal frame is delivered.
        assert!(rx.recv().await.is_none());
        assert!(backend.saw_close("j1").await);
    }

    #[tokio::test]
    async fn backend_error_frame_is_terminal() {
        let backend = TestBackend::start(BackendScript::new(vec![
            Step::send(r#"{"type":"error","message":"Video no encontrado"}"#),
            Step::Hold,
        ]))
        .await;
        let client = StreamClient::new(backend.resolver());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = client.subscribe(&job("missing"), tx);

        assert_eq!(
            next_event(&mut rx).await,
            StreamEvent::Failed {
                error: StreamError::Backend("Video no encontrado".into())
            }
        );
        assert!(rx.recv().await.is_none());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn early_server_close_is_reported_once() {
        let backend = TestBackend::start(BackendScript::new(vec![
            Step::send(r#"{"type":"metric","spm":40}"#),
            Step::Close,
        ]))
        .await;
        let client = StreamClient::new(backend.resolver());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = client.subscribe(&job("j1"), tx);

        assert!(matches!(next_event(&mut rx).await, StreamEvent::Metric { .. }));
        assert_eq!(
            next_event(&mut rx).await,
            StreamEvent::Failed {
                error: StreamError::ClosedEarly
            }
        );
        assert!(rx.recv().await.is_none());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn unreachable_backend_signals_connection_failure() {
        // Bind and immediately drop a listener so the port refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = StreamClient::new(UrlResolver::new(format!("http://{addr}")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = client.subscribe(&job("j1"), tx);

        assert!(matches!(
            next_event(&mut rx).await,
            StreamEvent::Failed {
                error: StreamError::Connection(_)
            }
        ));
        assert_eq!(connection.state(), ConnectionState::Errored);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let backend = TestBackend::start(BackendScript::new(vec![Step::Hold])).await;
        let client = StreamClient::new(backend.resolver());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connection = client.subscribe(&job("j1"), tx);
        let mut state = connection.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Open)
            .await
            .unwrap();

        connection.close();
        connection.close();
        assert_eq!(connection.state(), ConnectionState::Closed);
        connection.shutdown().await.unwrap();
        connection.shutdown().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        // An owner-initiated close is not a failure.
        assert!(rx.recv().await.is_none());
        assert!(backend.saw_close("j1").await);
    }

    #[tokio::test]
    async fn dropping_the_handle_closes_the_socket() {
        let backend = TestBackend::start(BackendScript::new(vec![Step::Hold])).await;
        let client = StreamClient::new(backend.resolver());
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = client.subscribe(&job("dropped"), tx);
        let mut state = connection.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Open)
            .await
            .unwrap();

        drop(connection);
        assert!(backend.saw_close("dropped").await);
    }

    #[tokio::test]
    async fn closing_while_connecting_never_opens() {
        let backend = TestBackend::start(BackendScript::new(vec![Step::Hold])).await;
        let client = StreamClient::new(backend.resolver());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connection = client.subscribe(&job("j1"), tx);

        assert_eq!(connection.state(), ConnectionState::Connecting);
        connection.shutdown().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(rx.recv().await.is_none());
    }
}
