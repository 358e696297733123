//! In-process stand-in for the processing backend: `POST /start-job` and the
//! `/ws/process` stream, driven by a per-job script.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::urls::UrlResolver;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Send(String),
    Sleep(Duration),
    /// Send a close frame and stop.
    Close,
    /// Keep the socket open until the client closes it.
    Hold,
}

impl Step {
    pub(crate) fn send(frame: &str) -> Self {
        Step::Send(frame.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BackendScript {
    default_steps: Vec<Step>,
    per_job: HashMap<String, Vec<Step>>,
    start_failure: Option<(u16, String)>,
    start_delay: Option<Duration>,
}

impl BackendScript {
    pub(crate) fn new(default_steps: Vec<Step>) -> Self {
        Self {
            default_steps,
            ..Self::default()
        }
    }

    /// Jobs are numbered `job-1`, `job-2`, ... in upload order.
    pub(crate) fn for_job(mut self, job_id: &str, steps: Vec<Step>) -> Self {
        self.per_job.insert(job_id.to_string(), steps);
        self
    }

    pub(crate) fn failing_start(mut self, status: u16, body: &str) -> Self {
        self.start_failure = Some((status, body.to_string()));
        self
    }

    /// Holds every `/start-job` response back by `delay`.
    pub(crate) fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    fn steps_for(&self, job_id: &str) -> Vec<Step> {
        self.per_job
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| self.default_steps.clone())
    }
}

struct Shared {
    script: BackendScript,
    next_job: AtomicUsize,
    log: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl Shared {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

pub(crate) struct TestBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl TestBackend {
    pub(crate) async fn start(script: BackendScript) -> Self {
        let shared = Arc::new(Shared {
            script,
            next_job: AtomicUsize::new(1),
            log: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/start-job", post(start_job))
            .route("/ws/process", get(process_stream))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, shared }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn resolver(&self) -> UrlResolver {
        UrlResolver::new(format!("{}/", self.base_url()))
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.shared.log.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<Vec<u8>> {
        self.shared.uploads.lock().unwrap().clone()
    }

    /// Waits (bounded) until the server has seen the client close `job_id`.
    pub(crate) async fn saw_close(&self, job_id: &str) -> bool {
        let needle = format!("close:{job_id}");
        for _ in 0..50 {
            if self.log().contains(&needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }
}

async fn start_job(State(shared): State<Arc<Shared>>, body: Bytes) -> Response {
    shared.uploads.lock().unwrap().push(body.to_vec());
    if let Some(delay) = shared.script.start_delay {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, text)) = &shared.script.start_failure {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, text.clone()).into_response();
    }

    let job_id = format!("job-{}", shared.next_job.fetch_add(1, Ordering::SeqCst));
    shared.record(format!("start:{job_id}"));
    Json(json!({
        "job_id": job_id,
        "original_url": format!("/media/videos/{job_id}.mp4"),
        "status": "queued",
    }))
    .into_response()
}

async fn process_stream(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(shared): State<Arc<Shared>>,
) -> Response {
    let job_id = query.get("job_id").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| play(socket, job_id, shared))
}

async fn play(mut socket: WebSocket, job_id: String, shared: Arc<Shared>) {
    shared.record(format!("open:{job_id}"));
    for step in shared.script.steps_for(&job_id) {
        match step {
            Step::Send(frame) => {
                if socket.send(Message::Text(frame)).await.is_err() {
                    shared.record(format!("close:{job_id}"));
                    return;
                }
            }
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Close => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
            Step::Hold => {
                while let Some(Ok(message)) = socket.recv().await {
                    if matches!(message, Message::Close(_)) {
                        break;
                    }
                }
                shared.record(format!("close:{job_id}"));
                return;
            }
        }
    }
}
