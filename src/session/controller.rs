use std::sync::Arc;

use anyhow::Result;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    coach::{finish, CoachScheduler, NoteRequest},
    error::LaunchError,
    job::JobLauncher,
    models::{Job, NoteEntry, VideoAsset},
    stream::{ConnectionState, StreamClient, StreamConnection, StreamEvent},
    urls::UrlResolver,
};

use super::{
    events::{DashboardEvent, EventSink},
    state::{DashboardSnapshot, SessionState, SessionStatus},
};

// Set to false to silence session lifecycle diagnostics
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Drives one analysis at a time: upload, stream, aggregate, coach.
#[derive(Clone)]
pub struct SessionController {
    launcher: JobLauncher,
    stream: StreamClient,
    resolver: UrlResolver,
    coach: CoachScheduler,
    sink: Arc<dyn EventSink>,
    active: Arc<Mutex<Option<LiveSession>>>,
}

/// Handles shared by the tasks of one session.
#[derive(Clone)]
struct SessionContext {
    state: Arc<Mutex<SessionState>>,
    status: Arc<watch::Sender<SessionStatus>>,
    coach: CoachScheduler,
    sink: Arc<dyn EventSink>,
    cancel_token: CancellationToken,
}

struct LiveSession {
    context: SessionContext,
    connection: StreamConnection,
    pump: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Cancels the pump and any note request, then closes the connection.
    async fn teardown(mut self) {
        let job_id = self.connection.job_id().to_string();
        log_debug!("tearing down session for job {}", job_id);

        self.context.cancel_token.cancel();
        if let Err(err) = self.connection.shutdown().await {
            log_warn!("stream for job {} did not shut down cleanly: {}", job_id, err);
        }
        if let Some(handle) = self.pump.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.context.cancel_token.cancel();
    }
}

impl SessionController {
    pub fn new(resolver: UrlResolver, coach: CoachScheduler, sink: Arc<dyn EventSink>) -> Self {
        Self {
            launcher: JobLauncher::new(resolver.clone()),
            stream: StreamClient::new(resolver.clone()),
            resolver,
            coach,
            sink,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces whatever session is active with a new one for `asset`.
    /// The previous connection is closed before the upload starts.
    pub async fn start_job(&self, asset: VideoAsset) -> Result<Job, LaunchError> {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            previous.teardown().await;
        }

        let job = match self.launcher.start(asset).await {
            Ok(job) => job,
            Err(err) => {
                self.sink.emit(DashboardEvent::Failed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let mut state = SessionState::new(session_id, job.clone(), &self.resolver);
        self.sink.emit(state.started_event());
        state.series.reset();

        let context = SessionContext {
            status: Arc::new(watch::channel(state.status).0),
            state: Arc::new(Mutex::new(state)),
            coach: self.coach.clone(),
            sink: self.sink.clone(),
            cancel_token: CancellationToken::new(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = self.stream.subscribe(&job, tx);
        let pump = tokio::spawn(pump_events(rx, context.clone()));

        log_info!("session started for job {}", job.id);
        let replaced = self.active.lock().await.replace(LiveSession {
            context,
            connection,
            pump: Some(pump),
        });
        // A concurrent start_job installed its session while this upload ran.
        if let Some(replaced) = replaced {
            replaced.teardown().await;
        }
        Ok(job)
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(session) => session.context.state.clone(),
                None => return DashboardSnapshot::default(),
            }
        };
        let guard = state.lock().await;
        guard.snapshot()
    }

    /// Tears down the active session, returning its final snapshot.
    pub async fn stop(&self) -> Result<Option<DashboardSnapshot>> {
        let Some(session) = self.active.lock().await.take() else {
            return Ok(None);
        };
        let state = session.context.state.clone();
        session.teardown().await;
        let snapshot = state.lock().await.snapshot();
        log_info!("session for job {:?} stopped", snapshot.job_id);
        Ok(Some(snapshot))
    }

    /// Resolves once the active session is finished or failed. Returns the
    /// last known status if the session is torn down first.
    pub async fn wait_finished(&self) -> SessionStatus {
        let mut status = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(session) => session.context.status.subscribe(),
                None => return SessionStatus::Idle,
            }
        };
        // An error here means the session was dropped; report where it stopped.
        let _ = status.wait_for(|status| status.is_terminal()).await;
        let current = *status.borrow();
        current
    }

    pub async fn connection_state(&self) -> Option<ConnectionState> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| session.connection.state())
    }

    pub async fn watch_connection(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| session.connection.watch_state())
    }
}

/// Applies stream events strictly in arrival order until the session ends.
async fn pump_events(mut events: mpsc::UnboundedReceiver<StreamEvent>, context: SessionContext) {
    loop {
        let event = tokio::select! {
            _ = context.cancel_token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let is_metric = matches!(event, StreamEvent::Metric { .. });
        let (update, request, status) = {
            let mut state = context.state.lock().await;
            let update = state.apply(event, Instant::now());
            let request = if is_metric && update.is_some() {
                state.prepare_note(&context.coach, Instant::now())
            } else {
                None
            };
            (update, request, state.status)
        };

        if let Some(update) = update {
            context.sink.emit(update);
        }
        context.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if let Some(request) = request {
            spawn_note_request(context.clone(), request);
        }
        if status.is_terminal() {
            log_info!("session reached {:?}", status);
            break;
        }
    }
}

fn spawn_note_request(context: SessionContext, request: NoteRequest) {
    tokio::spawn(async move {
        let text = tokio::select! {
            _ = context.cancel_token.cancelled() => return,
            text = context.coach.run_quietly(&request) => text,
        };

        let note = {
            let mut state = context.state.lock().await;
            if context.cancel_token.is_cancelled() {
                return;
            }
            state.scheduler = finish(state.scheduler, Instant::now());
            text.map(|text| {
                let note = NoteEntry::generated(text);
                state.notes.push(note.clone());
                note
            })
        };
        if let Some(note) = note {
            context.sink.emit(DashboardEvent::NoteAppended { note });
        }
    });
}
