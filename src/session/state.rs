use serde::Serialize;
use tokio::time::Instant;

use crate::{
    coach::{CoachScheduler, NoteRequest, SchedulerState},
    models::{Job, NoteEntry, ScalarSummary, TelemetrySample},
    series::SeriesAggregator,
    stream::StreamEvent,
    urls::UrlResolver,
};

use super::events::DashboardEvent;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Finished,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Failed)
    }
}

/// Everything displayed for one job. Built fresh per job and never shared
/// across jobs.
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub job: Job,
    pub status: SessionStatus,
    pub original_url: String,
    pub series: SeriesAggregator,
    pub summary: ScalarSummary,
    pub notes: Vec<NoteEntry>,
    pub charts: Vec<String>,
    pub current_frame: Option<String>,
    pub processed_video_url: Option<String>,
    pub error: Option<String>,
    pub scheduler: SchedulerState,
}

impl SessionState {
    pub fn new(session_id: String, job: Job, resolver: &UrlResolver) -> Self {
        let original_url = resolver.absolutize(&job.original_asset_ref);
        Self {
            session_id,
            job,
            status: SessionStatus::Streaming,
            original_url,
            series: SeriesAggregator::new(),
            summary: ScalarSummary::default(),
            notes: Vec::new(),
            charts: Vec::new(),
            current_frame: None,
            processed_video_url: None,
            error: None,
            scheduler: SchedulerState::default(),
        }
    }

    pub fn started_event(&self) -> DashboardEvent {
        DashboardEvent::SessionStarted {
            session_id: self.session_id.clone(),
            job_id: self.job.id.clone(),
            original_url: self.original_url.clone(),
        }
    }

    /// Folds one stream event into the session. Returns the resulting
    /// dashboard update, or `None` once the session is finished or failed.
    pub fn apply(&mut self, event: StreamEvent, received_at: Instant) -> Option<DashboardEvent> {
        if self.status.is_terminal() {
            return None;
        }

        let update = match event {
            StreamEvent::Frame { image, progress } => {
                if let Some(progress) = progress {
                    self.summary.set_progress(progress);
                }
                if image.is_some() {
                    self.current_frame = image.clone();
                }
                DashboardEvent::FrameUpdated {
                    image,
                    progress: self.summary.progress,
                }
            }
            StreamEvent::Metric { values } => {
                if let Some(spm) = values.spm {
                    self.summary.spm = spm;
                }
                if let Some(strokes) = values.stroke_count {
                    self.summary.stroke_count = strokes;
                }
                let sample = self.series.append_at(&values, received_at);
                DashboardEvent::SampleAppended {
                    sample,
                    summary: self.summary,
                }
            }
            StreamEvent::Text { text } => {
                let note = NoteEntry::stream(text);
                self.notes.push(note.clone());
                DashboardEvent::NoteAppended { note }
            }
            StreamEvent::Charts { urls } => {
                self.charts = urls.clone();
                DashboardEvent::ChartsReplaced { urls }
            }
            StreamEvent::Complete {
                processed_video_url,
            } => {
                self.status = SessionStatus::Finished;
                self.processed_video_url = processed_video_url.clone();
                DashboardEvent::Completed {
                    processed_video_url,
                }
            }
            StreamEvent::Failed { error } => {
                let message = error.to_string();
                self.status = SessionStatus::Failed;
                self.error = Some(message.clone());
                DashboardEvent::Failed { message }
            }
        };
        Some(update)
    }

    /// Scheduler tick against the current series and notes.
    pub fn prepare_note(&mut self, coach: &CoachScheduler, now: Instant) -> Option<NoteRequest> {
        coach.prepare(
            &mut self.scheduler,
            now,
            &self.series,
            &self.summary,
            &self.notes,
        )
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            session_id: Some(self.session_id.clone()),
            job_id: Some(self.job.id.clone()),
            status: self.status,
            original_url: Some(self.original_url.clone()),
            processed_video_url: self.processed_video_url.clone(),
            current_frame: self.current_frame.clone(),
            summary: self.summary,
            series: self.series.samples().to_vec(),
            notes: self.notes.clone(),
            charts: self.charts.clone(),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub session_id: Option<String>,
    pub job_id: Option<String>,
    pub status: SessionStatus,
    pub original_url: Option<String>,
    pub processed_video_url: Option<String>,
    pub current_frame: Option<String>,
    pub summary: ScalarSummary,
    pub series: Vec<TelemetrySample>,
    pub notes: Vec<NoteEntry>,
    pub charts: Vec<String>,
    pub error: Option<String>,
}
