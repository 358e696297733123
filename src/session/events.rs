use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{NoteEntry, ScalarSummary, TelemetrySample};

/// Everything the dashboard needs to redraw, in the order it happened.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DashboardEvent {
    SessionStarted {
        session_id: String,
        job_id: String,
        original_url: String,
    },
    FrameUpdated {
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        progress: f64,
    },
    SampleAppended {
        sample: TelemetrySample,
        summary: ScalarSummary,
    },
    NoteAppended {
        note: NoteEntry,
    },
    ChartsReplaced {
        urls: Vec<String>,
    },
    Completed {
        processed_video_url: Option<String>,
    },
    Failed {
        message: String,
    },
}

/// Presentation boundary. Implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: DashboardEvent);
}

impl<F> EventSink for F
where
    F: Fn(DashboardEvent) + Send + Sync + 'static,
{
    fn emit(&self, event: DashboardEvent) {
        self(event)
    }
}

/// Forwards events to an unbounded channel; a closed receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DashboardEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }
}
