use std::sync::Arc;

use tokio::time::{timeout, Duration, Instant};

use crate::{
    error::{ConfigurationError, NoteError, TransportError},
    models::{NoteEntry, ScalarSummary},
    series::SeriesAggregator,
};

use super::{
    config::CoachConfig,
    generator::NoteGenerator,
    prompt::{summarize, NoteRequest},
};

// Set to false to silence per-tick diagnostics
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Scheduling bookkeeping for one streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// When the last attempt finished, successfully or not.
    pub last_invocation_at: Option<Instant>,
    pub in_flight: bool,
}

/// Returns the in-flight state when an attempt may start now: nothing in
/// flight, the cooldown has passed since the last completion, and there is
/// at least one sample to summarize. `None` means "skip this tick".
pub fn try_begin(
    state: SchedulerState,
    now: Instant,
    cooldown: Duration,
    series_len: usize,
) -> Option<SchedulerState> {
    if state.in_flight || series_len == 0 {
        return None;
    }
    if let Some(last) = state.last_invocation_at {
        if now.saturating_duration_since(last) < cooldown {
            return None;
        }
    }
    Some(SchedulerState {
        in_flight: true,
        ..state
    })
}

/// Clears the in-flight flag and restarts the cooldown from `now`.
pub fn finish(state: SchedulerState, now: Instant) -> SchedulerState {
    let mut next = state;
    next.last_invocation_at = Some(now);
    next.in_flight = false;
    next
}

/// Rate-limited, single-flight access to the note generator.
#[derive(Clone)]
pub struct CoachScheduler {
    config: CoachConfig,
    generator: Arc<dyn NoteGenerator>,
    credential: Option<String>,
}

impl CoachScheduler {
    pub fn new(
        config: CoachConfig,
        generator: Arc<dyn NoteGenerator>,
        credential: Option<String>,
    ) -> Self {
        let credential = credential.filter(|key| !key.trim().is_empty());
        Self {
            config,
            generator,
            credential,
        }
    }

    /// Without a credential the scheduler never issues requests.
    pub fn is_enabled(&self) -> bool {
        self.credential.is_some()
    }

    /// Eligibility check for one tick. When eligible, `state` is switched to
    /// in flight and the request to send is returned; the caller must hand it
    /// to [`CoachScheduler::run`] and then call [`finish`].
    pub fn prepare(
        &self,
        state: &mut SchedulerState,
        now: Instant,
        series: &SeriesAggregator,
        scalar: &ScalarSummary,
        notes: &[NoteEntry],
    ) -> Option<NoteRequest> {
        if !self.is_enabled() {
            return None;
        }
        let started = try_begin(*state, now, self.config.cooldown, series.len())?;
        *state = started;

        let skip = notes.len().saturating_sub(self.config.context_notes);
        let request = NoteRequest {
            summary: summarize(
                series.window(self.config.window),
                scalar,
                self.config.averaging,
            ),
            recent_notes: notes[skip..].iter().map(NoteEntry::display_text).collect(),
        };
        log_debug!(
            "requesting coaching note (spm {:.0}, {} context notes)",
            request.summary.spm,
            request.recent_notes.len()
        );
        Some(request)
    }

    /// Runs one generation attempt under the request timeout.
    pub async fn run(&self, request: &NoteRequest) -> Result<String, NoteError> {
        let credential = self.credential.as_deref().ok_or(ConfigurationError)?;
        match timeout(
            self.config.request_timeout,
            self.generator.generate(credential, request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.config.request_timeout).into()),
        }
    }

    /// [`run`](Self::run), with failures logged and swallowed.
    pub async fn run_quietly(&self, request: &NoteRequest) -> Option<String> {
        match self.run(request).await {
            Ok(text) => Some(text),
            Err(err) => {
                log_warn!("coaching note generation failed: {}", err);
                None
            }
        }
    }
}
