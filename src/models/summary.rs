use serde::{Deserialize, Serialize};

/// Headline numbers for the dashboard. Each field tracks the latest value
/// received for it, independently of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarSummary {
    pub spm: f64,
    pub stroke_count: f64,
    pub progress: f64,
}

impl ScalarSummary {
    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() {
            self.progress = progress.clamp(0.0, 1.0);
        }
    }
}
