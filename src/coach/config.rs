use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/google/flan-t5-small";

/// How the rolling stroke-rate average treats samples without an `spm` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpmAveraging {
    /// Missing values count as zero. Biases the average low on sparse data.
    #[default]
    ZeroFilled,
    /// Only samples that carry a value contribute.
    PresentOnly,
}

/// Tunables for the coaching-note scheduler.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    /// Minimum gap between the end of one attempt and the start of the next.
    pub cooldown: Duration,
    /// Samples in the rolling summary window.
    pub window: usize,
    /// Most recent notes sent along as context.
    pub context_notes: usize,
    /// Hard ceiling on one generation request.
    pub request_timeout: Duration,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub averaging: SpmAveraging,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(6000),
            window: 15,
            context_notes: 5,
            request_timeout: Duration::from_secs(40),
            max_new_tokens: 80,
            temperature: 0.4,
            averaging: SpmAveraging::ZeroFilled,
        }
    }
}
