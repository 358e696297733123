use serde::Serialize;

use crate::models::{ScalarSummary, TelemetrySample};

use super::config::SpmAveraging;

/// What the coach gets to see about the last few seconds of paddling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub spm: f64,
    pub stroke_count: f64,
    pub head_height: Option<f64>,
    pub hip_height: Option<f64>,
    pub left_hand_height: Option<f64>,
    pub right_hand_height: Option<f64>,
    pub rotation: Option<f64>,
}

/// One generation request: the window summary plus recent notes as context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub summary: WindowSummary,
    pub recent_notes: Vec<String>,
}

/// Rounded mean stroke rate over `window`, falling back to the live scalar
/// value when the mean comes out as zero (no usable samples).
pub fn rolling_spm(window: &[TelemetrySample], scalar_spm: f64, averaging: SpmAveraging) -> f64 {
    let values: Vec<f64> = match averaging {
        SpmAveraging::ZeroFilled => window
            .iter()
            .map(|sample| sample.values.spm.unwrap_or(0.0))
            .collect(),
        SpmAveraging::PresentOnly => window.iter().filter_map(|sample| sample.values.spm).collect(),
    };

    let average = if values.is_empty() {
        0.0
    } else {
        (values.iter().sum::<f64>() / values.len() as f64).round()
    };

    if average == 0.0 {
        scalar_spm
    } else {
        average
    }
}

pub fn summarize(
    window: &[TelemetrySample],
    scalar: &ScalarSummary,
    averaging: SpmAveraging,
) -> WindowSummary {
    let latest = window.last().map(|sample| sample.values).unwrap_or_default();
    WindowSummary {
        spm: rolling_spm(window, scalar.spm, averaging),
        stroke_count: scalar.stroke_count,
        head_height: latest.head_height,
        hip_height: latest.hip_height,
        left_hand_height: latest.left_hand_height,
        right_hand_height: latest.right_hand_height,
        rotation: latest.rotation,
    }
}

pub fn build_prompt(request: &NoteRequest) -> String {
    let summary = &request.summary;
    let mut prompt = format!(
        "You are an expert sprint canoe coach with high-performance training experience. \
         Give one brief observation in 1-2 clear, concise sentences.\n\
         Current data: strokes per minute = {:.0}, stroke count = {:.0}, head height = {}, \
         hip height = {}, right hand height = {}, left hand height = {}, trunk rotation angle = {}.\n\
         In sprint canoe, body movement is central to technique: hands that never reach head \
         height during the stroke, or that drop below hip height, are errors that cost boat run. \
         Holding stroke rate and trunk rotation through most of the session builds both \
         physical and technical capacity.\n",
        summary.spm,
        summary.stroke_count,
        format_measure(summary.head_height),
        format_measure(summary.hip_height),
        format_measure(summary.right_hand_height),
        format_measure(summary.left_hand_height),
        format_measure(summary.rotation),
    );

    if !request.recent_notes.is_empty() {
        prompt.push_str("Recent notes:\n");
        for note in &request.recent_notes {
            prompt.push_str("- ");
            prompt.push_str(note);
            prompt.push('\n');
        }
    }

    prompt.push_str("Avoid claims the data does not support. Do not use emojis.");
    prompt
}

fn format_measure(value: Option<f64>) -> String {
    format!("{:.2}", value.unwrap_or(0.0))
}
