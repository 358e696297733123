//! Decoding of inbound stream frames.
//!
//! Frames are JSON objects discriminated by `type`. Numeric fields are read
//! leniently: a value that is not a finite number counts as absent rather
//! than failing the whole frame, because backends of different vintages
//! disagree on what they send (`"jpg": null`, stringly typed rates).

use serde_json::{Map, Value};

use crate::{
    error::{ProtocolDecodeError, StreamError},
    models::{SampleField, SampleValues},
    urls::UrlResolver,
};

const DEFAULT_STREAM_ERROR: &str = "stream error";

/// A decoded frame, in the shape consumers act on.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Current annotated frame (as a data URL) and/or processing progress.
    Frame {
        image: Option<String>,
        progress: Option<f64>,
    },
    /// Metric values resolved through the alias table; unset fields were
    /// absent from the frame.
    Metric { values: SampleValues },
    Text { text: String },
    /// Full replacement of the chart image set.
    Charts { urls: Vec<String> },
    Complete { processed_video_url: Option<String> },
    Failed { error: StreamError },
}

impl StreamEvent {
    /// `complete` and failures end the session; nothing after them counts.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Failed { .. })
    }

    /// Passes every resource reference the event carries through `resolver`.
    pub fn resolve_urls(self, resolver: &UrlResolver) -> Self {
        match self {
            StreamEvent::Charts { urls } => StreamEvent::Charts {
                urls: urls.iter().map(|url| resolver.absolutize(url)).collect(),
            },
            StreamEvent::Complete {
                processed_video_url,
            } => StreamEvent::Complete {
                processed_video_url: processed_video_url
                    .filter(|url| !url.is_empty())
                    .map(|url| resolver.absolutize(&url)),
            },
            other => other,
        }
    }
}

pub fn decode_frame(raw: &str) -> Result<StreamEvent, ProtocolDecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(object) = value else {
        return Err(ProtocolDecodeError::MissingType);
    };
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolDecodeError::MissingType)?;

    match kind {
        "frame" => Ok(StreamEvent::Frame {
            image: string_field(&object, "jpg")
                .filter(|jpg| !jpg.is_empty())
                .map(|jpg| format!("data:image/jpeg;base64,{jpg}")),
            progress: number_field(&object, "progress"),
        }),
        "metric" => Ok(StreamEvent::Metric {
            values: decode_metric(&object),
        }),
        "text" => string_field(&object, "text")
            .filter(|text| !text.is_empty())
            .map(|text| StreamEvent::Text {
                text: text.to_string(),
            })
            .ok_or(ProtocolDecodeError::MissingField {
                kind: "text",
                field: "text",
            }),
        "charts" => decode_charts(&object).map(|urls| StreamEvent::Charts { urls }),
        "complete" => Ok(StreamEvent::Complete {
            processed_video_url: string_field(&object, "processed_video_url")
                .map(str::to_string),
        }),
        "error" => {
            let message = string_field(&object, "message")
                .filter(|message| !message.is_empty())
                .unwrap_or(DEFAULT_STREAM_ERROR);
            Ok(StreamEvent::Failed {
                error: StreamError::Backend(message.to_string()),
            })
        }
        other => Err(ProtocolDecodeError::UnknownType(other.to_string())),
    }
}

/// Resolves each sample field from its canonical key, falling back to the
/// legacy aliases in [`SampleField::wire_names`] order.
pub fn decode_metric(object: &Map<String, Value>) -> SampleValues {
    let mut values = SampleValues::default();
    for field in SampleField::ALL {
        let value = field
            .wire_names()
            .iter()
            .find_map(|name| number_field(object, name));
        values.set(field, value);
    }
    values
}

fn decode_charts(object: &Map<String, Value>) -> Result<Vec<String>, ProtocolDecodeError> {
    if let Some(Value::Array(urls)) = object.get("urls") {
        return Ok(urls
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect());
    }
    if let Some(Value::Object(images)) = object.get("images") {
        return Ok(images
            .values()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect());
    }
    Err(ProtocolDecodeError::MissingField {
        kind: "charts",
        field: "urls",
    })
}

fn number_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object
        .get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
