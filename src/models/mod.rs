pub mod job;
pub mod note;
pub mod summary;
pub mod telemetry;

pub use job::{Job, VideoAsset};
pub use note::{NoteEntry, NoteSource};
pub use summary::ScalarSummary;
pub use telemetry::{SampleField, SampleValues, TelemetrySample};
