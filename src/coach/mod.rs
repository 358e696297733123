pub mod config;
pub mod generator;
pub mod prompt;
pub mod scheduler;

pub use config::{CoachConfig, SpmAveraging, DEFAULT_MODEL_URL};
pub use generator::{HuggingFaceGenerator, NoteGenerator, FALLBACK_NOTE};
pub use prompt::{NoteRequest, WindowSummary};
pub use scheduler::{finish, try_begin, CoachScheduler, SchedulerState};
