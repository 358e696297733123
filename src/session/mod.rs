pub mod controller;
pub mod events;
pub mod state;

pub use controller::SessionController;
pub use events::{ChannelSink, DashboardEvent, EventSink};
pub use state::{DashboardSnapshot, SessionState, SessionStatus};
