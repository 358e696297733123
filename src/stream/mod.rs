pub mod client;
pub mod protocol;

pub use client::{ConnectionState, EventSender, StreamClient, StreamConnection};
pub use protocol::{decode_frame, StreamEvent};
