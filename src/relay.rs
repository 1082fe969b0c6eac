//! Display-event relay.
//!
//! A dedicated OS thread blocks on the display server and forwards typed
//! [`RelayMessage`]s to the multiplexer over a tokio channel. The channel is
//! the only state shared between the two threads.

pub mod protocol;
pub mod service;

pub use protocol::{DisplayEvent, DisplayEventSource, RelayMessage};
pub use service::{relay_events, spawn_relay_thread};
