//! # lemonline - event-driven status line for lemonbar
//!
//! Samples mail, network, battery, brightness, audio, weather, MPD and the
//! clock, and writes one lemonbar-formatted line to stdout whenever any of
//! them changes.
//!
//! ## Architecture
//!
//! - [`field`] - the ordered table of status line slots
//! - [`provider`] - one data source per field, behind a uniform init/query contract
//! - [`relay`] - blocking display-event thread feeding a typed channel
//! - [`app`] - the readiness multiplexer and bootstrap
//! - [`render`] - line formatting and output
//! - [`display`] - Xlib/RandR access shared by brightness and the relay
//! - [`error`] - centralized error types

// Core modules
pub mod config;
pub mod error;
pub mod field;

// Information sources
pub mod display;
pub mod provider;
pub mod relay;

// Core components
pub mod app;
pub mod render;

// Re-export commonly used types for convenience
pub use error::{Result, StatusError};

// Public API surface for external usage
pub use app::{bootstrap, Multiplexer};
pub use field::{Field, FieldTable};
pub use provider::{Provider, Registration, WatchSpec};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
