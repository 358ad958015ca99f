//! # Configuration
//!
//! Process-level configuration.
//!
//! - `controller`: environment variables read once at startup (Bitwarden
//!   endpoints, state path, refresh interval)
//! - `server`: metrics/probe listeners and leader election, from CLI flags

pub mod controller;
pub mod server;

pub use controller::ControllerConfig;
pub use server::{parse_bind_address, ServerConfig};
