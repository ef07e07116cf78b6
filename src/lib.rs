//! Bellgate - A doorbell gatekeeper built with Rust
//!
//! Bell pushes on digital inputs ring configured bells: a relay-driven
//! external bell and a phone extension called over a minimal SIP client.

pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::error::Result;
