//! Adapters
//!
//! Inbound adapters expose the process over HTTP; outbound adapters implement
//! the domain ports.

pub mod inbound;
pub mod outbound;
