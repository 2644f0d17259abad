//! Infrastructure Layer
//!
//! Process lifecycle concerns shared by the listeners.

pub mod shutdown;

pub use shutdown::{shutdown_signal, ListenerGuard, ShutdownController};
