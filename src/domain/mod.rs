//! Domain Layer
//!
//! Balancer entities and the ports the telemetry layer is plugged into.

pub mod entities;
pub mod ports;
pub mod value_objects;
