//! Application core boundary.
//!
//! The Soilwarden domain logic (update engine, command dispatcher) interacts
//! with the outside world exclusively through the **port traits** defined in
//! [`ports`], keeping the whole core testable on the host without real
//! peripherals or a network.

pub mod ports;
