//! Live event distribution
//!
//! Decouples producers of domain events from an arbitrary number of
//! concurrent dashboard observers. Events flow through an in-process bus that
//! keeps a bounded replay ring for late joiners and fans out to per-observer
//! bounded queues.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{DomainEvent, EventKind};
