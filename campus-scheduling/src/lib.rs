//! Scheduling core for the campus administration platform.
//!
//! Covers classroom bookings, resource allocations (with overlap-based
//! conflict detection and resource status side effects) and the typed
//! entity-attribute store that backs flexible resource metadata.

pub mod allocation;
pub mod api;
pub mod booking;
pub mod overlap;
pub mod repository;
pub mod service;

pub use repository::SchedulingRepository;
pub use service::SchedulingService;
