//! ABOUTME: Concrete backend implementations for the kernel's trait seams (spec.md §6.1)
//! ABOUTME: soe-core defines the traits; this crate is one opinionated set of implementations, not the only possible one

mod file;
mod in_memory;
mod telemetry;

pub use file::FileBackend;
pub use in_memory::InMemoryBackend;
pub use telemetry::TracingTelemetryBackend;
