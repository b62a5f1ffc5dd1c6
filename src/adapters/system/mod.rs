//! Host-level load samplers.

mod process_memory;

pub use process_memory::ProcessMemorySampler;
