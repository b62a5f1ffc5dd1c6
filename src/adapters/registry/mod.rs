//! Connection registry implementations.

mod in_memory;

pub use in_memory::InMemoryConnectionRegistry;
