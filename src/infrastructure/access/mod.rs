//! Access control infrastructure

pub mod gate;
pub mod in_memory;

pub use gate::{in_range, AccessGate};
pub use in_memory::InMemoryAccessListRepository;
