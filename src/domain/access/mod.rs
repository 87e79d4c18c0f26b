//! Access control domain - per-IP allow and block rules

pub mod entity;
pub mod repository;

pub use entity::{AccessPolicy, AccessRule};
#[cfg(test)]
pub use repository::MockAccessListRepository;
pub use repository::AccessListRepository;
