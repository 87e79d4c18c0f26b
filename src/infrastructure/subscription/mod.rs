//! Subscription infrastructure - snapshot cache and storage adapters

pub mod cache;
pub mod in_memory;

pub use cache::SubscriptionCache;
pub use in_memory::InMemorySubscriptionRepository;
