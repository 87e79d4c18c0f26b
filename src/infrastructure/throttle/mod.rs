//! Admission throttling infrastructure

pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
