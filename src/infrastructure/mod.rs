//! Infrastructure layer - gateway pipeline stages and backing stores

pub mod access;
pub mod cache;
pub mod logging;
pub mod observability;
pub mod proxy;
pub mod subscription;
pub mod throttle;
