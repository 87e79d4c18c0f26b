//! Cache infrastructure - upstream response caching

mod response;

pub use response::{CachedResponse, ResponseCache};
