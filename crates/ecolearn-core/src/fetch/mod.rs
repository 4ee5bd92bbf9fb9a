// Fetch coordination: request coalescing and transient-failure retry.

mod dedup;
mod retry;

pub use dedup::FetchDeduplicator;
pub use retry::RetryPolicy;
