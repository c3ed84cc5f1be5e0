//! # Secret Cache
//!
//! A per-name TTL cache in front of a secret store. Fresh values are served from
//! memory; once an entry goes stale the backing store is asked again. When that
//! fetch fails and a value was cached before, the stale value is served and the
//! next refresh is pushed further out for every consecutive failure.
//!
//! ```text
//! Missing ──fetch ok──▶ Fresh ──ttl elapses──▶ Stale
//!                        ▲                       │
//!                        └──────fetch ok─────────┤
//!                                                └─fetch err─▶ Stale (served, retry later)
//! ```
//!
//! The cache is an owned value with an injected [`Clock`] and [`SecretStore`].
//! Build one per process and hand out `Arc<SecretCache>`.

mod cache;
mod clock;
mod credentials;
mod error;
mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheSettings, SecretCache};
pub use clock::{Clock, SystemClock};
pub use credentials::SecretString;
pub use error::{Result, SecretError};
pub use store::SecretStore;
