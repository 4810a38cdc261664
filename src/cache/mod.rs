//! Response cache for upstream GET requests.
//!
//! Payloads are stored one file per request, keyed by a SHA-256 digest of the
//! URL and its query parameters. Freshness is decided per request:
//! - a TTL in seconds, where zero means the entry never expires by age
//! - an optional not-before instant, for payloads that must postdate a known
//!   upstream change
//! - a force flag that skips the lookup and overwrites the entry
//!
//! Nothing is ever evicted. Entries accumulate until the directory is cleared
//! by hand.

mod key;
mod layer;
mod storage;
mod types;

pub use key::CacheKey;
pub use layer::CacheLayer;
pub use storage::{CacheError, FileStorage};
pub use types::CacheOptions;
