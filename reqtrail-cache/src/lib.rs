//! Cache abstraction for reqtrail.
//!
//! [`CacheStore`] is a small get / set-with-expiry interface over JSON text;
//! [`InMemoryCache`] is the in-process implementation. The request logging
//! middleware keeps its prune gate behind this trait so hosts can share it
//! across processes with their own backend.
//!
//! ```
//! use reqtrail_cache::*;
//! use std::time::Duration;
//!
//! # async fn example() -> CacheResult<()> {
//! let cache = InMemoryCache::new();
//! helpers::set(&cache, "next-run", &1_700_000_000i64, Some(Duration::from_secs(60))).await?;
//! let next: Option<i64> = helpers::get(&cache, "next-run").await?;
//! assert_eq!(next, Some(1_700_000_000));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod helpers;
pub mod memory;
pub mod traits;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCache;
pub use traits::CacheStore;

pub mod prelude {
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::helpers;
    pub use crate::memory::InMemoryCache;
    pub use crate::traits::CacheStore;
}
