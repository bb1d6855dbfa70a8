//! MFSync Fetch - Query-scoped listing cache
//!
//! Provides:
//! - [`FetchProvider`] - lists queries remotely and keeps one handle set per query
//! - [`cleanup`] - per-kind retirement of handles that left a listing
//! - [`convert`] - listing items → remote descriptors
//!
//! # Usage
//!
//! ```ignore
//! let provider = FetchProvider::new(attributes, transport, mutations)
//!     .with_config(&config.fetch);
//! let handles = provider.get_cached_or_reload(&query, &cancel).await?;
//! ```

pub mod cleanup;
pub mod convert;
pub mod error;
pub mod provider;

pub use cleanup::{retire, CleanupOutcome, CleanupPolicy};
pub use convert::{parent_of, to_descriptor};
pub use error::FetchError;
pub use provider::{CacheState, FetchProvider, DEFAULT_BATCH_SIZE};
