//! Fingerprint -> rendered markup storage.
//!
//! Both operations are asynchronous and may be called concurrently from any number of in-flight
//! requests. Implementations never evict; last writer wins on a key.

mod disk;
mod memory;

pub use disk::{DiskCache, OBJECT_STORE, SCHEMA_VERSION, STORE_NAME};
pub use memory::MemoryCache;

use futures::future::BoxFuture;

use crate::fingerprint::Fingerprint;
use crate::foundation::error::InktexResult;

pub trait RenderCache: Send + Sync {
    /// Look up the markup stored for `key`.
    fn get(&self, key: Fingerprint) -> BoxFuture<'static, InktexResult<Option<String>>>;

    /// Store `markup` under `key`, replacing any previous entry.
    fn put(&self, key: Fingerprint, markup: String) -> BoxFuture<'static, InktexResult<()>>;
}
