use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::cache::RenderCache;
use crate::fingerprint::Fingerprint;
use crate::foundation::error::InktexResult;

/// Process-local cache. Used when no cache directory is configured.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<Fingerprint, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RenderCache for MemoryCache {
    fn get(&self, key: Fingerprint) -> BoxFuture<'static, InktexResult<Option<String>>> {
        let hit = self.entries.read().get(&key).cloned();
        futures::future::ready(Ok(hit)).boxed()
    }

    fn put(&self, key: Fingerprint, markup: String) -> BoxFuture<'static, InktexResult<()>> {
        self.entries.write().insert(key, markup);
        futures::future::ready(Ok(())).boxed()
    }
}
