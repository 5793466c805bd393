//! Request discovery and lifecycle management.
//!
//! [`Runtime`] is the process-wide context: it owns the engine handle, the cache, the batch
//! queue, and the mutation subscription. Initialization order is fixed: the engine load is
//! started in [`Runtime::new`] and every engine run awaits it, so no run can precede a completed
//! load. [`Runtime::shutdown`] unsubscribes from the document and tears the engine worker down.

mod request;

pub use request::{RenderRequest, RequestState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::cache::{DiskCache, MemoryCache, RenderCache};
use crate::config::RuntimeConfig;
use crate::document::{HostDocument, NodeId, ObserverId};
use crate::engine::{
    AssetSource, DirAssetSource, DviConverter, EngineHandle, EngineModule, EngineWorker,
};
use crate::fingerprint::Fingerprint;
use crate::foundation::error::{EngineError, InktexResult};
use crate::markup::{FAILURE_INDICATOR, decorate_svg, placeholder, relabel_ids};
use crate::queue::BatchQueue;

type EngineReady = Shared<BoxFuture<'static, Result<(), Arc<EngineError>>>>;

/// What caused a batch to be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The initial scan of the whole document.
    Startup,
    /// A subtree insertion reported by the document.
    Mutation,
    /// An explicit [`Runtime::submit`] call.
    Manual,
}

/// Final (or last reached) state of one request in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOutcome {
    pub fingerprint: Fingerprint,
    pub state: RequestState,
    /// The node currently standing in for the request.
    pub node: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport {
    pub trigger: Trigger,
    pub outcomes: Vec<RequestOutcome>,
}

impl BatchReport {
    pub fn count(&self, state: RequestState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Process-wide rendering context. Cheap to clone.
pub struct Runtime<D: HostDocument> {
    inner: Arc<Inner<D>>,
}

impl<D: HostDocument> Clone for Runtime<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<D: HostDocument> {
    document: Arc<D>,
    cache: Arc<dyn RenderCache>,
    engine: EngineHandle,
    engine_ready: EngineReady,
    queue: BatchQueue,
    config: RuntimeConfig,
    observer: Mutex<Option<(ObserverId, smol::Task<()>)>>,
    batches: Mutex<Vec<smol::Task<BatchReport>>>,
    shut_down: AtomicBool,
}

impl<D: HostDocument> Runtime<D> {
    /// Assemble a runtime from its collaborators and start loading the engine from `origin`.
    pub fn new(
        document: Arc<D>,
        cache: Arc<dyn RenderCache>,
        engine: EngineHandle,
        origin: Arc<dyn AssetSource>,
        config: RuntimeConfig,
    ) -> Self {
        let loader = engine.clone();
        let engine_ready: EngineReady = async move {
            loader.load(origin).await.map_err(|e| {
                tracing::error!(error = %e, "engine failed to load; rendering is unavailable");
                Arc::new(e)
            })
        }
        .boxed()
        .shared();
        smol::spawn(engine_ready.clone()).detach();

        Self {
            inner: Arc::new(Inner {
                document,
                cache,
                engine,
                engine_ready,
                queue: BatchQueue::new(),
                config,
                observer: Mutex::new(None),
                batches: Mutex::new(Vec::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Build a runtime from configuration: engine worker thread, assets from
    /// `config.asset_root`, and a disk cache when `config.cache_dir` is set.
    pub fn from_config(
        document: Arc<D>,
        module: Arc<dyn EngineModule>,
        converter: Arc<dyn DviConverter>,
        config: RuntimeConfig,
    ) -> InktexResult<Self> {
        config.validate()?;
        let cache: Arc<dyn RenderCache> = match &config.cache_dir {
            Some(dir) => Arc::new(DiskCache::open(dir, &config.store_name)?),
            None => Arc::new(MemoryCache::new()),
        };
        let engine = EngineWorker::spawn(module, converter, config.worker_opts())?;
        let origin = Arc::new(DirAssetSource::new(config.asset_root.clone()));
        Ok(Self::new(document, cache, engine, origin, config))
    }

    pub fn document(&self) -> &Arc<D> {
        &self.inner.document
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.inner.queue
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Wait for the engine load started in [`Runtime::new`].
    pub async fn engine_ready(&self) -> Result<(), Arc<EngineError>> {
        self.inner.engine_ready.clone().await
    }

    /// Scan the whole document once and start watching it for inserted request nodes.
    ///
    /// Batches started here are tracked; [`Runtime::settle`] waits for them.
    pub fn start(&self) {
        let doc = &self.inner.document;
        let (observer_id, records) = doc.observe();

        let initial = doc.find_requests(doc.root(), &self.inner.config.marker_type);
        tracing::info!(requests = initial.len(), "initial document scan");
        self.spawn_tracked(initial, Trigger::Startup);

        let weak = Arc::downgrade(&self.inner);
        let task = smol::spawn(async move {
            while let Ok(added) = records.recv().await {
                let Some(inner) = Weak::upgrade(&weak) else {
                    break;
                };
                let runtime = Runtime { inner };
                let marker = &runtime.inner.config.marker_type;
                let nodes: Vec<NodeId> = added
                    .iter()
                    .flat_map(|&n| runtime.inner.document.find_requests(n, marker))
                    .collect();
                if !nodes.is_empty() {
                    tracing::debug!(requests = nodes.len(), "request nodes inserted");
                    runtime.spawn_tracked(nodes, Trigger::Mutation);
                }
            }
        });

        if let Some((old_id, _old_task)) = self.inner.observer.lock().replace((observer_id, task)) {
            doc.disconnect(old_id);
        }
    }

    /// Submit `nodes` as one batch. The returned task resolves when every request in it has
    /// reached its final state (or stalled on an engine that failed to load).
    pub fn submit(&self, nodes: Vec<NodeId>) -> smol::Task<BatchReport> {
        let runtime = self.clone();
        smol::spawn(async move { runtime.process_batch(nodes, Trigger::Manual).await })
    }

    fn spawn_tracked(&self, nodes: Vec<NodeId>, trigger: Trigger) {
        if nodes.is_empty() {
            return;
        }
        let runtime = self.clone();
        // Registered before the batch can finish, so `settle` never misses it.
        let mut batches = self.inner.batches.lock();
        batches.push(smol::spawn(async move {
            runtime.process_batch(nodes, trigger).await
        }));
    }

    /// Wait until every batch already started by [`Runtime::start`] or the document observer has
    /// finished, including batches started while waiting. Returns their reports in start order.
    ///
    /// Insertions the observer has not yet picked up are not waited for.
    pub async fn settle(&self) -> Vec<BatchReport> {
        let mut reports = Vec::new();
        loop {
            let tasks = std::mem::take(&mut *self.inner.batches.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                reports.push(task.await);
            }
            // Let the observer task turn pending mutation records into batches.
            smol::future::yield_now().await;
        }
        reports
    }

    /// Stop observing the document and tear down the engine worker. In-flight engine runs are
    /// not aborted, but no further runs are issued. Idempotent.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }

    #[tracing::instrument(level = "debug", skip(self, nodes), fields(size = nodes.len()))]
    async fn process_batch(&self, nodes: Vec<NodeId>, trigger: Trigger) -> BatchReport {
        let inner = &self.inner;
        let doc = inner.document.as_ref();
        let mut outcomes = Vec::with_capacity(nodes.len());
        let mut misses: Vec<RenderRequest> = Vec::new();

        for node in nodes {
            let Some(content) = doc.request_content(node) else {
                tracing::warn!(?node, "request node has no source text; skipping");
                continue;
            };
            let mut req = RenderRequest::discover(node, content.text, content.dataset);

            if let Some(markup) = self.cache_get(&req).await {
                req.advance(RequestState::CacheHit);
                self.complete(&mut req, &markup);
                outcomes.push(outcome(&req));
                continue;
            }

            req.advance(RequestState::CacheMiss);
            let (w, h) = req.options.placeholder_size(inner.config.placeholder_size);
            if self.swap(&mut req, &placeholder(w, h)) {
                req.advance(RequestState::Queued);
                misses.push(req);
            } else {
                req.advance(RequestState::Dropped);
                outcomes.push(outcome(&req));
            }
        }

        let hits = outcomes
            .iter()
            .filter(|o| o.state == RequestState::Rendered)
            .count();
        if misses.is_empty() {
            tracing::info!(?trigger, hits, misses = 0, "batch resolved from cache");
            return BatchReport { trigger, outcomes };
        }

        if let Err(e) = self.engine_ready().await {
            tracing::error!(
                error = %e,
                pending = misses.len(),
                "engine unavailable; leaving placeholders in place"
            );
            outcomes.extend(misses.iter().map(outcome));
            return BatchReport { trigger, outcomes };
        }

        let permit = inner.queue.admit().await;
        tracing::debug!(batch = permit.id(), misses = misses.len(), "batch admitted to engine");

        let mut pending = misses.into_iter();
        for mut req in pending.by_ref() {
            if self.is_shut_down() {
                outcomes.push(outcome(&req));
                break;
            }
            self.render(&mut req).await;
            outcomes.push(outcome(&req));
        }
        outcomes.extend(pending.map(|req| outcome(&req)));
        drop(permit);

        tracing::info!(
            ?trigger,
            hits,
            rendered = outcomes.iter().filter(|o| o.state == RequestState::Rendered).count(),
            failed = outcomes.iter().filter(|o| o.state == RequestState::Failed).count(),
            dropped = outcomes.iter().filter(|o| o.state == RequestState::Dropped).count(),
            "batch finished"
        );
        BatchReport { trigger, outcomes }
    }

    async fn render(&self, req: &mut RenderRequest) {
        // A sibling with the same fingerprint may have finished while this one waited.
        let cached = self.cache_get(req).await;
        if self.is_shut_down() {
            return;
        }
        if let Some(markup) = cached {
            self.complete(req, &markup);
            return;
        }

        req.advance(RequestState::Executing);
        let result = self
            .inner
            .engine
            .run(req.source.clone(), req.options.clone())
            .await
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                let relabeled = relabel_ids(&raw, &req.fingerprint);
                decorate_svg(&relabeled, req.options.aria_label.as_deref())
                    .map_err(|e| e.to_string())
            });

        // Runs that finish after teardown leave the document and cache untouched.
        if self.is_shut_down() {
            tracing::debug!(fingerprint = %req.fingerprint, "discarding run finished after shutdown");
            return;
        }

        match result {
            Ok(svg) => {
                if !self.swap(req, &svg) {
                    req.advance(RequestState::Dropped);
                    return;
                }
                if req.uses_cache()
                    && let Err(e) = self.inner.cache.put(req.fingerprint, svg).await
                {
                    tracing::warn!(fingerprint = %req.fingerprint, error = %e, "cache write failed");
                }
                self.finish(req);
                req.advance(RequestState::Rendered);
            }
            Err(e) => {
                tracing::error!(fingerprint = %req.fingerprint, error = %e, "render failed");
                if self.swap(req, FAILURE_INDICATOR) {
                    req.advance(RequestState::Failed);
                } else {
                    req.advance(RequestState::Dropped);
                }
            }
        }
    }

    async fn cache_get(&self, req: &RenderRequest) -> Option<String> {
        if !req.uses_cache() {
            return None;
        }
        match self.inner.cache.get(req.fingerprint).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(fingerprint = %req.fingerprint, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Swap `markup` in and announce it, or record the request as dropped when its node is gone.
    fn complete(&self, req: &mut RenderRequest, markup: &str) {
        if self.swap(req, markup) {
            self.finish(req);
            req.advance(RequestState::Rendered);
        } else {
            req.advance(RequestState::Dropped);
        }
    }

    /// Replace the request's current node. False when the node is no longer in the document.
    fn swap(&self, req: &mut RenderRequest, markup: &str) -> bool {
        match self.inner.document.replace_with_markup(req.node, markup) {
            Some(node) => {
                req.node = node;
                true
            }
            None => {
                tracing::warn!(fingerprint = %req.fingerprint, "request node left the document; dropping");
                false
            }
        }
    }

    fn finish(&self, req: &RenderRequest) {
        self.inner
            .document
            .dispatch_event(req.node, &self.inner.config.finished_event);
    }
}

impl<D: HostDocument> Inner<D> {
    fn teardown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some((id, task)) = self.observer.lock().take() {
            self.document.disconnect(id);
            drop(task);
        }
        self.engine.shutdown();
        // Unfinished batches run to completion on their own; each stops before its next run.
        for task in self.batches.lock().drain(..) {
            task.detach();
        }
        tracing::info!("runtime shut down");
    }
}

impl<D: HostDocument> Drop for Inner<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn outcome(req: &RenderRequest) -> RequestOutcome {
    RequestOutcome {
        fingerprint: req.fingerprint,
        state: req.state(),
        node: req.node,
    }
}
