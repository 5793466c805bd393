use crate::document::NodeId;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::options::{Dataset, RenderOptions};

/// Lifecycle of one render request.
///
/// `Discovered -> HashComputed -> CacheHit -> Rendered`, or
/// `Discovered -> HashComputed -> CacheMiss -> Queued -> [Executing ->] Rendered | Failed`.
/// A queued request may skip `Executing` when its re-probe finds a sibling's result. A request
/// whose node left the document before its markup could be swapped in ends as `Dropped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
    Discovered,
    HashComputed,
    CacheHit,
    CacheMiss,
    Queued,
    Executing,
    Rendered,
    Failed,
    Dropped,
}

impl RequestState {
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Discovered, HashComputed)
                | (HashComputed, CacheHit | CacheMiss)
                | (CacheHit, Rendered)
                | (CacheMiss, Queued)
                | (Queued, Executing | Rendered)
                | (Executing, Rendered | Failed)
                | (CacheHit | CacheMiss | Queued | Executing, Dropped)
        )
    }

    /// Rendered, failed, or dropped; nothing further happens to the request.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Rendered | RequestState::Failed | RequestState::Dropped
        )
    }
}

/// One discovered unit of work.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub source: String,
    pub dataset: Dataset,
    pub options: RenderOptions,
    pub fingerprint: Fingerprint,
    /// The request node, then its placeholder once one is inserted.
    pub node: NodeId,
    state: RequestState,
}

impl RenderRequest {
    /// Build a request from a discovered node and hash it right away.
    pub fn discover(node: NodeId, source: String, dataset: Dataset) -> Self {
        let options = RenderOptions::from_dataset(&dataset);
        let mut req = Self {
            fingerprint: fingerprint(&source, &dataset),
            source,
            dataset,
            options,
            node,
            state: RequestState::Discovered,
        };
        req.advance(RequestState::HashComputed);
        req
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn uses_cache(&self) -> bool {
        !self.options.disable_cache
    }

    pub(crate) fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            fingerprint = %self.fingerprint,
            from = ?self.state,
            to = ?next,
            "request state"
        );
        self.state = next;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/request.rs"]
mod tests;
