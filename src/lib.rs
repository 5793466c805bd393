#![forbid(unsafe_code)]
//! Render embedded TeX/TikZ fragments of a live document to SVG.
//!
//! Request nodes are discovered in a [`document::HostDocument`], fingerprinted, looked up in a
//! [`cache::RenderCache`], and on a miss rendered by a single engine instance running on its own
//! thread. Batches reach the engine strictly one at a time through a [`queue::BatchQueue`].

pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod fingerprint;
pub mod foundation;
pub mod markup;
pub mod options;
pub mod queue;
pub mod runtime;

pub use cache::{DiskCache, MemoryCache, RenderCache};
pub use config::RuntimeConfig;
pub use document::{Document, HostDocument, NodeId};
pub use engine::{AssetSource, DirAssetSource, DviConverter, EngineHandle, EngineModule, EngineWorker};
pub use fingerprint::{Fingerprint, fingerprint};
pub use foundation::error::{EngineError, InktexError, InktexResult};
pub use options::{Dataset, RenderOptions, TexPackage};
pub use queue::{BatchPermit, BatchQueue};
pub use runtime::{BatchReport, RenderRequest, RequestOutcome, RequestState, Runtime, Trigger};
