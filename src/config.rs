use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::STORE_NAME;
use crate::engine::EngineWorkerOpts;
use crate::foundation::error::{InktexError, InktexResult};
use crate::options::DEFAULT_PLACEHOLDER_SIZE;

/// Type attribute that marks a request node.
pub const DEFAULT_MARKER_TYPE: &str = "text/tikz";
/// Event dispatched (bubbling) on each swapped-in result.
pub const DEFAULT_FINISHED_EVENT: &str = "tikzjax-load-finished";

/// Runtime configuration.
///
/// Every field has a default, so a JSON config only needs the keys it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Directory holding `tex.wasm.gz`, `core.dump.gz`, and ancillary engine files.
    pub asset_root: PathBuf,
    /// Root of the persistent cache. `None` keeps results in memory only.
    pub cache_dir: Option<PathBuf>,
    /// Name of the persistent store under `cache_dir`.
    pub store_name: String,
    /// `type` attribute value identifying request nodes.
    pub marker_type: String,
    /// Placeholder edge length (pt) used when a request gives no usable size.
    pub placeholder_size: f64,
    /// Name of the completion event.
    pub finished_event: String,
    /// Name of the engine worker thread.
    pub engine_thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            cache_dir: None,
            store_name: STORE_NAME.to_string(),
            marker_type: DEFAULT_MARKER_TYPE.to_string(),
            placeholder_size: DEFAULT_PLACEHOLDER_SIZE,
            finished_event: DEFAULT_FINISHED_EVENT.to_string(),
            engine_thread_name: EngineWorkerOpts::default().thread_name,
        }
    }
}

impl RuntimeConfig {
    pub fn from_path(path: &Path) -> InktexResult<Self> {
        let f = File::open(path).map_err(|e| {
            InktexError::validation(format!("open config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| InktexError::serde(format!("parse config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> InktexResult<()> {
        if self.marker_type.is_empty() {
            return Err(InktexError::validation("marker_type must be non-empty"));
        }
        if self.finished_event.is_empty() {
            return Err(InktexError::validation("finished_event must be non-empty"));
        }
        if !self.placeholder_size.is_finite() || self.placeholder_size <= 0.0 {
            return Err(InktexError::validation(
                "placeholder_size must be finite and > 0",
            ));
        }
        Ok(())
    }

    pub fn worker_opts(&self) -> EngineWorkerOpts {
        EngineWorkerOpts {
            thread_name: self.engine_thread_name.clone(),
            ..EngineWorkerOpts::default()
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
