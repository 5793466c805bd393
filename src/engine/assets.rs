use std::io::{self, Read as _};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::foundation::error::EngineError;

/// Compressed compiled engine code.
pub const CODE_ASSET: &str = "tex.wasm.gz";
/// Compressed initial memory snapshot.
pub const SNAPSHOT_ASSET: &str = "core.dump.gz";

/// Capability for fetching engine assets by name from the engine's origin.
///
/// Called once per asset at load time and from the worker thread whenever the engine asks for an
/// ancillary file mid-run.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Serves assets from a local directory.
#[derive(Clone, Debug)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssetSource {
    fn fetch(&self, name: &str) -> io::Result<Vec<u8>> {
        let rel = normalize_asset_name(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("asset name '{name}' escapes the asset root"),
            )
        })?;
        std::fs::read(self.root.join(rel))
    }
}

/// Normalize a `/`-separated asset name, rejecting absolute paths and parent traversals.
pub(crate) fn normalize_asset_name(name: &str) -> Option<String> {
    let s = name.replace('\\', "/");
    if s.starts_with('/') {
        return None;
    }
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            p => out.push(p),
        }
    }
    (!out.is_empty()).then(|| out.join("/"))
}

/// Fetch `name` from `source` and gunzip it.
pub fn fetch_decompressed(source: &dyn AssetSource, name: &str) -> Result<Vec<u8>, EngineError> {
    let compressed = source.fetch(name).map_err(|e| EngineError::Asset {
        name: name.to_string(),
        source: e,
    })?;
    gunzip(&compressed).map_err(|e| EngineError::Decompress {
        name: name.to_string(),
        source: e,
    })
}

pub(crate) fn gunzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(4));
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/engine/assets.rs"]
mod tests;
