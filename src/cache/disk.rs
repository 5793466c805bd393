use std::fs;
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt as _;
use futures::future::BoxFuture;

use crate::cache::RenderCache;
use crate::fingerprint::Fingerprint;
use crate::foundation::error::{InktexError, InktexResult};

/// Default store name.
pub const STORE_NAME: &str = "TikzJax";
/// Entries live under `<root>/<store>/v<SCHEMA_VERSION>/<OBJECT_STORE>/`.
pub const SCHEMA_VERSION: u32 = 2;
pub const OBJECT_STORE: &str = "svgImages";

const ENTRY_EXT: &str = "svg";

/// Persistent cache with one file per fingerprint.
///
/// Writes go to a per-writer temporary file that is renamed over the entry, so readers only ever
/// observe complete markup. Operations on different keys touch different files and never wait on
/// each other.
#[derive(Clone, Debug)]
pub struct DiskCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl DiskCache {
    /// Open (creating if needed) the store `name` under `root`.
    pub fn open(root: impl AsRef<Path>, name: &str) -> InktexResult<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(InktexError::validation(format!(
                "invalid cache store name '{name}'"
            )));
        }
        let dir = root
            .as_ref()
            .join(name)
            .join(format!("v{SCHEMA_VERSION}"))
            .join(OBJECT_STORE);
        fs::create_dir_all(&dir).map_err(|e| {
            InktexError::cache(format!("create cache dir '{}': {e}", dir.display()))
        })?;
        tracing::debug!(dir = %dir.display(), "opened disk cache");
        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                tmp_seq: AtomicU64::new(0),
            }),
        })
    }

    /// Directory holding the entry files.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.inner.dir.join(format!("{}.{ENTRY_EXT}", key.to_hex()))
    }

    /// Blocking read, shared by the async path and the CLI.
    pub fn get_blocking(&self, key: &Fingerprint) -> InktexResult<Option<String>> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(markup) => Ok(Some(markup)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InktexError::cache(format!(
                "read '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Blocking write, shared by the async path and the CLI.
    pub fn put_blocking(&self, key: &Fingerprint, markup: &str) -> InktexResult<()> {
        let path = self.entry_path(key);
        let seq = self.inner.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.inner.dir.join(format!(
            "{}.{}.{seq}.tmp",
            key.to_hex(),
            std::process::id()
        ));
        write_then_rename(&tmp, &path, markup.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            InktexError::cache(format!("write '{}': {e}", path.display()))
        })
    }
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

impl RenderCache for DiskCache {
    fn get(&self, key: Fingerprint) -> BoxFuture<'static, InktexResult<Option<String>>> {
        let this = self.clone();
        smol::unblock(move || this.get_blocking(&key)).boxed()
    }

    fn put(&self, key: Fingerprint, markup: String) -> BoxFuture<'static, InktexResult<()>> {
        let this = self.clone();
        smol::unblock(move || this.put_blocking(&key, &markup)).boxed()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/disk.rs"]
mod tests;
