use std::collections::HashMap;

use crate::engine::assets::{AssetSource, fetch_decompressed};
use crate::foundation::error::EngineError;

/// In-memory filesystem the engine reads its input from and writes its output to.
#[derive(Debug, Default)]
pub struct VirtualFs {
    files: HashMap<String, Vec<u8>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_file(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }

    pub fn read_file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Drop every file.
    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Everything an engine invocation may touch besides its memory.
pub struct EngineIo<'a> {
    fs: &'a mut VirtualFs,
    assets: &'a dyn AssetSource,
    terminal_input: &'a str,
    show_console: bool,
}

impl<'a> EngineIo<'a> {
    pub fn new(
        fs: &'a mut VirtualFs,
        assets: &'a dyn AssetSource,
        terminal_input: &'a str,
        show_console: bool,
    ) -> Self {
        Self {
            fs,
            assets,
            terminal_input,
            show_console,
        }
    }

    /// Text the engine reads from its terminal.
    pub fn terminal_input(&self) -> &str {
        self.terminal_input
    }

    /// Open a file for reading.
    ///
    /// Files already in the virtual filesystem win. Anything else is an ancillary asset: it is
    /// fetched from the origin as `<name>.gz`, decompressed, and kept for the rest of the run.
    pub fn open(&mut self, name: &str) -> Result<&[u8], EngineError> {
        if !self.fs.contains(name) {
            let bytes = fetch_decompressed(self.assets, &format!("{name}.gz"))?;
            tracing::trace!(name, len = bytes.len(), "loaded ancillary engine file");
            self.fs.write_file(name, bytes);
        }
        self.fs
            .read_file(name)
            .ok_or_else(|| EngineError::MissingOutput(name.to_string()))
    }

    pub fn write(&mut self, name: &str, bytes: Vec<u8>) {
        self.fs.write_file(name, bytes);
    }

    /// Engine console output.
    pub fn console(&self, line: &str) {
        if self.show_console {
            tracing::info!(target: "inktex::engine::console", "{line}");
        } else {
            tracing::debug!(target: "inktex::engine::console", "{line}");
        }
    }
}
