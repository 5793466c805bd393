use std::sync::Arc;

use crate::engine::assets::{AssetSource, CODE_ASSET, SNAPSHOT_ASSET, fetch_decompressed};
use crate::engine::input::{INPUT_FILE, OUTPUT_FILE, TERMINAL_INPUT, synthesize_input};
use crate::engine::vfs::{EngineIo, VirtualFs};
use crate::engine::{DviConverter, EngineModule, PAGE_SIZE};
use crate::foundation::error::EngineError;
use crate::options::RenderOptions;

/// Loaded engine: compiled code plus the initial memory snapshot, immutable after load.
///
/// Each [`EngineState::run`] works on its own copy of the snapshot, so the state itself is only
/// ever read.
pub struct EngineState {
    code: Vec<u8>,
    snapshot: Vec<u8>,
    assets: Arc<dyn AssetSource>,
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("code_len", &self.code.len())
            .field("snapshot_len", &self.snapshot.len())
            .finish_non_exhaustive()
    }
}

impl EngineState {
    /// Fetch and decompress the code and snapshot from `assets`.
    ///
    /// The snapshot is fitted to the module's memory requirement: truncated when longer,
    /// zero-extended when shorter.
    pub fn load(module: &dyn EngineModule, assets: Arc<dyn AssetSource>) -> Result<Self, EngineError> {
        let code = fetch_decompressed(assets.as_ref(), CODE_ASSET)?;
        let mut snapshot = fetch_decompressed(assets.as_ref(), SNAPSHOT_ASSET)?;

        let mem_len = module.memory_pages() * PAGE_SIZE;
        if snapshot.len() != mem_len {
            tracing::debug!(
                snapshot_len = snapshot.len(),
                mem_len,
                "fitting memory snapshot to engine memory size"
            );
            snapshot.resize(mem_len, 0);
        }

        tracing::info!(
            code_len = code.len(),
            snapshot_len = snapshot.len(),
            "engine loaded"
        );
        Ok(Self {
            code,
            snapshot,
            assets,
        })
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    /// Render one request: synthesize the input, reset memory from the snapshot, execute,
    /// collect the raw output, and convert it to markup.
    pub fn run(
        &self,
        module: &dyn EngineModule,
        converter: &dyn DviConverter,
        source: &str,
        options: &RenderOptions,
    ) -> Result<String, EngineError> {
        let input = synthesize_input(source, options);

        let mut memory = vec![0u8; self.snapshot.len()];
        memory.copy_from_slice(&self.snapshot);

        let mut fs = VirtualFs::new();
        fs.write_file(INPUT_FILE, input.into_bytes());

        let dvi = {
            let mut io = EngineIo::new(
                &mut fs,
                self.assets.as_ref(),
                TERMINAL_INPUT,
                options.show_console,
            );
            module.execute(&self.code, &mut memory, &mut io)?;
            fs.take_file(OUTPUT_FILE)
                .ok_or_else(|| EngineError::MissingOutput(OUTPUT_FILE.to_string()))?
        };
        fs.clear();
        drop(memory);

        converter.convert(&dvi)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/state.rs"]
mod tests;
