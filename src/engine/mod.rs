//! Execution engine adapter.
//!
//! The TeX engine itself is opaque: an [`EngineModule`] executes compiled code against a working
//! memory image and an [`EngineIo`] (virtual files, terminal input, ancillary asset fetch). The
//! adapter owns the loaded code and initial memory snapshot ([`EngineState`]), resets memory for
//! every run, and hands the raw DVI output to a [`DviConverter`]. [`EngineWorker`] moves all of
//! that onto a dedicated thread so a long run never blocks the orchestration tasks.

mod assets;
mod input;
mod state;
mod vfs;
mod worker;

pub use assets::{AssetSource, CODE_ASSET, DirAssetSource, SNAPSHOT_ASSET, fetch_decompressed};
pub use input::{INPUT_FILE, OUTPUT_FILE, TERMINAL_INPUT, synthesize_input};
pub use state::EngineState;
pub use vfs::{EngineIo, VirtualFs};
pub use worker::{EngineHandle, EngineWorker, EngineWorkerOpts};

use crate::foundation::error::EngineError;

/// Engine memory is allocated in pages of this many bytes.
pub const PAGE_SIZE: usize = 64 * 1024;

/// The compute engine, consumed as an opaque execute operation.
pub trait EngineModule: Send + Sync {
    /// Fixed working-memory requirement, in [`PAGE_SIZE`] pages.
    fn memory_pages(&self) -> usize;

    /// Run the engine to completion.
    ///
    /// `memory` has already been initialized from the snapshot. The input document is available
    /// through `io` as [`INPUT_FILE`]; a successful run leaves [`OUTPUT_FILE`] behind.
    fn execute(&self, code: &[u8], memory: &mut [u8], io: &mut EngineIo<'_>)
    -> Result<(), EngineError>;
}

/// Raw engine output (DVI) to SVG markup.
pub trait DviConverter: Send + Sync {
    fn convert(&self, dvi: &[u8]) -> Result<String, EngineError>;
}
