use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;
use crate::engine::{EngineIo, INPUT_FILE, OUTPUT_FILE};

fn gz(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

struct FixedAssets;

impl AssetSource for FixedAssets {
    fn fetch(&self, _name: &str) -> std::io::Result<Vec<u8>> {
        Ok(gz(b""))
    }
}

struct MissingAssets;

impl AssetSource for MissingAssets {
    fn fetch(&self, name: &str) -> std::io::Result<Vec<u8>> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()))
    }
}

struct EchoModule;

impl EngineModule for EchoModule {
    fn memory_pages(&self) -> usize {
        1
    }

    fn execute(&self, _: &[u8], _: &mut [u8], io: &mut EngineIo<'_>) -> Result<(), EngineError> {
        let input = io.open(INPUT_FILE)?.to_vec();
        if input.windows(6).any(|w| w == b"\\panic") {
            panic!("engine blew up");
        }
        io.write(OUTPUT_FILE, input);
        Ok(())
    }
}

struct Utf8;

impl DviConverter for Utf8 {
    fn convert(&self, dvi: &[u8]) -> Result<String, EngineError> {
        Ok(String::from_utf8_lossy(dvi).into_owned())
    }
}

fn spawn() -> EngineHandle {
    EngineWorker::spawn(
        Arc::new(EchoModule),
        Arc::new(Utf8),
        EngineWorkerOpts::default(),
    )
    .unwrap()
}

#[test]
fn run_before_load_is_rejected() {
    let engine = spawn();
    let err = smol::block_on(engine.run("x".to_string(), RenderOptions::default())).unwrap_err();
    assert!(matches!(err, EngineError::NotLoaded));
    engine.shutdown();
    engine.join();
}

#[test]
fn load_once_then_run() {
    let engine = spawn();
    smol::block_on(async {
        engine.load(Arc::new(FixedAssets)).await.unwrap();
        let again = engine.load(Arc::new(FixedAssets)).await.unwrap_err();
        assert!(matches!(again, EngineError::AlreadyLoaded));

        let out = engine
            .run("hello".to_string(), RenderOptions::default())
            .await
            .unwrap();
        assert!(out.contains("\nhello\n"));
    });
    engine.shutdown();
    engine.join();
}

#[test]
fn load_failure_is_reported_and_runs_stay_unloaded() {
    let engine = spawn();
    smol::block_on(async {
        let err = engine.load(Arc::new(MissingAssets)).await.unwrap_err();
        assert!(matches!(err, EngineError::Asset { .. }));
        let err = engine
            .run("x".to_string(), RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded));
    });
    engine.shutdown();
    engine.join();
}

#[test]
fn panicking_run_fails_only_that_request() {
    let engine = spawn();
    smol::block_on(async {
        engine.load(Arc::new(FixedAssets)).await.unwrap();
        let err = engine
            .run("\\panic".to_string(), RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(ref m) if m.contains("blew up")));
        let ok = engine
            .run("after".to_string(), RenderOptions::default())
            .await
            .unwrap();
        assert!(ok.contains("after"));
    });
    engine.shutdown();
    engine.join();
}

#[test]
fn requests_after_shutdown_fail_with_worker_gone() {
    let engine = spawn();
    engine.shutdown();
    assert!(engine.is_stopped());
    let err = smol::block_on(engine.run("x".to_string(), RenderOptions::default())).unwrap_err();
    assert!(matches!(err, EngineError::WorkerGone));
    engine.join();
}
