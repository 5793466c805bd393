use std::io::Write as _;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;
use crate::options::Dataset;

fn gz(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

struct MapAssets(std::collections::HashMap<String, Vec<u8>>);

impl AssetSource for MapAssets {
    fn fetch(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()))
    }
}

fn assets(snapshot: &[u8]) -> Arc<dyn AssetSource> {
    let mut m = std::collections::HashMap::new();
    m.insert(CODE_ASSET.to_string(), gz(b"CODE"));
    m.insert(SNAPSHOT_ASSET.to_string(), gz(snapshot));
    m.insert("pgfsys.def.gz".to_string(), gz(b"% driver"));
    Arc::new(MapAssets(m))
}

/// Records what it saw, scribbles on memory, and emits the input text as "DVI".
#[derive(Default)]
struct RecordingModule {
    seen_memory_prefix: Mutex<Vec<Vec<u8>>>,
    fetch_ancillary: bool,
}

impl EngineModule for RecordingModule {
    fn memory_pages(&self) -> usize {
        1
    }

    fn execute(
        &self,
        code: &[u8],
        memory: &mut [u8],
        io: &mut EngineIo<'_>,
    ) -> Result<(), EngineError> {
        assert_eq!(code, b"CODE");
        assert_eq!(memory.len(), PAGE_SIZE);
        assert_eq!(io.terminal_input(), TERMINAL_INPUT);
        self.seen_memory_prefix
            .lock()
            .unwrap()
            .push(memory[..4].to_vec());
        memory[..4].copy_from_slice(b"DIRT");

        if self.fetch_ancillary {
            let driver = io.open("pgfsys.def")?.to_vec();
            assert_eq!(driver, b"% driver");
        }
        let input = io.open(INPUT_FILE)?.to_vec();
        if input.windows(5).any(|w| w == b"\\fail") {
            return Err(EngineError::execution("! Undefined control sequence."));
        }
        io.write(OUTPUT_FILE, input);
        Ok(())
    }
}

struct Utf8Converter;

impl DviConverter for Utf8Converter {
    fn convert(&self, dvi: &[u8]) -> Result<String, EngineError> {
        String::from_utf8(dvi.to_vec()).map_err(|e| EngineError::conversion(e.to_string()))
    }
}

#[test]
fn load_fits_snapshot_to_memory_size() {
    let module = RecordingModule::default();
    let state = EngineState::load(&module, assets(b"SNAP")).unwrap();
    assert_eq!(state.code(), b"CODE");
    assert_eq!(state.snapshot().len(), PAGE_SIZE);
    assert_eq!(&state.snapshot()[..4], b"SNAP");
    assert!(state.snapshot()[4..].iter().all(|&b| b == 0));
}

#[test]
fn every_run_starts_from_pristine_snapshot() {
    let module = RecordingModule::default();
    let state = EngineState::load(&module, assets(b"SNAP")).unwrap();
    let opts = RenderOptions::default();

    let a = state.run(&module, &Utf8Converter, "first", &opts).unwrap();
    let b = state.run(&module, &Utf8Converter, "second", &opts).unwrap();
    assert!(a.contains("\nfirst\n"));
    assert!(b.contains("\nsecond\n"));

    let seen = module.seen_memory_prefix.lock().unwrap();
    assert_eq!(seen.as_slice(), &[b"SNAP".to_vec(), b"SNAP".to_vec()]);
    assert_eq!(&state.snapshot()[..4], b"SNAP");
}

#[test]
fn run_uses_synthesized_input() {
    let module = RecordingModule::default();
    let state = EngineState::load(&module, assets(b"")).unwrap();
    let mut ds = Dataset::new();
    ds.insert("tikzLibraries".to_string(), "calc".to_string());
    let out = state
        .run(&module, &Utf8Converter, "\\draw;", &RenderOptions::from_dataset(&ds))
        .unwrap();
    assert_eq!(
        out,
        "\\usetikzlibrary{calc}\\begin{document}\n\\draw;\n\\end{document}\n"
    );
}

#[test]
fn ancillary_files_come_from_the_asset_source() {
    let module = RecordingModule {
        fetch_ancillary: true,
        ..RecordingModule::default()
    };
    let state = EngineState::load(&module, assets(b"")).unwrap();
    state
        .run(&module, &Utf8Converter, "x", &RenderOptions::default())
        .unwrap();
}

#[test]
fn engine_failure_is_surfaced_without_output() {
    let module = RecordingModule::default();
    let state = EngineState::load(&module, assets(b"")).unwrap();
    let err = state
        .run(&module, &Utf8Converter, "\\fail", &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::Execution(_)));
}

#[test]
fn missing_output_file_is_an_error() {
    struct Silent;
    impl EngineModule for Silent {
        fn memory_pages(&self) -> usize {
            0
        }
        fn execute(&self, _: &[u8], _: &mut [u8], _: &mut EngineIo<'_>) -> Result<(), EngineError> {
            Ok(())
        }
    }
    let state = EngineState::load(&Silent, assets(b"")).unwrap();
    let err = state
        .run(&Silent, &Utf8Converter, "x", &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingOutput(ref f) if f == OUTPUT_FILE));
}

#[test]
fn load_without_assets_fails() {
    let empty: Arc<dyn AssetSource> = Arc::new(MapAssets(Default::default()));
    let err = EngineState::load(&RecordingModule::default(), empty).unwrap_err();
    assert!(err.is_load_failure());
}
