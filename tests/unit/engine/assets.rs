use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;

fn gz(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

#[test]
fn asset_names_are_normalized() {
    assert_eq!(normalize_asset_name("a/b.gz").as_deref(), Some("a/b.gz"));
    assert_eq!(normalize_asset_name("a\\./b.gz").as_deref(), Some("a/b.gz"));
    assert_eq!(normalize_asset_name("../x"), None);
    assert_eq!(normalize_asset_name("/abs"), None);
    assert_eq!(normalize_asset_name("./"), None);
}

#[test]
fn dir_source_fetches_and_decompresses() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("tex_files")).unwrap();
    std::fs::write(tmp.path().join("tex_files/pgf.sty.gz"), gz(b"% pgf")).unwrap();

    let source = DirAssetSource::new(tmp.path());
    let bytes = fetch_decompressed(&source, "tex_files/pgf.sty.gz").unwrap();
    assert_eq!(bytes, b"% pgf");
}

#[test]
fn missing_asset_is_an_asset_error() {
    let tmp = tempfile::tempdir().unwrap();
    let source = DirAssetSource::new(tmp.path());
    let err = fetch_decompressed(&source, CODE_ASSET).unwrap_err();
    assert!(matches!(err, EngineError::Asset { ref name, .. } if name == CODE_ASSET));
    assert!(err.is_load_failure());
}

#[test]
fn uncompressed_asset_is_a_decompress_error() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join(SNAPSHOT_ASSET), b"not gzip at all").unwrap();
    let source = DirAssetSource::new(tmp.path());
    let err = fetch_decompressed(&source, SNAPSHOT_ASSET).unwrap_err();
    assert!(matches!(err, EngineError::Decompress { .. }));
}

#[test]
fn traversal_is_rejected_by_dir_source() {
    let tmp = tempfile::tempdir().unwrap();
    let source = DirAssetSource::new(tmp.path());
    let err = source.fetch("../etc/passwd").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}
