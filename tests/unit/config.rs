use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = RuntimeConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.marker_type, "text/tikz");
    assert_eq!(cfg.finished_event, "tikzjax-load-finished");
    assert_eq!(cfg.store_name, "TikzJax");
    assert_eq!(cfg.placeholder_size, 75.0);
    assert_eq!(cfg.worker_opts().thread_name, "inktex-engine");
}

#[test]
fn partial_json_overrides_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("inktex.json");
    std::fs::write(
        &path,
        r#"{ "asset_root": "/srv/tex", "cache_dir": "/var/cache/inktex" }"#,
    )
    .unwrap();
    let cfg = RuntimeConfig::from_path(&path).unwrap();
    assert_eq!(cfg.asset_root, PathBuf::from("/srv/tex"));
    assert_eq!(cfg.cache_dir, Some(PathBuf::from("/var/cache/inktex")));
    assert_eq!(cfg.marker_type, DEFAULT_MARKER_TYPE);
}

#[test]
fn unknown_keys_and_bad_values_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.json");

    std::fs::write(&path, r#"{ "asset_rot": "x" }"#).unwrap();
    assert!(matches!(
        RuntimeConfig::from_path(&path),
        Err(InktexError::Serde(_))
    ));

    std::fs::write(&path, r#"{ "placeholder_size": 0 }"#).unwrap();
    assert!(matches!(
        RuntimeConfig::from_path(&path),
        Err(InktexError::Validation(_))
    ));

    assert!(RuntimeConfig::from_path(&tmp.path().join("missing.json")).is_err());
}
