use super::*;

fn ds(pairs: &[(&str, &str)]) -> Dataset {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn fingerprint_is_deterministic_for_same_request() {
    let opts = ds(&[("width", "100"), ("tikzLibraries", "arrows")]);
    let a = fingerprint("\\draw (0,0) -- (1,1);", &opts);
    let b = fingerprint("\\draw (0,0) -- (1,1);", &opts);
    assert_eq!(a, b);
}

#[test]
fn fingerprint_has_a_stable_value() {
    // sha256("{}")
    assert_eq!(
        fingerprint("", &Dataset::new()).to_hex(),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn fingerprint_ignores_option_insertion_order() {
    let mut a = Dataset::new();
    a.insert("width".to_string(), "10".to_string());
    a.insert("ariaLabel".to_string(), "graph".to_string());
    let mut b = Dataset::new();
    b.insert("ariaLabel".to_string(), "graph".to_string());
    b.insert("width".to_string(), "10".to_string());
    assert_eq!(fingerprint("x", &a), fingerprint("x", &b));
    assert_eq!(canonical_options(&a), r#"{"ariaLabel":"graph","width":"10"}"#);
}

#[test]
fn fingerprint_changes_when_text_or_options_change() {
    let base = fingerprint("\\draw (0,0) circle (1);", &ds(&[("width", "10")]));
    assert_ne!(
        base,
        fingerprint("\\draw (0,0) circle (2);", &ds(&[("width", "10")]))
    );
    assert_ne!(
        base,
        fingerprint("\\draw (0,0) circle (1);", &ds(&[("width", "11")]))
    );
    assert_ne!(
        base,
        fingerprint(
            "\\draw (0,0) circle (1);",
            &ds(&[("width", "10"), ("disableCache", "true")])
        )
    );
}

#[test]
fn hex_round_trip_and_rejects_garbage() {
    let fp = fingerprint("a", &Dataset::new());
    let hex = fp.to_hex();
    assert_eq!(hex.len(), Fingerprint::HEX_LEN);
    assert_eq!(Fingerprint::from_hex(&hex), Some(fp));
    assert_eq!(Fingerprint::from_hex("abc"), None);
    assert_eq!(Fingerprint::from_hex(&hex.to_uppercase()), None);
    assert_eq!(Fingerprint::from_hex(&"g".repeat(64)), None);
}
