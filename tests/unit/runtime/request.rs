use super::*;
use crate::document::Document;
use crate::document::HostDocument as _;

#[test]
fn discovery_hashes_immediately() {
    let doc = Document::new();
    let node = doc.create_element("script", []);
    let mut ds = Dataset::new();
    ds.insert("disableCache".to_string(), "true".to_string());

    let req = RenderRequest::discover(node, "x".to_string(), ds.clone());
    assert_eq!(req.state(), RequestState::HashComputed);
    assert_eq!(req.fingerprint, crate::fingerprint::fingerprint("x", &ds));
    assert!(!req.uses_cache());
    assert_eq!(doc.root(), doc.body());
}

#[test]
fn state_machine_allows_only_documented_paths() {
    use RequestState::*;
    let hit_path = [Discovered, HashComputed, CacheHit, Rendered];
    let run_path = [Discovered, HashComputed, CacheMiss, Queued, Executing, Failed];
    let reprobe_path = [Discovered, HashComputed, CacheMiss, Queued, Rendered];
    for path in [&hit_path[..], &run_path[..], &reprobe_path[..]] {
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{pair:?}");
        }
    }

    assert!(!Discovered.can_advance_to(Rendered));
    assert!(!CacheHit.can_advance_to(Failed));
    assert!(!Queued.can_advance_to(Failed));
    assert!(!Rendered.can_advance_to(Executing));
    assert!(Rendered.is_terminal() && Failed.is_terminal() && Dropped.is_terminal());
    assert!(CacheHit.can_advance_to(Dropped) && Executing.can_advance_to(Dropped));
    assert!(!HashComputed.can_advance_to(Dropped));
    assert!(!Rendered.can_advance_to(Dropped));
    assert!(!Queued.is_terminal());
}
