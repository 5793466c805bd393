use super::*;
use crate::options::Dataset;

fn fp(text: &str) -> Fingerprint {
    crate::fingerprint::fingerprint(text, &Dataset::new())
}

const RAW: &str = concat!(
    r##"<svg width="10pt" height="10pt">"##,
    r##"<defs><clipPath id="pgf1"/><clipPath id="pgf12"/></defs>"##,
    r##"<g clip-path="url(#pgf12)"><use href="#pgf1"/></g>"##,
    r##"</svg>"##
);

#[test]
fn relabel_rewrites_ids_and_references() {
    let f = fp("a");
    let hex = f.to_hex();
    let out = relabel_ids(RAW, &f);
    assert!(out.contains(&format!(r#"id="pgf{hex}1""#)));
    assert!(out.contains(&format!(r#"id="pgf{hex}12""#)));
    assert!(out.contains(&format!("url(#pgf{hex}12)")));
    assert!(out.contains(&format!(r##"href="#pgf{hex}1""##)));
    assert!(!out.contains(r#"id="pgf1""#));
}

#[test]
fn relabel_never_rewrites_twice() {
    let f = fp("b");
    let hex = f.to_hex();
    // An empty suffix matches every `pgf`, including inside already-rewritten text.
    let svg = r#"<svg><g id="pgf"/><g id="pgf3"/></svg>"#;
    let out = relabel_ids(svg, &f);
    assert_eq!(
        out,
        format!(r#"<svg><g id="pgf{hex}"/><g id="pgf{hex}3"/></svg>"#)
    );
}

#[test]
fn relabel_without_generated_ids_is_identity() {
    let svg = r#"<svg><g id="other"/></svg>"#;
    assert_eq!(relabel_ids(svg, &fp("c")), svg);
}

#[test]
fn two_renders_sharing_ids_do_not_collide() {
    let a = relabel_ids(RAW, &fp("first diagram"));
    let b = relabel_ids(RAW, &fp("second diagram"));
    let combined = format!("{a}{b}");
    let ids: Vec<&str> = GENERATED_ID
        .find_iter(&combined)
        .map(|m| m.as_str())
        .collect();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn decorate_sets_role_classes_and_title() {
    let out = decorate_svg(
        r#"  <svg width="5pt" class="x tikz" role="presentation"><path d="M0 0"/></svg>  "#,
        Some("A <small> graph & more"),
    )
    .unwrap();
    assert_eq!(
        out,
        concat!(
            r#"<svg width="5pt" class="x tikz tikzjax" role="img">"#,
            "<title>A &lt;small&gt; graph &amp; more</title>",
            r#"<path d="M0 0"/></svg>"#
        )
    );
}

#[test]
fn decorate_handles_self_closing_root_and_quoted_gt() {
    let out = decorate_svg(r#"<svg data-x="a>b"/>"#, None).unwrap();
    assert_eq!(
        out,
        r#"<svg data-x="a>b" role="img" class="tikz tikzjax"></svg>"#
    );
}

#[test]
fn decorate_rejects_non_svg_output() {
    assert!(decorate_svg("<div></div>", None).is_err());
    assert!(decorate_svg("<svgfoo></svgfoo>", None).is_err());
    assert!(decorate_svg("<svg width=\"1\"", None).is_err());
}

#[test]
fn placeholder_is_sized_in_points() {
    let p = placeholder(75.0, 40.0);
    assert!(p.starts_with("<svg "));
    assert!(p.contains(r#"width="75pt" height="40pt" viewBox="0 0 75 40""#));
    assert!(p.contains(r#"cx="37.5" cy="20""#));
    assert!(p.ends_with("</svg>"));
}
