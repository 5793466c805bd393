//! String-level post-processing of rendered SVG and the transient elements shown in its place.

use std::sync::LazyLock;

use regex::Regex;

use crate::fingerprint::Fingerprint;
use crate::foundation::error::{InktexError, InktexResult};

/// Prefix of the identifiers the TeX graphics driver generates.
pub const GENERATED_ID_PREFIX: &str = "pgf";

/// Classes added to every rendered root element.
pub const RENDERED_CLASSES: [&str; 2] = ["tikz", "tikzjax"];

/// Shown in place of a request whose engine run failed. Displays the browser's broken-image icon.
pub const FAILURE_INDICATOR: &str = r#"<img src="//invalid.site/img-not-found.png">"#;

static GENERATED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid="pgf([^"]*)""#).expect("generated id pattern"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'=<>`]+))?"#)
        .expect("attribute pattern")
});

/// Make every generated identifier in `svg` unique to this request.
///
/// Each `id="pgf<suffix>"` yields a suffix; every occurrence of `pgf<suffix>` (the id itself and
/// all `url(#..)`/`href` references to it) becomes `pgf<fingerprint><suffix>`. All suffixes are
/// rewritten in one pass with longer suffixes preferred, so `pgf1` never clobbers part of `pgf12`
/// and replaced text is never rewritten twice.
pub fn relabel_ids(svg: &str, fingerprint: &Fingerprint) -> String {
    let mut suffixes: Vec<&str> = GENERATED_ID
        .captures_iter(svg)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if suffixes.is_empty() {
        return svg.to_string();
    }
    suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    suffixes.dedup();

    let alternation = suffixes
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!("{GENERATED_ID_PREFIX}({alternation})");
    let Ok(re) = Regex::new(&pattern) else {
        tracing::warn!(pattern = %pattern, "could not build id relabel pattern");
        return svg.to_string();
    };

    let hex = fingerprint.to_hex();
    re.replace_all(svg, |c: &regex::Captures<'_>| {
        format!("{GENERATED_ID_PREFIX}{hex}{}", &c[1])
    })
    .into_owned()
}

/// Extract the root `<svg>` element and mark it up as a labelled image.
///
/// Sets `role="img"`, adds [`RENDERED_CLASSES`] to any existing classes, and, when an accessible
/// label is given, inserts it as the element's first child `<title>`.
pub fn decorate_svg(markup: &str, aria_label: Option<&str>) -> InktexResult<String> {
    let start = find_svg_start(markup)
        .ok_or_else(|| InktexError::validation("rendered markup has no <svg> root"))?;
    let tag_end = find_tag_end(markup, start)
        .ok_or_else(|| InktexError::validation("unterminated <svg> start tag"))?;

    let self_closing = markup[..tag_end].ends_with('/');
    let attrs_src = &markup[start + 4..if self_closing { tag_end - 1 } else { tag_end }];
    let start_tag = rewrite_start_tag(attrs_src);

    let (body, close) = if self_closing {
        ("", "</svg>")
    } else {
        let close_at = markup
            .rfind("</svg>")
            .filter(|&i| i > tag_end)
            .ok_or_else(|| InktexError::validation("rendered markup has no </svg>"))?;
        (&markup[tag_end + 1..close_at], "</svg>")
    };

    let mut out = String::with_capacity(markup.len() + 64);
    out.push_str(&start_tag);
    if let Some(label) = aria_label {
        out.push_str("<title>");
        out.push_str(&escape_text(label));
        out.push_str("</title>");
    }
    out.push_str(body);
    out.push_str(close);
    Ok(out)
}

fn find_svg_start(markup: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = markup[from..].find("<svg") {
        let at = from + rel;
        match markup[at + 4..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(at),
            None => return None,
            _ => from = at + 4,
        }
    }
    None
}

// Index of the `>` closing the tag opened at `start`, skipping quoted attribute values.
fn find_tag_end(markup: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in markup.as_bytes().iter().enumerate().skip(start) {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn rewrite_start_tag(attrs_src: &str) -> String {
    let mut attrs: Vec<(String, Option<String>)> = ATTRIBUTE
        .captures_iter(attrs_src)
        .map(|c| {
            let name = c[1].to_string();
            let value = c.get(2).map(|v| unquote(v.as_str()).to_string());
            (name, value)
        })
        .collect();

    set_attr(&mut attrs, "role", "img".to_string());

    let mut classes: Vec<String> = attrs
        .iter()
        .find(|(n, _)| n == "class")
        .and_then(|(_, v)| v.as_deref())
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    for class in RENDERED_CLASSES {
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }
    set_attr(&mut attrs, "class", classes.join(" "));

    let mut out = String::from("<svg");
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(&name);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    out.push('>');
    out
}

fn set_attr(attrs: &mut Vec<(String, Option<String>)>, name: &str, value: String) {
    match attrs.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = Some(value),
        None => attrs.push((name.to_string(), Some(value))),
    }
}

fn unquote(v: &str) -> &str {
    let b = v.as_bytes();
    if b.len() >= 2 && (b[0] == b'"' || b[0] == b'\'') && b[b.len() - 1] == b[0] {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Loading placeholder: a translucent rounded box with a spinner, `width`×`height` pt.
pub fn placeholder(width: f64, height: f64) -> String {
    let (cx, cy) = (width / 2.0, height / 2.0);
    format!(
        concat!(
            r##"<svg version="1.1" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" "##,
            r##"width="{w}pt" height="{h}pt" viewBox="0 0 {w} {h}">"##,
            r##"<rect width="{w}" height="{h}" rx="5pt" ry="5pt" fill="#000" fill-opacity="0.2"/>"##,
            r##"<circle cx="{cx}" cy="{cy}" r="15" stroke="#f3f3f3" fill="none" stroke-width="3"/>"##,
            r##"<circle cx="{cx}" cy="{cy}" r="15" stroke="#3498db" fill="none" stroke-width="3" stroke-linecap="round">"##,
            r##"<animate attributeName="stroke-dasharray" begin="0s" dur="2s" values="56.5 37.7;1 93.2;56.5 37.7" keyTimes="0;0.5;1" repeatCount="indefinite"></animate>"##,
            r##"<animate attributeName="stroke-dashoffset" begin="0s" dur="2s" from="0" to="188.5" repeatCount="indefinite"></animate></circle>"##,
            r##"</svg>"##
        ),
        w = width,
        h = height,
        cx = cx,
        cy = cy,
    )
}

#[cfg(test)]
#[path = "../tests/unit/markup.rs"]
mod tests;
