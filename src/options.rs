//! Typed view over a render request's option attributes.
//!
//! Request nodes carry their options as `data-*` attributes. The raw attribute set is kept as a
//! [`Dataset`] (dataset-style camelCase keys, sorted) because that exact map feeds the content
//! fingerprint; [`RenderOptions`] is the parsed form consumed by the engine adapter and the
//! lifecycle manager.

use std::collections::BTreeMap;

/// Raw request options keyed by dataset name (`data-tex-packages` -> `texPackages`).
pub type Dataset = BTreeMap<String, String>;

pub const KEY_TEX_PACKAGES: &str = "texPackages";
pub const KEY_TIKZ_LIBRARIES: &str = "tikzLibraries";
pub const KEY_ADD_TO_PREAMBLE: &str = "addToPreamble";
pub const KEY_WIDTH: &str = "width";
pub const KEY_HEIGHT: &str = "height";
pub const KEY_ARIA_LABEL: &str = "ariaLabel";
pub const KEY_DISABLE_CACHE: &str = "disableCache";
pub const KEY_SHOW_CONSOLE: &str = "showConsole";

/// Placeholder edge length (pt) when no usable size hint is given.
pub const DEFAULT_PLACEHOLDER_SIZE: f64 = 75.0;

/// A `\usepackage` entry: package name plus an optional option string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexPackage {
    pub name: String,
    pub options: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderOptions {
    /// Packages in declaration order.
    pub packages: Vec<TexPackage>,
    pub libraries: Option<String>,
    pub preamble: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub aria_label: Option<String>,
    pub disable_cache: bool,
    pub show_console: bool,
}

impl RenderOptions {
    /// Parse the recognized keys out of a dataset. Unknown keys are ignored (they still take part
    /// in the fingerprint). A malformed package list degrades to no packages.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let packages = match dataset.get(KEY_TEX_PACKAGES) {
            Some(raw) => parse_packages(raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, raw = %raw, "ignoring malformed texPackages");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            packages,
            libraries: non_empty(dataset.get(KEY_TIKZ_LIBRARIES)),
            preamble: non_empty(dataset.get(KEY_ADD_TO_PREAMBLE)),
            width: dataset.get(KEY_WIDTH).and_then(|v| parse_leading_f64(v)),
            height: dataset.get(KEY_HEIGHT).and_then(|v| parse_leading_f64(v)),
            aria_label: non_empty(dataset.get(KEY_ARIA_LABEL)),
            disable_cache: is_set(dataset.get(KEY_DISABLE_CACHE)),
            show_console: is_set(dataset.get(KEY_SHOW_CONSOLE)),
        }
    }

    /// Placeholder size in pt, falling back to `default` for missing, zero, or unparsable hints.
    pub fn placeholder_size(&self, default: f64) -> (f64, f64) {
        let pick = |v: Option<f64>| match v {
            Some(x) if x.is_finite() && x != 0.0 => x,
            _ => default,
        };
        (pick(self.width), pick(self.height))
    }
}

/// Convert a `data-*` attribute name into its dataset key, or `None` for other attributes.
///
/// `data-tex-packages` becomes `texPackages`; a `-` followed by an ASCII lowercase letter is
/// folded into the uppercase letter, everything else is kept verbatim.
pub fn dataset_key(attr: &str) -> Option<String> {
    let rest = attr.strip_prefix("data-")?;
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-'
            && let Some(&next) = chars.peek()
            && next.is_ascii_lowercase()
        {
            out.push(next.to_ascii_uppercase());
            chars.next();
            continue;
        }
        out.push(c);
    }
    Some(out)
}

/// Inverse of [`dataset_key`]: `texPackages` becomes `data-tex-packages`.
pub fn attribute_name(key: &str) -> String {
    let mut out = String::from("data-");
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Collect the dataset out of an attribute list.
pub fn dataset_from_attributes<'a>(attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Dataset {
    attrs
        .into_iter()
        .filter_map(|(name, value)| dataset_key(name).map(|k| (k, value.to_string())))
        .collect()
}

fn parse_packages(raw: &str) -> Result<Vec<TexPackage>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Object(map) = value else {
        return Err(serde::de::Error::custom("texPackages must be a JSON object"));
    };

    Ok(map
        .into_iter()
        .map(|(name, opts)| {
            let options = match opts {
                serde_json::Value::Null | serde_json::Value::Bool(false) => None,
                serde_json::Value::String(s) if s.is_empty() => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            };
            TexPackage { name, options }
        })
        .collect())
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.filter(|s| !s.is_empty()).cloned()
}

// Attribute flags count as set when present with a non-empty value.
fn is_set(v: Option<&String>) -> bool {
    v.is_some_and(|s| !s.is_empty())
}

/// Parse the longest numeric prefix of `s` (after leading whitespace), so `"120pt"` yields 120.
pub(crate) fn parse_leading_f64(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut best = None;
    for (i, c) in s.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
            break;
        }
        if let Ok(v) = s[..i + c.len_utf8()].parse::<f64>() {
            best = Some(v);
        }
    }
    best
}

#[cfg(test)]
#[path = "../tests/unit/options.rs"]
mod tests;
