//! Free-text address handling: zip extraction and the normalization applied
//! on both sides of every address comparison.

use std::sync::LazyLock;

use regex::Regex;

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{5}(-\d{4})?").expect("valid zip regex"));

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// First 5- or 9-digit zip substring in the input, if any.
pub fn extract_zip(address: &str) -> Option<&str> {
    ZIP_RE.find(address).map(|m| m.as_str())
}

/// Remove the matched zip (and an immediately preceding comma) from the
/// address, leaving the street portion for search and display.
pub fn strip_zip(address: &str) -> String {
    let Some(m) = ZIP_RE.find(address) else {
        return address.trim().to_string();
    };

    let mut head = address[..m.start()].trim_end().to_string();
    if head.ends_with(',') {
        head.pop();
    }
    let tail = address[m.end()..].trim_start_matches(|c: char| c == ',' || c.is_whitespace());

    let joined = if tail.is_empty() {
        head
    } else {
        format!("{} {}", head, tail)
    };
    joined.trim().to_string()
}

/// Canonical form used for every address equality check: lowercase, single
/// spaces, truncated at the first comma, trailing "road" folded to "rd".
///
/// Comparison-only; never shown to the user.
pub fn normalize_for_comparison(address: &str) -> String {
    let lowered = address.to_lowercase();
    let street = lowered.split(',').next().unwrap_or("");
    let collapsed = WS_RE.replace_all(street.trim(), " ").to_string();

    match collapsed.strip_suffix(" road") {
        Some(stem) => format!("{} rd", stem),
        None => collapsed,
    }
}

/// Spelling variants a record-detail anchor might use for this address:
/// raw, uppercase, "+"-joined, percent-encoded, and Road/Rd swapped.
pub fn match_variants(address: &str) -> Vec<String> {
    let base = WS_RE.replace_all(address.trim(), " ").to_string();
    let mut variants = vec![base.clone(), base.to_uppercase()];

    // Trailing street-type swap, both directions.
    if let Some(stem) = strip_suffix_ci(&base, " road") {
        variants.push(format!("{} Rd", stem));
    } else if let Some(stem) = strip_suffix_ci(&base, " rd") {
        variants.push(format!("{} Road", stem));
    }

    for v in variants.clone() {
        variants.push(v.replace(' ', "+"));
        variants.push(urlencoding::encode(&v).into_owned());
    }

    variants
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        Some(&s[..split])
    } else {
        None
    }
}
