//! Record-detail hyperlink extraction from rendered page content.
//!
//! Search providers return page markup as markdown; the assessor sites link
//! each parcel's detail page with the property address as the anchor text.

use std::sync::LazyLock;

use regex::Regex;

use crate::address::{match_variants, normalize_for_comparison};

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid link regex"));

/// A record-detail url, e.g. `https://host/Parcel.aspx?pid=2271`.
static RECORD_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)parcel\.aspx\?pid=\d+").expect("valid record url regex"));

/// Find the record-detail link whose anchor text names the given address.
///
/// Exact pass first: the anchor must equal one of the address spelling
/// variants (or normalize to the same canonical form). If nothing matches,
/// retry with a looser check keyed only on house number + street name.
pub fn find_record_link(address: &str, content: &str) -> Option<String> {
    let normalized = normalize_for_comparison(address);
    let variants = match_variants(address);

    for caps in MARKDOWN_LINK_RE.captures_iter(content) {
        let anchor = caps[1].trim();
        let url = &caps[2];
        if !RECORD_URL_RE.is_match(url) {
            continue;
        }
        let matches_variant = variants.iter().any(|v| anchor.eq_ignore_ascii_case(v));
        if matches_variant || normalize_for_comparison(anchor) == normalized {
            return Some(url.to_string());
        }
    }

    // Loose retry: house number + first street-name token as an anchor prefix.
    let loose = loose_prefix_regex(&normalized)?;
    for caps in MARKDOWN_LINK_RE.captures_iter(content) {
        let anchor = caps[1].trim();
        let url = &caps[2];
        if RECORD_URL_RE.is_match(url) && loose.is_match(anchor) {
            return Some(url.to_string());
        }
    }

    None
}

fn loose_prefix_regex(normalized: &str) -> Option<Regex> {
    let mut parts = normalized.split_whitespace();
    let number = parts.next()?;
    let street = parts.next()?;
    if !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Regex::new(&format!(
        r"(?i)^\s*{}[\s+]+{}\b",
        regex::escape(number),
        regex::escape(street)
    ))
    .ok()
}
