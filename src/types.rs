use serde::{Deserialize, Serialize};

/// One row of the ZIP backing table.
///
/// Loaded once at startup and immutable thereafter. A row is only retained
/// when it carries a non-empty county name and state code.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ZipRecord {
    pub zip: String,
    pub city: String,
    pub state_id: String,
    pub state_name: String,
    pub county_name: String,
    pub county_fips: String,
}

/// A ranked result from the search provider.
///
/// Request-scoped: produced per search call and discarded once the best
/// candidate has been chosen.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchCandidate {
    pub url: String,
    /// Rendered text snippet for the page.
    #[serde(default)]
    pub content: String,
    /// Full page markup when the provider returns it.
    #[serde(default)]
    pub raw_content: Option<String>,
    /// Provider-assigned relevance score.
    #[serde(default)]
    pub score: f64,
}

/// A single sale transaction parsed from an ownership-history table.
///
/// Fields are kept as the strings the completion endpoint produced; no
/// ordering or uniqueness is enforced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub sale_date: String,
    pub sale_price: String,
    pub buyer: String,
    pub seller: String,
}

/// The assembled response payload.
///
/// Only ever constructed after a successful ZipRecord lookup; location fields
/// are always present even when `transactions` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyHistory {
    pub zipcode: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub state_id: String,
    pub county_fips: String,
    #[serde(rename = "searchUrl")]
    pub search_url: String,
    pub transactions: Vec<TransactionRecord>,
}

/// Outcome of the first completion pass over a candidate page.
///
/// The wire format is a tagged JSON array (see `completion::parse_first_pass`);
/// this enum replaces array-index tagging with an explicit discriminated type
/// so the pipeline can match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum FirstPass {
    /// The page already contained an inline ownership-history table.
    InlineTransactions(Vec<TransactionRecord>),
    /// A record-detail link was found and must be fetched before the second pass.
    FollowLink { address: String, link: String },
    /// The address text is present but no raw markup was available; the
    /// second pass re-reads the content already in hand.
    FollowContent { address: String, link: String },
    /// Nothing recognizable on the page.
    Empty,
}
