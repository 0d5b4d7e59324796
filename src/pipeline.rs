//! The per-request orchestration: address in, assembled property history out.
//!
//! One strictly sequential chain per request: zip extraction, directory
//! lookup, one search call, at most one follow-up fetch and two completion
//! calls. No retries; the first failure is terminal and mapped to a distinct
//! error.

use std::sync::Arc;

use crate::address;
use crate::completion::CompletionProvider;
use crate::error::PipelineError;
use crate::link;
use crate::search::{SearchProvider, select_candidate};
use crate::types::{FirstPass, PropertyHistory, TransactionRecord};
use crate::zip_directory::ZipDirectory;

pub struct Pipeline<S, C> {
    zips: Arc<ZipDirectory>,
    search: S,
    completion: C,
    assessor_domain: String,
}

impl<S: SearchProvider, C: CompletionProvider> Pipeline<S, C> {
    pub fn new(
        zips: Arc<ZipDirectory>,
        search: S,
        completion: C,
        assessor_domain: impl Into<String>,
    ) -> Self {
        Self {
            zips,
            search,
            completion,
            assessor_domain: assessor_domain.into(),
        }
    }

    /// Resolve a free-text address into its transaction history.
    pub async fn resolve(&self, raw_address: &str) -> Result<PropertyHistory, PipelineError> {
        let zip = address::extract_zip(raw_address).ok_or(PipelineError::NoZip)?;
        let zip5 = &zip[..5];

        let record = self
            .zips
            .lookup(zip5)
            .ok_or_else(|| PipelineError::UnknownZip(zip5.to_string()))?
            .clone();
        tracing::info!(
            "Resolved zip {} to {}, {} County, {}",
            record.zip,
            record.city,
            record.county_name,
            record.state_id
        );

        let street = address::strip_zip(raw_address);
        let normalized = address::normalize_for_comparison(&street);

        let query = format!("{} {} {}", street, record.city, record.state_id);
        let candidates = self
            .search
            .search(&query, &self.assessor_domain)
            .await
            .map_err(PipelineError::SearchFailed)?;
        let candidate =
            select_candidate(candidates, &normalized).ok_or(PipelineError::NoCandidates)?;
        tracing::info!("Selected candidate page {}", candidate.url);

        // First pass sees the raw markup when the provider returned it,
        // otherwise the rendered snippet.
        let content = candidate
            .raw_content
            .clone()
            .unwrap_or_else(|| candidate.content.clone());

        let mut outcome = self
            .completion
            .first_pass(&content, &street, &candidate.url)
            .await?;

        // Deterministic override: an empty first pass over real markup gets
        // one regex scan for a record link before the empty result stands.
        if outcome == FirstPass::Empty
            && let Some(raw) = candidate.raw_content.as_deref()
            && let Some(url) = link::find_record_link(&street, raw)
        {
            tracing::info!("Empty first pass overridden by record link {}", url);
            outcome = FirstPass::FollowLink {
                address: street.clone(),
                link: url,
            };
        }

        let transactions = self.finish_pass(outcome, &content).await?;
        tracing::info!("Assembled {} transaction(s)", transactions.len());

        Ok(PropertyHistory {
            zipcode: record.zip,
            city: record.city,
            county: record.county_name,
            state: record.state_name,
            state_id: record.state_id,
            county_fips: record.county_fips,
            search_url: candidate.url,
            transactions,
        })
    }

    async fn finish_pass(
        &self,
        outcome: FirstPass,
        candidate_content: &str,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        match outcome {
            FirstPass::InlineTransactions(rows) => Ok(rows),
            FirstPass::FollowLink { link, .. } => {
                if link.is_empty() {
                    return Err(PipelineError::NoMatchingLink);
                }
                tracing::info!("Following record link {}", link);
                let fetched = self
                    .search
                    .extract(&link)
                    .await
                    .map_err(PipelineError::ExtractFailed)?;
                self.completion.second_pass(&fetched).await
            }
            // The address text was present without markup: re-read the
            // content already in hand, no second fetch.
            FirstPass::FollowContent { link, .. } => {
                if link.is_empty() {
                    return Err(PipelineError::NoMatchingLink);
                }
                self.completion.second_pass(candidate_content).await
            }
            FirstPass::Empty => Ok(Vec::new()),
        }
    }
}
