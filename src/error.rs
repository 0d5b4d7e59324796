use thiserror::Error;

/// Terminal failure states for one resolution request.
///
/// Every request ends in exactly one of these or in an assembled
/// `PropertyHistory`; there are no partial results. The HTTP layer maps each
/// variant to a status code.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No 5-digit zip substring in the input address.
    #[error("no zip code found in address")]
    NoZip,

    /// The zip is well-formed but absent from the backing table.
    #[error("county information not found for zip {0}")]
    UnknownZip(String),

    /// The search call succeeded but returned zero candidates.
    #[error("no assessment page found for this address")]
    NoCandidates,

    /// The deterministic link scan found no record-detail link.
    #[error("no record link matching the address was found")]
    NoMatchingLink,

    /// Transport failure talking to the search provider.
    #[error("search request failed: {0}")]
    SearchFailed(anyhow::Error),

    /// The follow-up document fetch errored or came back empty.
    #[error("failed to fetch follow-up page: {0}")]
    ExtractFailed(anyhow::Error),

    /// Transport failure talking to the completion endpoint.
    #[error("completion request failed: {0}")]
    CompletionFailed(anyhow::Error),

    /// The completion body was not well-formed JSON, or not an array.
    #[error("completion output was not valid JSON: {0}")]
    CompletionParse(String),

    /// The completion body parsed as JSON but matched no recognized tag.
    #[error("completion output had an unrecognized shape: {0}")]
    UnknownResponseShape(String),
}
