//! End-to-end pipeline scenarios driven by stub search/completion providers.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use deedtrace::completion::CompletionProvider;
use deedtrace::search::SearchProvider;
use deedtrace::{
    FirstPass, Pipeline, PipelineError, SearchCandidate, TransactionRecord, ZipDirectory,
};

const ZIP_TABLE: &str = "\
zip,city,state_id,state_name,county_name,county_fips
06824,Fairfield,CT,Connecticut,Fairfield,09001
";

const DOMAIN: &str = "assessor.example.com";

struct StubSearch {
    candidates: Vec<SearchCandidate>,
    extract_result: Option<String>,
    extract_calls: Arc<AtomicU32>,
    last_extract_url: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, _query: &str, _domain: &str) -> Result<Vec<SearchCandidate>> {
        Ok(self.candidates.clone())
    }

    async fn extract(&self, url: &str) -> Result<String> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_extract_url.lock().unwrap() = Some(url.to_string());
        self.extract_result
            .clone()
            .ok_or_else(|| anyhow!("no extract content configured"))
    }
}

struct StubCompletion {
    first: FirstPass,
    second: Vec<TransactionRecord>,
    second_pass_input: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl CompletionProvider for StubCompletion {
    async fn first_pass(
        &self,
        _content: &str,
        _address: &str,
        _url: &str,
    ) -> Result<FirstPass, PipelineError> {
        Ok(self.first.clone())
    }

    async fn second_pass(
        &self,
        content: &str,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        *self.second_pass_input.lock().unwrap() = Some(content.to_string());
        Ok(self.second.clone())
    }
}

fn tx(date: &str) -> TransactionRecord {
    TransactionRecord {
        sale_date: date.to_string(),
        sale_price: "$450,000".to_string(),
        buyer: "DOE JOHN".to_string(),
        seller: "SMITH JANE".to_string(),
    }
}

fn candidate(content: &str, raw_content: Option<&str>) -> SearchCandidate {
    SearchCandidate {
        url: "https://assessor.example.com/Search.aspx?q=8+lynnbrook".to_string(),
        content: content.to_string(),
        raw_content: raw_content.map(str::to_string),
        score: 0.9,
    }
}

fn zips() -> Arc<ZipDirectory> {
    Arc::new(ZipDirectory::from_csv(ZIP_TABLE).unwrap())
}

struct Harness {
    extract_calls: Arc<AtomicU32>,
    last_extract_url: Arc<Mutex<Option<String>>>,
    second_pass_input: Arc<Mutex<Option<String>>>,
    pipeline: Pipeline<StubSearch, StubCompletion>,
}

fn harness(
    candidates: Vec<SearchCandidate>,
    extract_result: Option<&str>,
    first: FirstPass,
    second: Vec<TransactionRecord>,
) -> Harness {
    let extract_calls = Arc::new(AtomicU32::new(0));
    let last_extract_url = Arc::new(Mutex::new(None));
    let second_pass_input = Arc::new(Mutex::new(None));

    let search = StubSearch {
        candidates,
        extract_result: extract_result.map(str::to_string),
        extract_calls: extract_calls.clone(),
        last_extract_url: last_extract_url.clone(),
    };
    let completion = StubCompletion {
        first,
        second,
        second_pass_input: second_pass_input.clone(),
    };

    Harness {
        extract_calls,
        last_extract_url,
        second_pass_input,
        pipeline: Pipeline::new(zips(), search, completion, DOMAIN),
    }
}

#[tokio::test]
async fn inline_transactions_end_to_end() {
    let h = harness(
        vec![candidate("parcel record for 8 lynnbrook rd", None)],
        None,
        FirstPass::InlineTransactions(vec![tx("2020-05-01"), tx("2011-03-15")]),
        vec![],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    assert_eq!(history.zipcode, "06824");
    assert_eq!(history.city, "Fairfield");
    assert_eq!(history.county, "Fairfield");
    assert_eq!(history.state, "Connecticut");
    assert_eq!(history.state_id, "CT");
    assert_eq!(history.county_fips, "09001");
    assert_eq!(history.transactions.len(), 2);
    assert_eq!(history.transactions[0].sale_date, "2020-05-01");
    // Kind 1 never fetches a follow-up document.
    assert_eq!(h.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_zip_is_terminal() {
    let h = harness(vec![], None, FirstPass::Empty, vec![]);

    let err = h.pipeline.resolve("1 Main St, 99999").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownZip(ref z) if z == "99999"));
    assert!(err.to_string().contains("county information not found"));
}

#[tokio::test]
async fn missing_zip_is_terminal() {
    let h = harness(vec![], None, FirstPass::Empty, vec![]);

    let err = h.pipeline.resolve("8 Lynnbrook Road").await.unwrap_err();
    assert!(matches!(err, PipelineError::NoZip));
}

#[tokio::test]
async fn no_candidates_is_terminal() {
    let h = harness(vec![], None, FirstPass::Empty, vec![]);

    let err = h
        .pipeline
        .resolve("8 Lynnbrook Road, 06824")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoCandidates));
}

#[tokio::test]
async fn follow_link_fetches_then_second_pass() {
    let h = harness(
        vec![candidate("results page", None)],
        Some("ownership history table"),
        FirstPass::FollowLink {
            address: "8 Lynnbrook Road".to_string(),
            link: "https://assessor.example.com/Parcel.aspx?pid=2271".to_string(),
        },
        vec![tx("2015-09-30")],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    assert_eq!(history.transactions.len(), 1);
    assert_eq!(h.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.last_extract_url.lock().unwrap().as_deref(),
        Some("https://assessor.example.com/Parcel.aspx?pid=2271")
    );
    // Second pass sees the fetched document, not the candidate snippet.
    assert_eq!(
        h.second_pass_input.lock().unwrap().as_deref(),
        Some("ownership history table")
    );
}

#[tokio::test]
async fn follow_content_rereads_without_fetch() {
    let h = harness(
        vec![candidate("snippet mentioning 8 lynnbrook rd", None)],
        None,
        FirstPass::FollowContent {
            address: "8 Lynnbrook Road".to_string(),
            link: "https://assessor.example.com/Search.aspx?q=8+lynnbrook".to_string(),
        },
        vec![tx("2015-09-30")],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    assert_eq!(history.transactions.len(), 1);
    assert_eq!(h.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.second_pass_input.lock().unwrap().as_deref(),
        Some("snippet mentioning 8 lynnbrook rd")
    );
}

#[tokio::test]
async fn empty_first_pass_without_raw_content_is_empty_success() {
    let h = harness(
        vec![candidate("snippet", None)],
        None,
        FirstPass::Empty,
        vec![],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    // Never an error: location fields present, transactions empty.
    assert_eq!(history.city, "Fairfield");
    assert!(history.transactions.is_empty());
}

#[tokio::test]
async fn empty_first_pass_with_record_link_in_markup_is_overridden() {
    let raw = "[8 LYNNBROOK ROAD](https://assessor.example.com/Parcel.aspx?pid=2271)";
    let h = harness(
        vec![candidate("snippet", Some(raw))],
        Some("fetched detail page"),
        FirstPass::Empty,
        vec![tx("2009-02-11")],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    assert_eq!(history.transactions.len(), 1);
    assert_eq!(h.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.last_extract_url.lock().unwrap().as_deref(),
        Some("https://assessor.example.com/Parcel.aspx?pid=2271")
    );
}

#[tokio::test]
async fn empty_first_pass_with_unrelated_markup_stays_empty() {
    let raw = "[12 ELM STREET](https://assessor.example.com/Parcel.aspx?pid=5)";
    let h = harness(
        vec![candidate("snippet", Some(raw))],
        None,
        FirstPass::Empty,
        vec![],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();

    assert!(history.transactions.is_empty());
    assert_eq!(h.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn follow_link_without_url_is_no_matching_link() {
    let h = harness(
        vec![candidate("snippet", None)],
        None,
        FirstPass::FollowLink {
            address: "8 Lynnbrook Road".to_string(),
            link: String::new(),
        },
        vec![],
    );

    let err = h
        .pipeline
        .resolve("8 Lynnbrook Road, 06824")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoMatchingLink));
}

#[tokio::test]
async fn best_scoring_content_match_is_preferred() {
    let mut other = candidate("unrelated listing", None);
    other.url = "https://assessor.example.com/other".to_string();
    other.score = 0.99;
    let matching = candidate("card for 8 lynnbrook rd fairfield", None);

    let h = harness(
        vec![other, matching],
        None,
        FirstPass::Empty,
        vec![],
    );

    let history = h.pipeline.resolve("8 Lynnbrook Road, 06824").await.unwrap();
    assert_eq!(
        history.search_url,
        "https://assessor.example.com/Search.aspx?q=8+lynnbrook"
    );
}
