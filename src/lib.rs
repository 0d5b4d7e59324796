pub mod address;
pub mod completion;
pub mod config;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod search;
pub mod types;
pub mod zip_directory;

pub use completion::{ChatCompletionClient, CompletionProvider};
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use search::{SearchProvider, TavilySearchClient};
pub use types::{FirstPass, PropertyHistory, SearchCandidate, TransactionRecord, ZipRecord};
pub use zip_directory::ZipDirectory;
