use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deedtrace::{
    ChatCompletionClient, Config, Pipeline, PipelineError, PropertyHistory, TavilySearchClient,
    ZipDirectory,
};

type AppPipeline = Pipeline<TavilySearchClient, ChatCompletionClient>;

/// Server configuration
struct ServerConfig {
    port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        }
    }
}

/// Application state shared across all requests
#[derive(Clone)]
struct AppState {
    pipeline: Arc<AppPipeline>,
    metrics: Arc<Metrics>,
}

/// Server metrics
struct Metrics {
    total_requests: AtomicU64,
    requests_in_flight: AtomicU64,
    start_time: Instant,
}

/// RAII guard for tracking in-flight requests
struct RequestGuard<'a>(&'a AtomicU64);

impl<'a> Drop for RequestGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,deedtrace=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Read configuration from environment; missing API keys are fatal here.
    let server_config = ServerConfig::from_env();
    let config = Config::from_env()?;

    tracing::info!("Loading zip directory from {}", config.zip_table_path);
    let zips = Arc::new(
        ZipDirectory::load(&config.zip_table_path).context("Failed to load zip directory")?,
    );
    tracing::info!("Loaded {} zip records", zips.len());

    let search = TavilySearchClient::new(config.search_api_url.as_str(), config.search_api_key.as_str());
    let completion = ChatCompletionClient::new(
        config.completion_api_url.as_str(),
        config.completion_api_key.as_str(),
        config.completion_model.as_str(),
    );
    let pipeline = Arc::new(Pipeline::new(
        zips,
        search,
        completion,
        config.assessor_domain.as_str(),
    ));

    // Build Axum app with routes
    let app = build_app(pipeline);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the Axum application with routes and middleware
fn build_app(pipeline: Arc<AppPipeline>) -> Router {
    let metrics = Arc::new(Metrics {
        total_requests: AtomicU64::new(0),
        requests_in_flight: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let state = AppState { pipeline, metrics };

    Router::new()
        // Form front end
        .route("/", get(index))
        // Health check
        .route("/health", get(health_check))
        // API routes
        .route("/api/history", post(lookup_history))
        .route("/api/metrics", get(get_metrics))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Address form front end
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Resolve one address into its transaction history
async fn lookup_history(
    State(state): State<AppState>,
    Json(request): Json<HistoryRequest>,
) -> Result<Json<PropertyHistory>, ApiError> {
    // Increment metrics
    state.metrics.total_requests.fetch_add(1, Ordering::Relaxed);
    state
        .metrics
        .requests_in_flight
        .fetch_add(1, Ordering::Relaxed);

    // Ensure we decrement on exit
    let _guard = RequestGuard(&state.metrics.requests_in_flight);

    let address = request.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("address cannot be empty".to_string()));
    }

    tracing::info!("Resolving history for: {}", address);

    let history = state.pipeline.resolve(address).await.map_err(|e| {
        tracing::error!("Resolution error: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(history))
}

#[derive(Deserialize)]
struct HistoryRequest {
    address: String,
}

/// Get server metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        total_requests: state.metrics.total_requests.load(Ordering::Relaxed),
        requests_in_flight: state.metrics.requests_in_flight.load(Ordering::Relaxed),
        uptime_seconds: state.metrics.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    total_requests: u64,
    requests_in_flight: u64,
    uptime_seconds: u64,
}

/// API error types
enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::NoZip => ApiError::BadRequest(message),
            PipelineError::UnknownZip(_)
            | PipelineError::NoCandidates
            | PipelineError::NoMatchingLink => ApiError::NotFound(message),
            PipelineError::SearchFailed(_)
            | PipelineError::ExtractFailed(_)
            | PipelineError::CompletionFailed(_)
            | PipelineError::CompletionParse(_)
            | PipelineError::UnknownResponseShape(_) => ApiError::InternalError(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Property Transaction History</title>
  <style>
    body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
    input[type=text] { width: 24rem; padding: 0.4rem; }
    table { border-collapse: collapse; margin-top: 1rem; }
    td, th { border: 1px solid #999; padding: 0.3rem 0.6rem; text-align: left; }
    .error { color: #b00; }
  </style>
</head>
<body>
  <h1>Property Transaction History</h1>
  <form id="lookup">
    <input type="text" name="address" placeholder="8 Lynnbrook Road, 06824" required>
    <button type="submit">Search</button>
  </form>
  <div id="result"></div>
  <script>
    document.getElementById('lookup').addEventListener('submit', async (e) => {
      e.preventDefault();
      const out = document.getElementById('result');
      out.textContent = 'Searching...';
      const address = new FormData(e.target).get('address');
      try {
        const resp = await fetch('/api/history', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ address }),
        });
        const data = await resp.json();
        if (!resp.ok) {
          out.innerHTML = '<p class="error"></p>';
          out.firstChild.textContent = data.error || 'Request failed';
          return;
        }
        let html = '<p>' + data.city + ', ' + data.county + ' County, ' +
          data.state + ' ' + data.zipcode + ' (FIPS ' + data.county_fips + ')</p>' +
          '<p><a href="' + data.searchUrl + '">Source page</a></p>';
        if (data.transactions.length === 0) {
          html += '<p>No transactions found.</p>';
        } else {
          html += '<table><tr><th>Date</th><th>Price</th><th>Seller</th><th>Buyer</th></tr>';
          for (const t of data.transactions) {
            html += '<tr><td>' + t.sale_date + '</td><td>' + t.sale_price +
              '</td><td>' + t.seller + '</td><td>' + t.buyer + '</td></tr>';
          }
          html += '</table>';
        }
        out.innerHTML = html;
      } catch (err) {
        out.innerHTML = '<p class="error">Request failed</p>';
      }
    });
  </script>
</body>
</html>
"#;
