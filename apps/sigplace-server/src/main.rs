//! sigplace Server
//!
//! Exposes the signature placement core over HTTP:
//!
//! - Canvas <-> PDF coordinate conversion
//! - Drag clamping
//! - Stamping a signature image into a PDF
//!
//! The server is stateless. Documents are never stored; each request
//! carries the PDF and returns the signed copy.

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use sigplace_core::{EmbedOptions, PageFallback, SignatureEmbedder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

use api::{handle_clamp, handle_health, handle_sign, handle_to_canvas, handle_to_pdf};

/// Command-line arguments for the sigplace server
#[derive(Parser, Debug)]
#[command(name = "sigplace-server")]
#[command(about = "Signature placement and PDF embedding server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Embedding timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Reject placements on pages the document does not have instead of
    /// stamping page 1
    #[arg(long)]
    strict_pages: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "26214400")]
    max_body_bytes: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Embedding timeout in milliseconds
    pub timeout_ms: u64,
    pub embedder: SignatureEmbedder,
}

impl AppState {
    pub fn new(timeout_ms: u64, page_fallback: PageFallback) -> Self {
        Self {
            timeout_ms,
            embedder: SignatureEmbedder::new(EmbedOptions {
                page_fallback,
                ..EmbedOptions::default()
            }),
        }
    }
}

/// All routes, without transport middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Coordinate endpoints
        .route("/api/coords/to-pdf", post(handle_to_pdf))
        .route("/api/coords/to-canvas", post(handle_to_canvas))
        .route("/api/coords/clamp", post(handle_clamp))
        // Embedding
        .route("/api/sign", post(handle_sign))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sigplace server on {}:{}", args.host, args.port);

    let page_fallback = if args.strict_pages {
        PageFallback::Reject
    } else {
        PageFallback::FirstPage
    };
    let state = AppState::new(args.timeout_ms, page_fallback);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state)
        .layer(DefaultBodyLimit::max(args.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Embed timeout: {}ms", args.timeout_ms);
    info!("Page fallback: {:?}", page_fallback);
    info!("Max body size: {} bytes", args.max_body_bytes);

    axum::serve(listener, app).await?;

    Ok(())
}
