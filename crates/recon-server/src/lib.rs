//! # recon-server
//!
//! HTTP surface over [`recon_core`]: one `GET` route per query kind, JSON
//! bodies, allow-all CORS and `{"error": ...}` failures.
//!
//! | Route | Required |
//! |---|---|
//! | `/api/subdomains` | `domain` |
//! | `/api/wayback` | `url` (`mode`, `limit`) |
//! | `/api/dns` | `name` (`type`) |
//! | `/api/headers` | `url` |
//! | `/api/ssllabs` | `host` |
//! | `/api/techstack` | `url` |
//! | `/api/robots` | `url` |
//! | `/api/content-discovery` | `url` |
//! | `/api/asn` | `target` |
//! | `/api/httpinfo` | `url` |
//! | `/api/topports` | (`limit`) |
//! | `/api/ipreputation` | `ip` |
//! | `/health` | |

/// Command-line arguments
pub mod cli;
/// HTTP error mapping
pub mod error;
/// Route handlers
pub mod handlers;
/// Tracing subscriber setup
pub mod logging;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the application router.
///
/// `OPTIONS` on any route is answered by the CORS layer with 200 and an
/// empty body.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/subdomains", get(handlers::subdomains))
        .route("/api/wayback", get(handlers::wayback))
        .route("/api/dns", get(handlers::dns))
        .route("/api/headers", get(handlers::headers))
        .route("/api/ssllabs", get(handlers::ssllabs))
        .route("/api/techstack", get(handlers::techstack))
        .route("/api/robots", get(handlers::robots))
        .route("/api/content-discovery", get(handlers::content_discovery))
        .route("/api/asn", get(handlers::asn))
        .route("/api/httpinfo", get(handlers::httpinfo))
        .route("/api/topports", get(handlers::topports))
        .route("/api/ipreputation", get(handlers::ipreputation))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
