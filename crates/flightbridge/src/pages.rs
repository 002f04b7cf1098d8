//! HTTP page server.
//!
//! Stateless per request: a small fixed set of paths maps to a page kind,
//! the page is assembled from fragments, and the result is returned with the
//! streaming address pointed at this relay. Unknown paths are 404.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assets::{PageAssets, PageKind};
use crate::error::{Error, Result};

/// Everything a page request needs, fixed at startup.
#[derive(Debug)]
pub struct PageContext {
    /// Fragment store.
    pub assets: PageAssets,
    /// Port the streaming server listens on, substituted into pages.
    pub stream_port: u16,
}

/// The request/response channel serving the visualization pages.
#[derive(Debug)]
pub struct PageServer {
    port: u16,
    context: Arc<PageContext>,
}

impl PageServer {
    /// Create a page server over the given context.
    #[must_use]
    pub fn new(port: u16, context: Arc<PageContext>) -> Self {
        Self { port, context }
    }

    /// The router, exposed separately for tests.
    #[must_use]
    pub fn router(context: Arc<PageContext>) -> Router {
        Router::new()
            .route("/", get(live_page))
            .route("/live", get(live_page))
            .route("/calwiz", get(calibration_page))
            .route("/control", get(control_page))
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .with_state(context)
    }

    /// Bind the page port and serve requests until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the port is unavailable, or an I/O error
    /// from the accept loop.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        info!("page server on http://localhost:{}", self.port);

        axum::serve(listener, Self::router(self.context)).await?;
        Ok(())
    }
}

async fn live_page(State(context): State<Arc<PageContext>>) -> Response {
    serve_page(&context, PageKind::Live)
}

async fn calibration_page(State(context): State<Arc<PageContext>>) -> Response {
    serve_page(&context, PageKind::Calibration)
}

async fn control_page(State(context): State<Arc<PageContext>>) -> Response {
    serve_page(&context, PageKind::Control)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "page not found").into_response()
}

fn serve_page(context: &PageContext, kind: PageKind) -> Response {
    match context.assets.page(kind, context.stream_port) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(page = %kind, error = %err, "failed to assemble page");
            (StatusCode::INTERNAL_SERVER_ERROR, "page assembly failed").into_response()
        }
    }
}
