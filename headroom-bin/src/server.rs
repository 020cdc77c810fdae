use anyhow::Result;
use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use headroom_lib::Service;
use log::{error, info, warn};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Debug, Deserialize)]
struct SitesParams {
    /// Free-text query, empty when absent
    #[serde(default)]
    search: String,
}

/// Routes of the HTTP API
pub(crate) fn router(service: Service) -> Router {
    Router::new()
        .route("/sites", get(sites))
        .with_state(service)
}

/// `GET /sites?search=<text>`
///
/// Answers with a JSON object mapping every URL found for the query to its
/// capacity, or `500` with the error message as plain text.
async fn sites(State(service): State<Service>, Query(params): Query<SitesParams>) -> Response {
    match service.execute(&params.search).await {
        Ok(capacities) => match serde_json::to_vec(&capacities) {
            Ok(body) => ([(header::CONTENT_TYPE, JSON_UTF8)], body).into_response(),
            Err(e) => internal_error(&e),
        },
        Err(e) => {
            warn!("Query {:?} failed: {e}", params.search);
            internal_error(&e)
        }
    }
}

fn internal_error(e: &dyn std::error::Error) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// Serve the API on `listener` until a shutdown signal arrives.
///
/// Shutdown fires `cancel`, which aborts pending queries and makes the
/// probers still running in the background wind down.
pub(crate) async fn serve(
    listener: TcpListener,
    service: Service,
    cancel: CancellationToken,
) -> Result<()> {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        trigger.cancel();
    });

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received terminate signal"),
    }
}
