//! `POST /check-receipts` over axum.

use crate::error::{ReceiptSearchError, Result};
use crate::schema::SearchRequest;
use crate::search::ReceiptSearch;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info, warn};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

const INTERNAL_ERROR_MESSAGE: &str = "Error al procesar la solicitud";

/// Builds the router. Without `cors_origin` any origin is allowed.
pub fn create_router(search: ReceiptSearch, cors_origin: Option<&str>) -> Result<Router> {
    let origin = match cors_origin {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin).map_err(|_| {
            ReceiptSearchError::InvalidConfig(format!("invalid CORS origin '{}'", origin))
        })?),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/check-receipts", post(check_receipts))
        .with_state(search)
        .layer(cors))
}

pub async fn serve(search: ReceiptSearch, port: u16, cors_origin: Option<&str>) -> Result<()> {
    let app = create_router(search, cors_origin)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Receipt server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        })
        .await?;
    Ok(())
}

async fn check_receipts(
    State(search): State<ReceiptSearch>,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "Missing required parameters");
        }
    };

    match search.handle(&request).await {
        Ok(records) => Json(records).into_response(),
        Err(err) if err.is_validation() => {
            warn!("Invalid search request: {}", err);
            error_response(StatusCode::BAD_REQUEST, &validation_message(&err))
        }
        Err(err) => {
            error!("Receipt search failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}

fn validation_message(err: &ReceiptSearchError) -> String {
    match err {
        ReceiptSearchError::InvalidDate(_) => "Invalid date format".to_string(),
        other => other.to_string(),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
