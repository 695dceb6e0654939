//! HTTP control surface around a [`JobManager`].

pub mod routes;

use crate::job::JobManager;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use routes::{
    categories_handler, children_handler, download_handler, pause_handler, resume_handler,
    start_handler, status_handler, stop_handler, AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Build the router.
pub fn router(manager: Arc<JobManager>) -> Router {
    Router::new()
        .route("/categories", get(categories_handler))
        .route("/children", get(children_handler))
        .route("/start", post(start_handler))
        .route("/pause", post(pause_handler))
        .route("/resume", post(resume_handler))
        .route("/stop", post(stop_handler))
        .route("/status", get(status_handler))
        .route("/download", get(download_handler))
        .layer(CorsLayer::permissive())
        .with_state(AppState { manager })
}

/// Serve until the process receives Ctrl-C. A running job is stopped first.
pub async fn serve(addr: SocketAddr, manager: Arc<JobManager>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("control server listening on http://{addr}");

    let shutdown_manager = Arc::clone(&manager);
    axum::serve(listener, router(manager))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown_manager.stop().await;
            shutdown_manager.join().await;
        })
        .await
        .context("control server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::resolver::tests::{index_xml, StaticSource};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let source = StaticSource::default().with(
            "https://x/rent.xml.gz",
            index_xml(&["https://x/rent-1.xml.gz", "https://x/rent-2.xml.gz"]),
        );
        router(Arc::new(JobManager::new(Arc::new(source))))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_categories_lists_catalog() {
        let response = app()
            .oneshot(Request::get("/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 11);
        assert_eq!(json[0]["label"], "for-sale-by-agent");
    }

    #[tokio::test]
    async fn test_children_resolves_parent() {
        let response = app()
            .oneshot(
                Request::get("/children?url=https://x/rent.xml.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["children"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_before_start_is_not_found() {
        let response = app()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let response = app()
            .oneshot(
                Request::post("/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"outputDir": "/tmp", "categories": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("no categories"));
    }

    #[tokio::test]
    async fn test_download_rejects_unknown_files() {
        let response = app()
            .oneshot(
                Request::get("/download?file=../../etc/passwd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
