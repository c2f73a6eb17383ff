use crate::handlers::{health, price};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/prices", post(price::ingest_default))
        .route("/prices/{symbol}", post(price::ingest_for_symbol))
        .route("/stats", get(health::stats));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use stream_engine::{ChannelCapacity, EngineMetrics, EventReceiver, event_channel};
    use tower::ServiceExt;
    use types::ids::Symbol;

    fn test_app() -> (Router, EventReceiver) {
        let (sender, receiver) = event_channel(ChannelCapacity::Unbounded).unwrap();
        let state = AppState::new(sender, Arc::new(EngineMetrics::new()), Symbol::new("GOOG"));
        (create_router(state), receiver)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_price_with_default_symbol_accepted() {
        let (app, mut events) = test_app();

        let response = app.oneshot(post("/v1/prices", "1234.5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = json_body(response).await;
        assert_eq!(body["symbol"], "GOOG");
        assert_eq!(body["price"], 1234.5);

        let event = events.recv().await.unwrap();
        assert_eq!(event.symbol().as_str(), "GOOG");
        assert_eq!(event.price(), 1234.5);
        assert_eq!(body["event_id"], event.event_id().to_string());
    }

    #[tokio::test]
    async fn test_price_with_path_symbol_accepted() {
        let (app, mut events) = test_app();

        let response = app.oneshot(post("/v1/prices/AAPL", "1500\n")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = events.recv().await.unwrap();
        assert_eq!(event.symbol().as_str(), "AAPL");
        assert_eq!(event.price(), 1500.0);
    }

    #[tokio::test]
    async fn test_non_qualifying_price_still_accepted() {
        // Filtering is the engine's job, not the gateway's
        let (app, mut events) = test_app();

        let response = app.oneshot(post("/v1/prices", "-20")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(events.recv().await.unwrap().price(), -20.0);
    }

    #[tokio::test]
    async fn test_malformed_price_rejected() {
        for body in ["abc", "", "12,5", "inf", "NaN"] {
            let (app, events) = test_app();

            let response = app.oneshot(post("/v1/prices", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");

            let json = json_body(response).await;
            assert_eq!(json["error"], "BAD_REQUEST");
            assert!(events.is_empty(), "rejected update must not be enqueued");
        }
    }

    #[tokio::test]
    async fn test_non_utf8_body_rejected_as_json() {
        let (app, events) = test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/v1/prices")
            .body(Body::from(vec![0xff, 0xfe, 0x31]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["error"], "BAD_REQUEST");
        assert!(json["message"].is_string());
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_non_utf8_path_symbol_rejected_as_json() {
        let (app, events) = test_app();

        let response = app.oneshot(post("/v1/prices/%FF", "1500")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "BAD_REQUEST");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_blank_symbol_rejected() {
        let (app, events) = test_app();

        let response = app.oneshot(post("/v1/prices/%20", "1500")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_closed_engine_returns_unavailable() {
        let (app, events) = test_app();
        drop(events);

        let response = app.oneshot(post("/v1/prices", "1500")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (app, _events) = test_app();

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");

        let response = app
            .oneshot(Request::get("/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = json_body(response).await;
        assert_eq!(stats["events_received"], 0);
        assert_eq!(stats["windows_closed"], 0);
    }
}
