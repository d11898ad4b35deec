//! Integration tests for the analysis HTTP server

#[cfg(feature = "server")]
mod common;

#[cfg(feature = "server")]
mod server_tests {
    use super::common::{single_shot, Clip};
    use formcheck_segmenter::config::EngineConfig;
    use formcheck_segmenter::feedback::FeedbackConfig;
    use formcheck_segmenter::server::{run, ServerConfig};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>) {
        // Port 0 picks a free port; no feedback service configured.
        let config = ServerConfig::new(0, EngineConfig::default(), None);
        let started = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        started
    }

    /// Stand-in coaching service that calls every shot a make.
    async fn start_coach() -> SocketAddr {
        async fn verdict() -> axum::Json<serde_json::Value> {
            axum::Json(serde_json::json!({
                "made": true,
                "form_rating": 7,
                "feedback": "Smooth release.",
                "quick_cue": "Same again"
            }))
        }

        let app = axum::Router::new().route("/v1/analyze", axum::routing::post(verdict));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind coach");
        let addr = listener.local_addr().expect("coach address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    async fn post_analyze(
        addr: SocketAddr,
        body: serde_json::Value,
    ) -> (reqwest::StatusCode, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{}/analyze", addr))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status();
        let body = response.json().await.expect("Failed to parse JSON");
        (status, body)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start().await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
        assert_eq!(body["feedback_configured"], false);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_detects_shot() {
        let (addr, shutdown_tx) = start().await;

        let frames = single_shot(60, 80.0).into_frames();
        let (status, body) = post_analyze(
            addr,
            serde_json::json!({ "session_id": "TEST-1", "frames": frames }),
        )
        .await;

        assert!(status.is_success(), "Unexpected status: {status} - body: {body:?}");
        assert_eq!(body["frames_processed"], 95);

        let shots = body["shots"].as_array().expect("shots array");
        assert_eq!(shots.len(), 1);
        let report = &shots[0]["report"];
        assert_eq!(report["shot_number"], 1);
        assert_eq!(report["session_id"], "TEST-1");
        assert_eq!(report["key_frames"].as_array().map(Vec::len), Some(8));
        assert_eq!(report["metrics"]["duration_frames"], 15);
        assert!(shots[0].get("feedback").is_none());

        assert_eq!(body["summary"]["shots"], 1);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_without_shots() {
        let (addr, shutdown_tx) = start().await;

        let frames = Clip::new().hold(40, 170.0).into_frames();
        let (status, body) = post_analyze(addr, serde_json::json!({ "frames": frames })).await;

        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_SHOTS_DETECTED");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_requests() {
        let (addr, shutdown_tx) = start().await;

        let (status, body) = post_analyze(addr, serde_json::json!({ "frames": [] })).await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_FRAMES");

        let engine = EngineConfig {
            buffer_capacity: 0,
            ..EngineConfig::default()
        };
        let frames = Clip::new().hold(5, 170.0).into_frames();
        let (status, body) = post_analyze(
            addr,
            serde_json::json!({ "engine": engine, "frames": frames }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CONFIG");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start().await;

        // Send OPTIONS request to check CORS
        let response = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("http://{}/analyze", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_tallies_feedback() {
        let coach = start_coach().await;
        let feedback = FeedbackConfig::new(format!("http://{coach}"), None);
        let config = ServerConfig::new(0, EngineConfig::default(), Some(feedback));
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frames = single_shot(60, 80.0).into_frames();
        let (status, body) = post_analyze(addr, serde_json::json!({ "frames": frames })).await;
        assert!(status.is_success(), "Unexpected status: {status} - body: {body:?}");

        assert_eq!(body["shots"][0]["feedback"]["form_rating"], 7);

        let tally = &body["summary"]["feedback"];
        assert_eq!(tally["responses"], 1);
        assert_eq!(tally["made"], 1);
        assert_eq!(tally["missed"], 0);
        assert_eq!(tally["shooting_percentage"], 100.0);
        assert_eq!(tally["average_form_rating"], 7.0);
        assert_eq!(tally["quick_cues"], serde_json::json!(["Same again"]));
        assert_eq!(tally["makes"]["shots"], 1);
        assert!(tally["misses"].is_null());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_summary_has_no_tally_without_feedback_service() {
        let (addr, shutdown_tx) = start().await;

        let frames = single_shot(60, 80.0).into_frames();
        let (_, body) = post_analyze(addr, serde_json::json!({ "frames": frames })).await;
        assert!(body["summary"].get("feedback").is_none());

        let _ = shutdown_tx.send(());
    }
}
