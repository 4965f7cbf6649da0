//! Analysis client against a local stand-in for the analysis service.

use std::time::Duration;

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use rhetor::analysis::AnalysisClient;
use rhetor::error::PipelineError;
use rhetor::recording::{encode_wav, AudioArtifact, AudioFormat};

/// Serves `router` on an ephemeral port and returns the upload URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/analyze")
}

fn client(endpoint: &str) -> AnalysisClient {
    AnalysisClient::new(endpoint, Duration::from_secs(5)).unwrap()
}

fn recording() -> AudioArtifact {
    let tone: Vec<i16> = (0..1600).map(|n| ((n % 40) as i16 - 20) * 500).collect();
    AudioArtifact::new(
        encode_wav(&tone, 16000).unwrap(),
        AudioFormat::Wav,
        Some(Duration::from_millis(100)),
    )
}

/// Answers with a score card describing what was uploaded.
async fn describe_upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        return (
            StatusCode::OK,
            Json(json!({
                "score": 82,
                "analysis": format!("{mime} {}", bytes.len()),
                "tips": ["Slow down", "Pause after key points"],
                "filename": name,
            })),
        );
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "detail": "missing file field" })),
    )
}

#[tokio::test]
async fn test_submit_returns_score_card() {
    let endpoint = serve(Router::new().route("/analyze", post(describe_upload))).await;
    let artifact = recording();

    let result = client(&endpoint).submit(&artifact).await.unwrap();
    assert_eq!(result.score, 82);
    assert_eq!(result.narrative, format!("audio/wav {}", artifact.len()));
    assert_eq!(result.tips.len(), 2);
    assert_eq!(result.filename, Some(artifact.upload_name()));
    assert!(!result.has_sections());

    // The artifact is untouched and can be submitted again
    assert_eq!(AudioFormat::detect(artifact.payload()), Some(AudioFormat::Wav));
    let again = client(&endpoint).submit(&artifact).await.unwrap();
    assert_eq!(again, result);
}

#[tokio::test]
async fn test_sectioned_score_card() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            Json(json!({
                "score": 67.6,
                "sections": [
                    { "title": "Pace", "score": 70, "items": ["A little fast"] },
                    { "title": "Clarity", "items": [] },
                    { "title": "Energy", "score": 70.5, "items": ["Lift the ending"] }
                ]
            }))
        }),
    );
    let endpoint = serve(router).await;

    let result = client(&endpoint).submit(&recording()).await.unwrap();
    assert_eq!(result.score, 68);
    assert!(result.has_sections());
    assert_eq!(result.sections[0].score, Some(70));
    assert_eq!(result.sections[1].score, None);
    assert_eq!(result.sections[2].score, Some(71));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "file too large") }),
    );
    let endpoint = serve(router).await;

    let err = client(&endpoint).submit(&recording()).await.unwrap_err();
    assert_eq!(
        err,
        PipelineError::Rejected {
            status: 413,
            detail: "file too large".to_string(),
        }
    );
    assert_eq!(err.user_message(), "File size too large");
}

#[tokio::test]
async fn test_server_error_is_rejected() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let endpoint = serve(router).await;

    let err = client(&endpoint).submit(&recording()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn test_malformed_bodies() {
    for body in [
        json!({ "analysis": "Nice", "tips": [] }),
        json!({ "score": 140, "analysis": "Nice", "tips": [] }),
        json!({ "score": 50 }),
        json!({ "score": 50, "analysis": "", "tips": ["x"] }),
    ] {
        let router = Router::new().route(
            "/analyze",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let endpoint = serve(router).await;
        let err = client(&endpoint).submit(&recording()).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse(_)),
            "unexpected {err:?}"
        );
    }

    let router = Router::new().route("/analyze", post(|| async { "<html>oops</html>" }));
    let endpoint = serve(router).await;
    let err = client(&endpoint).submit(&recording()).await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_service() {
    // Bind and drop a listener to find a port nothing is serving on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}/analyze"));
    let err = client.submit(&recording()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Unreachable(_)));
    assert!(!client.is_busy());
}

#[tokio::test]
async fn test_concurrent_submission_is_refused() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Json(json!({ "score": 90, "analysis": "Steady", "tips": [] }))
        }),
    );
    let endpoint = serve(router).await;
    let client = client(&endpoint);
    let artifact = recording();

    let first = {
        let client = client.clone();
        let artifact = artifact.clone();
        tokio::spawn(async move { client.submit(&artifact).await })
    };
    while !client.is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(
        client.submit(&artifact).await,
        Err(PipelineError::SubmissionInFlight)
    );
    assert_eq!(first.await.unwrap().unwrap().score, 90);
    assert!(!client.is_busy());
}
