//! Coach client against a throwaway axum backend on 127.0.0.1:0.

use axum::Router;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::json;

use studycast_core::artifacts::ArtifactError;
use studycast_core::config::BackendConfig;
use studycast_lib::coach::{Attachment, CoachClient, CoachError};

async fn serve(app: Router) -> CoachClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    CoachClient::new(&BackendConfig {
        url: format!("http://{addr}"),
        timeout_secs: 5,
    })
}

fn resume() -> Attachment {
    Attachment::new("cv.txt", "text/plain", b"Rust engineer, 5 years".to_vec())
}

fn job() -> Attachment {
    Attachment::new("job.txt", "text/plain", b"Senior platform engineer".to_vec())
}

fn analysis_body() -> serde_json::Value {
    json!({
        "verdict": "APTO",
        "verdictExplanation": "Good fit.",
        "vacancyAnalysis": "Platform team.",
        "candidateAnalysis": "Strong Rust.",
        "comparisonMatrix": [],
        "studyPath": [{
            "weekNumber": 1,
            "title": "Observability",
            "theory": "Tracing basics.",
            "podcastScript": "Host A: Hola. Host B: Empezamos.",
            "podcastSummary": "Tracing."
        }]
    })
}

/// Echoes back the multipart field names it received inside the verdict.
async fn analysis_echo(mut multipart: Multipart) -> axum::Json<serde_json::Value> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        fields.push(field.name().unwrap_or_default().to_string());
    }
    let mut body = analysis_body();
    body["verdict"] = json!(fields.join(","));
    axum::Json(body)
}

#[tokio::test]
async fn analysis_uploads_both_documents() {
    let client = serve(Router::new().route("/api/analysis", post(analysis_echo))).await;

    let result = client.analysis(&resume(), &job()).await.unwrap();
    assert_eq!(result.verdict, "resume,job");
    assert_eq!(result.study_path[0].title, "Observability");
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let app = Router::new().route(
        "/api/senior-feedback",
        post(|| async { (StatusCode::BAD_GATEWAY, "model overloaded") }),
    );
    let client = serve(app).await;

    let err = client.senior_feedback(&resume()).await.unwrap_err();
    match err {
        CoachError::Status {
            endpoint,
            status,
            body,
        } => {
            assert_eq!(endpoint, "/api/senior-feedback");
            assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_mismatch_is_distinguishable() {
    let app = Router::new().route(
        "/api/job-translation",
        post(|| async { axum::Json(json!({ "honestVersion": "only this" })) }),
    );
    let client = serve(app).await;

    let err = client.job_translation(&job()).await.unwrap_err();
    assert!(matches!(
        err,
        CoachError::Artifact(ArtifactError::SchemaMismatch { .. })
    ));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let app = Router::new().route(
        "/api/interview-simulator",
        post(|| async { "<html>oops</html>" }),
    );
    let client = serve(app).await;

    let err = client.interview_simulation(&resume(), &job()).await.unwrap_err();
    assert!(matches!(err, CoachError::Artifact(ArtifactError::Malformed { .. })));
}

#[tokio::test]
async fn market_trends_sends_user_profile() {
    let app = Router::new().route(
        "/api/market-trends",
        post(|axum::Json(req): axum::Json<serde_json::Value>| async move {
            let role = req["userProfile"]["role"].as_str().unwrap_or("none").to_string();
            axum::Json(json!({
                "growingTech": [role],
                "decliningTech": [],
                "marketGaps": [],
                "emergingRoles": [],
                "recommendations": []
            }))
        }),
    );
    let client = serve(app).await;

    let trends = client
        .market_trends(&json!({ "role": "SRE" }))
        .await
        .unwrap();
    assert_eq!(trends.growing_tech, vec!["SRE"]);
}

#[tokio::test]
async fn unreachable_backend_is_http_error() {
    let client = CoachClient::new(&BackendConfig {
        url: "http://127.0.0.1:1".into(),
        timeout_secs: 2,
    });
    let err = client.job_translation(&job()).await.unwrap_err();
    assert!(matches!(err, CoachError::Http { .. }));
}

#[tokio::test]
async fn red_flags_uploads_job_only() {
    let app = Router::new().route(
        "/api/red-flags",
        post(|mut multipart: Multipart| async move {
            let mut fields = Vec::new();
            while let Some(field) = multipart.next_field().await.unwrap() {
                fields.push(field.name().unwrap_or_default().to_string());
            }
            axum::Json(json!({
                "redFlags": [{ "flag": fields.join(","), "explanation": "echo" }]
            }))
        }),
    );
    let client = serve(app).await;

    let flags = client.red_flags(&job()).await.unwrap();
    assert_eq!(flags.red_flags.len(), 1);
    assert_eq!(flags.red_flags[0].flag, "job");
}

#[tokio::test]
async fn chat_sends_context_and_message() {
    let app = Router::new().route(
        "/api/chat",
        post(|axum::Json(req): axum::Json<serde_json::Value>| async move {
            let week = req["context"]["studyPath"][0]["title"].as_str().unwrap_or("none");
            let message = req["message"].as_str().unwrap_or("none");
            axum::Json(json!({ "text": format!("{week}: {message}") }))
        }),
    );
    let client = serve(app).await;

    let context = serde_json::from_value(analysis_body()).unwrap();
    let reply = client.chat(&context, "¿Qué es un span?").await.unwrap();
    assert_eq!(reply.text.as_deref(), Some("Observability: ¿Qué es un span?"));
}
