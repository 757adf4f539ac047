//! Gemini REST adapter against a local mock server.

use course_extract::pipeline::model::GeminiModel;
use course_extract::{
    ExtractionConfig, Extractor, Field, ImageError, ImageSource, ModelInvocationError, Session,
    VisionModel,
};
use edgequake_llm::ImageData;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("course_extract=debug")
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer) -> ExtractionConfig {
    ExtractionConfig::builder()
        .gemini_base_url(server.uri())
        .pace_ms(0)
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

fn model(server: &MockServer) -> GeminiModel {
    let session = Arc::new(Session::new("secret-key").unwrap());
    GeminiModel::new(session, &config(server)).unwrap()
}

fn image() -> ImageData {
    ImageData::new("aGVsbG8=", "image/png")
}

fn candidate(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 812, "candidatesTokenCount": 64 }
    })
}

#[tokio::test]
async fn test_request_carries_key_prompt_and_image() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = model(&server).generate("read the flyer", &image()).await.unwrap();
    assert_eq!(reply.text, "{}");
    assert_eq!(reply.input_tokens, 812);
    assert_eq!(reply.output_tokens, 64);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "read the flyer");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["inlineData"]["data"], "aGVsbG8=");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
}

#[tokio::test]
async fn test_multi_part_text_is_joined() {
    let server = MockServer::start().await;
    let body = json!({
        "candidates": [{ "content": { "parts": [{ "text": "{\"Course " }, { "text": "name\": \"X\"}" }] } }]
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let reply = model(&server).generate("p", &image()).await.unwrap();
    assert_eq!(reply.text, "{\"Course name\": \"X\"}");
    assert_eq!(reply.input_tokens, 0);
}

#[tokio::test]
async fn test_empty_candidate_is_returned_as_empty_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .mount(&server)
        .await;

    let reply = model(&server).generate("p", &image()).await.unwrap();
    assert_eq!(reply.text, "");
}

#[tokio::test]
async fn test_whitespace_reply_becomes_unparseable_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("  \n ")))
        .mount(&server)
        .await;

    let session = Arc::new(Session::new("secret-key").unwrap());
    let extractor = Extractor::new(session, config(&server)).unwrap();
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(4, 4)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let outcome = extractor
        .extract(&ImageSource::from_bytes("quiet.png", png))
        .await;
    assert!(outcome.record.fields.is_empty());
    assert!(
        matches!(outcome.error, Some(ImageError::Unparseable { .. })),
        "{:?}",
        outcome.error
    );
}

#[tokio::test]
async fn test_invalid_key_maps_to_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = model(&server).generate("p", &image()).await.unwrap_err();
    assert!(matches!(err, ModelInvocationError::Auth { .. }), "{err:?}");
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let err = model(&server).generate("p", &image()).await.unwrap_err();
    assert_eq!(
        err,
        ModelInvocationError::RateLimited {
            retry_after_secs: Some(17)
        }
    );
}

#[tokio::test]
async fn test_server_error_maps_to_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = model(&server).generate("p", &image()).await.unwrap_err();
    assert_eq!(
        err,
        ModelInvocationError::Api {
            status: 503,
            detail: "overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn test_unknown_model_maps_to_invalid_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "models/nope is not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    let err = model(&server).generate("p", &image()).await.unwrap_err();
    assert_eq!(
        err,
        ModelInvocationError::InvalidRequest {
            status: 404,
            detail: "models/nope is not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_extractor_end_to_end_over_http() {
    init_logging();
    let server = MockServer::start().await;
    let reply = "```json\n{\"Course name\": \"Weekend Pottery\", \"Class day\": \"Saturday\", \"Fee type\": \"Free\"}\n```";
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(Session::new("secret-key").unwrap());
    let extractor = Extractor::new(session, config(&server)).unwrap();

    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let source = ImageSource::from_bytes("pottery.png", png);

    let first = extractor.extract(&source).await;
    assert_eq!(first.record.get(Field::CourseName), Some("Weekend Pottery"));
    assert_eq!(first.record.get(Field::ClassDay), Some("Saturday"));
    assert_eq!(first.record.get(Field::CourseFee), None);

    // Same bytes again: served from the session cache, so `expect(1)` holds.
    let second = extractor.extract(&source).await;
    assert!(second.from_cache);
}

#[tokio::test]
async fn test_extractor_absorbs_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let session = Arc::new(Session::new("wrong").unwrap());
    let extractor = Extractor::new(session, config(&server)).unwrap();
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(4, 4)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let outcome = extractor
        .extract(&ImageSource::from_bytes("flyer.png", png))
        .await;
    assert!(outcome.record.fields.is_empty());
    assert!(matches!(outcome.error, Some(ImageError::ModelFailed { .. })));
}
