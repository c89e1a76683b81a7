mod fixture;

use fixture::{encode_base64, wav_clip, Fixture};
use serde_json::json;
use tempfile::TempDir;

fn upload_args(id: &str, seconds: f32, text: &str) -> serde_json::Value {
    json!({
        "reference_id": id,
        "audio_base64": encode_base64(&wav_clip(seconds)),
        "text": text
    })
}

#[tokio::test]
async fn test_list_is_empty_at_start() {
    let fixture = Fixture::new();
    let body = fixture.call_ok("list_references", json!(null)).await;
    assert_eq!(body, json!({"references": []}));
}

#[tokio::test]
async fn test_uploads_are_listed_in_order_and_replaced_in_place() {
    let fixture = Fixture::new();
    fixture
        .call_ok("upload_reference_audio", upload_args("alice", 12.0, "First take."))
        .await;
    fixture
        .call_ok("upload_reference_audio", upload_args("bob", 15.0, "Bob speaking."))
        .await;

    let replaced = fixture
        .call_ok("upload_reference_audio", upload_args("alice", 11.0, "Second take."))
        .await;
    assert_eq!(replaced["status"], "replaced");

    let body = fixture.call_ok("list_references", json!({})).await;
    let references = body["references"].as_array().unwrap();
    assert_eq!(references.len(), 2);
    assert_eq!(references[0]["reference_id"], "alice");
    assert_eq!(references[0]["transcription"], "Second take.");
    assert_eq!(references[1]["reference_id"], "bob");

    let created_at = references[0]["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
}

#[tokio::test]
async fn test_upload_failures() {
    let fixture = Fixture::new();

    let (kind, _) = fixture
        .call_err(
            "upload_reference_audio",
            json!({"reference_id": "alice", "audio_base64": "%%%", "text": "Hi"}),
        )
        .await;
    assert_eq!(kind, "InvalidAudio");

    let (kind, _) = fixture
        .call_err(
            "upload_reference_audio",
            json!({
                "reference_id": "alice",
                "audio_base64": encode_base64(b"plain text, not audio"),
                "text": "Hi"
            }),
        )
        .await;
    assert_eq!(kind, "InvalidAudio");

    let (kind, _) = fixture
        .call_err("upload_reference_audio", upload_args("", 12.0, "Hi"))
        .await;
    assert_eq!(kind, "InvalidArgument");

    let (kind, message) = fixture
        .call_err("upload_reference_audio", json!({"reference_id": "alice"}))
        .await;
    assert_eq!(kind, "InvalidArgument");
    assert!(message.contains("missing field"));

    assert!(fixture.references.is_empty());
}

#[tokio::test]
async fn test_persisted_references_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let fixture = Fixture::persisted(dir.path());
        fixture
            .call_ok("upload_reference_audio", upload_args("narrator", 12.0, "Once upon a time."))
            .await;
    }

    let fixture = Fixture::persisted(dir.path());
    let body = fixture.call_ok("list_references", json!({})).await;
    assert_eq!(body["references"][0]["reference_id"], "narrator");

    fixture
        .call_ok(
            "synthesize_speech",
            json!({"text": "The end.", "reference_id": "narrator"}),
        )
        .await;
    let captured = fixture.model.captured_requests();
    assert_eq!(
        captured[0].reference.as_ref().unwrap().transcription,
        "Once upon a time."
    );
}

#[tokio::test]
async fn test_unknown_tool_is_a_dispatch_error() {
    let fixture = Fixture::new();
    let err = fixture
        .tools
        .dispatch("delete_reference", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("list_references"));
}
