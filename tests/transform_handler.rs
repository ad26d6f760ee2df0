//! Tests for the structured uppercase transform handler.

use palisade::test_support::FakeObjectStore;
use palisade::{TransformRequest, handle_transform};

fn transform_request(key: &str) -> TransformRequest {
    TransformRequest {
        bucket: String::from("input-bucket"),
        key: key.to_owned(),
        output_bucket: String::from("output-bucket"),
    }
}

#[tokio::test]
async fn handler_uppercases_and_stores_the_result() {
    let store = FakeObjectStore::new();
    store.insert_text("input-bucket", "uploads/test.txt", "Hello S3!");

    let response = handle_transform(&store, &transform_request("uploads/test.txt")).await;

    assert!(response.is_success(), "response: {response:?}");
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.output_key.as_deref(),
        Some("uploads/test_uppercased.txt")
    );
    assert_eq!(
        store.text("output-bucket", "uploads/test_uppercased.txt"),
        Some(String::from("HELLO S3!"))
    );
}

#[tokio::test]
async fn missing_source_object_reports_not_found() {
    let store = FakeObjectStore::new();

    let response = handle_transform(&store, &transform_request("uploads/absent.txt")).await;

    assert!(!response.is_success());
    assert_eq!(response.status_code, 404);
    assert!(response.output_key.is_none());
    assert!(
        response.message.contains("uploads/absent.txt"),
        "message: {}",
        response.message
    );
}

#[tokio::test]
async fn handler_leaves_the_source_object_untouched() {
    let store = FakeObjectStore::new();
    store.insert_text("input-bucket", "notes.txt", "mixed Case");

    handle_transform(&store, &transform_request("notes.txt")).await;

    assert_eq!(
        store.text("input-bucket", "notes.txt"),
        Some(String::from("mixed Case"))
    );
}
