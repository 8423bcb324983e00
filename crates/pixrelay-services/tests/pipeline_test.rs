//! End-to-end request handling with in-memory collaborators.
//!
//! Run with `cargo test -p pixrelay-services --test pipeline_test`.

mod helpers;

use helpers::{write_png, RecordingMessenger, ScriptedChat};
use pixrelay_core::models::{AssemblyOptions, ValidationPolicy, UPLOAD_IMAGE_TOOL};
use pixrelay_core::{AppError, ErrorMetadata};
use pixrelay_services::{ChatResponse, ImageChatService, MessagingService, ToolDispatcher};
use std::sync::Arc;
use tempfile::TempDir;

fn service(chat: Arc<ScriptedChat>, messenger: Option<Arc<RecordingMessenger>>) -> ImageChatService {
    let messaging = messenger.map(|m| m as Arc<dyn MessagingService>);
    ImageChatService::new(
        ValidationPolicy::default(),
        AssemblyOptions::default(),
        chat,
        ToolDispatcher::new(messaging),
    )
}

#[tokio::test]
async fn test_text_reply_with_labelled_payload() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(dir.path(), "first.png", 64, 32),
        write_png(dir.path(), "second.png", 32, 64),
    ];
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::Text(
        "Two green rectangles.".to_string(),
    )));

    let reply = service(chat.clone(), None)
        .ask("Describe these", &paths)
        .await
        .unwrap();

    assert_eq!(reply.reply.as_deref(), Some("Two green rectangles."));
    assert!(reply.tool_result.is_none());

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (payload, offered_tools) = &requests[0];
    assert!(!offered_tools);
    assert_eq!(payload.len(), 3);
    assert!(payload.text().contains(&format!("Image 1: {}", paths[0])));
    assert!(payload.text().contains(&format!("Image 2: {}", paths[1])));
    assert!(payload
        .image(2)
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_too_many_images_never_reaches_chat() {
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::Text("unused".to_string())));
    let paths: Vec<String> = (1..=6).map(|i| format!("/nonexistent/{}.png", i)).collect();

    let err = service(chat.clone(), None)
        .ask("hi", &paths)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TooManyImages { count: 6, max: 5 }));
    assert_eq!(err.client_message(), "Too many images. Maximum allowed is 5.");
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn test_empty_batch_never_reaches_chat() {
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::ToolCall {
        name: UPLOAD_IMAGE_TOOL.to_string(),
        arguments: r#"{"image_index": 1, "channel": "general"}"#.to_string(),
        content: None,
    }));
    let messenger = Arc::new(RecordingMessenger::default());

    let err = service(chat.clone(), Some(messenger.clone()))
        .ask("hi", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NoImages));
    assert_eq!(err.error_code(), "NO_IMAGES");
    assert_eq!(chat.call_count(), 0);
    assert!(messenger.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_image_never_reaches_chat() {
    let dir = TempDir::new().unwrap();
    let good = write_png(dir.path(), "ok.png", 8, 8);
    let missing = dir.path().join("gone.png").to_string_lossy().into_owned();
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::Text("unused".to_string())));

    let err = service(chat.clone(), None)
        .ask("hi", &[good, missing.clone()])
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "IMAGE_NOT_FOUND");
    assert!(err.client_message().contains(&missing));
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn test_tool_call_uploads_original_file() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(dir.path(), "small.png", 16, 16),
        write_png(dir.path(), "large.png", 1600, 900),
    ];
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::ToolCall {
        name: UPLOAD_IMAGE_TOOL.to_string(),
        arguments: r##"{"image_index": 2, "channel": "#general", "context": "For review"}"##
            .to_string(),
        content: Some("Posting the larger image.".to_string()),
    }));
    let messenger = Arc::new(RecordingMessenger::default());

    let reply = service(chat.clone(), Some(messenger.clone()))
        .ask("Post the big one", &paths)
        .await
        .unwrap();

    assert_eq!(reply.message(), "Uploaded image 2 to #general.");
    assert_eq!(reply.reply.as_deref(), Some("Posting the larger image."));
    assert!(chat.requests.lock().unwrap()[0].1, "upload tool should be offered");

    // The untouched original goes out, not the downscaled copy sent to the model
    let uploads = messenger.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "C000000001");
    assert_eq!(uploads[0].1, paths[1]);
    assert_eq!(uploads[0].2.as_deref(), Some("For review"));
}

#[tokio::test]
async fn test_invalid_tool_index_is_reply_not_error() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(dir.path(), "a.png", 8, 8),
        write_png(dir.path(), "b.png", 8, 8),
    ];
    let chat = Arc::new(ScriptedChat::replying(ChatResponse::ToolCall {
        name: UPLOAD_IMAGE_TOOL.to_string(),
        arguments: r#"{"image_index": 3, "channel": "general"}"#.to_string(),
        content: None,
    }));
    let messenger = Arc::new(RecordingMessenger::default());

    let reply = service(chat, Some(messenger.clone()))
        .ask("upload", &paths)
        .await
        .unwrap();

    assert!(reply.reply.is_none());
    let message = reply.tool_result.unwrap();
    assert!(message.contains("[1,2]"), "{}", message);
    assert!(messenger.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_failure_is_external_service_error() {
    let dir = TempDir::new().unwrap();
    let paths = vec![write_png(dir.path(), "a.png", 8, 8)];
    let chat = Arc::new(ScriptedChat::failing("connection refused"));

    let err = service(chat, None).ask("hi", &paths).await.unwrap_err();

    assert!(matches!(err, AppError::ExternalService(ref msg) if msg.contains("connection refused")));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_prepare_without_network() {
    let dir = TempDir::new().unwrap();
    let paths = vec![write_png(dir.path(), "wide.png", 2000, 500)];
    let chat = Arc::new(ScriptedChat::failing("must not be called"));

    let payload = tokio_test::assert_ok!(service(chat.clone(), None).prepare("", &paths).await);

    assert_eq!(payload.image_count(), 1);
    assert!(payload.text().starts_with("What's in this image?"));
    assert_eq!(chat.call_count(), 0);
}
