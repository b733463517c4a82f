use base64::{engine::general_purpose, Engine as _};
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use wechat_article_cli::cover::CoverCreator;
use wechat_article_cli::error::Error;
use wechat_article_cli::imagegen::{ImageGenClient, ModelAttempt};
use wechat_article_cli::overlay::TextOverlay;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn attempts() -> Vec<ModelAttempt> {
    vec![
        ModelAttempt::new("primary-model", Duration::from_secs(5)),
        ModelAttempt::new("fallback-model", Duration::from_secs(5)),
    ]
}

fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    RgbaImage::from_pixel(256, 128, Rgba([10, 120, 200, 255]))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn image_reply(bytes: &[u8]) -> ResponseTemplate {
    let encoded = general_purpose::STANDARD.encode(bytes);
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": {"content": format!("![cover](data:image/png;base64,{})", encoded)}
        }]
    }))
}

async fn mount_model(server: &MockServer, model: &str, reply: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": model, "max_tokens": 4096})))
        .respond_with(reply)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn both_models_failing_aggregates_errors() {
    let server = MockServer::start().await;
    mount_model(
        &server,
        "primary-model",
        ResponseTemplate::new(500).set_body_string("upstream down"),
    )
    .await;
    mount_model(
        &server,
        "fallback-model",
        ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "overloaded"}})),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out/result.png");
    let base_url = format!("{}/v1", server.uri());
    let target = output.clone();

    let result = tokio::task::spawn_blocking(move || {
        let client = ImageGenClient::new(base_url, "sk-test", attempts()).unwrap();
        client.text_to_image("a lighthouse", &target)
    })
    .await
    .unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, Error::AllModelsFailed(ref failures) if failures.len() == 2));
    let message = err.to_string();
    assert!(message.contains("primary-model"));
    assert!(message.contains("fallback-model"));
    assert_eq!(message.matches("500").count(), 2);
    assert!(message.contains("upstream down"));
    assert!(message.contains("overloaded"));
    assert!(!output.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn fallback_model_is_used_after_primary_fails() {
    let server = MockServer::start().await;
    mount_model(&server, "primary-model", ResponseTemplate::new(503)).await;
    mount_model(&server, "fallback-model", image_reply(b"fake-image-bytes")).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested/dir/result.png");
    let base_url = format!("{}/v1", server.uri());
    let target = output.clone();

    let written = tokio::task::spawn_blocking(move || {
        let client = ImageGenClient::new(base_url, "sk-test", attempts()).unwrap();
        client.text_to_image("a lighthouse", &target)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(written, output);
    assert_eq!(std::fs::read(&output).unwrap(), b"fake-image-bytes");
}

#[tokio::test(flavor = "multi_thread")]
async fn response_without_image_counts_as_failure() {
    let server = MockServer::start().await;
    mount_model(
        &server,
        "primary-model",
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "sorry, text only"}}]
        })),
    )
    .await;
    mount_model(
        &server,
        "fallback-model",
        ResponseTemplate::new(200).set_body_json(json!({"choices": []})),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("result.png");
    let base_url = format!("{}/v1", server.uri());
    let target = output.clone();

    let err = tokio::task::spawn_blocking(move || {
        let client = ImageGenClient::new(base_url, "sk-test", attempts()).unwrap();
        client.text_to_image("a lighthouse", &target)
    })
    .await
    .unwrap()
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("no image found"));
    assert!(message.contains("unexpected response format"));
    assert!(!output.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn reference_images_are_sent_as_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "restyle"},
                    {"type": "image_url", "image_url": {"url": "data:image/webp;base64,cmVm"}}
                ]
            }]
        })))
        .respond_with(image_reply(b"styled"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("ref.webp");
    std::fs::write(&reference, b"ref").unwrap();
    let output = dir.path().join("styled.png");
    let base_url = format!("{}/v1", server.uri());
    let target = output.clone();

    tokio::task::spawn_blocking(move || {
        let client = ImageGenClient::new(base_url, "sk-test", attempts()).unwrap();
        client.image_to_image("restyle", &[reference], &target)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"styled");
}

#[tokio::test(flavor = "multi_thread")]
async fn cover_pipeline_generates_and_overlays_title() {
    let server = MockServer::start().await;
    mount_model(&server, "primary-model", image_reply(&png_bytes())).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cover_design.md"), "  a calm blue cover  \n").unwrap();
    std::fs::write(dir.path().join("artical.md"), "【文章标题】# Rust Notes\nbody\n").unwrap();
    let root = dir.path().to_path_buf();
    let base_url = format!("{}/v1", server.uri());

    let cover = tokio::task::spawn_blocking(move || {
        let client = ImageGenClient::new(base_url, "sk-test", attempts()).unwrap();
        let creator = CoverCreator::new(client, TextOverlay::with_candidates(Vec::new()));
        creator.create(root, None)
    })
    .await
    .unwrap()
    .unwrap();

    assert!(cover.ends_with("assets/cover.png"));
    let image = image::open(&cover).unwrap();
    assert_eq!(image.color(), image::ColorType::Rgb8);
    // the band darkens the lower part of the image
    let top = image.to_rgb8().get_pixel(0, 0).0;
    let bottom = image.to_rgb8().get_pixel(0, 100).0;
    assert_eq!(top, [10, 120, 200]);
    assert!(bottom[2] < top[2]);
}

#[test]
fn cover_pipeline_rejects_missing_inputs() {
    let client = ImageGenClient::new("http://127.0.0.1:9/v1", "sk-test", attempts()).unwrap();
    let creator = CoverCreator::new(client, TextOverlay::with_candidates(Vec::new()));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = creator.create(missing, None).unwrap_err();
    assert!(err.to_string().contains("directory does not exist"));

    let err = creator.create(dir.path().to_path_buf(), None).unwrap_err();
    assert!(err.to_string().contains("cover_design.md not found"));

    std::fs::write(dir.path().join("cover_design.md"), "   \n").unwrap();
    let err = creator.create(PathBuf::from(dir.path()), None).unwrap_err();
    assert!(err.to_string().contains("cover_design.md is empty"));
    assert!(!dir.path().join("assets/cover.png").exists());
}
