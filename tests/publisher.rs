use serde_json::{json, Value};
use std::path::Path;
use wechat_article_cli::error::{Error, Stage};
use wechat_article_cli::publisher::Publisher;
use wechat_article_cli::Config;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = "\
【文章标题】# Shipping Rust CLIs
【引言】
Short intro paragraph.
【封面主图】
【正文】
【标题1】
## Why Rust
Body with ![diagram](assets/diagram.png) inline.
Again ![diagram](assets/diagram.png) and ![gone](assets/gone.png).
Remote ![r](https://example.com/r.png) stays.
【标题2】
## Wrapping up
- first
- second
";

fn write_article(root: &Path, with_cover: bool) {
    let assets = root.join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(root.join("artical.md"), ARTICLE).unwrap();
    std::fs::write(assets.join("1.png"), b"section-one").unwrap();
    std::fs::write(assets.join("diagram.png"), b"diagram").unwrap();
    if with_cover {
        std::fs::write(assets.join("cover.png"), b"cover").unwrap();
    }
}

fn config_for(server: &MockServer) -> Config {
    Config {
        wechat_api_base_url: server.uri(),
        wechat_app_id: "wx-test".into(),
        wechat_app_secret: "secret".into(),
        wechat_author: "Tester".into(),
        ..Config::default()
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .and(query_param("grant_type", "client_credential"))
        .and(query_param("appid", "wx-test"))
        .and(query_param("secret", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "TOKEN",
            "expires_in": 7200
        })))
        .mount(server)
        .await;
}

async fn mount_cover(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/cgi-bin/material/add_material"))
        .and(query_param("access_token", "TOKEN"))
        .and(query_param("type", "image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "media_id": "THUMB-1",
            "url": "https://mmbiz.qpic.cn/cover.png"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_draft(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/cgi-bin/draft/add"))
        .and(query_param("access_token", "TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"media_id": "DRAFT-1"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn run_publisher(config: Config, root: &Path) -> Result<String, Error> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || Publisher::new(&config, root)?.run())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn publishes_draft_with_uploaded_images() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_cover(&server).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/uploadimg"))
        .and(query_param("access_token", "TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://mmbiz.qpic.cn/uploaded.png"
        })))
        .expect(2)
        .mount(&server)
        .await;
    mount_draft(&server).await;

    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), true);

    let media_id = run_publisher(config_for(&server), dir.path()).await.unwrap();
    assert_eq!(media_id, "DRAFT-1");

    let preview = std::fs::read_to_string(dir.path().join("preview.html")).unwrap();
    assert!(preview.starts_with("<!DOCTYPE html>"));
    assert!(preview.contains(r#"src="https://mmbiz.qpic.cn/uploaded.png""#));
    assert!(!preview.contains("assets/diagram.png"));
    assert!(preview.contains("assets/gone.png"));
    assert!(preview.contains("https://example.com/r.png"));
    assert!(preview.contains("Why Rust"));
    assert!(preview.contains("Wrapping up"));
    assert!(preview.contains("Tester · 2026 Edition"));

    let requests = server.received_requests().await.unwrap();
    let draft = requests
        .iter()
        .find(|r| r.url.path() == "/cgi-bin/draft/add")
        .unwrap();
    let body: Value = serde_json::from_slice(&draft.body).unwrap();
    let article = &body["articles"][0];
    assert_eq!(article["title"], "Shipping Rust CLIs");
    assert_eq!(article["author"], "Tester");
    assert_eq!(article["thumb_media_id"], "THUMB-1");
    assert_eq!(article["digest"], "");
    assert_eq!(article["need_open_comment"], 0);
    assert_eq!(article["only_fans_can_comment"], 0);
    assert!(article["content"].as_str().unwrap().contains("Short intro paragraph."));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_content_uploads_do_not_stop_publishing() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_cover(&server).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/uploadimg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 40005,
            "errmsg": "invalid file type"
        })))
        .mount(&server)
        .await;
    mount_draft(&server).await;

    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), true);

    let media_id = run_publisher(config_for(&server), dir.path()).await.unwrap();
    assert_eq!(media_id, "DRAFT-1");

    let preview = std::fs::read_to_string(dir.path().join("preview.html")).unwrap();
    assert!(preview.contains("assets/diagram.png"));
    assert!(!preview.contains("mmbiz.qpic.cn/uploaded.png"));
    assert!(preview.contains("Why Rust"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_draft_reports_raw_response() {
    const REJECTION: &str = r#"{"errcode":45009,"errmsg":"reach max api daily quota limit"}"#;

    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_cover(&server).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/uploadimg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://mmbiz.qpic.cn/uploaded.png"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/draft/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string(REJECTION))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), true);

    let err = run_publisher(config_for(&server), dir.path()).await.unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Draft, .. }));
    let message = err.to_string();
    assert!(message.starts_with("[create draft]"));
    assert!(message.contains(REJECTION));
    assert!(dir.path().join("preview.html").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn token_failure_stops_at_token_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 40013,
            "errmsg": "invalid appid"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), true);

    let err = run_publisher(config_for(&server), dir.path()).await.unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Token, .. }));
    let message = err.to_string();
    assert!(message.starts_with("[access token]"));
    assert!(message.contains("40013"));
    assert!(message.contains("invalid appid"));
    assert!(!dir.path().join("preview.html").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_cover_stops_at_cover_stage() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), false);

    let err = run_publisher(config_for(&server), dir.path()).await.unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Cover, .. }));
    assert!(err.to_string().contains("cover image not found"));
}

#[test]
fn article_without_title_fails_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("artical.md"), "【正文】\njust text\n").unwrap();

    let config = Config {
        wechat_api_base_url: "http://127.0.0.1:9".into(),
        ..Config::default()
    };
    let err = Publisher::new(&config, dir.path()).unwrap().run().unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Parse, .. }));
    assert!(err.to_string().contains("article title not found"));

    std::fs::write(dir.path().join("artical.md"), "【文章标题】# \n【正文】\ntext\n").unwrap();
    let err = Publisher::new(&config, dir.path()).unwrap().run().unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Parse, .. }));
    assert!(err.to_string().contains("article title not found"));
}

#[test]
fn missing_article_file_fails_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    let err = Publisher::new(&Config::default(), dir.path())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Parse, .. }));
}
