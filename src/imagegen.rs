// Image generation client for an OpenAI-compatible `/chat/completions`
// endpoint that answers with base64 image data.
//
// Models are tried in order (primary with a long timeout, then a fallback
// with a short one). The first model that yields an image wins; if none
// does, the caller gets one aggregated error naming every model.

use base64::{engine::general_purpose, Engine as _};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, ModelFailure, Result};

const MAX_TOKENS: u32 = 4096;
const ERROR_TEXT_LIMIT: usize = 200;

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/\w+;base64,([A-Za-z0-9+/=]+)").expect("valid data url regex")
});

/// One entry of the ordered model list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub timeout: Duration,
}

impl ModelAttempt {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            timeout,
        }
    }
}

/// Request body sent to `/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a MessageContent,
}

/// User message content: a bare prompt, or the prompt plus reference images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Blocking client holding the endpoint, the key and the model order.
pub struct ImageGenClient {
    client: Client,
    base_url: String,
    api_key: String,
    attempts: Vec<ModelAttempt>,
}

impl ImageGenClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        attempts: Vec<ModelAttempt>,
    ) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            attempts,
        })
    }

    /// Primary model with its long timeout, then the fallback model.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.image_api_base_url.clone(),
            config.image_api_key.clone(),
            vec![
                ModelAttempt::new(config.image_model.clone(), config.primary_timeout()),
                ModelAttempt::new(config.image_fallback_model.clone(), config.fallback_timeout()),
            ],
        )
    }

    /// Text to image.
    pub fn text_to_image(&self, prompt: &str, output: &Path) -> Result<PathBuf> {
        self.generate(prompt, &[], output)
    }

    /// Image to image: the prompt plus one or more reference pictures.
    pub fn image_to_image(
        &self,
        prompt: &str,
        images: &[PathBuf],
        output: &Path,
    ) -> Result<PathBuf> {
        self.generate(prompt, images, output)
    }

    /// Generate an image and write it to `output`. Nothing is written unless
    /// some model returned a decodable image.
    pub fn generate(&self, prompt: &str, images: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let content = build_content(prompt, images)?;

        let bytes = first_success(&self.attempts, |attempt| self.request_image(attempt, &content))
            .map_err(Error::AllModelsFailed)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, bytes)?;
        Ok(output.to_path_buf())
    }

    fn request_image(
        &self,
        attempt: &ModelAttempt,
        content: &MessageContent,
    ) -> std::result::Result<Vec<u8>, String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &attempt.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: MAX_TOKENS,
        };

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("waiting for {}...", attempt.model));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let sent = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(attempt.timeout)
            .json(&body)
            .send();
        spinner.finish_and_clear();
        let response = sent.map_err(|e| e.to_string())?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(describe_http_error(status, response.text().ok()));
        }

        let data: Value = response
            .json()
            .map_err(|e| format!("invalid response body: {}", e))?;
        let choice = data
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| format!("unexpected response format: {}", truncate(&data.to_string())))?;

        let message_content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .unwrap_or(&Value::Null);
        let encoded = extract_image(message_content)
            .ok_or_else(|| "no image found in response".to_string())?;

        debug!("model {} returned {} base64 bytes", attempt.model, encoded.len());
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| format!("failed to decode image: {}", e))
    }
}

/// Run `attempts` in order and stop at the first success. On exhaustion
/// returns one failure per attempt, in order.
pub fn first_success<T, F>(
    attempts: &[ModelAttempt],
    mut run: F,
) -> std::result::Result<T, Vec<ModelFailure>>
where
    F: FnMut(&ModelAttempt) -> std::result::Result<T, String>,
{
    let mut failures = Vec::new();
    for attempt in attempts {
        println!(
            "trying model {} (timeout {}s)...",
            attempt.model,
            attempt.timeout.as_secs()
        );
        match run(attempt) {
            Ok(value) => {
                println!("✓ model {} generated an image", attempt.model);
                return Ok(value);
            }
            Err(reason) => {
                println!("✗ model {} failed: {}", attempt.model, reason);
                failures.push(ModelFailure {
                    model: attempt.model.clone(),
                    reason,
                });
            }
        }
    }
    Err(failures)
}

/// Build the message content. Reference images that do not exist are skipped.
pub fn build_content(prompt: &str, images: &[PathBuf]) -> Result<MessageContent> {
    if images.is_empty() {
        return Ok(MessageContent::Text(prompt.to_string()));
    }

    let mut parts = vec![ContentPart::Text {
        text: prompt.to_string(),
    }];
    for path in images {
        if !path.exists() {
            warn!("reference image not found: {}", path.display());
            continue;
        }
        let data = std::fs::read(path)?;
        let encoded = general_purpose::STANDARD.encode(data);
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/{};base64,{}", image_subtype(path), encoded),
            },
        });
    }
    Ok(MessageContent::Parts(parts))
}

/// Image MIME subtype from the file extension; unknown extensions map to `png`.
pub fn image_subtype(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "jpeg",
        "png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        _ => "png",
    }
}

/// Find base64 image data in a choice's message content.
///
/// Plain strings are scanned for a data URL. Lists of typed parts are
/// searched in order: `image_url` parts yield the data after `base64,`, and
/// `text` parts are scanned like plain strings.
pub fn extract_image(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => DATA_URL.captures(text).map(|caps| caps[1].to_string()),
        Value::Array(items) => items.iter().find_map(|item| {
            match item.get("type").and_then(Value::as_str) {
                Some("image_url") => item
                    .get("image_url")
                    .and_then(|i| i.get("url"))
                    .and_then(Value::as_str)
                    .and_then(|url| url.split_once("base64,"))
                    .map(|(_, data)| data.to_string())
                    .filter(|data| !data.is_empty()),
                Some("text") => item.get("text").and_then(extract_image),
                _ => None,
            }
        }),
        _ => None,
    }
}

/// Best-effort description of a non-200 response: the JSON `error.message`,
/// then the JSON body, then the raw text, then the bare status code.
fn describe_http_error(status: StatusCode, body: Option<String>) -> String {
    let code = status.as_u16();
    let Some(text) = body.filter(|t| !t.trim().is_empty()) else {
        return format!("API error: HTTP {}", code);
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let message = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| json.to_string());
            format!("API error {}: {}", code, message)
        }
        Err(_) => format!("API error {}: {}", code, truncate(&text)),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_TEXT_LIMIT).collect()
}
