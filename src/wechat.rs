// Blocking client for the four WeChat public-platform endpoints the
// publisher needs: token exchange, permanent material upload (cover),
// inline image upload and draft creation.

use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::imagegen::image_subtype;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXPIRES_IN: i64 = 7200;

#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub errcode: Option<i64>,
    pub errmsg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadResponse {
    pub media_id: Option<String>,
    pub url: Option<String>,
    pub errcode: Option<i64>,
    pub errmsg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftResponse {
    pub media_id: Option<String>,
    pub errcode: Option<i64>,
    pub errmsg: Option<String>,
}

/// One article of a draft creation request.
#[derive(Debug, Clone, Serialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    pub thumb_media_id: String,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

impl DraftArticle {
    /// Draft with an empty digest and comments disabled.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        thumb_media_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            digest: String::new(),
            content: content.into(),
            thumb_media_id: thumb_media_id.into(),
            need_open_comment: 0,
            only_fans_can_comment: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    articles: [&'a DraftArticle; 1],
}

/// Access token obtained from the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: i64,
}

pub struct WechatClient {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    access_token: Option<AccessToken>,
}

impl WechatClient {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            access_token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.wechat_api_base_url.clone(),
            config.wechat_app_id.clone(),
            config.wechat_app_secret.clone(),
        )
    }

    /// Exchange the app credentials for an access token and keep it for the
    /// following calls.
    pub fn authenticate(&mut self) -> Result<AccessToken> {
        let url = format!("{}/cgi-bin/token", self.base_url);
        let text = self
            .client
            .get(&url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
            ])
            .timeout(TOKEN_TIMEOUT)
            .send()?
            .text()?;
        let body: TokenResponse = parse_body(&text);

        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Api(describe_failure(body.errcode, body.errmsg.as_deref(), &text))
            })?;
        let token = AccessToken {
            token,
            expires_in: body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        };
        self.access_token = Some(token.clone());
        Ok(token)
    }

    /// Upload a permanent image material; returns its media id.
    pub fn upload_material(&self, image: &Path) -> Result<String> {
        let url = format!("{}/cgi-bin/material/add_material", self.base_url);
        let token = self.token()?;
        let text = self
            .client
            .post(&url)
            .query(&[("access_token", token), ("type", "image")])
            .multipart(media_form(image)?)
            .timeout(UPLOAD_TIMEOUT)
            .send()?
            .text()?;
        let body: UploadResponse = parse_body(&text);
        body.media_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::Api(describe_failure(body.errcode, body.errmsg.as_deref(), &text))
            })
    }

    /// Upload an image for use inside article content; returns its URL.
    pub fn upload_content_image(&self, image: &Path) -> Result<String> {
        let url = format!("{}/cgi-bin/media/uploadimg", self.base_url);
        let token = self.token()?;
        let text = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .multipart(media_form(image)?)
            .timeout(UPLOAD_TIMEOUT)
            .send()?
            .text()?;
        let body: UploadResponse = parse_body(&text);
        body.url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::Api(describe_failure(body.errcode, body.errmsg.as_deref(), &text))
            })
    }

    /// Submit a single-article draft; returns the draft media id.
    pub fn create_draft(&self, article: &DraftArticle) -> Result<String> {
        let url = format!("{}/cgi-bin/draft/add", self.base_url);
        let token = self.token()?;
        let request = DraftRequest { articles: [article] };
        let text = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(&request)
            .timeout(UPLOAD_TIMEOUT)
            .send()?
            .text()?;
        debug!("draft response: {}", text);
        let body: DraftResponse = parse_body(&text);
        body.media_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Api(format!("unexpected draft response: {}", text)))
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_ref()
            .map(|t| t.token.as_str())
            .ok_or_else(|| Error::Api("no access token, authenticate first".to_string()))
    }
}

fn media_form(image: &Path) -> Result<multipart::Form> {
    let file = File::open(image)?;
    let file_name = image
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("image.png")
        .to_string();
    let part = multipart::Part::reader(file)
        .file_name(file_name)
        .mime_str(&format!("image/{}", image_subtype(image)))?;
    Ok(multipart::Form::new().part("media", part))
}

/// Non-JSON bodies decode to an empty response so the caller reports the raw text.
fn parse_body<T: for<'de> Deserialize<'de> + Default>(text: &str) -> T {
    serde_json::from_str(text).unwrap_or_default()
}

fn describe_failure(errcode: Option<i64>, errmsg: Option<&str>, raw: &str) -> String {
    match errcode {
        Some(code) => format!("{} - {}", code, errmsg.unwrap_or_default()),
        None => format!("unexpected response: {}", raw),
    }
}
