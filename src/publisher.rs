// Publishing pipeline: parse -> token -> cover -> images -> html -> draft.
//
// Stages run strictly in order and the first failing stage ends the run
// with a stage-tagged error. Individual content images are the exception:
// a failed or missing image is logged and its reference left as it was.

use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::article::{ArticleParser, CoverSource, Line, ParsedArticle};
use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::layout::{ArticleDir, COVER_REFERENCE, MAX_SECTION_IMAGES};
use crate::render::HtmlRenderer;
use crate::wechat::{DraftArticle, WechatClient};

static INLINE_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid image regex"));

/// What a media asset is referenced by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKey {
    /// Titled section image `assets/<n>.png`.
    Section(u32),
    /// Path written inside a markdown image reference.
    Inline(String),
}

/// A local image and, once uploaded, its WeChat URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub key: AssetKey,
    pub local_path: PathBuf,
    pub remote_url: Option<String>,
}

impl MediaAsset {
    pub fn is_resolved(&self) -> bool {
        self.remote_url.is_some()
    }
}

pub struct Publisher {
    dir: ArticleDir,
    author: String,
    wechat: WechatClient,
}

impl Publisher {
    pub fn new(config: &Config, article_dir: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = article_dir.into();
        let root = root.canonicalize().unwrap_or(root);
        Ok(Self {
            dir: ArticleDir::new(root),
            author: config.wechat_author.clone(),
            wechat: WechatClient::from_config(config)?,
        })
    }

    /// Run every stage and return the media id of the created draft.
    pub fn run(&mut self) -> Result<String> {
        println!("[1/6] parsing article...");
        let mut article = ArticleParser::new(self.dir.clone())
            .parse_file()
            .map_err(|e| Error::stage(Stage::Parse, e))?;
        println!("      title: {}", article.title);
        println!(
            "      cover: {}",
            article.cover.as_deref().unwrap_or("auto-detect assets/cover.png")
        );

        println!("[2/6] fetching access_token...");
        let token = self
            .wechat
            .authenticate()
            .map_err(|e| Error::stage(Stage::Token, e))?;
        println!("      ok, valid for {} seconds", token.expires_in);

        let thumb_media_id = self.upload_cover(&article)?;

        println!("[4/6] uploading content images...");
        let section_assets = self.upload_section_images();
        let inline_assets = self.upload_inline_images(&mut article.lines);
        info!(
            "{} section image(s), {} inline image(s) uploaded",
            section_assets.iter().filter(|a| a.is_resolved()).count(),
            inline_assets.iter().filter(|a| a.is_resolved()).count()
        );

        println!("[5/6] rendering html...");
        let html = HtmlRenderer::new(self.author.clone())
            .with_section_images(section_urls(&section_assets))
            .render(&article.lines);
        let preview = self.dir.preview();
        std::fs::write(&preview, preview_document(&html)).map_err(|e| {
            Error::stage(
                Stage::Render,
                format!("failed to write {}: {}", preview.display(), e),
            )
        })?;
        println!("      preview written to {}", preview.display());

        println!("[6/6] creating draft...");
        let draft = DraftArticle::new(
            article.title.clone(),
            self.author.clone(),
            html,
            thumb_media_id,
        );
        let media_id = self
            .wechat
            .create_draft(&draft)
            .map_err(|e| Error::stage(Stage::Draft, e))?;
        println!("      ok, media_id: {}", media_id);
        Ok(media_id)
    }

    fn upload_cover(&self, article: &ParsedArticle) -> Result<String> {
        let cover = match article.cover_source(&self.dir) {
            Some(CoverSource::Local(path)) if path.exists() => path,
            Some(CoverSource::Local(path)) => {
                return Err(Error::stage(
                    Stage::Cover,
                    format!("cover image not found: {}", path.display()),
                ))
            }
            Some(CoverSource::Remote(url)) => {
                return Err(Error::stage(Stage::Cover, format!("cover image not found: {}", url)))
            }
            None => {
                return Err(Error::stage(
                    Stage::Cover,
                    format!("cover image not found: {}", COVER_REFERENCE),
                ))
            }
        };

        println!("[3/6] uploading cover image: {}", cover.display());
        let media_id = self
            .wechat
            .upload_material(&cover)
            .map_err(|e| Error::stage(Stage::Cover, e))?;
        println!("      ok, media_id: {}", media_id);
        Ok(media_id)
    }

    /// Upload `assets/1.png` through `assets/9.png`; gaps are fine.
    fn upload_section_images(&self) -> Vec<MediaAsset> {
        let mut assets = Vec::new();
        for index in 1..=MAX_SECTION_IMAGES {
            let path = self.dir.section_image(index);
            if !path.exists() {
                continue;
            }
            let remote_url = self.upload_content_image(&path);
            if remote_url.is_some() {
                println!("      section image {}.png uploaded", index);
            }
            assets.push(MediaAsset {
                key: AssetKey::Section(index),
                local_path: path,
                remote_url,
            });
        }
        assets
    }

    /// Upload local images referenced from markdown and point the references
    /// at the uploaded URLs. Remote references are left alone.
    fn upload_inline_images(&self, lines: &mut [Line]) -> Vec<MediaAsset> {
        let mut references: Vec<String> = Vec::new();
        for line in lines.iter() {
            if let Line::Text(text) = line {
                for caps in INLINE_IMAGE.captures_iter(text) {
                    let reference = caps[2].to_string();
                    if !references.contains(&reference) {
                        references.push(reference);
                    }
                }
            }
        }

        let mut assets = Vec::new();
        for reference in references {
            if reference.starts_with("http") {
                continue;
            }
            let path = self.dir.resolve(&reference);
            if !path.exists() {
                warn!("image not found: {}", path.display());
                println!("      warning: image not found - {}", path.display());
                continue;
            }
            let remote_url = self.upload_content_image(&path);
            if let Some(url) = &remote_url {
                rewrite_reference(lines, &reference, url);
            }
            assets.push(MediaAsset {
                key: AssetKey::Inline(reference),
                local_path: path,
                remote_url,
            });
        }
        assets
    }

    fn upload_content_image(&self, path: &std::path::Path) -> Option<String> {
        println!("      uploading image: {}", path.display());
        match self.wechat.upload_content_image(path) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("upload of {} failed: {}", path.display(), e);
                println!("      failed: {}", e);
                None
            }
        }
    }
}

/// Replace `](reference)` with `](url)` on every text line.
fn rewrite_reference(lines: &mut [Line], reference: &str, url: &str) {
    let from = format!("]({})", reference);
    let to = format!("]({})", url);
    for line in lines.iter_mut() {
        if let Line::Text(text) = line {
            if text.contains(&from) {
                *text = text.replace(&from, &to);
            }
        }
    }
}

fn section_urls(assets: &[MediaAsset]) -> HashMap<u32, String> {
    assets
        .iter()
        .filter_map(|asset| match (&asset.key, &asset.remote_url) {
            (AssetKey::Section(index), Some(url)) => Some((*index, url.clone())),
            _ => None,
        })
        .collect()
}

/// Standalone page wrapping the rendered article for local review.
pub fn preview_document(html: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Preview</title></head><body style="max-width:600px;margin:0 auto;">{}</body></html>"#,
        html
    )
}

/// Publish the article in `article_dir` as a WeChat draft.
pub fn publish_article(config: &Config, article_dir: impl Into<PathBuf>) -> Result<String> {
    Publisher::new(config, article_dir)?.run()
}
