// Cover pipeline: `cover_design.md` prompt -> generated `assets/cover.png`
// -> optional title overlay.

use std::path::PathBuf;
use tracing::info;

use crate::article::extract_title_lenient;
use crate::error::{Error, Result};
use crate::imagegen::ImageGenClient;
use crate::layout::ArticleDir;
use crate::overlay::TextOverlay;

pub struct CoverCreator {
    generator: ImageGenClient,
    overlay: TextOverlay,
}

impl CoverCreator {
    pub fn new(generator: ImageGenClient, overlay: TextOverlay) -> Self {
        Self { generator, overlay }
    }

    /// Generate the cover for the article in `article_dir`.
    ///
    /// `cover_text` is drawn on the image when given; otherwise the title is
    /// taken from `artical.md` if one can be found. Returns the image path.
    pub fn create(
        &self,
        article_dir: impl Into<PathBuf>,
        cover_text: Option<&str>,
    ) -> Result<PathBuf> {
        let root: PathBuf = article_dir.into();
        let root = root.canonicalize().unwrap_or(root);
        if !root.exists() {
            return Err(Error::MissingInput(format!(
                "directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(Error::MissingInput(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }
        let dir = ArticleDir::new(root);

        let prompt_path = dir.cover_prompt();
        if !prompt_path.exists() {
            return Err(Error::MissingInput(format!(
                "cover_design.md not found: {}",
                prompt_path.display()
            )));
        }
        let prompt = std::fs::read_to_string(&prompt_path)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::MissingInput("cover_design.md is empty".to_string()));
        }

        std::fs::create_dir_all(dir.assets())?;
        let output = self.generator.text_to_image(prompt, &dir.cover_image())?;
        info!("cover written to {}", output.display());

        let text = match cover_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => title_from_article(&dir),
        };
        if !text.is_empty() && self.overlay.apply(&output, &text) {
            println!("added cover text: {}", text);
        }

        Ok(output)
    }
}

/// Title from `artical.md`, or an empty string when unavailable.
fn title_from_article(dir: &ArticleDir) -> String {
    std::fs::read_to_string(dir.article_source())
        .map(|text| extract_title_lenient(&text))
        .unwrap_or_default()
}
