// Conventional file names inside an article directory.

use std::path::PathBuf;

pub const COVER_PROMPT_FILE: &str = "cover_design.md";
pub const ARTICLE_FILE: &str = "artical.md";
pub const ASSETS_DIR: &str = "assets";
pub const COVER_FILE: &str = "cover.png";
pub const PREVIEW_FILE: &str = "preview.html";

/// Relative cover reference used when the cover marker finds the generated cover.
pub const COVER_REFERENCE: &str = "assets/cover.png";

/// Highest titled-section image index looked up in `assets/`.
pub const MAX_SECTION_IMAGES: u32 = 9;

/// Paths of a single article directory.
#[derive(Debug, Clone)]
pub struct ArticleDir {
    root: PathBuf,
}

impl ArticleDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cover_prompt(&self) -> PathBuf {
        self.root.join(COVER_PROMPT_FILE)
    }

    pub fn article_source(&self) -> PathBuf {
        self.root.join(ARTICLE_FILE)
    }

    pub fn assets(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    pub fn cover_image(&self) -> PathBuf {
        self.assets().join(COVER_FILE)
    }

    /// `assets/<n>.png`, the image paired with titled section `n`.
    pub fn section_image(&self, index: u32) -> PathBuf {
        self.assets().join(format!("{}.png", index))
    }

    pub fn preview(&self) -> PathBuf {
        self.root.join(PREVIEW_FILE)
    }

    /// Resolve a reference written inside the article against the directory.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }
}
