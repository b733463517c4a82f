// Error types shared by both pipelines.
//
// Every failure the library can report ends up as an `Error`, whose Display
// is the human-readable line the CLI prints. Publisher failures carry the
// stage they happened in; generator failures aggregate one reason per model.

use std::fmt;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the publishing pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Token,
    Cover,
    Render,
    Draft,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse article",
            Stage::Token => "access token",
            Stage::Cover => "upload cover",
            Stage::Render => "render html",
            Stage::Draft => "create draft",
        };
        f.write_str(name)
    }
}

/// Why a single model attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFailure {
    pub model: String,
    pub reason: String,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model {}: {}", self.model, self.reason)
    }
}

fn summarize(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {}", failure))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum Error {
    /// A required directory or file is missing or empty.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The article never declared a title marker.
    #[error("article title not found")]
    MissingTitle,

    /// Every configured generation model failed.
    #[error("all models failed:\n{}", summarize(.0))]
    AllModelsFailed(Vec<ModelFailure>),

    /// The WeChat platform rejected a call or answered without the expected field.
    #[error("WeChat API error: {0}")]
    Api(String),

    /// A publisher stage failed.
    #[error("[{stage}] {message}")]
    Stage { stage: Stage, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Tag an arbitrary failure with the publisher stage it happened in.
    pub fn stage(stage: Stage, message: impl fmt::Display) -> Self {
        Error::Stage {
            stage,
            message: message.to_string(),
        }
    }
}
