// Article parser: turns the tagged `artical.md` source into a title, an
// optional cover reference and a flat stream of content lines.
//
// Structural markers are whole lines wrapped in 【】. Anything the parser
// does not recognize is dropped silently; only a missing title is an error.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::layout::{ArticleDir, COVER_REFERENCE};

const TITLE_MARKER: &str = "【文章标题】";
const COVER_MARKER: &str = "【封面主图";
const QUOTE_MARKER: &str = "【引言】";
const BODY_MARKER: &str = "【正文】";

static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^【标题(\d+)】$").expect("valid section regex"));
static LEADING_HASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s*").expect("valid heading regex"));
static LENIENT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"【文章标题】[#\s]*(.+)").expect("valid title regex"));

/// Markdown image at the start of a line: `![alt](src)`.
pub static IMAGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)]+)\)").expect("valid image regex"));

/// One entry of the content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Start of the introduction quote.
    QuoteStart,
    /// End of the introduction quote.
    QuoteEnd,
    /// Titled section `n`; the next line carries its heading text.
    TitledImage(u32),
    /// Literal markdown, copied from the source without its line terminator.
    Text(String),
}

/// Result of parsing one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    /// Cover reference relative to the article directory, or a URL.
    pub cover: Option<String>,
    pub lines: Vec<Line>,
}

/// Where the cover image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSource {
    Local(PathBuf),
    Remote(String),
}

impl ParsedArticle {
    /// Resolve the cover reference. Without an explicit reference the
    /// generated `assets/cover.png` is used when it exists.
    pub fn cover_source(&self, dir: &ArticleDir) -> Option<CoverSource> {
        match &self.cover {
            Some(reference) if reference.starts_with("http") => {
                Some(CoverSource::Remote(reference.clone()))
            }
            Some(reference) => Some(CoverSource::Local(dir.resolve(reference))),
            None => {
                let auto = dir.cover_image();
                auto.exists().then_some(CoverSource::Local(auto))
            }
        }
    }

    /// Number of quote start/end sentinels in the stream.
    pub fn quote_counts(&self) -> (usize, usize) {
        let starts = self.lines.iter().filter(|l| **l == Line::QuoteStart).count();
        let ends = self.lines.iter().filter(|l| **l == Line::QuoteEnd).count();
        (starts, ends)
    }
}

pub struct ArticleParser {
    dir: ArticleDir,
}

impl ArticleParser {
    pub fn new(dir: ArticleDir) -> Self {
        Self { dir }
    }

    /// Read and parse `artical.md` from the article directory.
    pub fn parse_file(&self) -> Result<ParsedArticle> {
        let path = self.dir.article_source();
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "article file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(&path)?;
        self.parse_str(&text)
    }

    pub fn parse_str(&self, text: &str) -> Result<ParsedArticle> {
        let source: Vec<&str> = text.lines().collect();
        let mut title: Option<String> = None;
        let mut cover: Option<String> = None;
        let mut lines: Vec<Line> = Vec::new();
        let mut in_quote = false;

        let close_quote = |lines: &mut Vec<Line>, in_quote: &mut bool| {
            if *in_quote {
                lines.push(Line::QuoteEnd);
                *in_quote = false;
            }
        };

        let mut i = 0;
        while i < source.len() {
            let raw = source[i];
            let stripped = raw.trim();

            if let Some(rest) = stripped.strip_prefix(TITLE_MARKER) {
                title = Some(strip_heading_hashes(rest.trim()).to_string());
                i += 1;
                continue;
            }

            if stripped.starts_with('【')
                && stripped.contains(COVER_MARKER)
                && stripped.contains('】')
            {
                close_quote(&mut lines, &mut in_quote);
                i += 1;
                if self.dir.cover_image().exists() {
                    cover = Some(COVER_REFERENCE.to_string());
                    // an image line right after the marker belongs to the cover
                    if i < source.len() && IMAGE_LINE.is_match(source[i].trim()) {
                        i += 1;
                    }
                } else {
                    while i < source.len() && source[i].trim().is_empty() {
                        i += 1;
                    }
                    if let Some(caps) = source.get(i).and_then(|l| IMAGE_LINE.captures(l.trim())) {
                        cover = Some(caps[2].to_string());
                        i += 1;
                    }
                }
                continue;
            }

            if stripped == QUOTE_MARKER {
                close_quote(&mut lines, &mut in_quote);
                lines.push(Line::QuoteStart);
                in_quote = true;
                i += 1;
                continue;
            }

            if stripped == BODY_MARKER {
                close_quote(&mut lines, &mut in_quote);
                i += 1;
                continue;
            }

            if let Some(number) = section_number(stripped) {
                close_quote(&mut lines, &mut in_quote);
                lines.push(Line::TitledImage(number));
                i += 1;
                if let Some(heading) = source.get(i) {
                    lines.push(Line::Text(heading.to_string()));
                    i += 1;
                }
                continue;
            }

            if stripped.starts_with('【') && stripped.contains('】') {
                i += 1;
                continue;
            }

            lines.push(Line::Text(raw.to_string()));
            i += 1;
        }

        close_quote(&mut lines, &mut in_quote);

        // a bare marker with nothing after it is as good as no title
        let title = title.filter(|t| !t.is_empty()).ok_or(Error::MissingTitle)?;
        Ok(ParsedArticle {
            title,
            cover,
            lines,
        })
    }
}

fn section_number(stripped: &str) -> Option<u32> {
    SECTION_MARKER
        .captures(stripped)
        .and_then(|caps| caps[1].parse().ok())
}

/// Remove leading `#` heading markers and the whitespace after them.
pub fn strip_heading_hashes(text: &str) -> &str {
    match LEADING_HASHES.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Pull the title out of an article source without failing; returns an
/// empty string when there is no title marker.
pub fn extract_title_lenient(text: &str) -> String {
    LENIENT_TITLE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}
