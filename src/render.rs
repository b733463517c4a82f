// WeChat-flavored HTML renderer.
//
// WeChat strips `<style>` blocks, so every fragment carries inline styles.
// The content stream is scanned once, line by line; each recognized block
// is rendered through a fixed template and the fragments are joined in
// document order inside one outer container.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::article::{strip_heading_hashes, Line, IMAGE_LINE};

pub const PRIMARY_COLOR: &str = "#003399";
pub const TEXT_COLOR: &str = "#333";
pub const LIGHT_TEXT_COLOR: &str = "#3f3f3f";
pub const FONT_FAMILY: &str =
    "-apple-system, BlinkMacSystemFont, 'Helvetica Neue', 'PingFang SC', 'Hiragino Sans GB', 'Microsoft YaHei UI', 'Microsoft YaHei', Arial, sans-serif";
pub const FOOTER_EDITION: &str = "2026 Edition";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid code regex"));
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\. ").expect("valid list regex"));

/// Apply bold, italic, link and inline-code markup, each exactly once.
pub fn process_inline(text: &str) -> String {
    let bold = format!(r#"<span style="color: {PRIMARY_COLOR}; font-weight: bold;">${{1}}</span>"#);
    let link = format!(
        r#"<a href="${{2}}" style="color: {PRIMARY_COLOR}; text-decoration: none;">${{1}}</a>"#
    );

    let text = BOLD.replace_all(text, bold.as_str());
    let text = ITALIC.replace_all(&text, "<em>${1}</em>");
    let text = LINK.replace_all(&text, link.as_str());
    let text = INLINE_CODE.replace_all(
        &text,
        r#"<code style="background: #f5f5f5; padding: 2px 6px; border-radius: 3px; font-size: 14px;">${1}</code>"#,
    );
    text.into_owned()
}

fn escape_code(code: &str) -> String {
    code.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Renders a parsed content stream into inline-styled HTML.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    author: String,
    section_images: HashMap<u32, String>,
}

impl HtmlRenderer {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            section_images: HashMap::new(),
        }
    }

    /// Uploaded image URL for each titled section, keyed by section number.
    pub fn with_section_images(mut self, section_images: HashMap<u32, String>) -> Self {
        self.section_images = section_images;
        self
    }

    pub fn render(&self, lines: &[Line]) -> String {
        let mut parts = vec![format!(
            r#"<section style="font-family: {FONT_FAMILY}; letter-spacing: 0.5px; text-align: justify; padding: 10px; color: {TEXT_COLOR};">"#
        )];
        let mut first_heading = true;
        let mut i = 0;

        while i < lines.len() {
            let raw = match &lines[i] {
                Line::QuoteStart => {
                    i += 1;
                    let mut body = Vec::new();
                    while i < lines.len() && lines[i] != Line::QuoteEnd {
                        if let Line::Text(text) = &lines[i] {
                            let text = text.trim();
                            if let Some(caps) = IMAGE_LINE.captures(text) {
                                body.push(self.render_image(&caps[2], &caps[1]));
                            } else if !text.is_empty() {
                                body.push(self.render_paragraph(text));
                            }
                        }
                        i += 1;
                    }
                    i += 1;
                    if !body.is_empty() {
                        parts.push(self.render_quote(&body.join("\n")));
                    }
                    continue;
                }
                Line::QuoteEnd => {
                    i += 1;
                    continue;
                }
                Line::TitledImage(number) => {
                    i += 1;
                    let heading = match lines.get(i) {
                        Some(Line::Text(text)) => {
                            i += 1;
                            text.trim()
                        }
                        _ => "",
                    };
                    parts.push(self.render_titled_section(*number, heading));
                    continue;
                }
                Line::Text(raw) => raw,
            };

            let line = raw.trim();
            if line.is_empty() {
                i += 1;
                continue;
            }

            if line.starts_with("```") {
                i += 1;
                let mut code = Vec::new();
                while let Some(Line::Text(text)) = lines.get(i) {
                    i += 1;
                    if text.trim().starts_with("```") {
                        break;
                    }
                    code.push(text.as_str());
                }
                parts.push(self.render_code(&code.join("\n")));
                continue;
            }

            if let Some(text) = line.strip_prefix("# ") {
                parts.push(self.render_h1(text.trim(), first_heading));
                first_heading = false;
                i += 1;
                continue;
            }
            if let Some(text) = line.strip_prefix("## ") {
                parts.push(self.render_h2(text.trim()));
                i += 1;
                continue;
            }
            if let Some(text) = line.strip_prefix("### ") {
                parts.push(self.render_h3(text.trim()));
                i += 1;
                continue;
            }

            if let Some(caps) = IMAGE_LINE.captures(line) {
                parts.push(self.render_image(&caps[2], &caps[1]));
                i += 1;
                continue;
            }

            if is_bullet(line) {
                let items = take_list(lines, &mut i, is_bullet, |l| l[2..].to_string());
                parts.push(self.render_list("ul", &items));
                continue;
            }
            if ORDERED_ITEM.is_match(line) {
                let items = take_list(
                    lines,
                    &mut i,
                    |l| ORDERED_ITEM.is_match(l),
                    |l| ORDERED_ITEM.replace(l, "").into_owned(),
                );
                parts.push(self.render_list("ol", &items));
                continue;
            }

            if line == "---" || line == "***" {
                parts.push(self.render_divider());
                i += 1;
                continue;
            }

            parts.push(self.render_paragraph(line));
            i += 1;
        }

        parts.push(self.render_footer());
        parts.push("</section>".to_string());
        parts.join("\n")
    }

    fn render_quote(&self, body: &str) -> String {
        format!(
            r#"
<section style="margin: 40px 0px;">
    <section style="border-top: 2px solid {PRIMARY_COLOR}; width: 60px; margin-bottom: 25px;"></section>
    <section style="display: flex; align-items: flex-start;">
        <section style="margin-right: 12px;">
            <span style="font-size: 60px; line-height: 40px; color: {PRIMARY_COLOR}; font-family: Georgia, serif;">"</span>
        </section>
        <section style="flex: 1; text-align: justify; font-size: 17px; color: {LIGHT_TEXT_COLOR}; line-height: 1.8; letter-spacing: 0.5px;">
            {body}
        </section>
    </section>
    <section style="display: flex; justify-content: flex-end; margin-top: 15px;">
        <span style="font-size: 60px; line-height: 20px; color: {PRIMARY_COLOR}; font-family: Georgia, serif; height: 30px; display: block;">"</span>
    </section>
</section>"#
        )
    }

    /// Section image followed by its heading; a plain heading when the image
    /// was never uploaded.
    fn render_titled_section(&self, number: u32, heading: &str) -> String {
        let heading = strip_heading_hashes(heading);
        let Some(url) = self.section_images.get(&number) else {
            return self.render_h1(heading, false);
        };
        format!(
            r#"
<section style="margin: 45px 0 30px 0;">
    <section style="text-align: left; margin-bottom: 15px;">
        <img src="{url}" alt="标题{number}" style="max-width: 120px; height: auto;"/>
    </section>
    <section style="font-size: 24px; font-weight: bold; color: #1a1a1a; letter-spacing: 1px; line-height: 1.6; text-align: left;">
        {}
    </section>
</section>"#,
            process_inline(heading)
        )
    }

    fn render_h1(&self, text: &str, first: bool) -> String {
        let margin_top = if first { "20px" } else { "45px" };
        format!(
            r#"
<section style="margin: {margin_top} 0 20px 0; display: flex; align-items: center;">
    <section style="width: 4px; height: 26px; background-color: {PRIMARY_COLOR}; margin-right: 12px; flex-shrink: 0;"></section>
    <section style="font-size: 24px; font-weight: bold; color: #1a1a1a; letter-spacing: 1.5px;">
        {}
    </section>
</section>"#,
            process_inline(text)
        )
    }

    fn render_h2(&self, text: &str) -> String {
        format!(
            r#"
<section style="margin: 35px 0 15px 0;">
    <section style="font-size: 17px; font-weight: bold; color: {PRIMARY_COLOR}; letter-spacing: 1px;">
        {}
    </section>
</section>"#,
            process_inline(text)
        )
    }

    fn render_h3(&self, text: &str) -> String {
        format!(
            r#"
<section style="margin: 25px 0 10px 0;">
    <section style="font-size: 16px; font-weight: bold; color: #1a1a1a; letter-spacing: 0.5px;">
        {}
    </section>
</section>"#,
            process_inline(text)
        )
    }

    fn render_image(&self, src: &str, alt: &str) -> String {
        format!(
            r#"
<section style="text-align: center; margin: 25px 0;">
    <img src="{src}" alt="{alt}" style="max-width: 100%; border-radius: 5px;"/>
</section>"#
        )
    }

    fn render_paragraph(&self, text: &str) -> String {
        format!(
            r#"
<section style="font-size: 17px; color: {TEXT_COLOR}; line-height: 1.8; margin-bottom: 15px;">
    <p>{}</p>
</section>"#,
            process_inline(text)
        )
    }

    fn render_list(&self, tag: &str, items: &[String]) -> String {
        let li_html: String = items
            .iter()
            .map(|item| {
                format!(
                    r#"<li style="margin: 8px 0; line-height: 1.8;">{}</li>"#,
                    process_inline(item)
                )
            })
            .collect();
        format!(
            r#"
<section style="font-size: 17px; color: {TEXT_COLOR}; line-height: 1.8; margin: 15px 0; padding-left: 20px;">
    <{tag} style="margin: 0; padding-left: 20px;">{li_html}</{tag}>
</section>"#
        )
    }

    fn render_code(&self, code: &str) -> String {
        format!(
            r#"
<section style="margin: 20px 0;">
    <pre style="background: #f5f5f5; padding: 15px; border-radius: 5px; overflow-x: auto; font-size: 14px; line-height: 1.6;"><code>{}</code></pre>
</section>"#,
            escape_code(code)
        )
    }

    fn render_divider(&self) -> String {
        format!(
            r#"
<section style="margin: 45px auto; display: flex; align-items: center; justify-content: center; width: 60%;">
    <section style="flex: 1; height: 1px; background-color: {PRIMARY_COLOR}; opacity: 0.15;"></section>
    <section style="width: 4px; height: 4px; background-color: {PRIMARY_COLOR}; margin: 0 15px; transform: rotate(45deg);"></section>
    <section style="flex: 1; height: 1px; background-color: {PRIMARY_COLOR}; opacity: 0.15;"></section>
</section>"#
        )
    }

    fn render_footer(&self) -> String {
        format!(
            r#"
<section style="margin-top: 60px; border-top: 1px solid #eee; text-align: center; padding-top: 20px;">
    <span style="font-size: 11px; color: #bbb; letter-spacing: 3px; font-family: 'Helvetica Neue', Helvetica, sans-serif; text-transform: uppercase;">
        {} · {FOOTER_EDITION}
    </span>
</section>"#,
            self.author
        )
    }
}

fn is_bullet(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ")
}

/// Collect a run of list items starting at `*i`. A blank line ends the run
/// and is consumed; any other line ends it and is left for the caller.
fn take_list(
    lines: &[Line],
    i: &mut usize,
    is_item: impl Fn(&str) -> bool,
    item_text: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut items = Vec::new();
    while let Some(Line::Text(text)) = lines.get(*i) {
        let line = text.trim();
        if is_item(line) {
            items.push(item_text(line));
            *i += 1;
        } else {
            if line.is_empty() {
                *i += 1;
            }
            break;
        }
    }
    items
}
