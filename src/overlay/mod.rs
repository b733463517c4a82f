// Title text overlay for generated covers.
//
// Draws the wrapped title near the bottom of the image on top of a
// semi-transparent dark band, white text with a black outline, then saves
// the result back as an opaque image. Failures are logged and swallowed so
// the generated cover is never lost to a cosmetic step.

pub mod builtin_font;

use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, ImageFormat, ImageReader, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size, Blend};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Font size as a fraction of the image width.
const FONT_SIZE_RATIO: f32 = 0.06;
/// Naive fixed-width wrap; roughly right for CJK titles.
pub const MAX_CHARS_PER_LINE: usize = 15;
const LINE_HEIGHT_RATIO: f32 = 1.5;
const BOTTOM_MARGIN_RATIO: f32 = 0.08;
const BAND_BOTTOM_RATIO: f32 = 0.05;
const BAND_PADDING: i32 = 20;
const BAND_ALPHA: u8 = 140;
const STROKE_WIDTH: i32 = 2;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Platform font files tried in order after any caller-supplied candidates.
pub fn platform_font_candidates() -> Vec<PathBuf> {
    [
        "/System/Library/Fonts/STHeiti Medium.ttc",
        "/System/Library/Fonts/PingFang.ttc",
        "/System/Library/Fonts/Hiragino Sans GB.ttc",
        "/Library/Fonts/Arial Unicode.ttf",
        "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
        "C:/Windows/Fonts/msyh.ttc",
        "C:/Windows/Fonts/simhei.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

enum OverlayFont {
    TrueType(FontVec),
    Builtin,
}

impl OverlayFont {
    fn text_width(&self, size: u32, text: &str) -> u32 {
        match self {
            OverlayFont::TrueType(font) => text_size(PxScale::from(size as f32), font, text).0,
            OverlayFont::Builtin => builtin_font::text_width(size, text),
        }
    }

    fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: i32, y: i32, size: u32, text: &str) {
        match self {
            OverlayFont::TrueType(font) => {
                draw_text_mut(canvas, color, x, y, PxScale::from(size as f32), font, text)
            }
            OverlayFont::Builtin => builtin_font::draw_text(canvas, color, x, y, size, text),
        }
    }
}

/// Draws title text onto images using the first loadable candidate font.
#[derive(Debug, Clone)]
pub struct TextOverlay {
    font_candidates: Vec<PathBuf>,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self::with_candidates(platform_font_candidates())
    }
}

impl TextOverlay {
    pub fn with_candidates(font_candidates: Vec<PathBuf>) -> Self {
        Self { font_candidates }
    }

    /// Platform list preceded by `extra`, which takes priority.
    pub fn with_extra_fonts(extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut font_candidates: Vec<PathBuf> = extra.into_iter().collect();
        font_candidates.extend(platform_font_candidates());
        Self { font_candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.font_candidates
    }

    /// Draw `text` onto the image at `image_path`, in place. Returns whether
    /// the image was rewritten; errors are only logged.
    pub fn apply(&self, image_path: &Path, text: &str) -> bool {
        match self.try_apply(image_path, text) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to add text to {}: {}", image_path.display(), e);
                false
            }
        }
    }

    fn try_apply(&self, image_path: &Path, text: &str) -> Result<()> {
        // generators often return JPEG data whatever the file is called
        let canvas = ImageReader::open(image_path)?
            .with_guessed_format()?
            .decode()?
            .to_rgba8();
        let (width, height) = canvas.dimensions();
        let font_size = ((width as f32 * FONT_SIZE_RATIO) as u32).max(1);
        let font = self.load_font();

        let lines = wrap_fixed(text, MAX_CHARS_PER_LINE);
        let line_height = font_size as f32 * LINE_HEIGHT_RATIO;
        let total_height = lines.len() as f32 * line_height;
        let bottom_margin = (height as f32 * BOTTOM_MARGIN_RATIO).floor();
        let y_start = height as f32 - total_height - bottom_margin;

        let band_top = y_start as i32 - BAND_PADDING;
        let band_bottom = height as i32 - (height as f32 * BAND_BOTTOM_RATIO) as i32;
        let mut canvas = darken_band(canvas, band_top, band_bottom, BAND_ALPHA);

        for (i, line) in lines.iter().enumerate() {
            let text_width = font.text_width(font_size, line) as i32;
            let x = (width as i32 - text_width) / 2;
            let y = (y_start + i as f32 * line_height) as i32;

            for (dx, dy) in stroke_offsets(STROKE_WIDTH) {
                font.draw(&mut canvas, BLACK, x + dx, y + dy, font_size, line);
            }
            font.draw(&mut canvas, WHITE, x, y, font_size, line);
        }

        flatten_on_white(&canvas).save_with_format(image_path, ImageFormat::Png)?;
        debug!("added {} line(s) of text to {}", lines.len(), image_path.display());
        Ok(())
    }

    fn load_font(&self) -> OverlayFont {
        for path in &self.font_candidates {
            if !path.exists() {
                continue;
            }
            let Ok(data) = std::fs::read(path) else {
                continue;
            };
            match FontVec::try_from_vec_and_index(data, 0) {
                Ok(font) => {
                    debug!("using font {}", path.display());
                    return OverlayFont::TrueType(font);
                }
                Err(e) => debug!("skipping font {}: {}", path.display(), e),
            }
        }
        warn!("no CJK font found, using the built-in font");
        OverlayFont::Builtin
    }
}

/// Split `text` every `max_chars` characters.
pub fn wrap_fixed(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Offsets in the eight compass directions, one ring per pixel of width.
fn stroke_offsets(width: i32) -> Vec<(i32, i32)> {
    let mut offsets = Vec::new();
    for r in 1..=width {
        for (dx, dy) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
            offsets.push((dx * r, dy * r));
        }
    }
    offsets
}

/// Blend black at `alpha` over the full-width rows between `top` and `bottom`.
fn darken_band(canvas: RgbaImage, top: i32, bottom: i32, alpha: u8) -> RgbaImage {
    let top = top.max(0);
    let bottom = bottom.min(canvas.height() as i32);
    if bottom <= top || canvas.width() == 0 {
        return canvas;
    }
    let band = Rect::at(0, top).of_size(canvas.width(), (bottom - top) as u32);
    let mut blended = Blend(canvas);
    draw_filled_rect_mut(&mut blended, band, Rgba([0, 0, 0, alpha]));
    blended.0
}

/// Composite onto a white background and drop the alpha channel.
fn flatten_on_white(canvas: &RgbaImage) -> RgbImage {
    let mut base = RgbaImage::from_pixel(canvas.width(), canvas.height(), WHITE);
    imageops::overlay(&mut base, canvas, 0, 0);
    DynamicImage::ImageRgba8(base).into_rgb8()
}
