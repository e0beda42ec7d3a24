//! Contemplation cards: the generated picture with its caption set in a
//! white band underneath, always emitted as PNG.

use std::io::Cursor;
use std::path::PathBuf;

use ab_glyph::{FontArc, PxScale};
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::ffmpeg::env_parse;

/// DejaVu Serif, used when no `CAPTION_FONT_PATH` is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSerif.ttf");

const ELLIPSIS: &str = "...";
const BAND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("failed to read caption font: {0}")]
    FontIo(#[from] std::io::Error),

    #[error("invalid caption font: {0}")]
    Font(String),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct CardConfig {
    /// TrueType/OpenType font; the bundled serif when `None`.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub padding: u32,
    pub line_spacing: u32,
    /// Share of the picture width the caption may occupy.
    pub max_width_ratio: f32,
    pub max_lines: usize,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 40.0,
            padding: 20,
            line_spacing: 4,
            max_width_ratio: 0.9,
            max_lines: 2,
        }
    }
}

impl CardConfig {
    /// Load card configuration from environment variables.
    ///
    /// | Env var              | Default        |
    /// |----------------------|----------------|
    /// | `CAPTION_FONT_PATH`  | bundled serif  |
    /// | `CAPTION_FONT_SIZE`  | `40`           |
    /// | `CAPTION_MAX_LINES`  | `2`            |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            font_path: std::env::var("CAPTION_FONT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            font_size: env_parse("CAPTION_FONT_SIZE", defaults.font_size),
            max_lines: env_parse("CAPTION_MAX_LINES", defaults.max_lines),
            ..defaults
        }
    }
}

/// Renders captioned cards. Font parsing happens once, in [`CardRenderer::new`].
#[derive(Clone, Debug)]
pub struct CardRenderer {
    font: FontArc,
    config: CardConfig,
}

impl CardRenderer {
    pub fn new(config: CardConfig) -> Result<Self, CardError> {
        let font = match &config.font_path {
            Some(path) => FontArc::try_from_vec(std::fs::read(path)?),
            None => FontArc::try_from_slice(BUNDLED_FONT),
        }
        .map_err(|e| CardError::Font(e.to_string()))?;
        Ok(Self { font, config })
    }

    /// Decode `picture` (any supported format), append the caption band and
    /// encode the result as PNG.
    pub fn render(&self, picture: &[u8], caption: &str) -> Result<Vec<u8>, CardError> {
        let picture = image::load_from_memory(picture)?.to_rgb8();
        let (width, height) = picture.dimensions();

        let lines = self.wrap(caption, width);
        let line_height = self.config.font_size.round() as u32 + self.config.line_spacing;
        let band_height = lines.len() as u32 * line_height + self.config.padding * 2;

        let mut card = RgbImage::from_pixel(width, height + band_height, BAND);
        imageops::replace(&mut card, &picture, 0, 0);

        let scale = self.scale();
        for (i, line) in lines.iter().enumerate() {
            let (line_width, _) = text_size(scale, &self.font, line);
            let x = (width as i32 - line_width as i32) / 2;
            let y = (height + self.config.padding + i as u32 * line_height) as i32;
            draw_text_mut(&mut card, INK, x, y, scale, &self.font, line);
        }

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(card).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    /// Greedy word wrap to the configured share of `width`.
    ///
    /// A single word wider than the limit gets a line of its own. Past
    /// `max_lines` the text is cut and the last kept line ends in `...`.
    pub fn wrap(&self, caption: &str, width: u32) -> Vec<String> {
        let max_width = (width as f32 * self.config.max_width_ratio) as u32;
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in caption.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if self.measure(&candidate) <= max_width {
                current = candidate;
            } else if current.is_empty() {
                lines.push(word.to_string());
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }

        if lines.len() > self.config.max_lines {
            lines.truncate(self.config.max_lines);
            if let Some(last) = lines.last_mut() {
                *last = self.with_ellipsis(last, max_width);
            }
        }
        lines
    }

    /// Drop trailing words from `line` until it fits with `...` appended.
    fn with_ellipsis(&self, line: &str, max_width: u32) -> String {
        let mut words: Vec<&str> = line.split_whitespace().collect();
        loop {
            let candidate = format!("{}{ELLIPSIS}", words.join(" "));
            if words.len() <= 1 || self.measure(&candidate) <= max_width {
                return candidate;
            }
            words.pop();
        }
    }

    fn measure(&self, text: &str) -> u32 {
        text_size(self.scale(), &self.font, text).0
    }

    fn scale(&self) -> PxScale {
        PxScale::from(self.config.font_size)
    }
}
