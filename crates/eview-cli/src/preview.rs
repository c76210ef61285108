//! Image preview drawn with half-block cells.
//!
//! Each terminal cell shows two vertically stacked pixels: the upper one as
//! the foreground of `▀`, the lower one as the background.

use eview::{Display, DisplayError};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use std::path::{Path, PathBuf};

const UPPER_HALF: &str = "▀";

#[derive(Default)]
pub struct PreviewPane {
    current: Option<PathBuf>,
    image: Option<RgbaImage>,
}

impl PreviewPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Draw the image centered in `area`, scaled to fit.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.image else {
            return;
        };
        let (width, height) = fit(
            image.dimensions(),
            (u32::from(area.width), u32::from(area.height) * 2),
        );
        if width == 0 || height == 0 {
            return;
        }
        let scaled = image::imageops::resize(image, width, height, FilterType::Triangle);
        let rows = height.div_ceil(2);
        let left = area.x + to_u16((u32::from(area.width) - width) / 2);
        let top = area.y + to_u16((u32::from(area.height) - rows) / 2);

        for row in 0..rows {
            for column in 0..width {
                let Some(cell) = buf.cell_mut((left + to_u16(column), top + to_u16(row))) else {
                    continue;
                };
                let upper = scaled.get_pixel_checked(column, row * 2).map(color);
                let lower = scaled.get_pixel_checked(column, row * 2 + 1).map(color);
                cell.set_symbol(UPPER_HALF)
                    .set_fg(upper.unwrap_or(Color::Reset))
                    .set_bg(lower.unwrap_or(Color::Reset));
            }
        }
    }
}

impl Display for PreviewPane {
    fn show(&mut self, path: &Path) -> Result<(), DisplayError> {
        let decoded = image::open(path).map_err(|err| DisplayError::new(path, err.to_string()))?;
        self.image = Some(decoded.to_rgba8());
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn clear(&mut self) {
        self.image = None;
        self.current = None;
    }

    fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

/// Largest size with the image's aspect ratio that fits in `bounds`.
fn fit((width, height): (u32, u32), (max_width, max_height): (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return (0, 0);
    }
    let scaled_height = height * max_width / width;
    if scaled_height <= max_height {
        (max_width, scaled_height.max(1))
    } else {
        ((width * max_height / height).max(1), max_height)
    }
}

/// Composite over black; terminals have no alpha.
fn color(pixel: &Rgba<u8>) -> Color {
    let [r, g, b, a] = pixel.0;
    let blend = |channel: u8| {
        let value = u16::from(channel) * u16::from(a) / 255;
        u8::try_from(value).unwrap_or(u8::MAX)
    };
    Color::Rgb(blend(r), blend(g), blend(b))
}

fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
