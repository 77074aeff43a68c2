use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{debug, warn};

use super::layout::{BOLD_GRID_EVERY, FINE_GRID_MM, StripLayout};
use crate::error::EngineError;
use crate::model::{Signal, SignalId};

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const FINE_LINE: Rgb<u8> = Rgb([255, 230, 230]);
const BOLD_LINE: Rgb<u8> = Rgb([255, 179, 179]);
const TRACE: Rgb<u8> = Rgb([0, 0, 0]);

/// Measured extent of a rendered strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StripGeometry {
    pub row_count: usize,
    pub row_width_mm: f64,
    pub row_height_mm: f64,
    pub trace_length_mm: f64,
    pub px_per_mm: f64,
    pub width_px: u32,
    pub height_px: u32,
    /// Finite samples that made it onto the page.
    pub samples_drawn: usize,
}

/// A drawn strip.
#[derive(Debug, Clone)]
pub struct RenderedStrip {
    pub signal_id: SignalId,
    pub image: RgbImage,
    pub geometry: StripGeometry,
}

impl RenderedStrip {
    /// Encode as PNG, with the layout's resolution in a `pHYs` chunk.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Render`] if encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>, EngineError> {
        let mut out = Vec::new();
        self.write_png(&mut out)?;
        Ok(out)
    }

    /// Write the strip to `path` as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Render`] if encoding or writing fails.
    pub fn save_png(&self, path: &Path) -> Result<(), EngineError> {
        let file = File::create(path).map_err(png::EncodingError::from)?;
        self.write_png(BufWriter::new(file))?;
        Ok(())
    }

    /// Pixels per metre, as PNG stores physical resolution.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixels_per_meter(&self) -> u32 {
        (self.geometry.px_per_mm * 1000.0).round() as u32
    }

    fn write_png<W: Write>(&self, writer: W) -> Result<(), png::EncodingError> {
        let mut encoder = png::Encoder::new(writer, self.image.width(), self.image.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let ppm = self.pixels_per_meter();
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header()?;
        writer.write_image_data(self.image.as_raw())?;
        writer.finish()
    }
}

/// What rendering produced.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Rendered(RenderedStrip),
    /// The signal has no finite samples to draw.
    Empty { signal_id: SignalId },
}

impl RenderOutcome {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    #[must_use]
    pub fn into_strip(self) -> Option<RenderedStrip> {
        match self {
            Self::Rendered(strip) => Some(strip),
            Self::Empty { .. } => None,
        }
    }
}

/// Draws signals on clinically scaled ECG paper.
#[derive(Debug, Clone, Copy)]
pub struct StripRenderer {
    layout: StripLayout,
}

impl StripRenderer {
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an invalid layout.
    pub fn new(layout: StripLayout) -> Result<Self, EngineError> {
        layout.validate()?;
        Ok(Self { layout })
    }

    #[must_use]
    pub const fn layout(&self) -> &StripLayout {
        &self.layout
    }

    /// Render the first `total_seconds` of the signal's finite samples.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] when the signal's sampling
    /// rate is not a positive number.
    pub fn render(&self, signal: &Signal) -> Result<RenderOutcome, EngineError> {
        let rate = signal.sampling_rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::config(format!(
                "signal {} has invalid sampling rate {rate}",
                signal.id
            )));
        }

        let limit = self.layout.sample_limit(rate);
        let samples: Vec<f64> = signal.finite_samples().take(limit).collect();
        if samples.is_empty() {
            warn!(signal_id = %signal.id, "signal has no finite samples to render");
            return Ok(RenderOutcome::Empty {
                signal_id: signal.id,
            });
        }

        let geometry = self.geometry(samples.len());
        let mut image = RgbImage::from_pixel(geometry.width_px, geometry.height_px, PAPER);
        for row in 0..geometry.row_count {
            self.draw_grid(&mut image, row);
            self.draw_trace(&mut image, row, &samples, rate);
        }

        debug!(
            signal_id = %signal.id,
            samples = samples.len(),
            width = geometry.width_px,
            height = geometry.height_px,
            "rendered strip"
        );
        Ok(RenderOutcome::Rendered(RenderedStrip {
            signal_id: signal.id,
            image,
            geometry,
        }))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn geometry(&self, samples_drawn: usize) -> StripGeometry {
        let l = &self.layout;
        let px_per_mm = l.px_per_mm();
        StripGeometry {
            row_count: l.row_count(),
            row_width_mm: l.row_width_mm(),
            row_height_mm: l.row_height_mm(),
            trace_length_mm: l.trace_length_mm(),
            px_per_mm,
            width_px: (l.row_width_mm() * px_per_mm).round().max(1.0) as u32,
            height_px: (l.page_height_mm() * px_per_mm).round().max(1.0) as u32,
            samples_drawn,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn px(&self, mm: f64) -> f32 {
        (mm * self.layout.px_per_mm()) as f32
    }

    /// Fine lines every millimetre, bold every fifth, the horizontal set
    /// anchored on the row's zero line.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn draw_grid(&self, image: &mut RgbImage, row: usize) {
        let l = &self.layout;
        let top = l.row_top_mm(row);
        let height = l.row_height_mm();
        let center = top + height / 2.0;

        let columns = (l.row_width_mm() / FINE_GRID_MM).floor() as usize;
        let half_rows = (height / 2.0 / FINE_GRID_MM).floor() as usize;

        for bold in [false, true] {
            let color = if bold { BOLD_LINE } else { FINE_LINE };
            for k in (0..=columns).filter(|k| (k % BOLD_GRID_EVERY == 0) == bold) {
                let x = k as f64 * FINE_GRID_MM;
                self.fill_line(image, (x, top), (x, top + height), bold, color);
            }
            for k in (0..=half_rows).filter(|k| (k % BOLD_GRID_EVERY == 0) == bold) {
                let dy = k as f64 * FINE_GRID_MM;
                for y in [center - dy, center + dy] {
                    self.fill_line(image, (0.0, y), (l.row_width_mm(), y), bold, color);
                }
            }
        }
    }

    /// Axis-aligned grid line, 1 px fine or 2 px bold, clipped to the image.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn fill_line(
        &self,
        image: &mut RgbImage,
        from: (f64, f64),
        to: (f64, f64),
        bold: bool,
        color: Rgb<u8>,
    ) {
        let thickness: u32 = if bold { 2 } else { 1 };
        let x0 = self.px(from.0).round() as i32;
        let y0 = self.px(from.1).round() as i32;
        let x1 = self.px(to.0).round() as i32;
        let y1 = self.px(to.1).round() as i32;

        let (w, h) = if x0 == x1 {
            (thickness, (y1 - y0).unsigned_abs().max(1))
        } else {
            ((x1 - x0).unsigned_abs().max(1), thickness)
        };
        let x = x0.min(image.width() as i32 - w as i32).max(0);
        let y = y0.min(image.height() as i32 - h as i32).max(0);
        draw_filled_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
    }

    #[allow(clippy::cast_precision_loss)]
    fn draw_trace(&self, image: &mut RgbImage, row: usize, samples: &[f64], rate: f64) {
        let l = &self.layout;
        let range = l.row_samples(row, rate);
        if range.start >= samples.len() {
            return;
        }
        let end = range.end.min(samples.len());
        let center = l.row_top_mm(row) + l.row_height_mm() / 2.0;

        let point = |i: usize| -> (f32, f32) {
            let seconds = (i - range.start) as f64 / rate;
            let x = seconds * l.mm_per_second;
            let y = center - l.clamp_mv(samples[i]) * l.mm_per_millivolt;
            (self.px(x), self.px(y))
        };

        let mut prev = point(range.start);
        if end - range.start == 1 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (x, y) = (prev.0.round() as u32, prev.1.round() as u32);
            if x < image.width() && y < image.height() {
                image.put_pixel(x, y, TRACE);
            }
            return;
        }
        for i in range.start + 1..end {
            let next = point(i);
            draw_line_segment_mut(image, prev, next, TRACE);
            prev = next;
        }
    }
}

/// Render with a one-off layout.
///
/// # Errors
///
/// See [`StripRenderer::new`] and [`StripRenderer::render`].
pub fn render(signal: &Signal, layout: &StripLayout) -> Result<RenderOutcome, EngineError> {
    StripRenderer::new(*layout)?.render(signal)
}
