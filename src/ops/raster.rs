//! `image`/`imageproc` implementation of the edit operations.
//!
//! Every result is RGB8, whatever the input format was.

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

use super::{
    ImageOperations, WatermarkParams, WatermarkPosition, rotated_size, scaled_size,
    within_pixel_limit,
};
use crate::constants::{
    MAX_BLUR_RADIUS, MAX_OUTPUT_PIXELS, MAX_WATERMARK_SIZE, SEPIA_TONE, WATERMARK_MARGIN,
};
use crate::error::OperationError;
use crate::geometry::PixelRect;
use crate::image::Image;

/// Angles within this many degrees of a quarter turn use the lossless path.
const QUARTER_TURN_EPSILON: f32 = 0.01;

/// Pixel operations backed by the `image` and `imageproc` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterOperations;

impl RasterOperations {
    pub fn new() -> Self {
        Self
    }
}

impl ImageOperations for RasterOperations {
    fn scale(&self, image: &Image, factor: f32) -> Result<Image, OperationError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(OperationError::invalid_geometry(format!(
                "cannot scale by {factor}"
            )));
        }
        let (w, h) = image.dimensions();
        let (new_w, new_h) = scaled_size(w, h, factor);
        check_pixel_limit(new_w, new_h)?;
        let (new_w, new_h) = (new_w as u32, new_h as u32);
        log::debug!("Scale {}x{} -> {}x{}", w, h, new_w, new_h);
        let resized = imageops::resize(&image.to_rgb8(), new_w, new_h, FilterType::Lanczos3);
        Ok(Image::from(resized))
    }

    fn rotate(&self, image: &Image, degrees: f32) -> Result<Image, OperationError> {
        if !degrees.is_finite() {
            return Err(OperationError::invalid_geometry(format!(
                "cannot rotate by {degrees} degrees"
            )));
        }
        let normalized = degrees.rem_euclid(360.0);
        let near = |target: f32| (normalized - target).abs() < QUARTER_TURN_EPSILON;

        let rgb = image.to_rgb8();

        // Fast-path for exact multiples of 90 (lossless).
        if near(0.0) || near(360.0) {
            return Ok(Image::from(rgb));
        }
        if near(90.0) {
            return Ok(Image::from(imageops::rotate90(&rgb)));
        }
        if near(180.0) {
            return Ok(Image::from(imageops::rotate180(&rgb)));
        }
        if near(270.0) {
            return Ok(Image::from(imageops::rotate270(&rgb)));
        }

        // Grow the canvas to the rotated bounding box, then rotate in place.
        let (w, h) = rgb.dimensions();
        let (new_w, new_h) = rotated_size(w, h, degrees);
        let (canvas_w, canvas_h) = (new_w.max(w as u64), new_h.max(h as u64));
        check_pixel_limit(canvas_w, canvas_h)?;
        let (new_w, new_h) = (new_w as u32, new_h as u32);
        let mut canvas = RgbImage::new(canvas_w as u32, canvas_h as u32);
        let offset_x = (canvas.width() - w) / 2;
        let offset_y = (canvas.height() - h) / 2;
        imageops::overlay(&mut canvas, &rgb, offset_x as i64, offset_y as i64);
        let rotated = rotate_about_center(
            &canvas,
            degrees.to_radians(),
            Interpolation::Bicubic,
            Rgb([0, 0, 0]),
        );

        // The canvas can be wider or taller than the rotated bounding box.
        let crop_x = (rotated.width() - new_w) / 2;
        let crop_y = (rotated.height() - new_h) / 2;
        let result = imageops::crop_imm(&rotated, crop_x, crop_y, new_w, new_h).to_image();
        log::debug!("Rotate {}° {}x{} -> {}x{}", degrees, w, h, new_w, new_h);
        Ok(Image::from(result))
    }

    fn crop(&self, image: &Image, rect: PixelRect) -> Result<Image, OperationError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(OperationError::invalid_geometry("cannot crop an empty image"));
        }
        let r = rect.clamped_to(w, h);
        log::debug!("Crop {:?} (requested {:?})", r, rect);
        let cropped = image.pixels().crop_imm(r.left, r.top, r.width, r.height);
        Ok(Image::from(cropped.to_rgb8()))
    }

    fn watermark(&self, image: &Image, params: &WatermarkParams) -> Result<Image, OperationError> {
        if !(params.size.is_finite() && params.size > 0.0 && params.size <= MAX_WATERMARK_SIZE) {
            return Err(OperationError::invalid_geometry(format!(
                "watermark size {} is out of range",
                params.size
            )));
        }
        let font_data = params
            .font
            .as_ref()
            .ok_or(OperationError::FontUnavailable)?;
        let font = FontArc::try_from_vec(font_data.bytes().to_vec())
            .map_err(|e| OperationError::InvalidFont(e.to_string()))?;

        let mut base = image.to_rgb8();
        let (w, h) = base.dimensions();
        let scale = PxScale::from(params.size);
        let (text_w, text_h) = text_size(scale, &font, &params.text);
        let (x, y) = watermark_origin(params.position, (w, h), (text_w, text_h));

        let alpha = (255.0 * params.opacity.clamp(0.0, 1.0)) as u8;
        let mut layer = RgbaImage::new(w, h);
        draw_text_mut(
            &mut layer,
            Rgba([255, 255, 255, alpha]),
            x,
            y,
            scale,
            &font,
            &params.text,
        );

        // White text: blend each pixel towards white by the layer coverage.
        for (dst, src) in base.pixels_mut().zip(layer.pixels()) {
            let a = src.0[3] as u32;
            if a == 0 {
                continue;
            }
            for c in dst.0.iter_mut() {
                let v = *c as u32;
                *c = ((v * (255 - a) + 255 * a + 127) / 255) as u8;
            }
        }
        log::debug!("Watermark \"{}\" at ({}, {})", params.text, x, y);
        Ok(Image::from(base))
    }

    fn grayscale(&self, image: &Image) -> Result<Image, OperationError> {
        let luma = image.pixels().to_luma8();
        Ok(Image::from(DynamicImage::ImageLuma8(luma).to_rgb8()))
    }

    fn blur(&self, image: &Image, radius: f32) -> Result<Image, OperationError> {
        if !(radius.is_finite() && radius <= MAX_BLUR_RADIUS) {
            return Err(OperationError::invalid_geometry(format!(
                "blur radius {radius} is out of range"
            )));
        }
        let rgb = image.to_rgb8();
        // imageproc requires a positive sigma
        if radius <= 0.0 {
            return Ok(Image::from(rgb));
        }
        Ok(Image::from(gaussian_blur_f32(&rgb, radius)))
    }

    fn vintage(&self, image: &Image) -> Result<Image, OperationError> {
        let mut rgb = image.to_rgb8();
        let luma = image.pixels().to_luma8();
        for (px, l) in rgb.pixels_mut().zip(luma.pixels()) {
            let l = l.0[0] as u32;
            for (c, tone) in px.0.iter_mut().zip(SEPIA_TONE) {
                // Colorize black -> sepia, then blend 50/50 with the original.
                let tinted = tone as u32 * l / 255;
                *c = ((*c as u32 + tinted + 1) / 2) as u8;
            }
        }
        Ok(Image::from(rgb))
    }
}

fn check_pixel_limit(width: u64, height: u64) -> Result<(), OperationError> {
    if within_pixel_limit(width, height) {
        Ok(())
    } else {
        Err(OperationError::invalid_geometry(format!(
            "{width}x{height} result exceeds the {MAX_OUTPUT_PIXELS} pixel limit"
        )))
    }
}

/// Top-left corner of the text box for a watermark position.
fn watermark_origin(
    position: WatermarkPosition,
    (img_w, img_h): (u32, u32),
    (text_w, text_h): (u32, u32),
) -> (i32, i32) {
    let (iw, ih) = (img_w as i32, img_h as i32);
    let (tw, th) = (text_w as i32, text_h as i32);
    let m = WATERMARK_MARGIN as i32;
    match position {
        WatermarkPosition::BottomRight => (iw - tw - m, ih - th - m),
        WatermarkPosition::BottomLeft => (m, ih - th - m),
        WatermarkPosition::TopLeft => (m, m),
        WatermarkPosition::TopRight => (iw - tw - m, m),
        WatermarkPosition::Center => ((iw - tw) / 2, (ih - th) / 2),
        WatermarkPosition::Custom { x, y } => (
            (x as i32).min(iw - tw).max(0),
            (y as i32).min(ih - th).max(0),
        ),
    }
}
