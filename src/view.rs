//! Viewport transform between screen space and image space.
//!
//! The displayed bitmap is the image scaled by `zoom`, optionally rotated by a
//! display-only preview angle, centred in the viewport and shifted by the pan
//! offset. Every mapping in this module is derived from that single model so
//! screen -> image -> screen conversions stay consistent.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ZOOM, MIN_ZOOM, ROTATION_EPSILON, ZOOM_EPSILON, ZOOM_STEP};
use crate::geometry::{PixelPoint, PixelRect, Point, ScreenRect, Size};

/// Zoom behaviour of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Smallest allowed zoom factor
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f32,
    /// Largest allowed zoom factor
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f32,
    /// Relative change of one zoom-in/zoom-out step
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,
    /// Zoom changes smaller than this are ignored
    #[serde(default = "default_zoom_epsilon")]
    pub zoom_epsilon: f32,
}

fn default_min_zoom() -> f32 {
    MIN_ZOOM
}

fn default_max_zoom() -> f32 {
    MAX_ZOOM
}

fn default_zoom_step() -> f32 {
    ZOOM_STEP
}

fn default_zoom_epsilon() -> f32 {
    ZOOM_EPSILON
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            zoom_epsilon: default_zoom_epsilon(),
        }
    }
}

impl ViewConfig {
    /// Check that the limits describe a usable zoom range.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return Err(format!("min_zoom must be positive, got {}", self.min_zoom));
        }
        if !(self.max_zoom.is_finite() && self.max_zoom >= self.min_zoom) {
            return Err(format!(
                "max_zoom must be >= min_zoom ({}), got {}",
                self.min_zoom, self.max_zoom
            ));
        }
        if !(self.zoom_step > 0.0 && self.zoom_step < 1.0) {
            return Err(format!("zoom_step must be in (0, 1), got {}", self.zoom_step));
        }
        if self.zoom_epsilon.is_nan() || self.zoom_epsilon < 0.0 {
            return Err(format!(
                "zoom_epsilon must be non-negative, got {}",
                self.zoom_epsilon
            ));
        }
        Ok(())
    }
}

/// Represents zoom/pan/preview-rotation state of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    /// Display-only rotation in degrees, clockwise
    pub preview_rotation: f32,
}

impl ViewState {
    /// Create an identity state (zoom=1, no pan, no rotation).
    pub fn identity() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            preview_rotation: 0.0,
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::identity()
    }
}

/// Maps pointer coordinates to image pixels and back.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransform {
    state: ViewState,
    viewport: Size,
    image_size: Option<(u32, u32)>,
    config: ViewConfig,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}

impl ViewTransform {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            state: ViewState::identity(),
            viewport: Size::default(),
            image_size: None,
            config,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn zoom(&self) -> f32 {
        self.state.zoom
    }

    pub fn pan(&self) -> (f32, f32) {
        (self.state.pan_x, self.state.pan_y)
    }

    pub fn preview_rotation(&self) -> f32 {
        self.state.preview_rotation
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Zoom as a whole percentage for status display.
    pub fn zoom_percent(&self) -> u32 {
        (self.state.zoom * 100.0).round() as u32
    }

    /// Set the size of the drawing surface the image is shown in.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Set (or clear) the dimensions of the displayed image.
    ///
    /// View state is left alone; callers that load a new image also call
    /// [`reset`](Self::reset).
    pub fn set_image_size(&mut self, size: Option<(u32, u32)>) {
        self.image_size = size.filter(|&(w, h)| w > 0 && h > 0);
    }

    /// Back to zoom 1, no pan, no preview rotation.
    pub fn reset(&mut self) {
        self.state = ViewState::identity();
    }

    /// Size of the image after zoom, before preview rotation.
    pub fn scaled_size(&self) -> Option<Size> {
        let (w, h) = self.image_size?;
        Some(Size::new(
            w as f32 * self.state.zoom,
            h as f32 * self.state.zoom,
        ))
    }

    /// On-screen size of the displayed bitmap (bounding box when rotated).
    pub fn displayed_size(&self) -> Option<Size> {
        let scaled = self.scaled_size()?;
        match self.rotation() {
            None => Some(scaled),
            Some((sin, cos)) => Some(Size::new(
                (scaled.width * cos).abs() + (scaled.height * sin).abs(),
                (scaled.width * sin).abs() + (scaled.height * cos).abs(),
            )),
        }
    }

    /// On-screen box of the displayed bitmap.
    ///
    /// Top-left is `(viewport - displayed) / 2 + pan`.
    pub fn displayed_bounds(&self) -> Option<ScreenRect> {
        let displayed = self.displayed_size()?;
        Some(ScreenRect::new(
            (self.viewport.width - displayed.width) / 2.0 + self.state.pan_x,
            (self.viewport.height - displayed.height) / 2.0 + self.state.pan_y,
            displayed.width,
            displayed.height,
        ))
    }

    /// Screen position of the bitmap centre. Rotation pivots around it.
    fn center(&self) -> Point {
        Point::new(
            self.viewport.width / 2.0 + self.state.pan_x,
            self.viewport.height / 2.0 + self.state.pan_y,
        )
    }

    /// `(sin, cos)` of the preview rotation, or `None` when it is negligible.
    fn rotation(&self) -> Option<(f32, f32)> {
        let deg = self.state.preview_rotation % 360.0;
        if deg.abs() < ROTATION_EPSILON {
            return None;
        }
        Some(deg.to_radians().sin_cos())
    }

    /// Unrounded image-space position of a screen point.
    fn image_point_f(&self, p: Point) -> Option<(f32, f32)> {
        let (w, h) = self.image_size?;
        let c = self.center();
        let (mut rx, mut ry) = (p.x - c.x, p.y - c.y);
        if let Some((sin, cos)) = self.rotation() {
            // Undo the clockwise display rotation.
            let x = rx * cos + ry * sin;
            let y = -rx * sin + ry * cos;
            rx = x;
            ry = y;
        }
        Some((
            rx / self.state.zoom + w as f32 / 2.0,
            ry / self.state.zoom + h as f32 / 2.0,
        ))
    }

    /// Screen position of an (unrounded) image-space point.
    pub fn image_to_screen(&self, x: f32, y: f32) -> Option<Point> {
        let (w, h) = self.image_size?;
        let mut rx = (x - w as f32 / 2.0) * self.state.zoom;
        let mut ry = (y - h as f32 / 2.0) * self.state.zoom;
        if let Some((sin, cos)) = self.rotation() {
            let sx = rx * cos - ry * sin;
            let sy = rx * sin + ry * cos;
            rx = sx;
            ry = sy;
        }
        let c = self.center();
        Some(Point::new(c.x + rx, c.y + ry))
    }

    /// Convert a screen point to the image pixel under it.
    ///
    /// Points outside the displayed bitmap still resolve to the nearest edge
    /// pixel so drags that start off the image are usable.
    pub fn screen_to_image(&self, p: Point) -> Option<PixelPoint> {
        let (w, h) = self.image_size?;
        let (x, y) = self.image_point_f(p)?;
        Some(PixelPoint::new(
            clamp_round(x, (w - 1) as f32),
            clamp_round(y, (h - 1) as f32),
        ))
    }

    /// Convert a screen rectangle to the image rectangle it covers.
    ///
    /// Corners are rounded independently, clamped into the image, and the
    /// result is at least one pixel in each direction.
    pub fn screen_rect_to_image_rect(&self, r: ScreenRect) -> Option<PixelRect> {
        let (w, h) = self.image_size?;
        let corners: Vec<Point> = if self.rotation().is_some() {
            vec![
                r.top_left(),
                Point::new(r.right(), r.y),
                r.bottom_right(),
                Point::new(r.x, r.bottom()),
            ]
        } else {
            vec![r.top_left(), r.bottom_right()]
        };
        let mapped: Vec<Point> = corners
            .into_iter()
            .filter_map(|c| self.image_point_f(c))
            .map(|(x, y)| Point::new(x, y))
            .collect();
        let bounds = ScreenRect::bounding(&mapped)?;

        let left = clamp_round(bounds.x, (w - 1) as f32);
        let top = clamp_round(bounds.y, (h - 1) as f32);
        let right = clamp_round(bounds.right(), w as f32).max(left + 1);
        let bottom = clamp_round(bounds.bottom(), h as f32).max(top + 1);
        Some(PixelRect::new(left, top, right - left, bottom - top))
    }

    /// Convert an image rectangle to the screen rectangle it is drawn at.
    ///
    /// Inverse of [`screen_rect_to_image_rect`](Self::screen_rect_to_image_rect)
    /// for rectangle corners. Under a preview rotation the axis-aligned
    /// bounding box of the rotated rectangle is returned.
    pub fn image_to_screen_rect(&self, r: PixelRect) -> Option<ScreenRect> {
        let (l, t) = (r.left as f32, r.top as f32);
        let (rr, b) = (r.right() as f32, r.bottom() as f32);
        let corners: Vec<(f32, f32)> = if self.rotation().is_some() {
            vec![(l, t), (rr, t), (rr, b), (l, b)]
        } else {
            vec![(l, t), (rr, b)]
        };
        let mapped = corners
            .into_iter()
            .map(|(x, y)| self.image_to_screen(x, y))
            .collect::<Option<Vec<_>>>()?;
        ScreenRect::bounding(&mapped)
    }

    /// Zoom so the image point under `pivot` stays under `pivot`.
    ///
    /// The pivot's position relative to the bitmap centre is scaled by
    /// `new_zoom / zoom`; the pan is then whatever puts the centre back in
    /// place. This is independent of the preview rotation.
    ///
    /// Returns `false` when nothing changed: no image, or a request that would
    /// move the clamped zoom by less than the configured epsilon.
    pub fn zoom_at(&mut self, pivot: Point, new_zoom: f32) -> bool {
        if self.image_size.is_none() || !new_zoom.is_finite() {
            return false;
        }
        let new_zoom = new_zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        let old_zoom = self.state.zoom;
        if (new_zoom - old_zoom).abs() < self.config.zoom_epsilon {
            return false;
        }

        let c = self.center();
        let ratio = new_zoom / old_zoom;
        let new_cx = pivot.x - (pivot.x - c.x) * ratio;
        let new_cy = pivot.y - (pivot.y - c.y) * ratio;

        self.state.zoom = new_zoom;
        self.state.pan_x = new_cx - self.viewport.width / 2.0;
        self.state.pan_y = new_cy - self.viewport.height / 2.0;
        log::debug!(
            "Zoom {:.3} -> {:.3} at ({:.1}, {:.1}), pan ({:.1}, {:.1})",
            old_zoom,
            new_zoom,
            pivot.x,
            pivot.y,
            self.state.pan_x,
            self.state.pan_y
        );
        true
    }

    /// Zoom in by one step about `pivot`.
    pub fn zoom_in(&mut self, pivot: Point) -> bool {
        let target = self.state.zoom * (1.0 + self.config.zoom_step);
        self.zoom_at(pivot, target)
    }

    /// Zoom out by one step about `pivot`.
    pub fn zoom_out(&mut self, pivot: Point) -> bool {
        let target = self.state.zoom * (1.0 - self.config.zoom_step);
        self.zoom_at(pivot, target)
    }

    /// Zoom about the viewport centre.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let pivot = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.zoom_at(pivot, zoom)
    }

    /// Apply a pan delta.
    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        if self.image_size.is_none() || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        self.state.pan_x += dx;
        self.state.pan_y += dy;
        true
    }

    /// Set the display-only rotation in degrees (clockwise).
    pub fn set_preview_rotation(&mut self, degrees: f32) -> bool {
        if !degrees.is_finite() || degrees == self.state.preview_rotation {
            return false;
        }
        self.state.preview_rotation = degrees;
        true
    }
}

/// Round `v` to the nearest integer and clamp it into `[0, max]`.
fn clamp_round(v: f32, max: f32) -> u32 {
    v.round().clamp(0.0, max.max(0.0)) as u32
}
