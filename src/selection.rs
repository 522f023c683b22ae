//! Rectangle and point selection on top of the viewport.
//!
//! Drags are tracked in screen space so the overlay follows the pointer
//! exactly; the committed result is always an image-space [`PixelRect`]
//! clamped to the image. With an aspect lock the committed rectangle is refit
//! in whole pixels so its ratio holds within [`ASPECT_TOLERANCE`].

use serde::{Deserialize, Serialize};

use crate::constants::{ASPECT_TOLERANCE, MIN_SELECTION_SIZE};
use crate::error::{EditError, EditResult};
use crate::geometry::{PixelPoint, PixelRect, Point, ScreenRect};
use crate::view::ViewTransform;

/// Aspect ratio presets offered for cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectPreset {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "3:2")]
    Photo,
    #[serde(rename = "21:9")]
    Cinema,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "2:3")]
    PortraitPhoto,
}

impl AspectPreset {
    pub fn name(&self) -> &'static str {
        match self {
            AspectPreset::Free => "Free",
            AspectPreset::Square => "1:1",
            AspectPreset::Standard => "4:3",
            AspectPreset::Widescreen => "16:9",
            AspectPreset::Photo => "3:2",
            AspectPreset::Cinema => "21:9",
            AspectPreset::Vertical => "9:16",
            AspectPreset::PortraitPhoto => "2:3",
        }
    }

    /// Width / height, or `None` for a free selection.
    pub fn ratio(&self) -> Option<f32> {
        let (w, h) = match self {
            AspectPreset::Free => return None,
            AspectPreset::Square => (1.0, 1.0),
            AspectPreset::Standard => (4.0, 3.0),
            AspectPreset::Widescreen => (16.0, 9.0),
            AspectPreset::Photo => (3.0, 2.0),
            AspectPreset::Cinema => (21.0, 9.0),
            AspectPreset::Vertical => (9.0, 16.0),
            AspectPreset::PortraitPhoto => (2.0, 3.0),
        };
        Some(w / h)
    }

    /// All presets in menu order.
    pub fn all() -> &'static [AspectPreset] {
        &[
            AspectPreset::Free,
            AspectPreset::Square,
            AspectPreset::Standard,
            AspectPreset::Widescreen,
            AspectPreset::Photo,
            AspectPreset::Cinema,
            AspectPreset::Vertical,
            AspectPreset::PortraitPhoto,
        ]
    }
}

/// Selection behaviour settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Smallest committed rectangle, in image pixels per side
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    /// Aspect lock applied when a session starts
    #[serde(default)]
    pub default_aspect: AspectPreset,
}

fn default_min_size() -> u32 {
    MIN_SELECTION_SIZE
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            default_aspect: AspectPreset::default(),
        }
    }
}

/// What a press on the image does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Press-drag-release selects a rectangle
    #[default]
    Region,
    /// A press selects a single pixel
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    origin: Point,
    end: Point,
}

/// In-progress and committed selection state.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionModel {
    mode: SelectionMode,
    aspect: Option<f32>,
    drag: Option<Drag>,
    committed: Option<PixelRect>,
    point: Option<PixelPoint>,
    config: SelectionConfig,
}

impl Default for SelectionModel {
    fn default() -> Self {
        Self::new(SelectionConfig::default())
    }
}

impl SelectionModel {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            mode: SelectionMode::Region,
            aspect: config.default_aspect.ratio(),
            drag: None,
            committed: None,
            point: None,
            config,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn aspect_ratio(&self) -> Option<f32> {
        self.aspect
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The last committed rectangle in image pixels.
    pub fn committed(&self) -> Option<PixelRect> {
        self.committed
    }

    /// The last selected pixel in point mode.
    pub fn point(&self) -> Option<PixelPoint> {
        self.point
    }

    /// Switch between region and point selection. Clears any selection.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        if self.mode != mode {
            log::debug!("Selection mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.clear();
        }
    }

    /// Drop in-progress and committed state.
    pub fn clear(&mut self) {
        self.drag = None;
        self.committed = None;
        self.point = None;
    }

    /// Abort an in-progress drag. The previous committed rectangle stays.
    pub fn cancel(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Lock (or unlock with `None`) the width/height ratio.
    ///
    /// An existing committed rectangle is refit about its centre. If it can
    /// no longer satisfy the minimum size it is dropped.
    pub fn set_aspect_ratio(
        &mut self,
        ratio: Option<f32>,
        view: &ViewTransform,
    ) -> EditResult<()> {
        if let Some(a) = ratio.filter(|a| !(a.is_finite() && *a > 0.0)) {
            return Err(EditError::invalid_input(format!(
                "aspect ratio must be a positive number, got {a}"
            )));
        }
        self.aspect = ratio;

        let (Some(a), Some(rect), Some((w, h))) = (ratio, self.committed, view.image_size()) else {
            return Ok(());
        };
        self.committed = self.refit_centered(rect, a, w, h);
        log::debug!("Aspect {:?}: selection refit to {:?}", ratio, self.committed);
        Ok(())
    }

    /// Start a rectangle drag at a screen position.
    pub fn begin_drag(&mut self, screen: Point) -> bool {
        if self.mode != SelectionMode::Region {
            return false;
        }
        self.drag = Some(Drag {
            origin: screen,
            end: screen,
        });
        true
    }

    /// Move the far corner of the drag.
    ///
    /// With an aspect lock the corner is placed so the rectangle has the
    /// locked ratio, grows along the axis the pointer moved furthest in, and
    /// stays inside the displayed bitmap.
    pub fn update_drag(&mut self, screen: Point, view: &ViewTransform) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        let end = match (self.aspect, view.displayed_bounds()) {
            (Some(a), Some(bounds)) => constrain_to_aspect(drag.origin, screen, a, bounds),
            _ => screen,
        };
        self.drag = Some(Drag { end, ..drag });
        true
    }

    /// Finish the drag and commit the rectangle it covers.
    ///
    /// Rectangles smaller than the minimum size are discarded and clear the
    /// previous selection, so a click deselects.
    pub fn end_drag(&mut self, screen: Point, view: &ViewTransform) -> Option<PixelRect> {
        if !self.update_drag(screen, view) {
            return None;
        }
        let drag = self.drag.take()?;
        self.committed = self.commit(drag, view);
        if let Some(rect) = self.committed {
            log::debug!("Selection committed: {:?}", rect);
        }
        self.committed
    }

    /// Select a single pixel in point mode.
    pub fn select_point(&mut self, screen: Point, view: &ViewTransform) -> Option<PixelPoint> {
        if self.mode != SelectionMode::Point {
            return None;
        }
        let p = view.screen_to_image(screen)?;
        self.point = Some(p);
        Some(p)
    }

    /// The rectangle to draw: the live drag, otherwise the committed selection.
    pub fn screen_rect(&self, view: &ViewTransform) -> Option<ScreenRect> {
        match self.drag {
            Some(drag) => Some(ScreenRect::from_corners(self.drag_origin(drag, view), drag.end)),
            None => view.image_to_screen_rect(self.committed?),
        }
    }

    /// Aspect-locked drags start inside the bitmap.
    fn drag_origin(&self, drag: Drag, view: &ViewTransform) -> Point {
        match (self.aspect, view.displayed_bounds()) {
            (Some(_), Some(bounds)) => bounds.clamp_point(drag.origin),
            _ => drag.origin,
        }
    }

    fn commit(&self, drag: Drag, view: &ViewTransform) -> Option<PixelRect> {
        let (img_w, img_h) = view.image_size()?;
        let origin = self.drag_origin(drag, view);
        let rect = view.screen_rect_to_image_rect(ScreenRect::from_corners(origin, drag.end))?;

        let rect = match self.aspect {
            None => rect,
            Some(a) => {
                let anchor = view.screen_to_image(origin)?;
                let anchor_left = (anchor.x as f32) <= rect.left as f32 + rect.width as f32 / 2.0;
                let anchor_top = (anchor.y as f32) <= rect.top as f32 + rect.height as f32 / 2.0;
                let max_w = if anchor_left { img_w - rect.left } else { rect.right() };
                let max_h = if anchor_top { img_h - rect.top } else { rect.bottom() };
                let (w, h) = fit_aspect(rect.height.min(max_h), a, max_w)?;
                PixelRect::new(
                    if anchor_left { rect.left } else { rect.right() - w },
                    if anchor_top { rect.top } else { rect.bottom() - h },
                    w,
                    h,
                )
            }
        };
        self.meets_min_size(rect).then_some(rect)
    }

    fn refit_centered(&self, rect: PixelRect, a: f32, img_w: u32, img_h: u32) -> Option<PixelRect> {
        let (w, h) = fit_aspect(rect.height.min(img_h), a, img_w)?;
        let cx = rect.left as f32 + rect.width as f32 / 2.0;
        let cy = rect.top as f32 + rect.height as f32 / 2.0;
        let left = (cx - w as f32 / 2.0).round().clamp(0.0, (img_w - w) as f32) as u32;
        let top = (cy - h as f32 / 2.0).round().clamp(0.0, (img_h - h) as f32) as u32;
        let fitted = PixelRect::new(left, top, w, h);
        self.meets_min_size(fitted).then_some(fitted)
    }

    fn meets_min_size(&self, rect: PixelRect) -> bool {
        rect.width >= self.config.min_size && rect.height >= self.config.min_size
    }
}

/// Far corner of an aspect-locked drag from `origin` towards `pointer`.
fn constrain_to_aspect(origin: Point, pointer: Point, aspect: f32, bounds: ScreenRect) -> Point {
    let origin = bounds.clamp_point(origin);
    let dx = pointer.x - origin.x;
    let dy = pointer.y - origin.y;
    let (mut w, mut h) = if dx.abs() >= dy.abs() {
        (dx.abs(), dx.abs() / aspect)
    } else {
        (dy.abs() * aspect, dy.abs())
    };

    let sx = if dx < 0.0 { -1.0 } else { 1.0 };
    let sy = if dy < 0.0 { -1.0 } else { 1.0 };
    let room_w = if sx > 0.0 { bounds.right() - origin.x } else { origin.x - bounds.x };
    let room_h = if sy > 0.0 { bounds.bottom() - origin.y } else { origin.y - bounds.y };

    if w > room_w {
        w = room_w;
        h = w / aspect;
    }
    if h > room_h {
        h = room_h;
        w = h * aspect;
    }
    Point::new(origin.x + sx * w, origin.y + sy * h)
}

/// Largest whole-pixel `(w, h)` with `h <= max_h`, `w <= max_w` and
/// `|w/h - aspect| < ASPECT_TOLERANCE`.
fn fit_aspect(max_h: u32, aspect: f32, max_w: u32) -> Option<(u32, u32)> {
    (1..=max_h).rev().find_map(|h| {
        let w = (h as f32 * aspect).round() as u32;
        let ok = w >= 1 && w <= max_w && (w as f32 / h as f32 - aspect).abs() < ASPECT_TOLERANCE;
        ok.then_some((w, h))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    /// 800x600 image centred in a 1000x800 viewport: bitmap at (100, 100).
    fn view() -> ViewTransform {
        let mut v = ViewTransform::default();
        v.set_viewport(Size::new(1000.0, 800.0));
        v.set_image_size(Some((800, 600)));
        v
    }

    fn drag(
        sel: &mut SelectionModel,
        v: &ViewTransform,
        from: (f32, f32),
        to: (f32, f32),
    ) -> Option<PixelRect> {
        assert!(sel.begin_drag(Point::new(from.0, from.1)));
        sel.update_drag(Point::new((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0), v);
        sel.end_drag(Point::new(to.0, to.1), v)
    }

    #[test]
    fn test_free_drag_commits_image_rect() {
        let v = view();
        let mut sel = SelectionModel::default();
        let rect = drag(&mut sel, &v, (200.0, 200.0), (400.0, 350.0));
        assert_eq!(rect, Some(PixelRect::new(100, 100, 200, 150)));
        assert_eq!(sel.committed(), rect);
        assert!(!sel.is_dragging());
    }

    #[test]
    fn test_reverse_drag_normalizes() {
        let v = view();
        let mut sel = SelectionModel::default();
        let rect = drag(&mut sel, &v, (400.0, 350.0), (200.0, 200.0));
        assert_eq!(rect, Some(PixelRect::new(100, 100, 200, 150)));
    }

    #[test]
    fn test_tiny_drag_is_discarded() {
        let v = view();
        let mut sel = SelectionModel::default();
        drag(&mut sel, &v, (200.0, 200.0), (400.0, 350.0));
        assert!(drag(&mut sel, &v, (200.0, 200.0), (203.0, 260.0)).is_none());
        assert!(sel.committed().is_none());
    }

    #[test]
    fn test_cancel_keeps_previous_selection() {
        let v = view();
        let mut sel = SelectionModel::default();
        let first = drag(&mut sel, &v, (200.0, 200.0), (400.0, 350.0));
        sel.begin_drag(Point::new(500.0, 500.0));
        sel.update_drag(Point::new(600.0, 600.0), &v);
        assert!(sel.cancel());
        assert!(!sel.cancel());
        assert_eq!(sel.committed(), first);
        assert!(sel.end_drag(Point::new(700.0, 700.0), &v).is_none());
    }

    #[test]
    fn test_aspect_lock_grows_along_larger_axis() {
        let v = view();
        let mut sel = SelectionModel::default();
        sel.set_aspect_ratio(Some(4.0 / 3.0), &v).unwrap();
        let rect = drag(&mut sel, &v, (200.0, 200.0), (500.0, 260.0)).unwrap();
        assert_eq!(rect, PixelRect::new(100, 100, 300, 225));
    }

    #[test]
    fn test_aspect_lock_shrinks_at_bitmap_edge() {
        let v = view();
        let mut sel = SelectionModel::default();
        sel.set_aspect_ratio(AspectPreset::Standard.ratio(), &v).unwrap();
        // Pointer overshoots the right edge of the bitmap (x = 900)
        let rect = drag(&mut sel, &v, (800.0, 600.0), (1000.0, 620.0)).unwrap();
        assert_eq!(rect, PixelRect::new(700, 500, 100, 75));
        let live = {
            sel.begin_drag(Point::new(800.0, 600.0));
            sel.update_drag(Point::new(1000.0, 620.0), &v);
            sel.screen_rect(&v).unwrap()
        };
        assert!(live.right() <= 900.0 + 0.001);
    }

    #[test]
    fn test_aspect_lock_property() {
        let mut v = ViewTransform::default();
        v.set_viewport(Size::new(1024.0, 768.0));
        v.set_image_size(Some((800, 600)));
        v.set_zoom(0.37);
        v.pan_by(13.0, -7.0);
        let b = v.displayed_bounds().unwrap();

        for preset in AspectPreset::all() {
            let Some(a) = preset.ratio() else { continue };
            let mut sel = SelectionModel::default();
            sel.set_aspect_ratio(Some(a), &v).unwrap();
            let drags = [
                ((b.x + 5.0, b.y + 5.0), (b.right() + 50.0, b.bottom() + 80.0)),
                ((b.right() - 3.0, b.bottom() - 3.0), (b.x - 40.0, b.y + 20.0)),
                ((b.center().x, b.center().y), (b.x + 10.0, b.bottom() + 200.0)),
                ((b.x - 30.0, b.y - 30.0), (b.center().x, b.center().y)),
            ];
            for (from, to) in drags {
                if let Some(r) = drag(&mut sel, &v, from, to) {
                    assert!(
                        (r.aspect_ratio() - a).abs() < ASPECT_TOLERANCE,
                        "{} gave {:?}",
                        preset.name(),
                        r
                    );
                    assert!(r.fits_within(800, 600), "{:?} outside image", r);
                    assert!(r.width >= MIN_SELECTION_SIZE && r.height >= MIN_SELECTION_SIZE);
                }
            }
        }
    }

    #[test]
    fn test_set_aspect_ratio_rejects_invalid() {
        let v = view();
        let mut sel = SelectionModel::default();
        for bad in [0.0, -1.5, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                sel.set_aspect_ratio(Some(bad), &v),
                Err(EditError::InvalidInput { .. })
            ));
        }
        assert_eq!(sel.aspect_ratio(), None);
    }

    #[test]
    fn test_set_aspect_ratio_refits_about_centre() {
        let v = view();
        let mut sel = SelectionModel::default();
        drag(&mut sel, &v, (200.0, 200.0), (400.0, 350.0));
        sel.set_aspect_ratio(Some(1.0), &v).unwrap();
        assert_eq!(sel.committed(), Some(PixelRect::new(125, 100, 150, 150)));
        // Unlocking leaves the rectangle alone
        sel.set_aspect_ratio(None, &v).unwrap();
        assert_eq!(sel.committed(), Some(PixelRect::new(125, 100, 150, 150)));
    }

    #[test]
    fn test_point_mode() {
        let v = view();
        let mut sel = SelectionModel::default();
        assert!(sel.select_point(Point::new(150.0, 150.0), &v).is_none());

        sel.set_mode(SelectionMode::Point);
        assert!(!sel.begin_drag(Point::new(150.0, 150.0)));
        assert_eq!(
            sel.select_point(Point::new(150.0, 150.0), &v),
            Some(PixelPoint::new(50, 50))
        );
        assert_eq!(
            sel.select_point(Point::new(-20.0, 5000.0), &v),
            Some(PixelPoint::new(0, 599))
        );
        sel.set_mode(SelectionMode::Region);
        assert!(sel.point().is_none());
    }

    #[test]
    fn test_committed_rect_maps_back_to_screen() {
        let v = view();
        let mut sel = SelectionModel::default();
        drag(&mut sel, &v, (200.0, 200.0), (400.0, 350.0));
        let r = sel.screen_rect(&v).unwrap();
        assert_eq!(r, ScreenRect::new(200.0, 200.0, 200.0, 150.0));
    }

    #[test]
    fn test_preset_ratios() {
        assert_eq!(AspectPreset::Free.ratio(), None);
        assert_eq!(AspectPreset::Square.ratio(), Some(1.0));
        assert!((AspectPreset::Vertical.ratio().unwrap() - 0.5625).abs() < 1e-6);
        assert_eq!(AspectPreset::all().len(), 8);
    }

    #[test]
    fn test_fit_aspect_exact_pixels() {
        assert_eq!(fit_aspect(9, 16.0 / 9.0, 100), Some((16, 9)));
        // Width limit forces a smaller height
        assert_eq!(fit_aspect(100, 2.0, 50), Some((50, 25)));
        assert_eq!(fit_aspect(0, 1.0, 10), None);
    }
}
