//! Edit operations and the provider that executes them.
//!
//! [`Operation`] is the closed set of edits a session can run. The pixel work
//! itself is delegated to an [`ImageOperations`] implementation; the bundled
//! one is [`RasterOperations`].

mod raster;

pub use raster::RasterOperations;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{
    DEFAULT_BLUR_RADIUS, DEFAULT_WATERMARK_OPACITY, DEFAULT_WATERMARK_SIZE, MAX_BLUR_RADIUS,
    MAX_OUTPUT_PIXELS, MAX_WATERMARK_SIZE,
};
use crate::error::{EditError, OperationError};
use crate::geometry::PixelRect;
use crate::image::Image;

/// Executes the pixel work behind each [`Operation`].
///
/// Implementations are pure: they never modify the input and return a new
/// image or an error. They run on the session's worker thread, hence the
/// `Send + Sync` bound.
pub trait ImageOperations: Send + Sync {
    fn scale(&self, image: &Image, factor: f32) -> Result<Image, OperationError>;
    /// Rotate clockwise by `degrees`, growing the canvas to fit.
    fn rotate(&self, image: &Image, degrees: f32) -> Result<Image, OperationError>;
    fn crop(&self, image: &Image, rect: PixelRect) -> Result<Image, OperationError>;
    fn watermark(&self, image: &Image, params: &WatermarkParams) -> Result<Image, OperationError>;
    fn grayscale(&self, image: &Image) -> Result<Image, OperationError>;
    fn blur(&self, image: &Image, radius: f32) -> Result<Image, OperationError>;
    fn vintage(&self, image: &Image) -> Result<Image, OperationError>;
}

// ============================================================================
// Watermark parameters
// ============================================================================

/// Where a watermark is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopLeft,
    TopRight,
    Center,
    /// Top-left corner of the text, clamped so the text stays inside
    Custom { x: u32, y: u32 },
}

impl FromStr for WatermarkPosition {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "center" | "centre" => Ok(Self::Center),
            other => {
                let (x, y) = other.split_once(',').ok_or_else(|| {
                    EditError::invalid_input(format!("unknown watermark position '{s}'"))
                })?;
                Ok(Self::Custom {
                    x: parse_number(x, "watermark x")?,
                    y: parse_number(y, "watermark y")?,
                })
            }
        }
    }
}

/// Font file contents shared between copies of the parameters.
#[derive(Clone, PartialEq)]
pub struct FontData(Arc<Vec<u8>>);

impl FontData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontData({} bytes)", self.0.len())
    }
}

/// Text watermark settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub text: String,
    pub position: WatermarkPosition,
    /// Font size in pixels
    pub size: f32,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
    /// TrueType/OpenType font; watermarking fails without one
    pub font: Option<FontData>,
}

impl WatermarkParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: WatermarkPosition::default(),
            size: DEFAULT_WATERMARK_SIZE,
            opacity: DEFAULT_WATERMARK_OPACITY,
            font: None,
        }
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_font(mut self, font: FontData) -> Self {
        self.font = Some(font);
        self
    }
}

// ============================================================================
// Operation
// ============================================================================

/// An edit applied to the whole current image.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Scale { factor: f32 },
    /// Clockwise, in degrees
    Rotate { degrees: f32 },
    Crop(PixelRect),
    Watermark(WatermarkParams),
    Grayscale,
    Blur { radius: f32 },
    Vintage,
}

/// Discriminant of [`Operation`], used in errors and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Scale,
    Rotate,
    Crop,
    Watermark,
    Grayscale,
    Blur,
    Vintage,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Scale => "Scale",
            OperationKind::Rotate => "Rotate",
            OperationKind::Crop => "Crop",
            OperationKind::Watermark => "Watermark",
            OperationKind::Grayscale => "Grayscale",
            OperationKind::Blur => "Blur",
            OperationKind::Vintage => "Vintage",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Scale { .. } => OperationKind::Scale,
            Operation::Rotate { .. } => OperationKind::Rotate,
            Operation::Crop(_) => OperationKind::Crop,
            Operation::Watermark(_) => OperationKind::Watermark,
            Operation::Grayscale => OperationKind::Grayscale,
            Operation::Blur { .. } => OperationKind::Blur,
            Operation::Vintage => OperationKind::Vintage,
        }
    }

    /// Short description for history and status display.
    pub fn label(&self) -> String {
        match self {
            Operation::Scale { factor } => format!("Scale {:.0}%", factor * 100.0),
            Operation::Rotate { degrees } => format!("Rotate {degrees}°"),
            Operation::Crop(r) => format!("Crop {}x{}", r.width, r.height),
            Operation::Watermark(p) => format!("Watermark \"{}\"", p.text),
            Operation::Blur { radius } => format!("Blur {radius}"),
            Operation::Grayscale | Operation::Vintage => self.kind().to_string(),
        }
    }

    /// Check the parameters that do not depend on the image.
    ///
    /// Cheap enough to run before waiting for a pending operation.
    pub fn check_params(&self) -> Result<(), EditError> {
        match self {
            Operation::Scale { factor } => {
                if !(factor.is_finite() && *factor > 0.0) {
                    return Err(EditError::invalid_input(format!(
                        "scale factor must be a positive number, got {factor}"
                    )));
                }
            }
            Operation::Rotate { degrees } => {
                if !degrees.is_finite() {
                    return Err(EditError::invalid_input("rotation angle must be finite"));
                }
            }
            Operation::Crop(r) => {
                if !r.is_valid() {
                    return Err(EditError::invalid_input(format!(
                        "crop rectangle must not be empty, got {}x{}",
                        r.width, r.height
                    )));
                }
            }
            Operation::Watermark(p) => {
                if p.text.trim().is_empty() {
                    return Err(EditError::invalid_input("watermark text is empty"));
                }
                if !(p.size.is_finite() && p.size > 0.0 && p.size <= MAX_WATERMARK_SIZE) {
                    return Err(EditError::invalid_input(format!(
                        "watermark size must be between 0 and {MAX_WATERMARK_SIZE}, got {}",
                        p.size
                    )));
                }
                if !(0.0..=1.0).contains(&p.opacity) {
                    return Err(EditError::invalid_input(format!(
                        "watermark opacity must be between 0 and 1, got {}",
                        p.opacity
                    )));
                }
            }
            Operation::Blur { radius } => {
                if !(radius.is_finite() && (0.0..=MAX_BLUR_RADIUS).contains(radius)) {
                    return Err(EditError::invalid_input(format!(
                        "blur radius must be between 0 and {MAX_BLUR_RADIUS}, got {radius}"
                    )));
                }
            }
            Operation::Grayscale | Operation::Vintage => {}
        }
        Ok(())
    }

    /// Check the parameters against an image of the given size.
    ///
    /// Runs before anything is recorded, so a rejected operation leaves the
    /// session untouched.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), EditError> {
        self.check_params()?;
        let output = match self {
            Operation::Crop(r) => {
                if r.left >= width || r.top >= height {
                    return Err(EditError::invalid_input(format!(
                        "crop origin ({}, {}) is outside the {width}x{height} image",
                        r.left, r.top
                    )));
                }
                return Ok(());
            }
            Operation::Scale { factor } => scaled_size(width, height, *factor),
            Operation::Rotate { degrees } => rotated_size(width, height, *degrees),
            _ => return Ok(()),
        };
        if !within_pixel_limit(output.0, output.1) {
            return Err(EditError::invalid_input(format!(
                "{} would produce a {}x{} image, over the {MAX_OUTPUT_PIXELS} pixel limit",
                self.label(),
                output.0,
                output.1
            )));
        }
        Ok(())
    }

    /// Run the operation through a provider.
    pub fn apply(
        &self,
        provider: &dyn ImageOperations,
        image: &Image,
    ) -> Result<Image, OperationError> {
        match self {
            Operation::Scale { factor } => provider.scale(image, *factor),
            Operation::Rotate { degrees } => provider.rotate(image, *degrees),
            Operation::Crop(rect) => provider.crop(image, *rect),
            Operation::Watermark(params) => provider.watermark(image, params),
            Operation::Grayscale => provider.grayscale(image),
            Operation::Blur { radius } => provider.blur(image, *radius),
            Operation::Vintage => provider.vintage(image),
        }
    }
}

/// Output size of scaling a `width`x`height` image by `factor`.
pub(crate) fn scaled_size(width: u32, height: u32, factor: f32) -> (u64, u64) {
    let dim = |v: u32| ((v as f64 * factor as f64).floor() as u64).max(1);
    (dim(width), dim(height))
}

/// Bounding box of a `width`x`height` image rotated by `degrees`.
pub(crate) fn rotated_size(width: u32, height: u32, degrees: f32) -> (u64, u64) {
    let (sin, cos) = (degrees as f64).to_radians().sin_cos();
    let (w, h) = (width as f64, height as f64);
    let fit = |v: f64| ((v - 1e-3).ceil() as u64).max(1);
    (
        fit(w * cos.abs() + h * sin.abs()),
        fit(w * sin.abs() + h * cos.abs()),
    )
}

pub(crate) fn within_pixel_limit(width: u64, height: u64) -> bool {
    width.saturating_mul(height) <= MAX_OUTPUT_PIXELS
}

/// Parses `name[=args]`:
/// `scale=F`, `rotate=DEG`, `crop=L,T,W,H`, `grayscale`, `blur[=R]`,
/// `vintage`, `watermark=TEXT[@POSITION]`.
///
/// Parsing checks syntax only; see [`Operation::validate`] for ranges.
impl FromStr for Operation {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (s.trim(), None),
        };
        let required = |what: &str| {
            arg.ok_or_else(|| EditError::invalid_input(format!("'{name}' needs {what}")))
        };

        match name.to_ascii_lowercase().as_str() {
            "scale" => Ok(Operation::Scale {
                factor: parse_number(required("a factor")?, "scale factor")?,
            }),
            "rotate" => Ok(Operation::Rotate {
                degrees: parse_number(required("an angle")?, "rotation angle")?,
            }),
            "crop" => {
                let parts = required("L,T,W,H")?
                    .split(',')
                    .map(|p| parse_number::<u32>(p, "crop value"))
                    .collect::<Result<Vec<_>, _>>()?;
                match parts.as_slice() {
                    &[left, top, width, height] => {
                        Ok(Operation::Crop(PixelRect::new(left, top, width, height)))
                    }
                    _ => Err(EditError::invalid_input(format!(
                        "crop needs 4 values L,T,W,H, got {}",
                        parts.len()
                    ))),
                }
            }
            "grayscale" | "greyscale" => Ok(Operation::Grayscale),
            "blur" => Ok(Operation::Blur {
                radius: match arg {
                    Some(r) => parse_number(r, "blur radius")?,
                    None => DEFAULT_BLUR_RADIUS,
                },
            }),
            "vintage" => Ok(Operation::Vintage),
            "watermark" => {
                let value = required("text")?;
                let params = match value.rsplit_once('@') {
                    Some((text, pos)) => WatermarkParams::new(text).with_position(pos.parse()?),
                    None => WatermarkParams::new(value),
                };
                Ok(Operation::Watermark(params))
            }
            _ => Err(EditError::invalid_input(format!("unknown operation '{name}'"))),
        }
    }
}

fn parse_number<T: FromStr>(s: &str, what: &str) -> Result<T, EditError> {
    s.trim()
        .parse()
        .map_err(|_| EditError::invalid_input(format!("invalid {what} '{}'", s.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operations() {
        assert_eq!(
            "scale=1.2".parse::<Operation>().unwrap(),
            Operation::Scale { factor: 1.2 }
        );
        assert_eq!(
            "rotate=-90".parse::<Operation>().unwrap(),
            Operation::Rotate { degrees: -90.0 }
        );
        assert_eq!(
            "crop=100, 100, 200, 150".parse::<Operation>().unwrap(),
            Operation::Crop(PixelRect::new(100, 100, 200, 150))
        );
        assert_eq!("grayscale".parse::<Operation>().unwrap(), Operation::Grayscale);
        assert_eq!("Vintage".parse::<Operation>().unwrap(), Operation::Vintage);
        assert_eq!(
            "blur".parse::<Operation>().unwrap(),
            Operation::Blur {
                radius: DEFAULT_BLUR_RADIUS
            }
        );
    }

    #[test]
    fn test_parse_watermark() {
        let Operation::Watermark(p) = "watermark=me@example.com@top-left".parse::<Operation>().unwrap() else {
            panic!("expected watermark");
        };
        assert_eq!(p.text, "me@example.com");
        assert_eq!(p.position, WatermarkPosition::TopLeft);

        let Operation::Watermark(p) = "watermark=hello@10,20".parse::<Operation>().unwrap() else {
            panic!("expected watermark");
        };
        assert_eq!(p.position, WatermarkPosition::Custom { x: 10, y: 20 });

        let Operation::Watermark(p) = "watermark=plain".parse::<Operation>().unwrap() else {
            panic!("expected watermark");
        };
        assert_eq!(p.position, WatermarkPosition::BottomRight);
        assert!(p.font.is_none());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "sharpen", "scale", "scale=abc", "crop=1,2,3", "watermark=x@middle"] {
            assert!(
                matches!(bad.parse::<Operation>(), Err(EditError::InvalidInput { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate() {
        assert!(Operation::Scale { factor: 0.5 }.validate(10, 10).is_ok());
        assert!(Operation::Scale { factor: 0.0 }.validate(10, 10).is_err());
        assert!(Operation::Scale { factor: f32::NAN }.validate(10, 10).is_err());
        assert!(Operation::Rotate { degrees: f32::INFINITY }.validate(10, 10).is_err());
        assert!(Operation::Crop(PixelRect::new(0, 0, 0, 5)).validate(10, 10).is_err());
        assert!(Operation::Crop(PixelRect::new(10, 0, 5, 5)).validate(10, 10).is_err());
        // Oversized extents are clamped by the provider
        assert!(Operation::Crop(PixelRect::new(5, 5, 50, 50)).validate(10, 10).is_ok());
        assert!(Operation::Blur { radius: -1.0 }.validate(10, 10).is_err());
        assert!(Operation::Watermark(WatermarkParams::new("  ")).validate(10, 10).is_err());

        let mut params = WatermarkParams::new("hi");
        params.opacity = 1.5;
        assert!(Operation::Watermark(params).validate(10, 10).is_err());
    }

    #[test]
    fn test_validate_rejects_huge_results() {
        assert!(Operation::Scale { factor: 3.0 }.validate(800, 600).is_ok());
        let err = Operation::Scale { factor: 1e9 }.validate(800, 600).unwrap_err();
        assert!(matches!(err, EditError::InvalidInput { .. }));
        assert!(err.to_string().contains("pixel limit"));

        assert!(Operation::Rotate { degrees: 45.0 }.validate(800, 600).is_ok());
        assert!(Operation::Rotate { degrees: 45.0 }.validate(10_000, 10_000).is_err());
        // Quarter turns keep the pixel count
        assert!(Operation::Rotate { degrees: 90.0 }.validate(10_000, 10_000).is_ok());
    }

    #[test]
    fn test_check_params_ignores_image_size() {
        assert!(Operation::Crop(PixelRect::new(5000, 5000, 5, 5)).check_params().is_ok());
        assert!(Operation::Scale { factor: -2.0 }.check_params().is_err());
        assert!(Operation::Blur { radius: MAX_BLUR_RADIUS }.check_params().is_ok());
        assert!(Operation::Blur { radius: 1e30 }.check_params().is_err());

        let mut params = WatermarkParams::new("hi");
        params.size = 1e9;
        assert!(Operation::Watermark(params).check_params().is_err());
    }

    #[test]
    fn test_output_sizes() {
        assert_eq!(scaled_size(800, 600, 1.2), (960, 720));
        assert_eq!(scaled_size(10, 4, 0.01), (1, 1));
        assert_eq!(rotated_size(100, 100, 45.0), (142, 142));
        assert_eq!(rotated_size(800, 600, 90.0), (600, 800));
        assert!(within_pixel_limit(10_000, 10_000));
        assert!(!within_pixel_limit(10_001, 10_000));
        assert!(!within_pixel_limit(u64::MAX, 2));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Operation::Scale { factor: 1.2 }.label(), "Scale 120%");
        assert_eq!(Operation::Rotate { degrees: 90.0 }.label(), "Rotate 90°");
        assert_eq!(
            Operation::Crop(PixelRect::new(0, 0, 200, 150)).label(),
            "Crop 200x150"
        );
        assert_eq!(Operation::Vintage.label(), "Vintage");
        assert_eq!(OperationKind::Watermark.to_string(), "Watermark");
    }
}
