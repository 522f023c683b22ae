//! Global constants for the retouch editor core

/// Smallest zoom factor the viewport accepts (10%)
pub const MIN_ZOOM: f32 = 0.1;

/// Largest zoom factor the viewport accepts (1000%)
pub const MAX_ZOOM: f32 = 10.0;

/// Relative zoom change applied by a single zoom-in/zoom-out step (10%)
pub const ZOOM_STEP: f32 = 0.1;

/// Zoom requests closer than this to the current zoom are ignored
pub const ZOOM_EPSILON: f32 = 0.001;

/// Preview rotations smaller than this (in degrees) are treated as zero
pub const ROTATION_EPSILON: f32 = 0.01;

/// Maximum number of snapshots kept on each of the undo and redo stacks
pub const MAX_HISTORY: usize = 10;

/// Minimum committed selection edge, in image pixels
pub const MIN_SELECTION_SIZE: u32 = 5;

/// Maximum allowed deviation between a committed rectangle's w/h and the locked ratio
pub const ASPECT_TOLERANCE: f32 = 0.01;

/// Largest image, in pixels, that an operation may produce (100 MP)
pub const MAX_OUTPUT_PIXELS: u64 = 100_000_000;

/// Largest accepted Gaussian blur radius
pub const MAX_BLUR_RADIUS: f32 = 250.0;

/// Largest accepted watermark font size, in pixels
pub const MAX_WATERMARK_SIZE: f32 = 2048.0;

/// Distance between a preset-positioned watermark and the image edge, in pixels
pub const WATERMARK_MARGIN: u32 = 20;

/// Default watermark font size, in pixels
pub const DEFAULT_WATERMARK_SIZE: f32 = 36.0;

/// Default watermark opacity
pub const DEFAULT_WATERMARK_OPACITY: f32 = 0.7;

/// Default Gaussian blur radius
pub const DEFAULT_BLUR_RADIUS: f32 = 2.0;

/// Sepia tone used by the vintage filter
pub const SEPIA_TONE: [u8; 3] = [112, 66, 20];

/// Name of the background operation thread
pub const WORKER_THREAD_NAME: &str = "image-ops";
