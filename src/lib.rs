//! retouch - interactive image editing core
//!
//! Maps pointer input on a zoomed, panned and preview-rotated viewport to
//! image pixels, turns drags into aspect-constrained selections, and runs
//! edit operations (scale, rotate, crop, watermark, filters) against a single
//! current image with bounded undo/redo.
//!
//! The entry point is [`EditSession`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use retouch::{EditSession, Image, Operation, RasterOperations};
//!
//! let mut session = EditSession::new(Arc::new(RasterOperations::new()));
//! session.load(Image::filled(800, 600, [255, 255, 255]));
//! session.apply_operation(Operation::Scale { factor: 0.5 })?;
//! session.wait()?;
//! assert_eq!(session.status_text(), "400 x 300");
//! # Ok::<(), retouch::EditError>(())
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod history;
pub mod image;
pub mod ops;
pub mod selection;
pub mod session;
pub mod view;

pub use crate::config::{ConfigError, EditorConfig, LogLevel};
pub use crate::error::{EditError, EditResult, OperationError};
pub use crate::geometry::{PixelPoint, PixelRect, Point, ScreenRect, Size};
pub use crate::history::{EditHistory, HistoryConfig};
pub use crate::image::Image;
pub use crate::ops::{
    FontData, ImageOperations, Operation, OperationKind, RasterOperations, WatermarkParams,
    WatermarkPosition,
};
pub use crate::selection::{AspectPreset, SelectionConfig, SelectionMode, SelectionModel};
pub use crate::session::{
    DispatchMode, EditSession, OperationId, PendingOperation, SessionConfig, SessionEvent,
    SessionState,
};
pub use crate::view::{ViewConfig, ViewState, ViewTransform};
