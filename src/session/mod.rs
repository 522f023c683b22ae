//! Edit session: the current image, its history, and the operation in flight.
//!
//! The session is driven from a single thread. Operations run either inline
//! or on a background worker; in both cases the state before the edit is
//! recorded first and the result is committed only after it completes. At
//! most one operation is ever in flight: anything that reads or replaces the
//! current image settles the pending operation first.
//!
//! ```text
//! Idle --apply_operation--> Pending --success--> (commit) --> Idle
//!                                   \--failure--> (report) --> Idle
//! ```

mod worker;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use self::worker::{OperationOutcome, OperationWorker, run_operation};
use crate::config::EditorConfig;
use crate::error::{EditError, EditResult, OperationError};
use crate::geometry::{PixelPoint, PixelRect, Point, ScreenRect, Size};
use crate::history::EditHistory;
use crate::image::Image;
use crate::ops::{ImageOperations, Operation, OperationKind};
use crate::selection::{SelectionMode, SelectionModel};
use crate::view::{ViewState, ViewTransform};

// ============================================================================
// Configuration
// ============================================================================

/// Where operations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// On the session's worker thread; results are picked up by `poll`/`wait`
    #[default]
    Background,
    /// On the calling thread, before `apply_operation` returns
    Inline,
}

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub dispatch: DispatchMode,
}

// ============================================================================
// State and events
// ============================================================================

/// Identifies one requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The operation currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
}

/// Coarse session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pending(PendingOperation),
}

/// Notifications for a front end, drained with [`EditSession::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The current image was replaced (load, commit, undo, redo, reset)
    ImageChanged,
    /// A rectangle selection was committed
    SelectionCommitted(PixelRect),
    /// A pixel was picked in point mode
    PointSelected(PixelPoint),
    /// Zoom, pan, preview rotation or viewport changed
    ViewChanged,
    /// An operation finished with an error; the image is unchanged
    OperationFailed {
        id: OperationId,
        kind: OperationKind,
        message: String,
    },
}

// ============================================================================
// EditSession
// ============================================================================

/// Owns the current image and coordinates edits, history and the viewport.
pub struct EditSession {
    provider: Arc<dyn ImageOperations>,
    config: SessionConfig,
    original: Option<Image>,
    current: Option<Image>,
    history: EditHistory,
    view: ViewTransform,
    selection: SelectionModel,
    worker: Option<OperationWorker>,
    pending: Option<PendingOperation>,
    next_id: u64,
    events: Vec<SessionEvent>,
}

impl EditSession {
    /// Create a session with default settings.
    pub fn new(provider: Arc<dyn ImageOperations>) -> Self {
        Self::with_config(provider, &EditorConfig::default())
    }

    pub fn with_config(provider: Arc<dyn ImageOperations>, config: &EditorConfig) -> Self {
        Self {
            provider,
            config: config.session,
            original: None,
            current: None,
            history: EditHistory::with_config(config.history),
            view: ViewTransform::new(config.view),
            selection: SelectionModel::new(config.selection),
            worker: None,
            pending: None,
            next_id: 1,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current_image(&self) -> Option<&Image> {
        self.current.as_ref()
    }

    pub fn original_image(&self) -> Option<&Image> {
        self.original.as_ref()
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn view_state(&self) -> ViewState {
        self.view.state()
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    /// Committed rectangle selection in image pixels.
    pub fn selection_rect(&self) -> Option<PixelRect> {
        self.selection.committed()
    }

    /// Selection overlay to draw, in screen space.
    pub fn selection_screen_rect(&self) -> Option<ScreenRect> {
        self.selection.screen_rect(&self.view)
    }

    pub fn selection_point(&self) -> Option<PixelPoint> {
        self.selection.point()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn state(&self) -> SessionState {
        match self.pending {
            Some(p) => SessionState::Pending(p),
            None => SessionState::Idle,
        }
    }

    /// Image size for a status bar, e.g. `"800 x 600"`.
    pub fn status_text(&self) -> String {
        match &self.current {
            Some(img) => format!("{} x {}", img.width(), img.height()),
            None => "No image".to_string(),
        }
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Image lifecycle
    // ------------------------------------------------------------------

    /// Make `image` the current and original image.
    ///
    /// Settles any pending operation, clears both history stacks, and resets
    /// the view and selection.
    pub fn load(&mut self, image: Image) {
        self.settle();
        log::info!("Loaded image {}x{}", image.width(), image.height());
        self.original = Some(image.clone());
        self.history.clear();
        self.selection.clear();
        self.view.reset();
        self.set_current(image);
        self.events.push(SessionEvent::ViewChanged);
    }

    /// Discard all edits and return to the image as loaded.
    ///
    /// History, view, selection and the aspect lock are reset too.
    pub fn reset_to_original(&mut self) -> EditResult<()> {
        self.settle();
        let original = self.original.clone().ok_or(EditError::NoImageLoaded)?;
        log::info!("Reset to original image");
        self.history.clear();
        self.selection.clear();
        self.selection.set_aspect_ratio(None, &self.view)?;
        self.view.reset();
        self.set_current(original);
        self.events.push(SessionEvent::ViewChanged);
        Ok(())
    }

    fn set_current(&mut self, image: Image) {
        self.view.set_image_size(Some(image.dimensions()));
        self.current = Some(image);
        self.events.push(SessionEvent::ImageChanged);
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Request an edit of the current image.
    ///
    /// Parameters that do not depend on the image are checked first, without
    /// waiting. A pending operation is then settled and the rest is checked
    /// against the (possibly updated) current image. On success the current
    /// image is recorded in the history before the operation is dispatched,
    /// so a failed operation still occupies one undo slot.
    ///
    /// In [`DispatchMode::Inline`] the operation has finished when this
    /// returns and a failure is returned directly. In background mode the
    /// outcome is reported by [`poll`](Self::poll) or [`wait`](Self::wait).
    pub fn apply_operation(&mut self, operation: Operation) -> EditResult<OperationId> {
        if self.current.is_none() {
            return Err(EditError::NoImageLoaded);
        }
        operation.check_params()?;
        self.settle();
        let current = self.current.clone().ok_or(EditError::NoImageLoaded)?;
        operation.validate(current.width(), current.height())?;

        self.history.push(&current, operation.label());
        let id = OperationId(self.next_id);
        self.next_id += 1;
        let kind = operation.kind();
        self.pending = Some(PendingOperation { id, kind });
        log::debug!("Dispatching {} {} ({:?})", kind, id, self.config.dispatch);

        match self.config.dispatch {
            DispatchMode::Inline => {
                let outcome = run_operation(self.provider.as_ref(), id, &operation, &current);
                self.finish(Ok(outcome))?;
            }
            DispatchMode::Background => {
                if let Err(e) = self.dispatch_background(id, operation, current) {
                    self.finish(Err(e))?;
                }
            }
        }
        Ok(id)
    }

    /// Crop to the committed rectangle selection.
    ///
    /// The pending operation is settled first. Its commit clears the
    /// selection, so a rectangle drawn over the old image is never applied
    /// to the new one.
    pub fn apply_crop_selection(&mut self) -> EditResult<OperationId> {
        self.settle();
        let rect = self
            .selection
            .committed()
            .ok_or_else(|| EditError::invalid_input("no selection to crop to"))?;
        self.apply_operation(Operation::Crop(rect))
    }

    fn dispatch_background(
        &mut self,
        id: OperationId,
        operation: Operation,
        image: Image,
    ) -> Result<(), OperationError> {
        if self.worker.is_none() {
            self.worker = Some(OperationWorker::spawn(Arc::clone(&self.provider))?);
        }
        let worker = self
            .worker
            .as_ref()
            .ok_or(OperationError::WorkerDisconnected)?;
        worker.request(id, operation, image)
    }

    /// Commit a finished background operation, if there is one. Non-blocking.
    ///
    /// Returns the id of the committed operation, `Ok(None)` when nothing has
    /// finished, or the operation's error.
    pub fn poll(&mut self) -> EditResult<Option<OperationId>> {
        if self.pending.is_none() {
            return Ok(None);
        }
        let taken = match &self.worker {
            Some(worker) => worker.try_take(),
            None => Some(Err(OperationError::WorkerDisconnected)),
        };
        match taken {
            Some(result) => self.finish(result).map(Some),
            None => Ok(None),
        }
    }

    /// Block until the pending operation finishes and commit it.
    pub fn wait(&mut self) -> EditResult<Option<OperationId>> {
        if self.pending.is_none() {
            return Ok(None);
        }
        let result = match &self.worker {
            Some(worker) => worker.wait_for(),
            None => Err(OperationError::WorkerDisconnected),
        };
        self.finish(result).map(Some)
    }

    /// Wait for the pending operation; its outcome has already been
    /// reported through events and logs.
    fn settle(&mut self) {
        if let Err(e) = self.wait() {
            log::debug!("Settled pending operation with error: {}", e);
        }
    }

    /// Commit or report the outcome of the pending operation.
    fn finish(
        &mut self,
        result: Result<OperationOutcome, OperationError>,
    ) -> EditResult<OperationId> {
        let pending = self.pending.take().ok_or_else(|| {
            EditError::invalid_input("no operation is pending")
        })?;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                // Worker is gone; a fresh one is spawned on the next dispatch.
                self.worker = None;
                return Err(self.report_failure(pending, e));
            }
        };
        if outcome.id != pending.id {
            log::warn!(
                "Worker returned result for {} while {} was pending",
                outcome.id,
                pending.id
            );
        }

        match outcome.result {
            Ok(image) => {
                log::info!(
                    "{} {} committed: {}x{} in {:.1?}",
                    pending.kind,
                    pending.id,
                    image.width(),
                    image.height(),
                    outcome.elapsed
                );
                self.selection.clear();
                if pending.kind == OperationKind::Rotate && self.view.set_preview_rotation(0.0) {
                    self.events.push(SessionEvent::ViewChanged);
                }
                self.set_current(image);
                Ok(pending.id)
            }
            Err(e) => Err(self.report_failure(pending, e)),
        }
    }

    fn report_failure(&mut self, pending: PendingOperation, source: OperationError) -> EditError {
        log::warn!("{} {} failed: {}", pending.kind, pending.id, source);
        self.events.push(SessionEvent::OperationFailed {
            id: pending.id,
            kind: pending.kind,
            message: source.to_string(),
        });
        EditError::OperationFailed {
            kind: pending.kind,
            source,
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Return to the image before the last edit.
    pub fn undo(&mut self) -> EditResult<()> {
        self.step_history(true)
    }

    /// Re-apply the last undone edit.
    pub fn redo(&mut self) -> EditResult<()> {
        self.step_history(false)
    }

    fn step_history(&mut self, undo: bool) -> EditResult<()> {
        self.settle();
        let current = self.current.clone().ok_or(EditError::NoImageLoaded)?;
        let (restored, action) = if undo {
            (self.history.undo(&current), "undo")
        } else {
            (self.history.redo(&current), "redo")
        };
        match restored {
            Some(image) => {
                self.selection.clear();
                self.set_current(image);
                Ok(())
            }
            None => {
                log::info!("Nothing to {}", action);
                Err(EditError::HistoryEmpty { action })
            }
        }
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    fn view_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.events.push(SessionEvent::ViewChanged);
        }
        changed
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if self.view.viewport() != viewport {
            self.view.set_viewport(viewport);
            self.events.push(SessionEvent::ViewChanged);
        }
    }

    pub fn zoom_at(&mut self, pivot: Point, zoom: f32) -> bool {
        let changed = self.view.zoom_at(pivot, zoom);
        self.view_changed(changed)
    }

    pub fn zoom_in(&mut self, pivot: Point) -> bool {
        let changed = self.view.zoom_in(pivot);
        self.view_changed(changed)
    }

    pub fn zoom_out(&mut self, pivot: Point) -> bool {
        let changed = self.view.zoom_out(pivot);
        self.view_changed(changed)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let changed = self.view.set_zoom(zoom);
        self.view_changed(changed)
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        let changed = self.view.pan_by(dx, dy);
        self.view_changed(changed)
    }

    pub fn set_preview_rotation(&mut self, degrees: f32) -> bool {
        let changed = self.view.set_preview_rotation(degrees);
        self.view_changed(changed)
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
        self.events.push(SessionEvent::ViewChanged);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn begin_drag(&mut self, screen: Point) -> bool {
        self.current.is_some() && self.selection.begin_drag(screen)
    }

    pub fn update_drag(&mut self, screen: Point) -> bool {
        self.selection.update_drag(screen, &self.view)
    }

    pub fn end_drag(&mut self, screen: Point) -> Option<PixelRect> {
        let rect = self.selection.end_drag(screen, &self.view)?;
        self.events.push(SessionEvent::SelectionCommitted(rect));
        Some(rect)
    }

    pub fn cancel_selection(&mut self) -> bool {
        self.selection.cancel()
    }

    pub fn select_point(&mut self, screen: Point) -> Option<PixelPoint> {
        let p = self.selection.select_point(screen, &self.view)?;
        self.events.push(SessionEvent::PointSelected(p));
        Some(p)
    }

    pub fn set_aspect_ratio(&mut self, ratio: Option<f32>) -> EditResult<()> {
        self.selection.set_aspect_ratio(ratio, &self.view)
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.selection.set_mode(mode);
    }
}
