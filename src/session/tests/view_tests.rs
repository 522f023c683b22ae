//! Tests for view and selection bookkeeping in the session.

use super::fake::{FakeOperations, loaded_session};
use crate::error::EditError;
use crate::geometry::{PixelPoint, Point, Size};
use crate::image::Image;
use crate::ops::Operation;
use crate::selection::SelectionMode;
use crate::session::{DispatchMode, EditSession, SessionEvent};
use crate::view::ViewState;

#[test]
fn test_load_resets_view_and_selection() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    session.zoom_in(Point::new(300.0, 300.0));
    session.pan_by(15.0, -5.0);
    session.begin_drag(Point::new(200.0, 200.0));
    session.end_drag(Point::new(400.0, 350.0));
    assert!(session.selection_rect().is_some());
    session.take_events();

    session.load(Image::filled(50, 40, [1, 2, 3]));
    assert_eq!(session.view_state(), ViewState::identity());
    assert!(session.selection_rect().is_none());
    assert_eq!(session.view().image_size(), Some((50, 40)));
    assert_eq!(
        session.take_events(),
        vec![SessionEvent::ImageChanged, SessionEvent::ViewChanged]
    );
}

#[test]
fn test_edits_keep_zoom_and_pan() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    assert!(session.set_zoom(2.0));
    assert!(session.pan_by(10.0, 20.0));
    let before = session.view_state();

    session.apply_operation(Operation::Scale { factor: 0.5 }).unwrap();
    assert_eq!(session.view_state(), before);
    session.undo().unwrap();
    assert_eq!(session.view_state(), before);
    assert_eq!(session.view().image_size(), Some((800, 600)));
}

#[test]
fn test_committed_rotate_clears_preview_rotation() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    assert!(session.set_preview_rotation(30.0));
    session.take_events();

    session.apply_operation(Operation::Rotate { degrees: 90.0 }).unwrap();
    assert_eq!(session.view_state().preview_rotation, 0.0);
    assert_eq!(session.current_image().unwrap().dimensions(), (600, 800));
    assert_eq!(
        session.take_events(),
        vec![SessionEvent::ViewChanged, SessionEvent::ImageChanged]
    );
}

#[test]
fn test_other_edits_keep_preview_rotation() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    session.set_preview_rotation(15.0);
    session.apply_operation(Operation::Grayscale).unwrap();
    assert_eq!(session.view_state().preview_rotation, 15.0);
}

#[test]
fn test_reset_to_original() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    let original = session.original_image().unwrap().clone();
    session.apply_operation(Operation::Scale { factor: 0.5 }).unwrap();
    session.set_aspect_ratio(Some(1.0)).unwrap();
    session.set_zoom(3.0);
    session.take_events();

    session.reset_to_original().unwrap();
    assert!(session.current_image().unwrap().same_buffer(&original));
    assert!(!session.can_undo());
    assert!(!session.can_redo());
    assert_eq!(session.selection().aspect_ratio(), None);
    assert_eq!(session.view_state(), ViewState::identity());
    assert_eq!(
        session.take_events(),
        vec![SessionEvent::ImageChanged, SessionEvent::ViewChanged]
    );
}

#[test]
fn test_zoom_round_trip_restores_pan() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    let pivot = Point::new(50.0, 50.0);
    assert!(session.zoom_at(pivot, 2.5));
    assert!(session.zoom_at(pivot, 1.0));
    let state = session.view_state();
    assert!(state.pan_x.abs() < 1.0);
    assert!(state.pan_y.abs() < 1.0);
    assert_eq!(
        session.take_events(),
        vec![SessionEvent::ViewChanged, SessionEvent::ViewChanged]
    );
}

#[test]
fn test_negligible_zoom_is_ignored() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    assert!(!session.zoom_at(Point::new(10.0, 10.0), 1.0005));
    assert!(!session.pan_by(0.0, 0.0));
    assert!(session.take_events().is_empty());
}

#[test]
fn test_viewport_change_emits_event_once() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    session.set_viewport(Size::new(1000.0, 800.0));
    assert!(session.take_events().is_empty());
    session.set_viewport(Size::new(640.0, 480.0));
    assert_eq!(session.take_events(), vec![SessionEvent::ViewChanged]);
}

#[test]
fn test_point_mode_reports_pixel() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    assert_eq!(session.select_point(Point::new(150.0, 120.0)), None);

    session.set_selection_mode(SelectionMode::Point);
    assert!(!session.begin_drag(Point::new(150.0, 120.0)));
    let p = session.select_point(Point::new(150.0, 120.0));
    assert_eq!(p, Some(PixelPoint::new(50, 20)));
    assert_eq!(session.selection_point(), p);
    assert_eq!(
        session.take_events(),
        vec![SessionEvent::PointSelected(PixelPoint::new(50, 20))]
    );
}

#[test]
fn test_selection_overlay_follows_zoom() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    session.begin_drag(Point::new(200.0, 200.0));
    session.end_drag(Point::new(400.0, 350.0));

    let overlay = session.selection_screen_rect().unwrap();
    assert!((overlay.x - 200.0).abs() < 0.01);
    assert!((overlay.width - 200.0).abs() < 0.01);

    session.set_zoom(2.0);
    let overlay = session.selection_screen_rect().unwrap();
    assert!((overlay.width - 400.0).abs() < 0.01);
    assert!((overlay.height - 300.0).abs() < 0.01);
}

#[test]
fn test_cancel_keeps_committed_selection() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    session.begin_drag(Point::new(200.0, 200.0));
    let committed = session.end_drag(Point::new(400.0, 350.0));

    assert!(session.begin_drag(Point::new(500.0, 500.0)));
    assert!(session.cancel_selection());
    assert_eq!(session.selection_rect(), committed);
    assert!(!session.cancel_selection());
}

#[test]
fn test_invalid_aspect_ratio_is_rejected() {
    let mut session = loaded_session(FakeOperations::new(), DispatchMode::Inline);
    assert!(matches!(
        session.set_aspect_ratio(Some(0.0)),
        Err(EditError::InvalidInput { .. })
    ));
    assert!(matches!(
        session.set_aspect_ratio(Some(f32::NAN)),
        Err(EditError::InvalidInput { .. })
    ));
    assert_eq!(session.selection().aspect_ratio(), None);
}

#[test]
fn test_no_image_blocks_selection() {
    let mut session = EditSession::new(FakeOperations::new());
    assert!(!session.begin_drag(Point::new(10.0, 10.0)));
    assert!(!session.zoom_in(Point::new(10.0, 10.0)));
    assert_eq!(session.status_text(), "No image");
}
