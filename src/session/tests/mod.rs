//! Unit tests for the edit session.
//!
//! These drive a session end to end against a fake provider, covering the
//! history flow, failure handling, background dispatch and view/selection
//! bookkeeping.

mod view_tests;
