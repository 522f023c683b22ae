//! Undo/Redo history of image snapshots.
//!
//! Every edit replaces the whole current image, so history entries are
//! snapshots rather than reversible commands. Each snapshot remembers the
//! label of the edit that followed it, which is what undo/redo report.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_HISTORY;
use crate::image::Image;

// ============================================================================
// Snapshot
// ============================================================================

/// An image together with the label of the edit it was taken before.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The image state
    pub image: Image,
    /// Human-readable description of the step ("Scale 120%", "Crop", ...)
    pub label: String,
}

// ============================================================================
// Edit History
// ============================================================================

/// Configuration for the history stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of snapshots kept on each stack
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    MAX_HISTORY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Bounded undo/redo stacks.
///
/// Maintains two stacks:
/// - `undo_stack`: states that can be returned to (most recent at the end)
/// - `redo_stack`: states that were undone (most recent at the end)
///
/// Pushing a new state clears the redo stack: redo is only meaningful right
/// after an undo. Both stacks drop their oldest entry once they exceed
/// `max_depth`.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    /// States that can be undone to
    undo_stack: Vec<Snapshot>,
    /// States that can be redone to
    redo_stack: Vec<Snapshot>,
    /// Configuration
    config: HistoryConfig,
}

impl EditHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Record `current` as the state before a new edit.
    /// This clears the redo stack (can't redo after a new action).
    pub fn push(&mut self, current: &Image, label: impl Into<String>) {
        let label = label.into();
        log::debug!(
            "📝 History: pushed {:?} before '{}'",
            current.dimensions(),
            label
        );
        Self::push_bounded(
            &mut self.undo_stack,
            Snapshot {
                image: current.clone(),
                label,
            },
            self.config.max_depth,
        );
        self.redo_stack.clear();
    }

    /// Step back one state.
    ///
    /// `current` moves onto the redo stack and the most recent undo state is
    /// returned. Returns `None`, leaving both stacks untouched, if there is
    /// nothing to undo.
    pub fn undo(&mut self, current: &Image) -> Option<Image> {
        let snapshot = self.undo_stack.pop()?;
        log::debug!("⏪ Undo: '{}'", snapshot.label);
        Self::push_bounded(
            &mut self.redo_stack,
            Snapshot {
                image: current.clone(),
                label: snapshot.label,
            },
            self.config.max_depth,
        );
        Some(snapshot.image)
    }

    /// Step forward one state. Symmetric to [`undo`](Self::undo).
    pub fn redo(&mut self, current: &Image) -> Option<Image> {
        let snapshot = self.redo_stack.pop()?;
        log::debug!("⏩ Redo: '{}'", snapshot.label);
        Self::push_bounded(
            &mut self.undo_stack,
            Snapshot {
                image: current.clone(),
                label: snapshot.label,
            },
            self.config.max_depth,
        );
        Some(snapshot.image)
    }

    fn push_bounded(stack: &mut Vec<Snapshot>, snapshot: Snapshot, max_depth: usize) {
        stack.push(snapshot);
        if stack.len() > max_depth {
            let excess = stack.len() - max_depth;
            stack.drain(..excess);
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the label of the step that would be undone
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|s| s.label.as_str())
    }

    /// Get the label of the step that would be redone
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|s| s.label.as_str())
    }

    /// Snapshots on the undo stack, oldest first
    pub fn undo_entries(&self) -> &[Snapshot] {
        &self.undo_stack
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("🗑️ History cleared");
    }

    /// Get the number of states in undo history
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of states in redo history
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn img(w: u32) -> Image {
        Image::filled(w, 1, [0, 0, 0])
    }

    #[test]
    fn test_history_basic() {
        let mut history = EditHistory::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history.push(&img(1), "Scale");
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo_description(), Some("Scale"));

        let restored = history.undo(&img(2)).unwrap();
        assert_eq!(restored.width(), 1);
        assert!(!history.can_undo());
        assert!(history.can_redo());
        assert_eq!(history.redo_description(), Some("Scale"));

        let redone = history.redo(&img(1)).unwrap();
        assert_eq!(redone.width(), 2);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks_report_none() {
        let mut history = EditHistory::new();
        assert!(history.undo(&img(1)).is_none());
        assert!(history.redo(&img(1)).is_none());
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = EditHistory::new();
        history.push(&img(1), "a");
        history.undo(&img(2));
        assert!(history.can_redo());

        // Push new state should clear redo
        history.push(&img(1), "b");
        assert!(!history.can_redo());
        assert!(history.redo(&img(3)).is_none());
    }

    #[test]
    fn test_max_depth_keeps_most_recent() {
        let mut history = EditHistory::new();
        let total = MAX_HISTORY + 5;
        for i in 0..total {
            history.push(&img(i as u32 + 1), format!("step {i}"));
        }

        assert_eq!(history.undo_count(), MAX_HISTORY);
        let widths: Vec<u32> = history
            .undo_entries()
            .iter()
            .map(|s| s.image.width())
            .collect();
        let expected: Vec<u32> = (6..=total as u32).collect();
        assert_eq!(widths, expected);
    }

    #[test]
    fn test_redo_stack_is_bounded() {
        let mut history = EditHistory::with_config(HistoryConfig { max_depth: 3 });
        for i in 0..3 {
            history.push(&img(i + 1), "x");
        }
        // Alternate undo with an unrelated push-free redo stack growth
        let mut current = img(10);
        while let Some(prev) = history.undo(&current) {
            current = prev;
        }
        assert_eq!(history.redo_count(), 3);
        assert_eq!(history.undo_count(), 0);
        assert_eq!(current.width(), 1);
    }

    #[test]
    fn test_undo_redo_is_lifo() {
        let mut history = EditHistory::new();
        // States: 1 -> 2 -> 3 (current)
        history.push(&img(1), "to 2");
        history.push(&img(2), "to 3");
        let mut current = img(3);

        current = history.undo(&current).unwrap();
        assert_eq!(current.width(), 2);
        current = history.undo(&current).unwrap();
        assert_eq!(current.width(), 1);
        current = history.redo(&current).unwrap();
        assert_eq!(current.width(), 2);
        current = history.redo(&current).unwrap();
        assert_eq!(current.width(), 3);
        assert!(history.redo(&current).is_none());
    }

    #[test]
    fn test_snapshots_share_pixels_without_copy_on_undo() {
        let mut history = EditHistory::new();
        let original = img(4);
        history.push(&original, "edit");
        let restored = history.undo(&img(5)).unwrap();
        assert!(restored.same_buffer(&original));
    }
}
