//! Selected region geometry and selection completion rules.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Minimum accepted selection width and height, in pixels.
pub const MIN_SELECTION_SIZE: u32 = 5;

/// Presses shorter than this are treated as clicks, not drags.
pub const MIN_PRESS_DURATION: Duration = Duration::from_millis(100);

// ============================================================================
// Point / ScrollOffset
// ============================================================================

/// Pointer position in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Current document scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOffset {
    /// `window.scrollX`.
    pub x: i32,
    /// `window.scrollY`.
    pub y: i32,
}

// ============================================================================
// SelectedRegion
// ============================================================================

/// A user-selected rectangle, persisted as `selectedArea`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRegion {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SelectedRegion {
    /// Creates a region without validation.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Builds the normalized rectangle spanned by two corners.
    #[must_use]
    pub fn from_corners(start: Point, end: Point) -> Self {
        Self {
            left: start.x.min(end.x),
            top: start.y.min(end.y),
            width: start.x.abs_diff(end.x),
            height: start.y.abs_diff(end.y),
        }
    }

    /// Returns `true` when both dimensions are positive.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Checks the region can be captured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegion`] for a zero-sized region.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::invalid_region(format!(
                "region {}x{} has no area",
                self.width, self.height
            )))
        }
    }

    /// Translates the region into document coordinates.
    #[inline]
    #[must_use]
    pub fn scrolled(&self, scroll: ScrollOffset) -> Self {
        Self {
            left: self.left.saturating_add(scroll.x),
            top: self.top.saturating_add(scroll.y),
            ..*self
        }
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for SelectedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

// ============================================================================
// SelectionGesture
// ============================================================================

/// Why a drag did not produce a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRejection {
    /// Press and release at the same point.
    NoDrag,
    /// Rectangle below [`MIN_SELECTION_SIZE`], press too short, or no movement.
    TooSmall,
}

impl SelectionRejection {
    /// Message shown in the selection overlay.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoDrag => "Area too small! Click and drag to create an area.",
            Self::TooSmall => "Area too small! Select a larger area.",
        }
    }
}

impl fmt::Display for SelectionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A completed mouse drag over the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionGesture {
    /// Press position.
    pub start: Point,
    /// Release position.
    pub end: Point,
    /// Time between press and release.
    pub held_for: Duration,
    /// Whether any pointer movement was observed while pressed.
    pub moved: bool,
}

impl SelectionGesture {
    /// Creates a gesture from press/release positions.
    #[must_use]
    pub fn new(start: Point, end: Point, held_for: Duration) -> Self {
        Self {
            start,
            end,
            held_for,
            moved: start != end,
        }
    }

    /// Turns the gesture into a region, or explains the rejection.
    ///
    /// # Errors
    ///
    /// Returns the [`SelectionRejection`] when the drag is too small, too
    /// short, or did not move.
    pub fn complete(&self) -> std::result::Result<SelectedRegion, SelectionRejection> {
        let region = SelectedRegion::from_corners(self.start, self.end);

        if self.start == self.end {
            return Err(SelectionRejection::NoDrag);
        }

        if region.width < MIN_SELECTION_SIZE
            || region.height < MIN_SELECTION_SIZE
            || self.held_for < MIN_PRESS_DURATION
            || !self.moved
        {
            return Err(SelectionRejection::TooSmall);
        }

        Ok(region)
    }
}

// ============================================================================
// Tests
// ============================================================================
