//! Interface to laid-out text blocks produced by an external shaper.
//!
//! The compositor treats text as draw input only. These types describe what callers may query
//! from a measured block: line metrics, boxes for ranges, hit testing and boundaries.

use std::ops::Range;

use crate::foundation::core::{Point, Rect};

/// Metrics of one laid-out line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineMetrics {
    /// Line ends with an explicit break rather than a wrap.
    pub hard_break: bool,
    pub ascent: f64,
    pub descent: f64,
    /// Ascent before any height override.
    pub unscaled_ascent: f64,
    /// `round(ascent + descent)`.
    pub height: f64,
    pub width: f64,
    /// Left edge of the line.
    pub left: f64,
    /// Baseline y from the top of the block.
    pub baseline: f64,
    /// Zero-based.
    pub line_number: usize,
    /// First UTF-16 code unit of the line.
    pub start_index: usize,
    /// One past the last code unit, excluding trailing whitespace.
    pub end_index: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextDirection {
    Rtl,
    #[default]
    Ltr,
}

/// A rectangle covering part of a text range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBox {
    pub rect: Rect,
    pub direction: TextDirection,
}

/// Which side of a position a caret sticks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Affinity {
    Upstream,
    #[default]
    Downstream,
}

/// Result of hit testing a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextPosition {
    pub offset: usize,
    pub affinity: Affinity,
}

/// How tall the boxes of [`MeasuredText::boxes_for_range`] are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxHeightStyle {
    /// Tight around the glyphs.
    #[default]
    Tight,
    /// Full line height.
    Max,
}

/// How wide the boxes of [`MeasuredText::boxes_for_range`] are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxWidthStyle {
    #[default]
    Tight,
    /// Extend the last box of each line to the widest line.
    Max,
}

/// An opaque, already laid-out text block.
pub trait MeasuredText {
    /// Width constraint the block was laid out with.
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn longest_line(&self) -> f64;
    fn min_intrinsic_width(&self) -> f64;
    fn max_intrinsic_width(&self) -> f64;
    fn alphabetic_baseline(&self) -> f64;
    fn ideographic_baseline(&self) -> f64;
    fn did_exceed_max_lines(&self) -> bool;

    fn line_metrics(&self) -> Vec<LineMetrics>;

    /// Boxes enclosing the glyphs of `range`, in block coordinates.
    fn boxes_for_range(
        &self,
        range: Range<usize>,
        height_style: BoxHeightStyle,
        width_style: BoxWidthStyle,
    ) -> Vec<TextBox>;

    /// Boxes of inline placeholders, in placeholder order.
    fn placeholder_boxes(&self) -> Vec<TextBox>;

    /// Text position closest to `point`.
    fn position_for_point(&self, point: Point) -> TextPosition;

    /// Word containing `offset`.
    fn word_boundary(&self, offset: usize) -> Range<usize>;

    /// Line containing `offset`. An offset at a line's end belongs to that line.
    fn line_boundary(&self, offset: usize) -> Option<Range<usize>> {
        self.line_metrics()
            .into_iter()
            .find(|line| (line.start_index..=line.end_index).contains(&offset))
            .map(|line| line.start_index..line.end_index)
    }

    /// Zero-based line number containing `offset`.
    fn line_number_at(&self, offset: usize) -> Option<usize> {
        self.line_metrics()
            .into_iter()
            .find(|line| (line.start_index..=line.end_index).contains(&offset))
            .map(|line| line.line_number)
    }
}

#[cfg(test)]
#[path = "../tests/unit/text.rs"]
mod tests;
