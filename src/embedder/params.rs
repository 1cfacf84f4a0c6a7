use crate::foundation::core::{Affine, BezPath, PixelSize, Point, Rect, Size, Vec2};
use crate::foundation::error::{EmbedError, EmbedResult};

/// Rectangle with independent elliptical corner radii.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipRoundedRect {
    /// Outer bounds.
    pub rect: Rect,
    /// Corner radii (x, y): upper-left, upper-right, lower-right, lower-left.
    pub radii: [Vec2; 4],
}

impl ClipRoundedRect {
    /// Rounded rect with the same circular radius on every corner.
    pub fn uniform(rect: Rect, radius: f64) -> Self {
        Self {
            rect,
            radii: [Vec2::new(radius, radius); 4],
        }
    }
}

/// One entry of the mutation stack applied to a platform view by its ancestors.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutator {
    /// Axis-aligned clip.
    ClipRect(Rect),
    /// Rounded-rect clip.
    ClipRoundedRect(ClipRoundedRect),
    /// Arbitrary path clip.
    ClipPath(BezPath),
    /// Affine transform.
    Transform(Affine),
    /// Group opacity in `[0, 1]`.
    Opacity(f32),
}

/// Mutators ordered from the root (bottom) to the view (top).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutatorsStack {
    mutators: Vec<Mutator>,
}

impl MutatorsStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a mutator on top.
    pub fn push(&mut self, mutator: Mutator) {
        self.mutators.push(mutator);
    }

    /// Builder-style [`MutatorsStack::push`].
    pub fn with(mut self, mutator: Mutator) -> Self {
        self.push(mutator);
        self
    }

    /// Remove the top mutator.
    pub fn pop(&mut self) -> Option<Mutator> {
        self.mutators.pop()
    }

    /// Iterate bottom to top.
    pub fn iter(&self) -> std::slice::Iter<'_, Mutator> {
        self.mutators.iter()
    }

    /// Number of mutators.
    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    /// `true` when no mutator applies.
    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    /// Combined opacity of every opacity mutator, clamped to `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.mutators
            .iter()
            .filter_map(|m| match m {
                Mutator::Opacity(a) => Some(a.clamp(0.0, 1.0)),
                _ => None,
            })
            .product()
    }
}

/// Placement of one platform view for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedViewParams {
    /// Top-left corner in physical pixels.
    pub offset_pixels: Point,
    /// Size in logical points.
    pub size_points: Size,
    /// Ancestor mutations, bottom to top.
    pub mutators: MutatorsStack,
}

impl EmbeddedViewParams {
    /// Placement without mutations.
    pub fn new(offset_pixels: Point, size_points: Size) -> Self {
        Self {
            offset_pixels,
            size_points,
            mutators: MutatorsStack::new(),
        }
    }

    /// Replace the mutation stack.
    pub fn with_mutators(mut self, mutators: MutatorsStack) -> Self {
        self.mutators = mutators;
        self
    }

    /// Physical size of the view's overlay. Zero-area views are rejected.
    pub fn pixel_size(&self, device_pixel_ratio: f64) -> EmbedResult<PixelSize> {
        if !self.offset_pixels.x.is_finite() || !self.offset_pixels.y.is_finite() {
            return Err(EmbedError::contract(format!(
                "platform view offset must be finite, got {:?}",
                self.offset_pixels
            )));
        }
        let size = PixelSize::from_logical(self.size_points, device_pixel_ratio)
            .map_err(|e| EmbedError::contract(format!("invalid platform view size: {e}")))?;
        if size.is_empty() {
            return Err(EmbedError::contract(format!(
                "platform view must have a non-empty size, got {size}"
            )));
        }
        Ok(size)
    }

    /// Bounds in physical pixels, before the root surface transformation.
    pub fn pixel_bounds(&self, device_pixel_ratio: f64) -> Rect {
        Rect::from_origin_size(
            self.offset_pixels,
            Size::new(
                self.size_points.width * device_pixel_ratio,
                self.size_points.height * device_pixel_ratio,
            ),
        )
    }
}
