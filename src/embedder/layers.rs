//! Conversion of one frame's state into the ordered layer list handed to the present
//! collaborator.

use crate::embedder::params::{ClipRoundedRect, EmbeddedViewParams, Mutator};
use crate::foundation::core::{Affine, PixelSize, Point, Rect, Size, ViewId};
use crate::render::target::BackingStore;

/// Mutation the host applies to a platform view when compositing it natively.
#[derive(Clone, Debug, PartialEq)]
pub enum PlatformViewMutation {
    /// Opacity strictly below 1.
    Opacity(f64),
    /// Axis-aligned clip.
    ClipRect(Rect),
    /// Rounded-rect clip.
    ClipRoundedRect(ClipRoundedRect),
    /// Non-identity transform.
    Transformation(Affine),
}

/// A platform view entry in the presented layer list.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformViewLayer {
    /// Which view the host should draw.
    pub identifier: ViewId,
    /// Mutations to apply, outermost first.
    pub mutations: Vec<PlatformViewMutation>,
}

/// Content of one presented layer.
#[derive(Debug)]
pub enum LayerContent<'a> {
    /// Engine-rendered pixels (the background or a view's overlay).
    BackingStore(&'a BackingStore),
    /// A host-drawn platform view.
    PlatformView(PlatformViewLayer),
}

/// One layer of a presented frame, positioned in root surface pixels.
#[derive(Debug)]
pub struct PresentedLayer<'a> {
    /// Layer content.
    pub content: LayerContent<'a>,
    /// Top-left corner.
    pub offset: Point,
    /// Extent.
    pub size: Size,
}

impl PresentedLayer<'_> {
    /// Bounds as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.offset, self.size)
    }
}

/// Accumulates layers bottom to top for one frame.
pub(crate) struct LayerBuilder<'a> {
    frame_size: PixelSize,
    device_pixel_ratio: f64,
    root_transform: Affine,
    layers: Vec<PresentedLayer<'a>>,
}

impl<'a> LayerBuilder<'a> {
    pub(crate) fn new(
        frame_size: PixelSize,
        device_pixel_ratio: f64,
        root_transform: Affine,
    ) -> Self {
        Self {
            frame_size,
            device_pixel_ratio,
            root_transform,
            layers: Vec::new(),
        }
    }

    /// Full-frame engine layer.
    pub(crate) fn push_backing_store_layer(&mut self, store: &'a BackingStore) {
        let bounds = Rect::from_origin_size(Point::ZERO, self.frame_size.to_size());
        self.push(LayerContent::BackingStore(store), bounds);
    }

    /// Engine overlay drawn directly above a platform view, sized to its overlay target.
    pub(crate) fn push_overlay_layer(
        &mut self,
        store: &'a BackingStore,
        params: &EmbeddedViewParams,
    ) {
        let bounds = Rect::from_origin_size(params.offset_pixels, store.size().to_size());
        self.push(LayerContent::BackingStore(store), bounds);
    }

    pub(crate) fn push_platform_view_layer(
        &mut self,
        identifier: ViewId,
        params: &EmbeddedViewParams,
    ) {
        let mut mutations = Vec::new();
        for mutator in params.mutators.iter() {
            match mutator {
                Mutator::ClipRect(rect) => mutations.push(PlatformViewMutation::ClipRect(*rect)),
                Mutator::ClipRoundedRect(rrect) => {
                    mutations.push(PlatformViewMutation::ClipRoundedRect(*rrect))
                }
                Mutator::ClipPath(_) => {
                    tracing::trace!(%identifier, "path clips are not forwarded to the host");
                }
                Mutator::Transform(matrix) => {
                    if *matrix != Affine::IDENTITY {
                        mutations.push(PlatformViewMutation::Transformation(*matrix));
                    }
                }
                Mutator::Opacity(alpha) => {
                    let opacity = f64::from(alpha.clamp(0.0, 1.0));
                    if opacity < 1.0 {
                        mutations.push(PlatformViewMutation::Opacity(opacity));
                    }
                }
            }
        }

        if !mutations.is_empty() {
            // Mutations are expressed in root surface space, so the root transform applies last.
            if self.root_transform != Affine::IDENTITY {
                mutations.push(PlatformViewMutation::Transformation(self.root_transform));
            }
            mutations.reverse();
        }

        let bounds = params.pixel_bounds(self.device_pixel_ratio);
        self.push(
            LayerContent::PlatformView(PlatformViewLayer {
                identifier,
                mutations,
            }),
            bounds,
        );
    }

    pub(crate) fn finish(self) -> Vec<PresentedLayer<'a>> {
        self.layers
    }

    fn push(&mut self, content: LayerContent<'a>, bounds: Rect) {
        let bounds = self.root_transform.transform_rect_bbox(bounds);
        self.layers.push(PresentedLayer {
            content,
            offset: bounds.origin(),
            size: bounds.size(),
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/embedder/layers.rs"]
mod tests;
