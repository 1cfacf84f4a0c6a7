use crate::embedder::layers::{LayerContent, PresentedLayer};
use crate::foundation::core::PixelSize;
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::target::{RenderTarget, RenderTargetDescriptor};

/// GPU-texture presentation backend.
pub mod gpu;
/// Host pixel-buffer presentation backend.
pub mod software;

/// How composited frames reach the host.
///
/// Implementations are driven from the render thread only.
pub trait SurfaceDelegate: Send {
    /// `false` while the host has no surface to present into. Frames are dropped meanwhile.
    fn is_available(&self) -> bool {
        true
    }

    /// Allocate a fresh render target of exactly `descriptor`'s shape. Called on cache misses.
    fn create_render_target(
        &mut self,
        descriptor: RenderTargetDescriptor,
    ) -> EmbedResult<RenderTarget>;

    /// Allocate the full-frame root target the background is drawn into.
    fn acquire_backing_store(&mut self, size: PixelSize) -> EmbedResult<RenderTarget>;

    /// `false` when layers can only be presented untransformed. Submitting under a non-identity
    /// root surface transformation is then a contract violation.
    fn supports_root_transformation(&self) -> bool {
        true
    }

    /// Present layers ordered bottom to top. The first layer is the root backing store.
    fn present(&mut self, layers: &[PresentedLayer<'_>]) -> EmbedResult<()>;
}

/// Verify the bottom layer is a backing store of exactly the last acquired size.
pub(crate) fn check_root_layer(
    layers: &[PresentedLayer<'_>],
    last_acquired: Option<PixelSize>,
) -> EmbedResult<PixelSize> {
    let Some(acquired) = last_acquired else {
        return Err(EmbedError::contract(
            "present called before any backing store was acquired",
        ));
    };
    let Some(first) = layers.first() else {
        return Err(EmbedError::contract("present called with no layers"));
    };
    let LayerContent::BackingStore(root) = &first.content else {
        return Err(EmbedError::contract(
            "bottom presented layer must be the root backing store",
        ));
    };
    if root.size() != acquired {
        return Err(EmbedError::contract(format!(
            "presented root is {} but the last acquired backing store is {acquired}",
            root.size()
        )));
    }
    Ok(acquired)
}
