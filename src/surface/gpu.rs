use std::sync::Arc;

use crate::embedder::layers::{LayerContent, PresentedLayer};
use crate::foundation::core::PixelSize;
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::target::{BackingStore, GpuTexture, RenderTarget, RenderTargetDescriptor};
use crate::surface::{SurfaceDelegate, check_root_layer};

/// Host graphics context shared between the host and the render thread.
pub trait GraphicsContext: Send + Sync + 'static {
    /// `false` while the context cannot be made current (e.g. the window is gone).
    fn is_current(&self) -> bool {
        true
    }

    /// Create a texture of `descriptor`'s shape.
    fn create_texture(&self, descriptor: RenderTargetDescriptor) -> anyhow::Result<GpuTexture>;

    /// Hand a texture back to the host. Called exactly once per created texture.
    fn collect_texture(&self, texture: GpuTexture);

    /// Present layers bottom to top.
    fn present_layers(&self, layers: &[PresentedLayer<'_>]) -> anyhow::Result<()>;
}

/// GPU backend: every store is a texture created by a shared [`GraphicsContext`].
pub struct GpuSurface<C> {
    context: Arc<C>,
    last_acquired: Option<PixelSize>,
}

impl<C: GraphicsContext> GpuSurface<C> {
    /// Present through `context`.
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            last_acquired: None,
        }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    fn allocate(&self, descriptor: RenderTargetDescriptor) -> EmbedResult<RenderTarget> {
        let texture = self.context.create_texture(descriptor).map_err(|e| {
            EmbedError::unavailable(format!("texture allocation failed for {descriptor:?}: {e:#}"))
        })?;
        if texture.size() != descriptor.size {
            self.context.collect_texture(texture);
            return Err(EmbedError::contract(format!(
                "graphics context returned a {} texture for a {} request",
                texture.size(),
                descriptor.size
            )));
        }

        let context = Arc::clone(&self.context);
        let target = RenderTarget::new(descriptor, BackingStore::Gpu(texture))?
            .with_collect_callback(move || context.collect_texture(texture));
        Ok(target)
    }
}

impl<C: GraphicsContext> SurfaceDelegate for GpuSurface<C> {
    fn is_available(&self) -> bool {
        self.context.is_current()
    }

    fn create_render_target(
        &mut self,
        descriptor: RenderTargetDescriptor,
    ) -> EmbedResult<RenderTarget> {
        self.allocate(descriptor)
    }

    fn acquire_backing_store(&mut self, size: PixelSize) -> EmbedResult<RenderTarget> {
        let target = self.allocate(RenderTargetDescriptor::new(size, Default::default()))?;
        self.last_acquired = Some(size);
        Ok(target)
    }

    fn present(&mut self, layers: &[PresentedLayer<'_>]) -> EmbedResult<()> {
        check_root_layer(layers, self.last_acquired)?;
        for layer in layers {
            if let LayerContent::BackingStore(store) = &layer.content
                && store.as_gpu().is_none()
            {
                return Err(EmbedError::contract(
                    "gpu surface cannot present a software backing store",
                ));
            }
        }
        self.context
            .present_layers(layers)
            .map_err(|e| EmbedError::unavailable(format!("gpu present failed: {e:#}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/gpu.rs"]
mod tests;
