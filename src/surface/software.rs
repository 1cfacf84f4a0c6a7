use crate::embedder::layers::{LayerContent, PresentedLayer};
use crate::foundation::core::{PixelFormat, PixelSize, Rect};
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::composite::over_at;
use crate::render::target::{BackingStore, RenderTarget, RenderTargetDescriptor, SoftwareBuffer};
use crate::surface::{SurfaceDelegate, check_root_layer};

/// Host side of software presentation: receives the flattened frame.
pub trait SoftwarePresenter: Send {
    /// Present premultiplied RGBA8 rows. Returns `false` when the host rejected the frame.
    fn present(&mut self, allocation: &[u8], row_bytes: usize, height: usize) -> bool;
}

impl<F> SoftwarePresenter for F
where
    F: FnMut(&[u8], usize, usize) -> bool + Send,
{
    fn present(&mut self, allocation: &[u8], row_bytes: usize, height: usize) -> bool {
        self(allocation, row_bytes, height)
    }
}

/// Software backend: flattens engine layers into one pixel buffer and hands it to the host.
///
/// Platform view layers are composited by the host itself and are skipped here. Overlay pixels
/// are blitted untransformed, so the root surface transformation must stay the identity.
pub struct SoftwareSurface<P> {
    presenter: P,
    last_acquired: Option<PixelSize>,
    frame: Vec<u8>,
}

impl<P: SoftwarePresenter> SoftwareSurface<P> {
    /// Wrap a host presenter.
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            last_acquired: None,
            frame: Vec::new(),
        }
    }

    /// Borrow the host presenter.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}

impl<P: SoftwarePresenter> SurfaceDelegate for SoftwareSurface<P> {
    fn create_render_target(
        &mut self,
        descriptor: RenderTargetDescriptor,
    ) -> EmbedResult<RenderTarget> {
        if descriptor.format != PixelFormat::Rgba8Premul || descriptor.sample_count != 1 {
            return Err(EmbedError::validation(format!(
                "software surfaces support single-sampled rgba8 only, got {descriptor:?}"
            )));
        }
        let store = SoftwareBuffer::new(descriptor.size)
            .map_err(|e| EmbedError::unavailable(format!("software allocation failed: {e}")))?;
        RenderTarget::new(descriptor, BackingStore::Software(store))
    }

    fn supports_root_transformation(&self) -> bool {
        false
    }

    fn acquire_backing_store(&mut self, size: PixelSize) -> EmbedResult<RenderTarget> {
        let target = self.create_render_target(RenderTargetDescriptor::new(
            size,
            PixelFormat::Rgba8Premul,
        ))?;
        self.last_acquired = Some(size);
        Ok(target)
    }

    fn present(&mut self, layers: &[PresentedLayer<'_>]) -> EmbedResult<()> {
        let size = check_root_layer(layers, self.last_acquired)?;
        let frame_rect = Rect::new(0.0, 0.0, f64::from(size.width), f64::from(size.height));
        if layers[0].bounds() != frame_rect {
            return Err(EmbedError::contract(format!(
                "software surface presents untransformed layers, but the root spans {:?}",
                layers[0].bounds()
            )));
        }

        self.frame.clear();
        for layer in layers {
            let LayerContent::BackingStore(store) = &layer.content else {
                continue;
            };
            let Some(buf) = store.as_software() else {
                return Err(EmbedError::contract(
                    "software surface cannot present a gpu backing store",
                ));
            };
            if self.frame.is_empty() {
                self.frame.extend_from_slice(buf.data());
                continue;
            }
            let origin = (
                layer.offset.x.round() as i64,
                layer.offset.y.round() as i64,
            );
            over_at(&mut self.frame, size, buf.data(), buf.size(), origin, 1.0)?;
        }

        let row_bytes = size.width as usize * 4;
        if !self
            .presenter
            .present(&self.frame, row_bytes, size.height as usize)
        {
            return Err(EmbedError::unavailable("host rejected the software frame"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/software.rs"]
mod tests;
