use crate::foundation::core::{PixelFormat, PixelSize};
use crate::foundation::error::{EmbedError, EmbedResult};

/// Shape of a render target: the pooling key. Not an identity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RenderTargetDescriptor {
    /// Size in physical pixels.
    pub size: PixelSize,
    /// Pixel layout.
    pub format: PixelFormat,
    /// MSAA sample count, at least 1.
    pub sample_count: u32,
}

impl RenderTargetDescriptor {
    /// Single-sampled descriptor.
    pub fn new(size: PixelSize, format: PixelFormat) -> Self {
        Self {
            size,
            format,
            sample_count: 1,
        }
    }

    /// Same shape with a different sample count.
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Approximate backing memory, used for pool accounting.
    pub fn byte_len(self) -> usize {
        (self.size.area() as usize)
            .saturating_mul(self.format.bytes_per_pixel())
            .saturating_mul(self.sample_count.max(1) as usize)
    }
}

/// Texture handle owned by an external graphics context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuTexture {
    /// Texture target enum of the host API (e.g. `GL_TEXTURE_2D`).
    pub target: u32,
    /// Host texture name.
    pub name: u32,
    /// Host internal format enum.
    pub format: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl GpuTexture {
    /// Texture dimensions.
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }
}

/// CPU pixel memory backing a software render target.
pub struct SoftwareBuffer {
    size: PixelSize,
    pixmap: vello_cpu::Pixmap,
}

impl SoftwareBuffer {
    /// Allocate a zeroed (transparent) buffer.
    pub fn new(size: PixelSize) -> EmbedResult<Self> {
        if size.is_empty() {
            return Err(EmbedError::validation(format!(
                "software buffer must be non-empty, got {size}"
            )));
        }
        let w: u16 = size.width.try_into().map_err(|_| {
            EmbedError::validation(format!("software buffer width exceeds u16: {}", size.width))
        })?;
        let h: u16 = size.height.try_into().map_err(|_| {
            EmbedError::validation(format!(
                "software buffer height exceeds u16: {}",
                size.height
            ))
        })?;
        Ok(Self {
            size,
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    /// Buffer dimensions.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.size.width as usize * 4
    }

    /// Premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Mutable premultiplied RGBA8 bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Underlying pixmap, for drawing with `vello_cpu`.
    pub fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }
}

/// The drawable memory behind a render target.
pub enum BackingStore {
    /// Host-visible CPU pixels.
    Software(SoftwareBuffer),
    /// Texture in a shared graphics context.
    Gpu(GpuTexture),
}

impl BackingStore {
    /// Store dimensions.
    pub fn size(&self) -> PixelSize {
        match self {
            Self::Software(buf) => buf.size(),
            Self::Gpu(tex) => tex.size(),
        }
    }

    /// Software buffer, if this is a CPU store.
    pub fn as_software(&self) -> Option<&SoftwareBuffer> {
        match self {
            Self::Software(buf) => Some(buf),
            Self::Gpu(_) => None,
        }
    }

    /// Mutable software buffer, if this is a CPU store.
    pub fn as_software_mut(&mut self) -> Option<&mut SoftwareBuffer> {
        match self {
            Self::Software(buf) => Some(buf),
            Self::Gpu(_) => None,
        }
    }

    /// GPU texture, if this is a GPU store.
    pub fn as_gpu(&self) -> Option<&GpuTexture> {
        match self {
            Self::Software(_) => None,
            Self::Gpu(tex) => Some(tex),
        }
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software(buf) => f
                .debug_struct("Software")
                .field("size", &buf.size())
                .finish(),
            Self::Gpu(tex) => f.debug_tuple("Gpu").field(tex).finish(),
        }
    }
}

/// Hook run once when a render target is released, handing the store back to its host.
pub type CollectCallback = Box<dyn FnOnce() + Send>;

/// An allocated drawable surface together with the shape it was allocated for.
///
/// Dropping a target runs its collect callback exactly once.
pub struct RenderTarget {
    descriptor: RenderTargetDescriptor,
    store: BackingStore,
    collect: Option<CollectCallback>,
}

impl RenderTarget {
    /// Wrap a store. The store must have exactly the descriptor's size.
    pub fn new(descriptor: RenderTargetDescriptor, store: BackingStore) -> EmbedResult<Self> {
        if store.size() != descriptor.size {
            return Err(EmbedError::contract(format!(
                "backing store is {} but descriptor requires {}",
                store.size(),
                descriptor.size
            )));
        }
        Ok(Self {
            descriptor,
            store,
            collect: None,
        })
    }

    /// Attach the hook that returns the store to its host on release.
    pub fn with_collect_callback(mut self, collect: impl FnOnce() + Send + 'static) -> Self {
        self.collect = Some(Box::new(collect));
        self
    }

    /// Shape this target was allocated for.
    pub fn descriptor(&self) -> RenderTargetDescriptor {
        self.descriptor
    }

    /// Drawable store.
    pub fn surface(&self) -> &BackingStore {
        &self.store
    }

    /// Mutable drawable store.
    pub fn surface_mut(&mut self) -> &mut BackingStore {
        &mut self.store
    }

    /// Clear CPU pixels to transparent. GPU stores are cleared by their host.
    pub(crate) fn reset_contents(&mut self) {
        if let BackingStore::Software(buf) = &mut self.store {
            buf.data_mut().fill(0);
        }
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if let Some(collect) = self.collect.take() {
            collect();
        }
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("descriptor", &self.descriptor)
            .field("store", &self.store)
            .field("collects", &self.collect.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/target.rs"]
mod tests;
