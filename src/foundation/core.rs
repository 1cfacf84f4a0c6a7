use crate::foundation::error::{EmbedError, EmbedResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};

/// Host-assigned identity of one embedded platform view.
///
/// Never reused by the host while the view is alive.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ViewId(pub i64);

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Surface dimensions in physical pixels.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Create a size from raw dimensions.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel count.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Convert a logical size to physical pixels, rounding up.
    ///
    /// Fails for non-finite, negative or out-of-range results.
    pub fn from_logical(size: Size, device_pixel_ratio: f64) -> EmbedResult<Self> {
        fn dim(v: f64, dpr: f64, axis: &str) -> EmbedResult<u32> {
            let px = (v * dpr).ceil();
            if !px.is_finite() || px < 0.0 || px > f64::from(u32::MAX) {
                return Err(EmbedError::validation(format!(
                    "{axis} {v} x {dpr} does not fit in a pixel dimension"
                )));
            }
            Ok(px as u32)
        }

        Ok(Self {
            width: dim(size.width, device_pixel_ratio, "width")?,
            height: dim(size.height, device_pixel_ratio, "height")?,
        })
    }

    /// Size as a kurbo [`Size`] in pixel units.
    pub fn to_size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of a render target.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Premultiplied RGBA8, row-major, tightly packed.
    #[default]
    Rgba8Premul,
    /// Premultiplied BGRA8, the usual swapchain order on GPU hosts.
    Bgra8Premul,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8Premul | Self::Bgra8Premul => 4,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
