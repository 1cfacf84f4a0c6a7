#![forbid(unsafe_code)]
//! `embedframe` composites host-drawn platform views with engine-rendered overlays, one frame
//! per vsync, reusing overlay render targets across frames.
//!
//! The render thread owns a [`FramePipeline`], which drives an [`ExternalViewEmbedder`] through
//! begin, preroll, composite, submit and finish for every vsync delivered by its
//! [`VsyncWaiter`]. Frames reach the host through a [`SurfaceDelegate`].

pub mod config;
pub mod embedder;
mod foundation;
pub mod pipeline;
pub mod render;
pub mod surface;
pub mod text;
pub mod vsync;

pub use config::{DuplicatePrerollPolicy, EmbedderOpts, PipelineOpts};
pub use embedder::layers::{LayerContent, PlatformViewLayer, PlatformViewMutation, PresentedLayer};
pub use embedder::params::{ClipRoundedRect, EmbeddedViewParams, Mutator, MutatorsStack};
pub use embedder::{ExternalViewEmbedder, FrameState};
pub use foundation::core::{
    Affine, BezPath, PixelFormat, PixelSize, Point, Rect, Size, Vec2, ViewId,
};
pub use foundation::error::{EmbedError, EmbedResult};
pub use foundation::trace::{TraceId, next_id};
pub use pipeline::{
    FrameOutcome, FramePipeline, FrameProducer, PipelineHandle, PipelineStats, PipelineTask,
};
pub use render::target::{
    BackingStore, CollectCallback, GpuTexture, RenderTarget, RenderTargetDescriptor,
    SoftwareBuffer,
};
pub use render::target_cache::{
    RenderTargetCache, RenderTargetCacheOpts, RenderTargetCacheStats, ResolvedTargets,
};
pub use surface::SurfaceDelegate;
pub use surface::gpu::{GpuSurface, GraphicsContext};
pub use surface::software::{SoftwarePresenter, SoftwareSurface};
pub use vsync::{FrameTiming, VsyncRegistry, VsyncSource, VsyncToken, VsyncWaiter, WaiterPhase};
