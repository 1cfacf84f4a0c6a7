//! The per-frame state machine that composites platform views with engine content.
//!
//! A frame runs `begin_frame`, then one `preroll_composite_embedded_view` per platform view in
//! paint order, then `composite_embedded_view` for each view whose overlay is drawn, then
//! `submit_frame` and `finish_frame`. Overlay targets are resolved against the
//! [`RenderTargetCache`] once, after the last preroll, and returned to it when the frame ends.

use std::collections::HashMap;

use crate::config::{DuplicatePrerollPolicy, EmbedderOpts};
use crate::embedder::layers::LayerBuilder;
use crate::embedder::params::EmbeddedViewParams;
use crate::foundation::core::{Affine, PixelSize, ViewId};
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::foundation::trace::{self, TraceId};
use crate::render::target::{RenderTarget, RenderTargetDescriptor};
use crate::render::target_cache::{RenderTargetCache, RenderTargetCacheStats};
use crate::surface::SurfaceDelegate;

/// Presented layer list construction.
pub mod layers;
/// Platform view placement and mutators.
pub mod params;

/// Where the embedder is in the frame lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames.
    Idle,
    /// `begin_frame` ran, no view declared yet.
    Began,
    /// At least one view declared.
    Preroll,
    /// Overlay targets resolved; no more declarations.
    Composited,
    /// Handed to the delegate (or dropped). Only `finish_frame` remains.
    Submitted,
}

struct PendingView {
    params: EmbeddedViewParams,
    descriptor: RenderTargetDescriptor,
}

/// Frame-scoped state. Everything here is cleared by [`FrameBuffer::reset`].
#[derive(Default)]
struct FrameBuffer {
    trace_id: Option<TraceId>,
    frame_size: PixelSize,
    device_pixel_ratio: f64,
    pending: HashMap<ViewId, PendingView>,
    order: Vec<ViewId>,
    targets: HashMap<ViewId, RenderTarget>,
    resolved: bool,
}

impl FrameBuffer {
    fn reset(&mut self) -> Vec<(ViewId, RenderTarget)> {
        let mut targets = std::mem::take(&mut self.targets);
        // Composition order first so recycling is deterministic.
        let mut out: Vec<(ViewId, RenderTarget)> = self
            .order
            .iter()
            .filter_map(|id| targets.remove(id).map(|t| (*id, t)))
            .collect();
        out.extend(targets);
        *self = Self::default();
        out
    }
}

/// Composites host-drawn platform views with engine overlays, one frame at a time.
///
/// Lives on the render thread. Every operation takes `&mut self`.
pub struct ExternalViewEmbedder {
    opts: EmbedderOpts,
    state: FrameState,
    frame: FrameBuffer,
    cache: RenderTargetCache,
    delegate: Option<Box<dyn SurfaceDelegate>>,
    root_transform: Affine,
}

impl ExternalViewEmbedder {
    /// Create an idle embedder with no delegate.
    pub fn new(opts: EmbedderOpts) -> EmbedResult<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            state: FrameState::Idle,
            frame: FrameBuffer::default(),
            cache: RenderTargetCache::new(opts.cache),
            delegate: None,
            root_transform: Affine::IDENTITY,
        })
    }

    /// Install the presentation backend, returning the previous one.
    pub fn set_delegate(
        &mut self,
        delegate: Box<dyn SurfaceDelegate>,
    ) -> Option<Box<dyn SurfaceDelegate>> {
        self.delegate.replace(delegate)
    }

    /// Remove the presentation backend. Later frames are dropped until a new one is set.
    pub fn take_delegate(&mut self) -> Option<Box<dyn SurfaceDelegate>> {
        self.delegate.take()
    }

    /// Transform from frame pixels to the host's root surface, applied to every layer.
    pub fn set_root_surface_transformation(&mut self, transform: Affine) {
        self.root_transform = transform;
    }

    pub fn opts(&self) -> EmbedderOpts {
        self.opts
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Views declared this frame, in paint order.
    pub fn composition_order(&self) -> &[ViewId] {
        &self.frame.order
    }

    pub fn cache_stats(&self) -> RenderTargetCacheStats {
        self.cache.stats()
    }

    /// Trace id of the frame in progress.
    pub fn current_trace_id(&self) -> Option<TraceId> {
        self.frame.trace_id
    }

    /// Size of the frame in progress.
    pub fn frame_size(&self) -> Option<PixelSize> {
        (self.state != FrameState::Idle).then_some(self.frame.frame_size)
    }

    #[tracing::instrument(skip(self))]
    pub fn begin_frame(
        &mut self,
        frame_size: PixelSize,
        device_pixel_ratio: f64,
    ) -> EmbedResult<TraceId> {
        if self.state != FrameState::Idle {
            return Err(EmbedError::contract(format!(
                "begin_frame called in state {:?}",
                self.state
            )));
        }
        if !device_pixel_ratio.is_finite() || device_pixel_ratio <= 0.0 {
            return Err(EmbedError::validation(format!(
                "device pixel ratio must be finite and > 0, got {device_pixel_ratio}"
            )));
        }
        if frame_size.is_empty() {
            return Err(EmbedError::validation(format!(
                "frame size must be non-empty, got {frame_size}"
            )));
        }

        let trace_id = trace::next_id();
        self.frame.trace_id = Some(trace_id);
        self.frame.frame_size = frame_size;
        self.frame.device_pixel_ratio = device_pixel_ratio;
        self.state = FrameState::Began;
        Ok(trace_id)
    }

    /// Declare a platform view for this frame, in paint order.
    pub fn preroll_composite_embedded_view(
        &mut self,
        id: ViewId,
        params: EmbeddedViewParams,
    ) -> EmbedResult<()> {
        if !matches!(self.state, FrameState::Began | FrameState::Preroll) {
            return Err(EmbedError::contract(format!(
                "{id} prerolled in state {:?}",
                self.state
            )));
        }

        let size = params.pixel_size(self.frame.device_pixel_ratio)?;
        let descriptor = RenderTargetDescriptor::new(size, self.opts.pixel_format)
            .with_sample_count(self.opts.sample_count);

        if self.frame.pending.contains_key(&id) {
            match self.opts.duplicate_preroll {
                DuplicatePrerollPolicy::Reject => {
                    return Err(EmbedError::contract(format!(
                        "{id} prerolled twice in one frame"
                    )));
                }
                DuplicatePrerollPolicy::LastWriteWins => {
                    self.frame.order.retain(|v| *v != id);
                }
            }
        }

        self.frame
            .pending
            .insert(id, PendingView { params, descriptor });
        self.frame.order.push(id);
        self.state = FrameState::Preroll;
        Ok(())
    }

    /// Drawable overlay for `id`, resolving every declared view's target on first use.
    pub fn composite_embedded_view(&mut self, id: ViewId) -> EmbedResult<&mut RenderTarget> {
        if !matches!(self.state, FrameState::Preroll | FrameState::Composited) {
            return Err(EmbedError::contract(format!(
                "{id} composited in state {:?}",
                self.state
            )));
        }
        if !self.frame.pending.contains_key(&id) {
            return Err(EmbedError::contract(format!(
                "{id} composited without being prerolled this frame"
            )));
        }

        self.ensure_resolved()?;
        self.frame
            .targets
            .get_mut(&id)
            .ok_or_else(|| EmbedError::contract(format!("{id} has no render target this frame")))
    }

    /// Allocate the full-frame background target from the delegate.
    pub fn acquire_root_surface(&mut self) -> EmbedResult<RenderTarget> {
        if !matches!(
            self.state,
            FrameState::Began | FrameState::Preroll | FrameState::Composited
        ) {
            return Err(EmbedError::contract(format!(
                "root surface acquired in state {:?}",
                self.state
            )));
        }
        let size = self.frame.frame_size;
        let delegate = self
            .delegate
            .as_deref_mut()
            .ok_or_else(|| EmbedError::unavailable("no surface delegate installed"))?;
        delegate.acquire_backing_store(size)
    }

    /// Present `background` with every declared view and its overlay.
    ///
    /// `Ok(false)` means the frame was dropped because the delegate is missing, unavailable, or
    /// failed to present. The frame still has to be finished.
    #[tracing::instrument(skip(self, background), fields(trace_id = ?self.frame.trace_id))]
    pub fn submit_frame(&mut self, background: &RenderTarget) -> EmbedResult<bool> {
        if !matches!(
            self.state,
            FrameState::Began | FrameState::Preroll | FrameState::Composited
        ) {
            return Err(EmbedError::contract(format!(
                "submit_frame called in state {:?}",
                self.state
            )));
        }
        if background.descriptor().size != self.frame.frame_size {
            return Err(EmbedError::contract(format!(
                "background is {} but the frame is {}",
                background.descriptor().size,
                self.frame.frame_size
            )));
        }

        self.ensure_resolved()?;
        self.state = FrameState::Submitted;

        let Some(delegate) = self.delegate.as_deref_mut() else {
            tracing::warn!("dropping frame: no surface delegate installed");
            return Ok(false);
        };
        if !delegate.is_available() {
            tracing::warn!("dropping frame: surface delegate unavailable");
            return Ok(false);
        }
        if self.root_transform != Affine::IDENTITY && !delegate.supports_root_transformation() {
            return Err(EmbedError::contract(
                "surface delegate cannot present under a root surface transformation",
            ));
        }

        let frame = &self.frame;
        let mut builder =
            LayerBuilder::new(frame.frame_size, frame.device_pixel_ratio, self.root_transform);
        builder.push_backing_store_layer(background.surface());
        for id in &frame.order {
            let Some(view) = frame.pending.get(id) else {
                continue;
            };
            builder.push_platform_view_layer(*id, &view.params);
            if let Some(target) = frame.targets.get(id) {
                builder.push_overlay_layer(target.surface(), &view.params);
            }
        }
        let layers = builder.finish();

        match delegate.present(&layers) {
            Ok(()) => Ok(true),
            Err(err) if err.is_contract_violation() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "dropping frame: present failed");
                Ok(false)
            }
        }
    }

    /// End the frame: return every overlay target to the cache, age the pool, go idle.
    #[tracing::instrument(skip(self), fields(trace_id = ?self.frame.trace_id))]
    pub fn finish_frame(&mut self) -> EmbedResult<()> {
        if self.state == FrameState::Idle {
            return Err(EmbedError::contract("finish_frame called with no frame"));
        }
        self.recycle_frame();
        Ok(())
    }

    /// Abandon the frame without presenting. Targets are still recycled.
    pub fn cancel_frame(&mut self) -> EmbedResult<()> {
        if !matches!(
            self.state,
            FrameState::Began | FrameState::Preroll | FrameState::Composited
        ) {
            return Err(EmbedError::contract(format!(
                "cancel_frame called in state {:?}",
                self.state
            )));
        }
        tracing::debug!(trace_id = ?self.frame.trace_id, "frame cancelled");
        self.recycle_frame();
        Ok(())
    }

    /// Forget `id` for the frame in progress. Returns `true` when it was declared.
    pub fn view_destroyed(&mut self, id: ViewId) -> bool {
        if self.frame.pending.remove(&id).is_none() {
            return false;
        }
        self.frame.order.retain(|v| *v != id);
        if let Some(target) = self.frame.targets.remove(&id)
            && let Err(err) = self.cache.cache(id, target)
        {
            tracing::warn!(%id, error = %err, "could not recycle destroyed view's target");
        }
        true
    }

    /// Release every pooled target and any target held by an in-flight frame.
    ///
    /// Returns how many targets were released.
    pub fn graphics_context_lost(&mut self) -> usize {
        let mut released = 0;
        if self.state != FrameState::Idle {
            released += self.frame.reset().len();
            released += self.cache.end_frame().len();
            self.state = FrameState::Idle;
        }
        released += self.cache.evict_all().len();
        tracing::warn!(released, "graphics context lost; render targets released");
        released
    }

    fn ensure_resolved(&mut self) -> EmbedResult<()> {
        if self.frame.resolved {
            return Ok(());
        }
        match self.resolve_targets() {
            Ok(()) => {
                self.frame.resolved = true;
                if self.state == FrameState::Preroll {
                    self.state = FrameState::Composited;
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "render target resolution failed; cancelling frame");
                self.recycle_frame();
                Err(err)
            }
        }
    }

    fn resolve_targets(&mut self) -> EmbedResult<()> {
        let requests: Vec<(ViewId, RenderTargetDescriptor)> = self
            .frame
            .order
            .iter()
            .filter_map(|id| self.frame.pending.get(id).map(|v| (*id, v.descriptor)))
            .collect();
        if requests.is_empty() {
            return Ok(());
        }

        let resolved = self.cache.resolve(requests)?;
        self.frame.targets.extend(resolved.assigned);
        if resolved.unmatched.is_empty() {
            return Ok(());
        }

        let delegate = self
            .delegate
            .as_deref_mut()
            .ok_or_else(|| EmbedError::unavailable("no surface delegate to allocate targets"))?;
        for (id, descriptor) in resolved.unmatched {
            let target = delegate.create_render_target(descriptor)?;
            if target.descriptor() != descriptor {
                return Err(EmbedError::contract(format!(
                    "delegate allocated {:?} for {id}, expected {descriptor:?}",
                    target.descriptor()
                )));
            }
            self.frame.targets.insert(id, target);
        }
        Ok(())
    }

    fn recycle_frame(&mut self) {
        for (id, target) in self.frame.reset() {
            if let Err(err) = self.cache.cache(id, target) {
                tracing::warn!(%id, error = %err, "dropping render target that could not be pooled");
            }
        }
        let evicted = self.cache.end_frame();
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "idle render targets evicted");
        }
        self.state = FrameState::Idle;
    }
}

impl std::fmt::Debug for ExternalViewEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalViewEmbedder")
            .field("state", &self.state)
            .field("trace_id", &self.frame.trace_id)
            .field("order", &self.frame.order)
            .field("cache", &self.cache.stats())
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/embedder/embedder.rs"]
mod tests;
