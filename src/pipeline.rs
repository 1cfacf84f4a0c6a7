//! Render-thread loop: one embedder frame per delivered vsync.
//!
//! Everything that originates on other threads (vsync fires, view teardown, context loss,
//! shutdown) arrives as a [`PipelineTask`] and is applied between frames.

use crossbeam_channel::{Receiver, Sender};

use crate::config::PipelineOpts;
use crate::embedder::{ExternalViewEmbedder, FrameState};
use crate::foundation::core::{PixelSize, ViewId};
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::target::RenderTarget;
use crate::vsync::{FrameTiming, VsyncWaiter};

/// Work posted to the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineTask {
    /// A vsync fired for the pending wait.
    Vsync(FrameTiming),
    /// The host destroyed a platform view.
    ViewDestroyed(ViewId),
    /// The shared graphics context is gone. Every render target must be released.
    GraphicsContextLost,
    /// Leave the loop.
    Shutdown,
}

/// Content source driven by the loop, once per frame.
pub trait FrameProducer {
    /// Physical size and device pixel ratio of the next frame. An empty size skips the frame.
    fn frame_metrics(&self) -> (PixelSize, f64);

    /// Declare this frame's platform views in paint order.
    fn preroll(
        &mut self,
        timing: FrameTiming,
        embedder: &mut ExternalViewEmbedder,
    ) -> EmbedResult<()>;

    /// Draw the engine overlay above `view`.
    fn paint_overlay(&mut self, view: ViewId, target: &mut RenderTarget) -> EmbedResult<()>;

    /// Draw the full-frame background.
    fn paint_background(&mut self, target: &mut RenderTarget) -> EmbedResult<()>;

    /// `false` stops the loop after the current frame.
    fn wants_more_frames(&self) -> bool {
        true
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The frame ran but was not shown (delegate unavailable, present or allocation failed).
    Dropped,
    /// Nothing to draw (empty frame size).
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub vsyncs: u64,
    pub presented: u64,
    pub dropped: u64,
    pub skipped: u64,
}

/// Cloneable sender for posting tasks to a running loop from any thread.
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    tx: Sender<PipelineTask>,
}

impl PipelineHandle {
    /// Returns `false` once the loop is gone.
    pub fn post(&self, task: PipelineTask) -> bool {
        self.tx.send(task).is_ok()
    }

    pub fn view_destroyed(&self, view: ViewId) -> bool {
        self.post(PipelineTask::ViewDestroyed(view))
    }

    pub fn graphics_context_lost(&self) -> bool {
        self.post(PipelineTask::GraphicsContextLost)
    }

    pub fn shutdown(&self) -> bool {
        self.post(PipelineTask::Shutdown)
    }
}

/// Owns the embedder and the vsync waiter of one render thread.
pub struct FramePipeline<P> {
    opts: PipelineOpts,
    embedder: ExternalViewEmbedder,
    waiter: VsyncWaiter,
    producer: P,
    tx: Sender<PipelineTask>,
    rx: Receiver<PipelineTask>,
    stats: PipelineStats,
    consecutive_dropped: u32,
}

impl<P: FrameProducer> FramePipeline<P> {
    pub fn new(embedder: ExternalViewEmbedder, waiter: VsyncWaiter, producer: P) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            opts: embedder.opts().pipeline,
            embedder,
            waiter,
            producer,
            tx,
            rx,
            stats: PipelineStats::default(),
            consecutive_dropped: 0,
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn embedder(&self) -> &ExternalViewEmbedder {
        &self.embedder
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn into_producer(self) -> P {
        self.producer
    }

    /// Arm the waiter for the next vsync unless a wait is already pending.
    pub fn request_frame(&mut self) -> EmbedResult<()> {
        if self.waiter.is_awaiting() {
            return Ok(());
        }
        let tx = self.tx.clone();
        self.waiter.await_vsync(move |timing| {
            // The loop may already be gone.
            let _ = tx.send(PipelineTask::Vsync(timing));
        })?;
        Ok(())
    }

    /// Process tasks until shutdown, a fatal error, or the producer wants no more frames.
    pub fn run(&mut self) -> EmbedResult<PipelineStats> {
        self.request_frame()?;
        let result = self.run_tasks();
        self.waiter.cancel();
        result.map(|()| self.stats)
    }

    fn run_tasks(&mut self) -> EmbedResult<()> {
        loop {
            let task = self
                .rx
                .recv()
                .map_err(|e| EmbedError::Other(anyhow::Error::new(e)))?;
            match task {
                PipelineTask::Vsync(timing) => {
                    self.run_frame(timing)?;
                    if !self.producer.wants_more_frames() {
                        tracing::debug!("producer finished");
                        return Ok(());
                    }
                    self.request_frame()?;
                }
                PipelineTask::ViewDestroyed(view) => {
                    self.embedder.view_destroyed(view);
                }
                PipelineTask::GraphicsContextLost => {
                    self.embedder.graphics_context_lost();
                }
                PipelineTask::Shutdown => {
                    tracing::debug!("render loop shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Run one frame. Recoverable failures drop the frame; anything else is returned.
    #[tracing::instrument(skip(self))]
    pub fn run_frame(&mut self, timing: FrameTiming) -> EmbedResult<FrameOutcome> {
        self.stats.vsyncs += 1;
        let outcome = match self.draw_frame(timing) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.abandon_frame();
                if !err.is_recoverable() {
                    return Err(err);
                }
                tracing::warn!(error = %err, "frame dropped");
                FrameOutcome::Dropped
            }
        };

        match outcome {
            FrameOutcome::Presented => {
                self.stats.presented += 1;
                self.consecutive_dropped = 0;
            }
            FrameOutcome::Dropped => {
                self.stats.dropped += 1;
                self.consecutive_dropped = self.consecutive_dropped.saturating_add(1);
                if let Some(max) = self.opts.max_consecutive_dropped_frames
                    && self.consecutive_dropped >= max
                {
                    return Err(EmbedError::unavailable(format!(
                        "{} consecutive frames dropped",
                        self.consecutive_dropped
                    )));
                }
            }
            FrameOutcome::Skipped => self.stats.skipped += 1,
        }
        Ok(outcome)
    }

    fn draw_frame(&mut self, timing: FrameTiming) -> EmbedResult<FrameOutcome> {
        let (size, device_pixel_ratio) = self.producer.frame_metrics();
        if size.is_empty() {
            return Ok(FrameOutcome::Skipped);
        }

        self.embedder.begin_frame(size, device_pixel_ratio)?;
        self.producer.preroll(timing, &mut self.embedder)?;

        let order = self.embedder.composition_order().to_vec();
        for view in order {
            let target = self.embedder.composite_embedded_view(view)?;
            self.producer.paint_overlay(view, target)?;
        }

        let mut background = self.embedder.acquire_root_surface()?;
        self.producer.paint_background(&mut background)?;
        let presented = self.embedder.submit_frame(&background)?;
        self.embedder.finish_frame()?;

        Ok(if presented {
            FrameOutcome::Presented
        } else {
            FrameOutcome::Dropped
        })
    }

    fn abandon_frame(&mut self) {
        if self.embedder.state() != FrameState::Idle
            && let Err(err) = self.embedder.finish_frame()
        {
            tracing::warn!(error = %err, "could not clean up abandoned frame");
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
