use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::*;
use crate::config::EmbedderOpts;
use crate::embedder::params::EmbeddedViewParams;
use crate::foundation::core::{Point, Size};
use crate::surface::software::SoftwareSurface;
use crate::vsync::{VsyncRegistry, VsyncSource, VsyncToken};

/// Fires every requested vsync synchronously, 16ms apart.
struct ImmediateSource {
    registry: Weak<VsyncRegistry>,
    clock: AtomicU64,
}

impl VsyncSource for ImmediateSource {
    fn request_vsync(&self, token: VsyncToken) {
        let start = self.clock.fetch_add(16_000_000, Ordering::SeqCst);
        if let Some(registry) = self.registry.upgrade() {
            registry.on_vsync(token, start, start + 16_000_000);
        }
    }
}

/// Never fires; the test posts vsync tasks itself.
struct SilentSource;

impl VsyncSource for SilentSource {
    fn request_vsync(&self, _token: VsyncToken) {}
}

struct Producer {
    frames_left: u32,
    views: Vec<ViewId>,
    painted: Vec<ViewId>,
    fail_paint: Option<EmbedError>,
}

impl Producer {
    fn new(frames: u32, views: &[i64]) -> Self {
        Self {
            frames_left: frames,
            views: views.iter().copied().map(ViewId).collect(),
            painted: Vec::new(),
            fail_paint: None,
        }
    }
}

impl FrameProducer for Producer {
    fn frame_metrics(&self) -> (PixelSize, f64) {
        (PixelSize::new(32, 32), 1.0)
    }

    fn preroll(
        &mut self,
        _timing: FrameTiming,
        embedder: &mut ExternalViewEmbedder,
    ) -> EmbedResult<()> {
        self.frames_left = self.frames_left.saturating_sub(1);
        for (i, view) in self.views.iter().enumerate() {
            let params =
                EmbeddedViewParams::new(Point::new(i as f64 * 8.0, 0.0), Size::new(8.0, 8.0));
            embedder.preroll_composite_embedded_view(*view, params)?;
        }
        Ok(())
    }

    fn paint_overlay(&mut self, view: ViewId, _target: &mut RenderTarget) -> EmbedResult<()> {
        if let Some(err) = self.fail_paint.take() {
            return Err(err);
        }
        self.painted.push(view);
        Ok(())
    }

    fn paint_background(&mut self, target: &mut RenderTarget) -> EmbedResult<()> {
        if let Some(buf) = target.surface_mut().as_software_mut() {
            buf.data_mut().fill(255);
        }
        Ok(())
    }

    fn wants_more_frames(&self) -> bool {
        self.frames_left > 0
    }
}

fn embedder(opts: EmbedderOpts, presented: Arc<Mutex<usize>>) -> ExternalViewEmbedder {
    let mut e = ExternalViewEmbedder::new(opts).unwrap();
    e.set_delegate(Box::new(SoftwareSurface::new(
        move |_: &[u8], _: usize, _: usize| {
            *presented.lock().unwrap() += 1;
            true
        },
    )));
    e
}

#[test]
fn runs_one_frame_per_vsync_until_producer_is_done() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(ImmediateSource {
        registry: Arc::downgrade(&registry),
        clock: AtomicU64::new(0),
    });
    let presented = Arc::new(Mutex::new(0));
    let waiter = VsyncWaiter::new(Arc::clone(&registry), source);
    let mut pipeline = FramePipeline::new(
        embedder(EmbedderOpts::default(), Arc::clone(&presented)),
        waiter,
        Producer::new(3, &[1, 2]),
    );

    let stats = pipeline.run().unwrap();
    assert_eq!(stats.vsyncs, 3);
    assert_eq!(stats.presented, 3);
    assert_eq!(*presented.lock().unwrap(), 3);
    assert_eq!(pipeline.producer().painted.len(), 6);
    assert_eq!(pipeline.embedder().cache_stats().pooled_targets, 2);
    assert_eq!(pipeline.embedder().cache_stats().reused, 4);
}

#[test]
fn shutdown_stops_loop_before_any_frame() {
    let registry = VsyncRegistry::new();
    let waiter = VsyncWaiter::new(Arc::clone(&registry), Arc::new(SilentSource));
    let presented = Arc::new(Mutex::new(0));
    let mut pipeline = FramePipeline::new(
        embedder(EmbedderOpts::default(), presented),
        waiter,
        Producer::new(10, &[1]),
    );

    assert!(pipeline.handle().shutdown());
    let stats = pipeline.run().unwrap();
    assert_eq!(stats, PipelineStats::default());
}

#[test]
fn host_tasks_apply_between_frames() {
    let registry = VsyncRegistry::new();
    let waiter = VsyncWaiter::new(Arc::clone(&registry), Arc::new(SilentSource));
    let presented = Arc::new(Mutex::new(0));
    let mut pipeline = FramePipeline::new(
        embedder(EmbedderOpts::default(), presented),
        waiter,
        Producer::new(10, &[1]),
    );

    let timing = FrameTiming::new(0, 16).unwrap();
    assert_eq!(pipeline.run_frame(timing).unwrap(), FrameOutcome::Presented);
    assert_eq!(pipeline.embedder().cache_stats().pooled_targets, 1);

    let handle = pipeline.handle();
    assert!(handle.graphics_context_lost());
    assert!(handle.view_destroyed(ViewId(1)));
    assert!(handle.shutdown());
    pipeline.run().unwrap();
    assert_eq!(pipeline.embedder().cache_stats().pooled_targets, 0);
}

#[test]
fn recoverable_errors_drop_the_frame_and_fatal_ones_stop() {
    let registry = VsyncRegistry::new();
    let waiter = VsyncWaiter::new(Arc::clone(&registry), Arc::new(SilentSource));
    let presented = Arc::new(Mutex::new(0));
    let mut pipeline = FramePipeline::new(
        embedder(EmbedderOpts::default(), presented),
        waiter,
        Producer::new(10, &[1]),
    );
    let timing = FrameTiming::new(0, 16).unwrap();

    pipeline.producer.fail_paint = Some(EmbedError::unavailable("gpu busy"));
    assert_eq!(pipeline.run_frame(timing).unwrap(), FrameOutcome::Dropped);
    assert_eq!(pipeline.embedder().state(), FrameState::Idle);
    assert_eq!(pipeline.embedder().cache_stats().pooled_targets, 1);

    pipeline.producer.fail_paint = Some(EmbedError::contract("bad paint"));
    assert!(
        pipeline
            .run_frame(timing)
            .unwrap_err()
            .is_contract_violation()
    );
    assert_eq!(pipeline.embedder().state(), FrameState::Idle);
    assert_eq!(pipeline.stats().dropped, 1);
}

#[test]
fn too_many_dropped_frames_stop_the_loop() {
    let registry = VsyncRegistry::new();
    let waiter = VsyncWaiter::new(Arc::clone(&registry), Arc::new(SilentSource));
    let mut opts = EmbedderOpts::default();
    opts.pipeline.max_consecutive_dropped_frames = Some(2);
    let mut e = ExternalViewEmbedder::new(opts).unwrap();
    e.set_delegate(Box::new(SoftwareSurface::new(
        |_: &[u8], _: usize, _: usize| false,
    )));
    let mut pipeline = FramePipeline::new(e, waiter, Producer::new(10, &[]));
    let timing = FrameTiming::new(0, 16).unwrap();

    assert_eq!(pipeline.run_frame(timing).unwrap(), FrameOutcome::Dropped);
    assert!(pipeline.run_frame(timing).unwrap_err().is_recoverable());
}
