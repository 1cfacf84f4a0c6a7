use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender};
use embedframe::{
    EmbedResult, EmbedderOpts, EmbeddedViewParams, ExternalViewEmbedder, FramePipeline,
    FrameProducer, FrameTiming, Mutator, MutatorsStack, PixelSize, Point, RenderTarget, Size,
    SoftwareSurface, ViewId, VsyncRegistry, VsyncSource, VsyncToken, VsyncWaiter,
};

#[derive(Parser, Debug)]
#[command(name = "embedframe", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive synthetic frames with platform views through the software surface.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Number of frames to produce.
    #[arg(long, default_value_t = 30)]
    frames: u32,

    /// Number of platform views per frame.
    #[arg(long, default_value_t = 3)]
    views: u32,

    /// Frame width in physical pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height in physical pixels.
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Physical pixels per logical point.
    #[arg(long, default_value_t = 1.0)]
    device_pixel_ratio: f64,

    /// Vsync rate of the simulated host.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Embedder options JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the last presented frame as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
    }
}

/// Host vsync thread: answers every request after one frame interval.
struct HostVsync {
    requests: Sender<VsyncToken>,
}

impl VsyncSource for HostVsync {
    fn request_vsync(&self, token: VsyncToken) {
        let _ = self.requests.send(token);
    }
}

fn spawn_host_vsync(
    registry: Arc<VsyncRegistry>,
    requests: Receiver<VsyncToken>,
    fps: u32,
) -> thread::JoinHandle<u64> {
    let interval = Duration::from_secs(1) / fps;
    thread::spawn(move || {
        let epoch = Instant::now();
        let mut stale = 0u64;
        // Ends once the waiter, and with it the request sender, is dropped.
        while let Ok(token) = requests.recv() {
            thread::sleep(interval);
            let start = epoch.elapsed().as_nanos() as u64;
            let target = start + interval.as_nanos() as u64;
            if !registry.on_vsync(token, start, target) {
                stale += 1;
            }
        }
        stale
    })
}

struct SyntheticProducer {
    frames_left: u32,
    views: u32,
    size: PixelSize,
    device_pixel_ratio: f64,
    tick: u64,
}

impl SyntheticProducer {
    fn view_color(view: ViewId) -> [u8; 4] {
        const PALETTE: [[u8; 4]; 4] = [
            [230, 80, 60, 200],
            [60, 180, 120, 200],
            [70, 120, 230, 200],
            [240, 200, 60, 200],
        ];
        PALETTE[view.0.unsigned_abs() as usize % PALETTE.len()]
    }
}

impl FrameProducer for SyntheticProducer {
    fn frame_metrics(&self) -> (PixelSize, f64) {
        (self.size, self.device_pixel_ratio)
    }

    fn preroll(
        &mut self,
        _timing: FrameTiming,
        embedder: &mut ExternalViewEmbedder,
    ) -> EmbedResult<()> {
        self.frames_left = self.frames_left.saturating_sub(1);
        self.tick += 1;

        let view_points = Size::new(120.0, 80.0);
        let view_px = view_points.width * self.device_pixel_ratio;
        let span = (f64::from(self.size.width) - view_px).max(1.0);
        for i in 0..self.views {
            let x = (f64::from(i) * 150.0 + self.tick as f64 * 4.0) % span;
            let y = f64::from(i) * 90.0 * self.device_pixel_ratio;
            let mut mutators = MutatorsStack::new();
            if i % 2 == 1 {
                mutators.push(Mutator::Opacity(0.75));
            }
            let params = EmbeddedViewParams::new(Point::new(x.floor(), y), view_points)
                .with_mutators(mutators);
            embedder.preroll_composite_embedded_view(ViewId(i64::from(i)), params)?;
        }
        Ok(())
    }

    fn paint_overlay(&mut self, view: ViewId, target: &mut RenderTarget) -> EmbedResult<()> {
        let [r, g, b, a] = Self::view_color(view);
        fill(target, |ctx, w, h| {
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, h * 0.75, w, h));
        })
    }

    fn paint_background(&mut self, target: &mut RenderTarget) -> EmbedResult<()> {
        let stripe = (self.tick % 64) as f64 * 4.0;
        fill(target, |ctx, w, h| {
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(18, 20, 28, 255));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(40, 44, 60, 255));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(stripe, 0.0, stripe + 24.0, h));
        })
    }

    fn wants_more_frames(&self) -> bool {
        self.frames_left > 0
    }
}

fn fill(
    target: &mut RenderTarget,
    draw: impl FnOnce(&mut vello_cpu::RenderContext, f64, f64),
) -> EmbedResult<()> {
    let Some(buf) = target.surface_mut().as_software_mut() else {
        return Err(embedframe::EmbedError::contract(
            "simulation draws into software targets only",
        ));
    };
    let size = buf.size();
    // SoftwareBuffer guarantees both dimensions fit in u16.
    let (w, h) = (size.width as u16, size.height as u16);
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    draw(&mut ctx, f64::from(w), f64::from(h));
    ctx.flush();
    ctx.render_to_pixmap(buf.pixmap_mut());
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    if args.fps == 0 {
        anyhow::bail!("--fps must be > 0");
    }
    let opts = match &args.config {
        Some(path) => EmbedderOpts::from_path(path)
            .with_context(|| format!("load options '{}'", path.display()))?,
        None => EmbedderOpts::default(),
    };

    let last_frame: Arc<Mutex<Option<Vec<u8>>>> = Arc::default();
    let sink = Arc::clone(&last_frame);
    let mut embedder = ExternalViewEmbedder::new(opts)?;
    embedder.set_delegate(Box::new(SoftwareSurface::new(
        move |bytes: &[u8], _row_bytes: usize, _height: usize| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
            true
        },
    )));

    let registry = VsyncRegistry::new();
    let (requests_tx, requests_rx) = crossbeam_channel::unbounded();
    let host = spawn_host_vsync(Arc::clone(&registry), requests_rx, args.fps);
    let waiter = VsyncWaiter::new(
        Arc::clone(&registry),
        Arc::new(HostVsync {
            requests: requests_tx,
        }),
    );

    let producer = SyntheticProducer {
        frames_left: args.frames,
        views: args.views,
        size: PixelSize::new(args.width, args.height),
        device_pixel_ratio: args.device_pixel_ratio,
        tick: 0,
    };

    let started = Instant::now();
    let mut pipeline = FramePipeline::new(embedder, waiter, producer);
    let result = if args.frames == 0 {
        Ok(pipeline.stats())
    } else {
        pipeline.run()
    };
    let cache = pipeline.embedder().cache_stats();
    drop(pipeline);

    let stale = host
        .join()
        .map_err(|_| anyhow::anyhow!("host vsync thread panicked"))?;
    let stats = result?;

    eprintln!(
        "frames: {} presented, {} dropped, {} skipped in {:.2?}",
        stats.presented,
        stats.dropped,
        stats.skipped,
        started.elapsed()
    );
    eprintln!(
        "render targets: {} pooled ({} bytes), {} reused, {} allocated, {} evicted, {} dropped on cache",
        cache.pooled_targets,
        cache.pooled_bytes,
        cache.reused,
        cache.missed,
        cache.evicted,
        cache.dropped_on_cache
    );
    eprintln!("stale vsyncs: {stale}");

    if let Some(out) = &args.out {
        let frame = last_frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .context("no frame was presented")?;
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            out,
            &frame,
            args.width,
            args.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}
