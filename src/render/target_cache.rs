use std::collections::{HashMap, HashSet};

use crate::foundation::core::ViewId;
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::target::{RenderTarget, RenderTargetDescriptor};

/// Retention bounds for pooled render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderTargetCacheOpts {
    /// Maximum bytes retained across all descriptors. Unbounded by default.
    pub max_pool_bytes: usize,
    /// Maximum number of pooled targets per descriptor. Unbounded by default.
    pub max_targets_per_descriptor: usize,
    /// Evict a pooled target once it sat unused for more than this many frames. `None` keeps it.
    pub max_idle_frames: Option<u32>,
}

impl Default for RenderTargetCacheOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: usize::MAX,
            max_targets_per_descriptor: usize::MAX,
            max_idle_frames: None,
        }
    }
}

/// Pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetCacheStats {
    /// Targets currently pooled.
    pub pooled_targets: usize,
    /// Bytes currently pooled.
    pub pooled_bytes: usize,
    /// Resolutions served from the pool.
    pub reused: u64,
    /// Resolutions that required a fresh allocation.
    pub missed: u64,
    /// Targets removed by idle aging or `evict_all`.
    pub evicted: u64,
    /// Targets dropped on `cache` because a bound was hit.
    pub dropped_on_cache: u64,
}

/// Outcome of [`RenderTargetCache::resolve`].
#[derive(Debug, Default)]
pub struct ResolvedTargets {
    /// Pooled targets handed to views, in request order.
    pub assigned: Vec<(ViewId, RenderTarget)>,
    /// Views with no matching pooled target, in request order. The caller allocates these.
    pub unmatched: Vec<(ViewId, RenderTargetDescriptor)>,
}

struct PooledTarget {
    target: RenderTarget,
    cached_at_frame: u64,
}

/// Descriptor-keyed pool of reusable render targets.
///
/// A target is either pooled or assigned to a view of the current frame, never both. Pooling by
/// shape lets a target freed by one view serve another view of the same size immediately.
pub struct RenderTargetCache {
    opts: RenderTargetCacheOpts,
    stats: RenderTargetCacheStats,

    pool: HashMap<RenderTargetDescriptor, Vec<PooledTarget>>,
    assigned: HashSet<ViewId>,
    frame: u64,
}

impl RenderTargetCache {
    /// Create an empty cache.
    pub fn new(opts: RenderTargetCacheOpts) -> Self {
        Self {
            opts,
            stats: RenderTargetCacheStats::default(),
            pool: HashMap::new(),
            assigned: HashSet::new(),
            frame: 0,
        }
    }

    /// Active bounds.
    pub fn opts(&self) -> RenderTargetCacheOpts {
        self.opts
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RenderTargetCacheStats {
        self.stats
    }

    /// Number of pooled targets.
    pub fn size(&self) -> usize {
        self.stats.pooled_targets
    }

    /// `true` when `view` holds an assignment in the current frame.
    pub fn is_assigned(&self, view: ViewId) -> bool {
        self.assigned.contains(&view)
    }

    /// Match pending views against pooled targets of the same descriptor.
    ///
    /// Never allocates. Every requested view becomes assigned for this frame, matched or not.
    /// A view requested twice, or already assigned this frame, is a contract violation and
    /// leaves the cache untouched.
    pub fn resolve(
        &mut self,
        pending: impl IntoIterator<Item = (ViewId, RenderTargetDescriptor)>,
    ) -> EmbedResult<ResolvedTargets> {
        let pending: Vec<(ViewId, RenderTargetDescriptor)> = pending.into_iter().collect();

        let mut seen = HashSet::with_capacity(pending.len());
        for (view, _) in &pending {
            if self.assigned.contains(view) || !seen.insert(*view) {
                return Err(EmbedError::contract(format!(
                    "{view} already has a render target assigned this frame"
                )));
            }
        }

        let mut out = ResolvedTargets::default();
        for (view, desc) in pending {
            self.assigned.insert(view);
            match self.take_pooled(desc) {
                Some(target) => {
                    tracing::debug!(%view, size = %desc.size, "render target cache hit");
                    self.stats.reused = self.stats.reused.saturating_add(1);
                    out.assigned.push((view, target));
                }
                None => {
                    tracing::debug!(%view, size = %desc.size, "render target cache miss");
                    self.stats.missed = self.stats.missed.saturating_add(1);
                    out.unmatched.push((view, desc));
                }
            }
        }
        Ok(out)
    }

    /// Return `view`'s target to the pool for reuse in a later frame.
    ///
    /// Fails when `view` has no assignment this frame (double return). The target is then
    /// released. A target over the configured bounds is released instead of pooled.
    pub fn cache(&mut self, view: ViewId, target: RenderTarget) -> EmbedResult<()> {
        if !self.assigned.remove(&view) {
            return Err(EmbedError::contract(format!(
                "{view} returned a render target it was not assigned this frame"
            )));
        }

        let desc = target.descriptor();
        let bytes = desc.byte_len();
        if self.opts.max_pool_bytes == 0
            || self.opts.max_targets_per_descriptor == 0
            || self.stats.pooled_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_cache = self.stats.dropped_on_cache.saturating_add(1);
            return Ok(());
        }

        let bucket = self.pool.entry(desc).or_default();
        if bucket.len() >= self.opts.max_targets_per_descriptor {
            self.stats.dropped_on_cache = self.stats.dropped_on_cache.saturating_add(1);
            return Ok(());
        }

        bucket.push(PooledTarget {
            target,
            cached_at_frame: self.frame,
        });
        self.stats.pooled_targets = self.stats.pooled_targets.saturating_add(1);
        self.stats.pooled_bytes = self.stats.pooled_bytes.saturating_add(bytes);
        Ok(())
    }

    /// Close the current frame: drop leftover assignments and age the pool.
    ///
    /// Returns targets evicted by `max_idle_frames` so the caller controls where they are
    /// released.
    pub fn end_frame(&mut self) -> Vec<RenderTarget> {
        if !self.assigned.is_empty() {
            tracing::debug!(
                leftover = self.assigned.len(),
                "frame ended with assignments that were never cached"
            );
            self.assigned.clear();
        }

        let mut evicted = Vec::new();
        if let Some(max_idle) = self.opts.max_idle_frames {
            let frame = self.frame;
            for bucket in self.pool.values_mut() {
                let mut i = 0;
                while i < bucket.len() {
                    if frame.saturating_sub(bucket[i].cached_at_frame) > u64::from(max_idle) {
                        evicted.push(bucket.remove(i).target);
                    } else {
                        i += 1;
                    }
                }
            }
            self.pool.retain(|_, bucket| !bucket.is_empty());
            self.forget(&evicted);
        }

        self.frame = self.frame.saturating_add(1);
        evicted
    }

    /// Drain every pooled target. Used on teardown and graphics context loss.
    pub fn evict_all(&mut self) -> Vec<RenderTarget> {
        let drained: Vec<RenderTarget> = self
            .pool
            .drain()
            .flat_map(|(_, bucket)| bucket.into_iter().map(|p| p.target))
            .collect();
        self.forget(&drained);
        drained
    }

    fn take_pooled(&mut self, desc: RenderTargetDescriptor) -> Option<RenderTarget> {
        let bucket = self.pool.get_mut(&desc)?;
        let mut pooled = bucket.pop()?;
        if bucket.is_empty() {
            self.pool.remove(&desc);
        }
        self.stats.pooled_targets = self.stats.pooled_targets.saturating_sub(1);
        self.stats.pooled_bytes = self.stats.pooled_bytes.saturating_sub(desc.byte_len());
        pooled.target.reset_contents();
        Some(pooled.target)
    }

    fn forget(&mut self, removed: &[RenderTarget]) {
        for target in removed {
            self.stats.pooled_targets = self.stats.pooled_targets.saturating_sub(1);
            self.stats.pooled_bytes = self
                .stats
                .pooled_bytes
                .saturating_sub(target.descriptor().byte_len());
        }
        self.stats.evicted = self.stats.evicted.saturating_add(removed.len() as u64);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/target_cache.rs"]
mod tests;
