use std::path::Path;

use crate::foundation::core::PixelFormat;
use crate::foundation::error::{EmbedError, EmbedResult};
use crate::render::target_cache::RenderTargetCacheOpts;

/// What happens when a view is prerolled twice in one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePrerollPolicy {
    /// Report a contract violation and keep the first declaration.
    #[default]
    Reject,
    /// Replace the placement and move the view to the later paint position.
    LastWriteWins,
}

/// Render loop options.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOpts {
    /// Stop the loop after this many frames in a row were dropped. `None` never stops.
    pub max_consecutive_dropped_frames: Option<u32>,
}

/// Options for one embedder and its render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedderOpts {
    pub cache: RenderTargetCacheOpts,
    /// Format of every overlay target.
    pub pixel_format: PixelFormat,
    /// MSAA samples of every overlay target.
    pub sample_count: u32,
    pub duplicate_preroll: DuplicatePrerollPolicy,
    pub pipeline: PipelineOpts,
}

impl Default for EmbedderOpts {
    fn default() -> Self {
        Self {
            cache: RenderTargetCacheOpts::default(),
            pixel_format: PixelFormat::default(),
            sample_count: 1,
            duplicate_preroll: DuplicatePrerollPolicy::default(),
            pipeline: PipelineOpts::default(),
        }
    }
}

impl EmbedderOpts {
    /// Parse and validate options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> EmbedResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| EmbedError::serde(format!("parse embedder options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read, parse and validate an options file.
    pub fn from_path(path: impl AsRef<Path>) -> EmbedResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| {
            EmbedError::validation(format!("read options '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> EmbedResult<()> {
        if self.sample_count == 0 {
            return Err(EmbedError::validation("sample_count must be >= 1"));
        }
        if !self.sample_count.is_power_of_two() {
            return Err(EmbedError::validation(format!(
                "sample_count must be a power of two, got {}",
                self.sample_count
            )));
        }
        if self.pipeline.max_consecutive_dropped_frames == Some(0) {
            return Err(EmbedError::validation(
                "pipeline.max_consecutive_dropped_frames must be > 0 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
