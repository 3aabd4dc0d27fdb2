//! Runtime-configurable settings for communicators.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `SPMD_COMM_`) or by constructing a custom `CommConfig`.

use crate::error::{CommError, Result};
use crate::types::Rank;

/// Settings shared by every rank of a communicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommConfig {
    /// Rank returned by `default_root()` and tested by `is_root()`.
    pub default_root: Rank,

    /// Name prefix for rank threads spawned by `ThreadGroup`; the rank is
    /// appended.
    pub thread_name_prefix: String,

    /// Stack size for rank threads. `None` keeps the platform default.
    pub thread_stack_size: Option<usize>,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            default_root: 0,
            thread_name_prefix: "spmd-rank".to_string(),
            thread_stack_size: None,
        }
    }
}

impl CommConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `SPMD_COMM_DEFAULT_ROOT`
    /// - `SPMD_COMM_THREAD_PREFIX`
    /// - `SPMD_COMM_STACK_BYTES`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("SPMD_COMM_DEFAULT_ROOT")
            && let Ok(root) = v.trim().parse::<Rank>()
        {
            cfg.default_root = root;
        }
        if let Some(v) = lookup("SPMD_COMM_THREAD_PREFIX")
            && !v.is_empty()
        {
            cfg.thread_name_prefix = v;
        }
        if let Some(v) = lookup("SPMD_COMM_STACK_BYTES")
            && let Ok(n) = v.trim().parse::<usize>()
            && n > 0
        {
            cfg.thread_stack_size = Some(n);
        }

        cfg
    }

    /// Check the settings against a concrete rank count.
    pub fn validate(&self, rank_count: u32) -> Result<()> {
        if rank_count == 0 {
            return Err(CommError::InvalidRankCount(rank_count));
        }
        if self.default_root >= rank_count {
            return Err(CommError::InvalidRank {
                rank: self.default_root,
                rank_count,
            });
        }
        Ok(())
    }
}
