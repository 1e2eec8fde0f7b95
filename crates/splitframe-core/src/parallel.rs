//! Parallel dispatch settings for grouped operations
//!
//! Groups are handed to Rayon once the source table is larger than a
//! process-wide row threshold. Results are reassembled in group order, so the
//! threshold changes speed only. `ApplyOptions::parallel_threshold` overrides
//! it for a single call.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row count above which grouped work runs in parallel (10,000 rows)
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

static THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Current process-wide row threshold
#[must_use]
pub fn parallel_threshold() -> usize {
    THRESHOLD.load(Ordering::Relaxed)
}

/// Replace the process-wide row threshold
///
/// `0` parallelizes every non-empty table; `usize::MAX` never parallelizes.
pub fn set_parallel_threshold(threshold: usize) {
    THRESHOLD.store(threshold, Ordering::Relaxed);
}

pub(crate) fn should_parallelize(num_rows: usize) -> bool {
    num_rows > parallel_threshold()
}

/// Process-wide parallel settings, loadable from TOML or JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Row threshold, see [`set_parallel_threshold`]
    pub threshold: usize,
    /// Size of Rayon's global pool; `None` keeps Rayon's choice
    pub num_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PARALLEL_THRESHOLD,
            num_threads: None,
        }
    }
}

impl ParallelConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Install the threshold and, if set, size Rayon's global pool
    ///
    /// The pool can be sized once per process; later sizes are ignored.
    pub fn apply(&self) {
        set_parallel_threshold(self.threshold);
        let Some(threads) = self.num_threads else {
            return;
        };
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            Ok(()) => debug!(threads, "sized rayon global pool"),
            Err(err) => debug!(error = %err, "rayon global pool already initialized"),
        }
    }
}
