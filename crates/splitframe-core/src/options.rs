//! Options for grouping and apply operations

use serde::{Deserialize, Serialize};

use crate::parallel;

/// Order in which groups are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Order of first appearance of each distinct key, scanning rows top to bottom
    #[default]
    FirstAppearance,
    /// Ascending by key columns, nulls last
    Sorted,
}

/// Options for building a grouped view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptions {
    pub order: GroupOrder,
}

impl GroupOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit groups in sorted key order
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.order = GroupOrder::Sorted;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: GroupOrder) -> Self {
        self.order = order;
        self
    }
}

/// Options for `combine`, `select` and `transform`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Materialize the grouping columns in combine/select output
    pub keep_keys: bool,
    /// Append `_<function>` to auto-derived output names
    pub rename_cols: bool,
    /// Allow groups to be processed on the Rayon pool
    pub threaded: bool,
    /// Row count above which groups run in parallel (None = global threshold)
    pub parallel_threshold: Option<usize>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            keep_keys: true,
            rename_cols: true,
            threaded: true,
            parallel_threshold: None,
        }
    }
}

impl ApplyOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_keep_keys(mut self, keep_keys: bool) -> Self {
        self.keep_keys = keep_keys;
        self
    }

    #[must_use]
    pub fn with_rename_cols(mut self, rename_cols: bool) -> Self {
        self.rename_cols = rename_cols;
        self
    }

    #[must_use]
    pub fn with_threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = Some(threshold);
        self
    }

    /// Whether an apply over `num_rows` source rows should use the Rayon pool
    #[must_use]
    pub fn should_parallelize(&self, num_rows: usize) -> bool {
        if !self.threaded {
            return false;
        }
        match self.parallel_threshold {
            Some(threshold) => num_rows > threshold,
            None => parallel::should_parallelize(num_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_defaults() {
        let opts = ApplyOptions::new();
        assert!(opts.keep_keys);
        assert!(opts.rename_cols);
        assert!(opts.threaded);
        assert_eq!(opts.parallel_threshold, None);
    }

    #[test]
    fn test_parallel_decision() {
        let opts = ApplyOptions::new().with_parallel_threshold(10);
        assert!(!opts.should_parallelize(10));
        assert!(opts.should_parallelize(11));
        assert!(!opts.with_threaded(false).should_parallelize(1_000_000));
    }

    #[test]
    fn test_options_from_toml() {
        let opts: ApplyOptions = toml::from_str("keep_keys = false\nparallel_threshold = 64").unwrap();
        assert_eq!(
            opts,
            ApplyOptions::new()
                .with_keep_keys(false)
                .with_parallel_threshold(64)
        );

        let group: GroupOptions = toml::from_str("order = \"sorted\"").unwrap();
        assert_eq!(group.order, GroupOrder::Sorted);
    }

    #[test]
    fn test_options_from_json() {
        let group: GroupOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(group, GroupOptions::default());
        let opts: ApplyOptions = serde_json::from_str(r#"{"rename_cols": false}"#).unwrap();
        assert!(!opts.rename_cols);
        assert!(opts.keep_keys);
    }
}
