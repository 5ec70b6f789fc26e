use super::constants::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_NODE_REFERENCES};
use crate::error::{SpatialError, SpatialResult};

/// Fanout and batching configuration of an [`RTreeIndex`](super::RTreeIndex).
///
/// For an existing tree the fanout persisted in its metadata record wins over
/// the configured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RTreeConfig {
    max_node_references: usize,
    min_node_references: usize,
    batch_size: usize,
}

impl RTreeConfig {
    pub fn builder() -> RTreeConfigBuilder {
        RTreeConfigBuilder::new()
    }

    pub fn max_node_references(&self) -> usize {
        self.max_node_references
    }

    pub fn min_node_references(&self) -> usize {
        self.min_node_references
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Checks if a split of `max + 1` entries can fill both halves to `min`.
    pub fn is_balanced(&self) -> bool {
        is_balanced(self.max_node_references, self.min_node_references)
    }
}

impl Default for RTreeConfig {
    fn default() -> Self {
        RTreeConfig {
            max_node_references: DEFAULT_MAX_NODE_REFERENCES,
            min_node_references: DEFAULT_MAX_NODE_REFERENCES / 2,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Builder for [`RTreeConfig`].
///
/// Invalid values are captured and reported by [`build`](Self::build).
///
/// # Examples
///
/// ```rust
/// use strata_spatial::rtree::RTreeConfig;
///
/// let config = RTreeConfig::builder()
///     .max_node_references(4)
///     .min_node_references(2)
///     .build()
///     .unwrap();
/// assert!(config.is_balanced());
///
/// assert!(RTreeConfig::builder().batch_size(0).build().is_err());
/// ```
#[derive(Debug, Default)]
pub struct RTreeConfigBuilder {
    max_node_references: Option<usize>,
    min_node_references: Option<usize>,
    batch_size: Option<usize>,
    error: Option<SpatialError>,
}

impl RTreeConfigBuilder {
    pub fn new() -> Self {
        RTreeConfigBuilder::default()
    }

    pub fn max_node_references(mut self, max: usize) -> Self {
        self.max_node_references = Some(max);
        self
    }

    /// Defaults to half of the maximum.
    pub fn min_node_references(mut self, min: usize) -> Self {
        self.min_node_references = Some(min);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        if self.error.is_none() && batch_size == 0 {
            self.error = Some(SpatialError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        self.batch_size = Some(batch_size);
        self
    }

    pub fn build(self) -> SpatialResult<RTreeConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let max = self
            .max_node_references
            .unwrap_or(DEFAULT_MAX_NODE_REFERENCES);
        let min = self.min_node_references.unwrap_or(max / 2);
        check_fanout(max, min)?;

        Ok(RTreeConfig {
            max_node_references: max,
            min_node_references: min,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        })
    }
}

pub(crate) fn is_balanced(max: usize, min: usize) -> bool {
    2 * min <= max + 1
}

/// Rejects fanout bounds no tree can be built with, warns on unbalanced ones.
pub(crate) fn check_fanout(max: usize, min: usize) -> SpatialResult<()> {
    if max < 2 {
        return Err(SpatialError::Configuration(format!(
            "maxNodeReferences must be at least 2, got {}",
            max
        )));
    }
    if min == 0 {
        return Err(SpatialError::Configuration(
            "minNodeReferences must be at least 1".to_string(),
        ));
    }
    if min > max {
        return Err(SpatialError::Configuration(format!(
            "minNodeReferences ({}) exceeds maxNodeReferences ({})",
            min, max
        )));
    }
    if !is_balanced(max, min) {
        log::warn!(
            "minNodeReferences ({}) is more than half of maxNodeReferences ({}), split halves cannot both reach the minimum",
            min,
            max
        );
    }
    Ok(())
}
