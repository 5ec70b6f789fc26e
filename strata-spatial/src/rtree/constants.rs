//! Edge types, property keys and defaults of the store-backed R-tree.

use strata::store::EdgeType;

/// Layer record to the root index node.
pub const RTREE_ROOT: EdgeType = EdgeType::from_static("RTREE_ROOT");

/// Internal index node to a child index node.
pub const RTREE_CHILD: EdgeType = EdgeType::from_static("RTREE_CHILD");

/// Leaf index node to a payload record.
pub const RTREE_REFERENCE: EdgeType = EdgeType::from_static("RTREE_REFERENCE");

/// Layer record to the tree metadata record.
pub const RTREE_METADATA: EdgeType = EdgeType::from_static("RTREE_METADATA");

/// Layer record to a detached root awaiting chunked deletion.
pub const RTREE_PENDING_DELETE: EdgeType = EdgeType::from_static("RTREE_PENDING_DELETE");

/// Cached box of an index node, `[min_x, min_y, max_x, max_y]`.
pub const INDEX_PROP_BBOX: &str = "bbox";

pub const KEY_MAX_NODE_REFERENCES: &str = "maxNodeReferences";
pub const KEY_MIN_NODE_REFERENCES: &str = "minNodeReferences";
pub const KEY_TOTAL_GEOMETRY_COUNT: &str = "totalGeometryCount";

pub const DEFAULT_MAX_NODE_REFERENCES: usize = 100;

/// Records inserted per transaction by `add_all`.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
