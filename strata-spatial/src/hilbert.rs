//! Hilbert curve ordering for bulk insertion.
//!
//! Points close in 2D space stay close along the Hilbert curve. Inserting a
//! batch in curve order keeps consecutive insertions in the same leaves, which
//! produces tighter sibling boxes than arbitrary order.

use crate::envelope::Envelope;

/// Order used when sorting bulk insertions.
pub const DEFAULT_HILBERT_ORDER: u32 = 16;

const MAX_HILBERT_ORDER: u32 = 32;

/// A Hilbert curve through a grid of `2^order × 2^order` cells laid over an
/// extent.
///
/// # Example
/// ```rust
/// use strata_spatial::hilbert::HilbertCurve;
/// use strata_spatial::Envelope;
///
/// let curve = HilbertCurve::new(Envelope::new(0.0, 100.0, 0.0, 100.0), 16);
/// assert_eq!(curve.distance(0.0, 0.0), 0);
/// assert!(curve.distance(50.0, 50.0) < curve.cell_count());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HilbertCurve {
    extent: Envelope,
    order: u32,
}

impl HilbertCurve {
    /// Orders outside `1..=32` are clamped.
    pub fn new(extent: Envelope, order: u32) -> Self {
        HilbertCurve {
            extent,
            order: order.clamp(1, MAX_HILBERT_ORDER),
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Cells along one axis.
    pub fn side(&self) -> u64 {
        1u64 << self.order
    }

    /// Cells in the whole grid, saturating at order 32.
    pub fn cell_count(&self) -> u64 {
        self.side().saturating_mul(self.side())
    }

    /// Grid cell holding `(x, y)`.
    ///
    /// Points outside the extent are clamped to its border. An axis of zero
    /// span maps to its middle cell.
    pub fn cell(&self, x: f64, y: f64) -> (u64, u64) {
        let side = self.side();
        (
            grid_coordinate(x, self.extent.min_x(), self.extent.width(), side),
            grid_coordinate(y, self.extent.min_y(), self.extent.height(), side),
        )
    }

    /// Position of `(x, y)` along the curve.
    pub fn distance(&self, x: f64, y: f64) -> u64 {
        let (cx, cy) = self.cell(x, y);
        cell_distance(self.order, cx, cy)
    }

    /// Sort key of an envelope: the curve position of its center.
    pub fn key(&self, envelope: &Envelope) -> u64 {
        let (x, y) = envelope.center();
        self.distance(x, y)
    }
}

/// Sorts entries along a Hilbert curve over their joint extent, keyed by
/// the center of each envelope. The sort is stable.
pub fn sort_by_hilbert<T>(entries: &mut [(T, Envelope)], order: u32) {
    let Some(extent) = Envelope::union_all(entries.iter().map(|(_, envelope)| envelope)) else {
        return;
    };
    let curve = HilbertCurve::new(extent, order);
    entries.sort_by_cached_key(|(_, envelope)| curve.key(envelope));
}

fn grid_coordinate(value: f64, min: f64, span: f64, side: u64) -> u64 {
    if span <= 0.0 || !span.is_finite() {
        return side / 2;
    }
    let t = ((value - min) / span).clamp(0.0, 1.0);
    ((t * side as f64) as u64).min(side - 1)
}

/// Walks the quadrants from the coarsest level down, reorienting each
/// sub-square so its curve segment starts in the lower left corner.
fn cell_distance(order: u32, x: u64, y: u64) -> u64 {
    let (mut x, mut y) = (x, y);
    let mut distance = 0u64;
    for level in (0..order).rev() {
        let half = 1u64 << level;
        let right = x & half != 0;
        let upper = y & half != 0;
        let quadrant: u64 = match (right, upper) {
            (false, false) => 0,
            (false, true) => 1,
            (true, true) => 2,
            (true, false) => 3,
        };
        distance += quadrant * half * half;

        let mask = half - 1;
        x &= mask;
        y &= mask;
        if !upper {
            if right {
                x = mask - x;
                y = mask - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
    }
    distance
}
