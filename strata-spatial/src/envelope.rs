use std::hash::Hash;

/// A 2D axis-aligned bounding rectangle.
///
/// `Envelope` is the value type the R-tree works with: every index node caches
/// one, and every payload record decodes to one. Construction normalizes
/// inverted bounds, so `min <= max` always holds on both axes.
///
/// # Examples
///
/// ```rust
/// use strata_spatial::Envelope;
///
/// // x in [0, 10], y in [0, 5]
/// let a = Envelope::new(0.0, 10.0, 0.0, 5.0);
/// let b = Envelope::point(12.0, 1.0);
///
/// let both = Envelope::union(&a, &b);
/// assert!(both.contains(&a) && both.contains(&b));
/// assert_eq!(both.width(), 12.0);
/// ```
#[derive(Clone, Copy, PartialEq, Debug, serde::Deserialize, serde::Serialize)]
pub struct Envelope {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope[{} : {}, {} : {}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

impl Envelope {
    /// Creates an envelope from its x range and y range.
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64) -> Envelope {
        Envelope {
            min_x: x1.min(x2),
            max_x: x1.max(x2),
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    /// Creates a degenerate envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Envelope {
        Envelope::new(x, x, y, y)
    }

    /// Reads the `[min_x, min_y, max_x, max_y]` layout used by the `bbox` property.
    pub fn from_bbox_array(values: &[f64]) -> Option<Envelope> {
        match values {
            [min_x, min_y, max_x, max_y] => Some(Envelope::new(*min_x, *max_x, *min_y, *max_y)),
            _ => None,
        }
    }

    /// Writes the `[min_x, min_y, max_x, max_y]` layout used by the `bbox` property.
    pub fn to_bbox_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area, never negative.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Checks if `other` lies entirely within this envelope. Shared edges count.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Checks if the two envelopes share at least one point.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grows this envelope in place so it also covers `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Smallest envelope covering both `a` and `b`.
    pub fn union(a: &Envelope, b: &Envelope) -> Envelope {
        let mut result = *a;
        result.expand_to_include(b);
        result
    }

    /// Area that would be added to this envelope by including `other`.
    pub fn enlargement(&self, other: &Envelope) -> f64 {
        Envelope::union(self, other).area() - self.area()
    }

    /// Union of all envelopes, `None` when the iterator is empty.
    pub fn union_all<'a>(envelopes: impl IntoIterator<Item = &'a Envelope>) -> Option<Envelope> {
        let mut result: Option<Envelope> = None;
        for envelope in envelopes {
            match result.as_mut() {
                Some(acc) => acc.expand_to_include(envelope),
                None => result = Some(*envelope),
            }
        }
        result
    }
}
