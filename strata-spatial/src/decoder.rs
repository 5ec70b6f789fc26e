//! Envelope decoders: strategies that map a payload record to its envelope.

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use strata::common::Value;
use strata::store::{GraphStore, RecordId};

/// Maps a payload record to the envelope it is indexed under.
///
/// A decoder is chosen when the index is constructed and is called every time
/// the engine needs the envelope of a payload: on insertion, on splits and
/// when a leaf's box is recomputed.
pub trait EnvelopeDecoder: Send + Sync {
    fn decode(&self, store: &GraphStore, record: RecordId) -> SpatialResult<Envelope>;
}

/// Decodes a point stored as two numeric properties.
#[derive(Debug, Clone)]
pub struct PointPropertyDecoder {
    x_property: String,
    y_property: String,
}

impl PointPropertyDecoder {
    pub fn new(x_property: impl Into<String>, y_property: impl Into<String>) -> Self {
        PointPropertyDecoder {
            x_property: x_property.into(),
            y_property: y_property.into(),
        }
    }
}

impl Default for PointPropertyDecoder {
    fn default() -> Self {
        PointPropertyDecoder::new("x", "y")
    }
}

impl EnvelopeDecoder for PointPropertyDecoder {
    fn decode(&self, store: &GraphStore, record: RecordId) -> SpatialResult<Envelope> {
        let x = read_number(store, record, &self.x_property)?;
        let y = read_number(store, record, &self.y_property)?;
        Ok(Envelope::point(x, y))
    }
}

/// Decodes a rectangle stored as one `[min_x, min_y, max_x, max_y]` array property.
#[derive(Debug, Clone)]
pub struct BBoxPropertyDecoder {
    property: String,
}

impl BBoxPropertyDecoder {
    pub fn new(property: impl Into<String>) -> Self {
        BBoxPropertyDecoder {
            property: property.into(),
        }
    }
}

impl Default for BBoxPropertyDecoder {
    fn default() -> Self {
        BBoxPropertyDecoder::new("bbox")
    }
}

impl EnvelopeDecoder for BBoxPropertyDecoder {
    fn decode(&self, store: &GraphStore, record: RecordId) -> SpatialResult<Envelope> {
        match store.get_property(record, &self.property)? {
            Some(Value::F64Array(values)) => Envelope::from_bbox_array(&values).ok_or_else(|| {
                SpatialError::Decode(format!(
                    "Property '{}' of record {} has {} values, expected 4",
                    self.property,
                    record,
                    values.len()
                ))
            }),
            Some(other) => Err(SpatialError::Decode(format!(
                "Property '{}' of record {} is {}, expected f64[]",
                self.property,
                record,
                other.type_name()
            ))),
            None => Err(SpatialError::Decode(format!(
                "Record {} has no '{}' property",
                record, self.property
            ))),
        }
    }
}

fn read_number(store: &GraphStore, record: RecordId, key: &str) -> SpatialResult<f64> {
    let value = store.get_property(record, key)?.ok_or_else(|| {
        SpatialError::Decode(format!("Record {} has no '{}' property", record, key))
    })?;
    value.as_number().ok_or_else(|| {
        SpatialError::Decode(format!(
            "Property '{}' of record {} is {}, expected a number",
            key,
            record,
            value.type_name()
        ))
    })
}
