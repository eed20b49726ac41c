//! Assembles validated `MetricPoint`s.
use thiserror::Error;

use crate::types::point::{FieldSet, FieldValue, MetricPoint, TagSet};

/// Raised for points that can never be written. These indicate a bug in
/// whatever produced the fields, not an environmental problem.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PointError {
    #[error("a point needs at least one field")]
    EmptyFields,
    #[error("field {key:?} has no line-protocol representation")]
    UnsupportedField { key: String },
}

/// Builds a point from call-site `tags` layered over `default_tags`.
///
/// Call-site tags keep their order and win on a key collision; defaults whose
/// key wasn't set at the call site are appended after them.
pub fn build_point(
    measurement: &str,
    fields: FieldSet,
    tags: TagSet,
    default_tags: &TagSet,
    timestamp: i64,
) -> Result<MetricPoint, PointError> {
    if fields.is_empty() {
        return Err(PointError::EmptyFields);
    }

    // NaN and the infinities have no literal form.
    if let Some((key, _)) = fields
        .iter()
        .find(|(_, v)| matches!(v, FieldValue::Float(f) if !f.is_finite()))
    {
        return Err(PointError::UnsupportedField {
            key: key.to_owned(),
        });
    }

    let mut merged = tags;
    for (k, v) in default_tags.iter() {
        if !merged.contains_key(k) {
            merged.insert(k, v.as_str());
        }
    }

    Ok(MetricPoint::new_unchecked(
        measurement.to_owned(),
        merged,
        fields,
        timestamp,
    ))
}
