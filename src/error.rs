use thiserror::Error;

use crate::dissolve::key::GroupKey;

/// Errors surfaced by loading a source and by the dissolve pipeline. All of them are fatal: the caller
/// gets no partial result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading or fetching the source failed, including non-success HTTP statuses.
    #[error("could not read {location}: {reason}")]
    Transport { location: String, reason: String },
    /// The source is not valid JSON, or not a well-formed GeoJSON FeatureCollection.
    #[error("could not parse {location}: {reason}")]
    Parse { location: String, reason: String },
    /// A polygon is topologically invalid or the union of a group failed.
    #[error("invalid geometry in group {key} at feature {feature_index}: {reason}")]
    Geometry {
        key: GroupKey,
        feature_index: usize,
        reason: String,
    },
    /// The grouping property holds a boolean, array or object instead of a string, number or null.
    #[error(
        "feature {feature_index} has value {value} for property {property_name:?}, expected a string, number or null"
    )]
    UnsupportedKey {
        feature_index: usize,
        property_name: String,
        value: serde_json::Value,
    },
}
