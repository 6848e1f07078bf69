use crate::{error::PipelineError, geofile::feature::FeatureCollection};

use super::{consolidate::consolidate, dissolver::dissolve, normalize::normalize};

/// Normalize, dissolve and consolidate `collection` by `property_name`, yielding one feature per key.
pub fn run(
    collection: &FeatureCollection,
    property_name: &str,
) -> Result<FeatureCollection, PipelineError> {
    let normalized = normalize(collection, property_name);
    log::info!(
        "Normalized {} features into {} polygons",
        collection.len(),
        normalized.len()
    );
    let dissolved = dissolve(&normalized, property_name)?;
    log::info!("Dissolved into {} polygons", dissolved.len());
    let consolidated = consolidate(&dissolved, property_name)?;
    log::info!(
        "Consolidated into {} features, one per {:?} value",
        consolidated.len(),
        property_name
    );
    Ok(consolidated)
}
