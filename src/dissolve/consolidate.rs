use crate::{
    error::PipelineError,
    geofile::feature::{Feature, FeatureCollection, FeatureMap},
};

use super::key::group_by_key;

fn polygons_of(geometry: &geo::Geometry) -> Vec<geo::Polygon> {
    match geometry {
        geo::Geometry::Polygon(polygon) => vec![polygon.clone()],
        geo::Geometry::MultiPolygon(multi_polygon) => multi_polygon.0.clone(),
        _ => Vec::new(),
    }
}

/// Re-group a dissolved collection so each value of `property_name` maps to exactly one feature.
///
/// A key held by a single feature keeps that feature as is. A key held by several features becomes one
/// MultiPolygon of all their polygons, in input order, whose attributes are only `{property_name: key}`;
/// any other attributes of those features are dropped. Output follows the first-seen order of keys.
pub fn consolidate(
    collection: &FeatureCollection,
    property_name: &str,
) -> Result<FeatureCollection, PipelineError> {
    let groups = group_by_key(collection, property_name)?;
    let mut features = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        if let [(_, feature)] = members.as_slice() {
            features.push((*feature).clone());
            continue;
        }
        let polygons: Vec<geo::Polygon> = members
            .iter()
            .flat_map(|(_, feature)| polygons_of(&feature.geometry))
            .collect();
        log::debug!(
            "Consolidating {} features with key {} into a MultiPolygon of {} polygons",
            members.len(),
            key,
            polygons.len()
        );
        let mut attributes = FeatureMap::new();
        attributes.insert(property_name.to_string(), key.to_value());
        features.push(Feature::new(
            geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons)),
            attributes,
        ));
    }
    Ok(FeatureCollection::new(features))
}
