use crate::geofile::feature::{Feature, FeatureCollection};

/// Split every MultiPolygon feature into one Polygon feature per member polygon, each carrying a copy of the
/// original attributes. Polygon features pass through unchanged; features of any other geometry type are
/// dropped. The input collection is left untouched.
pub fn normalize(collection: &FeatureCollection, property_name: &str) -> FeatureCollection {
    let mut num_dropped = 0;
    let mut num_unkeyed = 0;
    let mut features = Vec::with_capacity(collection.len());
    for feature in collection {
        if !feature.attributes.contains_key(property_name) {
            num_unkeyed += 1;
        }
        match &feature.geometry {
            geo::Geometry::Polygon(_) => features.push(feature.clone()),
            geo::Geometry::MultiPolygon(multi_polygon) => {
                features.extend(multi_polygon.0.iter().map(|polygon| {
                    Feature::new(
                        geo::Geometry::Polygon(polygon.clone()),
                        feature.attributes.clone(),
                    )
                }))
            }
            _ => num_dropped += 1,
        }
    }
    if num_dropped > 0 {
        log::warn!(
            "Dropped {} features that are neither Polygons nor MultiPolygons",
            num_dropped
        );
    }
    if num_unkeyed > 0 {
        log::debug!(
            "{} features have no {:?} property and will be grouped under null",
            num_unkeyed,
            property_name
        );
    }
    FeatureCollection::new(features)
}
