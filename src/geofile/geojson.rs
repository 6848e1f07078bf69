use std::{fs, io, path::Path};

use crate::error::PipelineError;

use super::feature::{Feature, FeatureCollection};

/// Parse GeoJSON text into a FeatureCollection. `location` names the source in error messages.
///
/// Features with a null geometry are dropped with a warning, since they cannot take part in a dissolve.
pub fn parse_feature_collection(
    contents: &str,
    location: &str,
) -> Result<FeatureCollection, PipelineError> {
    let parse_error = |reason: String| PipelineError::Parse {
        location: location.to_string(),
        reason,
    };
    let parsed: geojson::GeoJson = contents
        .parse()
        .map_err(|err: geojson::Error| parse_error(err.to_string()))?;
    let feature_collection = match parsed {
        geojson::GeoJson::FeatureCollection(feature_collection) => feature_collection,
        geojson::GeoJson::Feature(_) => {
            return Err(parse_error("expected a FeatureCollection, found a Feature".to_string()))
        }
        geojson::GeoJson::Geometry(_) => {
            return Err(parse_error(
                "expected a FeatureCollection, found a Geometry".to_string(),
            ))
        }
    };

    let num_features = feature_collection.features.len();
    let mut features = Vec::with_capacity(num_features);
    for (index, geojson_feature) in feature_collection.features.into_iter().enumerate() {
        let Some(geometry) = geojson_feature.geometry else {
            continue;
        };
        let geometry = geo::Geometry::try_from(geometry)
            .map_err(|err| parse_error(format!("feature {}: {}", index, err)))?;
        features.push(Feature::new(
            geometry,
            geojson_feature.properties.unwrap_or_default(),
        ));
    }
    if features.len() != num_features {
        log::warn!(
            "Out of {} features read from {}, {} had no geometry and were dropped.",
            num_features,
            location,
            num_features - features.len()
        )
    }
    Ok(FeatureCollection::new(features))
}

impl From<&Feature> for geojson::Feature {
    fn from(feature: &Feature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::from(&feature.geometry)),
            id: None,
            properties: Some(feature.attributes.clone()),
            foreign_members: None,
        }
    }
}

impl From<&FeatureCollection> for geojson::FeatureCollection {
    fn from(collection: &FeatureCollection) -> Self {
        geojson::FeatureCollection {
            bbox: None,
            features: collection.iter().map(geojson::Feature::from).collect(),
            foreign_members: None,
        }
    }
}

pub fn write_features_to_geojson(
    collection: &FeatureCollection,
    output_filepath: &Path,
) -> io::Result<()> {
    let geojson_contents =
        geojson::GeoJson::from(geojson::FeatureCollection::from(collection));
    fs::write(output_filepath, geojson_contents.to_string())
}
