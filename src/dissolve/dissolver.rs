use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
};

use geo::{BooleanOps, BoundingRect};
use indicatif::{ParallelProgressIterator, ProgressBar};
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, RTreeObject,
};

use crate::{
    error::PipelineError,
    geofile::feature::{Feature, FeatureCollection, FeatureMap},
};

use super::{
    key::{group_by_key, GroupKey, IndexedFeature},
    validation::validate_polygon,
};

/// Bounding box of a polygon, tagged with the polygon's position in its group.
type PolygonEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// A polygon paired with the index of its feature in the dissolved collection.
type IndexedPolygon<'a> = (usize, &'a geo::Polygon);

/// Union all polygons sharing a value of `property_name`.
///
/// Every output feature is a single Polygon. A key whose polygons do not all connect yields one feature per
/// connected piece. A key with exactly one polygon yields that feature unchanged, apart from the key
/// property being set to its canonical value (a missing key becomes `null`). Pieces produced by a union only
/// carry the key property.
///
/// The input must be normalized: a MultiPolygon or any other non-Polygon geometry is a `Geometry` error, as
/// is any ring that is not closed, has too few points, or intersects itself.
pub fn dissolve(
    collection: &FeatureCollection,
    property_name: &str,
) -> Result<FeatureCollection, PipelineError> {
    let groups: Vec<(GroupKey, Vec<IndexedFeature>)> =
        group_by_key(collection, property_name)?.into_iter().collect();
    log::info!(
        "Dissolving {} polygons in {} groups by {:?}",
        collection.len(),
        groups.len(),
        property_name
    );

    let bar = ProgressBar::new(groups.len() as u64);
    let dissolved_groups: Vec<Vec<Feature>> = groups
        .par_iter()
        .progress_with(bar.clone())
        .map(|(key, members)| dissolve_group(property_name, key, members))
        .collect::<Result<Vec<Vec<Feature>>, PipelineError>>()?;
    bar.finish_and_clear();

    Ok(dissolved_groups.into_iter().flatten().collect())
}

fn dissolve_group(
    property_name: &str,
    key: &GroupKey,
    members: &[IndexedFeature],
) -> Result<Vec<Feature>, PipelineError> {
    let geometry_error = |feature_index: usize, reason: String| PipelineError::Geometry {
        key: key.clone(),
        feature_index,
        reason,
    };

    let mut polygons: Vec<IndexedPolygon> = Vec::with_capacity(members.len());
    for (feature_index, feature) in members {
        let polygon = match &feature.geometry {
            geo::Geometry::Polygon(polygon) => polygon,
            other => {
                return Err(geometry_error(
                    *feature_index,
                    format!(
                        "expected a Polygon, found a {}; normalize the collection first",
                        geometry_type_name(other)
                    ),
                ))
            }
        };
        validate_polygon(polygon).map_err(|reason| geometry_error(*feature_index, reason))?;
        polygons.push((*feature_index, polygon));
    }

    if let [(_, feature)] = members {
        let mut feature = (*feature).clone();
        feature
            .attributes
            .insert(property_name.to_string(), key.to_value());
        return Ok(vec![feature]);
    }

    let mut attributes = FeatureMap::new();
    attributes.insert(property_name.to_string(), key.to_value());
    let mut pieces = Vec::new();
    for component in cluster_by_envelope(&polygons) {
        let component_polygons: Vec<IndexedPolygon> =
            component.iter().map(|&position| polygons[position]).collect();
        let merged = union_polygons(key, &component_polygons)?;
        pieces.extend(merged.0.into_iter().map(|polygon| {
            Feature::new(geo::Geometry::Polygon(polygon), attributes.clone())
        }));
    }
    log::debug!(
        "Dissolved {} polygons with key {} into {} pieces",
        members.len(),
        key,
        pieces.len()
    );
    Ok(pieces)
}

/// Partition polygons into groups whose bounding boxes overlap, directly or through other members. Only
/// polygons in the same group can merge. Groups are returned as positions into `polygons`, ordered by their
/// first member.
fn cluster_by_envelope(polygons: &[IndexedPolygon]) -> Vec<Vec<usize>> {
    let envelopes: Vec<PolygonEnvelope> = polygons
        .iter()
        .enumerate()
        .filter_map(|(position, (_, polygon))| {
            polygon.bounding_rect().map(|rect| {
                PolygonEnvelope::new(
                    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                    position,
                )
            })
        })
        .collect();
    let rtree = RTree::bulk_load(envelopes);

    let mut union_find = UnionFind::<usize>::new(polygons.len());
    for envelope in rtree.iter() {
        for other in rtree.locate_in_envelope_intersecting(&envelope.envelope()) {
            union_find.union(envelope.data, other.data);
        }
    }

    let mut component_positions: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for position in 0..polygons.len() {
        let root = union_find.find(position);
        match component_positions.get(&root) {
            Some(&component) => components[component].push(position),
            None => {
                component_positions.insert(root, components.len());
                components.push(vec![position]);
            }
        }
    }
    components
}

/// Fold the polygons into their union. A panic inside the union algorithm is reported against the polygon
/// that was being added.
fn union_polygons(
    key: &GroupKey,
    polygons: &[IndexedPolygon],
) -> Result<geo::MultiPolygon, PipelineError> {
    let mut merged = geo::MultiPolygon::new(vec![polygons[0].1.clone()]);
    for (feature_index, polygon) in &polygons[1..] {
        let next = geo::MultiPolygon::new(vec![(*polygon).clone()]);
        merged = panic::catch_unwind(AssertUnwindSafe(|| merged.union(&next))).map_err(|_| {
            PipelineError::Geometry {
                key: key.clone(),
                feature_index: *feature_index,
                reason: "polygon union failed".to_string(),
            }
        })?;
    }
    Ok(merged)
}

fn geometry_type_name(geometry: &geo::Geometry) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::Area;
    use rstest::rstest;
    use serde_json::json;

    use crate::{
        dissolve::key::GroupKey,
        error::PipelineError,
        geofile::feature::{Feature, FeatureCollection, FeatureMap},
    };

    use super::dissolve;

    fn square(x: f64, y: f64, size: f64) -> geo::Polygon {
        geo::Polygon::new(
            vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)].into(),
            vec![],
        )
    }

    fn keyed(polygon: geo::Polygon, properties: serde_json::Value) -> Feature {
        let attributes: FeatureMap = match properties {
            serde_json::Value::Object(map) => map,
            _ => FeatureMap::new(),
        };
        Feature::new(geo::Geometry::Polygon(polygon), attributes)
    }

    fn features_with_key<'a>(
        collection: &'a FeatureCollection,
        value: serde_json::Value,
    ) -> Vec<&'a Feature> {
        collection
            .iter()
            .filter(|feature| feature.attributes.get("STATEFP") == Some(&value))
            .collect()
    }

    #[test]
    fn test_overlapping_polygons_merge() {
        let first = square(0.0, 0.0, 2.0);
        let second = square(1.0, 1.0, 2.0);
        let input = FeatureCollection::new(vec![
            keyed(first.clone(), json!({"STATEFP": "06"})),
            keyed(second.clone(), json!({"STATEFP": "06"})),
        ]);

        let output = dissolve(&input, "STATEFP").unwrap();

        assert_eq!(1, output.len());
        let area = output.features[0].geometry.unsigned_area();
        assert!(area >= first.unsigned_area().max(second.unsigned_area()));
        assert!(area <= first.unsigned_area() + second.unsigned_area());
        assert_abs_diff_eq!(area, 7.0, epsilon = 1e-9);
        assert_eq!(
            json!({"STATEFP": "06"}).as_object().unwrap(),
            &output.features[0].attributes
        );
    }

    #[test]
    fn test_adjacent_polygons_merge() {
        let input = FeatureCollection::new(vec![
            keyed(square(0.0, 0.0, 1.0), json!({"STATEFP": 6})),
            keyed(square(1.0, 0.0, 1.0), json!({"STATEFP": 6})),
        ]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(1, output.len());
        assert_abs_diff_eq!(output.features[0].geometry.unsigned_area(), 2.0, epsilon = 1e-9);
    }

    #[rstest]
    #[case::far_apart(square(0.0, 0.0, 1.0), square(10.0, 10.0, 1.0))]
    #[case::overlapping_bounding_boxes(
        geo::Polygon::new(vec![(0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (0.0, 0.0)].into(), vec![]),
        geo::Polygon::new(vec![(4.0, 1.0), (4.0, 4.0), (1.0, 4.0), (4.0, 1.0)].into(), vec![])
    )]
    fn test_disjoint_polygons_stay_separate(
        #[case] first: geo::Polygon,
        #[case] second: geo::Polygon,
    ) {
        let input = FeatureCollection::new(vec![
            keyed(first, json!({"STATEFP": "06"})),
            keyed(second, json!({"STATEFP": "06"})),
        ]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(2, output.len());
        for feature in &output {
            assert!(matches!(feature.geometry, geo::Geometry::Polygon(_)));
        }
    }

    #[test]
    fn test_different_keys_do_not_merge() {
        let input = FeatureCollection::new(vec![
            keyed(square(0.0, 0.0, 2.0), json!({"STATEFP": "06"})),
            keyed(square(1.0, 1.0, 2.0), json!({"STATEFP": "41"})),
            keyed(square(1.5, 1.5, 2.0), json!({"STATEFP": "06"})),
        ]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(2, output.len());
        // Keys come out in first-seen order.
        assert_eq!(json!("06"), output.features[0].attributes["STATEFP"]);
        assert_eq!(json!("41"), output.features[1].attributes["STATEFP"]);
        assert_eq!(1, features_with_key(&output, json!("41")).len());
    }

    #[test]
    fn test_single_polygon_group_is_unchanged() {
        let feature = keyed(
            square(0.0, 0.0, 1.0),
            json!({"STATEFP": "06", "NAME": "Alameda"}),
        );
        let input = FeatureCollection::new(vec![feature.clone()]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(vec![feature], output.features);
    }

    #[test]
    fn test_missing_and_null_keys_share_a_group() {
        let input = FeatureCollection::new(vec![
            keyed(square(0.0, 0.0, 2.0), json!({})),
            keyed(square(1.0, 1.0, 2.0), json!({"STATEFP": null})),
        ]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(1, output.len());
        assert_eq!(
            json!({"STATEFP": null}).as_object().unwrap(),
            &output.features[0].attributes
        );
    }

    #[test]
    fn test_single_feature_without_key_gets_null_key() {
        let input = FeatureCollection::new(vec![keyed(
            square(0.0, 0.0, 1.0),
            json!({"NAME": "unkeyed"}),
        )]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(1, output.len());
        assert_eq!(
            json!({"NAME": "unkeyed", "STATEFP": null}).as_object().unwrap(),
            &output.features[0].attributes
        );
        assert_eq!(input.features[0].geometry, output.features[0].geometry);
    }

    #[test]
    fn test_polygon_with_hole_keeps_hole() {
        let with_hole = geo::Polygon::new(
            vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)].into(),
            vec![vec![(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0), (1.0, 1.0)].into()],
        );
        let input = FeatureCollection::new(vec![
            keyed(with_hole, json!({"STATEFP": "06"})),
            keyed(square(4.0, 0.0, 1.0), json!({"STATEFP": "06"})),
        ]);
        let output = dissolve(&input, "STATEFP").unwrap();
        assert_eq!(1, output.len());
        assert_abs_diff_eq!(output.features[0].geometry.unsigned_area(), 13.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_creates_hole_around_empty_cell() {
        let bar = |min_x: f64, min_y: f64, max_x: f64, max_y: f64| {
            geo::Polygon::new(
                vec![
                    (min_x, min_y),
                    (max_x, min_y),
                    (max_x, max_y),
                    (min_x, max_y),
                    (min_x, min_y),
                ]
                .into(),
                vec![],
            )
        };
        let input = FeatureCollection::new(vec![
            keyed(bar(0.0, 0.0, 3.0, 1.0), json!({"STATEFP": "06"})),
            keyed(bar(0.0, 2.0, 3.0, 3.0), json!({"STATEFP": "06"})),
            keyed(bar(0.0, 1.0, 1.0, 2.0), json!({"STATEFP": "06"})),
            keyed(bar(2.0, 1.0, 3.0, 2.0), json!({"STATEFP": "06"})),
        ]);

        let output = dissolve(&input, "STATEFP").unwrap();

        assert_eq!(1, output.len());
        match &output.features[0].geometry {
            geo::Geometry::Polygon(polygon) => assert_eq!(1, polygon.interiors().len()),
            other => panic!("Expected a Polygon, got {:?}", other),
        }
        assert_abs_diff_eq!(output.features[0].geometry.unsigned_area(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_polygon_is_geometry_error() {
        let bowtie = geo::Polygon::new(
            vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)].into(),
            vec![],
        );
        let input = FeatureCollection::new(vec![
            keyed(square(0.0, 0.0, 1.0), json!({"STATEFP": "06"})),
            keyed(bowtie, json!({"STATEFP": "41"})),
        ]);
        match dissolve(&input, "STATEFP") {
            Err(PipelineError::Geometry {
                key, feature_index, ..
            }) => {
                assert_eq!(GroupKey::String("41".to_string()), key);
                assert_eq!(1, feature_index);
            }
            other => panic!("Expected a geometry error, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_polygon_input_is_rejected() {
        let input = FeatureCollection::new(vec![Feature::from(geo::Geometry::MultiPolygon(
            geo::MultiPolygon::new(vec![square(0.0, 0.0, 1.0)]),
        ))]);
        assert!(matches!(
            dissolve(&input, "STATEFP"),
            Err(PipelineError::Geometry { .. })
        ));
    }

    #[test]
    fn test_empty_collection() {
        assert!(dissolve(&FeatureCollection::default(), "STATEFP")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_input_is_not_modified() {
        let input = FeatureCollection::new(vec![
            keyed(square(0.0, 0.0, 2.0), json!({"STATEFP": "06", "NAME": "a"})),
            keyed(square(1.0, 1.0, 2.0), json!({"STATEFP": "06", "NAME": "b"})),
        ]);
        let original = input.clone();
        dissolve(&input, "STATEFP").unwrap();
        assert_eq!(original, input);
    }
}
