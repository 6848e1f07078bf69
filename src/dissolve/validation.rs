use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};

/// Envelope of a ring segment, tagged with the segment index.
type SegmentEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn segment_corners(segment: &geo::Line) -> ([f64; 2], [f64; 2]) {
    (
        [segment.start.x, segment.start.y],
        [segment.end.x, segment.end.y],
    )
}

/// Check that every ring of `polygon` can be fed to the union algorithm. Returns a description of the first
/// problem found.
pub fn validate_polygon(polygon: &geo::Polygon) -> Result<(), String> {
    validate_ring(polygon.exterior()).map_err(|reason| format!("exterior ring {}", reason))?;
    for (index, interior) in polygon.interiors().iter().enumerate() {
        validate_ring(interior).map_err(|reason| format!("interior ring {} {}", index, reason))?;
    }
    Ok(())
}

fn validate_ring(ring: &geo::LineString) -> Result<(), String> {
    if !ring.is_closed() {
        return Err("is not closed".to_string());
    }
    if ring.0.len() < 4 {
        return Err(format!(
            "has {} coordinates, at least 4 are required",
            ring.0.len()
        ));
    }
    if ring
        .coords()
        .any(|coord| !coord.x.is_finite() || !coord.y.is_finite())
    {
        return Err("contains non-finite coordinates".to_string());
    }

    let mut coords = ring.0.clone();
    coords.dedup();
    if coords.len() < 4 {
        return Err("has fewer than three distinct points".to_string());
    }
    if let Some((first, second, at)) = find_self_intersection(&coords) {
        return Err(format!(
            "intersects itself between segments {} and {} at ({}, {})",
            first, second, at.x, at.y
        ));
    }
    Ok(())
}

/// Find a pair of segments of a closed ring that cross or overlap, other than neighbours meeting at their
/// shared vertex. `coords` must not contain consecutive duplicates.
fn find_self_intersection(coords: &[geo::Coord]) -> Option<(usize, usize, geo::Coord)> {
    let segments: Vec<geo::Line> = coords
        .windows(2)
        .map(|pair| geo::Line::new(pair[0], pair[1]))
        .collect();
    let num_segments = segments.len();
    let rtree = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let (start, end) = segment_corners(segment);
                SegmentEnvelope::new(Rectangle::from_corners(start, end), index)
            })
            .collect(),
    );

    for (index, segment) in segments.iter().enumerate() {
        let (start, end) = segment_corners(segment);
        let envelope = AABB::from_corners(start, end);
        for candidate in rtree.locate_in_envelope_intersecting(&envelope) {
            let other_index = candidate.data;
            if other_index <= index {
                continue;
            }
            let adjacent =
                other_index == index + 1 || (index == 0 && other_index == num_segments - 1);
            match line_intersection(*segment, segments[other_index]) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if !adjacent {
                        return Some((index, other_index, intersection));
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    return Some((index, other_index, intersection.start));
                }
            }
        }
    }
    None
}
