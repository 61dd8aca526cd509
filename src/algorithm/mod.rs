use geo::algorithm::haversine_distance::HaversineDistance;
use geojson::{Geometry, Value};

/// Earth radius used by the haversine distance of `geo`.
const EARTH_RADIUS: f64 = 6_371_008.8;
/// meters per degree along a great circle
const METERS_PER_DEGREE: f64 = EARTH_RADIUS * std::f64::consts::PI / 180.0;
/// Widening of bounding boxes so they always cover the haversine circle.
const BOX_MARGIN: f64 = 1.02;

/// A WGS84 position stored as (lng, lat), the geojson axis order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point(pub f64, pub f64);

impl Point {
    /// Great-circle (haversine) distance in meters.
    pub fn distance_to(&self, other: &Point) -> f64 {
        geo::Point::new(self.0, self.1).haversine_distance(&geo::Point::new(other.0, other.1))
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point((self.0 + other.0) / 2.0, (self.1 + other.1) / 2.0)
    }

    /// |dlng| + |dlat| in degrees
    pub fn coord_gap(&self, other: &Point) -> f64 {
        (self.0 - other.0).abs() + (self.1 - other.1).abs()
    }

    fn lerp(&self, other: &Point, t: f64) -> Point {
        Point(
            self.0 + (other.0 - self.0) * t,
            self.1 + (other.1 - self.1) * t,
        )
    }
}

/// Degree extents (lng, lat) covering `meters` around latitude `lat`.
///
/// The extents are slightly larger than the circle, callers check the exact
/// distance afterwards.
pub fn meters_to_degrees(meters: f64, lat: f64) -> (f64, f64) {
    let dlat = meters / METERS_PER_DEGREE * BOX_MARGIN;
    // the box edge nearest the pole is the narrowest
    let cos = (lat.abs() + dlat).min(90.0).to_radians().cos().max(0.01);
    (dlat / cos, dlat)
}

/// Polyline geometry of a road edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line(pub Vec<Point>);

impl TryFrom<Geometry> for Line {
    type Error = anyhow::Error;
    fn try_from(value: Geometry) -> std::result::Result<Self, Self::Error> {
        match value.value {
            Value::LineString(line_string) => {
                let mut points = Vec::with_capacity(line_string.len());
                for p in line_string {
                    if p.len() < 2 {
                        return Err(anyhow::anyhow!("position needs lng and lat"));
                    }
                    points.push(Point(p[0], p[1]));
                }
                if points.len() < 2 {
                    return Err(anyhow::anyhow!("linestring needs at least two positions"));
                }
                Ok(Line(points))
            }
            _ => Err(anyhow::anyhow!("geometry is not linestring")),
        }
    }
}

impl Line {
    /// Haversine length in meters.
    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance_to(&b)).sum()
    }

    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    /// (min, max) corners of the bounding box.
    pub fn bbox(&self) -> (Point, Point) {
        let mut min = Point(180.0, 90.0);
        let mut max = Point(-180.0, -90.0);
        for p in &self.0 {
            min.0 = min.0.min(p.0);
            min.1 = min.1.min(p.1);
            max.0 = max.0.max(p.0);
            max.1 = max.1.max(p.1);
        }
        (min, max)
    }

    pub fn reversed(&self) -> Line {
        Line(self.0.iter().rev().cloned().collect())
    }

    /// Points of the line between two offsets (meters from the first vertex),
    /// interpolated at both ends. `start` must not exceed `end`.
    pub fn slice(&self, start: f64, end: f64) -> Vec<Point> {
        let mut result = Vec::new();
        let mut walked = 0.0;
        for (a, b) in self.segments() {
            let len = a.distance_to(&b);
            let seg_end = walked + len;
            if result.is_empty() && start <= seg_end {
                result.push(interpolate(a, b, len, start - walked));
            }
            if !result.is_empty() {
                if end <= seg_end {
                    result.push(interpolate(a, b, len, end - walked));
                    return dedup_points(result);
                }
                result.push(b);
            }
            walked = seg_end;
        }
        if result.is_empty() {
            // offsets past the end collapse to the last vertex
            if let Some(last) = self.0.last() {
                result.push(*last);
            }
        }
        dedup_points(result)
    }
}

fn interpolate(a: Point, b: Point, len: f64, along: f64) -> Point {
    if len <= 0.0 {
        return a;
    }
    a.lerp(&b, (along / len).clamp(0.0, 1.0))
}

/// Removes consecutive duplicate points.
pub fn dedup_points(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup();
    points
}

/// Foot of the perpendicular from a point onto the infinite line through a
/// segment, with its parameter `t` along the segment (0 at `a`, 1 at `b`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point,
    pub t: f64,
}

impl Projection {
    pub fn within_segment(&self) -> bool {
        (0.0..=1.0).contains(&self.t)
    }
}

/// Planar (lng/lat) projection; `None` for a zero-length segment.
pub fn project_to_line(p: Point, a: Point, b: Point) -> Option<Projection> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    if len2 <= 0.0 || !len2.is_finite() {
        return None;
    }
    let t = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2;
    Some(Projection {
        point: a.lerp(&b, t),
        t,
    })
}

/// Closest point of segment a-b to `p`.
pub fn closest_on_segment(p: Point, a: Point, b: Point) -> Point {
    match project_to_line(p, a, b) {
        Some(proj) if proj.within_segment() => proj.point,
        Some(proj) if proj.t > 1.0 => b,
        _ => a,
    }
}

/// Linear reference of `p` on a polyline: (distance to the line, offset of
/// the closest point along the line, closest point). Distances in meters.
pub fn linear_reference_distance(p: Point, line: &[Point]) -> (f64, f64, Point) {
    let mut best = (f64::MAX, 0.0, p);
    let mut walked = 0.0;
    for w in line.windows(2) {
        let (a, b) = (w[0], w[1]);
        let closest = closest_on_segment(p, a, b);
        let distance = p.distance_to(&closest);
        if distance < best.0 {
            best = (distance, walked + a.distance_to(&closest), closest);
        }
        walked += a.distance_to(&b);
    }
    if line.len() == 1 {
        best = (p.distance_to(&line[0]), 0.0, line[0]);
    }
    best
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_projection_parameter() {
        let a = Point(0.0, 0.0);
        let b = Point(1.0, 0.0);
        let inside = project_to_line(Point(0.25, 0.5), a, b).unwrap();
        assert!(inside.within_segment());
        assert_eq!(inside.point, Point(0.25, 0.0));
        let before = project_to_line(Point(-0.5, 0.5), a, b).unwrap();
        assert!(!before.within_segment());
        assert!(before.t < 0.0);
        assert!(project_to_line(Point(0.0, 1.0), a, a).is_none());
    }

    #[test]
    fn test_closest_on_segment_clamps() {
        let a = Point(0.0, 0.0);
        let b = Point(0.0, 1.0);
        assert_eq!(closest_on_segment(Point(1.0, 2.0), a, b), b);
        assert_eq!(closest_on_segment(Point(1.0, -2.0), a, b), a);
        assert_eq!(closest_on_segment(Point(1.0, 0.5), a, b), Point(0.0, 0.5));
    }

    #[test]
    fn test_linear_reference() {
        let line = vec![Point(0.0, 0.0), Point(0.001, 0.0), Point(0.002, 0.0)];
        let (distance, offset, closest) = linear_reference_distance(Point(0.0015, 0.0001), &line);
        assert!((closest.0 - 0.0015).abs() < 1e-12);
        assert!((distance - 11.1).abs() < 0.2);
        let total = Line(line).length();
        assert!((offset - total * 0.75).abs() < 0.01);
    }

    #[test]
    fn test_slice_interpolates_ends() {
        let line = Line(vec![Point(0.0, 0.0), Point(0.001, 0.0), Point(0.002, 0.0)]);
        let total = line.length();
        let part = line.slice(total * 0.25, total * 0.75);
        assert_eq!(part.len(), 3);
        assert!((part[0].0 - 0.0005).abs() < 1e-9);
        assert_eq!(part[1], Point(0.001, 0.0));
        assert!((part[2].0 - 0.0015).abs() < 1e-9);
        let whole = line.slice(0.0, total);
        assert_eq!(whole.first(), Some(&Point(0.0, 0.0)));
        assert!((whole.last().unwrap().0 - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_degree_box_covers_radius() {
        for lat in [0.0, 45.0, 70.0] {
            let (dlng, dlat) = meters_to_degrees(30.0, lat);
            let center = Point(10.0, lat);
            assert!(center.distance_to(&Point(10.0 + dlng, lat)) >= 30.0);
            assert!(center.distance_to(&Point(10.0, lat + dlat)) >= 30.0);
            assert!(center.distance_to(&Point(10.0, lat - dlat)) >= 30.0);
        }
    }

    #[test]
    fn test_haversine_distance_scale() {
        // one thousandth of a degree along the equator
        let d = Point(0.0, 0.0).distance_to(&Point(0.001, 0.0));
        assert!((d - 111.19).abs() < 0.1);
    }
}
