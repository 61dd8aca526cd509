use super::model::{Config, Observation};
use crate::algorithm::{self, Point};
use crate::graph::{Edge, EdgeIndex, Router};
use log::debug;

/// Snaps an observation onto nearby road edges, filling its candidate list.
///
/// Scans at `min_radius` first and widens by `config.radius_step` while
/// nothing snapped, up to `max_radius`. Returns the number of candidates.
pub fn snap_to_network<G>(
    graph: &G,
    obs: &mut Observation,
    min_radius: f64,
    max_radius: f64,
    config: &Config,
) -> usize
where
    G: Router + EdgeIndex + ?Sized,
{
    let max_radius = if max_radius < min_radius {
        min_radius + 100.0
    } else {
        max_radius
    };
    let mut radius = min_radius;
    loop {
        let mut snapped_edges = 0;
        for edge in graph.edges_near(obs.point, radius) {
            if snap_to_edge(graph, obs, edge, radius, config) {
                snapped_edges += 1;
            }
        }
        radius += config.radius_step;
        if snapped_edges > 0 || radius > max_radius {
            break;
        }
    }
    obs.candidates.len()
}

/// Two cases:
/// 1. perpendicular feet on the edge, every one within `radius` is added;
/// 2. no perpendicular foot, the closest end point within `radius` is added.
fn snap_to_edge<G>(graph: &G, obs: &mut Observation, edge: &Edge, radius: f64, config: &Config) -> bool
where
    G: Router + EdgeIndex + ?Sized,
{
    let mut snapped = false;
    let mut closest_end: Option<(f64, Point)> = None;

    for (a, b) in edge.get_geometry().segments() {
        let (point, end_point) = match algorithm::project_to_line(obs.point, a, b) {
            Some(proj) if proj.within_segment() => (proj.point, false),
            Some(proj) if proj.t > 1.0 => (b, true),
            _ => (a, true),
        };
        let distance = obs.point.distance_to(&point);
        if distance >= radius {
            continue;
        }
        if !end_point {
            add_snapped(graph, obs, edge, point, distance, config);
            snapped = true;
        } else if closest_end.map_or(true, |(d, _)| distance < d) {
            closest_end = Some((distance, point));
        }
    }

    if !snapped {
        if let Some((distance, point)) = closest_end {
            add_snapped(graph, obs, edge, point, distance, config);
            snapped = true;
        }
    }
    snapped
}

fn add_snapped<G>(graph: &G, obs: &mut Observation, edge: &Edge, point: Point, distance: f64, config: &Config)
where
    G: Router + EdgeIndex + ?Sized,
{
    match graph.resolve(point) {
        Ok(position) => {
            obs.add_candidate(position, point, distance, edge.is_oneway(), config);
        }
        Err(e) => debug!(
            "drop snapped point of edge {} {}: {}",
            edge.get_edge_id(),
            edge.get_name(),
            e
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::fixtures;
    use crate::utils::log;

    fn obs(lng: f64, lat: f64) -> Observation {
        Observation::new(0, Point(lng, lat), 0)
    }

    #[test]
    fn test_perpendicular_candidates_both_directions() {
        log::log_init_for_test();
        let graph = fixtures::road_graph(&[fixtures::feature(
            1,
            1,
            2,
            false,
            &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)],
        )]);
        let config = Config::default();
        let mut o = obs(0.0005, 0.0001);
        assert_eq!(snap_to_network(&graph, &mut o, 30.0, 200.0, &config), 2);
        let (fwd, back) = (&o.candidates[0], &o.candidates[1]);
        assert!(fwd.forward && !back.forward);
        assert_eq!((fwd.id, back.id), (0, 1));
        assert_eq!(fwd.point, back.point);
        assert_eq!(fwd.ep, back.ep);
        assert_eq!(fwd.edge_id(), "1");
        assert!((fwd.distance - 11.1).abs() < 0.1);
    }

    #[test]
    fn test_end_point_only_without_perpendicular() {
        let graph = fixtures::road_graph(&[fixtures::feature(
            1,
            1,
            2,
            true,
            &[(0.0, 0.0), (0.001, 0.0)],
        )]);
        let config = Config::default();
        let mut o = obs(0.0012, 0.0);
        assert_eq!(snap_to_network(&graph, &mut o, 30.0, 200.0, &config), 1);
        assert_eq!(o.candidates[0].point, Point(0.001, 0.0));
        assert!((o.candidates[0].distance - 22.2).abs() < 0.1);
    }

    #[test]
    fn test_radius_widens_until_found() {
        let graph = fixtures::road_graph(&[fixtures::feature(
            1,
            1,
            2,
            true,
            &[(0.0, 0.0), (0.002, 0.0)],
        )]);
        let config = Config::default();
        // about 67 m away: found at the 70 m scan
        let mut o = obs(0.001, 0.0006);
        assert_eq!(snap_to_network(&graph, &mut o, 30.0, 200.0, &config), 1);
        assert!(o.candidates[0].distance < 70.0);
        // max below min becomes min + 100
        let mut far = obs(0.001, 0.0011);
        assert_eq!(snap_to_network(&graph, &mut far, 30.0, 10.0, &config), 1);
        let mut too_far = obs(0.001, 0.003);
        assert_eq!(snap_to_network(&graph, &mut too_far, 30.0, 200.0, &config), 0);
    }

    #[test]
    fn test_edge_just_inside_first_radius() {
        let graph = fixtures::road_graph(&[
            fixtures::feature(1, 1, 2, true, &[(0.0, 0.00026965), (0.002, 0.00026965)]),
            fixtures::feature(2, 3, 4, true, &[(0.0, -0.000405), (0.002, -0.000405)]),
        ]);
        let config = Config::default();
        let mut o = obs(0.001, 0.0);
        assert_eq!(snap_to_network(&graph, &mut o, 30.0, 200.0, &config), 1);
        assert_eq!(o.candidates[0].edge_id(), "1");
        assert!(o.candidates[0].distance > 29.9 && o.candidates[0].distance < 30.0);
    }

    #[test]
    fn test_candidates_respect_radius_and_gap() {
        // parallel one way edges 1 m apart collapse into one candidate
        let graph = fixtures::road_graph(&[
            fixtures::feature(1, 1, 2, true, &[(0.0, 0.0), (0.002, 0.0)]),
            fixtures::feature(2, 3, 4, true, &[(0.0, 0.000009), (0.002, 0.000009)]),
            fixtures::feature(3, 5, 6, true, &[(0.0, 0.0001), (0.002, 0.0001)]),
        ]);
        let config = Config::default();
        let mut o = obs(0.001, 0.00005);
        snap_to_network(&graph, &mut o, 30.0, 200.0, &config);
        assert_eq!(o.candidates.len(), 2);
        for (i, a) in o.candidates.iter().enumerate() {
            assert!(a.distance < 200.0);
            for b in &o.candidates[i + 1..] {
                assert!(a.point.distance_to(&b.point) >= 2.0);
            }
        }
        assert_eq!(o.candidates[0].edge_id(), "1");
        assert_eq!(o.candidates[1].edge_id(), "3");
    }
}
