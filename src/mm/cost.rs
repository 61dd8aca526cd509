use super::model::{Observation, RoadSegmentCost};
use crate::graph::{Route, Router};
use log::{debug, warn};

/// Spreads the cost signal difference of each consecutive observation pair
/// over the road edges of the route between their matched candidates, in
/// proportion to the distance traveled on each edge.
///
/// The first entry is the starting edge with cost 0. Pairs whose route fails,
/// whose shape has fewer than two points, or whose cost signal is missing
/// contribute nothing.
pub fn apportion_costs<R: Router + ?Sized>(
    router: &R,
    traj: &[Observation],
    best: &[usize],
    cost_key: &str,
) -> Vec<RoadSegmentCost> {
    let matched: Vec<_> = traj
        .iter()
        .zip(best.iter())
        .filter_map(|(obs, c)| obs.candidates.get(*c).map(|cand| (obs, cand)))
        .collect();
    let mut path_costs = match matched.first() {
        Some((_, first)) => vec![RoadSegmentCost {
            edge_id: first.edge_id().to_string(),
            cost: 0.0,
        }],
        None => return Vec::new(),
    };

    let mut skipped = 0;
    for pair in matched.windows(2) {
        let ((left, left_cand), (right, right_cand)) = (pair[0], pair[1]);
        let total_cost = match (left.cost_signal(cost_key), right.cost_signal(cost_key)) {
            (Some(l), Some(r)) => r - l,
            _ => {
                warn!("observation {} or {} has no {}", left.id, right.id, cost_key);
                skipped += 1;
                continue;
            }
        };
        let route = match router.route(
            &left_cand.position,
            left_cand.forward,
            &right_cand.position,
            right_cand.forward,
        ) {
            Ok(route) if route.shape.len() >= 2 => route,
            Ok(_) => {
                skipped += 1;
                continue;
            }
            Err(e) => {
                debug!("skip pair {} -> {}: {}", left.id, right.id, e);
                skipped += 1;
                continue;
            }
        };

        let (pieces, total_dist) = split_by_edge(router, &route, left_cand.edge_id());
        for piece in pieces {
            let share = total_cost * piece.cost / total_dist;
            match path_costs.last_mut() {
                Some(last) if last.edge_id == piece.edge_id => last.cost += share,
                _ => path_costs.push(RoadSegmentCost {
                    edge_id: piece.edge_id,
                    cost: share,
                }),
            }
        }
    }
    if skipped > 0 {
        debug!("{} observation pairs contributed no cost", skipped);
    }
    path_costs
}

/// Distance traveled per edge along a route shape, consecutive sub segments
/// on the same edge merged. Starts with `start_edge` at 0.
pub fn split_by_edge<R: Router + ?Sized>(
    router: &R,
    route: &Route,
    start_edge: &str,
) -> (Vec<RoadSegmentCost>, f64) {
    let mut pieces = vec![RoadSegmentCost {
        edge_id: start_edge.to_string(),
        cost: 0.0,
    }];
    let mut total = 0.0;
    for w in route.shape.windows(2) {
        let (a, b) = (w[0], w[1]);
        let mut dist = a.distance_to(&b);
        if !(dist > 0.0) {
            dist = 1.0;
        }
        total += dist;
        let edge_id = match router.resolve(a.midpoint(&b)) {
            Ok(position) => position.edge_id,
            // stay on the edge walked so far
            Err(_) => pieces[pieces.len() - 1].edge_id.clone(),
        };
        match pieces.last_mut() {
            Some(last) if last.edge_id == edge_id => last.cost += dist,
            _ => pieces.push(RoadSegmentCost { edge_id, cost: dist }),
        }
    }
    (pieces, total)
}
