use super::model::Observation;
use crate::graph::Router;
use log::{debug, error};
use std::collections::HashMap;

/// Network distance between two candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteDistance {
    Reachable(f64),
    Unreachable,
}

impl RouteDistance {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RouteDistance::Unreachable)
    }

    pub fn meters(&self) -> Option<f64> {
        match self {
            RouteDistance::Reachable(d) => Some(*d),
            RouteDistance::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
    later: usize,
    from_candidate: usize,
    to_candidate: usize,
}

/// Memoized shortest path distances between candidates of a trajectory.
///
/// Entries are partitioned by the earlier observation so a whole partition
/// can be dropped once the decoding window has moved past it.
pub struct DistanceOracle<'r, R: Router + ?Sized> {
    router: &'r R,
    same_position_tolerance: f64,
    cache: HashMap<usize, HashMap<PairKey, RouteDistance>>,
    route_calls: usize,
}

impl<'r, R: Router + ?Sized> DistanceOracle<'r, R> {
    pub fn new(router: &'r R, same_position_tolerance: f64) -> Self {
        DistanceOracle {
            router,
            same_position_tolerance,
            cache: HashMap::new(),
            route_calls: 0,
        }
    }

    pub fn get(&self, a: usize, a_cand: usize, b: usize, b_cand: usize) -> Option<RouteDistance> {
        self.cache.get(&a).and_then(|partition| {
            partition
                .get(&PairKey {
                    later: b,
                    from_candidate: a_cand,
                    to_candidate: b_cand,
                })
                .copied()
        })
    }

    /// Distance from candidate `a_cand` of observation `a` to candidate
    /// `b_cand` of observation `b`, honoring both travel directions.
    pub fn route_distance(
        &mut self,
        traj: &[Observation],
        a: usize,
        a_cand: usize,
        b: usize,
        b_cand: usize,
    ) -> RouteDistance {
        if let Some(distance) = self.get(a, a_cand, b, b_cand) {
            return distance;
        }
        let distance = self.compute(traj, a, a_cand, b, b_cand);
        self.cache.entry(a).or_default().insert(
            PairKey {
                later: b,
                from_candidate: a_cand,
                to_candidate: b_cand,
            },
            distance,
        );
        distance
    }

    fn compute(
        &mut self,
        traj: &[Observation],
        a: usize,
        a_cand: usize,
        b: usize,
        b_cand: usize,
    ) -> RouteDistance {
        let from = traj.get(a).and_then(|o| o.candidates.get(a_cand));
        let to = traj.get(b).and_then(|o| o.candidates.get(b_cand));
        let (from, to) = match (from, to) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                error!("candidate ({}, {}) or ({}, {}) not found", a, a_cand, b, b_cand);
                return RouteDistance::Unreachable;
            }
        };
        if from.position.point.coord_gap(&to.position.point) < self.same_position_tolerance {
            return RouteDistance::Reachable(0.0);
        }
        self.route_calls += 1;
        match self
            .router
            .route(&from.position, from.forward, &to.position, to.forward)
        {
            Ok(route) => RouteDistance::Reachable(route.distance),
            Err(e) => {
                debug!("unroutable pair ({}, {}) -> ({}, {}): {}", a, a_cand, b, b_cand, e);
                RouteDistance::Unreachable
            }
        }
    }

    /// Drops every entry whose earlier observation is `obs`.
    pub fn evict(&mut self, obs: usize) {
        self.cache.remove(&obs);
    }

    pub fn len(&self) -> usize {
        self.cache.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.values().all(|p| p.is_empty())
    }

    /// Number of queries that reached the router.
    pub fn route_calls(&self) -> usize {
        self.route_calls
    }
}
