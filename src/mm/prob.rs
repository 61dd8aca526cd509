use super::cache::DistanceOracle;
use super::model::{MatchState, Observation};
use crate::graph::Router;
use std::f64::consts::PI;

/// Zero mean gaussian density of the snapped distance, never zero.
pub fn emission_probability(distance: f64, sigma: f64) -> f64 {
    let a = distance / sigma;
    let v = 1.0 / (sigma * (2.0 * PI).sqrt()) * f64::exp(-0.5 * a * a);
    if v < f64::MIN_POSITIVE {
        return f64::MIN_POSITIVE;
    }
    v
}

/// Likelihood of moving from state `a` to the adjacent state `b`.
///
/// The candidates of `a`'s window, extended with `b`'s last one when `b`
/// reaches further, form a chain. The direct network distance between the
/// chain's ends is compared with the sum of its hop distances:
/// `1/β · exp(-|direct - hops| / β)`. Zero when any distance is unreachable.
pub fn transition_probability<R: Router + ?Sized>(
    oracle: &mut DistanceOracle<'_, R>,
    traj: &[Observation],
    a: &MatchState,
    b: &MatchState,
    beta: f64,
) -> f64 {
    let mut chain: Vec<(usize, usize)> = a
        .candidates
        .iter()
        .enumerate()
        .map(|(k, c)| (a.first_obs() + k, *c))
        .collect();
    if !b.candidates.is_empty() && b.last_obs() > a.last_obs() {
        chain.push((b.last_obs(), b.candidates[b.candidates.len() - 1]));
    }
    if chain.len() < 2 {
        return 1.0 / beta;
    }

    let (first, last) = (chain[0], chain[chain.len() - 1]);
    let direct = match oracle.route_distance(traj, first.0, first.1, last.0, last.1).meters() {
        Some(d) => d,
        None => return 0.0,
    };
    let mut hops = 0.0;
    for w in chain.windows(2) {
        match oracle.route_distance(traj, w[0].0, w[0].1, w[1].0, w[1].1).meters() {
            Some(d) => hops += d,
            None => return 0.0,
        }
    }
    1.0 / beta * f64::exp(-(direct - hops).abs() / beta)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mm::cache::test::{observation, CountingRouter};

    #[test]
    fn test_emission_positive_and_decreasing() {
        let mut last = f64::MAX;
        for step in 0..200 {
            let p = emission_probability(step as f64 * 25.0, 100.0);
            assert!(p > 0.0);
            assert!(p <= last);
            last = p;
        }
        let peak = emission_probability(0.0, 100.0);
        assert!((peak - 1.0 / (100.0 * (2.0 * PI).sqrt())).abs() < 1e-15);
        assert_eq!(emission_probability(1e9, 100.0), f64::MIN_POSITIVE);
    }

    fn state(center: usize, zero: usize, candidates: Vec<usize>) -> MatchState {
        MatchState {
            center,
            zero,
            candidates,
        }
    }

    #[test]
    fn test_transition_consistent_chain() {
        // offsets along one edge: 0, 100, 200, 300
        let traj = vec![
            observation(0, &[0.0]),
            observation(1, &[100.0]),
            observation(2, &[200.0]),
            observation(3, &[300.0]),
        ];
        let router = CountingRouter::default();
        let mut oracle = DistanceOracle::new(&router, 1e-4);
        let a = state(1, 1, vec![0, 0, 0]);
        let b = state(2, 1, vec![0, 0, 0]);
        let p = transition_probability(&mut oracle, &traj, &a, &b, 50.0);
        assert!((p - 1.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_transition_detour_is_penalized() {
        // the middle fix sits 100 m behind, the chain doubles back
        let traj = vec![
            observation(0, &[0.0]),
            observation(1, &[300.0]),
            observation(2, &[200.0]),
        ];
        let router = CountingRouter {
            allow_backward: true,
            ..Default::default()
        };
        let mut oracle = DistanceOracle::new(&router, 1e-4);
        let a = state(0, 0, vec![0, 0]);
        let b = state(1, 1, vec![0, 0, 0]);
        let p = transition_probability(&mut oracle, &traj, &a, &b, 50.0);
        // direct 200, hops 300 + 100
        let expected = 1.0 / 50.0 * f64::exp(-200.0 / 50.0);
        assert!((p - expected).abs() < 1e-15);
    }

    #[test]
    fn test_transition_unreachable_is_zero() {
        let traj = vec![
            observation(0, &[0.0]),
            observation(1, &[100.0]),
            observation(2, &[50.0]),
        ];
        let router = CountingRouter::default();
        let mut oracle = DistanceOracle::new(&router, 1e-4);
        let a = state(0, 0, vec![0, 0]);
        let b = state(1, 1, vec![0, 0, 0]);
        assert_eq!(
            transition_probability(&mut oracle, &traj, &a, &b, 50.0),
            0.0
        );
    }
}
