use super::cache::DistanceOracle;
use super::model::{MatchState, Observation};
use super::prob;
use super::state;
use crate::graph::Router;
use log::{debug, info};

/// Surviving states of one decoding step.
#[derive(Default)]
struct Layer {
    states: Vec<MatchState>,
    cumulative_prob: Vec<f64>, // log space
    back: Vec<usize>,          // best predecessor in the previous layer
}

impl Layer {
    fn push(&mut self, state: MatchState, prob: f64, back: usize) {
        self.states.push(state);
        self.cumulative_prob.push(prob);
        self.back.push(back);
    }

    /// Index of the most probable state, first on ties.
    fn best(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.cumulative_prob.iter().enumerate() {
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((i, *p));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Best candidate per observation and the decoded segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub best: Vec<Option<usize>>,
    pub segments: Vec<(usize, usize)>,
}

/// Windowed Viterbi that restarts after a dead end instead of failing the
/// whole trajectory.
pub struct PartialViterbi<'t, 'r, R: Router + ?Sized> {
    traj: &'t [Observation],
    oracle: DistanceOracle<'r, R>,
    history: usize,
    beta: f64,
    log_floor: f64,
}

impl<'t, 'r, R: Router + ?Sized> PartialViterbi<'t, 'r, R> {
    pub fn new(
        traj: &'t [Observation],
        oracle: DistanceOracle<'r, R>,
        history: usize,
        beta: f64,
        log_floor: f64,
    ) -> Self {
        PartialViterbi {
            traj,
            oracle,
            history,
            beta,
            log_floor,
        }
    }

    pub fn decode(mut self) -> Decoded {
        let n = self.traj.len();
        let mut decoded = Decoded {
            best: vec![None; n],
            segments: Vec::new(),
        };
        let mut start = 0;
        while start < n {
            match self.decode_segment(start, &mut decoded.best) {
                None => start += 1,
                Some(end) => {
                    decoded.segments.push((start, end));
                    if end + 1 >= n {
                        break;
                    }
                    // keep `history` observations of overlap when the segment is long enough
                    start = if end + 1 <= start + self.history {
                        start + 1
                    } else {
                        end + 1 - self.history
                    };
                }
            }
        }
        info!(
            "decoded {} observations in {} segments, {} route queries",
            n,
            decoded.segments.len(),
            self.oracle.route_calls()
        );
        decoded
    }

    /// Decodes from `start` until a dead end or the trajectory end, writing the
    /// backtracked candidates into `best`. Returns the last decoded
    /// observation, `None` when the very first step dead-ends.
    fn decode_segment(&mut self, start: usize, best: &mut [Option<usize>]) -> Option<usize> {
        let traj = self.traj;
        let mut layers: Vec<Layer> = Vec::new();

        let mut first = Layer::default();
        for s in state::build_states(traj, start, self.history, start) {
            let ep = traj[start].candidates[s.center_candidate()].ep;
            first.push(s, ep.ln(), 0);
        }
        layers.push(first);

        let mut end = None;
        for i in start + 1..traj.len() {
            let mut layer = Layer::default();
            let prev = &layers[layers.len() - 1];
            for current in state::build_states(traj, i, self.history, start) {
                let ep_ln = traj[i].candidates[current.center_candidate()].ep.ln();
                let mut chosen: Option<(usize, f64)> = None;
                for (k, previous) in prev.states.iter().enumerate() {
                    if !state::are_adjacent(previous, &current) {
                        continue;
                    }
                    let tp = prob::transition_probability(
                        &mut self.oracle,
                        traj,
                        previous,
                        &current,
                        self.beta,
                    );
                    // also rejects NaN
                    if !(tp > 0.0) {
                        continue;
                    }
                    let cumulative = prev.cumulative_prob[k] + tp.ln() + ep_ln;
                    if chosen.map_or(true, |(_, c)| cumulative > c) {
                        chosen = Some((k, cumulative));
                    }
                }
                if let Some((k, cumulative)) = chosen {
                    if cumulative > self.log_floor {
                        layer.push(current, cumulative, k);
                    }
                }
            }

            // observation i - history - 1 left the trailing window
            if i > self.history {
                self.oracle.evict(i - self.history - 1);
            }

            if layer.states.is_empty() {
                debug!("dead end at observation {}, segment from {}", i, start);
                break;
            }
            layers.push(layer);
            end = Some(i);
        }

        let end = end?;
        let mut idx = layers[layers.len() - 1].best()?;
        for (j, layer) in layers.iter().enumerate().rev() {
            best[start + j] = Some(layer.states[idx].center_candidate());
            idx = layer.back[idx];
        }
        debug!("segment {} ..= {} decoded", start, end);
        Some(end)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::{fixtures, RoadGraph};
    use crate::mm::model::Config;
    use crate::mm::traj::{build_trajectory, TrajInfo};
    use crate::algorithm::Point;

    fn samples(lngs: &[f64], lat: f64) -> Vec<TrajInfo> {
        lngs.iter()
            .enumerate()
            .map(|(i, lng)| TrajInfo::new(Point(*lng, lat), i as i64))
            .collect()
    }

    fn decode(graph: &RoadGraph, traj: &[Observation], config: &Config) -> Decoded {
        let oracle = DistanceOracle::new(graph, config.same_position_tolerance);
        PartialViterbi::new(traj, oracle, config.history_length, config.beta, config.log_floor)
            .decode()
    }

    #[test]
    fn test_single_segment_on_one_edge() {
        let graph = fixtures::road_graph(&[fixtures::feature(
            1,
            1,
            2,
            true,
            &[(0.0, 0.0), (0.01, 0.0)],
        )]);
        let config = Config::default();
        let lngs: Vec<f64> = (0..20).map(|k| 0.0002 + 0.0003 * k as f64).collect();
        let traj = build_trajectory(&graph, samples(&lngs, 0.00002), &config);
        assert_eq!(traj.len(), 20);
        let decoded = decode(&graph, &traj, &config);
        assert_eq!(decoded.segments, vec![(0, 19)]);
        assert!(decoded.best.iter().all(|b| *b == Some(0)));
    }

    #[test]
    fn test_restart_after_disconnected_edges() {
        crate::utils::log::log_init_for_test();
        let graph = fixtures::road_graph(&[
            fixtures::feature(1, 1, 2, true, &[(0.0, 0.0), (0.01, 0.0)]),
            fixtures::feature(2, 3, 4, true, &[(0.02, 0.0), (0.03, 0.0)]),
        ]);
        let config = Config::default();
        let mut lngs: Vec<f64> = (0..30).map(|k| 0.00005 + 0.0003 * k as f64).collect();
        lngs.extend((0..30).map(|k| 0.02005 + 0.0003 * k as f64));
        let traj = build_trajectory(&graph, samples(&lngs, 0.00001), &config);
        assert_eq!(traj.len(), 60);

        let decoded = decode(&graph, &traj, &config);
        assert_eq!(decoded.segments, vec![(0, 27), (26, 27), (30, 59)]);
        assert_eq!(decoded.best[28], None);
        assert_eq!(decoded.best[29], None);
        for (i, best) in decoded.best.iter().enumerate() {
            if let Some(c) = best {
                let expected = if i < 30 { "1" } else { "2" };
                assert_eq!(traj[i].candidates[*c].edge_id(), expected);
            }
        }
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let graph = fixtures::road_graph(&[
            fixtures::feature(1, 1, 2, false, &[(0.0, 0.0), (0.01, 0.0)]),
            fixtures::feature(2, 3, 4, false, &[(0.0, 0.00006), (0.01, 0.00006)]),
        ]);
        let config = Config {
            history_length: 1,
            ..Config::default()
        };
        let lngs: Vec<f64> = (0..15).map(|k| 0.0002 + 0.0003 * k as f64).collect();
        let traj = build_trajectory(&graph, samples(&lngs, 0.00003), &config);
        let first = decode(&graph, &traj, &config);
        for _ in 0..3 {
            assert_eq!(decode(&graph, &traj, &config), first);
        }
        assert!(first.best.iter().all(|b| b.is_some()));
    }
}
