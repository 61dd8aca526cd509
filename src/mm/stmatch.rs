use super::cache::DistanceOracle;
use super::cost;
use super::model::{Config, MMResult, MatchOutcome, Trajectory};
use super::traj::{self, TrajInfo};
use super::viterbi::PartialViterbi;
use crate::graph::RoadGraph;
use anyhow::{self, Context};
use log::{debug, info, warn};
use std::path::Path;
use std::{fs::File, io::BufReader};

pub struct MMatch {
    road_graph: RoadGraph,
    config: Config,
}

// from network file to map matching
impl TryFrom<String> for MMatch {
    type Error = anyhow::Error;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let road_graph = RoadGraph::try_from(value)?;
        info!("construct map matching success... ");
        Ok(MMatch::new(road_graph, Config::default()))
    }
}

impl MMatch {
    pub fn new(road_graph: RoadGraph, config: Config) -> Self {
        MMatch { road_graph, config }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snaps raw samples and drops the unusable ones.
    pub fn build_trajectory(&self, samples: Vec<TrajInfo>) -> Trajectory {
        traj::build_trajectory(&self.road_graph, samples, &self.config)
    }

    /// Decodes a snapped trajectory and apportions its cost signal.
    ///
    /// Trajectories with fewer than `min_observations` observations are
    /// reported as too short rather than matched.
    pub fn match_traj(&self, traj: &Trajectory) -> anyhow::Result<MatchOutcome> {
        let cfg = &self.config;
        if traj.len() < cfg.min_observations {
            info!(
                "only {} usable observations, need {}",
                traj.len(),
                cfg.min_observations
            );
            return Ok(MatchOutcome::TooShort { usable: traj.len() });
        }
        if traj.is_empty() {
            return Err(anyhow::anyhow!("trajectory is empty"));
        }

        let oracle = DistanceOracle::new(&self.road_graph, cfg.same_position_tolerance);
        let decoded =
            PartialViterbi::new(traj, oracle, cfg.history_length, cfg.beta, cfg.log_floor)
                .decode();

        let mut best_candidates = Vec::with_capacity(traj.len());
        let mut undecoded = Vec::new();
        for (obs, best) in traj.iter().zip(decoded.best.iter()) {
            let candidate = match best {
                Some(c) => *c,
                None => {
                    undecoded.push(obs.id);
                    obs.most_likely_candidate().ok_or_else(|| {
                        anyhow::anyhow!("observation {} has no candidate", obs.id)
                    })?
                }
            };
            best_candidates.push(candidate);
        }
        if !undecoded.is_empty() {
            warn!(
                "{} observations outside every decoded segment: {:?}",
                undecoded.len(),
                undecoded
            );
        }

        let o_path = traj
            .iter()
            .zip(best_candidates.iter())
            .map(|(obs, c)| obs.candidates[*c].edge_id().to_string())
            .collect();
        let costs =
            cost::apportion_costs(&self.road_graph, traj, &best_candidates, &cfg.cost_attribute);
        debug!("{} road segment costs", costs.len());

        Ok(MatchOutcome::Matched(MMResult {
            best_candidates,
            o_path,
            segments: decoded.segments,
            undecoded,
            costs,
        }))
    }

    pub fn match_samples(&self, samples: Vec<TrajInfo>) -> anyhow::Result<MatchOutcome> {
        let traj = self.build_trajectory(samples);
        self.match_traj(&traj)
    }

    /// Reads a csv trajectory and matches it.
    pub fn match_file(&self, path: &Path) -> anyhow::Result<MatchOutcome> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let samples = traj::read_csv(BufReader::new(file), &self.config.cost_attribute)
            .with_context(|| format!("read {}", path.display()))?;
        self.match_samples(samples)
    }
}
