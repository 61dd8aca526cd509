use super::prob;
use crate::algorithm;
use crate::graph::NetworkPosition;
use std::collections::HashMap;

/**
 * Structures shared by snapping, decoding and cost apportionment.
 * */

/// One GPS fix that survived ingestion, with its snapped candidates.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub id: usize, // position in the trajectory
    pub point: algorithm::Point,
    pub time_stamp: i64,
    pub attributes: HashMap<String, String>,
    pub candidates: Vec<Candidate>,
}

pub type Trajectory = Vec<Observation>;

impl Observation {
    pub fn new(id: usize, point: algorithm::Point, time_stamp: i64) -> Self {
        Observation {
            id,
            point,
            time_stamp,
            attributes: HashMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Numeric value of the attribute `key`, e.g. the cumulative energy used.
    pub fn cost_signal(&self, key: &str) -> Option<f64> {
        self.attributes
            .get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Adds a snapped location, plus its reverse direction twin when the edge
    /// is two way. Returns false when an existing candidate lies within
    /// `min_candidate_gap` meters.
    pub fn add_candidate(
        &mut self,
        position: NetworkPosition,
        point: algorithm::Point,
        distance: f64,
        oneway: bool,
        config: &Config,
    ) -> bool {
        if self
            .candidates
            .iter()
            .any(|c| c.point.distance_to(&point) < config.min_candidate_gap)
        {
            return false;
        }
        let candidate = Candidate {
            id: self.candidates.len(),
            point,
            distance,
            forward: true,
            ep: prob::emission_probability(distance, config.sigma),
            position,
        };
        if !oneway {
            let reverse = Candidate {
                id: candidate.id + 1,
                forward: false,
                ..candidate.clone()
            };
            self.candidates.push(candidate);
            self.candidates.push(reverse);
        } else {
            self.candidates.push(candidate);
        }
        true
    }

    /// Index of the candidate with the highest emission probability, first on ties.
    pub fn most_likely_candidate(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for c in &self.candidates {
            if best.map_or(true, |(_, ep)| c.ep > ep) {
                best = Some((c.id, c.ep));
            }
        }
        best.map(|(id, _)| id)
    }
}

// 定义每次坐标点可能位于某个edge的候选
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: usize, // index in the observation's candidate list
    pub point: algorithm::Point,
    // gps点到edge的距离
    pub distance: f64,
    pub forward: bool, // travels along the edge's digitized direction
    pub ep: f64,       // 输出概率
    pub position: NetworkPosition,
}

impl Candidate {
    pub fn edge_id(&self) -> &str {
        &self.position.edge_id
    }
}

/// One hypothesis on the candidate chosen at each observation of a window
/// around `center`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchState {
    pub center: usize,
    pub zero: usize, // index of the center observation in `candidates`
    pub candidates: Vec<usize>,
}

impl MatchState {
    pub fn first_obs(&self) -> usize {
        self.center - self.zero
    }

    pub fn last_obs(&self) -> usize {
        (self.first_obs() + self.candidates.len()).saturating_sub(1)
    }

    pub fn center_candidate(&self) -> usize {
        self.candidates[self.zero]
    }

    pub fn candidate_at(&self, obs: usize) -> Option<usize> {
        obs.checked_sub(self.first_obs())
            .and_then(|k| self.candidates.get(k))
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegmentCost {
    pub edge_id: String,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct MMResult {
    /// best candidate index per observation
    pub best_candidates: Vec<usize>,
    /// matched edge id per observation
    pub o_path: Vec<String>,
    /// (first, last) observation of every decoded segment
    pub segments: Vec<(usize, usize)>,
    /// observations no segment covered, matched to their closest candidate
    pub undecoded: Vec<usize>,
    pub costs: Vec<RoadSegmentCost>,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    TooShort { usable: usize },
    Matched(MMResult),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search_radius: f64,       // meters, first snapping radius
    pub max_search_radius: f64,   // meters
    pub radius_step: f64,         // meters added when nothing snapped
    pub min_observation_gap: f64, // meters between kept gps fixes
    pub min_candidate_gap: f64,   // meters between candidates of one fix
    pub sigma: f64,               // emission standard deviation
    pub beta: f64,                // transition scale
    pub history_length: usize,    // window half width
    pub min_observations: usize,
    pub same_position_tolerance: f64, // degrees, |dlng| + |dlat|
    pub log_floor: f64,
    pub cost_attribute: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search_radius: 30.0,
            max_search_radius: 200.0,
            radius_step: 20.0,
            min_observation_gap: 20.0,
            min_candidate_gap: 2.0,
            sigma: 100.0,
            beta: 50.0,
            history_length: 2,
            min_observations: 50,
            same_position_tolerance: 1e-4,
            log_floor: -1e100,
            cost_attribute: "Energy Used".to_string(),
        }
    }
}
