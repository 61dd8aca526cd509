use super::model::{MatchState, Observation};

/// Every candidate combination over the window `center - history ..=
/// center + history`, clipped to `earliest` and to the trajectory end.
///
/// States come out in lexicographic candidate order, so repeated calls
/// enumerate them identically.
pub fn build_states(
    traj: &[Observation],
    center: usize,
    history: usize,
    earliest: usize,
) -> Vec<MatchState> {
    if center >= traj.len() || center < earliest {
        return Vec::new();
    }
    let lo = center.saturating_sub(history).max(earliest);
    let hi = (center + history).min(traj.len() - 1);
    let mut states = vec![MatchState {
        center,
        zero: 0,
        candidates: Vec::with_capacity(hi - lo + 1),
    }];
    for obs in lo..=hi {
        if obs == center {
            for state in states.iter_mut() {
                state.zero = state.candidates.len();
            }
        }
        let count = traj[obs].candidates.len();
        let mut expanded = Vec::with_capacity(states.len() * count);
        for state in &states {
            for c in 0..count {
                let mut next = state.clone();
                next.candidates.push(c);
                expanded.push(next);
            }
        }
        states = expanded;
    }
    states
}

/// Two states are adjacent when they agree on every observation both cover.
pub fn are_adjacent(a: &MatchState, b: &MatchState) -> bool {
    if a.candidates.is_empty() || b.candidates.is_empty() {
        return true;
    }
    let lo = a.first_obs().max(b.first_obs());
    let hi = a.last_obs().min(b.last_obs());
    (lo..=hi).all(|obs| a.candidate_at(obs) == b.candidate_at(obs))
}
