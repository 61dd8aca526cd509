//! Hidden Markov map matching over a road network.
//!
//! GPS fixes are snapped onto nearby road edges, decoded with a windowed,
//! restartable Viterbi, and an external cost signal is apportioned onto the
//! matched road segments.
pub mod algorithm;
pub mod graph;
pub mod mm;
pub mod utils;
