use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use rmm::mm::model::{self, MatchOutcome};
use rmm::mm::stmatch;
use rmm::mm::traj;
use rmm::utils;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "RMM-HMM")]
#[command(version = "0.1")]
#[command(about = "hidden markov map matching with cost apportionment", long_about = None)]
struct Args {
    /// first candidate search radius in meters
    #[arg(long, default_value_t = 30.0)]
    search_radius: f64,
    /// largest candidate search radius in meters
    #[arg(long, default_value_t = 200.0)]
    max_search_radius: f64,
    /// meters added to the search radius when nothing snapped
    #[arg(long, default_value_t = 20.0)]
    radius_step: f64,
    /// minimum meters between two kept gps points
    #[arg(long, default_value_t = 20.0)]
    min_observation_gap: f64,
    /// minimum meters between two candidates of one gps point
    #[arg(long, default_value_t = 2.0)]
    min_candidate_gap: f64,
    /// gps error standard deviation
    #[arg(long, default_value_t = 100.0)]
    sigma: f64,
    /// transition scale
    #[arg(long, default_value_t = 50.0)]
    beta: f64,
    /// observations on each side of the decoded one
    #[arg(long, default_value_t = 2)]
    history_length: usize,
    /// trajectories with fewer usable points are not matched
    #[arg(long, default_value_t = 50)]
    min_observations: usize,
    /// degrees (|dlng| + |dlat|) under which two candidates share a position
    #[arg(long, default_value_t = 1e-4)]
    same_position_tolerance: f64,
    /// states whose log probability falls below are dropped
    #[arg(long, default_value_t = -1e100, allow_hyphen_values = true)]
    log_floor: f64,
    /// csv column holding the cumulative cost
    #[arg(long, default_value = "Energy Used")]
    cost_attribute: String,
    /// road network path
    #[arg(short, long, value_name = "ROAD_NETWORK_FILE")]
    network_file: String,

    /// gps trajectory csv, or a directory of them
    #[arg(value_name = "GPS_TRAJ_FILE_OR_DIR")]
    input: PathBuf,
}

impl Args {
    fn config(&self) -> model::Config {
        model::Config {
            search_radius: self.search_radius,
            max_search_radius: self.max_search_radius,
            radius_step: self.radius_step,
            min_observation_gap: self.min_observation_gap,
            min_candidate_gap: self.min_candidate_gap,
            sigma: self.sigma,
            beta: self.beta,
            history_length: self.history_length,
            min_observations: self.min_observations,
            same_position_tolerance: self.same_position_tolerance,
            log_floor: self.log_floor,
            cost_attribute: self.cost_attribute.clone(),
        }
    }
}

fn trajectory_files(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(input).with_context(|| format!("list {}", input.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<dir>/<stem>.csv.res`
fn result_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}.csv.res", stem))
}

fn process(map_match: &stmatch::MMatch, input: &Path) -> anyhow::Result<()> {
    info!("matching {}", input.display());
    match map_match.match_file(input)? {
        MatchOutcome::TooShort { usable } => {
            warn!(
                "{}: {} usable gps points, nothing written",
                input.display(),
                usable
            );
        }
        MatchOutcome::Matched(result) => {
            debug!("match edges: {:?}", result.o_path);
            let output = result_path(input);
            let file =
                File::create(&output).with_context(|| format!("create {}", output.display()))?;
            traj::write_costs(BufWriter::new(file), &result.costs)?;
            info!(
                "{}: {} segments, {} road costs written to {}",
                input.display(),
                result.segments.len(),
                result.costs.len(),
                output.display()
            );
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    utils::log::log_init();
    let args = Args::parse();
    debug!("{:?}", args);

    info!("try construct map matching network from geojson file");
    let map_match = stmatch::MMatch::try_from(args.network_file.clone())
        .context("construct map matching network failed")?
        .with_config(args.config());
    debug!("{:?}", map_match.config());

    let files = trajectory_files(&args.input)?;
    let mut failed = 0;
    for file in &files {
        if let Err(e) = process(&map_match, file) {
            warn!("skip {}: {:#}", file.display(), e);
            failed += 1;
        }
    }
    info!("{} trajectories processed, {} failed", files.len(), failed);
    Ok(())
}
