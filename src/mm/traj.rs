use super::model::{Config, Observation, RoadSegmentCost, Trajectory};
use super::snap;
use crate::algorithm;
use crate::graph::{EdgeIndex, Router};
use anyhow::{self, Context};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::io;

pub const TIME_COLUMN: &str = "Time";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// A raw GPS sample before snapping.
#[derive(Debug, Clone)]
pub struct TrajInfo {
    pub point: algorithm::Point,
    pub time_stamp: i64,
    pub attributes: HashMap<String, String>,
}

impl TrajInfo {
    pub fn new(point: algorithm::Point, time_stamp: i64) -> Self {
        TrajInfo {
            point,
            time_stamp,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// Reads samples from a csv with a header row. Rows with an empty latitude
/// or an empty `cost_column` are ignored; every column is kept as attribute.
pub fn read_csv<R: io::Read>(reader: R, cost_column: &str) -> anyhow::Result<Vec<TrajInfo>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let lat_col = column(LATITUDE_COLUMN)
        .ok_or_else(|| anyhow::anyhow!("column {} missing", LATITUDE_COLUMN))?;
    let lng_col = column(LONGITUDE_COLUMN)
        .ok_or_else(|| anyhow::anyhow!("column {} missing", LONGITUDE_COLUMN))?;
    let cost_col =
        column(cost_column).ok_or_else(|| anyhow::anyhow!("column {} missing", cost_column))?;
    let time_col = column(TIME_COLUMN);

    let mut samples = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("read row {}", row + 1))?;
        let field = |col: usize| record.get(col).unwrap_or_default();
        if field(lat_col).is_empty() || field(cost_col).is_empty() {
            continue;
        }
        let lat: f64 = field(lat_col)
            .parse()
            .with_context(|| format!("row {}: bad latitude", row + 1))?;
        let lng: f64 = field(lng_col)
            .parse()
            .with_context(|| format!("row {}: bad longitude", row + 1))?;
        let time_stamp = match time_col {
            Some(col) => field(col)
                .parse::<f64>()
                .with_context(|| format!("row {}: bad time", row + 1))? as i64,
            None => row as i64,
        };
        let mut sample = TrajInfo::new(algorithm::Point(lng, lat), time_stamp);
        for (key, value) in headers.iter().zip(record.iter()) {
            sample.attributes.insert(key.to_string(), value.to_string());
        }
        samples.push(sample);
    }
    debug!("read {} samples", samples.len());
    Ok(samples)
}

/// Writes the apportioned costs as `WayId,Cost` rows.
pub fn write_costs<W: io::Write>(writer: W, costs: &[RoadSegmentCost]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["WayId", "Cost"])?;
    for seg in costs {
        wtr.write_record([seg.edge_id.clone(), seg.cost.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Snaps every sample and keeps those at least `min_observation_gap` meters
/// from the previous kept one and with at least one candidate.
///
/// Snapping runs in parallel; the filter runs afterwards in sample order.
pub fn build_trajectory<G>(graph: &G, samples: Vec<TrajInfo>, config: &Config) -> Trajectory
where
    G: Router + EdgeIndex + Sync + ?Sized,
{
    let total = samples.len();
    let snapped: Vec<Observation> = samples
        .into_par_iter()
        .map(|sample| {
            let mut obs = Observation::new(0, sample.point, sample.time_stamp);
            obs.attributes = sample.attributes;
            snap::snap_to_network(
                graph,
                &mut obs,
                config.search_radius,
                config.max_search_radius,
                config,
            );
            obs
        })
        .collect();

    let mut traj = Trajectory::new();
    for mut obs in snapped {
        let far_enough = traj
            .last()
            .map_or(true, |last: &Observation| {
                obs.point.distance_to(&last.point) > config.min_observation_gap
            });
        if far_enough && !obs.candidates.is_empty() {
            obs.id = traj.len();
            traj.push(obs);
        }
    }
    info!("{} of {} samples usable", traj.len(), total);
    traj
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::fixtures;

    const CSV: &str = "Time,Latitude,Longitude,Energy Used,Speed
0,0.00001,0.0001,0.0,12
1,,0.0004,0.5,12
2,0.00001,0.0004,,12
3,0.00001,0.0004,1.5,13
";

    #[test]
    fn test_read_csv_skips_incomplete_rows() {
        let samples = read_csv(CSV.as_bytes(), "Energy Used").unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time_stamp, 3);
        assert_eq!(samples[1].point, algorithm::Point(0.0004, 0.00001));
        assert_eq!(samples[1].attributes["Speed"], "13");
        assert_eq!(samples[1].attributes["Energy Used"], "1.5");
    }

    #[test]
    fn test_read_csv_reports_missing_column() {
        let err = read_csv("Time,Latitude,Longitude\n0,1,2\n".as_bytes(), "Energy Used");
        assert!(err.is_err());
        let bad = "Latitude,Longitude,Energy Used\nabc,1,2\n";
        assert!(read_csv(bad.as_bytes(), "Energy Used").is_err());
    }

    #[test]
    fn test_write_costs() {
        let mut out = Vec::new();
        let costs = vec![
            RoadSegmentCost {
                edge_id: "7".to_string(),
                cost: 0.0,
            },
            RoadSegmentCost {
                edge_id: "8".to_string(),
                cost: 2.5,
            },
        ];
        write_costs(&mut out, &costs).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "WayId,Cost\n7,0\n8,2.5\n");
    }

    #[test]
    fn test_build_trajectory_filters_close_and_unsnapped() {
        let graph = fixtures::road_graph(&[fixtures::feature(
            1,
            1,
            2,
            true,
            &[(0.0, 0.0), (0.01, 0.0)],
        )]);
        let config = Config::default();
        let samples = vec![
            TrajInfo::new(algorithm::Point(0.0001, 0.00001), 0),
            // 11 m from the previous one
            TrajInfo::new(algorithm::Point(0.0002, 0.00001), 1),
            TrajInfo::new(algorithm::Point(0.0005, 0.00001), 2),
            // 1 km away from any road
            TrajInfo::new(algorithm::Point(0.0008, 0.01), 3),
            TrajInfo::new(algorithm::Point(0.0009, 0.00001), 4),
        ];
        let traj = build_trajectory(&graph, samples, &config);
        let times: Vec<i64> = traj.iter().map(|o| o.time_stamp).collect();
        assert_eq!(times, vec![0, 2, 4]);
        assert_eq!(traj.iter().map(|o| o.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(traj.iter().all(|o| o.candidates.len() == 1));
    }
}
