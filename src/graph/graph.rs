use super::network::{Edge, Network};
use super::router::{EdgeIndex, NetworkPosition, Route, RouteError, Router};
use crate::algorithm::{self, Point};
use anyhow::Result;
use log::{debug, info, warn};
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Directed;
use rtree_rs::{RTree, Rect};
use std::{fs::File, io::BufReader};

/// Search box half size in degrees used by `resolve` before it falls back
/// to the whole network.
pub const DEFAULT_RESOLVE_RADIUS: f64 = 0.01;

/// One traversable direction of a network edge.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub edge: usize,
    pub forward: bool,
    pub length: f64,
}

pub struct RoadGraph {
    pub network: Network,
    graph: Graph<(), Link, Directed, usize>,
    road_rtree: RTree<2, f64, usize>,
    resolve_radius: f64,
}

// from geojson network file
impl TryFrom<String> for RoadGraph {
    type Error = anyhow::Error;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        debug!("loading netwok from : {}", value);
        let file = File::open(&value)?;
        let reader = BufReader::new(file);
        let geojson = geojson::GeoJson::from_reader(reader)?;
        let network = Network::try_from(geojson)?;
        info!("load road network success file: {} ", value);
        Ok(RoadGraph::new(network))
    }
}

impl RoadGraph {
    pub fn new(network: Network) -> Self {
        info!("start construct graph...");
        let node_size = network.nodes.len();
        let edge_size = network.edges.len();
        debug!("node size: {}, edge size: {}", node_size, edge_size);
        let mut gh = RoadGraph {
            network,
            graph: Graph::with_capacity(node_size, edge_size * 2),
            road_rtree: RTree::new(),
            resolve_radius: DEFAULT_RESOLVE_RADIUS,
        };
        // node index in the graph equals node index in the network
        for _ in 0..node_size {
            gh.graph.add_node(());
        }

        for (index, edge) in gh.network.edges.iter().enumerate() {
            let (from, to) = match (
                gh.network.find_node_by_id(edge.get_from_node()),
                gh.network.find_node_by_id(edge.get_to_node()),
            ) {
                (Some(from), Some(to)) => (NodeIndex::new(from), NodeIndex::new(to)),
                _ => {
                    warn!("skip edge {}: node not in network", edge.get_edge_id());
                    continue;
                }
            };
            let length = edge.get_length();
            gh.graph.add_edge(
                from,
                to,
                Link {
                    edge: index,
                    forward: true,
                    length,
                },
            );
            if !edge.is_oneway() {
                gh.graph.add_edge(
                    to,
                    from,
                    Link {
                        edge: index,
                        forward: false,
                        length,
                    },
                );
            }
            let (min, max) = edge.get_geom_rect();
            gh.road_rtree
                .insert(Rect::new([min.0, min.1], [max.0, max.1]), index);
        }
        info!("finish construct road network graph...");
        gh
    }

    // 查询bbox内的edge 返回edge索引
    pub fn query_bbox(&self, bbox: &Rect<2, f64>) -> Vec<usize> {
        let mut result = Vec::new();
        for item in self.road_rtree.search(*bbox) {
            result.push(*item.data);
        }
        result.sort_unstable();
        result
    }

    fn edge(&self, index: usize) -> Result<&Edge, RouteError> {
        self.network
            .find_edge_by_index(index)
            .ok_or(RouteError::InvalidPosition(index))
    }

    fn node(&self, id: &str) -> Result<NodeIndex<usize>, RouteError> {
        self.network
            .find_node_by_id(id)
            .map(NodeIndex::new)
            .ok_or_else(|| RouteError::NoPath {
                from: id.to_string(),
                to: id.to_string(),
            })
    }

    fn nearest_edge(&self, point: Point, edges: &[usize]) -> Option<NetworkPosition> {
        let mut best: Option<(f64, NetworkPosition)> = None;
        for index in edges {
            let edge = match self.network.find_edge_by_index(*index) {
                Some(edge) => edge,
                None => continue,
            };
            let (distance, offset, closest) =
                algorithm::linear_reference_distance(point, &edge.get_geometry().0);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((
                    distance,
                    NetworkPosition {
                        edge: *index,
                        edge_id: edge.get_edge_id().to_string(),
                        offset,
                        point: closest,
                    },
                ));
            }
        }
        best.map(|(_, position)| position)
    }

    /// Geometry of `edge` between two offsets in travel order.
    fn directed_slice(edge: &Edge, from: f64, to: f64, forward: bool) -> Vec<Point> {
        let line = edge.get_geometry();
        if forward {
            line.slice(from.min(to), from.max(to))
        } else {
            let mut points = line.slice(to.min(from), to.max(from));
            points.reverse();
            points
        }
    }

    pub fn short_path(
        &self,
        from: NodeIndex<usize>,
        to: NodeIndex<usize>,
    ) -> Option<(f64, Vec<NodeIndex<usize>>)> {
        use petgraph::algo::astar;
        astar(
            &self.graph,
            from,
            |n| n == to,
            |e| e.weight().length,
            |_| 0.0,
        )
    }

    /// Shortest link joining two adjacent nodes.
    fn link_between(&self, a: NodeIndex<usize>, b: NodeIndex<usize>) -> Option<Link> {
        self.graph
            .edges(a)
            .filter(|e| e.target() == b)
            .map(|e| *e.weight())
            .min_by(|x, y| x.length.total_cmp(&y.length))
    }
}

impl Router for RoadGraph {
    fn resolve(&self, point: Point) -> Result<NetworkPosition, RouteError> {
        let r = self.resolve_radius;
        let bbox = Rect::new([point.0 - r, point.1 - r], [point.0 + r, point.1 + r]);
        let nearby = self.query_bbox(&bbox);
        if let Some(position) = self.nearest_edge(point, &nearby) {
            return Ok(position);
        }
        let all: Vec<usize> = (0..self.network.edges.len()).collect();
        self.nearest_edge(point, &all)
            .ok_or(RouteError::NoEdgeNearby(point.0, point.1))
    }

    fn route(
        &self,
        from: &NetworkPosition,
        from_forward: bool,
        to: &NetworkPosition,
        to_forward: bool,
    ) -> Result<Route, RouteError> {
        let from_edge = self.edge(from.edge)?;
        let to_edge = self.edge(to.edge)?;
        if from_edge.is_oneway() && !from_forward {
            return Err(RouteError::WrongWay(from_edge.get_edge_id().to_string()));
        }
        if to_edge.is_oneway() && !to_forward {
            return Err(RouteError::WrongWay(to_edge.get_edge_id().to_string()));
        }

        // moving ahead on the same edge never leaves it
        if from.edge == to.edge && from_forward == to_forward {
            let ahead = if from_forward {
                to.offset >= from.offset
            } else {
                to.offset <= from.offset
            };
            if ahead {
                return Ok(Route {
                    distance: (to.offset - from.offset).abs(),
                    shape: Self::directed_slice(from_edge, from.offset, to.offset, from_forward),
                });
            }
        }

        let (exit_node, exit_length, mut shape) = if from_forward {
            (
                from_edge.get_to_node(),
                from_edge.get_length() - from.offset,
                Self::directed_slice(from_edge, from.offset, from_edge.get_length(), true),
            )
        } else {
            (
                from_edge.get_from_node(),
                from.offset,
                Self::directed_slice(from_edge, from.offset, 0.0, false),
            )
        };
        let (entry_node, entry_length, tail) = if to_forward {
            (
                to_edge.get_from_node(),
                to.offset,
                Self::directed_slice(to_edge, 0.0, to.offset, true),
            )
        } else {
            (
                to_edge.get_to_node(),
                to_edge.get_length() - to.offset,
                Self::directed_slice(to_edge, to_edge.get_length(), to.offset, false),
            )
        };

        let exit = self.node(exit_node)?;
        let entry = self.node(entry_node)?;
        let (cost, path) = self.short_path(exit, entry).ok_or_else(|| RouteError::NoPath {
            from: exit_node.to_string(),
            to: entry_node.to_string(),
        })?;

        for pair in path.windows(2) {
            let link = self.link_between(pair[0], pair[1]).ok_or_else(|| RouteError::NoPath {
                from: exit_node.to_string(),
                to: entry_node.to_string(),
            })?;
            let edge = self.edge(link.edge)?;
            if link.forward {
                shape.extend(edge.get_geometry().0.iter().cloned());
            } else {
                shape.extend(edge.get_geometry().reversed().0);
            }
        }
        shape.extend(tail);

        Ok(Route {
            distance: (exit_length + cost + entry_length).max(0.0),
            shape: algorithm::dedup_points(shape),
        })
    }
}

impl EdgeIndex for RoadGraph {
    fn edges_near(&self, point: Point, radius: f64) -> Vec<&Edge> {
        let (dlng, dlat) = algorithm::meters_to_degrees(radius, point.1);
        let bbox = Rect::new([point.0 - dlng, point.1 - dlat], [point.0 + dlng, point.1 + dlat]);
        self.query_bbox(&bbox)
            .into_iter()
            .filter_map(|index| self.network.find_edge_by_index(index))
            .collect()
    }
}
