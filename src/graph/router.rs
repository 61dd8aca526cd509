use super::network::Edge;
use crate::algorithm::Point;
use thiserror::Error;

/// A location resolved onto the road network. Direction free: the travel
/// direction is only bound when routing.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPosition {
    pub edge: usize,     // edge index in the network
    pub edge_id: String, // edge id as known outside the network
    pub offset: f64,     // meters from the edge's first vertex
    pub point: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// meters
    pub distance: f64,
    pub shape: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("no road edge near ({0}, {1})")]
    NoEdgeNearby(f64, f64),
    #[error("no path from node {from} to node {to}")]
    NoPath { from: String, to: String },
    #[error("edge {0} is one way")]
    WrongWay(String),
    #[error("position references unknown edge index {0}")]
    InvalidPosition(usize),
}

/// Point resolution and directed shortest path queries.
pub trait Router {
    fn resolve(&self, point: Point) -> Result<NetworkPosition, RouteError>;

    /// Shortest path from `from` to `to`. `forward` flags say whether the
    /// vehicle travels along the edge's digitized direction at each end.
    fn route(
        &self,
        from: &NetworkPosition,
        from_forward: bool,
        to: &NetworkPosition,
        to_forward: bool,
    ) -> Result<Route, RouteError>;
}

/// Spatial lookup of road edges around a point.
pub trait EdgeIndex {
    /// Edges whose bounding box comes within `radius` meters of `point`,
    /// in network order.
    fn edges_near(&self, point: Point, radius: f64) -> Vec<&Edge>;
}
