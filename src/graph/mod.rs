pub mod network;
pub use network::*;
pub mod graph;
pub use graph::*;
pub mod router;
pub use router::*;
