pub mod shape;
pub mod vertex;

pub use shape::{Canvas, Primitive, VisualShape, WireMode};
pub use vertex::{Mesh, Topology, Vertex};
