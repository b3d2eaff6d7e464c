use bytemuck::{Pod, Zeroable};

/// Canvas-space vertex, laid out so a GPU renderer can upload a `Mesh`
/// without conversion.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }

    pub fn x(&self) -> f32 {
        self.position[0]
    }

    pub fn y(&self) -> f32 {
        self.position[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    LineStrip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub topology: Topology,
    pub vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            vertices: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Two triangles covering the quad `a b c d`, given in winding order.
    pub fn push_quad(&mut self, a: Vertex, b: Vertex, c: Vertex, d: Vertex) {
        self.vertices.extend_from_slice(&[a, b, c, a, c, d]);
    }

    pub fn push_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex) {
        self.vertices.extend_from_slice(&[a, b, c]);
    }

    /// Append another mesh of the same topology.
    pub fn extend(&mut self, other: &Mesh) {
        self.vertices.extend_from_slice(&other.vertices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_bytes_are_tightly_packed() {
        let mut mesh = Mesh::new(Topology::TriangleList);
        mesh.push_quad(
            Vertex::new(0.0, 0.0),
            Vertex::new(1.0, 0.0),
            Vertex::new(1.0, 1.0),
            Vertex::new(0.0, 1.0),
        );
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.as_bytes().len(), 6 * 2 * std::mem::size_of::<f32>());
    }
}
