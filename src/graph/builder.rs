use super::Graph;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid edge ({0}, {1}): u < v must hold")]
    EdgeOrder(usize, usize),
    #[error("vertex {0} is not defined")]
    VertexOutOfRange(usize),
    #[error("more vertices added than declared ({0})")]
    TooManyVertices(usize),
    #[error("too many edges incident to vertex {0}")]
    DegreeOverflow(usize),
    #[error("duplicate edge ({0}, {1})")]
    DuplicateEdge(usize, usize),
    #[error("declared {declared} vertices but defined {defined}")]
    VertexCountMismatch { declared: usize, defined: usize },
    #[error("declared {declared} edge endpoints but defined {defined}")]
    EdgeCountMismatch { declared: usize, defined: usize },
    #[error("vertex {vertex} declared degree {declared} but has {defined} edges")]
    DegreeMismatch {
        vertex: usize,
        declared: usize,
        defined: usize,
    },
}

/// checked construction of a static graph. the vertex and edge counts are
/// fixed up front; `add_vertex` declares color and degree, `add_edge` fills
/// both adjacency lists. `finalize` verifies that exactly the declared graph
/// was built.
pub struct Builder {
    offsets: Vec<usize>,
    degrees: Vec<usize>,
    edges: Vec<usize>,
    colors: Vec<usize>,
    edge_cursor: Vec<usize>,
    declared_vertices: usize,
    declared_endpoints: usize,
    defined_endpoints: usize,
    endpoint_cursor: usize,
}

impl Builder {
    /// `ne` counts undirected edges; storage is reserved for both directions
    pub fn new(nv: usize, ne: usize) -> Self {
        Self {
            offsets: Vec::with_capacity(nv),
            degrees: Vec::with_capacity(nv),
            edges: vec![usize::MAX; 2 * ne],
            colors: Vec::with_capacity(nv),
            edge_cursor: Vec::with_capacity(nv),
            declared_vertices: nv,
            declared_endpoints: 2 * ne,
            defined_endpoints: 0,
            endpoint_cursor: 0,
        }
    }

    pub fn add_vertex(&mut self, color: usize, degree: usize) -> Result<usize, BuildError> {
        let v = self.offsets.len();
        if v == self.declared_vertices {
            return Err(BuildError::TooManyVertices(self.declared_vertices));
        }
        self.offsets.push(self.endpoint_cursor);
        self.degrees.push(degree);
        self.colors.push(color);
        self.edge_cursor.push(0);
        self.endpoint_cursor += degree;
        Ok(v)
    }

    pub fn add_edge(&mut self, u: usize, v: usize) -> Result<(), BuildError> {
        if u >= v {
            return Err(BuildError::EdgeOrder(u, v));
        }
        if v >= self.offsets.len() {
            return Err(BuildError::VertexOutOfRange(v));
        }
        let u_list = &self.edges[self.offsets[u]..self.offsets[u] + self.edge_cursor[u]];
        if u_list.contains(&v) {
            return Err(BuildError::DuplicateEdge(u, v));
        }
        for &(a, b) in &[(u, v), (v, u)] {
            if self.edge_cursor[a] == self.degrees[a] {
                return Err(BuildError::DegreeOverflow(a));
            }
            self.edges[self.offsets[a] + self.edge_cursor[a]] = b;
            self.edge_cursor[a] += 1;
        }
        self.defined_endpoints += 2;
        Ok(())
    }

    pub fn finalize(self) -> Result<(Graph, Vec<usize>), BuildError> {
        if self.offsets.len() != self.declared_vertices {
            return Err(BuildError::VertexCountMismatch {
                declared: self.declared_vertices,
                defined: self.offsets.len(),
            });
        }
        if self.defined_endpoints != self.declared_endpoints {
            return Err(BuildError::EdgeCountMismatch {
                declared: self.declared_endpoints,
                defined: self.defined_endpoints,
            });
        }
        for v in 0..self.offsets.len() {
            if self.edge_cursor[v] != self.degrees[v] {
                return Err(BuildError::DegreeMismatch {
                    vertex: v,
                    declared: self.degrees[v],
                    defined: self.edge_cursor[v],
                });
            }
        }
        let g = Graph::new(self.offsets, self.degrees, self.edges);
        debug_assert!(g.sanity_check());
        Ok((g, self.colors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Builder {
        let mut b = Builder::new(3, 3);
        for _ in 0..3 {
            b.add_vertex(0, 2).unwrap();
        }
        b
    }

    #[test]
    fn builds_triangle() {
        let mut b = triangle();
        b.add_edge(0, 1).unwrap();
        b.add_edge(1, 2).unwrap();
        b.add_edge(0, 2).unwrap();
        let (g, colors) = b.finalize().unwrap();
        assert!(g.sanity_check());
        assert_eq!(g.edge_count(), 6);
        assert_eq!(colors, vec![0, 0, 0]);
    }

    #[test]
    fn rejects_reversed_edge() {
        let mut b = triangle();
        assert_eq!(b.add_edge(1, 0), Err(BuildError::EdgeOrder(1, 0)));
        assert_eq!(b.add_edge(1, 1), Err(BuildError::EdgeOrder(1, 1)));
    }

    #[test]
    fn rejects_undefined_vertex() {
        let mut b = triangle();
        assert_eq!(b.add_edge(0, 7), Err(BuildError::VertexOutOfRange(7)));
    }

    #[test]
    fn rejects_duplicate_edge() {
        let mut b = triangle();
        b.add_edge(0, 1).unwrap();
        assert_eq!(b.add_edge(0, 1), Err(BuildError::DuplicateEdge(0, 1)));
    }

    #[test]
    fn rejects_degree_overflow() {
        let mut b = Builder::new(3, 3);
        b.add_vertex(0, 1).unwrap();
        b.add_vertex(0, 2).unwrap();
        b.add_vertex(0, 2).unwrap();
        b.add_edge(0, 1).unwrap();
        assert_eq!(b.add_edge(0, 2), Err(BuildError::DegreeOverflow(0)));
    }

    #[test]
    fn finalize_checks_counts() {
        let mut b = triangle();
        b.add_edge(0, 1).unwrap();
        assert!(matches!(
            b.finalize(),
            Err(BuildError::EdgeCountMismatch { .. })
        ));
    }
}
