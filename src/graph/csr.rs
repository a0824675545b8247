use crate::ds::Coloring;
use crate::ds::MarkSet;

/// undirected graph in CSR form. every edge {u, w} is stored in both
/// adjacency lists; no loops, no duplicates. order within a list is arbitrary
/// until `sort_edges`.
#[derive(Clone, Debug)]
pub struct Graph {
    offsets: Vec<usize>,
    degrees: Vec<usize>,
    edges: Vec<usize>,
    /// picks the refiner's counting strategy; see `update_density`
    pub dense: bool,
}

impl Graph {
    pub fn new(offsets: Vec<usize>, degrees: Vec<usize>, edges: Vec<usize>) -> Self {
        let mut g = Self {
            offsets,
            degrees,
            edges,
            dense: false,
        };
        g.update_density();
        g
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn from_adjacency(adj: &[Vec<usize>]) -> Self {
        let n = adj.len();
        let mut offsets = Vec::with_capacity(n);
        let mut degrees = Vec::with_capacity(n);
        let mut edges = Vec::new();
        for list in adj {
            offsets.push(edges.len());
            degrees.push(list.len());
            edges.extend_from_slice(list);
        }
        Self::new(offsets, degrees, edges)
    }

    /// graph from a list of undirected edge pairs
    pub fn from_edges(n: usize, pairs: &[(usize, usize)]) -> Self {
        let mut adj = vec![Vec::new(); n];
        for &(u, w) in pairs {
            adj[u].push(w);
            adj[w].push(u);
        }
        Self::from_adjacency(&adj)
    }

    pub fn vertex_count(&self) -> usize {
        self.offsets.len()
    }

    /// directed edge count: each undirected edge counts twice
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn degree(&self, v: usize) -> usize {
        self.degrees[v]
    }

    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.edges[self.offsets[v]..self.offsets[v] + self.degrees[v]]
    }

    pub fn sort_edges(&mut self) {
        for v in 0..self.offsets.len() {
            let start = self.offsets[v];
            let end = start + self.degrees[v];
            self.edges[start..end].sort_unstable();
        }
    }

    /// dense counting pays off once the average degree squared reaches the
    /// vertex count
    pub fn update_density(&mut self) {
        let n = self.vertex_count();
        let e = self.edge_count();
        self.dense = n > 0 && e >= n && (e / n) * (e / n) >= n;
    }

    /// initial ordered partition: by the given colors, or by degree when no
    /// colors are provided
    pub fn initialize_coloring(&self, colors: Option<&[usize]>) -> Coloring {
        match colors {
            Some(c) => Coloring::from_colors(c),
            None => Coloring::from_colors(&self.degrees),
        }
    }

    /// validity of the CSR encoding: in-range endpoints, reciprocity, no
    /// loops, no duplicates
    pub fn sanity_check(&self) -> bool {
        let n = self.vertex_count();
        let mut seen = MarkSet::new(n);
        for v in 0..n {
            seen.reset();
            for &w in self.neighbors(v) {
                if w >= n || w == v || seen.get(w) {
                    return false;
                }
                seen.set(w);
                if !self.neighbors(w).contains(&v) {
                    return false;
                }
            }
        }
        true
    }

    /// Erdos-Renyi style graph for benchmarks and property tests
    pub fn random(n: usize, density: f64, seed: u64) -> Self {
        use rand::rngs::SmallRng;
        use rand::Rng;
        use rand::SeedableRng;
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut pairs = Vec::new();
        for u in 0..n {
            for w in u + 1..n {
                if rng.random_bool(density) {
                    pairs.push((u, w));
                }
            }
        }
        Self::from_edges(n, &pairs)
    }
}
