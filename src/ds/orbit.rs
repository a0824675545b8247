use petgraph::unionfind::UnionFind;

/// orbit partition of the vertex set: union-find with orbit sizes and minimum
/// representatives on top. reset per search iteration.
#[derive(Clone)]
pub struct Orbit {
    uf: UnionFind<usize>,
    size: Vec<usize>,
    min: Vec<usize>,
    domain: usize,
}

impl Orbit {
    pub fn new(domain: usize) -> Self {
        Self {
            uf: UnionFind::new(domain),
            size: vec![1; domain],
            min: (0..domain).collect(),
            domain,
        }
    }

    pub fn reset(&mut self) {
        self.uf = UnionFind::new(self.domain);
        self.size.fill(1);
        for (v, m) in self.min.iter_mut().enumerate() {
            *m = v;
        }
    }

    pub fn join(&mut self, a: usize, b: usize) {
        let ra = self.uf.find_mut(a);
        let rb = self.uf.find_mut(b);
        if ra == rb {
            return;
        }
        self.uf.union(a, b);
        let r = self.uf.find_mut(a);
        self.size[r] = self.size[ra] + self.size[rb];
        self.min[r] = self.min[ra].min(self.min[rb]);
    }

    /// canonical representative (smallest vertex) of the orbit of `v`
    pub fn find(&mut self, v: usize) -> usize {
        let r = self.uf.find_mut(v);
        self.min[r]
    }

    pub fn orbit_size(&mut self, v: usize) -> usize {
        let r = self.uf.find_mut(v);
        self.size[r]
    }

    pub fn are_in_same_orbit(&mut self, a: usize, b: usize) -> bool {
        self.uf.find_mut(a) == self.uf.find_mut(b)
    }

    pub fn represents_orbit(&mut self, v: usize) -> bool {
        self.find(v) == v
    }

    /// fold a permutation into the partition
    pub fn add_permutation(&mut self, perm: &[usize]) {
        for (v, &w) in perm.iter().enumerate() {
            if v != w {
                self.join(v, w);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_track_size_and_representative() {
        let mut o = Orbit::new(6);
        o.join(4, 2);
        o.join(2, 5);
        assert_eq!(o.orbit_size(4), 3);
        assert_eq!(o.find(5), 2);
        assert!(o.are_in_same_orbit(4, 5));
        assert!(!o.are_in_same_orbit(0, 4));
        assert!(o.represents_orbit(2));
        assert!(!o.represents_orbit(4));
    }

    #[test]
    fn reset_restores_singletons() {
        let mut o = Orbit::new(4);
        o.join(0, 3);
        o.reset();
        assert_eq!(o.orbit_size(0), 1);
        assert!(o.represents_orbit(3));
    }

    #[test]
    fn permutation_orbits() {
        let mut o = Orbit::new(5);
        o.add_permutation(&[1, 2, 0, 3, 4]);
        assert_eq!(o.orbit_size(0), 3);
        assert_eq!(o.orbit_size(3), 1);
    }
}
