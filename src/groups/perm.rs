/// a permutation of 0..n as an image map
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Perm {
    map: Vec<usize>,
}

impl Perm {
    pub fn identity(degree: usize) -> Self {
        Self {
            map: (0..degree).collect(),
        }
    }

    pub fn from_map(map: Vec<usize>) -> Self {
        debug_assert!({
            let mut seen = vec![false; map.len()];
            map.iter().all(|&x| {
                let fresh = x < seen.len() && !seen[x];
                if fresh {
                    seen[x] = true;
                }
                fresh
            })
        });
        Self { map }
    }

    pub fn transposition(degree: usize, a: usize, b: usize) -> Self {
        let mut map: Vec<usize> = (0..degree).collect();
        map.swap(a, b);
        Self { map }
    }

    /// the permutation mapping the canonical leaf order onto another leaf
    /// order: pi(canonical[i]) = other[i]
    pub fn from_labs(canonical: &[usize], other: &[usize]) -> Self {
        debug_assert_eq!(canonical.len(), other.len());
        let mut map = vec![0; canonical.len()];
        for (i, &v) in canonical.iter().enumerate() {
            map[v] = other[i];
        }
        Self { map }
    }

    pub fn degree(&self) -> usize {
        self.map.len()
    }

    pub fn apply(&self, x: usize) -> usize {
        self.map[x]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.map
    }

    /// self after other: (self * other)(x) = self(other(x))
    pub fn compose(&self, other: &Perm) -> Perm {
        Perm {
            map: other.map.iter().map(|&x| self.map[x]).collect(),
        }
    }

    pub fn inverse(&self) -> Perm {
        let mut map = vec![0; self.map.len()];
        for (x, &y) in self.map.iter().enumerate() {
            map[y] = x;
        }
        Perm { map }
    }

    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(x, &y)| x == y)
    }

    pub fn support(&self) -> Vec<usize> {
        self.map
            .iter()
            .enumerate()
            .filter(|&(x, &y)| x != y)
            .map(|(x, _)| x)
            .collect()
    }
}
