/// ordered partition of the vertex set.
///
/// `lab` is a permutation of the vertices grouped by class; a class of size s
/// starting at position i has `ptn[i] = s - 1`, `ptn[i + s - 1] = 0`, and
/// positive entries in between. `vertex_to_col[v]` is the starting index of
/// v's class, `vertex_to_lab[v]` its position in `lab`.
#[derive(Clone, Debug)]
pub struct Coloring {
    pub lab: Vec<usize>,
    pub ptn: Vec<usize>,
    pub vertex_to_col: Vec<usize>,
    pub vertex_to_lab: Vec<usize>,
    pub cells: usize,
}

impl Coloring {
    /// trivial coloring: one class holding every vertex
    pub fn unit(domain: usize) -> Self {
        Self::from_colors(&vec![0; domain])
    }

    /// coloring from an arbitrary vertex-to-color map. classes are ordered by
    /// color value, vertices within a class by index.
    pub fn from_colors(colors: &[usize]) -> Self {
        let n = colors.len();
        let mut lab: Vec<usize> = (0..n).collect();
        lab.sort_by_key(|&v| (colors[v], v));
        let mut ptn = vec![0; n];
        let mut vertex_to_col = vec![0; n];
        let mut vertex_to_lab = vec![0; n];
        let mut cells = 0;
        let mut start = 0;
        for i in 0..n {
            vertex_to_lab[lab[i]] = i;
            if i + 1 == n || colors[lab[i]] != colors[lab[i + 1]] {
                ptn[start] = i - start;
                for j in start + 1..i {
                    ptn[j] = 1;
                }
                ptn[i] = 0;
                for j in start..=i {
                    vertex_to_col[lab[j]] = start;
                }
                cells += 1;
                start = i + 1;
            }
        }
        Self {
            lab,
            ptn,
            vertex_to_col,
            vertex_to_lab,
            cells,
        }
    }

    pub fn domain_size(&self) -> usize {
        self.lab.len()
    }

    pub fn is_discrete(&self) -> bool {
        self.cells == self.lab.len()
    }

    pub fn cell_size(&self, cell: usize) -> usize {
        self.ptn[cell] + 1
    }

    pub fn members(&self, cell: usize) -> &[usize] {
        &self.lab[cell..cell + self.cell_size(cell)]
    }

    /// move v into its own singleton class at the tail of its current class.
    /// O(1). returns the index of the new singleton.
    pub fn individualize(&mut self, v: usize) -> usize {
        let color = self.vertex_to_col[v];
        let sz = self.ptn[color] + 1;
        debug_assert!(sz > 1, "cannot individualize a singleton");
        let pos = self.vertex_to_lab[v];
        let last = color + sz - 1;
        let u = self.lab[last];
        self.lab[pos] = u;
        self.lab[last] = v;
        self.vertex_to_lab[u] = pos;
        self.vertex_to_lab[v] = last;
        self.vertex_to_col[v] = last;
        self.ptn[color] = sz - 2;
        self.ptn[last - 1] = 0;
        self.ptn[last] = 0;
        self.cells += 1;
        last
    }

    /// reverse of `individualize`; the singleton must still be intact
    pub fn undo_individualize(&mut self, v: usize, old_color: usize) {
        let last = self.vertex_to_col[v];
        debug_assert_eq!(self.vertex_to_lab[v], last);
        debug_assert_eq!(self.ptn[last], 0);
        self.vertex_to_col[v] = old_color;
        self.ptn[old_color] = last - old_color;
        if last > old_color + 1 {
            self.ptn[last - 1] = 1;
        }
        self.cells -= 1;
    }

    /// structural invariant check, for tests and debug assertions
    pub fn check(&self) -> bool {
        let n = self.lab.len();
        for v in 0..n {
            if self.lab[v] >= n || self.lab[self.vertex_to_lab[v]] != v {
                return false;
            }
        }
        let mut cells = 0;
        let mut i = 0;
        while i < n {
            let sz = self.ptn[i] + 1;
            if i + sz > n || self.ptn[i + sz - 1] != 0 {
                return false;
            }
            for j in i..i + sz {
                if self.vertex_to_col[self.lab[j]] != i {
                    return false;
                }
            }
            cells += 1;
            i += sz;
        }
        cells == self.cells
    }
}
