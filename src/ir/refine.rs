use super::trace::Trace;
use crate::ds::Coloring;
use crate::ds::MarkSet;
use crate::graph::Graph;
use std::collections::VecDeque;

/// mixed into the trace once per processed color class
const CLASS_MARKER: u64 = 0x6d61_726b_6572_3031;

/// equitable-partition refinement (1-dimensional Weisfeiler-Leman).
///
/// splits color classes by neighbor-count multisets until the partition is
/// stable. all scratch space lives here so refinement allocates nothing on
/// the hot path; every controller owns one.
#[derive(Clone, Debug)]
pub struct Refiner {
    count: Vec<usize>,
    touched: Vec<usize>,
    worklist: VecDeque<usize>,
    queued: Vec<bool>,
    affected: Vec<usize>,
    affected_marked: MarkSet,
    in_class: MarkSet,
    buckets: Vec<(usize, usize)>,
    runs: Vec<(usize, usize)>,
}

impl Refiner {
    pub fn new(domain: usize) -> Self {
        Self {
            count: vec![0; domain],
            touched: Vec::with_capacity(domain),
            worklist: VecDeque::with_capacity(domain),
            queued: vec![false; domain],
            affected: Vec::new(),
            affected_marked: MarkSet::new(domain),
            in_class: MarkSet::new(domain),
            buckets: Vec::with_capacity(domain),
            runs: Vec::new(),
        }
    }

    /// refine `c` until equitable with respect to `g`.
    ///
    /// `seed` restricts the initial worklist to one class (used after an
    /// individualization); without it every class is queued. `cell_limit`
    /// stops early once the cell count reaches it; refining further than the
    /// reference did at this depth buys nothing. `split_hook` fires once per
    /// new class fragment with (old_class, new_class, fragment_size); the
    /// same values feed the trace. returns false only when the trace diverged
    /// from its compare reference past its deviation budget.
    pub fn refine_coloring(
        &mut self,
        g: &Graph,
        c: &mut Coloring,
        trace: &mut Trace,
        seed: Option<usize>,
        cell_limit: Option<usize>,
        mut split_hook: Option<&mut dyn FnMut(usize, usize, usize)>,
    ) -> bool {
        let n = c.domain_size();
        match seed {
            Some(class) => self.enqueue(class),
            None => {
                let mut i = 0;
                while i < n {
                    self.enqueue(i);
                    i += c.cell_size(i);
                }
            }
        }

        while let Some(class) = self.worklist.pop_front() {
            self.queued[class] = false;
            let class_sz = c.cell_size(class);
            if !trace.op(CLASS_MARKER)
                || !trace.op(class as u64)
                || !trace.op(class_sz as u64)
            {
                self.abort_cleanup();
                return false;
            }

            self.count_into(g, c, class, class_sz);

            self.affected.clear();
            self.affected_marked.reset();
            for &w in &self.touched {
                let cl = c.vertex_to_col[w];
                if !self.affected_marked.get(cl) {
                    self.affected_marked.set(cl);
                    self.affected.push(cl);
                }
            }
            self.affected.sort_unstable();

            for a in 0..self.affected.len() {
                let old = self.affected[a];
                if !self.split_class(c, old, trace, &mut split_hook) {
                    self.reset_counts();
                    self.abort_cleanup();
                    return false;
                }
            }

            self.reset_counts();
            if cell_limit.is_some_and(|limit| c.cells >= limit) {
                break;
            }
        }
        self.abort_cleanup();
        true
    }

    /// count, for every vertex, its edges into `class`
    fn count_into(&mut self, g: &Graph, c: &Coloring, class: usize, class_sz: usize) {
        if g.dense {
            self.in_class.reset();
            for &v in c.members(class) {
                self.in_class.set(v);
            }
            for v in 0..c.domain_size() {
                let mut k = 0;
                for &w in g.neighbors(v) {
                    if self.in_class.get(w) {
                        k += 1;
                    }
                }
                if k > 0 {
                    self.touched.push(v);
                    self.count[v] = k;
                }
            }
        } else {
            for pos in class..class + class_sz {
                let vc = c.lab[pos];
                for &w in g.neighbors(vc) {
                    if self.count[w] == 0 {
                        self.touched.push(w);
                    }
                    self.count[w] += 1;
                }
            }
        }
    }

    /// split one affected class by the counts gathered in `count`. fragments
    /// are ordered by count ascending; the first keeps the old class index.
    fn split_class(
        &mut self,
        c: &mut Coloring,
        old: usize,
        trace: &mut Trace,
        split_hook: &mut Option<&mut dyn FnMut(usize, usize, usize)>,
    ) -> bool {
        let old_sz = c.cell_size(old);
        if old_sz == 1 {
            return true;
        }
        self.buckets.clear();
        let mut min = usize::MAX;
        let mut max = 0;
        for i in old..old + old_sz {
            let v = c.lab[i];
            let k = self.count[v];
            self.buckets.push((k, v));
            min = min.min(k);
            max = max.max(k);
        }
        if min == max {
            return true;
        }
        self.buckets.sort_unstable();
        for (j, &(_, v)) in self.buckets.iter().enumerate() {
            c.lab[old + j] = v;
            c.vertex_to_lab[v] = old + j;
        }
        self.runs.clear();
        let mut largest = (old, 0);
        let mut j = 0;
        while j < old_sz {
            let k = self.buckets[j].0;
            let mut e = j;
            while e + 1 < old_sz && self.buckets[e + 1].0 == k {
                e += 1;
            }
            let start = old + j;
            let len = e - j + 1;
            for t in start..start + len {
                c.vertex_to_col[c.lab[t]] = start;
            }
            c.ptn[start] = len - 1;
            for t in start + 1..start + len - 1 {
                c.ptn[t] = 1;
            }
            c.ptn[start + len - 1] = 0;
            if len > largest.1 {
                largest = (start, len);
            }
            self.runs.push((start, len));
            j = e + 1;
        }
        c.cells += self.runs.len() - 1;

        for idx in 0..self.runs.len() {
            let (start, len) = self.runs[idx];
            if idx > 0 {
                if let Some(hook) = split_hook.as_mut() {
                    hook(old, start, len);
                }
                if !trace.op(start as u64) || !trace.op(len as u64) {
                    return false;
                }
            }
            if start != largest.0 {
                self.enqueue(start);
            }
        }
        true
    }

    fn enqueue(&mut self, class: usize) {
        if !self.queued[class] {
            self.queued[class] = true;
            self.worklist.push_back(class);
        }
    }

    fn reset_counts(&mut self) {
        for &w in &self.touched {
            self.count[w] = 0;
        }
        self.touched.clear();
    }

    fn abort_cleanup(&mut self) {
        while let Some(class) = self.worklist.pop_front() {
            self.queued[class] = false;
        }
    }

    /// full adjacency check: is `perm` an automorphism of (g, colors)?
    pub fn certify_automorphism(
        &mut self,
        g: &Graph,
        colors: &[usize],
        perm: &[usize],
    ) -> bool {
        let n = g.vertex_count();
        if perm.len() != n {
            return false;
        }
        for v in 0..n {
            if colors[v] != colors[perm[v]] || g.degree(v) != g.degree(perm[v]) {
                return false;
            }
        }
        for v in 0..n {
            if !self.mapped_adjacency_holds(g, perm, v) {
                return false;
            }
        }
        true
    }

    /// support-only check: sound because an edge with at most one moved
    /// endpoint is verified from the moved side, and an edge with no moved
    /// endpoint is fixed
    pub fn certify_automorphism_sparse(
        &mut self,
        g: &Graph,
        colors: &[usize],
        perm: &[usize],
        supp: &[usize],
    ) -> bool {
        for &v in supp {
            if colors[v] != colors[perm[v]] || g.degree(v) != g.degree(perm[v]) {
                return false;
            }
            if !self.mapped_adjacency_holds(g, perm, v) {
                return false;
            }
        }
        true
    }

    fn mapped_adjacency_holds(&mut self, g: &Graph, perm: &[usize], v: usize) -> bool {
        self.in_class.reset();
        for &w in g.neighbors(perm[v]) {
            self.in_class.set(w);
        }
        g.neighbors(v).iter().all(|&w| self.in_class.get(perm[w]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refined_cells(g: &Graph, c: &mut Coloring) -> usize {
        let mut r = Refiner::new(g.vertex_count());
        let mut t = Trace::new();
        assert!(r.refine_coloring(g, c, &mut t, None, None, None));
        c.cells
    }

    #[test]
    fn path_splits_by_degree() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let mut c = Coloring::unit(3);
        assert_eq!(refined_cells(&g, &mut c), 2);
        assert!(c.check());
        assert_eq!(c.vertex_to_col[0], c.vertex_to_col[2]);
        assert_ne!(c.vertex_to_col[0], c.vertex_to_col[1]);
    }

    #[test]
    fn regular_graph_stays_one_cell() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let mut c = Coloring::unit(3);
        assert_eq!(refined_cells(&g, &mut c), 1);
    }

    #[test]
    fn refinement_is_idempotent() {
        let g = Graph::from_edges(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (0, 4), (0, 2)]);
        let mut c = Coloring::unit(5);
        let cells = refined_cells(&g, &mut c);
        let snapshot = c.clone();
        let mut r = Refiner::new(5);
        let mut t = Trace::new();
        assert!(r.refine_coloring(&g, &mut c, &mut t, None, None, None));
        assert_eq!(c.cells, cells);
        assert_eq!(c.vertex_to_col, snapshot.vertex_to_col);
    }

    #[test]
    fn dense_and_sparse_agree() {
        let mut g = Graph::from_edges(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 5), (0, 3)]);
        let mut sparse = Coloring::unit(6);
        g.dense = false;
        let a = refined_cells(&g, &mut sparse);
        let mut dense = Coloring::unit(6);
        g.dense = true;
        let b = refined_cells(&g, &mut dense);
        assert_eq!(a, b);
        assert_eq!(sparse.vertex_to_col, dense.vertex_to_col);
    }

    #[test]
    fn seeded_refinement_after_individualization() {
        // star: center 0, leaves 1..=3
        let g = Graph::from_edges(4, &[(0, 1), (0, 2), (0, 3)]);
        let mut c = Coloring::unit(4);
        refined_cells(&g, &mut c);
        assert_eq!(c.cells, 2);
        let seed = c.individualize(1);
        let mut r = Refiner::new(4);
        let mut t = Trace::new();
        assert!(r.refine_coloring(&g, &mut c, &mut t, Some(seed), None, None));
        assert!(c.check());
        assert_eq!(c.cells, 3);
    }

    #[test]
    fn equal_walks_produce_equal_traces() {
        // 4-cycle: individualizing opposite corners gives isomorphic walks
        let g = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (0, 3)]);
        let walk = |v: usize| {
            let mut c = Coloring::unit(4);
            let mut r = Refiner::new(4);
            let mut t = Trace::new();
            r.refine_coloring(&g, &mut c, &mut t, None, None, None);
            let seed = c.individualize(v);
            r.refine_coloring(&g, &mut c, &mut t, Some(seed), None, None);
            t.acc()
        };
        assert_eq!(walk(0), walk(2));
        assert_eq!(walk(1), walk(3));
        assert_eq!(walk(0), walk(1));
    }

    #[test]
    fn certifies_square_rotation() {
        let g = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (0, 3)]);
        let colors = vec![0; 4];
        let mut r = Refiner::new(4);
        let rotation = vec![1, 2, 3, 0];
        assert!(r.certify_automorphism(&g, &colors, &rotation));
        let supp = vec![0, 1, 2, 3];
        assert!(r.certify_automorphism_sparse(&g, &colors, &rotation, &supp));
        let broken = vec![1, 0, 2, 3];
        assert!(!r.certify_automorphism(&g, &colors, &broken));
    }

    #[test]
    fn cell_limit_stops_early() {
        let g = Graph::from_edges(4, &[(0, 1), (0, 2), (0, 3)]);
        let mut c = Coloring::unit(4);
        let mut r = Refiner::new(4);
        let mut t = Trace::new();
        assert!(r.refine_coloring(&g, &mut c, &mut t, None, Some(1), None));
        assert!(c.cells <= 2);
    }
}
