use super::Refiner;
use super::Trace;
use crate::ds::Coloring;
use crate::graph::Graph;
use crate::DEVIATION_BUDGET_CAP;
use std::sync::Arc;

/// mixed into the trace once per individualization
const IND_MARKER: u64 = 0x696e_6469_7669_6475;

/// one level of the canonical root-to-leaf walk
#[derive(Clone, Debug)]
pub struct BaseEntry {
    pub vertex: usize,
    pub target_color: usize,
    pub color_size: usize,
    /// cell count after refining at this depth; the early-out bound for
    /// compared walks
    pub cells_after: usize,
    /// trace position after refining at this depth
    pub trace_end: usize,
}

/// O(1) snapshot of an IR point. colorings and base prefixes are shared by
/// reference count; materialization happens on load.
#[derive(Clone, Debug)]
pub struct SavedState {
    pub coloring: Arc<Coloring>,
    pub trace_data: Arc<Vec<u64>>,
    pub trace_pos: usize,
    pub trace_acc: u64,
    pub base: Arc<Vec<BaseEntry>>,
}

#[derive(Clone, Debug)]
struct Frame {
    vertex: usize,
    old_color: usize,
    splits: Vec<(usize, usize)>,
    trace_pos: usize,
    trace_acc: u64,
    cells: usize,
}

/// drives one point moving through the IR tree: individualize, refine, and,
/// in reversible mode, walk back up via the change trail.
#[derive(Clone, Debug)]
pub struct Controller {
    pub c: Coloring,
    pub trace: Trace,
    pub base: Vec<BaseEntry>,
    refiner: Refiner,
    trail: Vec<Frame>,
    reversible: bool,
    split_limit: Option<usize>,
    compare_base: Option<Arc<Vec<BaseEntry>>>,
    use_cell_limit: bool,
    deviation_budget: usize,
}

impl Controller {
    pub fn new(g: &Graph, coloring: Coloring) -> Self {
        let n = g.vertex_count();
        let mut trace = Trace::new();
        let budget = ((3.0 * (n as f64).sqrt()) as usize).min(DEVIATION_BUDGET_CAP);
        trace.set_deviation_budget(budget);
        Self {
            c: coloring,
            trace,
            base: Vec::new(),
            refiner: Refiner::new(n),
            trail: Vec::new(),
            reversible: false,
            split_limit: None,
            compare_base: None,
            use_cell_limit: false,
            deviation_budget: budget,
        }
    }

    /// back to a fresh recording walk: drops the compare reference, the base
    /// and the trail. the coloring is untouched; load a root state next.
    pub fn reset_walk(&mut self) {
        let mut trace = Trace::new();
        trace.set_deviation_budget(self.deviation_budget);
        self.trace = trace;
        self.compare_base = None;
        self.use_cell_limit = false;
        self.trail.clear();
        self.base.clear();
    }

    pub fn depth(&self) -> usize {
        self.base.len()
    }

    pub fn use_reversible(&mut self, reversible: bool) {
        self.reversible = reversible;
        if !reversible {
            self.trail.clear();
        }
    }

    /// bound the number of color splits per individualization; shallow
    /// invariants look only this deep
    pub fn use_split_limit(&mut self, limit: Option<usize>) {
        self.split_limit = limit;
    }

    /// refine the current coloring from scratch (root setup)
    pub fn refine_root(&mut self, g: &Graph) -> bool {
        self.refiner
            .refine_coloring(g, &mut self.c, &mut self.trace, None, None, None)
    }

    /// individualize `v`, refine, and extend the base. returns false when
    /// the trace diverged from its compare reference.
    pub fn move_to_child(&mut self, g: &Graph, v: usize) -> bool {
        let old_color = self.c.vertex_to_col[v];
        let color_size = self.c.cell_size(old_color);
        let mut frame = Frame {
            vertex: v,
            old_color,
            splits: Vec::new(),
            trace_pos: self.trace.position(),
            trace_acc: self.trace.acc(),
            cells: self.c.cells,
        };
        let depth = self.base.len();
        let new_cell = self.c.individualize(v);
        let ok_ind = self.trace.op(IND_MARKER) && self.trace.op(old_color as u64);

        let mut cell_limit = None;
        if self.use_cell_limit {
            cell_limit = self
                .compare_base
                .as_ref()
                .and_then(|cb| cb.get(depth))
                .map(|e| e.cells_after);
        }
        if let Some(limit) = self.split_limit {
            let capped = self.c.cells + limit;
            cell_limit = Some(cell_limit.map_or(capped, |l| l.min(capped)));
        }

        let mut splits: Vec<(usize, usize)> = Vec::new();
        let ok_ref = self.refiner.refine_coloring(
            g,
            &mut self.c,
            &mut self.trace,
            Some(new_cell),
            cell_limit,
            Some(&mut |old, new, _sz| splits.push((old, new))),
        );
        frame.splits = splits;
        if self.reversible {
            self.trail.push(frame);
        }
        let ok = ok_ind && ok_ref && !self.trace.diverged();
        // an early-outed refinement skipped the reference's trailing class
        // markers; realign before the next comparison
        if ok && self.use_cell_limit {
            if let Some(end) = self
                .compare_base
                .as_ref()
                .and_then(|cb| cb.get(depth))
                .map(|e| e.trace_end)
            {
                if self.trace.position() < end {
                    self.trace.fast_forward(end);
                }
            }
        }
        self.base.push(BaseEntry {
            vertex: v,
            target_color: old_color,
            color_size,
            cells_after: self.c.cells,
            trace_end: self.trace.position(),
        });
        ok
    }

    /// individualize and refine without touching trace or base; used by the
    /// inprocessor to fix orbit-unique vertices into the root
    pub fn move_to_child_no_trace(&mut self, g: &Graph, v: usize) {
        let new_cell = self.c.individualize(v);
        let mut scratch = Trace::new();
        self.refiner
            .refine_coloring(g, &mut self.c, &mut scratch, Some(new_cell), None, None);
    }

    /// undo the last individualization and its refinement splits
    pub fn move_to_parent(&mut self) {
        debug_assert!(self.reversible, "move_to_parent requires reversible mode");
        let frame = self.trail.pop().expect("trail is empty");
        for &(old, new) in frame.splits.iter().rev() {
            let sz = self.c.cell_size(new);
            for t in new..new + sz {
                self.c.vertex_to_col[self.c.lab[t]] = old;
            }
            self.c.ptn[old] += sz;
            if new > old + 1 {
                self.c.ptn[new - 1] = 1;
            }
            self.c.cells -= 1;
        }
        self.c.undo_individualize(frame.vertex, frame.old_color);
        debug_assert_eq!(self.c.cells, frame.cells);
        debug_assert!(self.c.check());
        self.trace.rewind(frame.trace_pos, frame.trace_acc);
        self.base.pop();
    }

    /// O(1) snapshot of the current point
    pub fn save_state(&self) -> SavedState {
        SavedState {
            coloring: Arc::new(self.c.clone()),
            trace_data: self.trace.recorded(),
            trace_pos: self.trace.position(),
            trace_acc: self.trace.acc(),
            base: Arc::new(self.base.clone()),
        }
    }

    pub fn load_state(&mut self, save: &SavedState) {
        self.c = (*save.coloring).clone();
        if self.compare_base.is_some() {
            self.trace.resume(save.trace_pos, save.trace_acc);
        } else {
            self.trace.restore(&save.trace_data, save.trace_acc);
        }
        self.base = (*save.base).clone();
        self.trail.clear();
    }

    /// make the current walk the reference: subsequent walks on this (and any
    /// controller given the returned artifacts) compare against it
    pub fn compare_to_this(&mut self) -> (Arc<Vec<u64>>, Arc<Vec<BaseEntry>>) {
        let data = self.trace.recorded();
        let base = Arc::new(self.base.clone());
        self.install_compare(data.clone(), base.clone());
        (data, base)
    }

    pub fn install_compare(&mut self, data: Arc<Vec<u64>>, base: Arc<Vec<BaseEntry>>) {
        self.trace.set_compare(data);
        self.compare_base = Some(base);
        self.use_cell_limit = true;
    }

    pub fn compare_base(&self) -> Option<&Arc<Vec<BaseEntry>>> {
        self.compare_base.as_ref()
    }

    pub fn certify(&mut self, g: &Graph, colors: &[usize], perm: &[usize], supp: &[usize]) -> bool {
        // a large support or an early-outed refinement makes the touched set
        // untrustworthy; fall back to the full check
        if supp.len() * 4 > g.vertex_count() * 3 {
            self.refiner.certify_automorphism(g, colors, perm)
        } else {
            self.refiner.certify_automorphism_sparse(g, colors, perm, supp)
        }
    }

    pub fn certify_full(&mut self, g: &Graph, colors: &[usize], perm: &[usize]) -> bool {
        self.refiner.certify_automorphism(g, colors, perm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Graph, Controller) {
        let g = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (0, 3)]);
        let c = g.initialize_coloring(Some(&[0, 0, 0, 0]));
        let mut ctrl = Controller::new(&g, c);
        ctrl.refine_root(&g);
        (g, ctrl)
    }

    #[test]
    fn child_then_parent_restores_state() {
        let (g, mut ctrl) = square();
        ctrl.use_reversible(true);
        let before = ctrl.c.clone();
        let trace_pos = ctrl.trace.position();
        assert!(ctrl.move_to_child(&g, 0));
        assert!(ctrl.c.check());
        assert!(ctrl.c.cells > before.cells);
        assert_eq!(ctrl.depth(), 1);
        ctrl.move_to_parent();
        assert_eq!(ctrl.depth(), 0);
        assert_eq!(ctrl.c.cells, before.cells);
        assert_eq!(ctrl.c.vertex_to_col, before.vertex_to_col);
        assert_eq!(ctrl.trace.position(), trace_pos);
    }

    #[test]
    fn walk_to_leaf_on_square() {
        let (g, mut ctrl) = square();
        // fixing one corner splits neighbors from the opposite corner;
        // fixing a neighbor finishes the square
        assert!(ctrl.move_to_child(&g, 0));
        assert!(ctrl.move_to_child(&g, 1));
        assert!(ctrl.c.is_discrete());
        assert_eq!(ctrl.base.len(), 2);
        assert_eq!(ctrl.base[0].color_size, 4);
        assert_eq!(ctrl.base[1].color_size, 2);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (g, mut ctrl) = square();
        let root = ctrl.save_state();
        ctrl.move_to_child(&g, 0);
        let mid = ctrl.save_state();
        ctrl.move_to_child(&g, 1);
        ctrl.load_state(&mid);
        assert_eq!(ctrl.depth(), 1);
        assert_eq!(ctrl.c.cells, mid.coloring.cells);
        ctrl.load_state(&root);
        assert_eq!(ctrl.depth(), 0);
        assert!(ctrl.c.check());
    }

    #[test]
    fn compared_walks_agree_on_symmetric_choices() {
        let (g, mut ctrl) = square();
        let root = ctrl.save_state();
        ctrl.move_to_child(&g, 0);
        ctrl.move_to_child(&g, 1);
        ctrl.compare_to_this();
        ctrl.load_state(&root);
        assert!(ctrl.move_to_child(&g, 2));
        assert!(ctrl.move_to_child(&g, 3));
        assert!(!ctrl.trace.diverged());
        assert!(ctrl.c.is_discrete());
    }

    #[test]
    fn deviating_walk_is_detected() {
        // disjoint C6 + C3: one 2-regular class, but fixing a hexagon vertex
        // refines differently than fixing a triangle vertex
        let g = Graph::from_edges(
            9,
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 4),
                (4, 5),
                (0, 5),
                (6, 7),
                (7, 8),
                (6, 8),
            ],
        );
        let c = g.initialize_coloring(Some(&[0; 9]));
        let mut ctrl = Controller::new(&g, c);
        ctrl.refine_root(&g);
        assert_eq!(ctrl.c.cells, 1);
        let root = ctrl.save_state();
        ctrl.move_to_child(&g, 0);
        ctrl.compare_to_this();
        ctrl.load_state(&root);
        assert!(!ctrl.move_to_child(&g, 6));
        assert!(ctrl.trace.diverged());
        // a symmetric choice stays on the reference
        ctrl.load_state(&root);
        assert!(ctrl.move_to_child(&g, 3));
        assert!(!ctrl.trace.diverged());
    }
}
