use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::graph::Graph;
use crate::groups::Perm;
use crate::hooks::AutomorphismHook;
use crate::ir::Controller;

pub struct DfsResult {
    /// deepest base level that could not be certified; 0 means the whole
    /// base was proven and the search is finished
    pub floor: usize,
    /// product of the class sizes of all certified levels
    pub grp_sz: GroupSize,
    /// (vertex, class size) of certified levels; candidates for inprocessor
    /// individualization
    pub maybe_individualize: Vec<(usize, usize)>,
    pub certified: usize,
}

/// walk a controller down to a leaf along the compare reference, trying the
/// members of each target cell until one keeps the trace equal. `cost` is
/// decremented by trace work; running dry fails the descent.
pub fn descend_to_leaf(g: &Graph, ctrl: &mut Controller, cost: &mut usize) -> bool {
    let Some(compare_base) = ctrl.compare_base().cloned() else {
        return false;
    };
    while !ctrl.c.is_discrete() {
        let depth = ctrl.depth();
        let Some(entry) = compare_base.get(depth) else {
            return false;
        };
        let candidates: Vec<usize> = ctrl.c.members(entry.target_color).to_vec();
        let mut advanced = false;
        for v in candidates {
            let before = ctrl.trace.position();
            if ctrl.move_to_child(g, v) {
                advanced = true;
                break;
            }
            *cost = cost.saturating_sub(ctrl.trace.position() - before + 1);
            ctrl.move_to_parent();
            if *cost == 0 {
                return false;
            }
        }
        if !advanced {
            return false;
        }
    }
    !ctrl.trace.diverged()
}

/// extract the permutation aligning two trace-equal colorings: singleton
/// classes map positionally, non-singleton classes must hold the same vertex
/// set (identity there). None when the colorings cannot be aligned cheaply.
pub fn align_colorings(canonical: &Coloring, other: &Coloring) -> Option<Perm> {
    let n = canonical.domain_size();
    if other.cells != canonical.cells {
        return None;
    }
    let mut map: Vec<usize> = (0..n).collect();
    let mut i = 0;
    while i < n {
        let sz = canonical.cell_size(i);
        if other.cell_size(i) != sz {
            return None;
        }
        if sz == 1 {
            map[canonical.lab[i]] = other.lab[i];
        } else {
            let mut a: Vec<usize> = canonical.members(i).to_vec();
            let mut b: Vec<usize> = other.members(i).to_vec();
            a.sort_unstable();
            b.sort_unstable();
            if a != b {
                return None;
            }
        }
        i += sz;
    }
    // positional alignment of singletons must itself be a permutation
    let mut seen = vec![false; n];
    for &x in &map {
        if seen[x] {
            return None;
        }
        seen[x] = true;
    }
    Some(Perm::from_map(map))
}

/// paired depth-first search from the probed leaf.
///
/// walks the base from the deepest level upward. a level is dropped when
/// every sibling of its base vertex reaches a leaf that certifies as an
/// automorphism; the class size then multiplies the group order. the first
/// failing level becomes the DFS floor. `ctrl` must sit at the canonical
/// leaf with the compare reference installed; it is left at the floor.
pub fn do_paired_dfs(
    g: &Graph,
    colors: &[usize],
    hook: Option<&dyn AutomorphismHook>,
    ctrl: &mut Controller,
    canonical_leaf: &[usize],
    cost_fraction: f64,
) -> DfsResult {
    let base = ctrl.base.clone();
    let base_len = base.len();
    let full_trace_cost = ctrl.trace.position().max(1);
    let mut grp_sz = GroupSize::one();
    let mut maybe_individualize = Vec::new();
    let mut certified = 0;
    let mut floor = base_len;

    for level in (1..=base_len).rev() {
        ctrl.move_to_parent();
        let entry = &base[level - 1];
        let members: Vec<usize> = ctrl.c.members(entry.target_color).to_vec();
        debug_assert_eq!(members.len(), entry.color_size);
        let mut cost =
            (cost_fraction * full_trace_cost as f64) as usize * members.len() + 1024;
        let mut level_ok = true;
        for &u in &members {
            if u == entry.vertex {
                continue;
            }
            let mut walker = ctrl.clone();
            if !walker.move_to_child(g, u) || !descend_to_leaf(g, &mut walker, &mut cost) {
                level_ok = false;
                break;
            }
            let pi = Perm::from_labs(canonical_leaf, &walker.c.lab);
            let supp = pi.support();
            if !walker.certify(g, colors, pi.as_slice(), &supp) {
                level_ok = false;
                break;
            }
            certified += 1;
            if let Some(hook) = hook {
                hook.automorphism(pi.as_slice(), &supp);
            }
            if cost == 0 {
                level_ok = false;
                break;
            }
        }
        if level_ok {
            grp_sz.multiply(entry.color_size as u64);
            maybe_individualize.push((entry.vertex, entry.color_size));
            floor = level - 1;
        } else {
            floor = level;
            break;
        }
    }

    DfsResult {
        floor,
        grp_sz,
        maybe_individualize,
        certified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::CollectingHook;

    fn canonical_walk(g: &Graph, colors: &[usize]) -> (Controller, Vec<usize>) {
        let coloring = g.initialize_coloring(Some(colors));
        let mut ctrl = Controller::new(g, coloring);
        ctrl.use_reversible(true);
        ctrl.refine_root(g);
        // first-cell walk to the leaf
        loop {
            let mut cell = None;
            let mut i = 0;
            while i < ctrl.c.domain_size() {
                let sz = ctrl.c.cell_size(i);
                if sz > 1 {
                    cell = Some(i);
                    break;
                }
                i += sz;
            }
            let Some(cell) = cell else { break };
            let v = ctrl.c.lab[cell];
            ctrl.move_to_child(g, v);
        }
        ctrl.compare_to_this();
        let leaf = ctrl.c.lab.clone();
        (ctrl, leaf)
    }

    #[test]
    fn triangle_is_finished_by_dfs() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let colors = vec![0; 3];
        let (mut ctrl, leaf) = canonical_walk(&g, &colors);
        assert_eq!(ctrl.base.len(), 2);
        let hook = CollectingHook::new();
        let res = do_paired_dfs(&g, &colors, Some(&hook), &mut ctrl, &leaf, 0.5);
        assert_eq!(res.floor, 0);
        let sz = res.grp_sz;
        assert_eq!(sz.exponent, 0);
        assert!((sz.mantissa - 6.0).abs() < 0.01);
        // emitted generators are automorphisms spanning the sibling swaps
        assert_eq!(res.certified, 3);
        assert_eq!(hook.perms().len(), 3);
    }

    #[test]
    fn colored_path_swaps_endpoints() {
        // 0-1-2 with endpoints color 0, midpoint color 1
        let g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let colors = vec![0, 1, 0];
        let (mut ctrl, leaf) = canonical_walk(&g, &colors);
        assert_eq!(ctrl.base.len(), 1);
        let hook = CollectingHook::new();
        let res = do_paired_dfs(&g, &colors, Some(&hook), &mut ctrl, &leaf, 0.5);
        assert_eq!(res.floor, 0);
        assert!((res.grp_sz.mantissa - 2.0).abs() < 0.01);
        let perms = hook.perms();
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0], vec![2, 1, 0]);
    }

    #[test]
    fn two_disjoint_triangles_give_wreath_order() {
        let g = Graph::from_edges(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]);
        let colors = vec![0; 6];
        let (mut ctrl, leaf) = canonical_walk(&g, &colors);
        let res = do_paired_dfs(&g, &colors, None, &mut ctrl, &leaf, 0.5);
        assert_eq!(res.floor, 0);
        // 6 * 2 * 3 * 2 = 72
        let sz = res.grp_sz;
        assert_eq!(sz.exponent, 1);
        assert!((sz.mantissa - 7.2).abs() < 0.01);
    }

    #[test]
    fn align_colorings_identity_on_matching_cells() {
        let a = Coloring::from_colors(&[0, 1, 1, 2]);
        let b = Coloring::from_colors(&[0, 1, 1, 2]);
        let p = align_colorings(&a, &b).unwrap();
        assert!(p.is_identity());
        let c = Coloring::from_colors(&[2, 1, 1, 0]);
        // singleton classes map 0 -> 3 and 3 -> 0
        let q = align_colorings(&a, &c).unwrap();
        assert_eq!(q.apply(0), 3);
        assert_eq!(q.apply(3), 0);
    }
}
