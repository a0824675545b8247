use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::ds::MarkSet;
use crate::ds::Orbit;
use crate::graph::Graph;
use crate::groups::Schreier;
use crate::ir::Controller;
use crate::ir::SavedState;
use crate::ir::SharedTree;
use rayon::prelude::*;

pub struct InprocessResult {
    pub touched: bool,
    pub grp_sz: GroupSize,
    pub fixed_points: Vec<usize>,
}

/// re-color the root using invariants gathered since the last restart:
/// shallow split-limited probes per vertex, or the finished BFS levels.
/// orbit-unique vertices are individualized into the root, each multiplying
/// the group order by its class size. `ctrl` must sit at the root in
/// recording mode; on success `root_save` is replaced by the improved root.
#[allow(clippy::too_many_arguments)]
pub fn inprocess(
    g: &Graph,
    ctrl: &mut Controller,
    root_save: &mut SavedState,
    tree: Option<&SharedTree>,
    schreier: &Schreier,
    orbit: &mut Orbit,
    maybe_individualize: &[(usize, usize)],
    use_bfs_invariant: bool,
    use_shallow: bool,
    use_shallow_quadratic: bool,
    splits_hint: usize,
) -> InprocessResult {
    let cells_prev = ctrl.c.cells;
    let mut grp_sz = GroupSize::one();
    let mut fixed_points = Vec::new();

    for generator in schreier.generators() {
        orbit.add_permutation(generator.as_slice());
    }

    let bfs_ready = tree.is_some_and(|t| t.finished_up_to() >= 1);

    if use_shallow && !(bfs_ready && use_bfs_invariant) {
        let mut depth = splits_hint.saturating_sub(3).clamp(4, 16);
        let mut rounds = 0;
        loop {
            let cells_last = ctrl.c.cells;
            let inv = shallow_invariant(g, ctrl, orbit, depth);
            split_with_invariant(g, ctrl, &inv);
            rounds += 1;
            depth *= 2;
            if ctrl.c.cells == cells_last || ctrl.c.is_discrete() || rounds >= 3 {
                break;
            }
        }
    }

    if use_shallow_quadratic && !ctrl.c.is_discrete() {
        let inv = shallow_invariant_quadratic(g, ctrl);
        split_with_invariant(g, ctrl, &inv);
    }

    if bfs_ready && use_bfs_invariant {
        let inv = tree.expect("bfs_ready").node_invariant_snapshot();
        split_with_invariant(g, ctrl, &inv);
    }

    // individualize points whose orbit saturates their class
    let mut candidates = schreier.determine_potential_individualization(&ctrl.c);
    candidates.extend_from_slice(maybe_individualize);
    let mut individualized = 0;
    for (v, orbit_sz) in candidates {
        let col = ctrl.c.vertex_to_col[v];
        let col_sz = ctrl.c.cell_size(col);
        if col_sz > 1 && col_sz == orbit_sz {
            grp_sz.multiply(col_sz as u64);
            ctrl.move_to_child_no_trace(g, v);
            fixed_points.push(v);
            individualized += 1;
        }
    }
    if individualized > 0 {
        orbit.reset();
    }

    let touched = ctrl.c.cells != cells_prev;
    if touched {
        ctrl.trace.restart();
        ctrl.refine_root(g);
        *root_save = ctrl.save_state();
        log::debug!(
            "inprocess: {} -> {} cells ({} individualized)",
            cells_prev,
            ctrl.c.cells,
            individualized
        );
    }
    InprocessResult {
        touched,
        grp_sz,
        fixed_points,
    }
}

/// per-vertex hash of one split-limited individualization, deduplicated over
/// known orbits. chunked across the rayon pool; every chunk probes from its
/// own controller clone.
fn shallow_invariant(
    g: &Graph,
    ctrl: &mut Controller,
    orbit: &mut Orbit,
    depth: usize,
) -> Vec<u64> {
    let n = g.vertex_count();
    let reps: Vec<usize> = (0..n).map(|v| orbit.find(v)).collect();
    let orbit_sizes: Vec<usize> = (0..n).map(|v| orbit.orbit_size(v)).collect();
    ctrl.use_split_limit(Some(depth));

    let chunk = (n / rayon::current_num_threads().max(1)).max(64);
    let ranges: Vec<(usize, usize)> = (0..n)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(n)))
        .collect();
    let probe = |range: &(usize, usize), ctrl: &mut Controller| -> Vec<u64> {
        let mut out = Vec::with_capacity(range.1 - range.0);
        for v in range.0..range.1 {
            if reps[v] != v {
                out.push(0);
                continue;
            }
            let col = ctrl.c.vertex_to_col[v];
            let col_sz = ctrl.c.cell_size(col);
            if col_sz >= 2 && col_sz != orbit_sizes[v] {
                ctrl.move_to_child(g, v);
                let h = ctrl.trace.acc();
                ctrl.move_to_parent();
                out.push(h);
            } else {
                out.push(0);
            }
        }
        out
    };

    let parts: Vec<Vec<u64>> = if ranges.len() > 1 {
        ranges
            .par_iter()
            .map_init(|| ctrl.clone(), |local, range| probe(range, local))
            .collect()
    } else {
        let mut local = ctrl.clone();
        ranges.iter().map(|range| probe(range, &mut local)).collect()
    };
    ctrl.use_split_limit(None);

    let mut inv: Vec<u64> = parts.into_iter().flatten().collect();
    for v in 0..n {
        inv[v] = inv[reps[v]];
    }
    inv
}

/// two consecutive shallow levels: after fixing v, every small class born
/// from the split is probed as well
fn shallow_invariant_quadratic(g: &Graph, ctrl: &mut Controller) -> Vec<u64> {
    let n = g.vertex_count();
    let mut original = MarkSet::new(n);
    let mut i = 0;
    while i < n {
        original.set(i);
        i += ctrl.c.cell_size(i);
    }
    ctrl.use_split_limit(Some(8));
    let mut inv = vec![0u64; n];
    let mut local = ctrl.clone();
    for v in 0..n {
        let col = local.c.vertex_to_col[v];
        if local.c.cell_size(col) < 2 {
            continue;
        }
        local.move_to_child(g, v);
        inv[v] = inv[v].wrapping_add(local.trace.acc());
        let mut c = 0;
        while c < n {
            let sz = local.c.cell_size(c);
            if (2..=16).contains(&sz) && !original.get(c) {
                for u in local.c.members(c).to_vec() {
                    local.move_to_child(g, u);
                    inv[v] = inv[v].wrapping_add(local.trace.acc());
                    local.move_to_parent();
                }
            }
            c += sz;
        }
        local.move_to_parent();
    }
    ctrl.use_split_limit(None);
    inv
}

/// sort vertices by (current color, invariant), assign each distinct bucket
/// a fresh color, and re-refine
fn split_with_invariant(g: &Graph, ctrl: &mut Controller, inv: &[u64]) {
    let n = g.vertex_count();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&v| (ctrl.c.vertex_to_col[v], inv[v]));
    let mut colmap = vec![0; n];
    let mut bucket = 0;
    for idx in 0..n {
        if idx > 0 {
            let prev = order[idx - 1];
            let cur = order[idx];
            if ctrl.c.vertex_to_col[prev] != ctrl.c.vertex_to_col[cur] || inv[prev] != inv[cur]
            {
                bucket += 1;
            }
        }
        colmap[order[idx]] = bucket;
    }
    ctrl.c = Coloring::from_colors(&colmap);
    ctrl.trace.restart();
    ctrl.refine_root(g);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// C6 with two disjoint triangles: everything is 2-regular, so plain
    /// refinement sees one cell, but a one-step probe distinguishes hexagon
    /// from triangle vertices
    #[test]
    fn shallow_invariant_splits_structurally_distinct_vertices() {
        let g = Graph::from_edges(
            12,
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
                (9, 10),
                (10, 11),
                (9, 11),
            ],
        );
        let colors = vec![0; 12];
        let coloring = g.initialize_coloring(Some(&colors));
        let mut ctrl = Controller::new(&g, coloring);
        ctrl.use_reversible(true);
        ctrl.refine_root(&g);
        assert_eq!(ctrl.c.cells, 1);
        let mut root_save = ctrl.save_state();
        let schreier = Schreier::new(12);
        let mut orbit = Orbit::new(12);
        let res = inprocess(
            &g,
            &mut ctrl,
            &mut root_save,
            None,
            &schreier,
            &mut orbit,
            &[],
            false,
            true,
            false,
            8,
        );
        assert!(res.touched);
        let c = &root_save.coloring;
        assert_ne!(c.vertex_to_col[0], c.vertex_to_col[6]);
        assert_eq!(c.vertex_to_col[6], c.vertex_to_col[9]);
    }

    #[test]
    fn saturated_orbits_are_individualized() {
        let g = Graph::from_edges(2, &[(0, 1)]);
        let colors = vec![0; 2];
        let coloring = g.initialize_coloring(Some(&colors));
        let mut ctrl = Controller::new(&g, coloring);
        ctrl.use_reversible(true);
        ctrl.refine_root(&g);
        let mut root_save = ctrl.save_state();
        let mut schreier = Schreier::new(2);
        schreier.set_base(&[0], &[2]);
        schreier.sift(crate::groups::Perm::transposition(2, 0, 1));
        let mut orbit = Orbit::new(2);
        let res = inprocess(
            &g,
            &mut ctrl,
            &mut root_save,
            None,
            &schreier,
            &mut orbit,
            &[],
            false,
            false,
            false,
            8,
        );
        assert!(res.touched);
        assert_eq!(res.fixed_points, vec![0]);
        assert!((res.grp_sz.mantissa - 2.0).abs() < 0.01);
        assert!(root_save.coloring.is_discrete());
    }
}
