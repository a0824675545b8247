use super::refine_colors;
use super::Preprocessor;
use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::ds::Orbit;
use crate::graph::Graph;
use crate::hooks::AutomorphismHook;
use crate::ir::Controller;
use crate::search::dfs::align_colorings;

/// weak connected components under color refinement: two vertices share a
/// quotient component when their classes are linked by edges (possibly
/// through other classes). returns (component count, component id per
/// vertex), ids compacted to 0..count.
pub fn quotient_components(g: &Graph, colmap: &[usize]) -> (usize, Vec<usize>) {
    let n = g.vertex_count();
    if n == 0 {
        return (0, Vec::new());
    }
    let mut union = Orbit::new(n);
    let mut class_head: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    for v in 0..n {
        match class_head.get(&colmap[v]) {
            Some(&head) => union.join(v, head),
            None => {
                class_head.insert(colmap[v], v);
            }
        }
        for &w in g.neighbors(v) {
            union.join(v, w);
        }
    }
    let mut ids: Vec<usize> = vec![usize::MAX; n];
    let mut count = 0;
    let mut component = vec![0; n];
    for v in 0..n {
        let root = union.find(v);
        if ids[root] == usize::MAX {
            ids[root] = count;
            count += 1;
        }
        component[v] = ids[root];
    }
    (count, component)
}

/// sparse IR probing on quotient components: individualize up to
/// `depth_limit` vertices; if the component becomes discrete, certify every
/// sibling level (as in the paired DFS). a fully certified component
/// contributes its cell-size product to the group order and is deleted.
/// certified generators are emitted (lifted) even when the component cannot
/// be finished.
pub fn probe_components(
    prep: &mut Preprocessor,
    g: &mut Graph,
    colmap: &mut Vec<usize>,
    hook: Option<&dyn AutomorphismHook>,
    depth_limit: usize,
) -> bool {
    let n = g.vertex_count();
    if n == 0 {
        return false;
    }
    let (count, component) = quotient_components(g, colmap);
    if count == 0 {
        return false;
    }
    let mut delete = vec![false; n];
    let mut changed = false;

    for comp in 0..count {
        let members: Vec<usize> = (0..n).filter(|&v| component[v] == comp).collect();
        let coloring = Coloring::from_colors(colmap);
        // rigid components carry no symmetry; retire them outright
        if members
            .iter()
            .all(|&v| coloring.cell_size(coloring.vertex_to_col[v]) == 1)
        {
            for &v in &members {
                delete[v] = true;
            }
            changed = true;
            continue;
        }
        if probe_one(prep, g, colmap, hook, &members, depth_limit) {
            for &v in &members {
                delete[v] = true;
            }
            changed = true;
        }
    }

    if changed {
        prep.shrink(g, colmap, &delete.iter().map(|&d| !d).collect::<Vec<_>>());
        refine_colors(g, colmap);
    }
    changed
}

/// probe a single component; true when it was fully determined (factor
/// multiplied, safe to delete)
fn probe_one(
    prep: &mut Preprocessor,
    g: &Graph,
    colmap: &[usize],
    hook: Option<&dyn AutomorphismHook>,
    members: &[usize],
    depth_limit: usize,
) -> bool {
    let coloring = Coloring::from_colors(colmap);
    let mut ctrl = Controller::new(g, coloring);
    ctrl.use_reversible(true);

    // canonical walk: smallest component cell first, then first fit
    let mut depth = 0;
    while depth < depth_limit && !component_discrete(&ctrl.c, members) {
        let Some(cell) = smallest_component_cell(&ctrl.c, members) else {
            break;
        };
        let v = ctrl.c.lab[cell];
        ctrl.move_to_child(g, v);
        depth += 1;
    }
    if !component_discrete(&ctrl.c, members) {
        return false;
    }

    ctrl.compare_to_this();
    let canonical = ctrl.c.clone();
    let base = ctrl.base.clone();
    let mut factor = GroupSize::one();

    for level in (1..=depth).rev() {
        ctrl.move_to_parent();
        let entry = &base[level - 1];
        let siblings: Vec<usize> = ctrl.c.members(entry.target_color).to_vec();
        for &u in &siblings {
            if u == entry.vertex {
                continue;
            }
            let mut walker = ctrl.clone();
            let mut ok = walker.move_to_child(g, u);
            let mut d = level;
            while ok && d < depth {
                let next = &base[d];
                let candidates: Vec<usize> = walker.c.members(next.target_color).to_vec();
                let mut advanced = false;
                for v in candidates {
                    if walker.move_to_child(g, v) {
                        advanced = true;
                        break;
                    }
                    walker.move_to_parent();
                }
                ok = advanced;
                d += 1;
            }
            if !ok {
                return false;
            }
            let Some(pi) = align_colorings(&canonical, &walker.c) else {
                return false;
            };
            let supp = pi.support();
            if !walker.certify(g, colmap, pi.as_slice(), &supp) {
                return false;
            }
            prep.emit_current(hook, pi.as_slice());
        }
        factor.multiply(entry.color_size as u64);
    }

    prep.grp_sz.multiply_size(factor);
    true
}

fn component_discrete(c: &Coloring, members: &[usize]) -> bool {
    members
        .iter()
        .all(|&v| c.cell_size(c.vertex_to_col[v]) == 1)
}

fn smallest_component_cell(c: &Coloring, members: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for &v in members {
        let cell = c.vertex_to_col[v];
        let sz = c.cell_size(cell);
        if sz > 1 && best.is_none_or(|(bsz, bcell)| (sz, cell) < (bsz, bcell)) {
            best = Some((sz, cell));
        }
    }
    best.map(|(_, cell)| cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prep::default_schedule;
    use crate::prep::Preprocessor;

    #[test]
    fn components_follow_classes_and_edges() {
        // K2 + K2 uniformly colored: one class spanning both components
        let g = Graph::from_edges(4, &[(0, 1), (2, 3)]);
        let mut colmap = vec![0; 4];
        refine_colors(&g, &mut colmap);
        let (count, component) = quotient_components(&g, &colmap);
        assert_eq!(count, 1);
        assert!(component.iter().all(|&c| c == 0));

        // distinct colors split them apart
        let mut colmap = vec![0, 0, 1, 1];
        refine_colors(&g, &mut colmap);
        let (count, component) = quotient_components(&g, &colmap);
        assert_eq!(count, 2);
        assert_ne!(component[0], component[2]);
        assert_eq!(component[0], component[1]);
    }

    #[test]
    fn probing_solves_a_triangle() {
        let mut g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let mut colmap = vec![0; 3];
        refine_colors(&g, &mut colmap);
        let mut prep = Preprocessor::new(default_schedule());
        prep.reduce(&mut g, &mut colmap, None);
        assert_eq!(g.vertex_count(), 0);
        assert!((prep.grp_sz.mantissa - 6.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
    }

    #[test]
    fn probing_leaves_hard_components_alone() {
        // two uniformly colored triangles form one quotient component that a
        // two-step probe cannot finish
        let mut g =
            Graph::from_edges(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]);
        let mut colmap = vec![0; 6];
        let mut prep = Preprocessor::new(vec![crate::prep::Stage::Probe2Qc]);
        prep.reduce(&mut g, &mut colmap, None);
        assert_eq!(g.vertex_count(), 6);
        assert!((prep.grp_sz.mantissa - 1.0).abs() < 0.01);
    }
}
