use super::dfs::descend_to_leaf;
use super::Switches;
use crate::ds::Orbit;
use crate::graph::Graph;
use crate::groups::Perm;
use crate::groups::Schreier;
use crate::hooks::AutomorphismHook;
use crate::ir::Controller;
use crate::ir::SavedState;
use crate::ir::SharedTree;
use crate::ir::TreeNode;

pub struct BfsOutcome {
    pub level: usize,
    pub installed: usize,
    pub pruned_by_abort: usize,
    /// whether every node of the (leaf) level was certified as a coset of
    /// the base stabilizer; only then may a finished tree conclude the group
    pub all_certified: bool,
}

struct Task {
    parent_idx: usize,
    save: SavedState,
    parent_cum: f64,
    parent_identity: bool,
    root_child: usize,
    vertex: usize,
}

enum Finished {
    Node(TreeNode),
    Dropped {
        pruned_by_map: bool,
        uncertified: bool,
    },
}

/// estimated size of the next level: trace-equal siblings share cell sizes,
/// so the expansion factor is the canonical target cell size at that depth
pub fn next_level_estimate(tree: &SharedTree) -> usize {
    let level = tree.finished_up_to();
    if level >= tree.depth() {
        return 0;
    }
    let alive = tree.levels[level]
        .nodes
        .read()
        .expect("level lock")
        .iter()
        .filter(|n| n.weight > 0.0)
        .count();
    alive * tree.compare_base[level].color_size
}

/// materialize one more level of the shared tree.
///
/// workers dequeue (parent, vertex) pairs, individualize and refine against
/// the canonical trace, and either finish a child node or record its
/// deviation in the level's abort map (identity children first-come). on the
/// final level each surviving node is driven to a full leaf and certified;
/// certified leaves are sifted into the Schreier structure.
pub fn do_a_level(
    g: &Graph,
    colors: &[usize],
    tree: &SharedTree,
    schreier: &Schreier,
    hook: Option<&dyn AutomorphismHook>,
    switches: &Switches,
    workers: usize,
    use_deviation_pruning: bool,
) -> BfsOutcome {
    let level = tree.finished_up_to() + 1;
    debug_assert!(level <= tree.depth());
    let entry = &tree.compare_base[level - 1];
    let leaf_level = level == tree.depth();

    // build the todo list; the identity node sits at index 0 of its level,
    // so its children lead the queue and get to write the abort map first
    let mut todo = Vec::new();
    let mut identity_children = 0;
    {
        let parents = tree.levels[level - 1].nodes.read().expect("level lock");
        for (parent_idx, parent) in parents.iter().enumerate() {
            if parent.weight <= 0.0 {
                continue;
            }
            for &v in parent.save.coloring.members(entry.target_color) {
                if parent.is_identity {
                    identity_children += 1;
                }
                todo.push(Task {
                    parent_idx,
                    save: parent.save.clone(),
                    parent_cum: parent.cum_weight,
                    parent_identity: parent.is_identity,
                    root_child: if level == 1 { v } else { parent.root_child },
                    vertex: v,
                });
            }
        }
    }
    tree.arm_abort_map(level, identity_children);

    let canonical_vertex = entry.vertex;
    let any_descended = std::sync::atomic::AtomicBool::new(false);
    let process = |ctrl: &mut Controller, task: &Task| -> Finished {
        ctrl.load_state(&task.save);
        if ctrl.move_to_child(g, task.vertex) {
            let save = ctrl.save_state();
            let mut certified = true;
            if leaf_level {
                if !ctrl.c.is_discrete() {
                    any_descended.store(true, std::sync::atomic::Ordering::Relaxed);
                }
                certified = certify_leaf(g, colors, tree, schreier, hook, ctrl);
            }
            if !certified {
                if task.parent_identity {
                    tree.note_identity_survivor(level);
                }
                return Finished::Dropped {
                    pruned_by_map: false,
                    uncertified: true,
                };
            }
            tree.feed_node_invariant(task.root_child, level, save.trace_acc);
            if task.parent_identity {
                tree.note_identity_survivor(level);
            }
            Finished::Node(TreeNode {
                parent: task.parent_idx,
                save,
                vertex: task.vertex,
                root_child: task.root_child,
                weight: 1.0,
                parent_weight: task.parent_cum,
                cum_weight: task.parent_cum,
                is_identity: task.parent_identity && task.vertex == canonical_vertex,
            })
        } else {
            let deviation = ctrl
                .trace
                .deviation()
                .cloned()
                .expect("failed move has a deviation");
            let mut pruned_by_map = false;
            if task.parent_identity {
                tree.write_abort(level, deviation.pos, deviation.acc);
            } else if use_deviation_pruning
                && tree.read_abort(level, deviation.pos, deviation.acc)
            {
                pruned_by_map = true;
            }
            tree.feed_pruned_invariant(task.root_child, level, deviation.acc);
            Finished::Dropped {
                pruned_by_map,
                uncertified: false,
            }
        }
    };

    let fresh_controller = || {
        let mut ctrl = Controller::new(g, (*tree.root.coloring).clone());
        ctrl.use_reversible(true);
        ctrl.install_compare(tree.compare_trace.clone(), tree.compare_base.clone());
        ctrl
    };

    let mut finished: Vec<Finished> = Vec::with_capacity(todo.len());
    if workers <= 1 {
        let mut ctrl = fresh_controller();
        for task in &todo {
            if switches.is_done() {
                break;
            }
            finished.push(process(&mut ctrl, task));
        }
    } else {
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<Task>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<Finished>();
        for task in todo {
            task_tx.send(task).expect("queue send");
        }
        drop(task_tx);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let done_tx = done_tx.clone();
                let process = &process;
                let fresh_controller = &fresh_controller;
                scope.spawn(move || {
                    let mut ctrl = fresh_controller();
                    while let Ok(task) = task_rx.recv() {
                        if switches.is_done() {
                            break;
                        }
                        let _ = done_tx.send(process(&mut ctrl, &task));
                    }
                });
            }
            drop(done_tx);
            while let Ok(result) = done_rx.recv() {
                finished.push(result);
            }
        });
    }

    // install the level: identity node first, then the rest in arrival order
    let mut nodes = Vec::new();
    let mut pruned_by_abort = 0;
    let mut any_uncertified = false;
    for result in finished {
        match result {
            Finished::Node(node) => {
                if node.is_identity {
                    nodes.insert(0, node);
                } else {
                    nodes.push(node);
                }
            }
            Finished::Dropped {
                pruned_by_map,
                uncertified,
            } => {
                pruned_by_abort += pruned_by_map as usize;
                any_uncertified |= uncertified;
            }
        }
    }
    // with discrete leaf nodes the certified count is exact even when some
    // trace-equal leaves failed certification; descended nodes may under-
    // count, so a finished tree concludes the group only without them
    let exact = !any_uncertified || !any_descended.load(std::sync::atomic::Ordering::Relaxed);
    let all_certified = leaf_level && exact && nodes.iter().any(|n| n.is_identity);
    let installed = nodes.len();
    *tree.levels[level].nodes.write().expect("level lock") = nodes;
    tree.advance_finished(level);
    log::debug!(
        "bfs level {} installed {} pruned {}",
        level,
        installed,
        pruned_by_abort
    );
    BfsOutcome {
        level,
        installed,
        pruned_by_abort,
        all_certified,
    }
}

/// drive a just-built final-level node down to a discrete leaf along the
/// reference and certify the resulting permutation
fn certify_leaf(
    g: &Graph,
    colors: &[usize],
    tree: &SharedTree,
    schreier: &Schreier,
    hook: Option<&dyn AutomorphismHook>,
    ctrl: &mut Controller,
) -> bool {
    let mut cost = usize::MAX;
    if !ctrl.c.is_discrete() && !descend_to_leaf(g, ctrl, &mut cost) {
        return false;
    }
    let pi = Perm::from_labs(&tree.canonical_leaf, &ctrl.c.lab);
    if pi.is_identity() {
        return true;
    }
    let supp = pi.support();
    if !ctrl.certify(g, colors, pi.as_slice(), &supp) {
        return false;
    }
    if let crate::groups::Sift::NewGenerator { .. } = schreier.sift(pi.clone()) {
        if let Some(hook) = hook {
            hook.automorphism(pi.as_slice(), &supp);
        }
    }
    true
}

/// recompute surviving-sibling weights from the known group: among the
/// identity node's children at each level, only stabilizer-orbit
/// representatives keep weight (the orbit size); weight zero propagates to
/// descendants through the cumulative product.
pub fn reduce_tree(domain: usize, tree: &SharedTree, schreier: &Schreier) {
    for level in 1..=tree.finished_up_to() {
        let (parents_cum, parents_identity): (Vec<f64>, Vec<bool>) = {
            let parents = tree.levels[level - 1].nodes.read().expect("level lock");
            (
                parents.iter().map(|p| p.cum_weight).collect(),
                parents.iter().map(|p| p.is_identity).collect(),
            )
        };
        let mut orbit = Orbit::new(domain);
        schreier.get_stabilizer_orbit(level - 1, &mut orbit);
        let mut nodes = tree.levels[level].nodes.write().expect("level lock");
        for node in nodes.iter_mut() {
            if parents_identity[node.parent] {
                node.weight = if orbit.represents_orbit(node.vertex) {
                    orbit.orbit_size(node.vertex) as f64
                } else {
                    0.0
                };
            }
            node.parent_weight = parents_cum[node.parent];
            node.cum_weight = parents_cum[node.parent] * node.weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Controller;
    use std::sync::Arc;

    /// canonical first-cell walk, shared tree over the full base
    fn setup(g: &Graph, colors: &[usize]) -> (SharedTree, usize) {
        let coloring = g.initialize_coloring(Some(colors));
        let mut ctrl = Controller::new(g, coloring);
        ctrl.use_reversible(true);
        ctrl.refine_root(g);
        let root = ctrl.save_state();
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
        let (trace, base) = ctrl.compare_to_this();
        let depth = base.len();
        let leaf = Arc::new(ctrl.c.lab.clone());
        (
            SharedTree::new(g.vertex_count(), root, trace, base, leaf, depth),
            depth,
        )
    }

    #[test]
    fn triangle_levels_enumerate_automorphisms() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let colors = vec![0; 3];
        let (tree, depth) = setup(&g, &colors);
        assert_eq!(depth, 2);
        let mut schreier = Schreier::new(3);
        schreier.set_cap_residues(true);
        schreier.set_base(&[tree.compare_base[0].vertex, tree.compare_base[1].vertex], &[3, 2]);
        let switches = Switches::new();

        let first = do_a_level(&g, &colors, &tree, &schreier, None, &switches, 1, true);
        assert_eq!(first.level, 1);
        assert_eq!(first.installed, 3);

        let second = do_a_level(&g, &colors, &tree, &schreier, None, &switches, 1, true);
        assert_eq!(second.level, 2);
        assert_eq!(second.installed, 6);
        assert!(second.all_certified);
        // six certified leaves: the whole S3
        assert!((tree.level_weight(2) - 6.0).abs() < 1e-9);
        assert!(schreier.deterministic_abort_criterion());
    }

    #[test]
    fn deviating_siblings_fill_abort_map() {
        // C6 + C3: triangle choices at level 1 deviate from the hexagon line
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
        let colors = vec![0; 9];
        let (tree, _) = setup(&g, &colors);
        let schreier = Schreier::new(9);
        let switches = Switches::new();
        let outcome = do_a_level(&g, &colors, &tree, &schreier, None, &switches, 1, true);
        assert_eq!(outcome.level, 1);
        // only the six hexagon vertices survive level 1
        assert_eq!(outcome.installed, 6);
    }

    #[test]
    fn estimate_matches_cell_sizes() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let colors = vec![0; 3];
        let (tree, _) = setup(&g, &colors);
        assert_eq!(next_level_estimate(&tree), 3);
    }
}
