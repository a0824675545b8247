use super::dfs::descend_to_leaf;
use super::Mode;
use super::Switches;
use crate::graph::Graph;
use crate::groups::Perm;
use crate::groups::Schreier;
use crate::groups::Sift;
use crate::hooks::AutomorphismHook;
use crate::ir::Controller;
use crate::ir::SharedTree;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// rolling statistics of random leaf search; shared across workers and read
/// by the orchestrator's scoring
#[derive(Default)]
pub struct RandStats {
    pub paths: AtomicUsize,
    pub paths_fail1: AtomicUsize,
    pub succeed: AtomicUsize,
    pub certified: AtomicUsize,
    pub trace_cost: AtomicUsize,
    pub trace_cost1: AtomicUsize,
}

impl RandStats {
    pub fn reset(&self) {
        self.paths.store(0, Ordering::Relaxed);
        self.paths_fail1.store(0, Ordering::Relaxed);
        self.succeed.store(0, Ordering::Relaxed);
        self.certified.store(0, Ordering::Relaxed);
        self.trace_cost.store(0, Ordering::Relaxed);
        self.trace_cost1.store(0, Ordering::Relaxed);
    }

    pub fn paths_total(&self) -> usize {
        self.paths.load(Ordering::Relaxed)
    }

    pub fn rolling_success(&self) -> f64 {
        let paths = self.paths.load(Ordering::Relaxed);
        if paths == 0 {
            return 0.0;
        }
        self.succeed.load(Ordering::Relaxed) as f64 / paths as f64
    }

    pub fn fail1_rate(&self) -> f64 {
        let paths = self.paths.load(Ordering::Relaxed);
        if paths == 0 {
            return 0.0;
        }
        self.paths_fail1.load(Ordering::Relaxed) as f64 / paths as f64
    }

    pub fn rolling_first_level_success(&self) -> f64 {
        1.0 - self.fail1_rate()
    }

    pub fn avg_trace_cost1(&self) -> f64 {
        let paths = self.paths.load(Ordering::Relaxed);
        if paths == 0 {
            return 0.0;
        }
        self.trace_cost1.load(Ordering::Relaxed) as f64 / paths as f64
    }
}

pub struct WalkParams {
    /// stop after this many fruitless walks
    pub fail_limit: usize,
    /// tolerate one trace deviation at the first level and keep walking;
    /// such leaves pair through the leaf store
    pub look_close: bool,
    /// depth of the randomized prefix; the tail below the DFS floor follows
    /// the reference
    pub floor: usize,
    /// None: walk from the root; Some(l): walk from a weighted node of BFS
    /// level l
    pub from_level: Option<usize>,
    pub workers: usize,
    pub seed: u64,
}

/// sample random root-to-leaf (or level-to-leaf) walks, certify candidate
/// automorphisms, and sift them into the shared Schreier structure.
pub fn random_walks(
    g: &Graph,
    colors: &[usize],
    hook: Option<&dyn AutomorphismHook>,
    tree: &SharedTree,
    schreier: &Schreier,
    switches: &Switches,
    stats: &RandStats,
    params: &WalkParams,
) {
    switches.set_mode(match params.from_level {
        None => Mode::UniformProbe,
        Some(_) => Mode::NonUniformFromBfs,
    });
    let fails = AtomicUsize::new(0);

    let run = |worker: usize| {
        let mut ctrl = Controller::new(g, (*tree.root.coloring).clone());
        ctrl.use_reversible(true);
        ctrl.install_compare(tree.compare_trace.clone(), tree.compare_base.clone());
        let mut rng = SmallRng::seed_from_u64(params.seed.wrapping_add(worker as u64));
        while !switches.is_done()
            && fails.load(Ordering::Relaxed) < params.fail_limit
            && !schreier.any_abort_criterion()
        {
            let found = single_walk(
                g, colors, hook, tree, schreier, stats, params, &mut ctrl, &mut rng,
            );
            if !found {
                fails.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    if params.workers <= 1 {
        run(0);
    } else {
        std::thread::scope(|scope| {
            for w in 0..params.workers {
                let run = &run;
                scope.spawn(move || run(w));
            }
        });
    }
    switches.set_mode(Mode::Wait);
}

fn single_walk(
    g: &Graph,
    colors: &[usize],
    hook: Option<&dyn AutomorphismHook>,
    tree: &SharedTree,
    schreier: &Schreier,
    stats: &RandStats,
    params: &WalkParams,
    ctrl: &mut Controller,
    rng: &mut SmallRng,
) -> bool {
    let (save, start_depth) = match params.from_level {
        None => (tree.root.clone(), tree.root.base.len()),
        Some(level) => {
            let nodes = tree.levels[level].nodes.read().expect("level lock");
            let total: f64 = nodes.iter().map(|n| n.cum_weight.max(0.0)).sum();
            if nodes.is_empty() || total <= 0.0 {
                (tree.root.clone(), tree.root.base.len())
            } else {
                let mut pick = rng.random_range(0.0..total);
                let mut chosen = 0;
                for (i, node) in nodes.iter().enumerate() {
                    pick -= node.cum_weight.max(0.0);
                    if pick <= 0.0 {
                        chosen = i;
                        break;
                    }
                }
                (nodes[chosen].save.clone(), level)
            }
        }
    };
    ctrl.load_state(&save);
    ctrl.trace.set_never_fail(params.look_close);
    let start_pos = ctrl.trace.position();
    let mut dev_depth: Option<usize> = None;
    let compare_base = tree.compare_base.clone();

    while !ctrl.c.is_discrete() {
        let depth = ctrl.depth();
        if depth >= params.floor {
            let mut cost = usize::MAX;
            if !descend_to_leaf(g, ctrl, &mut cost) {
                record_fail(stats, ctrl, start_pos, depth == start_depth);
                return false;
            }
            break;
        }
        let Some(entry) = compare_base.get(depth) else {
            record_fail(stats, ctrl, start_pos, depth == start_depth);
            return false;
        };
        let sz = ctrl.c.cell_size(entry.target_color);
        let v = ctrl.c.members(entry.target_color)[rng.random_range(0..sz)];
        let before = ctrl.trace.position();
        ctrl.move_to_child(g, v);
        if depth == start_depth {
            stats
                .trace_cost1
                .fetch_add(ctrl.trace.position() - before, Ordering::Relaxed);
        }
        if ctrl.trace.diverged() {
            if dev_depth.is_none() {
                dev_depth = Some(depth);
            }
            if !(params.look_close && dev_depth == Some(start_depth)) {
                record_fail(stats, ctrl, start_pos, depth == start_depth);
                return false;
            }
        }
    }

    stats.paths.fetch_add(1, Ordering::Relaxed);
    stats
        .trace_cost
        .fetch_add(ctrl.trace.position() - start_pos, Ordering::Relaxed);
    let lab = ctrl.c.lab.clone();

    if !ctrl.trace.diverged() {
        let pi = Perm::from_labs(&tree.canonical_leaf, &lab);
        if pi.is_identity() {
            return false;
        }
        let supp = pi.support();
        if !ctrl.certify(g, colors, pi.as_slice(), &supp) {
            return false;
        }
        stats.certified.fetch_add(1, Ordering::Relaxed);
        sift_and_emit(schreier, hook, stats, pi, &supp)
    } else {
        // a complete leaf off the canonical base: pair it with stored leaves
        // failing the same way
        let known = tree.store_leaf(ctrl.trace.acc(), lab.clone());
        let mut found = false;
        for stored in known {
            let pi = Perm::from_labs(&stored, &lab);
            if pi.is_identity() {
                continue;
            }
            let supp = pi.support();
            if ctrl.certify(g, colors, pi.as_slice(), &supp) {
                stats.certified.fetch_add(1, Ordering::Relaxed);
                found |= sift_and_emit(schreier, hook, stats, pi, &supp);
            }
        }
        found
    }
}

fn record_fail(stats: &RandStats, ctrl: &Controller, start_pos: usize, first_level: bool) {
    stats.paths.fetch_add(1, Ordering::Relaxed);
    stats.paths_fail1.fetch_add(first_level as usize, Ordering::Relaxed);
    stats
        .trace_cost
        .fetch_add(ctrl.trace.position() - start_pos, Ordering::Relaxed);
}

fn sift_and_emit(
    schreier: &Schreier,
    hook: Option<&dyn AutomorphismHook>,
    stats: &RandStats,
    pi: Perm,
    supp: &[usize],
) -> bool {
    match schreier.sift(pi.clone()) {
        Sift::NewGenerator { .. } => {
            stats.succeed.fetch_add(1, Ordering::Relaxed);
            if let Some(hook) = hook {
                hook.automorphism(pi.as_slice(), supp);
            }
            true
        }
        Sift::Absorbed => false,
    }
}
