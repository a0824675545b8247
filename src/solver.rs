use crate::ds::GroupSize;
use crate::ds::Orbit;
use crate::graph::Graph;
use crate::groups::Perm;
use crate::groups::Schreier;
use crate::hooks::AutomorphismHook;
use crate::ir::Controller;
use crate::ir::SelectorFactory;
use crate::ir::SharedTree;
use crate::prep;
use crate::prep::Preprocessor;
use crate::search::bfs;
use crate::search::dfs;
use crate::search::inprocess;
use crate::search::random::RandStats;
use crate::search::random::WalkParams;
use crate::search::random;
use crate::search::Mode;
use crate::search::Switches;
use crate::IR_SIZE_FACTOR;
use crate::MAX_CONSECUTIVE_DISCARDS;
use crate::MAX_WORKERS;
use crate::SEQUENTIAL_CUTOFF;
use serde::Serialize;
use std::cell::Cell;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Termination {
    Preprocessor,
    Inprocessor,
    Dfs,
    Bfs,
    DeterministicSchreier,
    RandomSchreier,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Preprocessor => "preprocessor",
            Termination::Inprocessor => "inprocessor",
            Termination::Dfs => "dfs",
            Termination::Bfs => "bfs",
            Termination::DeterministicSchreier => "deterministic-schreier",
            Termination::RandomSchreier => "random-schreier",
        }
    }
}

/// run statistics, dumped as JSON by the CLI on request
#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
    pub restarts: usize,
    pub components: usize,
    pub bfs_levels: usize,
    pub random_paths: usize,
    pub dfs_certified: usize,
    pub termination: String,
    pub deterministic: bool,
    pub group_mantissa: f64,
    pub group_exponent: i32,
    pub elapsed_ms: f64,
}

/// progress lines in the style of a timing table: total ms, delta ms,
/// phase, two phase-specific values
struct TimedLog {
    start: Instant,
    last: Cell<Instant>,
    silent: bool,
}

impl TimedLog {
    fn new(silent: bool) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: Cell::new(now),
            silent,
        }
    }

    fn print(&self, proc: &str, p1: String, p2: String) {
        if self.silent {
            return;
        }
        let now = Instant::now();
        log::info!(
            "{:>9.2} {:>9.2} {:<12} {:<16} {:<16}",
            self.start.elapsed().as_secs_f64() * 1000.0,
            now.duration_since(self.last.get()).as_secs_f64() * 1000.0,
            proc,
            p1,
            p2
        );
        self.last.set(now);
    }
}

/// the solver: high-level strategy controlling the interplay of
/// preprocessing, the selector tournament, depth-first certification,
/// breadth-first tree growth, randomized Schreier search and inprocessing.
pub struct Solver {
    /// error probability of a nondeterministic run is below 2^-h_error_bound
    pub h_error_bound: usize,
    /// discard bases this many times longer than the previous one
    pub h_base_max_diff: usize,
    /// solve quotient components separately
    pub h_decompose: bool,
    /// run the graph-rewriting preprocessor
    pub h_prep: bool,
    pub h_prep_schedule: Vec<prep::Stage>,
    /// byte bound on materialized BFS levels
    pub h_bfs_memory_limit: usize,
    pub h_silent: bool,
    /// worker threads; default picks by graph size
    pub h_threads: Option<usize>,
    pub h_seed: u64,
    /// force a cell selector policy instead of running the tournament
    pub h_selector: Option<crate::ir::Policy>,

    // statistics of the last run
    pub s_deterministic_termination: bool,
    pub s_termination: Termination,
    pub s_grp_sz: GroupSize,
    pub s_stats: Stats,

    kill: Option<Arc<AtomicBool>>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self {
            h_error_bound: 10,
            h_base_max_diff: 5,
            h_decompose: true,
            h_prep: true,
            h_prep_schedule: prep::default_schedule(),
            h_bfs_memory_limit: 0x2000_0000,
            h_silent: false,
            h_threads: None,
            h_seed: 0x5eed,
            h_selector: None,
            s_deterministic_termination: true,
            s_termination: Termination::Preprocessor,
            s_grp_sz: GroupSize::one(),
            s_stats: Stats::default(),
            kill: None,
        }
    }

    /// cooperative cancellation: workers exit at the next mode check and the
    /// solver returns whatever was proven so far
    pub fn set_kill_flag(&mut self, flag: Arc<AtomicBool>) {
        self.kill = Some(flag);
    }

    fn killed(&self) -> bool {
        self.kill.as_ref().is_some_and(|f| f.load(Ordering::Acquire))
    }

    /// compute generators and order of Aut(g, colmap). generators reach the
    /// caller through `hook`, rewritten to the original vertex set.
    pub fn automorphisms(
        &mut self,
        g: &mut Graph,
        colmap: &mut Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) -> GroupSize {
        let started = Instant::now();
        self.s_deterministic_termination = true;
        self.s_termination = Termination::Preprocessor;
        self.s_stats = Stats::default();
        let mut grp = GroupSize::one();
        colmap.resize(g.vertex_count(), 0);

        let schedule = if self.h_prep {
            self.h_prep_schedule.clone()
        } else {
            Vec::new()
        };
        let mut preprocessor = Preprocessor::new(schedule);
        preprocessor.reduce(g, colmap, hook);
        grp.multiply_size(preprocessor.grp_sz);

        if g.vertex_count() > 1 {
            let n = g.vertex_count();
            let (components, component_of) = prep::quotient_components(g, colmap);
            if self.h_decompose && components > 1 {
                self.s_stats.components = components;
                for comp in 0..components {
                    let members: Vec<usize> =
                        (0..n).filter(|&v| component_of[v] == comp).collect();
                    let mut local_index = vec![usize::MAX; n];
                    for (i, &v) in members.iter().enumerate() {
                        local_index[v] = i;
                    }
                    let adjacency: Vec<Vec<usize>> = members
                        .iter()
                        .map(|&v| g.neighbors(v).iter().map(|&w| local_index[w]).collect())
                        .collect();
                    let mut local_g = Graph::from_adjacency(&adjacency);
                    let local_colmap: Vec<usize> =
                        members.iter().map(|&v| colmap[v]).collect();
                    let lifted = preprocessor.lifted_hook(Some(&members), hook);
                    let comp_grp =
                        self.solve_component(&mut local_g, &local_colmap, Some(&lifted));
                    grp.multiply_size(comp_grp);
                }
            } else {
                self.s_stats.components = 1;
                let lifted = preprocessor.lifted_hook(None, hook);
                let colors = colmap.clone();
                let comp_grp = self.solve_component(g, &colors, Some(&lifted));
                grp.multiply_size(comp_grp);
            }
        }

        self.s_grp_sz = grp;
        self.s_stats.termination = self.s_termination.as_str().to_string();
        self.s_stats.deterministic = self.s_deterministic_termination;
        self.s_stats.group_mantissa = grp.mantissa;
        self.s_stats.group_exponent = grp.exponent;
        self.s_stats.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        grp
    }

    /// one restart-loop search over a single (component) graph
    fn solve_component(
        &mut self,
        g: &mut Graph,
        colmap: &[usize],
        hook: Option<&dyn AutomorphismHook>,
    ) -> GroupSize {
        let n = g.vertex_count();
        if n <= 1 {
            return GroupSize::one();
        }
        g.update_density();
        let timer = TimedLog::new(self.h_silent);
        let workers = self
            .h_threads
            .unwrap_or(if n < SEQUENTIAL_CUTOFF {
                1
            } else {
                num_cpus::get().min(MAX_WORKERS)
            })
            .max(1);

        let coloring = g.initialize_coloring(Some(colmap));
        let mut ctrl = Controller::new(g, coloring);
        ctrl.use_reversible(true);
        ctrl.refine_root(g);
        if ctrl.c.is_discrete() {
            return GroupSize::one();
        }
        let mut root_save = ctrl.save_state();
        let s_regular = root_save.coloring.cells == 1;

        let switches = Switches::new();
        let mut orbit = Orbit::new(n);

        let mut h_budget: u64 = 1;
        let mut h_budget_inc_fact: u64 = crate::BUDGET_INCREASE_FACTOR;
        let mut h_used_shallow_inprocess = false;
        let mut restarts: i64 = -1;
        let mut s_cost: u64 = 0;
        let mut s_inproc_success: u32 = 0;
        let mut s_inprocessed = false;
        let mut s_consecutive_discard: u32 = 0;
        let mut s_last_base_size = n + 1;
        let mut s_last_tree_sz: Option<GroupSize> = None;
        let mut s_prunable = false;
        let mut s_fail1_for_inproc = 0.0;
        let mut inproc_grp = GroupSize::one();
        let mut saved_generators: Vec<Arc<Perm>> = Vec::new();

        loop {
            if self.killed() {
                switches.set_done();
                self.s_deterministic_termination = false;
                return inproc_grp;
            }
            let s_hard = h_budget > 256;
            restarts += 1;
            if restarts > 0 {
                ctrl.reset_walk();
                ctrl.load_state(&root_save);
                let inc = if restarts >= 3 { h_budget_inc_fact } else { 2 };
                if s_inproc_success >= 3 {
                    h_budget_inc_fact = 2;
                }
                if s_inprocessed {
                    h_budget = 1;
                }
                h_budget = h_budget.saturating_mul(inc);
                s_cost = 0;
            }
            self.s_stats.restarts = restarts.max(0) as usize;

            // tournament leaves ctrl at the canonical leaf
            switches.set_mode(Mode::Tournament);
            ctrl.reset_walk();
            let (_selector, s_tree_estimate) = SelectorFactory::tournament(
                g,
                &mut ctrl,
                &root_save,
                restarts as u32,
                self.h_selector,
            );
            let base_size = ctrl.base.len();
            timer.print(
                "sel",
                base_size.to_string(),
                ctrl.trace.position().to_string(),
            );

            let s_long_base = base_size * base_size > n;
            let s_short_base = base_size <= 2;
            let s_few_cells = root_save.coloring.cells <= 2;

            // obviously worse base than before? discard, within limits
            let s_too_long =
                base_size > self.h_base_max_diff * s_last_base_size && s_inproc_success <= 1;
            let s_too_big = restarts >= 2
                && s_inproc_success <= (s_regular as u32 + !s_prunable as u32)
                && s_last_tree_sz.is_some_and(|last| last < s_tree_estimate);
            if (s_too_big || s_too_long) && s_consecutive_discard < MAX_CONSECUTIVE_DISCARDS {
                s_consecutive_discard += 1;
                timer.print("skip", base_size.to_string(), s_last_base_size.to_string());
                continue;
            }
            s_consecutive_discard = 0;
            s_last_base_size = base_size;
            s_last_tree_sz = Some(s_tree_estimate);

            let (cmp_trace, cmp_base) = ctrl.compare_to_this();
            let canonical_leaf = Arc::new(ctrl.c.lab.clone());
            let s_trace_full_cost = cmp_base.last().map(|e| e.trace_end).unwrap_or(1).max(1);

            // depth-first search from the probed leaf
            let dfs_fraction = if s_long_base { 0.33 } else { 0.25 };
            let dfs_res =
                dfs::do_paired_dfs(g, colmap, hook, &mut ctrl, &canonical_leaf, dfs_fraction);
            self.s_stats.dfs_certified += dfs_res.certified;
            timer.print(
                "dfs",
                format!("{}-{}", base_size, dfs_res.floor),
                format!("~{}", dfs_res.grp_sz),
            );
            s_prunable |= dfs_res.floor + 5 < base_size;
            if dfs_res.floor == 0 {
                self.s_termination = Termination::Dfs;
                let mut total = inproc_grp;
                total.multiply_size(dfs_res.grp_sz);
                timer.print("done", "dfs".to_string(), total.to_string());
                return total;
            }
            let floor = dfs_res.floor;

            // Schreier chain over the uncertified base prefix; the certified
            // tail is the DFS factor
            let base_vertices: Vec<usize> =
                cmp_base[..floor].iter().map(|e| e.vertex).collect();
            let base_targets: Vec<usize> =
                cmp_base[..floor].iter().map(|e| e.color_size).collect();
            let mut schreier = Schreier::new(n);
            schreier.set_error_bound(self.h_error_bound);
            schreier.set_cap_residues(true);
            schreier.set_base(&base_vertices, &base_targets);
            if restarts >= 3 && !s_inprocessed {
                for generator in &saved_generators {
                    schreier.sift((**generator).clone());
                }
                schreier.reset_probabilistic_criterion();
            }

            let tree = SharedTree::new(
                n,
                root_save.clone(),
                cmp_trace.clone(),
                cmp_base.clone(),
                canonical_leaf.clone(),
                floor,
            );
            s_inprocessed = false;

            let stats = RandStats::default();
            let mut h_rand_fail_lim_now: usize = 4;
            let mut h_rand_fail_lim_total: usize = 0;
            let mut h_bfs_pinned = false;
            let mut s_last_bfs_pruned = false;
            let mut s_any_bfs_pruned = false;
            let mut s_reduced_with = 0;
            let mut bfs_finish_weight = 0.0;
            let mut finished = false;
            let mut do_restart = false;

            while !do_restart && !finished {
                if self.killed() {
                    switches.set_done();
                    do_restart = true;
                    continue;
                }
                let finished_level = tree.finished_up_to();
                let s_bfs_next_level_nodes = bfs::next_level_estimate(&tree);
                let s_have_rand_estimate = stats.paths_total() >= 4;
                let s_path_fail1_avg = stats.fail1_rate();
                if s_have_rand_estimate {
                    s_fail1_for_inproc = s_path_fail1_avg;
                }
                let level_tracepos = if finished_level == 0 {
                    0
                } else {
                    cmp_base[finished_level - 1].trace_end
                };
                let s_random_path_trace_cost = s_trace_full_cost - level_tracepos;
                let s_trace_cost1_avg = if s_have_rand_estimate {
                    stats.avg_trace_cost1()
                } else {
                    s_trace_full_cost as f64
                };

                #[derive(PartialEq)]
                enum Decision {
                    Random,
                    Bfs,
                    Restart,
                }
                let mut next = if !s_have_rand_estimate {
                    Decision::Random
                } else {
                    // model the expected cost of either technique, scaled by
                    // how fruitful it has been; lower score wins
                    let reset_cost_rand = n as f64;
                    let reset_cost_bfs = s_trace_cost1_avg.min(n as f64);
                    let bfs_estimate =
                        (s_trace_cost1_avg + reset_cost_bfs) * s_bfs_next_level_nodes as f64;
                    let rand_estimate = (s_random_path_trace_cost as f64 + reset_cost_rand)
                        * h_rand_fail_lim_now as f64;
                    let score_rand = rand_estimate * (1.0 - stats.rolling_success());
                    let mut score_bfs = bfs_estimate * (0.1 + 1.0 - s_path_fail1_avg);
                    if s_path_fail1_avg < 0.01 {
                        score_bfs *= 2.0;
                    }
                    if finished_level >= 1 {
                        score_bfs *= 1.0 - s_path_fail1_avg;
                    }
                    let chosen = if score_rand < score_bfs {
                        Decision::Random
                    } else {
                        Decision::Bfs
                    };
                    if chosen == Decision::Random {
                        h_rand_fail_lim_now *= 2;
                    }
                    chosen
                };

                // overrides: budget, memory, structure
                if next == Decision::Bfs
                    && s_bfs_next_level_nodes as f64 * (1.0 - s_path_fail1_avg)
                        > 2.0 * h_budget as f64
                {
                    next = Decision::Restart;
                }
                if next == Decision::Bfs {
                    let est_bytes = s_bfs_next_level_nodes as f64
                        * (1.0 - s_path_fail1_avg)
                        * n as f64
                        * std::mem::size_of::<usize>() as f64;
                    if est_bytes > self.h_bfs_memory_limit as f64 {
                        next = Decision::Random;
                    }
                }
                if s_cost > h_budget {
                    next = Decision::Restart;
                }
                if s_regular
                    && s_few_cells
                    && restarts == 0
                    && s_have_rand_estimate
                    && s_path_fail1_avg > 0.01
                    && finished_level == 0
                {
                    next = Decision::Bfs;
                }
                if next == Decision::Restart
                    && 2 * base_size > s_bfs_next_level_nodes
                    && s_trace_cost1_avg < base_size as f64
                    && s_path_fail1_avg > 0.01
                {
                    next = Decision::Bfs;
                }
                if stats.rolling_success() > 0.1 && s_cost <= h_budget * 4 {
                    next = Decision::Random;
                }
                if s_hard
                    && next == Decision::Restart
                    && stats.rolling_success() > 0.0
                    && s_cost <= h_budget * 10
                {
                    next = Decision::Random;
                }
                if finished_level == floor && s_any_bfs_pruned && s_cost <= h_budget * 20 {
                    next = Decision::Random;
                }
                // inprocess promptly once the first level was pruned
                if finished_level == 1 && floor > 1 && s_last_bfs_pruned && s_cost > h_budget {
                    next = Decision::Restart;
                }
                if next == Decision::Bfs && (s_bfs_next_level_nodes == 0 || h_bfs_pinned) {
                    next = Decision::Random;
                }

                match next {
                    Decision::Random => {
                        let h_look_close = (s_have_rand_estimate
                            && stats.rolling_first_level_success() > 0.5
                            && !s_short_base)
                            || finished_level + 1 == floor;
                        h_rand_fail_lim_total += h_rand_fail_lim_now;
                        let from_level = if finished_level == 0
                            || (s_long_base && !s_any_bfs_pruned)
                        {
                            None
                        } else {
                            Some(finished_level)
                        };
                        let params = WalkParams {
                            fail_limit: h_rand_fail_lim_total,
                            look_close: h_look_close,
                            floor,
                            from_level,
                            workers,
                            seed: self
                                .h_seed
                                .wrapping_add(restarts as u64)
                                .wrapping_mul(0x9e37_79b9),
                        };
                        random::random_walks(
                            g, colmap, hook, &tree, &schreier, &switches, &stats, &params,
                        );
                        if schreier.any_abort_criterion() {
                            finished = true;
                            self.s_termination = if schreier.deterministic_abort_criterion()
                            {
                                Termination::DeterministicSchreier
                            } else {
                                Termination::RandomSchreier
                            };
                        }
                        s_cost += h_rand_fail_lim_now as u64;
                        timer.print(
                            "random",
                            tree.stat_leaves().to_string(),
                            format!("{:.2}", stats.rolling_success()),
                        );
                    }
                    Decision::Bfs => {
                        switches.set_mode(Mode::Bfs);
                        if schreier.generator_count() > s_reduced_with {
                            bfs::reduce_tree(n, &tree, &schreier);
                            s_reduced_with = schreier.generator_count();
                        }
                        let tolerance = (s_inproc_success as usize + 1).max(1);
                        if s_bfs_next_level_nodes > IR_SIZE_FACTOR * n * tolerance {
                            // target pinned at the current level; randomized
                            // search takes over from here
                            h_bfs_pinned = true;
                            continue;
                        }
                        let use_deviation_pruning =
                            !(s_inproc_success >= 2 && s_path_fail1_avg > 0.1);
                        let outcome = bfs::do_a_level(
                            g,
                            colmap,
                            &tree,
                            &schreier,
                            hook,
                            &switches,
                            workers,
                            use_deviation_pruning,
                        );
                        self.s_stats.bfs_levels += 1;
                        s_last_bfs_pruned = outcome.installed < s_bfs_next_level_nodes;
                        s_any_bfs_pruned |= s_last_bfs_pruned;
                        s_cost += outcome.installed as u64;
                        stats.reset();
                        timer.print(
                            "bfs",
                            format!("0-{}", outcome.level),
                            outcome.installed.to_string(),
                        );
                        if outcome.level == floor && outcome.all_certified {
                            finished = true;
                            self.s_termination = Termination::Bfs;
                            bfs_finish_weight = tree.level_weight(floor);
                        }
                    }
                    Decision::Restart => {
                        do_restart = true;
                    }
                }
                switches.set_mode(Mode::Wait);
            }

            self.s_stats.random_paths += stats.paths_total();

            if finished {
                let mut total = inproc_grp;
                total.multiply_size(dfs_res.grp_sz);
                if self.s_termination == Termination::Bfs {
                    total.multiply_parts(bfs_finish_weight, 0);
                } else {
                    total.multiply_size(schreier.group_size());
                }
                timer.print(
                    "done",
                    self.s_termination.as_str().to_string(),
                    total.to_string(),
                );
                return total;
            }

            // restarting: inprocess with everything gathered this iteration
            saved_generators = schreier.generators();
            let use_shallow = !h_used_shallow_inprocess
                && s_inproc_success == 0
                && (s_fail1_for_inproc > 0.1 || restarts >= 2);
            h_used_shallow_inprocess |= use_shallow;
            let use_quadratic =
                h_used_shallow_inprocess && !use_shallow && s_inproc_success == 0 && restarts >= 3;
            let splits_hint = ((n - root_save.coloring.cells) / base_size.max(1)).max(4);
            ctrl.reset_walk();
            ctrl.load_state(&root_save);
            let inproc = inprocess::inprocess(
                g,
                &mut ctrl,
                &mut root_save,
                Some(&tree),
                &schreier,
                &mut orbit,
                &dfs_res.maybe_individualize,
                s_any_bfs_pruned,
                use_shallow,
                use_quadratic,
                splits_hint,
            );
            s_inprocessed = inproc.touched;
            s_inproc_success += inproc.touched as u32;
            inproc_grp.multiply_size(inproc.grp_sz);
            if inproc.touched {
                orbit.reset();
                timer.print(
                    "inprocess",
                    root_save.coloring.cells.to_string(),
                    s_inproc_success.to_string(),
                );
            }
            if root_save.coloring.cells == n {
                self.s_termination = Termination::Inprocessor;
                timer.print("done", "inprocess".to_string(), inproc_grp.to_string());
                return inproc_grp;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::CollectingHook;
    use crate::hooks::CountingHook;
    use crate::ir::Refiner;
    use std::sync::Mutex;

    fn solve(
        pairs: &[(usize, usize)],
        n: usize,
        colors: Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) -> (Solver, GroupSize) {
        let mut g = Graph::from_edges(n, pairs);
        let mut colmap = colors;
        let mut solver = Solver::new();
        solver.h_silent = true;
        let grp = solver.automorphisms(&mut g, &mut colmap, hook);
        (solver, grp)
    }

    fn assert_order(grp: GroupSize, mantissa: f64, exponent: i32) {
        assert_eq!(grp.exponent, exponent, "group order exponent ({grp})");
        assert!(
            (grp.mantissa - mantissa).abs() < 0.01,
            "group order mantissa ({grp})"
        );
    }

    /// asserts every emitted generator is an automorphism of the original
    struct CertifyingHook {
        original: Graph,
        colors: Vec<usize>,
        count: Mutex<usize>,
    }

    impl CertifyingHook {
        fn new(g: &Graph, colors: &[usize]) -> Self {
            Self {
                original: g.clone(),
                colors: colors.to_vec(),
                count: Mutex::new(0),
            }
        }

        fn count(&self) -> usize {
            *self.count.lock().unwrap()
        }
    }

    impl AutomorphismHook for CertifyingHook {
        fn automorphism(&self, perm: &[usize], supp: &[usize]) {
            let mut refiner = Refiner::new(self.original.vertex_count());
            assert!(
                refiner.certify_automorphism(&self.original, &self.colors, perm),
                "hook received a non-automorphism"
            );
            for (i, &x) in perm.iter().enumerate() {
                assert_eq!(supp.contains(&i), i != x, "support mismatch at {i}");
            }
            *self.count.lock().unwrap() += 1;
        }
    }

    #[test]
    fn empty_graph_is_trivial() {
        let hook = CountingHook::new();
        let (solver, grp) = solve(&[], 0, vec![], Some(&hook));
        assert_order(grp, 1.0, 0);
        assert_eq!(hook.count(), 0);
        assert!(solver.s_deterministic_termination);
    }

    #[test]
    fn singleton_is_trivial() {
        let hook = CountingHook::new();
        let (_, grp) = solve(&[], 1, vec![0], Some(&hook));
        assert_order(grp, 1.0, 0);
        assert_eq!(hook.count(), 0);
    }

    #[test]
    fn k2_has_the_swap() {
        let g = Graph::from_edges(2, &[(0, 1)]);
        let hook = CertifyingHook::new(&g, &[0, 0]);
        let (_, grp) = solve(&[(0, 1)], 2, vec![0, 0], Some(&hook));
        assert_order(grp, 2.0, 0);
        assert!(hook.count() >= 1);
    }

    #[test]
    fn k2_with_distinct_colors_is_rigid() {
        let (_, grp) = solve(&[(0, 1)], 2, vec![0, 1], None);
        assert_order(grp, 1.0, 0);
    }

    #[test]
    fn uniform_path_three() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let hook = CertifyingHook::new(&g, &[0, 0, 0]);
        let (_, grp) = solve(&[(0, 1), (1, 2)], 3, vec![0, 0, 0], Some(&hook));
        assert_order(grp, 2.0, 0);
    }

    #[test]
    fn colored_path_three_swaps_endpoints() {
        let hook = CollectingHook::new();
        let (_, grp) = solve(&[(0, 1), (1, 2)], 3, vec![0, 1, 0], Some(&hook));
        assert_order(grp, 2.0, 0);
        // the only nontrivial generator swaps the endpoints
        for perm in hook.perms() {
            assert_eq!(perm, vec![2, 1, 0]);
        }
        assert!(!hook.perms().is_empty());
    }

    #[test]
    fn triangle_is_symmetric() {
        let triangle = [(0, 1), (1, 2), (0, 2)];
        let g = Graph::from_edges(3, &triangle);
        let hook = CertifyingHook::new(&g, &[0, 0, 0]);
        let (solver, grp) = solve(&triangle, 3, vec![0, 0, 0], Some(&hook));
        assert_order(grp, 6.0, 0);
        assert!(solver.s_deterministic_termination);
        assert!(hook.count() >= 2);
    }

    #[test]
    fn triangle_without_preprocessing() {
        let triangle = [(0, 1), (1, 2), (0, 2)];
        let mut g = Graph::from_edges(3, &triangle);
        let hook = CertifyingHook::new(&g, &[0, 0, 0]);
        let mut colmap = vec![0, 0, 0];
        let mut solver = Solver::new();
        solver.h_silent = true;
        solver.h_prep = false;
        let grp = solver.automorphisms(&mut g, &mut colmap, Some(&hook));
        assert_order(grp, 6.0, 0);
        assert_eq!(solver.s_termination, Termination::Dfs);
    }

    #[test]
    fn five_isolated_vertices() {
        let (_, grp) = solve(&[], 5, vec![0; 5], None);
        assert_order(grp, 1.2, 2);
    }

    #[test]
    fn two_disjoint_triangles() {
        let pairs = [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)];
        let g = Graph::from_edges(6, &pairs);
        let hook = CertifyingHook::new(&g, &[0; 6]);
        let (_, grp) = solve(&pairs, 6, vec![0; 6], Some(&hook));
        // wreath product: 6 * 6 * 2
        assert_order(grp, 7.2, 1);
    }

    #[test]
    fn complete_bipartite_three_three() {
        let mut pairs = Vec::new();
        for a in 0..3 {
            for b in 3..6 {
                pairs.push((a, b));
            }
        }
        let g = Graph::from_edges(6, &pairs);
        let colors = vec![0, 0, 0, 1, 1, 1];
        let hook = CertifyingHook::new(&g, &colors);
        let (_, grp) = solve(&pairs, 6, colors, Some(&hook));
        // 3! * 3!
        assert_order(grp, 3.6, 1);
    }

    #[test]
    fn complete_bipartite_without_preprocessing() {
        let mut pairs = Vec::new();
        for a in 0..3 {
            for b in 3..6 {
                pairs.push((a, b));
            }
        }
        let mut g = Graph::from_edges(6, &pairs);
        let colors = vec![0, 0, 0, 1, 1, 1];
        let hook = CertifyingHook::new(&g, &colors);
        let mut colmap = colors.clone();
        let mut solver = Solver::new();
        solver.h_silent = true;
        solver.h_prep = false;
        let grp = solver.automorphisms(&mut g, &mut colmap, Some(&hook));
        assert_order(grp, 3.6, 1);
    }

    #[test]
    fn petersen_graph() {
        // outer cycle, inner pentagram, spokes
        let mut pairs = Vec::new();
        for i in 0..5 {
            pairs.push((i, (i + 1) % 5));
            pairs.push((5 + i, 5 + (i + 2) % 5));
            pairs.push((i, 5 + i));
        }
        let g = Graph::from_edges(10, &pairs);
        let hook = CertifyingHook::new(&g, &[0; 10]);
        let (_, grp) = solve(&pairs, 10, vec![0; 10], Some(&hook));
        assert_order(grp, 1.2, 2);
    }

    #[test]
    fn two_components_with_distinct_colors_decompose() {
        let pairs = [(0, 1), (2, 3)];
        let mut g = Graph::from_edges(4, &pairs);
        let mut colmap = vec![0, 0, 1, 1];
        let mut solver = Solver::new();
        solver.h_silent = true;
        solver.h_prep = false;
        let grp = solver.automorphisms(&mut g, &mut colmap, None);
        assert_order(grp, 4.0, 0);
        assert_eq!(solver.s_stats.components, 2);
    }

    #[test]
    fn kill_flag_exits_cleanly() {
        let mut g = Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
        let mut colmap = vec![0; 3];
        let mut solver = Solver::new();
        solver.h_silent = true;
        solver.h_prep = false;
        let flag = Arc::new(AtomicBool::new(true));
        solver.set_kill_flag(flag);
        let grp = solver.automorphisms(&mut g, &mut colmap, None);
        // nothing was proven before the kill
        assert_order(grp, 1.0, 0);
        assert!(!solver.s_deterministic_termination);
    }

    #[test]
    fn stats_serialize() {
        let (solver, _) = solve(&[(0, 1)], 2, vec![0, 0], None);
        let json = serde_json::to_string(&solver.s_stats).unwrap();
        assert!(json.contains("\"termination\""));
        assert!(solver.s_stats.elapsed_ms >= 0.0);
    }

    #[test]
    fn permuted_input_has_same_order() {
        let text = "p edge 6 6\ne 1 2\ne 2 3\ne 1 3\ne 4 5\ne 5 6\ne 4 6\n";
        let (mut g1, mut c1) = crate::graph::parse_dimacs(text, None).unwrap();
        let (mut g2, mut c2) = crate::graph::parse_dimacs(text, Some(99)).unwrap();
        let mut s1 = Solver::new();
        s1.h_silent = true;
        let mut s2 = Solver::new();
        s2.h_silent = true;
        let a = s1.automorphisms(&mut g1, &mut c1, None);
        let b = s2.automorphisms(&mut g2, &mut c2, None);
        assert_eq!(a.exponent, b.exponent);
        assert!((a.mantissa - b.mantissa).abs() < 0.01);
    }
}
