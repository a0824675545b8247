use super::BaseEntry;
use super::SavedState;
use super::trace::fold;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

/// a materialized node of the BFS prefix of the IR tree
#[derive(Clone, Debug)]
pub struct TreeNode {
    /// index of the parent in the previous level
    pub parent: usize,
    pub save: SavedState,
    /// vertex individualized to reach this node
    pub vertex: usize,
    /// level-1 ancestor vertex, for the node invariant
    pub root_child: usize,
    /// size of the sibling orbit this node represents after tree reduction
    pub weight: f64,
    pub parent_weight: f64,
    /// product of weights along the path from the root
    pub cum_weight: f64,
    pub is_identity: bool,
}

struct AbortMap {
    map: HashMap<usize, u64>,
    expecting: isize,
}

pub struct Level {
    pub nodes: RwLock<Vec<TreeNode>>,
    abort: Mutex<AbortMap>,
    abort_closed: AtomicBool,
}

impl Level {
    fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            abort: Mutex::new(AbortMap {
                map: HashMap::new(),
                expecting: -1,
            }),
            abort_closed: AtomicBool::new(false),
        }
    }
}

/// the shared IR tree: BFS levels, per-level deviation maps, the canonical
/// walk artifacts, and the store of off-base leaves. nodes are arena-style:
/// per-level vectors referenced by (level, index).
pub struct SharedTree {
    pub levels: Vec<Level>,
    finished_up_to: AtomicUsize,
    pub root: SavedState,
    pub compare_trace: Arc<Vec<u64>>,
    pub compare_base: Arc<Vec<BaseEntry>>,
    pub canonical_leaf: Arc<Vec<usize>>,
    leaf_store: Mutex<HashMap<u64, Vec<Arc<Vec<usize>>>>>,
    node_invariant: Mutex<Vec<u64>>,
    stat_leaves: AtomicUsize,
}

impl SharedTree {
    /// `depth` is the effective base length: the deepest level BFS may build
    pub fn new(
        domain: usize,
        root: SavedState,
        compare_trace: Arc<Vec<u64>>,
        compare_base: Arc<Vec<BaseEntry>>,
        canonical_leaf: Arc<Vec<usize>>,
        depth: usize,
    ) -> Self {
        let levels: Vec<Level> = (0..=depth).map(|_| Level::new()).collect();
        let tree = Self {
            levels,
            finished_up_to: AtomicUsize::new(0),
            root: root.clone(),
            compare_trace,
            compare_base,
            canonical_leaf,
            leaf_store: Mutex::new(HashMap::new()),
            node_invariant: Mutex::new(vec![0; domain]),
            stat_leaves: AtomicUsize::new(0),
        };
        tree.levels[0].nodes.write().expect("level lock").push(TreeNode {
            parent: 0,
            save: root,
            vertex: usize::MAX,
            root_child: usize::MAX,
            weight: 1.0,
            parent_weight: 1.0,
            cum_weight: 1.0,
            is_identity: true,
        });
        tree
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn finished_up_to(&self) -> usize {
        self.finished_up_to.load(Ordering::Acquire)
    }

    pub fn advance_finished(&self, level: usize) {
        self.finished_up_to.store(level, Ordering::Release)
    }

    pub fn level_size(&self, level: usize) -> usize {
        self.levels[level].nodes.read().expect("level lock").len()
    }

    /// surviving weight mass of a level; the group-order contribution when
    /// BFS finishes the prefix
    pub fn level_weight(&self, level: usize) -> f64 {
        self.levels[level]
            .nodes
            .read()
            .expect("level lock")
            .iter()
            .map(|n| n.cum_weight)
            .sum()
    }

    /// arm the deviation map of `level`: it closes after `count` identity
    /// siblings have reported
    pub fn arm_abort_map(&self, level: usize, count: usize) {
        let mut abort = self.levels[level].abort.lock().expect("abort lock");
        abort.expecting = count as isize;
        abort.map.clear();
        self.levels[level].abort_closed.store(false, Ordering::Release);
    }

    /// record the deviation of an identity-line child
    pub fn write_abort(&self, level: usize, pos: usize, acc: u64) {
        let mut abort = self.levels[level].abort.lock().expect("abort lock");
        abort.map.entry(pos).or_insert(acc);
        self.note_identity_child(level, &mut abort);
    }

    /// an identity-line child finished without deviating; still counts toward
    /// closing the map
    pub fn note_identity_survivor(&self, level: usize) {
        let mut abort = self.levels[level].abort.lock().expect("abort lock");
        self.note_identity_child(level, &mut abort);
    }

    fn note_identity_child(&self, level: usize, abort: &mut AbortMap) {
        abort.expecting -= 1;
        if abort.expecting == 0 {
            self.levels[level].abort_closed.store(true, Ordering::Release);
        }
    }

    /// is (pos, acc) a deviation already recorded by the identity line?
    /// reads are lock-free once the map is closed
    pub fn read_abort(&self, level: usize, pos: usize, acc: u64) -> bool {
        if !self.levels[level].abort_closed.load(Ordering::Acquire) {
            return false;
        }
        let abort = self.levels[level].abort.lock().expect("abort lock");
        abort.map.get(&pos) == Some(&acc)
    }

    /// register a leaf whose trace diverged from the canonical one, keyed by
    /// its trace hash; returns previously stored leaves with the same hash
    pub fn store_leaf(&self, acc: u64, lab: Vec<usize>) -> Vec<Arc<Vec<usize>>> {
        let mut store = self.leaf_store.lock().expect("leaf store lock");
        let bucket = store.entry(acc).or_default();
        let known = bucket.clone();
        bucket.push(Arc::new(lab));
        self.stat_leaves.fetch_add(1, Ordering::Relaxed);
        known
    }

    pub fn clear_leaves(&self) {
        self.leaf_store.lock().expect("leaf store lock").clear();
        self.stat_leaves.store(0, Ordering::Relaxed);
    }

    pub fn stat_leaves(&self) -> usize {
        self.stat_leaves.load(Ordering::Relaxed)
    }

    /// fold a materialized node into the per-root-child invariant
    pub fn feed_node_invariant(&self, root_child: usize, level: usize, acc: u64) {
        if root_child == usize::MAX {
            return;
        }
        let mut inv = self.node_invariant.lock().expect("invariant lock");
        inv[root_child] = fold(inv[root_child], acc.wrapping_add(level as u64));
    }

    /// mark a root child pruned by the deviation map with a distinct value
    pub fn feed_pruned_invariant(&self, root_child: usize, level: usize, acc: u64) {
        if root_child == usize::MAX {
            return;
        }
        let mut inv = self.node_invariant.lock().expect("invariant lock");
        inv[root_child] = fold(inv[root_child], !acc ^ (level as u64));
    }

    pub fn node_invariant_snapshot(&self) -> Vec<u64> {
        self.node_invariant.lock().expect("invariant lock").clone()
    }
}
