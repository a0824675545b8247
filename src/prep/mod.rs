mod probe;

pub use probe::quotient_components;

use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::graph::Graph;
use crate::hooks::AutomorphismHook;
use crate::ir::trace::fold;
use crate::ir::trace::mash;
use crate::ir::Refiner;
use crate::ir::Trace;
use std::collections::HashMap;

/// graph-rewriting reductions applied before search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// absorb degree-0 and degree-1 vertices into recovery strings
    Deg01,
    /// drop complete bipartite (and clique) class pairs
    QcEdgeFlip,
    /// delete parallel subdivision twins
    Deg2Match,
    /// compress degree-2 paths between distinctly colored endpoints
    Deg2Unique,
    /// two-individualization probing on quotient components
    Probe2Qc,
    /// one-individualization probing on quotient components
    ProbeQc,
    /// repeat the cheap reductions until the graph stops shrinking
    ReductionLoop,
}

pub fn default_schedule() -> Vec<Stage> {
    vec![
        Stage::Deg01,
        Stage::QcEdgeFlip,
        Stage::Deg2Match,
        Stage::Deg2Unique,
        Stage::Probe2Qc,
        Stage::Deg2Match,
        Stage::ProbeQc,
        Stage::Deg2Match,
        Stage::ReductionLoop,
    ]
}

/// owns the reduced graph's history: backward translation layers, recovery
/// strings (how reduced vertices expand back to original ones) and the group
/// order factors contributed by the reductions. generators found on the
/// reduced graph are lifted back through the layers, splicing recovery
/// strings elementwise.
pub struct Preprocessor {
    /// stack of backward index maps, one per shrink
    layers: Vec<Vec<usize>>,
    /// original vertex -> absorbed original vertices, canonical order
    recovery: Vec<Vec<usize>>,
    /// original vertex -> hash of its absorbed structure; twins must agree
    code: Vec<u64>,
    pub grp_sz: GroupSize,
    schedule: Vec<Stage>,
    n_original: usize,
    pub s_reductions: usize,
}

impl Preprocessor {
    pub fn new(schedule: Vec<Stage>) -> Self {
        Self {
            layers: Vec::new(),
            recovery: Vec::new(),
            code: Vec::new(),
            grp_sz: GroupSize::one(),
            schedule,
            n_original: 0,
            s_reductions: 0,
        }
    }

    /// apply the reduction schedule to (g, colmap) in place. twin generators
    /// discovered along the way are emitted through `hook` at original
    /// indices; `colmap` afterwards holds the refined classes of the reduced
    /// graph.
    pub fn reduce(
        &mut self,
        g: &mut Graph,
        colmap: &mut Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) {
        self.n_original = g.vertex_count();
        self.layers.clear();
        self.recovery = vec![Vec::new(); self.n_original];
        self.code = vec![0; self.n_original];
        refine_colors(g, colmap);
        for stage in self.schedule.clone() {
            if g.vertex_count() == 0 {
                break;
            }
            let changed = match stage {
                Stage::Deg01 => self.deg01(g, colmap, hook),
                Stage::QcEdgeFlip => self.qc_edge_flip(g, colmap),
                Stage::Deg2Match => self.deg2_match(g, colmap, hook),
                Stage::Deg2Unique => self.deg2_unique(g, colmap),
                Stage::ProbeQc => probe::probe_components(self, g, colmap, hook, 1),
                Stage::Probe2Qc => probe::probe_components(self, g, colmap, hook, 2),
                Stage::ReductionLoop => {
                    let mut any = false;
                    loop {
                        let mut round = false;
                        round |= self.deg01(g, colmap, hook);
                        round |= self.deg2_match(g, colmap, hook);
                        round |= self.deg2_unique(g, colmap);
                        round |= self.qc_edge_flip(g, colmap);
                        any |= round;
                        if !round || g.vertex_count() == 0 {
                            break;
                        }
                    }
                    any
                }
            };
            self.s_reductions += changed as usize;
        }
        log::info!(
            "preprocessor: {} -> {} vertices, factor {}",
            self.n_original,
            g.vertex_count(),
            self.grp_sz
        );
    }

    pub fn original_size(&self) -> usize {
        self.n_original
    }

    /// current index -> original index, composing the backward maps
    pub fn translate_back(&self, mut v: usize) -> usize {
        for layer in self.layers.iter().rev() {
            v = layer[v];
        }
        v
    }

    /// lift a reduced-graph permutation to the original vertex set
    pub fn lift(&self, perm: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut full: Vec<usize> = (0..self.n_original).collect();
        for (v, &w) in perm.iter().enumerate() {
            if v == w {
                continue;
            }
            let ov = self.translate_back(v);
            let ow = self.translate_back(w);
            full[ov] = ow;
            let rv = &self.recovery[ov];
            let rw = &self.recovery[ow];
            debug_assert_eq!(rv.len(), rw.len());
            for (a, b) in rv.iter().zip(rw.iter()) {
                full[*a] = *b;
            }
        }
        let supp = support_of(&full);
        (full, supp)
    }

    pub fn lifted_hook<'a>(
        &'a self,
        component_map: Option<&'a [usize]>,
        inner: Option<&'a dyn AutomorphismHook>,
    ) -> LiftedHook<'a> {
        LiftedHook {
            prep: self,
            component_map,
            inner,
        }
    }

    /// emit a certified reduced-graph permutation through the hook at
    /// original indices
    pub(crate) fn emit_current(
        &self,
        hook: Option<&dyn AutomorphismHook>,
        perm: &[usize],
    ) {
        let Some(hook) = hook else { return };
        let (full, supp) = self.lift(perm);
        if !supp.is_empty() {
            hook.automorphism(&full, &supp);
        }
    }

    /// emit the original-level permutation swapping twin structures pairwise
    fn emit_pairs(&self, hook: Option<&dyn AutomorphismHook>, pairs: &[(usize, usize)]) {
        let Some(hook) = hook else { return };
        let mut full: Vec<usize> = (0..self.n_original).collect();
        for &(a, b) in pairs {
            let oa = self.translate_back(a);
            let ob = self.translate_back(b);
            full[oa] = ob;
            full[ob] = oa;
            let ra = &self.recovery[oa];
            let rb = &self.recovery[ob];
            debug_assert_eq!(ra.len(), rb.len());
            for (x, y) in ra.iter().zip(rb.iter()) {
                full[*x] = *y;
                full[*y] = *x;
            }
        }
        let supp = support_of(&full);
        hook.automorphism(&full, &supp);
    }

    /// absorb current vertex `child` into current vertex `parent`: the
    /// child's original id and recovery string are appended to the parent's
    /// recovery, and the parent's structure code folds the child's
    fn absorb(&mut self, parent: usize, child: usize, child_color: usize) {
        let op = self.translate_back(parent);
        let oc = self.translate_back(child);
        let child_recovery = self.recovery[oc].clone();
        self.recovery[op].push(oc);
        self.recovery[op].extend(child_recovery);
        self.code[op] = fold(
            self.code[op],
            mash(self.code[oc] ^ mash(child_color as u64)),
        );
    }

    fn current_code(&self, v: usize) -> u64 {
        self.code[self.translate_back(v)]
    }

    /// remove the vertices not in `keep`, renumber, push a backward layer
    pub(crate) fn shrink(&mut self, g: &mut Graph, colmap: &mut Vec<usize>, keep: &[bool]) {
        let n = g.vertex_count();
        let mut backward = Vec::new();
        let mut forward = vec![usize::MAX; n];
        for v in 0..n {
            if keep[v] {
                forward[v] = backward.len();
                backward.push(v);
            }
        }
        let mut adjacency = Vec::with_capacity(backward.len());
        for &old in &backward {
            adjacency.push(
                g.neighbors(old)
                    .iter()
                    .filter(|&&w| keep[w])
                    .map(|&w| forward[w])
                    .collect::<Vec<_>>(),
            );
        }
        *g = Graph::from_adjacency(&adjacency);
        *colmap = backward.iter().map(|&old| colmap[old]).collect();
        self.layers.push(backward);
    }

    /// degree-0 and degree-1 elimination with twin factors
    fn deg01(
        &mut self,
        g: &mut Graph,
        colmap: &mut Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) -> bool {
        let mut changed_any = false;
        loop {
            let n = g.vertex_count();
            if n == 0 {
                break;
            }
            let mut remove = vec![false; n];
            let mut zeros: Vec<usize> = Vec::new();
            let mut pairs: Vec<(usize, usize)> = Vec::new();
            let mut leaves: HashMap<usize, Vec<usize>> = HashMap::new();
            for v in 0..n {
                match g.degree(v) {
                    0 => zeros.push(v),
                    1 => {
                        let p = g.neighbors(v)[0];
                        if g.degree(p) == 1 {
                            if v < p {
                                pairs.push((v, p));
                            }
                        } else {
                            leaves.entry(p).or_default().push(v);
                        }
                    }
                    _ => {}
                }
            }
            if zeros.is_empty() && pairs.is_empty() && leaves.is_empty() {
                break;
            }

            // isolated vertices: factorial per twin group, then gone
            self.twin_factor_groups(hook, &zeros, colmap);
            for v in zeros {
                remove[v] = true;
            }

            // two-vertex components: a swap inside symmetric pairs, then a
            // factorial over interchangeable pairs
            let mut units: HashMap<(usize, usize, u64, u64), Vec<(usize, usize)>> =
                HashMap::new();
            for (a, b) in pairs {
                let (a, b) = orient_pair(a, b, colmap, self);
                if colmap[a] == colmap[b] && self.current_code(a) == self.current_code(b) {
                    self.grp_sz.multiply(2);
                    self.emit_pairs(hook, &[(a, b)]);
                }
                units
                    .entry((
                        colmap[a],
                        colmap[b],
                        self.current_code(a),
                        self.current_code(b),
                    ))
                    .or_default()
                    .push((a, b));
                remove[a] = true;
                remove[b] = true;
            }
            let mut unit_groups: Vec<_> = units.into_values().collect();
            unit_groups.sort();
            for group in unit_groups {
                self.grp_sz.multiply_factorial(group.len() as u64);
                for window in group.windows(2) {
                    let (a1, b1) = window[0];
                    let (a2, b2) = window[1];
                    self.emit_pairs(hook, &[(a1, a2), (b1, b2)]);
                }
            }

            // hanging leaves: factorial per (parent, class, code) group,
            // then absorbed into the parent's recovery string
            let mut parents: Vec<usize> = leaves.keys().copied().collect();
            parents.sort_unstable();
            for p in parents {
                let mut group = leaves.remove(&p).expect("parent collected");
                group.sort_by_key(|&v| (colmap[v], self.current_code(v), self.translate_back(v)));
                let mut i = 0;
                while i < group.len() {
                    let mut j = i;
                    while j + 1 < group.len()
                        && colmap[group[j + 1]] == colmap[group[i]]
                        && self.current_code(group[j + 1]) == self.current_code(group[i])
                    {
                        j += 1;
                    }
                    self.grp_sz.multiply_factorial((j - i + 1) as u64);
                    for k in i..j {
                        self.emit_pairs(hook, &[(group[k], group[k + 1])]);
                    }
                    i = j + 1;
                }
                for &leaf in &group {
                    self.absorb(p, leaf, colmap[leaf]);
                    remove[leaf] = true;
                }
            }

            self.shrink(g, colmap, &remove.iter().map(|&r| !r).collect::<Vec<_>>());
            refine_colors(g, colmap);
            changed_any = true;
        }
        changed_any
    }

    /// factorial + transpositions over twin groups of structurally equal,
    /// equally colored vertices (no absorption)
    fn twin_factor_groups(
        &mut self,
        hook: Option<&dyn AutomorphismHook>,
        vertices: &[usize],
        colmap: &[usize],
    ) {
        let mut sorted = vertices.to_vec();
        sorted.sort_by_key(|&v| (colmap[v], self.current_code(v), self.translate_back(v)));
        let mut i = 0;
        while i < sorted.len() {
            let mut j = i;
            while j + 1 < sorted.len()
                && colmap[sorted[j + 1]] == colmap[sorted[i]]
                && self.current_code(sorted[j + 1]) == self.current_code(sorted[i])
            {
                j += 1;
            }
            self.grp_sz.multiply_factorial((j - i + 1) as u64);
            for k in i..j {
                self.emit_pairs(hook, &[(sorted[k], sorted[k + 1])]);
            }
            i = j + 1;
        }
    }

    /// parallel subdivision twins: degree-2 vertices sharing both endpoints,
    /// color and code are interchangeable; all but one are absorbed
    fn deg2_match(
        &mut self,
        g: &mut Graph,
        colmap: &mut Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) -> bool {
        let n = g.vertex_count();
        let mut groups: HashMap<(usize, usize, usize, u64), Vec<usize>> = HashMap::new();
        for v in 0..n {
            if g.degree(v) != 2 {
                continue;
            }
            let a = g.neighbors(v)[0];
            let b = g.neighbors(v)[1];
            if a == b || a == v || b == v {
                continue;
            }
            groups
                .entry((a.min(b), a.max(b), colmap[v], self.current_code(v)))
                .or_default()
                .push(v);
        }
        let mut twin_groups: Vec<Vec<usize>> = groups
            .into_values()
            .filter(|group| group.len() >= 2)
            .collect();
        if twin_groups.is_empty() {
            return false;
        }
        twin_groups.sort();
        let mut remove = vec![false; n];
        for group in &mut twin_groups {
            group.sort_by_key(|&v| self.translate_back(v));
            self.grp_sz.multiply_factorial(group.len() as u64);
            for window in group.windows(2) {
                self.emit_pairs(hook, &[(window[0], window[1])]);
            }
            let kept = group[0];
            for &twin in &group[1..] {
                self.absorb(kept, twin, colmap[twin]);
                remove[twin] = true;
            }
        }
        self.shrink(g, colmap, &remove.iter().map(|&r| !r).collect::<Vec<_>>());
        refine_colors(g, colmap);
        true
    }

    /// compress paths of same-colored degree-2 vertices whose endpoints have
    /// distinct colors into a single edge; the interior moves into the
    /// smaller-colored endpoint's recovery string
    fn deg2_unique(&mut self, g: &mut Graph, colmap: &mut Vec<usize>) -> bool {
        let n = g.vertex_count();
        let mut remove = vec![false; n];
        let mut visited = vec![false; n];
        let mut new_edges: Vec<(usize, usize)> = Vec::new();
        let mut changed = false;
        for v in 0..n {
            if visited[v] || remove[v] || g.degree(v) != 2 {
                continue;
            }
            let col = colmap[v];
            let mut chain = vec![v];
            let walk = |start_prev: usize, mut cur: usize, chain: &mut Vec<usize>, front: bool| {
                let mut prev = start_prev;
                while cur != v && g.degree(cur) == 2 && colmap[cur] == col {
                    if front {
                        chain.insert(0, cur);
                    } else {
                        chain.push(cur);
                    }
                    let nbrs = g.neighbors(cur);
                    let next = if nbrs[0] == prev { nbrs[1] } else { nbrs[0] };
                    prev = cur;
                    cur = next;
                }
                cur
            };
            let e1 = walk(v, g.neighbors(v)[0], &mut chain, true);
            for &c in &chain {
                visited[c] = true;
            }
            if e1 == v {
                continue; // closed ring of degree-2 vertices
            }
            let e2 = walk(v, g.neighbors(v)[1], &mut chain, false);
            for &c in &chain {
                visited[c] = true;
            }
            if e2 == v || e1 == e2 {
                continue;
            }
            if colmap[e1] == colmap[e2] || remove[e1] || remove[e2] {
                continue;
            }
            let key = (e1.min(e2), e1.max(e2));
            if g.neighbors(e1).contains(&e2) || new_edges.contains(&key) {
                continue;
            }
            let (endpoint, ordered): (usize, Vec<usize>) = if colmap[e1] < colmap[e2] {
                (e1, chain.clone())
            } else {
                (e2, chain.iter().rev().copied().collect())
            };
            for u in ordered {
                self.absorb(endpoint, u, colmap[u]);
                remove[u] = true;
            }
            new_edges.push(key);
            changed = true;
        }
        if !changed {
            return false;
        }
        let mut adjacency: Vec<Vec<usize>> = (0..n).map(|v| g.neighbors(v).to_vec()).collect();
        for (a, b) in new_edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        *g = Graph::from_adjacency(&adjacency);
        self.shrink(g, colmap, &remove.iter().map(|&r| !r).collect::<Vec<_>>());
        refine_colors(g, colmap);
        true
    }

    /// complete bipartite class pairs (and class cliques) carry no structure
    /// beyond the colors themselves; drop their edges
    fn qc_edge_flip(&mut self, g: &mut Graph, colmap: &mut Vec<usize>) -> bool {
        let n = g.vertex_count();
        if n == 0 {
            return false;
        }
        let mut class_size: HashMap<usize, usize> = HashMap::new();
        for v in 0..n {
            *class_size.entry(colmap[v]).or_insert(0) += 1;
        }
        let mut drop_pairs: Vec<(usize, usize)> = Vec::new();
        let mut seen_class = vec![false; n];
        for v in 0..n {
            let col = colmap[v];
            if seen_class[col] {
                continue;
            }
            seen_class[col] = true;
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for &w in g.neighbors(v) {
                *counts.entry(colmap[w]).or_insert(0) += 1;
            }
            for (&other, &k) in &counts {
                if other == col {
                    if k == class_size[&col] - 1 && k > 0 {
                        drop_pairs.push((col, col));
                    }
                } else if k == class_size[&other] && col < other {
                    drop_pairs.push((col, other));
                }
            }
        }
        if drop_pairs.is_empty() {
            return false;
        }
        let dropped: std::collections::HashSet<(usize, usize)> =
            drop_pairs.into_iter().collect();
        let mut adjacency = Vec::with_capacity(n);
        for v in 0..n {
            adjacency.push(
                g.neighbors(v)
                    .iter()
                    .filter(|&&w| {
                        let key = (colmap[v].min(colmap[w]), colmap[v].max(colmap[w]));
                        !dropped.contains(&key)
                    })
                    .copied()
                    .collect::<Vec<_>>(),
            );
        }
        *g = Graph::from_adjacency(&adjacency);
        refine_colors(g, colmap);
        true
    }
}

/// stable orientation of a two-vertex component
fn orient_pair(a: usize, b: usize, colmap: &[usize], prep: &Preprocessor) -> (usize, usize) {
    let key = |v: usize| (colmap[v], prep.current_code(v), prep.translate_back(v));
    if key(a) <= key(b) {
        (a, b)
    } else {
        (b, a)
    }
}

fn support_of(perm: &[usize]) -> Vec<usize> {
    perm.iter()
        .enumerate()
        .filter(|&(i, &x)| i != x)
        .map(|(i, _)| i)
        .collect()
}

/// refine `colmap` to the equitable partition's class indices
pub(crate) fn refine_colors(g: &Graph, colmap: &mut Vec<usize>) {
    let n = g.vertex_count();
    if n == 0 {
        return;
    }
    let mut coloring = Coloring::from_colors(colmap);
    let mut refiner = Refiner::new(n);
    let mut trace = Trace::new();
    refiner.refine_coloring(g, &mut coloring, &mut trace, None, None, None);
    for v in 0..n {
        colmap[v] = coloring.vertex_to_col[v];
    }
}

/// rewrites reduced-graph generators back to the original vertex set before
/// handing them to the caller
pub struct LiftedHook<'a> {
    prep: &'a Preprocessor,
    /// local -> reduced translation when solving one quotient component
    component_map: Option<&'a [usize]>,
    inner: Option<&'a dyn AutomorphismHook>,
}

impl AutomorphismHook for LiftedHook<'_> {
    fn automorphism(&self, perm: &[usize], supp: &[usize]) {
        let Some(inner) = self.inner else { return };
        let reduced: Vec<usize> = match self.component_map {
            None => perm.to_vec(),
            Some(map) => {
                let mut full: Vec<usize> = (0..self.prep_n_reduced()).collect();
                for &v in supp {
                    full[map[v]] = map[perm[v]];
                }
                full
            }
        };
        let (full, supp) = self.prep.lift(&reduced);
        if !supp.is_empty() {
            inner.automorphism(&full, &supp);
        }
    }
}

impl LiftedHook<'_> {
    fn prep_n_reduced(&self) -> usize {
        match self.prep.layers.last() {
            Some(layer) => layer.len(),
            None => self.prep.n_original,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::CollectingHook;
    use std::sync::Mutex;

    fn run(
        g: &mut Graph,
        colmap: &mut Vec<usize>,
        hook: Option<&dyn AutomorphismHook>,
    ) -> Preprocessor {
        let mut prep = Preprocessor::new(default_schedule());
        prep.reduce(g, colmap, hook);
        prep
    }

    /// every emitted permutation must be an automorphism of the original
    struct CertifyingHook {
        original: Graph,
        colors: Vec<usize>,
        count: Mutex<usize>,
    }

    impl AutomorphismHook for CertifyingHook {
        fn automorphism(&self, perm: &[usize], supp: &[usize]) {
            let mut refiner = Refiner::new(self.original.vertex_count());
            assert!(
                refiner.certify_automorphism(&self.original, &self.colors, perm),
                "emitted permutation is not an automorphism"
            );
            for (i, &x) in perm.iter().enumerate() {
                assert_eq!(supp.contains(&i), i != x);
            }
            *self.count.lock().unwrap() += 1;
        }
    }

    #[test]
    fn isolated_vertices_contribute_factorial() {
        let mut g = Graph::from_edges(5, &[]);
        let mut colmap = vec![0; 5];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        assert_eq!(prep.grp_sz.exponent, 2);
        assert!((prep.grp_sz.mantissa - 1.2).abs() < 0.01);
        assert_eq!(*hook.count.lock().unwrap(), 4);
    }

    #[test]
    fn k2_reduces_to_order_two() {
        let mut g = Graph::from_edges(2, &[(0, 1)]);
        let mut colmap = vec![0; 2];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        assert!((prep.grp_sz.mantissa - 2.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
    }

    #[test]
    fn uniform_path_three_swaps_endpoints() {
        let mut g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let mut colmap = vec![0; 3];
        let hook = CollectingHook::new();
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        assert!((prep.grp_sz.mantissa - 2.0).abs() < 0.01);
        assert!(hook.perms().contains(&vec![2, 1, 0]));
    }

    #[test]
    fn star_leaves_are_symmetric() {
        let mut g = Graph::from_edges(4, &[(0, 1), (0, 2), (0, 3)]);
        let mut colmap = vec![0; 4];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        // 3! = 6
        assert!((prep.grp_sz.mantissa - 6.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
    }

    #[test]
    fn colored_subdivision_path_is_rigid() {
        // a - x - b with distinct endpoint colors compresses to an edge and
        // then to nothing; no symmetry anywhere
        let mut g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let mut colmap = vec![0, 1, 2];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        assert!((prep.grp_sz.mantissa - 1.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
        assert_eq!(*hook.count.lock().unwrap(), 0);
    }

    #[test]
    fn parallel_subdivisions_are_twins() {
        // two parallel paths a-x-b and a-y-b: x and y are interchangeable
        let mut g = Graph::from_edges(4, &[(0, 1), (1, 2), (0, 3), (3, 2)]);
        let mut colmap = vec![0, 1, 2, 1];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert!((prep.grp_sz.mantissa - 2.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
        assert!(*hook.count.lock().unwrap() >= 1);
    }

    #[test]
    fn complete_bipartite_classes_lose_their_edges() {
        // K_{2,3} with sides colored apart: all edges drop, then everything
        // collapses through the degree reductions
        let mut g = Graph::from_edges(5, &[(0, 2), (0, 3), (0, 4), (1, 2), (1, 3), (1, 4)]);
        let mut colmap = vec![0, 0, 1, 1, 1];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        // 2! * 3! = 12
        assert!((prep.grp_sz.mantissa - 1.2).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 1);
    }

    #[test]
    fn lifted_center_swap_splices_recovery_strings() {
        // two joined stars: leaves absorb into their centers, the centers
        // collapse to a symmetric pair, and the emitted center swap must
        // carry the absorbed leaves along
        let mut g =
            Graph::from_edges(6, &[(0, 1), (0, 2), (0, 3), (1, 4), (1, 5)]);
        let mut colmap = vec![0; 6];
        let hook = CertifyingHook {
            original: g.clone(),
            colors: colmap.clone(),
            count: Mutex::new(0),
        };
        let prep = run(&mut g, &mut colmap, Some(&hook));
        assert_eq!(g.vertex_count(), 0);
        // (2! per star) * 2 for the center swap
        assert!((prep.grp_sz.mantissa - 8.0).abs() < 0.01);
        assert_eq!(prep.grp_sz.exponent, 0);
        assert_eq!(*hook.count.lock().unwrap(), 3);
    }
}
