use super::Perm;
use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::ds::Orbit;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sift {
    /// the permutation lies in the currently known group
    Absorbed,
    /// the permutation enlarged the group at this chain level
    NewGenerator { level: usize },
}

struct Level {
    fixed: usize,
    /// orbit upper bound (the base color class size), when known
    target: Option<usize>,
    orbit: Vec<usize>,
    in_orbit: Vec<bool>,
    /// Schreier vector: point -> (generator index, predecessor point);
    /// coset representatives are composed on demand
    edge: Vec<(usize, usize)>,
    /// generators fixing every earlier base point
    gens: Vec<Arc<Perm>>,
}

impl Level {
    fn new(domain: usize, fixed: usize, target: Option<usize>) -> Self {
        let mut in_orbit = vec![false; domain];
        in_orbit[fixed] = true;
        Self {
            fixed,
            target,
            orbit: vec![fixed],
            in_orbit,
            edge: vec![(usize::MAX, usize::MAX); domain],
            gens: Vec::new(),
        }
    }

    fn close_orbit(&mut self) {
        for p in self.in_orbit.iter_mut() {
            *p = false;
        }
        self.orbit.clear();
        self.orbit.push(self.fixed);
        self.in_orbit[self.fixed] = true;
        let mut head = 0;
        while head < self.orbit.len() {
            let y = self.orbit[head];
            head += 1;
            for (gi, g) in self.gens.iter().enumerate() {
                let z = g.apply(y);
                if !self.in_orbit[z] {
                    self.in_orbit[z] = true;
                    self.edge[z] = (gi, y);
                    self.orbit.push(z);
                }
            }
        }
    }

    /// coset representative mapping `fixed` to `x`
    fn representative(&self, x: usize, domain: usize) -> Perm {
        let mut word = Vec::new();
        let mut cur = x;
        while cur != self.fixed {
            let (gi, pred) = self.edge[cur];
            word.push(gi);
            cur = pred;
        }
        let mut rep = Perm::identity(domain);
        for &gi in word.iter().rev() {
            rep = self.gens[gi].compose(&rep);
        }
        rep
    }
}

/// Schreier-Sims stabilizer chain along the search base.
///
/// shared across workers: one mutex per level, an append-only generator list
/// behind a read-write lock. `sift` reduces a candidate through the chain and
/// either absorbs it or records a new generator. the probabilistic abort
/// criterion fires after `error_bound` consecutive absorptions (error
/// probability at most 2^-error_bound); the deterministic criterion fires
/// when every orbit saturates its base color class.
pub struct Schreier {
    domain: usize,
    levels: RwLock<Vec<Mutex<Level>>>,
    gens: RwLock<Vec<Arc<Perm>>>,
    consecutive_fails: AtomicUsize,
    error_bound: usize,
    /// treat residues that fix the whole base as absorbed instead of
    /// extending the base; the solver accounts for the base stabilizer
    /// separately (depth-first certificates)
    cap_residues: bool,
}

impl Schreier {
    pub fn new(domain: usize) -> Self {
        Self {
            domain,
            levels: RwLock::new(Vec::new()),
            gens: RwLock::new(Vec::new()),
            consecutive_fails: AtomicUsize::new(0),
            error_bound: 10,
            cap_residues: false,
        }
    }

    pub fn set_error_bound(&mut self, bound: usize) {
        self.error_bound = bound;
    }

    pub fn set_cap_residues(&mut self, cap: bool) {
        self.cap_residues = cap;
    }

    /// install a base; forgets all generators. previously found generators
    /// can be kept across a reset by re-sifting `generators()`.
    pub fn set_base(&mut self, base: &[usize], targets: &[usize]) {
        let mut levels = self.levels.write().expect("levels lock");
        levels.clear();
        for (k, &b) in base.iter().enumerate() {
            levels.push(Mutex::new(Level::new(
                self.domain,
                b,
                targets.get(k).copied(),
            )));
        }
        self.gens.write().expect("gens lock").clear();
        self.consecutive_fails.store(0, Ordering::Relaxed);
    }

    pub fn base_size(&self) -> usize {
        self.levels.read().expect("levels lock").len()
    }

    pub fn get_fixed_point(&self, level: usize) -> usize {
        self.levels.read().expect("levels lock")[level]
            .lock()
            .expect("level lock")
            .fixed
    }

    pub fn get_fixed_orbit_size(&self, level: usize) -> usize {
        self.levels.read().expect("levels lock")[level]
            .lock()
            .expect("level lock")
            .orbit
            .len()
    }

    pub fn get_fixed_orbit(&self, level: usize) -> Vec<usize> {
        self.levels.read().expect("levels lock")[level]
            .lock()
            .expect("level lock")
            .orbit
            .clone()
    }

    pub fn generators(&self) -> Vec<Arc<Perm>> {
        self.gens.read().expect("gens lock").clone()
    }

    pub fn generator_count(&self) -> usize {
        self.gens.read().expect("gens lock").len()
    }

    /// reduce `p` through the chain. either it is absorbed, or its residue
    /// becomes a generator at the first level whose orbit it escapes.
    pub fn sift(&self, mut p: Perm) -> Sift {
        let base_len = self.base_size();
        for k in 0..base_len {
            enum Step {
                Fixed,
                Reduce(Perm),
                New,
            }
            let step = {
                let levels = self.levels.read().expect("levels lock");
                let lvl = levels[k].lock().expect("level lock");
                let x = p.apply(lvl.fixed);
                if x == lvl.fixed {
                    Step::Fixed
                } else if lvl.in_orbit[x] {
                    Step::Reduce(lvl.representative(x, self.domain))
                } else {
                    Step::New
                }
            };
            match step {
                Step::Fixed => continue,
                Step::Reduce(rep) => p = rep.inverse().compose(&p),
                Step::New => {
                    self.add_generator(k, p);
                    self.consecutive_fails.store(0, Ordering::Relaxed);
                    return Sift::NewGenerator { level: k };
                }
            }
        }
        if p.is_identity() || self.cap_residues {
            self.consecutive_fails.fetch_add(1, Ordering::Relaxed);
            Sift::Absorbed
        } else {
            // the base does not yet distinguish this residue; extend it
            let moved = (0..self.domain)
                .find(|&v| p.apply(v) != v)
                .expect("non-identity residue moves a point");
            let level = {
                let mut levels = self.levels.write().expect("levels lock");
                levels.push(Mutex::new(Level::new(self.domain, moved, None)));
                levels.len() - 1
            };
            self.add_generator(level, p);
            self.consecutive_fails.store(0, Ordering::Relaxed);
            Sift::NewGenerator { level }
        }
    }

    /// the residue fixes base points 0..level, so it belongs to the
    /// stabilizer generators of every level up to and including `level`
    fn add_generator(&self, level: usize, p: Perm) {
        let arc = Arc::new(p);
        self.gens.write().expect("gens lock").push(arc.clone());
        let levels = self.levels.read().expect("levels lock");
        for lvl in levels.iter().take(level + 1) {
            let mut lvl = lvl.lock().expect("level lock");
            lvl.gens.push(arc.clone());
            lvl.close_orbit();
        }
    }

    /// order of the currently known group: product of orbit sizes
    pub fn group_size(&self) -> GroupSize {
        let mut size = GroupSize::one();
        let levels = self.levels.read().expect("levels lock");
        for lvl in levels.iter() {
            size.multiply(lvl.lock().expect("level lock").orbit.len() as u64);
        }
        size
    }

    /// every orbit saturates its base color class: the group cannot grow
    pub fn deterministic_abort_criterion(&self) -> bool {
        let levels = self.levels.read().expect("levels lock");
        !levels.is_empty()
            && levels.iter().all(|lvl| {
                let lvl = lvl.lock().expect("level lock");
                lvl.target.is_some_and(|t| lvl.orbit.len() == t)
            })
    }

    pub fn probabilistic_abort_criterion(&self) -> bool {
        self.consecutive_fails.load(Ordering::Relaxed) >= self.error_bound
    }

    pub fn any_abort_criterion(&self) -> bool {
        self.deterministic_abort_criterion() || self.probabilistic_abort_criterion()
    }

    pub fn reset_probabilistic_criterion(&self) {
        self.consecutive_fails.store(0, Ordering::Relaxed);
    }

    /// orbit partition under the pointwise stabilizer of the first `depth`
    /// base points
    pub fn get_stabilizer_orbit(&self, depth: usize, orbit: &mut Orbit) {
        let prefix: Vec<usize> = {
            let levels = self.levels.read().expect("levels lock");
            levels
                .iter()
                .take(depth)
                .map(|lvl| lvl.lock().expect("level lock").fixed)
                .collect()
        };
        for g in self.generators() {
            if prefix.iter().all(|&b| g.apply(b) == b) {
                orbit.add_permutation(g.as_slice());
            }
        }
    }

    /// base vertices whose chain orbit covers their whole color class; the
    /// inprocessor can individualize these for free (factor = class size)
    pub fn determine_potential_individualization(
        &self,
        coloring: &Coloring,
    ) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let levels = self.levels.read().expect("levels lock");
        for lvl in levels.iter() {
            let lvl = lvl.lock().expect("level lock");
            let v = lvl.fixed;
            let orbit_sz = lvl.orbit.len();
            let cell_sz = coloring.cell_size(coloring.vertex_to_col[v]);
            if orbit_sz > 1 && orbit_sz == cell_sz {
                out.push((v, orbit_sz));
            }
        }
        out
    }
}
