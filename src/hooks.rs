use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

/// receives one call per discovered generator. `perm[i] != i` holds exactly
/// for `i` in `supp`. the hook is invoked from whichever worker found the
/// generator, so implementations must be internally synchronized.
pub trait AutomorphismHook: Sync {
    fn automorphism(&self, perm: &[usize], supp: &[usize]);
}

impl<F> AutomorphismHook for F
where
    F: Fn(&[usize], &[usize]) + Sync,
{
    fn automorphism(&self, perm: &[usize], supp: &[usize]) {
        self(perm, supp)
    }
}

/// counts generator calls
#[derive(Default)]
pub struct CountingHook {
    count: AtomicUsize,
}

impl CountingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl AutomorphismHook for CountingHook {
    fn automorphism(&self, _perm: &[usize], _supp: &[usize]) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// collects every emitted generator, for tests and for replaying into a
/// Schreier chain
#[derive(Default)]
pub struct CollectingHook {
    perms: Mutex<Vec<Vec<usize>>>,
}

impl CollectingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn perms(&self) -> Vec<Vec<usize>> {
        self.perms.lock().expect("hook lock").clone()
    }
}

impl AutomorphismHook for CollectingHook {
    fn automorphism(&self, perm: &[usize], _supp: &[usize]) {
        self.perms.lock().expect("hook lock").push(perm.to_vec());
    }
}
