use std::sync::Arc;

/// mixes a single value before it enters the accumulator
pub fn mash(x: u64) -> u64 {
    let mut x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// rolling fold: rotate the accumulator by a byte and xor the next value in
pub fn fold(acc: u64, x: u64) -> u64 {
    let high = acc & 0xff00_0000_0000_0000;
    ((acc << 8) ^ (high >> 56)) ^ x
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deviation {
    pub pos: usize,
    pub val: u64,
    pub acc: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceCompare {
    Equal,
    Diverged(Deviation),
}

/// append-only invariant of a root-to-leaf walk.
///
/// in recording mode every `op` value is stored; in comparison mode
/// (`set_compare`) values are checked against a reference instead. the first
/// mismatch is remembered as a `Deviation`; everything pushed afterwards is
/// folded into the deviation accumulator, so walks failing the same way hash
/// identically. `never_fail` keeps a diverged walk alive to its leaf; the
/// deviation budget keeps a bounded tail of post-divergence values flowing
/// into the deviation hash before `op` starts returning false.
#[derive(Clone, Debug)]
pub struct Trace {
    data: Vec<u64>,
    compare: Option<Arc<Vec<u64>>>,
    pos: usize,
    acc: u64,
    fail: Option<Deviation>,
    no_write: bool,
    never_fail: bool,
    deviation_budget: usize,
    deviation_left: usize,
}

impl Trace {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            compare: None,
            pos: 0,
            acc: 0,
            fail: None,
            no_write: false,
            never_fail: false,
            deviation_budget: 0,
            deviation_left: 0,
        }
    }

    /// append (or check) the next invariant value; false means the walk can
    /// be abandoned
    pub fn op(&mut self, x: u64) -> bool {
        self.acc = fold(self.acc, mash(x));
        let index = self.pos;
        self.pos += 1;
        if !self.no_write {
            self.data.push(x);
        }
        let matches = match &self.compare {
            None => true,
            Some(reference) => {
                self.fail.is_none() && index < reference.len() && reference[index] == x
            }
        };
        if matches {
            return true;
        }
        match &mut self.fail {
            None => {
                self.fail = Some(Deviation {
                    pos: index,
                    val: x,
                    acc: mash(x),
                });
                self.deviation_left = self.deviation_budget;
            }
            Some(deviation) => {
                deviation.acc = fold(deviation.acc, mash(x));
            }
        }
        if self.never_fail {
            return true;
        }
        if self.deviation_left > 0 {
            self.deviation_left -= 1;
            return true;
        }
        false
    }

    /// switch to comparison mode against `reference`
    pub fn set_compare(&mut self, reference: Arc<Vec<u64>>) {
        self.compare = Some(reference);
        self.no_write = true;
    }

    pub fn set_never_fail(&mut self, never_fail: bool) {
        self.never_fail = never_fail;
    }

    pub fn set_deviation_budget(&mut self, budget: usize) {
        self.deviation_budget = budget;
    }

    pub fn deviation(&self) -> Option<&Deviation> {
        self.fail.as_ref()
    }

    pub fn diverged(&self) -> bool {
        self.fail.is_some()
    }

    pub fn result(&self) -> TraceCompare {
        match &self.fail {
            None => TraceCompare::Equal,
            Some(d) => TraceCompare::Diverged(d.clone()),
        }
    }

    pub fn reset_deviation(&mut self) {
        self.fail = None;
        self.deviation_left = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn acc(&self) -> u64 {
        self.acc
    }

    /// share the recorded sequence; only meaningful in recording mode
    pub fn recorded(&self) -> Arc<Vec<u64>> {
        Arc::new(self.data.clone())
    }

    /// rewind to an earlier point of the walk (reversible search)
    pub fn rewind(&mut self, pos: usize, acc: u64) {
        debug_assert!(pos <= self.pos);
        if !self.no_write {
            self.data.truncate(pos);
        }
        self.pos = pos;
        self.acc = acc;
        if self.fail.as_ref().is_some_and(|d| d.pos >= pos) {
            self.fail = None;
        }
    }

    /// restart the walk, keeping mode flags and the compare reference
    pub fn restart(&mut self) {
        self.data.clear();
        self.pos = 0;
        self.acc = 0;
        self.fail = None;
        self.deviation_left = 0;
    }

    /// skip ahead over a known-matching region of the reference, folding the
    /// skipped values into the accumulator. used after a cell-count
    /// early-out: the skipped suffix holds only class markers that a full
    /// refinement would have matched.
    pub fn fast_forward(&mut self, to: usize) {
        debug_assert!(self.no_write);
        if let Some(reference) = self.compare.clone() {
            while self.pos < to && self.pos < reference.len() {
                self.acc = fold(self.acc, mash(reference[self.pos]));
                self.pos += 1;
            }
        }
    }

    /// jump to a known position of a compared walk; state restores in
    /// comparison mode carry no data of their own
    pub fn resume(&mut self, pos: usize, acc: u64) {
        debug_assert!(self.no_write);
        self.pos = pos;
        self.acc = acc;
        self.fail = None;
        self.deviation_left = 0;
    }

    /// restart and install recorded data (state restore)
    pub fn restore(&mut self, data: &Arc<Vec<u64>>, acc: u64) {
        self.data = (**data).clone();
        self.pos = self.data.len();
        self.acc = acc;
        self.fail = None;
        self.deviation_left = 0;
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(values: &[u64]) -> Trace {
        let mut t = Trace::new();
        for &v in values {
            assert!(t.op(v));
        }
        t
    }

    #[test]
    fn equal_walks_have_equal_hashes() {
        let a = record(&[3, 1, 4, 1, 5]);
        let b = record(&[3, 1, 4, 1, 5]);
        assert_eq!(a.acc(), b.acc());
        assert_eq!(a.result(), TraceCompare::Equal);
    }

    #[test]
    fn comparison_detects_first_mismatch() {
        let reference = record(&[3, 1, 4, 1, 5]).recorded();
        let mut t = Trace::new();
        t.set_compare(reference);
        assert!(t.op(3));
        assert!(t.op(1));
        assert!(!t.op(9));
        let d = t.deviation().unwrap();
        assert_eq!(d.pos, 2);
        assert_eq!(d.val, 9);
    }

    #[test]
    fn identical_deviations_fold_identically() {
        let reference = record(&[3, 1, 4, 1, 5]).recorded();
        let mut walk = |values: &[u64]| {
            let mut t = Trace::new();
            t.set_compare(reference.clone());
            t.set_never_fail(true);
            for &v in values {
                t.op(v);
            }
            t.deviation().unwrap().clone()
        };
        let a = walk(&[3, 1, 9, 2, 5]);
        let b = walk(&[3, 1, 9, 2, 7]);
        let c = walk(&[3, 1, 8, 2, 5]);
        assert_eq!(a.pos, b.pos);
        assert_ne!(a.acc, b.acc);
        assert_ne!(a.acc, c.acc);
        let again = walk(&[3, 1, 9, 2, 5]);
        assert_eq!(a.acc, again.acc);
    }

    #[test]
    fn deviation_budget_keeps_walk_alive() {
        let reference = record(&[3, 1, 4]).recorded();
        let mut t = Trace::new();
        t.set_deviation_budget(2);
        t.set_compare(reference);
        assert!(t.op(3));
        assert!(t.op(9)); // first mismatch, budget 2
        assert!(t.op(9)); // budget 1
        assert!(!t.op(9)); // exhausted
    }

    #[test]
    fn rewind_clears_later_deviation() {
        let reference = record(&[3, 1, 4]).recorded();
        let mut t = Trace::new();
        t.set_compare(reference);
        t.op(3);
        let pos = t.position();
        let acc = t.acc();
        t.op(9);
        assert!(t.diverged());
        t.rewind(pos, acc);
        assert!(!t.diverged());
        assert!(t.op(1));
    }
}
