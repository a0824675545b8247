use super::Controller;
use super::SavedState;
use crate::ds::Coloring;
use crate::ds::GroupSize;
use crate::graph::Graph;
use crate::SELECTOR_CACHE_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    First,
    Largest,
    Smallest,
    /// largest with a candidate cache, amortized O(1) on refining colorings
    Traces,
}

/// chooses the next color class to individualize
#[derive(Clone, Debug)]
pub struct Selector {
    policy: Policy,
    cache: Vec<usize>,
    skipstart: usize,
}

impl Selector {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            cache: Vec::new(),
            skipstart: 0,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// forget per-walk state; call when starting a new root-to-leaf walk
    pub fn empty_cache(&mut self) {
        self.cache.clear();
        self.skipstart = 0;
    }

    /// starting index of the next class to individualize, None when discrete
    pub fn select(&mut self, c: &Coloring) -> Option<usize> {
        match self.policy {
            Policy::First => self.select_first(c),
            Policy::Largest => self.select_largest(c),
            Policy::Smallest => self.select_smallest(c),
            Policy::Traces => self.select_cached(c),
        }
    }

    fn select_first(&mut self, c: &Coloring) -> Option<usize> {
        let n = c.domain_size();
        let mut i = self.skipstart;
        while i < n {
            let sz = c.cell_size(i);
            if sz > 1 {
                self.skipstart = i;
                return Some(i);
            }
            i += sz;
        }
        None
    }

    fn select_largest(&mut self, c: &Coloring) -> Option<usize> {
        let n = c.domain_size();
        let mut best: Option<(usize, usize)> = None;
        let mut i = 0;
        while i < n {
            let sz = c.cell_size(i);
            if sz > 1 && best.is_none_or(|(bsz, _)| sz > bsz) {
                best = Some((sz, i));
            }
            i += sz;
        }
        best.map(|(_, i)| i)
    }

    fn select_smallest(&mut self, c: &Coloring) -> Option<usize> {
        let n = c.domain_size();
        let mut best: Option<(usize, usize)> = None;
        let mut i = 0;
        while i < n {
            let sz = c.cell_size(i);
            if sz > 1 && best.is_none_or(|(bsz, _)| sz < bsz) {
                best = Some((sz, i));
            }
            i += sz;
        }
        best.map(|(_, i)| i)
    }

    /// class starts are stable under splitting, so cached candidates stay
    /// valid until their cell shrinks to a singleton
    fn select_cached(&mut self, c: &Coloring) -> Option<usize> {
        self.cache.retain(|&i| c.cell_size(i) > 1);
        if let Some(&best) = self
            .cache
            .iter()
            .max_by_key(|&&i| (c.cell_size(i), std::cmp::Reverse(i)))
        {
            return Some(best);
        }
        let n = c.domain_size();
        let mut candidates: Vec<usize> = Vec::new();
        let mut i = 0;
        while i < n {
            let sz = c.cell_size(i);
            if sz > 1 {
                candidates.push(i);
            }
            i += sz;
        }
        candidates.sort_by_key(|&i| (std::cmp::Reverse(c.cell_size(i)), i));
        candidates.truncate(SELECTOR_CACHE_SIZE);
        self.cache = candidates;
        self.cache.first().copied()
    }
}

/// runs a short tournament between selector policies: probe a full
/// root-to-leaf walk under each candidate and keep the one with the shortest
/// (base, trace). the winning walk doubles as the canonical base recording;
/// the controller is left at that leaf.
pub struct SelectorFactory;

impl SelectorFactory {
    pub fn tournament(
        g: &Graph,
        ctrl: &mut Controller,
        root: &SavedState,
        restarts: u32,
        forced: Option<Policy>,
    ) -> (Selector, GroupSize) {
        let forced_slice;
        let candidates: &[Policy] = match forced {
            Some(policy) => {
                forced_slice = [policy];
                &forced_slice
            }
            None => match restarts {
                0 => &[Policy::First, Policy::Smallest, Policy::Largest],
                1 => &[Policy::Smallest, Policy::Largest, Policy::Traces],
                _ => &[Policy::Traces],
            },
        };
        let mut winner = candidates[0];
        let mut best: Option<(usize, usize)> = None;
        for &policy in candidates {
            let mut selector = Selector::new(policy);
            Self::probe(g, ctrl, root, &mut selector);
            let score = (ctrl.base.len(), ctrl.trace.position());
            if best.is_none_or(|b| score < b) {
                best = Some(score);
                winner = policy;
            }
        }
        let mut selector = Selector::new(winner);
        Self::probe(g, ctrl, root, &mut selector);
        let mut estimate = GroupSize::one();
        for entry in &ctrl.base {
            estimate.multiply(entry.color_size as u64);
        }
        selector.empty_cache();
        (selector, estimate)
    }

    fn probe(g: &Graph, ctrl: &mut Controller, root: &SavedState, selector: &mut Selector) {
        ctrl.load_state(root);
        selector.empty_cache();
        while let Some(cell) = selector.select(&ctrl.c) {
            let v = ctrl.c.lab[cell];
            ctrl.move_to_child(g, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coloring() -> Coloring {
        // classes: {0,1,2} {3} {4,5}
        Coloring::from_colors(&[0, 0, 0, 1, 2, 2])
    }

    #[test]
    fn first_largest_smallest() {
        let c = coloring();
        assert_eq!(Selector::new(Policy::First).select(&c), Some(0));
        assert_eq!(Selector::new(Policy::Largest).select(&c), Some(0));
        assert_eq!(Selector::new(Policy::Smallest).select(&c), Some(4));
    }

    #[test]
    fn discrete_yields_none() {
        let c = Coloring::from_colors(&[0, 1, 2]);
        assert_eq!(Selector::new(Policy::First).select(&c), None);
        assert_eq!(Selector::new(Policy::Traces).select(&c), None);
    }

    #[test]
    fn cached_policy_tracks_shrinking_cells() {
        let mut c = coloring();
        let mut s = Selector::new(Policy::Traces);
        assert_eq!(s.select(&c), Some(0));
        // individualize within the big cell; cached candidate stays valid
        c.individualize(0);
        assert_eq!(s.select(&c), Some(0));
        c.individualize(1);
        // the big cell is used up; falls back to {4,5}
        assert_eq!(s.select(&c), Some(4));
    }
}
