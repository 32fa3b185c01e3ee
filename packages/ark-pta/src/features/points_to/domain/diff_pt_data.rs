//! Incremental points-to store
//!
//! Each key owns two sets: `propagated`, the facts already pushed along the
//! key's outgoing edges, and `diff`, the facts discovered since the last flush.
//! `propagated` only ever grows; deletions are only allowed on `diff`.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::pts_set::PointsToSet;

#[derive(Debug, Clone)]
pub struct DiffPTData<K, D> {
    /// Empty set cloned for every new entry (fixes the backing)
    prototype: D,
    diff_pts: FxHashMap<K, D>,
    propa_pts: FxHashMap<K, D>,
}

impl<K, D> DiffPTData<K, D>
where
    K: Copy + Eq + Hash,
    D: PointsToSet,
{
    pub fn new(prototype: D) -> Self {
        let mut prototype = prototype;
        prototype.clear();
        Self {
            prototype,
            diff_pts: FxHashMap::default(),
            propa_pts: FxHashMap::default(),
        }
    }

    /// Empty set of the configured backing
    pub fn empty_set(&self) -> D {
        self.prototype.clone()
    }

    /// Records `elem` as new for `key`. No-op when it was already propagated.
    pub fn add_pts(&mut self, key: K, elem: u32) -> bool {
        if self.propa_pts.get(&key).is_some_and(|p| p.contains(elem)) {
            return false;
        }
        let proto = &self.prototype;
        self.diff_pts
            .entry(key)
            .or_insert_with(|| proto.clone())
            .insert(elem)
    }

    /// Re-seeds `diff` with everything propagated so far, forcing the key's
    /// outgoing edges to be re-examined. `propagated` is left untouched.
    pub fn reset_elem(&mut self, key: K) -> bool {
        let Some(propa) = self.propa_pts.get(&key) else {
            return false;
        };
        if propa.is_empty() {
            return false;
        }
        let proto = &self.prototype;
        self.diff_pts
            .entry(key)
            .or_insert_with(|| proto.clone())
            .union_with(propa);
        true
    }

    /// `diff(dst) ∪= diff(src) \ propagated(dst)`
    pub fn union_diff_pts(&mut self, dst: K, src: K) -> bool {
        if dst == src {
            return false;
        }
        let Some(src_diff) = self.diff_pts.get(&src) else {
            return false;
        };
        let mut incoming = src_diff.clone();
        self.union_pts_to(dst, &mut incoming)
    }

    /// `diff(dst) ∪= (diff(src) ∪ propagated(src)) \ propagated(dst)`
    pub fn union_pts(&mut self, dst: K, src: K) -> bool {
        if dst == src {
            return false;
        }
        let mut incoming = self.empty_set();
        if let Some(d) = self.diff_pts.get(&src) {
            incoming.union_with(d);
        }
        if let Some(p) = self.propa_pts.get(&src) {
            incoming.union_with(p);
        }
        self.union_pts_to(dst, &mut incoming)
    }

    /// `diff(dst) ∪= pts \ propagated(dst)`; `pts` is consumed as scratch space
    pub fn union_pts_to(&mut self, dst: K, pts: &mut D) -> bool {
        if let Some(p) = self.propa_pts.get(&dst) {
            pts.subtract(p);
        }
        if pts.is_empty() {
            return false;
        }
        let proto = &self.prototype;
        self.diff_pts
            .entry(dst)
            .or_insert_with(|| proto.clone())
            .union_with(pts)
    }

    /// Facts of `diff(src)` not yet propagated to `dst`
    pub fn calculate_diff(&self, src: K, dst: K) -> D {
        let mut result = match self.diff_pts.get(&src) {
            Some(d) => d.clone(),
            None => return self.empty_set(),
        };
        if let Some(p) = self.propa_pts.get(&dst) {
            result.subtract(p);
        }
        result
    }

    /// Moves `diff` into `propagated` and clears `diff`
    pub fn flush(&mut self, key: K) {
        let Some(diff) = self.diff_pts.get_mut(&key) else {
            return;
        };
        if diff.is_empty() {
            return;
        }
        let proto = &self.prototype;
        let propa = self.propa_pts.entry(key).or_insert_with(|| proto.clone());
        propa.union_with(diff);
        diff.clear();
    }

    /// Drops facts from `diff` only
    pub fn remove_diff(&mut self, key: K, elem: u32) -> bool {
        self.diff_pts
            .get_mut(&key)
            .is_some_and(|d| d.remove(elem))
    }

    pub fn clear_diff(&mut self, key: K) {
        if let Some(d) = self.diff_pts.get_mut(&key) {
            d.clear();
        }
    }

    pub fn get_diff_pts(&self, key: K) -> Option<&D> {
        self.diff_pts.get(&key)
    }

    pub fn get_mut_diff_pts(&mut self, key: K) -> &mut D {
        let proto = &self.prototype;
        self.diff_pts.entry(key).or_insert_with(|| proto.clone())
    }

    pub fn get_propa_pts(&self, key: K) -> Option<&D> {
        self.propa_pts.get(&key)
    }

    /// `propagated ∪ diff`
    pub fn get_all_pts(&self, key: K) -> D {
        let mut all = self.empty_set();
        if let Some(p) = self.propa_pts.get(&key) {
            all.union_with(p);
        }
        if let Some(d) = self.diff_pts.get(&key) {
            all.union_with(d);
        }
        all
    }

    pub fn has_diff(&self, key: K) -> bool {
        self.diff_pts.get(&key).is_some_and(|d| !d.is_empty())
    }

    /// Keys with a non-empty propagated set
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.propa_pts
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(k, _)| *k)
    }
}
