//! Points-to sets
//!
//! Opaque integer sets of heap-object node ids with two interchangeable backings:
//! - [`HashPtsSet`]: `FxHashSet<u32>`, cheap for small and debug runs
//! - [`BitVecPtsSet`]: sparse bit vector of sorted 64-bit words, compact for
//!   whole-program runs where ids cluster
//!
//! [`PtsSet`] selects the backing at runtime from the configuration.

use std::cmp::Ordering;
use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::PtsBacking;
use crate::shared::constants::pts::BITS_PER_WORD;

/// Set algebra shared by every backing
pub trait PointsToSet: Clone + fmt::Debug {
    fn contains(&self, elem: u32) -> bool;

    /// Returns true if `elem` was not present
    fn insert(&mut self, elem: u32) -> bool;

    /// Returns true if `elem` was present
    fn remove(&mut self, elem: u32) -> bool;

    /// `self ∪= other`; returns true if `self` grew
    fn union_with(&mut self, other: &Self) -> bool;

    /// `self \= other`
    fn subtract(&mut self, other: &Self);

    /// `self ∩= other`
    fn intersect_with(&mut self, other: &Self);

    fn is_superset(&self, other: &Self) -> bool;

    fn intersects(&self, other: &Self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Elements in ascending order
    fn to_sorted_vec(&self) -> Vec<u32>;

    /// Empty set with the same backing
    fn empty_like(&self) -> Self;
}

// ═══════════════════════════════════════════════════════════════════════════
// Hash set backing
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashPtsSet {
    elems: FxHashSet<u32>,
}

impl HashPtsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.elems.iter().copied()
    }
}

impl FromIterator<u32> for HashPtsSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            elems: iter.into_iter().collect(),
        }
    }
}

impl PointsToSet for HashPtsSet {
    #[inline]
    fn contains(&self, elem: u32) -> bool {
        self.elems.contains(&elem)
    }

    #[inline]
    fn insert(&mut self, elem: u32) -> bool {
        self.elems.insert(elem)
    }

    #[inline]
    fn remove(&mut self, elem: u32) -> bool {
        self.elems.remove(&elem)
    }

    fn union_with(&mut self, other: &Self) -> bool {
        let before = self.elems.len();
        self.elems.extend(other.elems.iter().copied());
        self.elems.len() != before
    }

    fn subtract(&mut self, other: &Self) {
        if other.elems.is_empty() {
            return;
        }
        self.elems.retain(|e| !other.elems.contains(e));
    }

    fn intersect_with(&mut self, other: &Self) {
        self.elems.retain(|e| other.elems.contains(e));
    }

    fn is_superset(&self, other: &Self) -> bool {
        self.elems.is_superset(&other.elems)
    }

    fn intersects(&self, other: &Self) -> bool {
        let (small, large) = if self.elems.len() <= other.elems.len() {
            (&self.elems, &other.elems)
        } else {
            (&other.elems, &self.elems)
        };
        small.iter().any(|e| large.contains(e))
    }

    #[inline]
    fn len(&self) -> usize {
        self.elems.len()
    }

    fn clear(&mut self) {
        self.elems.clear();
    }

    fn to_sorted_vec(&self) -> Vec<u32> {
        let mut v: Vec<u32> = self.elems.iter().copied().collect();
        v.sort_unstable();
        v
    }

    fn empty_like(&self) -> Self {
        Self::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sparse bit vector backing
// ═══════════════════════════════════════════════════════════════════════════

/// Sparse bit vector: sorted `(block, word)` pairs, no zero words stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVecPtsSet {
    words: Vec<(u32, u64)>,
}

impl BitVecPtsSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn split(elem: u32) -> (u32, u64) {
        (elem / BITS_PER_WORD, 1u64 << (elem % BITS_PER_WORD))
    }

    #[inline]
    fn find(&self, block: u32) -> Result<usize, usize> {
        self.words.binary_search_by_key(&block, |&(b, _)| b)
    }

    /// Iterate over elements in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().flat_map(|&(block, word)| {
            let base = block * BITS_PER_WORD;
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros();
                bits &= bits - 1;
                Some(base + tz)
            })
        })
    }
}

impl FromIterator<u32> for BitVecPtsSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::default();
        for e in iter {
            set.insert(e);
        }
        set
    }
}

impl PointsToSet for BitVecPtsSet {
    #[inline]
    fn contains(&self, elem: u32) -> bool {
        let (block, mask) = Self::split(elem);
        match self.find(block) {
            Ok(pos) => self.words[pos].1 & mask != 0,
            Err(_) => false,
        }
    }

    fn insert(&mut self, elem: u32) -> bool {
        let (block, mask) = Self::split(elem);
        match self.find(block) {
            Ok(pos) => {
                let word = &mut self.words[pos].1;
                let added = *word & mask == 0;
                *word |= mask;
                added
            }
            Err(pos) => {
                self.words.insert(pos, (block, mask));
                true
            }
        }
    }

    fn remove(&mut self, elem: u32) -> bool {
        let (block, mask) = Self::split(elem);
        match self.find(block) {
            Ok(pos) => {
                let word = &mut self.words[pos].1;
                let present = *word & mask != 0;
                *word &= !mask;
                if *word == 0 {
                    self.words.remove(pos);
                }
                present
            }
            Err(_) => false,
        }
    }

    /// O(n + m) merge of sorted word lists
    fn union_with(&mut self, other: &Self) -> bool {
        if other.words.is_empty() {
            return false;
        }
        if self.words.is_empty() {
            self.words = other.words.clone();
            return true;
        }

        let mut merged = Vec::with_capacity(self.words.len() + other.words.len());
        let mut changed = false;
        let (mut i, mut j) = (0, 0);
        while i < self.words.len() && j < other.words.len() {
            let (a_block, a_word) = self.words[i];
            let (b_block, b_word) = other.words[j];
            match a_block.cmp(&b_block) {
                Ordering::Less => {
                    merged.push((a_block, a_word));
                    i += 1;
                }
                Ordering::Greater => {
                    merged.push((b_block, b_word));
                    changed = true;
                    j += 1;
                }
                Ordering::Equal => {
                    let w = a_word | b_word;
                    changed |= w != a_word;
                    merged.push((a_block, w));
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.words[i..]);
        if j < other.words.len() {
            changed = true;
            merged.extend_from_slice(&other.words[j..]);
        }

        self.words = merged;
        changed
    }

    fn subtract(&mut self, other: &Self) {
        if self.words.is_empty() || other.words.is_empty() {
            return;
        }
        let mut result = Vec::with_capacity(self.words.len());
        let mut j = 0;
        for &(block, word) in &self.words {
            while j < other.words.len() && other.words[j].0 < block {
                j += 1;
            }
            let w = if j < other.words.len() && other.words[j].0 == block {
                word & !other.words[j].1
            } else {
                word
            };
            if w != 0 {
                result.push((block, w));
            }
        }
        self.words = result;
    }

    fn intersect_with(&mut self, other: &Self) {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.words.len() && j < other.words.len() {
            match self.words[i].0.cmp(&other.words[j].0) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    let w = self.words[i].1 & other.words[j].1;
                    if w != 0 {
                        result.push((self.words[i].0, w));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        self.words = result;
    }

    fn is_superset(&self, other: &Self) -> bool {
        let mut i = 0;
        for &(block, word) in &other.words {
            while i < self.words.len() && self.words[i].0 < block {
                i += 1;
            }
            if i >= self.words.len() || self.words[i].0 != block {
                return false;
            }
            if self.words[i].1 & word != word {
                return false;
            }
        }
        true
    }

    fn intersects(&self, other: &Self) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.words.len() && j < other.words.len() {
            match self.words[i].0.cmp(&other.words[j].0) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    if self.words[i].1 & other.words[j].1 != 0 {
                        return true;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        false
    }

    fn len(&self) -> usize {
        self.words.iter().map(|&(_, w)| w.count_ones() as usize).sum()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn clear(&mut self) {
        self.words.clear();
    }

    fn to_sorted_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    fn empty_like(&self) -> Self {
        Self::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Runtime-selected backing
// ═══════════════════════════════════════════════════════════════════════════

/// Points-to set whose backing is chosen by [`PtsBacking`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtsSet {
    Hash(HashPtsSet),
    BitVec(BitVecPtsSet),
}

impl PtsSet {
    /// Empty set of the configured backing
    pub fn new(backing: PtsBacking) -> Self {
        match backing {
            PtsBacking::HashSet => PtsSet::Hash(HashPtsSet::default()),
            PtsBacking::BitVector => PtsSet::BitVec(BitVecPtsSet::default()),
        }
    }

    pub fn backing(&self) -> PtsBacking {
        match self {
            PtsSet::Hash(_) => PtsBacking::HashSet,
            PtsSet::BitVec(_) => PtsBacking::BitVector,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            PtsSet::Hash(s) => Box::new(s.iter()),
            PtsSet::BitVec(s) => Box::new(s.iter()),
        }
    }
}

impl Default for PtsSet {
    fn default() -> Self {
        PtsSet::Hash(HashPtsSet::default())
    }
}

impl PointsToSet for PtsSet {
    fn contains(&self, elem: u32) -> bool {
        match self {
            PtsSet::Hash(s) => s.contains(elem),
            PtsSet::BitVec(s) => s.contains(elem),
        }
    }

    fn insert(&mut self, elem: u32) -> bool {
        match self {
            PtsSet::Hash(s) => s.insert(elem),
            PtsSet::BitVec(s) => s.insert(elem),
        }
    }

    fn remove(&mut self, elem: u32) -> bool {
        match self {
            PtsSet::Hash(s) => s.remove(elem),
            PtsSet::BitVec(s) => s.remove(elem),
        }
    }

    fn union_with(&mut self, other: &Self) -> bool {
        match (self, other) {
            (PtsSet::Hash(a), PtsSet::Hash(b)) => a.union_with(b),
            (PtsSet::BitVec(a), PtsSet::BitVec(b)) => a.union_with(b),
            (a, b) => {
                let mut changed = false;
                for e in b.iter() {
                    changed |= a.insert(e);
                }
                changed
            }
        }
    }

    fn subtract(&mut self, other: &Self) {
        match (self, other) {
            (PtsSet::Hash(a), PtsSet::Hash(b)) => a.subtract(b),
            (PtsSet::BitVec(a), PtsSet::BitVec(b)) => a.subtract(b),
            (a, b) => {
                for e in b.iter() {
                    a.remove(e);
                }
            }
        }
    }

    fn intersect_with(&mut self, other: &Self) {
        match (self, other) {
            (PtsSet::Hash(a), PtsSet::Hash(b)) => a.intersect_with(b),
            (PtsSet::BitVec(a), PtsSet::BitVec(b)) => a.intersect_with(b),
            (a, b) => {
                let dropped: Vec<u32> = a.iter().filter(|&e| !b.contains(e)).collect();
                for e in dropped {
                    a.remove(e);
                }
            }
        }
    }

    fn is_superset(&self, other: &Self) -> bool {
        match (self, other) {
            (PtsSet::Hash(a), PtsSet::Hash(b)) => a.is_superset(b),
            (PtsSet::BitVec(a), PtsSet::BitVec(b)) => a.is_superset(b),
            (a, b) => b.iter().all(|e| a.contains(e)),
        }
    }

    fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (PtsSet::Hash(a), PtsSet::Hash(b)) => a.intersects(b),
            (PtsSet::BitVec(a), PtsSet::BitVec(b)) => a.intersects(b),
            (a, b) => b.iter().any(|e| a.contains(e)),
        }
    }

    fn len(&self) -> usize {
        match self {
            PtsSet::Hash(s) => s.len(),
            PtsSet::BitVec(s) => s.len(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            PtsSet::Hash(s) => s.is_empty(),
            PtsSet::BitVec(s) => s.is_empty(),
        }
    }

    fn clear(&mut self) {
        match self {
            PtsSet::Hash(s) => s.clear(),
            PtsSet::BitVec(s) => s.clear(),
        }
    }

    fn to_sorted_vec(&self) -> Vec<u32> {
        match self {
            PtsSet::Hash(s) => s.to_sorted_vec(),
            PtsSet::BitVec(s) => s.to_sorted_vec(),
        }
    }

    fn empty_like(&self) -> Self {
        PtsSet::new(self.backing())
    }
}
