//! Generic multiset arithmetic: a mapping from elements to nonzero integer
//! multiplicities, with sum, scalar product and pairwise intersection.

use std::cmp;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::SymbagError;

/// A multiset over `T`. No key is ever mapped to multiplicity 0; such
/// entries are stripped when the backing map is frozen.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Multiset<T: Eq + Hash> {
    elems: HashMap<T, i64>,
}

impl<T: Eq + Hash + Clone> Multiset<T> {
    /// Builds a multiset from a source map, stripping zero entries.
    /// An empty source is an error; a source that strips down to nothing
    /// yields the empty multiset.
    pub fn build(src: HashMap<T, i64>) -> Result<Multiset<T>, SymbagError> {
        if src.is_empty() {
            return Err(SymbagError::EmptyBag);
        }
        Ok(Multiset::freeze(src))
    }

    pub fn empty() -> Multiset<T> {
        Multiset {
            elems: HashMap::new(),
        }
    }

    /// Freezes a builder map into a multiset, stripping zero entries.
    pub(crate) fn freeze(src: HashMap<T, i64>) -> Multiset<T> {
        let elems = src.into_iter().filter(|(_, n)| *n != 0).collect();
        Multiset { elems }
    }

    /// Multiplicity of `e`, 0 if absent.
    pub fn mult(&self, e: &T) -> i64 {
        match self.elems.get(e) {
            None => 0,
            Some(n) => *n,
        }
    }

    /// Keys with nonzero multiplicity (view on the backing map).
    pub fn support(&self) -> impl Iterator<Item = &T> {
        self.elems.keys()
    }

    /// Keys with strictly positive multiplicity.
    pub fn proper_support(&self) -> impl Iterator<Item = &T> {
        self.elems
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(e, _)| e)
    }

    /// True if empty or the minimum multiplicity is strictly positive.
    pub fn is_proper(&self) -> bool {
        self.elems.values().all(|n| *n > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, i64)> {
        self.elems.iter().map(|(e, n)| (e, *n))
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// The multiset with multiplicity `mult(self, e) + k * mult(other, e)`
    /// for every `e`. An empty operand short-circuits to the other one.
    pub fn sum(&self, other: &Multiset<T>, k: i64) -> Multiset<T> {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.scalar_prod(k);
        }
        let mut acc = self.elems.clone();
        Multiset::add_all(&mut acc, other, k);
        Multiset::freeze(acc)
    }

    /// Pairwise minimum of multiplicities. Iterates the smaller map and
    /// probes the larger one; keys absent from either side contribute a
    /// minimum of 0 and are excluded.
    pub fn pairwise_inter(&self, other: &Multiset<T>) -> Multiset<T> {
        if self.is_empty() || other.is_empty() {
            return Multiset::empty();
        }
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut acc = HashMap::new();
        for (e, n) in small.iter() {
            let m = cmp::min(n, large.mult(e));
            if m != 0 {
                acc.insert(e.clone(), m);
            }
        }
        Multiset::freeze(acc)
    }

    /// Scales every multiplicity by `k`; `k = 0` is the empty multiset and
    /// `k = 1` the multiset itself.
    pub fn scalar_prod(&self, k: i64) -> Multiset<T> {
        match k {
            0 => Multiset::empty(),
            1 => self.clone(),
            _ => Multiset {
                elems: self.elems.iter().map(|(e, n)| (e.clone(), k * n)).collect(),
            },
        }
    }

    /// Accumulates `n` for `key` into a builder map, starting from 0 if
    /// the key is absent.
    pub fn add(acc: &mut HashMap<T, i64>, key: &T, n: i64) {
        let entry = acc.entry(key.clone()).or_insert(0);
        *entry += n;
    }

    /// Accumulates every entry of `m`, scaled by `k`, into a builder map.
    pub fn add_all(acc: &mut HashMap<T, i64>, m: &Multiset<T>, k: i64) {
        for (e, n) in m.iter() {
            Multiset::add(acc, e, k * n);
        }
    }
}
