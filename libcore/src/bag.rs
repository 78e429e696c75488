//! Concrete bag backing: a multiset of terms bound to a domain/codomain
//! pair, with generic normalization plumbing and memoized scalar queries.

use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::domain::Domain;
use crate::error::SymbagError;
use crate::multiset::Multiset;
use crate::term::{Atom, Term};

/// A multiset of terms with bound sorts.
///
/// Equality is structural over the backing multiset and the sorts, scoped
/// to the concrete bag kind: a `Bag` never equals a `LogicalBag` even when
/// their content agrees. The `simplified` flag and the cardinality are
/// compute-once caches and take no part in equality.
#[derive(Debug, Clone)]
pub struct Bag<A: Atom> {
    dom: Domain,
    cod: Domain,
    elems: Multiset<Term<A>>,
    simplified: Cell<bool>,
    card: OnceCell<Option<u64>>,
}

impl<A: Atom> Bag<A> {
    /// Binds the sorts from an arbitrary support element. The source must
    /// not be empty; use [`Bag::empty`] to build the empty bag explicitly.
    pub fn build(elems: Multiset<Term<A>>) -> Result<Bag<A>, SymbagError> {
        let (dom, cod) = match elems.support().next() {
            None => return Err(SymbagError::EmptyBag),
            Some(e) => (e.domain().clone(), e.codomain().clone()),
        };
        Ok(Bag {
            dom,
            cod,
            elems,
            simplified: Cell::new(false),
            card: OnceCell::new(),
        })
    }

    pub fn from_map(src: HashMap<Term<A>, i64>) -> Result<Bag<A>, SymbagError> {
        Bag::build(Multiset::build(src)?)
    }

    pub fn empty(dom: Domain, cod: Domain) -> Bag<A> {
        Bag {
            dom,
            cod,
            elems: Multiset::empty(),
            simplified: Cell::new(false),
            card: OnceCell::new(),
        }
    }

    /// Freezes a builder map under the given sorts; an empty builder
    /// yields the canonical empty bag.
    pub(crate) fn freeze(acc: HashMap<Term<A>, i64>, dom: &Domain, cod: &Domain) -> Bag<A> {
        Bag {
            dom: dom.clone(),
            cod: cod.clone(),
            elems: Multiset::freeze(acc),
            simplified: Cell::new(false),
            card: OnceCell::new(),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.dom
    }

    pub fn codomain(&self) -> &Domain {
        &self.cod
    }

    pub fn elems(&self) -> &Multiset<Term<A>> {
        &self.elems
    }

    pub fn mult(&self, e: &Term<A>) -> i64 {
        self.elems.mult(e)
    }

    pub fn support(&self) -> impl Iterator<Item = &Term<A>> {
        self.elems.support()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term<A>, i64)> {
        self.elems.iter()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn is_proper(&self) -> bool {
        self.elems.is_proper()
    }

    pub fn is_simplified(&self) -> bool {
        self.simplified.get()
    }

    pub(crate) fn mark_simplified(&self) {
        self.simplified.set(true);
    }

    /// Sum with `other` scaled by `k`; an empty operand short-circuits.
    pub fn sum(&self, other: &Bag<A>, k: i64) -> Bag<A> {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            let mut acc = HashMap::new();
            Multiset::add_all(&mut acc, &other.elems, k);
            return Bag::freeze(acc, &other.dom, &other.cod);
        }
        let merged = self.elems.sum(&other.elems, k);
        Bag {
            dom: self.dom.clone(),
            cod: self.cod.clone(),
            elems: merged,
            simplified: Cell::new(false),
            card: OnceCell::new(),
        }
    }

    pub fn diff(&self, other: &Bag<A>) -> Bag<A> {
        self.sum(other, -1)
    }

    /// Cardinality of the bag, when every key is computable. Memoized.
    pub fn card(&self) -> Option<u64> {
        *self.card.get_or_init(|| {
            let mut total: i64 = 0;
            for (e, k) in self.elems.iter() {
                match e.card() {
                    None => return None,
                    Some(c) => total += k * c as i64,
                }
            }
            if total < 0 {
                None
            } else {
                Some(total as u64)
            }
        })
    }

    /// A single support element with multiplicity one.
    pub fn is_elementary(&self) -> bool {
        self.len() == 1 && self.iter().next().map(|(_, k)| k) == Some(1)
    }

    /// Rebinds the bag under new sorts, remapping every key through its
    /// own re-tagging clone. The empty bag clones to the empty bag of the
    /// new sorts.
    pub fn clone_with(&self, dom: &Domain, cod: &Domain) -> Bag<A> {
        if self.is_empty() {
            return Bag::empty(dom.clone(), cod.clone());
        }
        let mut acc = HashMap::new();
        for (e, k) in self.elems.iter() {
            Multiset::add(&mut acc, &e.clone_with(dom, cod), k);
        }
        Bag::freeze(acc, dom, cod)
    }

    /// Normalizes every key and drops the ones that collapse to the null
    /// element of the sort; keys that meet after normalization add their
    /// multiplicities. The result is flagged simplified.
    pub fn gen_simplify(&self) -> Bag<A> {
        if self.simplified.get() {
            return self.clone();
        }
        let mut acc = HashMap::new();
        for (e, k) in self.elems.iter() {
            let n = e.normalize();
            if n.is_false() {
                continue;
            }
            Multiset::add(&mut acc, &n, k);
        }
        let out = Bag::freeze(acc, &self.dom, &self.cod);
        out.mark_simplified();
        out
    }

    pub fn get_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.dom.hash(&mut hasher);
        self.cod.hash(&mut hasher);
        // order-independent fold over the backing map
        let mut acc: u64 = 0;
        for (e, k) in self.elems.iter() {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            e.hash(&mut h);
            k.hash(&mut h);
            acc ^= h.finish();
        }
        acc.hash(&mut hasher);
        hasher.finish()
    }
}

impl<A: Atom> PartialEq for Bag<A> {
    fn eq(&self, other: &Self) -> bool {
        self.dom == other.dom && self.cod == other.cod && self.elems == other.elems
    }
}

impl<A: Atom> Eq for Bag<A> {}

#[cfg(test)]
mod specs {
    use super::*;
    use crate::testing::{colors, eq, neq, opaque};

    #[test]
    fn build_binds_sorts_from_a_support_element() {
        let bag = Bag::from_map(hashmap! {eq("i", 0) => 2}).unwrap();

        assert_eq!(bag.domain(), &colors(3));
        assert_eq!(bag.codomain(), &colors(3));
    }

    #[test]
    fn build_from_empty_source_fails() {
        let src: HashMap<Term<crate::testing::Cv>, i64> = HashMap::new();

        assert_eq!(Bag::from_map(src), Err(SymbagError::EmptyBag));
    }

    #[test]
    fn sum_is_pointwise() {
        let a = Bag::from_map(hashmap! {eq("i", 0) => 2, eq("i", 1) => 1}).unwrap();
        let b = Bag::from_map(hashmap! {eq("i", 1) => 3, eq("i", 2) => 1}).unwrap();

        let s = a.sum(&b, -1);

        assert_eq!(s.mult(&eq("i", 0)), 2);
        assert_eq!(s.mult(&eq("i", 1)), -2);
        assert_eq!(s.mult(&eq("i", 2)), -1);
    }

    #[test]
    fn gen_simplify_drops_null_keys_and_merges() {
        let never = Term::and(vec![eq("i", 0), eq("i", 1)]);
        let roundabout = Term::not(Term::not(eq("i", 2)));
        let bag = Bag::from_map(hashmap! {
            never => 5,
            roundabout => 2,
            eq("i", 2) => 1,
        })
        .unwrap();

        let actual = bag.gen_simplify();

        assert_eq!(actual.len(), 1);
        assert_eq!(actual.mult(&eq("i", 2)), 3);
        assert!(actual.is_simplified());
    }

    #[test]
    fn gen_simplify_collapsing_to_empty_keeps_the_sorts() {
        let never = Term::and(vec![eq("i", 0), eq("i", 1)]);
        let bag = Bag::from_map(hashmap! {never => 5}).unwrap();

        let actual = bag.gen_simplify();

        assert!(actual.is_empty());
        assert_eq!(actual.domain(), &colors(3));
    }

    #[test]
    fn clone_with_rebinds_the_sorts() {
        let d = Domain::new("D", Some(4));
        let bag: Bag<crate::testing::Cv> =
            Bag::from_map(hashmap! {Term::True(colors(3)) => 2}).unwrap();

        let actual = bag.clone_with(&d, &d);

        assert_eq!(actual.domain(), &d);
        assert_eq!(actual.mult(&Term::True(d.clone())), 2);
    }

    #[test]
    fn empty_bag_clones_to_the_new_sorts() {
        let d = Domain::new("D", Some(4));
        let bag: Bag<crate::testing::Cv> = Bag::empty(colors(3), colors(3));

        let actual = bag.clone_with(&d, &d);

        assert!(actual.is_empty());
        assert_eq!(actual.codomain(), &d);
    }

    #[test]
    fn card_sums_key_cardinalities() {
        let bag = Bag::from_map(hashmap! {eq("i", 0) => 2, neq("i", 0) => 3}).unwrap();

        assert_eq!(bag.card(), Some(8));
    }

    #[test]
    fn card_is_unknown_when_a_key_is_opaque() {
        let bag = Bag::from_map(hashmap! {eq("i", 0) => 2, opaque("a") => 1}).unwrap();

        assert_eq!(bag.card(), None);
    }

    #[test]
    fn elementary_bag() {
        let single = Bag::from_map(hashmap! {eq("i", 0) => 1}).unwrap();
        let double = Bag::from_map(hashmap! {eq("i", 0) => 2}).unwrap();

        assert!(single.is_elementary());
        assert!(!double.is_elementary());
    }

    #[test]
    fn equality_ignores_the_caches() {
        let a = Bag::from_map(hashmap! {eq("i", 0) => 1}).unwrap();
        let b = Bag::from_map(hashmap! {eq("i", 0) => 1}).unwrap();
        let _ = a.card();
        a.mark_simplified();

        assert_eq!(a, b);
        assert_eq!(a.get_hash(), b.get_hash());
    }
}
