//! Logical bags: multisets of boolean-domain terms with a pairwise-disjoint
//! form, and the aggregation of their guards into a partition of the domain.
//!
//! The `disjoined` flag is a cache, not a proof: it is recomputed, never
//! trusted, whenever the bag content changes.

use std::cell::Cell;
use std::cmp;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use itertools::Itertools;
use log::{debug, warn};

use crate::bag::Bag;
use crate::domain::Domain;
use crate::error::SymbagError;
use crate::multiset::Multiset;
use crate::term::{Atom, Term};

/// A partition key; `None` is the universal "true" guard.
pub type Guard<A> = Option<Term<A>>;

/// Pairwise-disjoint guards mapped to a folded coefficient.
pub type GuardPartition<A> = HashMap<Guard<A>, i64>;

/// Pairwise-disjoint guards mapped to the coefficients collected per
/// dimension, before folding.
pub type GuardCoeffs<A> = HashMap<Guard<A>, Vec<i64>>;

/// A bag specialized to boolean-domain terms.
#[derive(Debug, Clone)]
pub struct LogicalBag<A: Atom> {
    bag: Bag<A>,
    disjoined: Cell<bool>,
}

impl<A: Atom> LogicalBag<A> {
    pub fn build(elems: Multiset<Term<A>>) -> Result<LogicalBag<A>, SymbagError> {
        Ok(LogicalBag::wrap(Bag::build(elems)?))
    }

    pub fn from_map(src: HashMap<Term<A>, i64>) -> Result<LogicalBag<A>, SymbagError> {
        Ok(LogicalBag::wrap(Bag::from_map(src)?))
    }

    pub fn empty(dom: Domain, cod: Domain) -> LogicalBag<A> {
        LogicalBag::wrap(Bag::empty(dom, cod))
    }

    fn wrap(bag: Bag<A>) -> LogicalBag<A> {
        LogicalBag {
            bag,
            disjoined: Cell::new(false),
        }
    }

    pub(crate) fn freeze(
        acc: HashMap<Term<A>, i64>,
        dom: &Domain,
        cod: &Domain,
    ) -> LogicalBag<A> {
        LogicalBag::wrap(Bag::freeze(acc, dom, cod))
    }

    pub fn domain(&self) -> &Domain {
        self.bag.domain()
    }

    pub fn codomain(&self) -> &Domain {
        self.bag.codomain()
    }

    pub fn mult(&self, e: &Term<A>) -> i64 {
        self.bag.mult(e)
    }

    pub fn support(&self) -> impl Iterator<Item = &Term<A>> {
        self.bag.support()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term<A>, i64)> {
        self.bag.iter()
    }

    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    pub fn is_proper(&self) -> bool {
        self.bag.is_proper()
    }

    pub fn is_elementary(&self) -> bool {
        self.bag.is_elementary()
    }

    pub fn card(&self) -> Option<u64> {
        self.bag.card()
    }

    pub fn is_simplified(&self) -> bool {
        self.bag.is_simplified()
    }

    /// Whether the support has been shown (or assumed) pairwise disjoint.
    pub fn disjoined(&self) -> bool {
        self.disjoined.get()
    }

    pub fn sum(&self, other: &LogicalBag<A>, k: i64) -> LogicalBag<A> {
        LogicalBag::wrap(self.bag.sum(&other.bag, k))
    }

    pub fn diff(&self, other: &LogicalBag<A>) -> LogicalBag<A> {
        self.sum(other, -1)
    }

    pub fn scalar_prod(&self, k: i64) -> LogicalBag<A> {
        let out = LogicalBag::wrap(Bag::freeze(
            self.iter().map(|(e, m)| (e.clone(), k * m)).collect(),
            self.domain(),
            self.codomain(),
        ));
        // scaling does not touch the support
        out.disjoined.set(k != 0 && self.disjoined.get());
        out
    }

    pub fn pairwise_inter(&self, other: &LogicalBag<A>) -> LogicalBag<A> {
        let elems = self.bag.elems().pairwise_inter(other.bag.elems());
        let mut acc = HashMap::new();
        Multiset::add_all(&mut acc, &elems, 1);
        LogicalBag::freeze(acc, self.domain(), self.codomain())
    }

    /// The positive-multiplicity sub-bag.
    pub fn proper(&self) -> LogicalBag<A> {
        let acc: HashMap<Term<A>, i64> =
            self.iter().filter(|(_, k)| *k > 0).map(|(e, k)| (e.clone(), k)).collect();
        let out = LogicalBag::freeze(acc, self.domain(), self.codomain());
        out.disjoined.set(self.disjoined.get());
        out
    }

    pub fn transpose(&self) -> LogicalBag<A> {
        let mut acc = HashMap::new();
        for (e, k) in self.iter() {
            Multiset::add(&mut acc, &e.transpose(), k);
        }
        LogicalBag::freeze(acc, self.codomain(), self.domain())
    }

    pub fn clone_with(&self, dom: &Domain, cod: &Domain) -> LogicalBag<A> {
        LogicalBag::wrap(self.bag.clone_with(dom, cod))
    }

    /// Generic simplification of the keys; the disjoint flag survives it
    /// because normalization preserves every key's meaning.
    pub fn gen_simplify(&self) -> LogicalBag<A> {
        let out = LogicalBag::wrap(self.bag.gen_simplify());
        out.disjoined.set(self.disjoined.get());
        out
    }

    /// Full local simplification: normalize the keys, disjoin when not
    /// already known disjoint, then flatten support elements that are
    /// disjoint unions themselves by distributing their branches.
    pub fn spec_simplify(&self) -> LogicalBag<A> {
        let g = self.gen_simplify();
        let d = if g.disjoined() { g } else { g.disjoin() };
        let mut acc: HashMap<Term<A>, i64> = HashMap::new();
        let mut expanded = false;
        for (e, k) in d.iter() {
            match e {
                Term::Or(args, hint) if hint.get() => {
                    expanded = true;
                    for a in args.iter() {
                        Multiset::add(&mut acc, a, k);
                    }
                }
                _ => Multiset::add(&mut acc, e, k),
            }
        }
        if !expanded {
            d.bag.mark_simplified();
            return d;
        }
        let out = LogicalBag::freeze(acc, d.domain(), d.codomain());
        out.disjoined.set(d.disjoined());
        out.bag.mark_simplified();
        out
    }

    /// Non-destructive disjoint form. When disjoining does not apply to
    /// the bag's keys the bag is returned as built, flag left unset.
    pub fn disjoin(&self) -> LogicalBag<A> {
        if self.disjoined.get() {
            return self.clone();
        }
        match self.disjoin_as_map() {
            Ok(map) => {
                let out = LogicalBag::freeze(map, self.domain(), self.codomain());
                out.disjoined.set(true);
                out
            }
            Err(err) => {
                debug!("bag kept as built, {}", err);
                self.clone()
            }
        }
    }

    /// Builds a map with pairwise-disjoint keys equivalent to the bag,
    /// inserting the elements one at a time with their multiplicities.
    pub fn disjoin_as_map(&self) -> Result<HashMap<Term<A>, i64>, SymbagError> {
        if self
            .support()
            .any(|e| matches!(e, Term::Comp(..) | Term::Transpose(..)))
        {
            return Err(SymbagError::NotDisjoinable);
        }
        let mut map = HashMap::new();
        for (e, k) in self.iter() {
            insert_disjoint(&mut map, e, k);
        }
        Ok(map)
    }

    /// Aggregates the guards of the bag keys into a partition of the
    /// domain: pairwise-disjoint guards mapped to coefficients combined
    /// with `fold`, completed by the uncovered region at coefficient 0.
    ///
    /// A key that carries no guard aborts the whole aggregation.
    pub fn map_guards_to_coefficients(
        &self,
        fold: fn(i64, i64) -> i64,
    ) -> Result<GuardPartition<A>, SymbagError> {
        let d = self.disjoin().gen_simplify();
        if d.is_empty() {
            return Ok(hashmap! { None => 0 });
        }
        let mut part: GuardPartition<A> = HashMap::new();
        if d.len() == 1 {
            let (e, k) = d.iter().next().unwrap();
            part.insert(guard_of(e)?, k);
        } else {
            for (e, k) in d.iter() {
                set_val(&mut part, guard_of(e)?, k, fold);
            }
            if part.len() > 1 {
                // term-level disjointness does not carry over to guards
                disjoin_map_of_guards(&mut part, fold);
            }
        }
        insert_complement(&mut part);
        if !partition_disjoined(&part) {
            warn!("guard partition is not provably pairwise disjoint");
        }
        Ok(part)
    }

    pub fn map_guards_to_max_coefficients(&self) -> Result<GuardPartition<A>, SymbagError> {
        self.map_guards_to_coefficients(cmp::max)
    }

    pub fn map_guards_to_sum_coefficients(&self) -> Result<GuardPartition<A>, SymbagError> {
        self.map_guards_to_coefficients(|a, b| a + b)
    }

    pub fn get_hash(&self) -> u64 {
        self.bag.get_hash()
    }
}

impl<A: Atom> PartialEq for LogicalBag<A> {
    fn eq(&self, other: &Self) -> bool {
        // the disjoint flag is a cache, not content
        self.bag == other.bag
    }
}

impl<A: Atom> Eq for LogicalBag<A> {}

impl<A: Atom> fmt::Display for LogicalBag<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "0.{}", self.domain());
        }
        let parts: Vec<String> = self.iter().map(|(e, k)| format!("{}'{}", k, e)).collect();
        write!(f, "{}", parts.join(" + "))
    }
}

/// Inserts `(e, k)` into a map with pairwise-disjoint keys, splitting the
/// overlapping regions so the invariant survives the insertion.
fn insert_disjoint<A: Atom>(map: &mut HashMap<Term<A>, i64>, e: &Term<A>, k: i64) {
    if map.is_empty() {
        map.insert(e.clone(), k);
        return;
    }
    if let Some(m) = map.get_mut(e) {
        *m += k;
        return;
    }
    let keys: Vec<Term<A>> = map.keys().cloned().collect();
    let mut scheduled: Vec<(Term<A>, i64)> = Vec::new();
    let mut subtraends: Vec<Term<A>> = Vec::new();
    let mut overlap = false;
    let mut residual = true;
    for f in keys {
        let inter = Term::and(vec![e.clone(), f.clone()]).normalize();
        if inter.is_false() {
            continue;
        }
        overlap = true;
        let mf = map[&f];
        scheduled.push((inter.clone(), mf + k));
        if f != inter {
            // the part of f outside e keeps its multiplicity
            scheduled.push((f.diff(e).normalize(), mf));
        }
        map.remove(&f);
        if *e == inter {
            // the rest of e is already covered
            residual = false;
            break;
        }
        subtraends.push(f);
    }
    if !overlap {
        map.insert(e.clone(), k);
        return;
    }
    for (t, m) in scheduled {
        if t.is_false() {
            continue;
        }
        Multiset::add(map, &t, m);
    }
    if residual && !subtraends.is_empty() {
        let rest = e.diff(&Term::or(subtraends, false)).normalize();
        if !rest.is_false() {
            Multiset::add(map, &rest, k);
        }
    }
}

/// The guard a bag key exposes; the all-function carries the universal one.
fn guard_of<A: Atom>(e: &Term<A>) -> Result<Guard<A>, SymbagError> {
    match e {
        Term::All { .. } => Ok(None),
        Term::Tuple { guard: None, .. } => Ok(None),
        Term::Tuple { guard: Some(g), .. } => Ok(to_guard(g.normalize())),
        other => {
            let err = SymbagError::GuardlessKey(other.to_string());
            warn!("guard aggregation aborted: {}", err);
            Err(err)
        }
    }
}

fn to_guard<A: Atom>(t: Term<A>) -> Guard<A> {
    if t.is_true() {
        None
    } else {
        Some(t)
    }
}

fn guard_is_false<A: Atom>(g: &Guard<A>) -> bool {
    match g {
        Some(t) => t.is_false(),
        None => false,
    }
}

fn show_guard<A: Atom>(g: &Guard<A>) -> String {
    match g {
        Some(t) => t.to_string(),
        None => String::from("true"),
    }
}

fn set_val<A: Atom>(part: &mut GuardPartition<A>, g: Guard<A>, k: i64, fold: fn(i64, i64) -> i64) {
    match part.entry(g) {
        Entry::Occupied(mut e) => {
            let prev = *e.get();
            e.insert(fold(prev, k));
        }
        Entry::Vacant(e) => {
            e.insert(k);
        }
    }
}

/// Completes a partition with the uncovered region of the domain, at
/// coefficient 0, unless that region is empty.
fn insert_complement<A: Atom>(part: &mut GuardPartition<A>) {
    if part.contains_key(&None) {
        return;
    }
    let terms: Vec<Term<A>> = part.keys().filter_map(|g| g.clone()).collect();
    if terms.is_empty() {
        return;
    }
    let complement = Term::not(Term::or(terms, false)).normalize();
    if complement.is_false() {
        return;
    }
    part.entry(to_guard(complement)).or_insert(0);
}

fn partition_disjoined<A: Atom>(part: &GuardPartition<A>) -> bool {
    let guards: Vec<&Guard<A>> = part.keys().collect();
    for i in 0..guards.len() {
        for j in i + 1..guards.len() {
            match (guards[i], guards[j]) {
                (Some(a), Some(b)) => {
                    let inter = Term::and(vec![a.clone(), b.clone()]).normalize();
                    if !inter.is_false() {
                        return false;
                    }
                }
                // the universal guard overlaps everything else
                _ => return false,
            }
        }
    }
    true
}

/// Refines the keys of a guard partition until they are pairwise
/// mutually exclusive, folding the coefficients of overlapping regions.
pub fn disjoin_map_of_guards<A: Atom>(part: &mut GuardPartition<A>, fold: fn(i64, i64) -> i64) {
    let mut worklist: Vec<Guard<A>> = part.keys().cloned().collect();
    while let Some(g1) = worklist.pop() {
        if !part.contains_key(&g1) {
            // consumed by an earlier split
            continue;
        }
        let others: Vec<Guard<A>> = part.keys().filter(|g| **g != g1).cloned().collect();
        for g2 in others {
            if let Some(parts) = disjoin_parts(&g1, &g2) {
                let c1 = part.remove(&g1).unwrap();
                let c2 = part.remove(&g2).unwrap();
                let coeffs = [fold(c1, c2), c1, c2];
                for (region, c) in parts.iter().zip(coeffs.iter()) {
                    if guard_is_false(region) {
                        continue;
                    }
                    set_val(part, region.clone(), *c, fold);
                    worklist.push(region.clone());
                }
                break;
            }
        }
    }
}

/// The 3-way split `[g1 and g2, g1 - g2, g2 - g1]` of two overlapping
/// guards, or `None` when they are mutually exclusive already. At most
/// one of the two may be the universal sentinel.
pub fn disjoin_parts<A: Atom>(g1: &Guard<A>, g2: &Guard<A>) -> Option<[Guard<A>; 3]> {
    assert!(
        g1.is_some() || g2.is_some(),
        "two universal guards can not be split"
    );
    let dom = match g1.as_ref().or_else(|| g2.as_ref()) {
        Some(t) => t.domain().clone(),
        None => unreachable!(),
    };
    let t1 = match g1 {
        Some(t) => t.clone(),
        None => Term::True(dom.clone()),
    };
    let t2 = match g2 {
        Some(t) => t.clone(),
        None => Term::True(dom),
    };
    let inter = Term::and(vec![t1.clone(), t2.clone()]).normalize();
    if inter.is_false() {
        return None;
    }
    let only1 = t1.diff(&t2).normalize();
    let only2 = t2.diff(&t1).normalize();
    Some([to_guard(inter), to_guard(only1), to_guard(only2)])
}

/// Cartesian combination of guard partitions over independent dimensions.
///
/// Empty input maps stand for the unconstrained dimension `{true: [0]}`.
/// Combinations whose coefficients are all 0 are dropped, as are the ones
/// whose conjunction is empty. Genuinely disjoint inputs can not produce
/// the same output guard twice; when that happens the disjointness
/// precondition was violated upstream and the computation aborts.
pub fn product<A: Atom>(maps: &[GuardCoeffs<A>]) -> GuardCoeffs<A> {
    let filled: Vec<GuardCoeffs<A>> = maps
        .iter()
        .map(|m| {
            if m.is_empty() {
                hashmap! { None => vec![0] }
            } else {
                m.clone()
            }
        })
        .collect();
    let rows: Vec<Vec<(&Guard<A>, &Vec<i64>)>> =
        filled.iter().map(|m| m.iter().collect()).collect();
    let mut out: GuardCoeffs<A> = HashMap::new();
    for combo in rows.into_iter().multi_cartesian_product() {
        let (guard, coeffs) = match combine_guard_coeff(&combo) {
            None => continue,
            Some(hit) => hit,
        };
        let shown = show_guard(&guard);
        if out.insert(guard, coeffs).is_some() {
            panic!("disjoint inputs produced the guard `{}` twice", shown);
        }
    }
    merge_guards(out)
}

/// Conjunction of the non-universal guards of one combination, paired with
/// the collected coefficients; `None` when every coefficient is 0 or the
/// conjunction is empty.
fn combine_guard_coeff<A: Atom>(
    combo: &[(&Guard<A>, &Vec<i64>)],
) -> Option<(Guard<A>, Vec<i64>)> {
    let coeffs: Vec<i64> = combo.iter().flat_map(|(_, c)| c.iter().cloned()).collect();
    if coeffs.iter().all(|c| *c == 0) {
        return None;
    }
    let terms: Vec<Term<A>> = combo.iter().filter_map(|(g, _)| (*g).clone()).collect();
    if terms.is_empty() {
        return Some((None, coeffs));
    }
    let conj = Term::and(terms).normalize();
    if conj.is_false() {
        return None;
    }
    Some((to_guard(conj), coeffs))
}

/// Compacts a partition whose values repeat by joining the guards of each
/// value group; an injective map is returned unchanged.
pub fn merge_guards<A: Atom, V: Eq + Hash + Clone>(
    m: HashMap<Guard<A>, V>,
) -> HashMap<Guard<A>, V> {
    let distinct = m.values().collect::<HashSet<_>>().len();
    if distinct == m.len() {
        return m;
    }
    let mut groups: HashMap<V, Vec<Guard<A>>> = HashMap::new();
    for (g, v) in m {
        groups.entry(v).or_insert_with(Vec::new).push(g);
    }
    let mut out = HashMap::new();
    for (v, mut gs) in groups {
        let merged = if gs.len() == 1 {
            gs.pop().unwrap()
        } else if gs.iter().any(|g| g.is_none()) {
            None
        } else {
            let terms: Vec<Term<A>> = gs.into_iter().map(|g| g.unwrap()).collect();
            // groups come out of a partition, so the join is disjoint
            to_guard(Term::or(terms, true).normalize())
        };
        out.insert(merged, v);
    }
    out
}
