//! Local rewrite rules for the boolean connectives, plus the shared
//! algorithms built on them: the complementary-pair scan, containment,
//! truth equivalence and the pairwise-disjoint rewrite of a term list.
//!
//! The shortcuts here are syntactic: they are sufficient conditions, the
//! opaque guard algebra decides the rest through the `Atom` hooks.

use std::collections::HashSet;

use log::trace;

use crate::domain::Domain;
use crate::term::{Atom, Term};

/// Local rule for an n-ary conjunction.
pub fn and_rule<A: Atom>(args: &[Term<A>]) -> Term<A> {
    let mut flat: Vec<Term<A>> = Vec::new();
    for arg in args {
        match arg.normalize() {
            Term::And(inner) => flat.extend(inner),
            a => flat.push(a),
        }
    }
    let dom = flat[0].domain().clone();
    if flat.iter().any(|a| a.is_false()) {
        return Term::False(dom);
    }
    let tuple_sorted = flat.iter().any(|a| a.is_tuple_sorted());
    // the true constant is the neutral element; equal arguments collapse
    let mut kept: Vec<Term<A>> = Vec::new();
    for a in flat {
        if a.is_true() || kept.contains(&a) {
            continue;
        }
        kept.push(a);
    }
    if kept.is_empty() {
        return Term::True(dom);
    }
    if tuple_sorted {
        // over the tuple sort the conjunction acts structurally
        combine_pairs(&mut kept, combine_tuple_pair);
    } else {
        combine_pairs(&mut kept, combine_atom_pair);
        if kept.iter().any(|a| a.is_false()) {
            return Term::False(dom);
        }
        if complementary_pair(&kept) {
            return Term::False(dom);
        }
    }
    if kept.iter().any(|a| a.is_false()) {
        return Term::False(dom);
    }
    if kept.len() == 1 {
        return kept.pop().unwrap();
    }
    Term::And(kept)
}

/// Local rule for an n-ary disjunction. The disjointness hint survives
/// only rewrites that keep the argument list a sublist of the original.
pub fn or_rule<A: Atom>(args: &[Term<A>], hint: bool) -> Term<A> {
    let mut flat: Vec<Term<A>> = Vec::new();
    let mut flattened = false;
    for arg in args {
        match arg.normalize() {
            Term::Or(inner, _) => {
                flattened = true;
                flat.extend(inner);
            }
            a => flat.push(a),
        }
    }
    let dom = flat[0].domain().clone();
    if flat.iter().any(|a| a.is_true()) {
        return Term::True(dom);
    }
    let tuple_sorted = flat.iter().any(|a| a.is_tuple_sorted());
    // the false constant is the neutral element; equal arguments collapse
    let mut kept: Vec<Term<A>> = Vec::new();
    for a in flat {
        if a.is_false() || kept.contains(&a) {
            continue;
        }
        kept.push(a);
    }
    if kept.is_empty() {
        return Term::False(dom);
    }
    if !tuple_sorted {
        if complementary_pair(&kept) {
            return Term::True(dom);
        }
        combine_pairs(&mut kept, or_atom_pair);
        if kept.iter().any(|a| a.is_true()) {
            return Term::True(dom);
        }
    }
    if kept.len() == 1 {
        return kept.pop().unwrap();
    }
    Term::or(kept, hint && !flattened)
}

/// Local rule for a negation: involution, constant flip, De Morgan
/// pushdown and the domain-specific complement hook.
pub fn not_rule<A: Atom>(arg: &Term<A>) -> Term<A> {
    let a = arg.normalize();
    if let Term::Not(inner) = &a {
        return (**inner).clone();
    }
    if a.is_true() {
        return Term::False(a.domain().clone());
    }
    if a.is_false() {
        return Term::True(a.domain().clone());
    }
    match a {
        // each sub-argument goes back through the not builder so the
        // domain can rewrite it on the next pass
        Term::And(args) => Term::or(
            args.into_iter().map(Term::not).collect(),
            false,
        ),
        Term::Or(args, _) => Term::and(args.into_iter().map(Term::not).collect()),
        Term::Atom(at) => match at.not_atom() {
            Some(t) => t,
            None => Term::Not(Box::new(Term::Atom(at))),
        },
        other => Term::Not(Box::new(other)),
    }
}

/// O(n) scan for a pair of syntactic complements `x`, `!x`.
pub fn complementary_pair<A: Atom>(args: &[Term<A>]) -> bool {
    let set: HashSet<&Term<A>> = args.iter().collect();
    for a in args {
        if let Term::Not(inner) = a {
            if set.contains(inner.as_ref()) {
                return true;
            }
        }
    }
    false
}

/// Greedy pairwise combination; each hit removes one list element, so the
/// loop terminates. Leftovers are cleaned up by the fixed-point driver.
fn combine_pairs<A: Atom>(
    args: &mut Vec<Term<A>>,
    pair: fn(&Term<A>, &Term<A>) -> Option<Term<A>>,
) {
    let mut i = 0;
    while i < args.len() {
        let mut hit = None;
        for j in i + 1..args.len() {
            if let Some(t) = pair(&args[i], &args[j]) {
                hit = Some((j, t));
                break;
            }
        }
        match hit {
            Some((j, t)) => {
                args.remove(j);
                args[i] = t.normalize();
            }
            None => i += 1,
        }
    }
}

fn combine_atom_pair<A: Atom>(a: &Term<A>, b: &Term<A>) -> Option<Term<A>> {
    match (a, b) {
        (Term::Atom(x), Term::Atom(y)) => x.and_atom(y),
        _ => None,
    }
}

fn or_atom_pair<A: Atom>(a: &Term<A>, b: &Term<A>) -> Option<Term<A>> {
    match (a, b) {
        (Term::Atom(x), Term::Atom(y)) => x.or_atom(y),
        _ => None,
    }
}

/// Structural intersection over the tuple sort: the all-function absorbs,
/// same-body tuples meet on their guards, and a tuple minus a same-body
/// tuple narrows the guard by the complement.
fn combine_tuple_pair<A: Atom>(a: &Term<A>, b: &Term<A>) -> Option<Term<A>> {
    match (a, b) {
        (Term::All { dom, cod }, other) | (other, Term::All { dom, cod })
            if other.is_tuple_sorted() && other.domain() == dom && other.codomain() == cod =>
        {
            Some(other.clone())
        }
        (
            Term::Tuple {
                guard: g1,
                parts: p1,
                dom,
                cod,
            },
            Term::Tuple {
                guard: g2,
                parts: p2,
                dom: dom2,
                ..
            },
        ) if p1.len() == p2.len() && dom == dom2 => {
            let guard = match (g1, g2) {
                (None, None) => None,
                (Some(g), None) | (None, Some(g)) => Some((**g).clone()),
                (Some(x), Some(y)) => {
                    Some(Term::and(vec![(**x).clone(), (**y).clone()]).normalize())
                }
            };
            // component-wise meet; one empty component empties the tuple
            let mut parts = Vec::with_capacity(p1.len());
            for (x, y) in p1.iter().zip(p2.iter()) {
                let m = if x == y {
                    x.clone()
                } else {
                    Term::and(vec![x.clone(), y.clone()]).normalize()
                };
                if m.is_false() {
                    return Some(Term::False(dom.clone()));
                }
                parts.push(m);
            }
            Some(retuple(guard, parts, dom, cod))
        }
        (Term::Not(n), other) | (other, Term::Not(n)) => tuple_minus(other, n),
        _ => None,
    }
}

/// `pos` minus a same-body tuple under `Not`.
fn tuple_minus<A: Atom>(pos: &Term<A>, neg: &Term<A>) -> Option<Term<A>> {
    if let (
        Term::Tuple {
            guard: g1,
            parts: p1,
            dom,
            cod,
        },
        Term::Tuple {
            guard: g2,
            parts: p2,
            dom: dom2,
            ..
        },
    ) = (pos, neg)
    {
        if p1 != p2 || dom != dom2 {
            return None;
        }
        let complement = match g2 {
            // subtracting the unguarded body leaves nothing
            None => return Some(Term::False(dom.clone())),
            Some(g) => Term::not((**g).clone()),
        };
        let guard = match g1 {
            None => complement,
            Some(g) => Term::and(vec![(**g).clone(), complement]),
        }
        .normalize();
        return Some(retuple(Some(guard), p1.clone(), dom, cod));
    }
    None
}

fn retuple<A: Atom>(
    guard: Option<Term<A>>,
    parts: Vec<Term<A>>,
    dom: &Domain,
    cod: &Domain,
) -> Term<A> {
    let guard = match guard {
        Some(g) => {
            if g.is_false() {
                return Term::False(dom.clone());
            }
            if g.is_true() {
                None
            } else {
                Some(Box::new(g))
            }
        }
        None => None,
    };
    Term::Tuple {
        guard,
        parts,
        dom: dom.clone(),
        cod: cod.clone(),
    }
}

/// True when `t` is covered by the union of `list`.
///
/// The scan is order dependent on purpose: the first overlapping element
/// absorbs its share of `t` and the remainder is checked against the
/// not-yet-scanned tail only.
pub fn contained<A: Atom>(t: &Term<A>, list: &[Term<A>]) -> bool {
    let t = t.normalize();
    if t.is_false() {
        return true;
    }
    for (i, e) in list.iter().enumerate() {
        let inter = Term::and(vec![t.clone(), e.clone()]).normalize();
        if !inter.is_false() {
            if inter == t {
                return true;
            }
            let rest = t.diff(&inter);
            return contained(&rest, &list[i + 1..]);
        }
    }
    false
}

/// True when the disjunction of `args` covers the whole domain.
///
/// Checks that the complement of the first argument is contained in the
/// remaining ones, without going through the recursive driver.
pub fn truth_equivalent<A: Atom>(args: &[Term<A>]) -> bool {
    if args.is_empty() {
        return false;
    }
    let first = &args[0];
    let complement = Term::True(first.domain().clone()).diff(first).normalize();
    match &complement {
        Term::Or(cargs, _) => cargs.iter().all(|c| contained(c, &args[1..])),
        c => contained(c, &args[1..]),
    }
}

/// Rewrites `t1 + t2 + ... + tn` into a pairwise-disjoint list whose
/// union is truth equivalent to the union of the input.
pub fn disjoin<A: Atom>(terms: &[Term<A>]) -> Vec<Term<A>> {
    let mut list: Vec<Term<A>> = Vec::new();
    for head in terms {
        subtract_from(&mut list, head);
    }
    list
}

/// Narrows every element of `list` by `head`, then appends `head` unless
/// it turned out to be fully covered already.
pub fn subtract_from<A: Atom>(list: &mut Vec<Term<A>>, head: &Term<A>) {
    let mut covered = false;
    let mut i = 0;
    while i < list.len() {
        let inter = Term::and(vec![head.clone(), list[i].clone()]).normalize();
        if !inter.is_false() {
            if list[i] == inter {
                // the element is fully inside head
                trace!("disjoin: dropping {} inside {}", list[i], head);
                list.remove(i);
                continue;
            }
            if *head == inter {
                // head is fully inside the element
                covered = true;
                break;
            }
            let narrowed = list[i].diff(head).normalize();
            if narrowed.is_false() {
                list.remove(i);
                continue;
            }
            list[i] = narrowed;
        }
        i += 1;
    }
    if !covered {
        list.push(head.clone());
    }
}

/// Pairwise disjointness of a term list, O(n²).
pub fn disjoined<A: Atom>(list: &[Term<A>]) -> bool {
    for i in 0..list.len() {
        for j in i + 1..list.len() {
            let inter = Term::and(vec![list[i].clone(), list[j].clone()]).normalize();
            if !inter.is_false() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod specs {
    use super::*;
    use crate::testing::{eq, equivalent, neq, opaque};

    #[test]
    fn and_with_false_argument_is_false() {
        let dom = crate::testing::colors(3);
        let t = Term::and(vec![opaque("a"), Term::False(dom.clone())]).normalize();

        assert_eq!(t, Term::False(dom));
    }

    #[test]
    fn and_drops_the_true_constant() {
        let dom = crate::testing::colors(3);
        let a = opaque("a");

        let actual = Term::and(vec![Term::True(dom), a.clone()]).normalize();

        assert_eq!(actual, a);
    }

    #[test]
    fn and_of_syntactic_complements_is_false() {
        let a = opaque("a");
        let dom = a.domain().clone();

        let actual = Term::and(vec![a.clone(), opaque("b"), Term::not(a)]).normalize();

        assert_eq!(actual, Term::False(dom));
    }

    #[test]
    fn and_of_exclusive_equalities_is_false() {
        let dom = crate::testing::colors(3);

        let actual = Term::and(vec![eq("i", 0), eq("i", 1)]).normalize();

        assert_eq!(actual, Term::False(dom));
    }

    #[test]
    fn and_over_distinct_variables_stays_symbolic() {
        let actual = Term::and(vec![eq("i", 0), eq("j", 1)]).normalize();

        assert_eq!(actual, Term::and(vec![eq("i", 0), eq("j", 1)]));
    }

    #[test]
    fn or_of_complements_over_tuples_is_not_collapsed() {
        let dom = crate::testing::colors(3);
        let t = Term::tuple(Some(eq("i", 0)), vec![eq("x", 0)], dom);

        let actual = Term::or(vec![t.clone(), Term::not(t.clone())], false).normalize();

        assert_eq!(actual, Term::or(vec![t.clone(), Term::not(t)], false));
    }

    #[test]
    fn or_collapses_when_true_is_present() {
        let dom = crate::testing::colors(3);

        let actual = Term::or(vec![opaque("a"), Term::True(dom.clone())], false).normalize();

        assert_eq!(actual, Term::True(dom));
    }

    #[test]
    fn same_body_tuples_meet_on_their_guards() {
        let dom = crate::testing::colors(3);
        let t1 = Term::tuple(Some(neq("i", 0)), vec![eq("x", 0)], dom.clone());
        let t2 = Term::tuple(Some(neq("i", 1)), vec![eq("x", 0)], dom.clone());

        let actual = Term::and(vec![t1, t2]).normalize();
        let expected = Term::tuple(Some(eq("i", 2)), vec![eq("x", 0)], dom);

        assert_eq!(actual, expected);
    }

    #[test]
    fn tuple_minus_same_body_narrows_the_guard() {
        let dom = crate::testing::colors(3);
        let t1 = Term::tuple(None, vec![eq("x", 0)], dom.clone());
        let t2 = Term::tuple(Some(eq("i", 0)), vec![eq("x", 0)], dom.clone());

        let actual = t1.diff(&t2).normalize();
        let expected = Term::tuple(Some(neq("i", 0)), vec![eq("x", 0)], dom);

        assert_eq!(actual, expected);
    }

    #[test]
    fn contained_in_a_covering_split() {
        let t = Term::True(crate::testing::colors(3));
        let list = vec![eq("i", 0), eq("i", 1), eq("i", 2)];

        assert!(contained(&t, &list));
    }

    #[test]
    fn contained_fails_on_a_partial_cover() {
        let t = Term::True(crate::testing::colors(3));
        let list = vec![eq("i", 0), eq("i", 1)];

        assert!(!contained(&t, &list));
    }

    #[test]
    fn false_is_trivially_contained() {
        let t = Term::False(crate::testing::colors(3));
        let empty: Vec<Term<crate::testing::Cv>> = vec![];

        assert!(contained(&t, &empty));
    }

    #[test]
    fn truth_equivalent_full_split() {
        let args = vec![eq("i", 0), eq("i", 1), eq("i", 2)];

        assert!(truth_equivalent(&args));
    }

    #[test]
    fn truth_equivalent_rejects_partial_split() {
        let args = vec![eq("i", 0), eq("i", 2)];

        assert!(!truth_equivalent(&args));
    }

    #[test]
    fn truth_equivalent_with_or_shaped_complement() {
        // the complement of i=0 & j=0 is or-shaped, so every branch of it
        // must be covered by the remaining arguments
        let args = vec![
            Term::and(vec![eq("i", 0), eq("j", 0)]),
            neq("i", 0),
            neq("j", 0),
        ];

        assert!(truth_equivalent(&args));
    }

    #[test]
    fn disjoin_keeps_exclusive_terms_untouched() {
        let input = vec![eq("i", 0), eq("i", 1)];

        let actual = disjoin(&input);

        assert_vec_eq!(actual, input);
    }

    #[test]
    fn disjoin_drops_an_absorbed_term() {
        let input = vec![eq("i", 0), Term::or(vec![eq("i", 0), eq("i", 1)], false)];

        let actual = disjoin(&input);

        assert!(disjoined(&actual));
        assert!(
            equivalent(
                &Term::or(actual.clone(), false),
                &Term::or(input, false),
                &["i"],
                3
            ),
            "disjoin must preserve the union"
        );
    }

    #[test]
    fn disjoin_output_is_pairwise_disjoint_and_union_preserving() {
        let input = vec![
            neq("i", 0),
            eq("i", 1),
            Term::or(vec![eq("i", 0), eq("i", 2)], false),
        ];

        let actual = disjoin(&input);

        assert!(disjoined(&actual));
        assert!(equivalent(
            &Term::or(actual, false),
            &Term::or(input, false),
            &["i"],
            3
        ));
    }

    #[test]
    fn disjoined_detects_overlap() {
        let list = vec![neq("i", 0), eq("i", 1)];

        assert!(!disjoined(&list));
    }
}
