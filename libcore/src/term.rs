//! Terms of the colored-domain calculus: boolean connectives over opaque
//! atoms, guarded tuples and the symbolic operator residuals.
//!
//! A term is immutable; every operation returns a new value.
//! `normalize` drives each node's local rewrite rule to a fixed point.

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use crate::connective;
use crate::domain::Domain;

/// Capability of an opaque predicate over a color domain.
///
/// The concrete guard algebra lives outside this crate; the two `*_atom`
/// hooks let it decide conjunctions and complements where it can, and
/// return `None` where the pair stays symbolic.
pub trait Atom: Clone + fmt::Debug + fmt::Display + Eq + Hash {
    fn domain(&self) -> &Domain;
    /// Domain-specific conjunction of two atoms, when decidable.
    fn and_atom(&self, other: &Self) -> Option<Term<Self>>;
    /// Domain-specific disjunction of two atoms, when decidable.
    fn or_atom(&self, other: &Self) -> Option<Term<Self>>;
    /// Domain-specific complement, when decidable.
    fn not_atom(&self) -> Option<Term<Self>>;
    /// Number of colors satisfying the atom, when computable.
    fn card(&self) -> Option<u64>;
    /// True for predicates that do not depend on the tuple parameters.
    fn is_constant(&self) -> bool;
}

/// A term of the logical domain.
///
/// The `Or` variant carries a pairwise-disjointness hint. The hint is a
/// cache, not content: structural equality and hashing ignore it.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum Term<A: Atom> {
    True(Domain),
    False(Domain),
    Atom(A),
    And(Vec<Term<A>>),
    Or(Vec<Term<A>>, Cell<bool>),
    Not(Box<Term<A>>),
    /// A guarded tuple; `guard: None` means unguarded.
    Tuple {
        guard: Option<Box<Term<A>>>,
        parts: Vec<Term<A>>,
        dom: Domain,
        cod: Domain,
    },
    /// The constant function mapping every color to the whole codomain.
    All { dom: Domain, cod: Domain },
    /// Symbolic composition residual; simplified by the function layer.
    Comp(Box<Term<A>>, Box<Term<A>>),
    /// Symbolic transposition residual.
    Transpose(Box<Term<A>>),
}

impl<A: Atom> Term<A> {
    pub fn and(args: Vec<Term<A>>) -> Term<A> {
        assert!(!args.is_empty(), "and of no arguments");
        Term::And(args)
    }

    pub fn or(args: Vec<Term<A>>, disjoint: bool) -> Term<A> {
        assert!(!args.is_empty(), "or of no arguments");
        Term::Or(args, Cell::new(disjoint))
    }

    pub fn not(arg: Term<A>) -> Term<A> {
        Term::Not(Box::new(arg))
    }

    pub fn tuple(guard: Option<Term<A>>, parts: Vec<Term<A>>, dom: Domain) -> Term<A> {
        assert!(!parts.is_empty(), "tuple of no parts");
        let factors: Vec<Domain> = parts.iter().map(|p| p.codomain().clone()).collect();
        Term::Tuple {
            guard: guard.map(Box::new),
            parts,
            dom,
            cod: Domain::product(&factors),
        }
    }

    /// `self` minus `other`: the conjunction of `self` with the complement.
    pub fn diff(&self, other: &Term<A>) -> Term<A> {
        Term::and(vec![self.clone(), Term::not(other.clone())])
    }

    /// Syntactic falsity; a sufficient, not necessary, condition.
    pub fn is_false(&self) -> bool {
        match self {
            Term::False(_) => true,
            Term::And(args) => args.iter().any(|a| a.is_false()),
            Term::Or(args, _) => args.iter().all(|a| a.is_false()),
            Term::Not(a) => a.is_true(),
            _ => false,
        }
    }

    /// Syntactic truth; a sufficient, not necessary, condition.
    pub fn is_true(&self) -> bool {
        match self {
            Term::True(_) => true,
            Term::And(args) => args.iter().all(|a| a.is_true()),
            Term::Or(args, _) => args.iter().any(|a| a.is_true()),
            Term::Not(a) => a.is_false(),
            _ => false,
        }
    }

    /// True when the term ranges over the tuple (function) sort, where the
    /// connectives act structurally rather than logically.
    pub fn is_tuple_sorted(&self) -> bool {
        match self {
            Term::Tuple { .. } | Term::All { .. } | Term::Comp(..) | Term::Transpose(..) => true,
            Term::And(args) | Term::Or(args, _) => args.iter().any(|a| a.is_tuple_sorted()),
            Term::Not(a) => a.is_tuple_sorted(),
            _ => false,
        }
    }

    /// True for functions that do not depend on their argument.
    pub fn is_constant(&self) -> bool {
        match self {
            Term::All { .. } => true,
            Term::Atom(a) => a.is_constant(),
            Term::Tuple {
                guard: None, parts, ..
            } => parts.iter().all(|p| p.is_constant()),
            _ => false,
        }
    }

    pub fn domain(&self) -> &Domain {
        match self {
            Term::True(d) | Term::False(d) => d,
            Term::Atom(a) => a.domain(),
            Term::And(args) | Term::Or(args, _) => args[0].domain(),
            Term::Not(a) => a.domain(),
            Term::Tuple { dom, .. } | Term::All { dom, .. } => dom,
            Term::Comp(_, r) => r.domain(),
            Term::Transpose(a) => a.codomain(),
        }
    }

    pub fn codomain(&self) -> &Domain {
        match self {
            Term::Tuple { cod, .. } | Term::All { cod, .. } => cod,
            Term::Comp(l, _) => l.codomain(),
            Term::Transpose(a) => a.domain(),
            _ => self.domain(),
        }
    }

    /// Size of the image per color, when computable. Never guessed.
    pub fn card(&self) -> Option<u64> {
        match self {
            Term::True(d) => d.card,
            Term::False(_) => Some(0),
            Term::Atom(a) => a.card(),
            Term::All { cod, .. } => cod.card,
            Term::Tuple {
                guard: None, parts, ..
            } => parts.iter().map(|p| p.card()).product(),
            _ => None,
        }
    }

    /// Clone under new sorts. Atoms keep their own domain.
    pub fn clone_with(&self, dom: &Domain, cod: &Domain) -> Term<A> {
        match self {
            Term::True(_) => Term::True(dom.clone()),
            Term::False(_) => Term::False(dom.clone()),
            Term::Atom(a) => Term::Atom(a.clone()),
            Term::And(args) => Term::And(args.iter().map(|a| a.clone_with(dom, cod)).collect()),
            Term::Or(args, h) => Term::Or(
                args.iter().map(|a| a.clone_with(dom, cod)).collect(),
                Cell::new(h.get()),
            ),
            Term::Not(a) => Term::Not(Box::new(a.clone_with(dom, cod))),
            Term::Tuple { guard, parts, .. } => Term::Tuple {
                guard: guard.clone(),
                parts: parts.clone(),
                dom: dom.clone(),
                cod: cod.clone(),
            },
            Term::All { .. } => Term::All {
                dom: dom.clone(),
                cod: cod.clone(),
            },
            Term::Comp(l, r) => Term::Comp(l.clone(), r.clone()),
            Term::Transpose(a) => Term::Transpose(a.clone()),
        }
    }

    /// Term-level transposition; involutive.
    pub fn transpose(&self) -> Term<A> {
        match self {
            Term::Transpose(inner) => (**inner).clone(),
            Term::All { dom, cod } => Term::All {
                dom: cod.clone(),
                cod: dom.clone(),
            },
            t => Term::Transpose(Box::new(t.clone())),
        }
    }

    /// Rewrites to the canonical fixed point of the local rules.
    /// Idempotent: normalizing a normalized term returns it unchanged.
    pub fn normalize(&self) -> Term<A> {
        let mut curr = self.clone();
        loop {
            let next = curr.rewrite_once();
            if next == curr {
                return next;
            }
            curr = next;
        }
    }

    /// One application of the node's local rewrite rule.
    fn rewrite_once(&self) -> Term<A> {
        match self {
            Term::And(args) => connective::and_rule(args),
            Term::Or(args, hint) => connective::or_rule(args, hint.get()),
            Term::Not(arg) => connective::not_rule(arg),
            Term::Tuple {
                guard,
                parts,
                dom,
                cod,
            } => {
                let guard = match guard {
                    None => None,
                    Some(g) => {
                        let g = g.normalize();
                        if g.is_false() {
                            return Term::False(dom.clone());
                        }
                        if g.is_true() {
                            None
                        } else {
                            Some(Box::new(g))
                        }
                    }
                };
                let parts: Vec<Term<A>> = parts.iter().map(|p| p.normalize()).collect();
                if parts.iter().any(|p| p.is_false()) {
                    return Term::False(dom.clone());
                }
                Term::Tuple {
                    guard,
                    parts,
                    dom: dom.clone(),
                    cod: cod.clone(),
                }
            }
            Term::Comp(l, r) => Term::Comp(Box::new(l.normalize()), Box::new(r.normalize())),
            Term::Transpose(a) => a.normalize().transpose(),
            leaf => leaf.clone(),
        }
    }

    pub fn get_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl<A: Atom> PartialEq for Term<A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::True(a), Term::True(b)) | (Term::False(a), Term::False(b)) => a == b,
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::And(a), Term::And(b)) => a == b,
            // the disjointness hint is a cache, not content
            (Term::Or(a, _), Term::Or(b, _)) => a == b,
            (Term::Not(a), Term::Not(b)) => a == b,
            (
                Term::Tuple {
                    guard: g1,
                    parts: p1,
                    dom: d1,
                    cod: c1,
                },
                Term::Tuple {
                    guard: g2,
                    parts: p2,
                    dom: d2,
                    cod: c2,
                },
            ) => g1 == g2 && p1 == p2 && d1 == d2 && c1 == c2,
            (
                Term::All { dom: d1, cod: c1 },
                Term::All { dom: d2, cod: c2 },
            ) => d1 == d2 && c1 == c2,
            (Term::Comp(l1, r1), Term::Comp(l2, r2)) => l1 == l2 && r1 == r2,
            (Term::Transpose(a), Term::Transpose(b)) => a == b,
            _ => false,
        }
    }
}

impl<A: Atom> Eq for Term<A> {}

impl<A: Atom> Hash for Term<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Term::True(d) | Term::False(d) => d.hash(state),
            Term::Atom(a) => a.hash(state),
            Term::And(args) | Term::Or(args, _) => args.hash(state),
            Term::Not(a) => a.hash(state),
            Term::Tuple {
                guard,
                parts,
                dom,
                cod,
            } => {
                guard.hash(state);
                parts.hash(state);
                dom.hash(state);
                cod.hash(state);
            }
            Term::All { dom, cod } => {
                dom.hash(state);
                cod.hash(state);
            }
            Term::Comp(l, r) => {
                l.hash(state);
                r.hash(state);
            }
            Term::Transpose(a) => a.hash(state),
        }
    }
}

impl<A: Atom> fmt::Display for Term<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::True(_) => write!(f, "true"),
            Term::False(_) => write!(f, "false"),
            Term::Atom(a) => write!(f, "{}", a),
            Term::And(args) => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", parts.join(" & "))
            }
            Term::Or(args, _) => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", parts.join(" | "))
            }
            Term::Not(a) => write!(f, "!{}", a),
            Term::Tuple { guard, parts, .. } => {
                let body: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                match guard {
                    Some(g) => write!(f, "[{}]<{}>", g, body.join(",")),
                    None => write!(f, "<{}>", body.join(",")),
                }
            }
            Term::All { cod, .. } => write!(f, "<{}.all>", cod),
            Term::Comp(l, r) => write!(f, "({} . {})", l, r),
            Term::Transpose(a) => write!(f, "{}'", a),
        }
    }
}

#[cfg(test)]
mod specs {
    use super::*;
    use crate::testing::{colors, eq, neq, opaque, Cv};

    #[test]
    fn diff_is_and_with_complement() {
        let a = opaque("a");
        let b = opaque("b");

        let actual = a.diff(&b);
        let expected = Term::and(vec![a, Term::not(b)]);

        assert_eq!(actual, expected);
    }

    #[test]
    fn equality_ignores_the_disjoint_hint() {
        let x = Term::or(vec![eq("i", 0), eq("i", 1)], false);
        let y = Term::or(vec![eq("i", 0), eq("i", 1)], true);

        assert_eq!(x, y);
        assert_eq!(x.get_hash(), y.get_hash());
    }

    #[test]
    fn normalize_is_idempotent() {
        let terms = vec![
            eq("i", 0),
            Term::not(Term::or(vec![eq("i", 0), eq("i", 1)], false)),
            Term::and(vec![eq("i", 0), Term::not(eq("j", 1))]),
            Term::or(vec![opaque("a"), Term::not(opaque("a"))], false),
        ];

        for t in terms {
            let once = t.normalize();
            let twice = once.normalize();
            assert_eq!(once, twice, "term {}", t);
        }
    }

    #[test]
    fn double_negation_collapses_syntactically() {
        let a = opaque("a");

        let actual = Term::not(Term::not(a.clone())).normalize();

        assert_eq!(actual, a);
    }

    #[test]
    fn negation_flips_the_constants() {
        let dom = colors(3);
        let t: Term<Cv> = Term::not(Term::True(dom.clone())).normalize();
        let f: Term<Cv> = Term::not(Term::False(dom.clone())).normalize();

        assert_eq!(t, Term::False(dom.clone()));
        assert_eq!(f, Term::True(dom));
    }

    #[test]
    fn not_pushes_through_and_via_de_morgan() {
        let a = opaque("a");
        let b = opaque("b");

        let actual = Term::not(Term::and(vec![a.clone(), b.clone()])).normalize();
        let expected = Term::or(vec![Term::not(a), Term::not(b)], false).normalize();

        assert_eq!(actual, expected);
    }

    #[test]
    fn tuple_with_false_guard_is_the_null_term() {
        let dom = colors(3);
        let guard = Term::and(vec![eq("i", 0), eq("i", 1)]);

        let actual = Term::tuple(Some(guard), vec![eq("x", 0)], dom.clone()).normalize();

        assert_eq!(actual, Term::False(dom));
    }

    #[test]
    fn tuple_with_true_guard_drops_the_guard() {
        let dom = colors(3);
        let guard = Term::or(vec![eq("i", 0), Term::not(eq("i", 0))], false);

        let actual = Term::tuple(Some(guard), vec![eq("x", 0)], dom.clone()).normalize();
        let expected = Term::tuple(None, vec![eq("x", 0)], dom);

        assert_eq!(actual, expected);
    }

    #[test]
    fn transpose_is_involutive() {
        let dom = colors(3);
        let t = Term::tuple(None, vec![eq("x", 0)], dom);

        let actual = Term::Transpose(Box::new(t.transpose())).normalize();

        assert_eq!(actual, t);
    }

    #[test]
    fn card_of_unguarded_tuple_multiplies_parts() {
        let dom = colors(3);
        let t: Term<Cv> = Term::tuple(None, vec![neq("x", 0), neq("y", 1)], dom);

        assert_eq!(t.card(), Some(4));
    }

    #[test]
    fn card_of_guarded_tuple_is_unknown() {
        let dom = colors(3);
        let t = Term::tuple(Some(eq("i", 0)), vec![eq("x", 0)], dom);

        assert_eq!(t.card(), None);
    }
}
