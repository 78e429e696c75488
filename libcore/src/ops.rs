//! Bag-valued operator expressions: intersection, composition, scalar
//! product, transposition and positive-part extraction, each with a local
//! simplification rule driven to a fixed point.

use std::collections::HashMap;
use std::fmt;

use crate::domain::Domain;
use crate::error::SymbagError;
use crate::logical::LogicalBag;
use crate::multiset::Multiset;
use crate::term::{Atom, Term};

/// A bag-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<A: Atom> {
    /// A concrete bag constant.
    Bag(LogicalBag<A>),
    /// A single term seen as a function constant.
    Const(Term<A>),
    Intersection(Box<Expr<A>>, Box<Expr<A>>),
    Comp(Box<Expr<A>>, Box<Expr<A>>),
    ScalarProd(i64, Box<Expr<A>>),
    Transpose(Box<Expr<A>>),
    Proper(Box<Expr<A>>),
}

impl<A: Atom> Expr<A> {
    /// Pairwise-multiplicity-minimum of two bag expressions. With `check`
    /// the sorts of the operands must agree.
    pub fn intersection(lhs: Expr<A>, rhs: Expr<A>, check: bool) -> Result<Expr<A>, SymbagError> {
        if check {
            same_sorts(&lhs, &rhs)?;
        }
        Ok(Expr::Intersection(Box::new(lhs), Box::new(rhs)))
    }

    /// Composition `lhs . rhs`. With `check` the domain of `lhs` must be
    /// the codomain of `rhs`.
    pub fn comp(lhs: Expr<A>, rhs: Expr<A>, check: bool) -> Result<Expr<A>, SymbagError> {
        if check && lhs.domain() != rhs.codomain() {
            return Err(SymbagError::DomainMismatch {
                left: lhs.domain().clone(),
                right: rhs.codomain().clone(),
            });
        }
        Ok(Expr::Comp(Box::new(lhs), Box::new(rhs)))
    }

    pub fn scalar_prod(k: i64, arg: Expr<A>) -> Expr<A> {
        Expr::ScalarProd(k, Box::new(arg))
    }

    pub fn transpose(arg: Expr<A>) -> Expr<A> {
        Expr::Transpose(Box::new(arg))
    }

    pub fn proper(arg: Expr<A>) -> Expr<A> {
        Expr::Proper(Box::new(arg))
    }

    pub fn domain(&self) -> &Domain {
        match self {
            Expr::Bag(b) => b.domain(),
            Expr::Const(t) => t.domain(),
            Expr::Intersection(l, _) => l.domain(),
            Expr::Comp(_, r) => r.domain(),
            Expr::ScalarProd(_, a) => a.domain(),
            Expr::Transpose(a) => a.codomain(),
            Expr::Proper(a) => a.domain(),
        }
    }

    pub fn codomain(&self) -> &Domain {
        match self {
            Expr::Bag(b) => b.codomain(),
            Expr::Const(t) => t.codomain(),
            Expr::Intersection(l, _) => l.codomain(),
            Expr::Comp(l, _) => l.codomain(),
            Expr::ScalarProd(_, a) => a.codomain(),
            Expr::Transpose(a) => a.domain(),
            Expr::Proper(a) => a.codomain(),
        }
    }

    /// Drives the local rules to a fixed point.
    pub fn simplify(&self) -> Expr<A> {
        let mut curr = self.clone();
        loop {
            let next = curr.rewrite_once();
            if next == curr {
                return next;
            }
            curr = next;
        }
    }

    fn rewrite_once(&self) -> Expr<A> {
        match self {
            Expr::Bag(b) => {
                if b.is_simplified() {
                    self.clone()
                } else {
                    Expr::Bag(b.spec_simplify())
                }
            }
            Expr::Const(t) => Expr::Const(t.normalize()),
            Expr::Intersection(l, r) => match (l.rewrite_once(), r.rewrite_once()) {
                (Expr::Bag(a), Expr::Bag(b)) => Expr::Bag(a.pairwise_inter(&b)),
                (l, r) => Expr::Intersection(Box::new(l), Box::new(r)),
            },
            Expr::Comp(l, r) => comp_rule(l.rewrite_once(), r.rewrite_once()),
            Expr::ScalarProd(k, arg) => scalar_rule(*k, arg),
            Expr::Transpose(arg) => match arg.rewrite_once() {
                // transposition is involutive
                Expr::Transpose(inner) => *inner,
                Expr::Bag(b) => Expr::Bag(b.transpose()),
                other => Expr::Transpose(Box::new(other)),
            },
            Expr::Proper(arg) => match arg.rewrite_once() {
                Expr::Bag(b) => {
                    if b.is_proper() {
                        Expr::Bag(b)
                    } else {
                        Expr::Bag(b.proper())
                    }
                }
                other => Expr::Proper(Box::new(other)),
            },
        }
    }
}

fn same_sorts<A: Atom>(lhs: &Expr<A>, rhs: &Expr<A>) -> Result<(), SymbagError> {
    if lhs.domain() != rhs.domain() || lhs.codomain() != rhs.codomain() {
        return Err(SymbagError::DomainMismatch {
            left: lhs.domain().clone(),
            right: rhs.domain().clone(),
        });
    }
    Ok(())
}

/// Distributes composition over the concrete-bag side; a constant
/// function composed with a measurable bag is a scalar product.
fn comp_rule<A: Atom>(l: Expr<A>, r: Expr<A>) -> Expr<A> {
    if let (Expr::Const(f), Expr::Bag(b)) = (&l, &r) {
        if f.is_constant() {
            if let Some(c) = b.card() {
                return Expr::ScalarProd(c as i64, Box::new(Expr::Const(f.clone())));
            }
        }
    }
    match (l, r) {
        (Expr::Bag(a), Expr::Bag(b)) => {
            let mut acc: HashMap<Term<A>, i64> = HashMap::new();
            for (k1, m1) in a.iter() {
                for (k2, m2) in b.iter() {
                    let composed = Term::Comp(Box::new(k1.clone()), Box::new(k2.clone()));
                    Multiset::add(&mut acc, &composed, m1 * m2);
                }
            }
            Expr::Bag(LogicalBag::freeze(acc, b.domain(), a.codomain()))
        }
        (Expr::Bag(a), Expr::Const(t)) => {
            let mut acc: HashMap<Term<A>, i64> = HashMap::new();
            for (k1, m1) in a.iter() {
                let composed = Term::Comp(Box::new(k1.clone()), Box::new(t.clone()));
                Multiset::add(&mut acc, &composed, m1);
            }
            let dom = t.domain().clone();
            Expr::Bag(LogicalBag::freeze(acc, &dom, a.codomain()))
        }
        (Expr::Const(t), Expr::Bag(b)) => {
            let mut acc: HashMap<Term<A>, i64> = HashMap::new();
            for (k2, m2) in b.iter() {
                let composed = Term::Comp(Box::new(t.clone()), Box::new(k2.clone()));
                Multiset::add(&mut acc, &composed, m2);
            }
            let cod = t.codomain().clone();
            Expr::Bag(LogicalBag::freeze(acc, b.domain(), &cod))
        }
        (l, r) => Expr::Comp(Box::new(l), Box::new(r)),
    }
}

fn scalar_rule<A: Atom>(k: i64, arg: &Expr<A>) -> Expr<A> {
    if k == 0 {
        return Expr::Bag(LogicalBag::empty(arg.domain().clone(), arg.codomain().clone()));
    }
    let arg = arg.rewrite_once();
    if k == 1 {
        return arg;
    }
    match arg {
        // nested coefficients fold multiplicatively
        Expr::ScalarProd(k2, inner) => Expr::ScalarProd(k * k2, inner),
        Expr::Bag(b) => Expr::Bag(b.scalar_prod(k)),
        // a term constant is the elementary bag holding it once
        Expr::Const(t) => {
            let dom = t.domain().clone();
            let cod = t.codomain().clone();
            let mut acc = HashMap::new();
            acc.insert(t, k);
            Expr::Bag(LogicalBag::freeze(acc, &dom, &cod))
        }
        other => Expr::ScalarProd(k, Box::new(other)),
    }
}

impl<A: Atom> fmt::Display for Expr<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Bag(b) => write!(f, "{}", b),
            Expr::Const(t) => write!(f, "{}", t),
            Expr::Intersection(l, r) => write!(f, "({} ^ {})", l, r),
            Expr::Comp(l, r) => write!(f, "({} . {})", l, r),
            Expr::ScalarProd(k, a) => write!(f, "{}*{}", k, a),
            Expr::Transpose(a) => write!(f, "{}'", a),
            Expr::Proper(a) => write!(f, "pos({})", a),
        }
    }
}
