//! Shared fixtures for the unit tests: a color-set membership atom over a
//! small ordered class, plus brute-force equivalence checking.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use crate::domain::Domain;
use crate::term::{Atom, Term};

/// A test predicate over one color variable: either membership of the
/// variable in a color set, or an opaque symbol the algebra can not decide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cv {
    In {
        var: &'static str,
        set: Vec<u8>,
        class: Domain,
    },
    Opaque {
        name: &'static str,
        class: Domain,
    },
}

pub fn colors(n: u64) -> Domain {
    Domain::new("C", Some(n))
}

fn class_size(class: &Domain) -> u8 {
    class.card.expect("test classes are enumerable") as u8
}

fn membership(var: &'static str, mut set: Vec<u8>, class: Domain) -> Term<Cv> {
    set.sort_unstable();
    set.dedup();
    if set.is_empty() {
        return Term::False(class);
    }
    if set.len() as u8 == class_size(&class) {
        return Term::True(class);
    }
    Term::Atom(Cv::In { var, set, class })
}

/// "var == c<i>" over the 3-color class.
pub fn eq(var: &'static str, i: u8) -> Term<Cv> {
    membership(var, vec![i], colors(3))
}

/// "var != c<i>" over the 3-color class.
pub fn neq(var: &'static str, i: u8) -> Term<Cv> {
    let set = (0..3).filter(|c| *c != i).collect();
    membership(var, set, colors(3))
}

/// "var in set" over the 3-color class.
pub fn within(var: &'static str, set: &[u8]) -> Term<Cv> {
    membership(var, set.to_vec(), colors(3))
}

/// An atom no domain rule can decide.
pub fn opaque(name: &'static str) -> Term<Cv> {
    Term::Atom(Cv::Opaque {
        name,
        class: colors(3),
    })
}

impl Atom for Cv {
    fn domain(&self) -> &Domain {
        match self {
            Cv::In { class, .. } | Cv::Opaque { class, .. } => class,
        }
    }

    fn and_atom(&self, other: &Self) -> Option<Term<Self>> {
        match (self, other) {
            (
                Cv::In { var, set, class },
                Cv::In {
                    var: var2,
                    set: set2,
                    ..
                },
            ) if var == var2 => {
                let meet: Vec<u8> = set.iter().cloned().filter(|c| set2.contains(c)).collect();
                Some(membership(var, meet, class.clone()))
            }
            _ => None,
        }
    }

    fn or_atom(&self, other: &Self) -> Option<Term<Self>> {
        match (self, other) {
            (
                Cv::In { var, set, class },
                Cv::In {
                    var: var2,
                    set: set2,
                    ..
                },
            ) if var == var2 => {
                let mut join = set.clone();
                join.extend(set2.iter().cloned());
                Some(membership(var, join, class.clone()))
            }
            _ => None,
        }
    }

    fn not_atom(&self) -> Option<Term<Self>> {
        match self {
            Cv::In { var, set, class } => {
                let rest: Vec<u8> = (0..class_size(class)).filter(|c| !set.contains(c)).collect();
                Some(membership(var, rest, class.clone()))
            }
            Cv::Opaque { .. } => None,
        }
    }

    fn card(&self) -> Option<u64> {
        match self {
            Cv::In { set, .. } => Some(set.len() as u64),
            Cv::Opaque { .. } => None,
        }
    }

    fn is_constant(&self) -> bool {
        false
    }
}

impl fmt::Display for Cv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cv::In { var, set, .. } => {
                if set.len() == 1 {
                    write!(f, "{}={}", var, set[0])
                } else {
                    let cs: Vec<String> = set.iter().map(|c| c.to_string()).collect();
                    write!(f, "{} in {{{}}}", var, cs.join(","))
                }
            }
            Cv::Opaque { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Evaluates a purely logical term under a variable assignment.
pub fn eval(t: &Term<Cv>, env: &HashMap<&'static str, u8>) -> bool {
    match t {
        Term::True(_) => true,
        Term::False(_) => false,
        Term::Atom(Cv::In { var, set, .. }) => set.contains(&env[var]),
        Term::Atom(Cv::Opaque { name, .. }) => panic!("opaque atom `{}` in eval", name),
        Term::And(args) => args.iter().all(|a| eval(a, env)),
        Term::Or(args, _) => args.iter().any(|a| eval(a, env)),
        Term::Not(a) => !eval(a, env),
        other => panic!("`{}` is not a logical term", other),
    }
}

/// Brute-force equivalence over all assignments of `vars` in `0..n`.
pub fn equivalent(a: &Term<Cv>, b: &Term<Cv>, vars: &[&'static str], n: u8) -> bool {
    if vars.is_empty() {
        let env = HashMap::new();
        return eval(a, &env) == eval(b, &env);
    }
    for combo in vars.iter().map(|_| 0..n).multi_cartesian_product() {
        let env: HashMap<&'static str, u8> =
            vars.iter().cloned().zip(combo.into_iter()).collect();
        if eval(a, &env) != eval(b, &env) {
            return false;
        }
    }
    true
}

/// Brute-force tautology check.
pub fn tautology(t: &Term<Cv>, vars: &[&'static str], n: u8) -> bool {
    equivalent(t, &Term::True(colors(n as u64)), vars, n)
}
