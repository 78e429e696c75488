//! Multiset algebra and pairwise-disjoint partition refinement for
//! colored-domain expressions.
//!
//! A bag maps terms of a color domain to integer multiplicities. The bags
//! of boolean-domain terms can be rewritten into an equivalent form whose
//! support is pairwise mutually exclusive, and their guards aggregate into
//! a partition of the domain:
//!
//! ```latex
//! 1'[i in {0,1}]<x> + 2'[i in {1,2}]<x>
//!     -> 1'[i=0]<x> + 3'[i=1]<x> + 2'[i=2]<x>
//! ```
//!
//! The boolean connectives simplify through syntactic shortcuts plus the
//! hooks of the [`Atom`](term::Atom) capability; the concrete guard
//! algebra and the expression framework around it live outside this crate.

#[macro_use]
extern crate maplit;
#[macro_use]
extern crate serde_derive;
#[cfg(test)]
#[macro_use]
extern crate vector_assertions;

pub mod bag;
pub mod connective;
pub mod domain;
pub mod error;
pub mod logical;
pub mod multiset;
pub mod ops;
pub mod term;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::bag::Bag;
pub use crate::domain::Domain;
pub use crate::error::SymbagError;
pub use crate::logical::{
    disjoin_map_of_guards, disjoin_parts, merge_guards, product, Guard, GuardCoeffs,
    GuardPartition, LogicalBag,
};
pub use crate::multiset::Multiset;
pub use crate::ops::Expr;
pub use crate::term::{Atom, Term};
