use crate::domain::Domain;
use thiserror::Error;

/// Failure conditions of the bag algebra.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbagError {
    /// A bag can not be built from an empty source map.
    #[error("can not build a bag from an empty source")]
    EmptyBag,
    /// Binary bag operators require matching sorts when a check is requested.
    #[error("domain mismatch: {left} vs {right}")]
    DomainMismatch { left: Domain, right: Domain },
    /// Guard aggregation met a bag key that carries no guard.
    #[error("bag key `{0}` does not expose a guard")]
    GuardlessKey(String),
    /// The bag holds symbolic keys outside the boolean fragment.
    #[error("bag elements are not subject to boolean disjoining")]
    NotDisjoinable,
}
