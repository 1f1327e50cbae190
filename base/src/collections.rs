//! Container types which the standard library lacks.
pub mod pq;
