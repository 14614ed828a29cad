//! Term resolution for disjunctive single-field queries.

pub mod accumulator;
pub mod resolver;
pub mod term;

pub use self::accumulator::Accumulator;
pub use self::resolver::{FieldStrategy, Resolution, Resolver, resolve};
pub use self::term::{Term, TermKind};
