//! The library of shipped [Reducer](crate::Reducer) primitives.

mod aggregate;
mod first;
mod term_frequency;
mod top_n;

pub use aggregate::*;
pub use first::*;
pub use term_frequency::*;
pub use top_n::*;
