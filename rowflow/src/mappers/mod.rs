//! The library of shipped [Mapper](crate::Mapper) primitives.

mod arith;
mod route;
mod text;
mod tfidf;

pub use arith::*;
pub use route::*;
pub use text::*;
pub use tfidf::*;
